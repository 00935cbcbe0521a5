use async_trait::async_trait;
use featurescope_store::RawColumnMetadata;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use super::http::{HttpClient, HttpSettings};
use super::{Collaborator, MetadataApi, require_org_id};
use crate::error::{ServerError, ServerResult};

/// Live column metadata client.
pub struct MetadataClient {
    http: HttpClient,
    url: String,
}

impl MetadataClient {
    #[must_use]
    pub fn new(url: impl Into<String>, settings: HttpSettings) -> Self {
        Self {
            http: HttpClient::new(settings),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Collaborator for MetadataClient {
    fn name(&self) -> &'static str {
        "metadata_api"
    }

    async fn connect(&self) -> ServerResult<()> {
        self.http.connect().await
    }

    async fn disconnect(&self) {
        self.http.disconnect().await;
    }

    async fn health_check(&self) -> bool {
        match self.http.connect().await {
            Ok(()) => true,
            Err(err) => {
                error!("metadata API health check failed: {err}");
                false
            }
        }
    }
}

#[async_trait]
impl MetadataApi for MetadataClient {
    async fn get_column_metadata(
        &self,
        org_id: &str,
        columns: &[String],
        sample_size: usize,
    ) -> ServerResult<Vec<RawColumnMetadata>> {
        require_org_id(org_id)?;
        if columns.is_empty() {
            return Err(ServerError::invalid_field(
                "At least one column is required",
                "columns",
            ));
        }

        let body = json!({
            "orgId": org_id,
            "columns": columns,
            "sampleSize": sample_size,
        });
        let response: Value = self.http.post_json(&self.url, &body).await?;
        let metadata = match response {
            Value::Array(_) => serde_json::from_value::<Vec<RawColumnMetadata>>(response)
                .map_err(|err| {
                    ServerError::api_at(
                        format!("Failed to get column metadata: {err}"),
                        None,
                        self.url.as_str(),
                    )
                })?,
            _ => {
                warn!(org_id, "metadata response is not a list");
                Vec::new()
            }
        };

        info!(org_id, columns = metadata.len(), "retrieved column metadata");
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_column_list_is_a_validation_error() {
        let client = MetadataClient::new("http://127.0.0.1:9/metadata", HttpSettings::default());

        let err = client.get_column_metadata("acme", &[], 10).await.unwrap_err();
        assert_eq!(err.details()["field"], "columns");

        let err = client
            .get_column_metadata(" ", &["age".to_string()], 10)
            .await
            .unwrap_err();
        assert_eq!(err.details()["field"], "org_id");
    }
}
