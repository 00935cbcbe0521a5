use async_trait::async_trait;
use featurescope_store::schema::CATALOG_PAGE_SIZE;
use featurescope_store::{Attribute, CatalogFilters, CatalogSchema};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info};

use super::http::{HttpClient, HttpSettings};
use super::{CatalogApi, Collaborator, require_org_id};
use crate::error::ServerResult;

const EXCLUDED_CATEGORIES: [&str; 2] = ["CALCULATED_ATTRIBUTE", "INTERNAL"];

#[derive(Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    attributes: Vec<Attribute>,
    #[serde(default)]
    count: u64,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    documents: Vec<Attribute>,
}

/// Live catalog search client. The URL template carries an `{org_id}` placeholder.
pub struct CatalogClient {
    http: HttpClient,
    url_template: String,
}

impl CatalogClient {
    #[must_use]
    pub fn new(url_template: impl Into<String>, settings: HttpSettings) -> Self {
        Self {
            http: HttpClient::new(settings),
            url_template: url_template.into(),
        }
    }

    fn url(&self, org_id: &str) -> String {
        self.url_template.replace("{org_id}", org_id)
    }
}

/// Full-catalog request body; caller filters are merged over the default exclusions.
pub(crate) fn catalog_request_body(filters: Option<CatalogFilters>) -> Value {
    let mut merged = CatalogFilters::new();
    merged.insert("excludeCategory".to_string(), json!(EXCLUDED_CATEGORIES));
    merged.extend(filters.unwrap_or_default());
    json!({
        "fetchGroup": "COMPLETE_CATALOG_ATTR",
        "sortField": "ATTRIBUTE_NAME",
        "sortOrder": "ASC",
        "from": 0,
        "size": CATALOG_PAGE_SIZE,
        "filters": merged,
    })
}

pub(crate) fn search_request_body(query: &str, filters: Option<CatalogFilters>, size: usize) -> Value {
    let mut filters = filters.unwrap_or_default();
    if !query.is_empty() {
        filters.insert(
            "query".to_string(),
            json!({
                "multi_match": {
                    "query": query,
                    "fields": ["name", "displayName", "description"],
                }
            }),
        );
    }
    json!({
        "filters": filters,
        "from": 0,
        "size": size,
    })
}

#[async_trait]
impl Collaborator for CatalogClient {
    fn name(&self) -> &'static str {
        "catalog_api"
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
                error!("catalog API health check failed: {err}");
                false
            }
        }
    }
}

#[async_trait]
impl CatalogApi for CatalogClient {
    async fn get_catalog_schema(
        &self,
        org_id: &str,
        filters: Option<CatalogFilters>,
    ) -> ServerResult<CatalogSchema> {
        require_org_id(org_id)?;
        let url = self.url(org_id);
        let response: CatalogResponse = self
            .http
            .post_json(&url, &catalog_request_body(filters))
            .await?;

        info!(org_id, total_count = response.count, "retrieved catalog attributes");
        Ok(CatalogSchema {
            org_id: org_id.to_string(),
            attributes: response.attributes,
            total_count: response.count,
        })
    }

    async fn search_attributes(
        &self,
        org_id: &str,
        query: &str,
        filters: Option<CatalogFilters>,
        size: usize,
    ) -> ServerResult<Vec<Attribute>> {
        require_org_id(org_id)?;
        let url = self.url(org_id);
        let response: SearchResponse = self
            .http
            .post_json(&url, &search_request_body(query, filters, size))
            .await?;

        info!(org_id, query, matches = response.documents.len(), "searched catalog attributes");
        Ok(response.documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_body_merges_filters_over_exclusions() {
        let mut filters = CatalogFilters::new();
        filters.insert("isRawPII".to_string(), Value::Bool(true));

        let body = catalog_request_body(Some(filters));
        assert_eq!(body["fetchGroup"], "COMPLETE_CATALOG_ATTR");
        assert_eq!(body["size"], 10_000);
        assert_eq!(body["filters"]["isRawPII"], true);
        assert_eq!(
            body["filters"]["excludeCategory"],
            json!(["CALCULATED_ATTRIBUTE", "INTERNAL"])
        );
    }

    #[test]
    fn search_body_adds_multi_match_only_for_non_empty_query() {
        let body = search_request_body("email", None, 50);
        assert_eq!(body["size"], 50);
        assert_eq!(body["filters"]["query"]["multi_match"]["query"], "email");

        let body = search_request_body("", None, 50);
        assert!(body["filters"].get("query").is_none());
    }

    #[tokio::test]
    async fn empty_org_is_rejected_before_any_request() {
        let client = CatalogClient::new("http://127.0.0.1:9/orgs/{org_id}", HttpSettings::default());
        let err = client.get_catalog_schema("", None).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(err.details()["field"], "org_id");
        assert!(!client.http.is_connected().await);
    }
}
