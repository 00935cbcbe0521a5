use featurescope_core::control::SchemaDiscoveryRequest;
use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::FeatureScopeMcp;
use crate::helpers;

/// Parameters for schema discovery.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SchemaDiscoveryParams {
    pub org_id: String,
    /// One of overview, store, columns, search, pii. Defaults to overview.
    pub operation: Option<String>,
    /// Store name for the `store` operation, e.g. profile_store.
    pub store_type: Option<String>,
    /// Column names for the `columns` operation.
    pub columns: Option<Vec<String>>,
    /// Free text for the `search` operation.
    pub search_query: Option<String>,
    pub force_refresh: Option<bool>,
}

impl From<SchemaDiscoveryParams> for SchemaDiscoveryRequest {
    fn from(params: SchemaDiscoveryParams) -> Self {
        let mut request = Self::new(
            params.org_id,
            params.operation.unwrap_or_else(|| "overview".to_string()),
        )
        .with_force_refresh(params.force_refresh.unwrap_or(false));
        request.store_type = params.store_type;
        request.columns = params.columns;
        request.search_query = params.search_query;
        request
    }
}

#[tool_router(router = tool_router_discovery, vis = "pub")]
impl FeatureScopeMcp {
    #[tool(description = "Explore an organization's catalog schema. Operations: overview (store and data type counts), store (columns of one store_type), columns (metadata and cardinality for named columns), search (search_query over the catalog), pii (marked and detected PII).")]
    async fn schema_discovery(
        &self,
        Parameters(params): Parameters<SchemaDiscoveryParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let request = SchemaDiscoveryRequest::from(params);
        let context = vec![
            ("org_id", Value::from(request.org_id.as_str())),
            ("operation", Value::from(request.operation.as_str())),
        ];
        let outcome = self.control().schema_discovery(request).await;
        helpers::tool_result("schema_discovery", outcome, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{body, mock_server};

    fn params(org_id: &str, operation: Option<&str>) -> SchemaDiscoveryParams {
        SchemaDiscoveryParams {
            org_id: org_id.to_string(),
            operation: operation.map(str::to_string),
            store_type: None,
            columns: None,
            search_query: None,
            force_refresh: None,
        }
    }

    #[tokio::test]
    async fn operation_defaults_to_overview() {
        let server = mock_server();
        let result = server
            .schema_discovery(Parameters(params("acme", None)))
            .await
            .unwrap();

        assert_ne!(result.is_error, Some(true));
        let overview = body(&result);
        assert_eq!(overview["total_columns"], 22);
        assert_eq!(overview["refresh_performed"], false);
    }

    #[tokio::test]
    async fn unknown_operation_is_an_error_value() {
        let server = mock_server();
        let result = server
            .schema_discovery(Parameters(params("acme", Some("drop"))))
            .await
            .unwrap();

        assert_eq!(result.is_error, Some(true));
        let error = body(&result);
        assert_eq!(error["code"], "VALIDATION_ERROR");
        assert_eq!(error["org_id"], "acme");
        assert_eq!(error["operation"], "drop");
    }
}
