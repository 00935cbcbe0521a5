use featurescope_core::control::QueryBuilderRequest;
use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::FeatureScopeMcp;
use crate::helpers;

/// Parameters for SQL generation.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct QueryBuilderParams {
    pub org_id: String,
    /// feature_extraction (default), aggregation or sampling.
    pub query_type: Option<String>,
    pub use_case: Option<String>,
    pub dataset_id: Option<String>,
    pub table_id: Option<String>,
    pub features: Option<Vec<String>>,
    /// Column to value for equality, or to {"min", "max"} for a range.
    pub filters: Option<Map<String, Value>>,
    pub limit: Option<u64>,
    /// Run the generated query in the warehouse and attach sample rows.
    pub execute: Option<bool>,
}

impl From<QueryBuilderParams> for QueryBuilderRequest {
    fn from(params: QueryBuilderParams) -> Self {
        let mut request = Self::new(
            params.org_id,
            params
                .query_type
                .unwrap_or_else(|| "feature_extraction".to_string()),
        )
        .with_execute(params.execute.unwrap_or(false));
        if let Some(use_case) = params.use_case {
            request = request.with_use_case(use_case);
        }
        request.dataset_id = params.dataset_id;
        request.table_id = params.table_id;
        request.features = params.features;
        request.filters = params.filters;
        request.limit = params.limit;
        request
    }
}

#[tool_router(router = tool_router_query, vis = "pub")]
impl FeatureScopeMcp {
    #[tool(description = "Generate warehouse SQL for an ML dataset against dataset_id.table_id: feature_extraction (selected features with filters and limit), aggregation (per-user features for the use case) or sampling (random, stratified, temporal). Set execute to run it.")]
    async fn query_builder(
        &self,
        Parameters(params): Parameters<QueryBuilderParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let request = QueryBuilderRequest::from(params);
        let context = vec![
            ("org_id", Value::from(request.org_id.as_str())),
            ("query_type", Value::from(request.query_type.as_str())),
        ];
        let outcome = self.control().query_builder(request).await;
        helpers::tool_result("query_builder", outcome, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{body, mock_server};

    fn params(query_type: &str) -> QueryBuilderParams {
        QueryBuilderParams {
            org_id: "acme".to_string(),
            query_type: Some(query_type.to_string()),
            use_case: None,
            dataset_id: Some("analytics".to_string()),
            table_id: Some("users".to_string()),
            features: None,
            filters: None,
            limit: None,
            execute: None,
        }
    }

    #[tokio::test]
    async fn sampling_query_is_tagged() {
        let server = mock_server();
        let result = server.query_builder(Parameters(params("sampling"))).await.unwrap();

        assert_ne!(result.is_error, Some(true));
        let report = body(&result);
        assert_eq!(report["query_type"], "sampling");
        assert_eq!(report["recommended_strategy"], "random_sample");
    }

    #[tokio::test]
    async fn missing_table_is_an_error_value() {
        let server = mock_server();
        let mut missing = params("aggregation");
        missing.table_id = None;
        let result = server.query_builder(Parameters(missing)).await.unwrap();

        assert_eq!(result.is_error, Some(true));
        let error = body(&result);
        assert_eq!(error["details"]["field"], "dataset_id");
        assert_eq!(error["query_type"], "aggregation");
    }
}
