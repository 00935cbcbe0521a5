use featurescope_core::control::FeatureAnalysisRequest;
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

/// Parameters for ML feature analysis.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct FeatureAnalysisParams {
    pub org_id: String,
    /// collaborative_filtering (default), churn_prediction, segmentation or any other name.
    pub use_case: Option<String>,
    /// Columns to analyze; defaults to the columns relevant to the use case.
    pub columns: Option<Vec<String>>,
    pub dataset_id: Option<String>,
    pub table_id: Option<String>,
    pub include_statistics: Option<bool>,
    pub include_quality: Option<bool>,
    pub include_correlations: Option<bool>,
}

impl From<FeatureAnalysisParams> for FeatureAnalysisRequest {
    fn from(params: FeatureAnalysisParams) -> Self {
        let mut request = Self::new(
            params.org_id,
            params
                .use_case
                .unwrap_or_else(|| "collaborative_filtering".to_string()),
        )
        .with_correlations(params.include_correlations.unwrap_or(false));
        request.columns = params.columns;
        request.dataset_id = params.dataset_id;
        request.table_id = params.table_id;
        request.include_statistics = params.include_statistics.unwrap_or(true);
        request.include_quality = params.include_quality.unwrap_or(true);
        request
    }
}

#[tool_router(router = tool_router_analysis, vis = "pub")]
impl FeatureScopeMcp {
    #[tool(description = "Profile candidate ML features for a use case: store, cardinality, ML feature type and engineering suggestions per column, optional warehouse quality metrics and correlations (dataset_id + table_id), and a readiness score.")]
    async fn feature_analysis(
        &self,
        Parameters(params): Parameters<FeatureAnalysisParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let request = FeatureAnalysisRequest::from(params);
        let context = vec![
            ("org_id", Value::from(request.org_id.as_str())),
            ("use_case", Value::from(request.use_case.as_str())),
        ];
        let outcome = self.control().feature_analysis(request).await;
        helpers::tool_result("feature_analysis", outcome, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{body, mock_server};

    fn params(org_id: &str) -> FeatureAnalysisParams {
        FeatureAnalysisParams {
            org_id: org_id.to_string(),
            use_case: None,
            columns: None,
            dataset_id: None,
            table_id: None,
            include_statistics: None,
            include_quality: None,
            include_correlations: None,
        }
    }

    #[test]
    fn omitted_flags_take_request_defaults() {
        let request = FeatureAnalysisRequest::from(params("acme"));
        assert_eq!(request.use_case, "collaborative_filtering");
        assert!(request.include_statistics);
        assert!(request.include_quality);
        assert!(!request.include_correlations);
    }

    #[tokio::test]
    async fn analysis_returns_readiness() {
        let server = mock_server();
        let result = server.feature_analysis(Parameters(params("acme"))).await.unwrap();

        assert_ne!(result.is_error, Some(true));
        let report = body(&result);
        assert_eq!(report["use_case"], "collaborative_filtering");
        assert!(report["readiness_assessment"]["score"].is_u64());
        assert!(report.get("data_quality").is_none());
    }

    #[tokio::test]
    async fn blank_org_id_reports_field() {
        let server = mock_server();
        let result = server.feature_analysis(Parameters(params(""))).await.unwrap();

        assert_eq!(result.is_error, Some(true));
        assert_eq!(body(&result)["details"]["field"], "org_id");
    }
}
