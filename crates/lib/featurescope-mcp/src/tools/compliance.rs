use featurescope_core::control::ComplianceRequest;
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

/// Parameters for a compliance audit.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ComplianceParams {
    pub org_id: String,
    /// full (default), pii, consent, retention or regulations.
    pub check_type: Option<String>,
    /// Regulations for the regulations check; defaults to GDPR and CCPA.
    pub regulations: Option<Vec<String>>,
    /// Restricts the PII section to these columns.
    pub columns: Option<Vec<String>>,
    pub generate_report: Option<bool>,
}

impl From<ComplianceParams> for ComplianceRequest {
    fn from(params: ComplianceParams) -> Self {
        let mut request = Self::new(
            params.org_id,
            params.check_type.unwrap_or_else(|| "full".to_string()),
        )
        .with_report(params.generate_report.unwrap_or(true));
        request.regulations = params.regulations;
        request.columns = params.columns;
        request
    }
}

#[tool_router(router = tool_router_compliance, vis = "pub")]
impl FeatureScopeMcp {
    #[tool(description = "Audit an organization's catalog for privacy compliance: PII handling, consent coverage and retention (check_type full, pii, consent, retention) or GDPR/CCPA/HIPAA requirements (regulations). Optionally returns a report with findings and next steps.")]
    async fn compliance_checker(
        &self,
        Parameters(params): Parameters<ComplianceParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let request = ComplianceRequest::from(params);
        let context = vec![
            ("org_id", Value::from(request.org_id.as_str())),
            ("check_type", Value::from(request.check_type.as_str())),
        ];
        let outcome = self.control().compliance_checker(request).await;
        helpers::tool_result("compliance_checker", outcome, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{body, mock_server};

    fn params(check_type: Option<&str>) -> ComplianceParams {
        ComplianceParams {
            org_id: "acme".to_string(),
            check_type: check_type.map(str::to_string),
            regulations: None,
            columns: None,
            generate_report: Some(false),
        }
    }

    #[tokio::test]
    async fn full_check_covers_three_sections() {
        let server = mock_server();
        let result = server.compliance_checker(Parameters(params(None))).await.unwrap();

        assert_ne!(result.is_error, Some(true));
        let report = body(&result);
        assert_eq!(report["check_type"], "full");
        assert!(report.get("pii_compliance").is_some());
        assert!(report.get("consent_compliance").is_some());
        assert!(report.get("retention_compliance").is_some());
    }

    #[tokio::test]
    async fn unknown_check_type_echoes_context() {
        let server = mock_server();
        let result = server
            .compliance_checker(Parameters(params(Some("sox"))))
            .await
            .unwrap();

        assert_eq!(result.is_error, Some(true));
        let error = body(&result);
        assert_eq!(error["check_type"], "sox");
        assert_eq!(error["details"]["value"], "sox");
    }
}
