//! MCP server implementation for featurescope.
//!
//! This crate wires the control plane into rmcp tool handlers and exposes the
//! five schema tools over stdio or streamable HTTP.

mod helpers;
mod tools;
pub mod server;

use featurescope_core::control::FeatureScopeControlPlane;
use featurescope_core::services::Services;
use rmcp::{
    ErrorData,
    ServerHandler,
    handler::server::tool::ToolRouter,
    tool,
    tool_handler,
    tool_router,
};
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};

pub use tools::analysis::FeatureAnalysisParams;
pub use tools::compliance::ComplianceParams;
pub use tools::discovery::SchemaDiscoveryParams;
pub use tools::query::QueryBuilderParams;

const SERVER_INSTRUCTIONS: &str = r"featurescope exposes an organization's data catalog to ML and analytics workflows.

Workflow:
1. Every tool takes an `org_id`. Start with `schema_discovery` (operation `overview`) to see how
   many columns exist and how they split across stores (profile_store, event_store,
   calculated_attribute, consent_store).
2. Drill down with `schema_discovery`:
   - `store` + `store_type` lists the columns of one store.
   - `columns` + `columns` returns metadata and cardinality for named columns.
   - `search` + `search_query` searches the catalog.
   - `pii` lists marked and detected PII columns.
3. `feature_analysis` profiles candidate features for a use case (collaborative_filtering,
   churn_prediction, segmentation) and scores ML readiness. Pass `dataset_id` and `table_id`
   for warehouse quality metrics and correlations.
4. `query_builder` generates warehouse SQL (feature_extraction, aggregation, sampling) for a
   `dataset_id`/`table_id`; `execute` runs it and attaches sample rows.
5. `compliance_checker` audits PII, consent and retention (check_type `full`) or GDPR/CCPA/HIPAA
   (`regulations`).

Notes:
- Failures come back as tool errors with a JSON body: `error`, `code`, `details` and the
  identifying arguments.
- Schemas are cached; pass `force_refresh` to `schema_discovery` to re-fetch.
- `health_check` reports cache, API mode and collaborator status. `help` lists the tools.";

/// MCP server wrapper around the shared services and tool routers.
#[derive(Clone)]
pub struct FeatureScopeMcp {
    tool_router: ToolRouter<Self>,
    services: Services,
}

impl FeatureScopeMcp {
    #[must_use]
    pub fn new(services: Services) -> Self {
        let tool_router = Self::tool_router_core()
            + Self::tool_router_discovery()
            + Self::tool_router_analysis()
            + Self::tool_router_query()
            + Self::tool_router_compliance()
            + Self::tool_router_context();
        Self {
            tool_router,
            services,
        }
    }

    pub(crate) fn control(&self) -> FeatureScopeControlPlane {
        self.services.control()
    }
}

#[tool_router(router = tool_router_core, vis = "pub")]
impl FeatureScopeMcp {
    #[tool(description = "Report server health: cache tiers, API mode (mock|live) and collaborator reachability.")]
    async fn health_check(&self) -> Result<CallToolResult, ErrorData> {
        let report = self.control().health_check().await;
        Ok(CallToolResult::success(vec![Content::json(report)?]))
    }
}

#[tool_handler]
impl ServerHandler for FeatureScopeMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use featurescope_core::services::{Services, ServicesConfig};
    use rmcp::model::CallToolResult;
    use serde_json::Value;

    use crate::FeatureScopeMcp;

    pub(crate) fn mock_server() -> FeatureScopeMcp {
        FeatureScopeMcp::new(Services::new(ServicesConfig::mock()))
    }

    /// Decodes the single JSON content block of a tool result.
    pub(crate) fn body(result: &CallToolResult) -> Value {
        let text = result
            .content
            .first()
            .and_then(|content| content.as_text())
            .map(|content| content.text.clone())
            .expect("tool result should carry text content");
        serde_json::from_str(&text).expect("tool result should be JSON")
    }
}

#[cfg(test)]
mod tests {
    use rmcp::ServerHandler;

    use crate::testing::{body, mock_server};

    #[tokio::test]
    async fn health_check_reports_mock_mode() {
        let server = mock_server();
        let result = server.health_check().await.unwrap();
        assert_ne!(result.is_error, Some(true));

        let report = body(&result);
        assert_eq!(report["status"], "healthy");
        assert_eq!(report["components"]["api_mode"], "mock");
    }

    #[test]
    fn server_info_enables_tools() {
        let info = mock_server().get_info();
        assert!(info.capabilities.tools.is_some());
        assert!(info.instructions.unwrap().contains("schema_discovery"));
    }
}
