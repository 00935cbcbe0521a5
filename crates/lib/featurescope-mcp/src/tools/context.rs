use rmcp::{
    ErrorData,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};

use crate::FeatureScopeMcp;

/// One tool and the operations it accepts.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ToolHelp {
    pub name: String,
    pub summary: String,
    pub operations: Vec<String>,
}

/// Payload listing every featurescope tool.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct HelpCommands {
    pub tools: Vec<ToolHelp>,
}

fn entry(name: &str, summary: &str, operations: &[&str]) -> ToolHelp {
    ToolHelp {
        name: name.to_string(),
        summary: summary.to_string(),
        operations: operations.iter().map(|op| (*op).to_string()).collect(),
    }
}

impl Default for HelpCommands {
    fn default() -> Self {
        Self {
            tools: vec![
                entry(
                    "schema_discovery",
                    "Explore the catalog schema of an organization.",
                    &["overview", "store", "columns", "search", "pii"],
                ),
                entry(
                    "feature_analysis",
                    "Profile ML features and score readiness for a use case.",
                    &["collaborative_filtering", "churn_prediction", "segmentation"],
                ),
                entry(
                    "query_builder",
                    "Generate and optionally execute warehouse SQL.",
                    &["feature_extraction", "aggregation", "sampling"],
                ),
                entry(
                    "compliance_checker",
                    "Audit PII, consent, retention and regulations.",
                    &["full", "pii", "consent", "retention", "regulations"],
                ),
                entry(
                    "health_check",
                    "Report cache, API mode and collaborator status.",
                    &[],
                ),
                entry("help", "List the tools and their operations.", &[]),
            ],
        }
    }
}

#[tool_router(router = tool_router_context, vis = "pub")]
impl FeatureScopeMcp {
    #[tool(description = "List the featurescope tools and the operations each accepts.")]
    async fn help(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::json(HelpCommands::default())?]))
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{body, mock_server};

    #[tokio::test]
    async fn help_lists_every_tool() {
        let result = mock_server().help().await.unwrap();
        let help = body(&result);
        let names: Vec<&str> = help["tools"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|tool| tool["name"].as_str())
            .collect();
        assert_eq!(
            names,
            [
                "schema_discovery",
                "feature_analysis",
                "query_builder",
                "compliance_checker",
                "health_check",
                "help"
            ]
        );
    }
}
