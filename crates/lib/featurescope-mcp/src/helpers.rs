use featurescope_core::{ServerError, ServerResult};
use rmcp::ErrorData;
use rmcp::model::{CallToolResult, Content};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::error;

/// Identifying arguments echoed into an error body.
pub(crate) type ErrorContext = Vec<(&'static str, Value)>;

/// Turns a control-plane outcome into a tool result. Domain errors become an
/// error-flagged result; only JSON encoding failures surface as `ErrorData`.
pub(crate) fn tool_result<T: Serialize>(
    tool: &'static str,
    outcome: ServerResult<T>,
    context: ErrorContext,
) -> Result<CallToolResult, ErrorData> {
    match outcome {
        Ok(report) => Ok(CallToolResult::success(vec![Content::json(report)?])),
        Err(err) => {
            error!(tool, code = err.code(), "tool failed: {err}");
            Ok(CallToolResult::error(vec![Content::json(error_body(&err, context))?]))
        }
    }
}

pub(crate) fn error_body(err: &ServerError, context: ErrorContext) -> Value {
    let mut body = Map::new();
    body.insert("error".to_string(), Value::from(err.to_string()));
    body.insert("code".to_string(), Value::from(err.code()));
    body.insert("details".to_string(), Value::Object(err.details()));
    for (key, value) in context {
        body.entry(key).or_insert(value);
    }
    Value::Object(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_keeps_code_details_and_context() {
        let err = ServerError::invalid_value("Unknown operation: drop", "operation", "drop");
        let body = error_body(
            &err,
            vec![
                ("org_id", Value::from("acme")),
                ("operation", Value::from("drop")),
                ("error", Value::from("shadowed")),
            ],
        );

        assert_eq!(body["error"], "Unknown operation: drop");
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["details"]["field"], "operation");
        assert_eq!(body["org_id"], "acme");
        assert_eq!(body["operation"], "drop");
    }

    #[test]
    fn failures_are_flagged_results() {
        let outcome: ServerResult<Value> = Err(ServerError::api("API request failed: down"));
        let result = tool_result("schema_discovery", outcome, Vec::new()).unwrap();
        assert_eq!(result.is_error, Some(true));
    }
}
