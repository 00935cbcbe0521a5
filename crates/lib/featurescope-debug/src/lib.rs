//! HTTP debug surface for featurescope.
//!
//! Mirrors `schema_discovery` and `feature_analysis` as JSON POST endpoints so
//! the tools can be exercised with curl. Domain errors are returned as values
//! with status 200; only panicked or timed-out handlers produce a 500.

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use featurescope_core::control::{
    FeatureAnalysisRequest,
    FeatureScopeControlPlane,
    SchemaDiscoveryRequest,
};
use featurescope_core::{ServerError, ServerResult};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info};

/// Configuration for the debug HTTP server.
#[derive(Debug, Clone)]
pub struct DebugServerConfig {
    pub addr: SocketAddr,
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
}

impl DebugServerConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            max_body_bytes: 1024 * 1024,
            request_timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub const fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

impl Default for DebugServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from((Ipv4Addr::LOCALHOST, 8000)))
    }
}

/// HTTP debug server wrapper.
pub struct DebugServer {
    config: DebugServerConfig,
    control: FeatureScopeControlPlane,
}

impl DebugServer {
    #[must_use]
    pub const fn new(control: FeatureScopeControlPlane, config: DebugServerConfig) -> Self {
        Self { config, control }
    }

    /// Runs the HTTP server until shutdown.
    ///
    /// # Errors
    /// Returns any listener or server error.
    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.config.addr;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let app = router(self.control, &self.config);

        info!("featurescope-debug listening on {addr}");
        axum::serve(listener, app).await?;
        Ok(())
    }
}

#[derive(Clone)]
struct AppState {
    control: FeatureScopeControlPlane,
    request_timeout: Duration,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    debug_mode: bool,
}

/// Domain failure reported with status 200.
#[derive(Debug, Serialize)]
struct ErrorValue {
    error: String,
    code: &'static str,
    details: Map<String, Value>,
    #[serde(flatten)]
    context: Map<String, Value>,
}

impl ErrorValue {
    fn new(err: &ServerError, context: Map<String, Value>) -> Self {
        Self {
            error: err.to_string(),
            code: err.code(),
            details: err.details(),
            context,
        }
    }
}

#[derive(Debug, Serialize)]
struct FailureResponse {
    detail: String,
}

/// Handler failure that never reached a tool outcome.
#[derive(Debug)]
struct HandlerFailure(String);

impl IntoResponse for HandlerFailure {
    fn into_response(self) -> Response {
        let payload = Json(FailureResponse { detail: self.0 });
        (StatusCode::INTERNAL_SERVER_ERROR, payload).into_response()
    }
}

/// Builds the debug router over a control plane.
#[must_use]
pub fn router(control: FeatureScopeControlPlane, config: &DebugServerConfig) -> Router {
    let state = AppState {
        control,
        request_timeout: config.request_timeout,
    };
    Router::new()
        .route("/health", get(health))
        .route("/schema_discovery", post(schema_discovery))
        .route("/feature_analysis", post(feature_analysis))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        debug_mode: true,
    })
}

async fn schema_discovery(
    State(state): State<AppState>,
    Json(request): Json<SchemaDiscoveryRequest>,
) -> Result<Response, HandlerFailure> {
    let mut context = Map::new();
    context.insert("org_id".to_string(), Value::from(request.org_id.as_str()));
    context.insert("operation".to_string(), Value::from(request.operation.as_str()));

    let control = state.control.clone();
    let outcome = run_bounded(state.request_timeout, async move {
        control.schema_discovery(request).await
    })
    .await?;
    Ok(respond(outcome, context))
}

async fn feature_analysis(
    State(state): State<AppState>,
    Json(request): Json<FeatureAnalysisRequest>,
) -> Result<Response, HandlerFailure> {
    let mut context = Map::new();
    context.insert("org_id".to_string(), Value::from(request.org_id.as_str()));
    context.insert("use_case".to_string(), Value::from(request.use_case.as_str()));

    let control = state.control.clone();
    let outcome = run_bounded(state.request_timeout, async move {
        control.feature_analysis(request).await
    })
    .await?;
    Ok(respond(outcome, context))
}

/// Runs a tool on its own task so a panic is contained, and aborts it past `limit`.
async fn run_bounded<T, F>(limit: Duration, tool: F) -> Result<ServerResult<T>, HandlerFailure>
where
    T: Send + 'static,
    F: Future<Output = ServerResult<T>> + Send + 'static,
{
    let handle = tokio::spawn(tool);
    let abort = handle.abort_handle();
    match tokio::time::timeout(limit, handle).await {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(join_err)) => {
            error!("debug handler failed: {join_err}");
            Err(HandlerFailure(format!("handler failed: {join_err}")))
        }
        Err(_) => {
            abort.abort();
            error!(timeout_ms = limit.as_millis(), "debug handler timed out");
            Err(HandlerFailure("request timed out".to_string()))
        }
    }
}

fn respond<T: Serialize>(outcome: ServerResult<T>, context: Map<String, Value>) -> Response {
    match outcome {
        Ok(report) => Json(report).into_response(),
        Err(err) => Json(ErrorValue::new(&err, context)).into_response(),
    }
}
