//! Transports for the featurescope tool server.
//!
//! Every MCP session gets its own `FeatureScopeMcp` handler, but all of them
//! clone the same `Services`, so sessions share one cache and one set of
//! collaborator connections.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use featurescope_core::services::Services;
use rmcp::serve_server;
use rmcp::transport::io::stdio;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig,
    StreamableHttpService,
    session::local::LocalSessionManager,
};
use tracing::info;

use crate::FeatureScopeMcp;

type ServeResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Listener settings for the `/mcp` endpoint.
#[derive(Debug, Clone)]
pub struct McpHttpServerConfig {
    pub addr: SocketAddr,
    /// Keep a session per client; tool calls themselves are stateless.
    pub stateful_mode: bool,
    pub sse_keep_alive: Option<Duration>,
    pub sse_retry: Option<Duration>,
}

impl McpHttpServerConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            stateful_mode: true,
            sse_keep_alive: Some(Duration::from_secs(15)),
            sse_retry: Some(Duration::from_secs(3)),
        }
    }
}

impl Default for McpHttpServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from((Ipv4Addr::LOCALHOST, 4020)))
    }
}

/// Runs one tool session on stdin/stdout and returns when the client hangs up.
/// Nothing else may write to stdout while this runs.
///
/// # Errors
/// Returns any transport or server error.
pub async fn serve_stdio(services: Services) -> ServeResult {
    let (stdin, stdout) = stdio();
    let running = serve_server(FeatureScopeMcp::new(services), (stdin, stdout)).await?;
    let _ = running.waiting().await?;
    Ok(())
}

/// Tool sessions under `/mcp`, plus a plain-text `/health` probe for load balancers.
#[must_use]
pub fn mcp_router(services: Services, config: &McpHttpServerConfig) -> Router {
    let sessions = Arc::new(LocalSessionManager::default());
    let transport = StreamableHttpServerConfig {
        sse_keep_alive: config.sse_keep_alive,
        sse_retry: config.sse_retry,
        stateful_mode: config.stateful_mode,
        ..Default::default()
    };
    let tools: StreamableHttpService<FeatureScopeMcp, LocalSessionManager> =
        StreamableHttpService::new(
            move || Ok(FeatureScopeMcp::new(services.clone())),
            sessions,
            transport,
        );

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest_service("/mcp", tools)
}

/// Binds `config.addr` and serves [`mcp_router`] until the task is dropped.
///
/// # Errors
/// Returns a bind failure or any server error.
pub async fn serve_streamable_http(services: Services, config: McpHttpServerConfig) -> ServeResult {
    let app = mcp_router(services, &config);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, "featurescope tools listening on /mcp");
    axum::serve(listener, app).await?;
    Ok(())
}
