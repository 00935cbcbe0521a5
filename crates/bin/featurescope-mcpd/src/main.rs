//! Daemon entry point for the featurescope MCP server.
//!
//! Loads configuration from flags and the environment, builds the shared
//! services, and serves MCP over stdio and/or streamable HTTP, plus the
//! optional debug HTTP surface.

mod config;
mod services;

use featurescope_core::services::Services;
use featurescope_debug::{DebugServer, DebugServerConfig};
use featurescope_mcp::server::{McpHttpServerConfig, serve_stdio, serve_streamable_http};
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::FeatureScopeConfig;
use crate::services::build_services;

type ServeResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> ServeResult {
    let config = FeatureScopeConfig::from_args()?;
    init_tracing(&config.log_level);

    let services = build_services(&config);
    services.connect_all().await?;
    info!(mock = config.use_mock_api, "featurescope services ready");

    let outcome = run(&config, &services).await;
    services.disconnect_all().await;
    outcome
}

/// Logs go to stderr; stdout belongs to the stdio transport.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(config: &FeatureScopeConfig, services: &Services) -> ServeResult {
    let mut servers: JoinSet<ServeResult> = JoinSet::new();
    if config.mcp_serve {
        let http_config = McpHttpServerConfig::new(config.mcp_http_addr);
        servers.spawn(serve_streamable_http(services.clone(), http_config));
    }
    if config.debug_serve {
        let debug_config = DebugServerConfig::new(config.debug_addr)
            .with_request_timeout(config.debug_timeout);
        let server = DebugServer::new(services.control(), debug_config);
        servers.spawn(server.serve());
    }

    let outcome = if config.enable_stdio {
        info!("serving mcp over stdio");
        serve_stdio(services.clone()).await
    } else {
        tokio::select! {
            finished = servers.join_next() => match finished {
                Some(Ok(result)) => result,
                Some(Err(join_err)) => Err(join_err.into()),
                None => Ok(()),
            },
            signal = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                signal.map_err(Into::into)
            }
        }
    };

    if let Err(err) = &outcome {
        error!("server stopped: {err}");
    }
    servers.shutdown().await;
    outcome
}
