use clap::{Parser, builder::BoolishValueParser};
use featurescope_core::cache::RedisSettings;
use featurescope_core::integrations::WarehouseSettings;
use featurescope_core::retry::RetryPolicy;
use featurescope_core::schema::CacheTtls;
use featurescope_core::services::{DEFAULT_CATALOG_URL, DEFAULT_METADATA_URL};
use std::error::Error;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_WAREHOUSE_API_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";
const DEFAULT_WAREHOUSE_PROJECT: &str = "zeotap-dev-datascience";
const DEFAULT_WAREHOUSE_LOCATION: &str = "europe-west1";
const DEFAULT_WAREHOUSE_DATASET: &str = "schema_statistics";
const DEFAULT_REDIS_HOST: &str = "localhost";
const DEFAULT_REDIS_PORT: u16 = 6379;
const DEFAULT_TTL_SHORT_SECS: u64 = 300;
const DEFAULT_TTL_MEDIUM_SECS: u64 = 3_600;
const DEFAULT_TTL_LONG_SECS: u64 = 7_200;
const DEFAULT_API_TIMEOUT_SECS: u64 = 30;
const DEFAULT_API_RETRY_COUNT: u32 = 3;
const DEFAULT_API_RETRY_DELAY_SECS: u64 = 1;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_MCP_HTTP_ADDR: &str = "127.0.0.1:4020";
const DEFAULT_DEBUG_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_DEBUG_TIMEOUT_SECS: u64 = 120;
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Parser, Debug)]
#[command(name = "featurescope-mcpd", version, about = "Featurescope MCP daemon.")]
#[allow(clippy::struct_excessive_bools)]
struct CliArgs {
    #[arg(long, env = "FEATURESCOPE_CATALOG_API_URL", default_value = DEFAULT_CATALOG_URL)]
    catalog_api_url: String,

    #[arg(long, env = "FEATURESCOPE_METADATA_API_URL", default_value = DEFAULT_METADATA_URL)]
    metadata_api_url: String,

    #[arg(long, env = "FEATURESCOPE_BEARER_TOKEN", hide_env_values = true)]
    bearer_token: Option<String>,

    #[arg(long, env = "FEATURESCOPE_WAREHOUSE_API_URL", default_value = DEFAULT_WAREHOUSE_API_URL)]
    warehouse_api_url: String,

    #[arg(long, env = "FEATURESCOPE_WAREHOUSE_PROJECT", default_value = DEFAULT_WAREHOUSE_PROJECT)]
    warehouse_project: String,

    #[arg(long, env = "FEATURESCOPE_WAREHOUSE_LOCATION", default_value = DEFAULT_WAREHOUSE_LOCATION)]
    warehouse_location: String,

    #[arg(long, env = "FEATURESCOPE_WAREHOUSE_DATASET", default_value = DEFAULT_WAREHOUSE_DATASET)]
    warehouse_dataset: String,

    #[arg(long, env = "FEATURESCOPE_WAREHOUSE_TOKEN", hide_env_values = true)]
    warehouse_token: Option<String>,

    #[arg(long, env = "FEATURESCOPE_REDIS_HOST", default_value = DEFAULT_REDIS_HOST)]
    redis_host: String,

    #[arg(long, env = "FEATURESCOPE_REDIS_PORT", default_value_t = DEFAULT_REDIS_PORT)]
    redis_port: u16,

    #[arg(long, env = "FEATURESCOPE_REDIS_DB", default_value_t = 0)]
    redis_db: i64,

    #[arg(long, env = "FEATURESCOPE_REDIS_PASSWORD", hide_env_values = true)]
    redis_password: Option<String>,

    #[arg(
        long,
        env = "FEATURESCOPE_REDIS_ENABLED",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    redis_enabled: bool,

    #[arg(long, env = "FEATURESCOPE_CACHE_TTL_SHORT", default_value_t = DEFAULT_TTL_SHORT_SECS)]
    cache_ttl_short: u64,

    #[arg(long, env = "FEATURESCOPE_CACHE_TTL_MEDIUM", default_value_t = DEFAULT_TTL_MEDIUM_SECS)]
    cache_ttl_medium: u64,

    #[arg(long, env = "FEATURESCOPE_CACHE_TTL_LONG", default_value_t = DEFAULT_TTL_LONG_SECS)]
    cache_ttl_long: u64,

    #[arg(long, env = "FEATURESCOPE_API_TIMEOUT_SECS", default_value_t = DEFAULT_API_TIMEOUT_SECS)]
    api_timeout_secs: u64,

    #[arg(long, env = "FEATURESCOPE_API_RETRY_COUNT", default_value_t = DEFAULT_API_RETRY_COUNT)]
    api_retry_count: u32,

    #[arg(
        long,
        env = "FEATURESCOPE_API_RETRY_DELAY_SECS",
        default_value_t = DEFAULT_API_RETRY_DELAY_SECS
    )]
    api_retry_delay_secs: u64,

    #[arg(
        long = "mock",
        env = "FEATURESCOPE_USE_MOCK_API",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    use_mock_api: bool,

    #[arg(long, env = "FEATURESCOPE_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,

    #[arg(
        long = "stdio",
        env = "FEATURESCOPE_ENABLE_STDIO",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    enable_stdio: bool,

    #[arg(
        long,
        env = "FEATURESCOPE_MCP_SERVE",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    mcp_serve: bool,

    #[arg(long, env = "FEATURESCOPE_MCP_HTTP_ADDR", default_value = DEFAULT_MCP_HTTP_ADDR)]
    mcp_http_addr: SocketAddr,

    #[arg(
        long,
        env = "FEATURESCOPE_DEBUG_SERVE",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    debug_serve: bool,

    #[arg(long, env = "FEATURESCOPE_DEBUG_ADDR", default_value = DEFAULT_DEBUG_ADDR)]
    debug_addr: SocketAddr,

    #[arg(
        long,
        env = "FEATURESCOPE_DEBUG_TIMEOUT_SECS",
        default_value_t = DEFAULT_DEBUG_TIMEOUT_SECS
    )]
    debug_timeout_secs: u64,
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct FeatureScopeConfig {
    pub catalog_api_url: String,
    pub metadata_api_url: String,
    pub bearer_token: Option<String>,
    pub warehouse: WarehouseSettings,
    pub warehouse_token: Option<String>,
    /// `None` when the remote cache tier is disabled.
    pub redis: Option<RedisSettings>,
    pub ttls: CacheTtls,
    pub api_timeout: Duration,
    pub retry: RetryPolicy,
    pub use_mock_api: bool,
    pub log_level: String,
    pub enable_stdio: bool,
    pub mcp_serve: bool,
    pub mcp_http_addr: SocketAddr,
    pub debug_serve: bool,
    pub debug_addr: SocketAddr,
    pub debug_timeout: Duration,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingSetting(&'static str),
    InvalidSetting { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSetting(name) => write!(f, "missing required setting: {name}"),
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
        }
    }
}

impl Error for ConfigError {}

impl FeatureScopeConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn require_url(name: &'static str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidSetting { name, value });
    }
    Ok(value)
}

impl TryFrom<CliArgs> for FeatureScopeConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let catalog_api_url = require_url("FEATURESCOPE_CATALOG_API_URL", args.catalog_api_url)?;
        if !catalog_api_url.contains("{org_id}") {
            return Err(ConfigError::InvalidSetting {
                name: "FEATURESCOPE_CATALOG_API_URL",
                value: catalog_api_url,
            });
        }
        let metadata_api_url = require_url("FEATURESCOPE_METADATA_API_URL", args.metadata_api_url)?;
        let warehouse_api_url =
            require_url("FEATURESCOPE_WAREHOUSE_API_URL", args.warehouse_api_url)?;

        let bearer_token = non_blank(args.bearer_token);
        if !args.use_mock_api && bearer_token.is_none() {
            return Err(ConfigError::MissingSetting("FEATURESCOPE_BEARER_TOKEN"));
        }

        if args.api_retry_count == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "FEATURESCOPE_API_RETRY_COUNT",
                value: args.api_retry_count.to_string(),
            });
        }

        let log_level = args.log_level.trim().to_lowercase();
        if !LOG_LEVELS.contains(&log_level.as_str()) {
            return Err(ConfigError::InvalidSetting {
                name: "FEATURESCOPE_LOG_LEVEL",
                value: args.log_level,
            });
        }

        if !(args.enable_stdio || args.mcp_serve || args.debug_serve) {
            return Err(ConfigError::InvalidSetting {
                name: "FEATURESCOPE_MCP_SERVE",
                value: "no transport enabled".to_string(),
            });
        }

        let redis = args.redis_enabled.then(|| RedisSettings {
            host: args.redis_host,
            port: args.redis_port,
            db: args.redis_db,
            password: non_blank(args.redis_password),
        });

        Ok(Self {
            catalog_api_url,
            metadata_api_url,
            warehouse_token: non_blank(args.warehouse_token).or_else(|| bearer_token.clone()),
            bearer_token,
            warehouse: WarehouseSettings {
                api_url: warehouse_api_url,
                project: args.warehouse_project,
                location: args.warehouse_location,
                dataset: args.warehouse_dataset,
            },
            redis,
            ttls: CacheTtls {
                short: Duration::from_secs(args.cache_ttl_short),
                medium: Duration::from_secs(args.cache_ttl_medium),
                long: Duration::from_secs(args.cache_ttl_long),
            },
            api_timeout: Duration::from_secs(args.api_timeout_secs),
            retry: RetryPolicy::new(
                args.api_retry_count,
                Duration::from_secs(args.api_retry_delay_secs),
            ),
            use_mock_api: args.use_mock_api,
            log_level,
            enable_stdio: args.enable_stdio,
            mcp_serve: args.mcp_serve,
            mcp_http_addr: args.mcp_http_addr,
            debug_serve: args.debug_serve,
            debug_addr: args.debug_addr,
            debug_timeout: Duration::from_secs(args.debug_timeout_secs),
        })
    }
}
