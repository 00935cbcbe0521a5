//! Control plane behind the MCP tools.
//!
//! Each tool is an inherent method on [`FeatureScopeControlPlane`], grouped by
//! file. Methods return typed reports; errors stay [`ServerError`] values so the
//! transport layer decides how to surface them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ServerError, ServerResult};
use crate::integrations::Warehouse;
use crate::schema::SchemaManager;

pub mod analysis;
pub mod compliance;
pub mod discovery;
pub mod health;
pub mod query;

pub use analysis::{FeatureAnalysisReport, FeatureAnalysisRequest};
pub use compliance::{ComplianceReport, ComplianceRequest};
pub use discovery::{DiscoveryReport, SchemaDiscoveryRequest};
pub use health::HealthReport;
pub use query::{QueryBuilderReport, QueryBuilderRequest};

/// Which collaborator implementations the services were built with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApiMode {
    Mock,
    Live,
}

impl ApiMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Live => "live",
        }
    }
}

/// Settings the tools read at call time.
#[derive(Debug, Clone)]
pub struct ControlSettings {
    /// Warehouse project used to qualify generated table references.
    pub project: String,
    pub api_mode: ApiMode,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            project: "zeotap-dev-datascience".to_string(),
            api_mode: ApiMode::Mock,
        }
    }
}

#[derive(Clone)]
pub struct FeatureScopeControlPlane {
    schema: Arc<SchemaManager>,
    warehouse: Arc<dyn Warehouse>,
    settings: ControlSettings,
}

impl FeatureScopeControlPlane {
    #[must_use]
    pub fn new(
        schema: Arc<SchemaManager>,
        warehouse: Arc<dyn Warehouse>,
        settings: ControlSettings,
    ) -> Self {
        Self {
            schema,
            warehouse,
            settings,
        }
    }

    #[must_use]
    pub fn schema(&self) -> &SchemaManager {
        &self.schema
    }

    #[must_use]
    pub fn warehouse(&self) -> &Arc<dyn Warehouse> {
        &self.warehouse
    }

    #[must_use]
    pub const fn settings(&self) -> &ControlSettings {
        &self.settings
    }
}

/// Validation error for an enumerated argument outside its accepted values.
pub(crate) fn unknown_choice(kind: &str, field: &str, value: &str) -> ServerError {
    ServerError::invalid_value(format!("Unknown {kind}: {value}"), field, Value::from(value))
}

/// Returns the text argument if present and non-blank, else a validation error naming it.
pub(crate) fn required_text<'a>(
    value: Option<&'a str>,
    message: &str,
    field: &str,
) -> ServerResult<&'a str> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ServerError::invalid_field(message, field)),
    }
}

/// Returns the list argument if present and non-empty.
pub(crate) fn required_list<'a>(
    value: Option<&'a [String]>,
    message: &str,
    field: &str,
) -> ServerResult<&'a [String]> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ServerError::invalid_field(message, field)),
    }
}

/// Lower-cased name contains any of `terms`.
pub(crate) fn name_has_any(name: &str, terms: &[&str]) -> bool {
    let name = name.to_lowercase();
    terms.iter().any(|term| name.contains(term))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use super::{ControlSettings, FeatureScopeControlPlane};
    use crate::cache::{CacheConfig, CacheManager};
    use crate::integrations::{MockCatalog, MockMetadata, MockWarehouse};
    use crate::schema::{CacheTtls, SchemaManager};

    pub(crate) fn mock_control() -> FeatureScopeControlPlane {
        let cache = Arc::new(CacheManager::new(CacheConfig::memory_only()));
        let schema = SchemaManager::new(
            Arc::new(MockCatalog),
            Arc::new(MockMetadata),
            cache,
            CacheTtls::default(),
        );
        FeatureScopeControlPlane::new(
            Arc::new(schema),
            Arc::new(MockWarehouse),
            ControlSettings::default(),
        )
    }
}
