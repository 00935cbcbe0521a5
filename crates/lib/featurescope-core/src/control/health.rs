use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ApiMode, FeatureScopeControlPlane};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheHealth {
    pub connected: bool,
    pub memory_items: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentHealth {
    pub cache: CacheHealth,
    pub api_mode: ApiMode,
    /// Collaborator name to health check outcome.
    pub collaborators: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthReport {
    pub status: String,
    pub version: String,
    pub components: ComponentHealth,
}

impl FeatureScopeControlPlane {
    /// Reports cache tiers, API mode and collaborator reachability. The server
    /// itself answers `healthy` whenever it can run this.
    pub async fn health_check(&self) -> HealthReport {
        let stats = self.schema().cache().get_cache_stats();
        let catalog = self.schema().catalog();
        let metadata = self.schema().metadata();

        let (catalog_ok, metadata_ok, warehouse_ok) = futures::join!(
            catalog.health_check(),
            metadata.health_check(),
            self.warehouse().health_check(),
        );
        let collaborators = BTreeMap::from([
            (catalog.name().to_string(), catalog_ok),
            (metadata.name().to_string(), metadata_ok),
            (self.warehouse().name().to_string(), warehouse_ok),
        ]);

        HealthReport {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            components: ComponentHealth {
                cache: CacheHealth {
                    connected: stats.redis_connected,
                    memory_items: stats.memory_cache_size,
                },
                api_mode: self.settings().api_mode,
                collaborators,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::control::testing::mock_control;
    use crate::control::ApiMode;

    #[tokio::test]
    async fn mock_services_report_healthy() {
        let control = mock_control();
        let report = control.health_check().await;

        assert_eq!(report.status, "healthy");
        assert_eq!(report.components.api_mode, ApiMode::Mock);
        assert!(!report.components.cache.connected);
        assert_eq!(report.components.collaborators.len(), 3);
        assert!(report.components.collaborators.values().all(|healthy| *healthy));

        let encoded = serde_json::to_value(&report).unwrap();
        assert_eq!(encoded["components"]["api_mode"], "mock");
        assert_eq!(encoded["components"]["collaborators"]["catalog_api"], true);
    }
}
