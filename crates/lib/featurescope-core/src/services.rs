use std::sync::Arc;

use tracing::info;

use crate::cache::{CacheConfig, CacheManager};
use crate::control::{ApiMode, ControlSettings, FeatureScopeControlPlane};
use crate::error::ServerResult;
use crate::integrations::{
    BigQueryWarehouse,
    CatalogApi,
    CatalogClient,
    Collaborator,
    HttpSettings,
    MetadataApi,
    MetadataClient,
    MockCatalog,
    MockMetadata,
    MockWarehouse,
    Warehouse,
    WarehouseSettings,
};
use crate::schema::{CacheTtls, SchemaManager};

pub const DEFAULT_CATALOG_URL: &str =
    "https://unity.zeotap.com/canon/api/v2/orgs/{org_id}/catalog/_search";
pub const DEFAULT_METADATA_URL: &str =
    "https://unity.zeotap.com/datamanager/api/v2/catalog/column/metadata";

/// Everything needed to build the shared services once at startup.
#[derive(Clone)]
pub struct ServicesConfig {
    pub api_mode: ApiMode,
    pub catalog_url: String,
    pub metadata_url: String,
    pub http: HttpSettings,
    pub warehouse: WarehouseSettings,
    pub warehouse_http: HttpSettings,
    pub cache: CacheConfig,
    pub ttls: CacheTtls,
}

impl ServicesConfig {
    /// Live collaborators with default endpoints and a memory-only cache.
    #[must_use]
    pub fn live(http: HttpSettings) -> Self {
        Self {
            api_mode: ApiMode::Live,
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            metadata_url: DEFAULT_METADATA_URL.to_string(),
            warehouse_http: http.clone(),
            http,
            warehouse: WarehouseSettings::default(),
            cache: CacheConfig::memory_only(),
            ttls: CacheTtls::default(),
        }
    }

    /// Canned collaborators; no network access.
    #[must_use]
    pub fn mock() -> Self {
        Self {
            api_mode: ApiMode::Mock,
            ..Self::live(HttpSettings::default())
        }
    }

    #[must_use]
    pub fn with_endpoints(mut self, catalog_url: impl Into<String>, metadata_url: impl Into<String>) -> Self {
        self.catalog_url = catalog_url.into();
        self.metadata_url = metadata_url.into();
        self
    }

    #[must_use]
    pub fn with_warehouse(mut self, warehouse: WarehouseSettings, http: HttpSettings) -> Self {
        self.warehouse = warehouse;
        self.warehouse_http = http;
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub const fn with_ttls(mut self, ttls: CacheTtls) -> Self {
        self.ttls = ttls;
        self
    }
}

/// Shared service handles. Cloning is cheap; every clone sees the same cache.
#[derive(Clone)]
pub struct Services {
    cache: Arc<CacheManager>,
    catalog: Arc<dyn CatalogApi>,
    metadata: Arc<dyn MetadataApi>,
    warehouse: Arc<dyn Warehouse>,
    control: FeatureScopeControlPlane,
}

impl Services {
    /// Picks mock or live collaborators once and wires them together.
    #[must_use]
    pub fn new(config: ServicesConfig) -> Self {
        let (catalog, metadata, warehouse): (Arc<dyn CatalogApi>, Arc<dyn MetadataApi>, Arc<dyn Warehouse>) =
            match config.api_mode {
                ApiMode::Mock => (
                    Arc::new(MockCatalog),
                    Arc::new(MockMetadata),
                    Arc::new(MockWarehouse),
                ),
                ApiMode::Live => (
                    Arc::new(CatalogClient::new(config.catalog_url, config.http.clone())),
                    Arc::new(MetadataClient::new(config.metadata_url, config.http)),
                    Arc::new(BigQueryWarehouse::new(
                        config.warehouse.clone(),
                        config.warehouse_http,
                    )),
                ),
            };

        let cache = Arc::new(CacheManager::new(config.cache));
        let schema = Arc::new(SchemaManager::new(
            catalog.clone(),
            metadata.clone(),
            cache.clone(),
            config.ttls,
        ));
        let control = FeatureScopeControlPlane::new(
            schema,
            warehouse.clone(),
            ControlSettings {
                project: config.warehouse.project,
                api_mode: config.api_mode,
            },
        );

        Self {
            cache,
            catalog,
            metadata,
            warehouse,
            control,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    #[must_use]
    pub fn control(&self) -> FeatureScopeControlPlane {
        self.control.clone()
    }

    fn collaborators(&self) -> [&dyn Collaborator; 3] {
        [
            self.catalog.as_ref(),
            self.metadata.as_ref(),
            self.warehouse.as_ref(),
        ]
    }

    /// Opens the cache tiers and every collaborator. The cache never fails;
    /// the first collaborator failure is returned.
    ///
    /// # Errors
    /// Returns the collaborator's `ServerError`.
    pub async fn connect_all(&self) -> ServerResult<()> {
        self.cache.connect().await;
        for collaborator in self.collaborators() {
            collaborator.connect().await?;
            info!(collaborator = collaborator.name(), "collaborator ready");
        }
        Ok(())
    }

    pub async fn disconnect_all(&self) {
        for collaborator in self.collaborators() {
            collaborator.disconnect().await;
        }
        self.cache.disconnect().await;
        info!("services disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_services_share_one_cache() {
        let services = Services::new(ServicesConfig::mock());
        services.connect_all().await.unwrap();

        let control = services.control();
        control.schema().get_schema("acme", false).await.unwrap();
        assert_eq!(services.cache().get_cache_stats().memory_cache_size, 1);
        assert!(!services.cache().is_remote_connected());

        services.disconnect_all().await;
    }

    #[test]
    fn live_config_shares_http_settings_with_warehouse() {
        let http = HttpSettings {
            bearer_token: Some("token".to_string()),
            ..HttpSettings::default()
        };
        let config = ServicesConfig::live(http.clone());
        assert_eq!(config.warehouse_http, http);
        assert_eq!(config.api_mode, ApiMode::Live);
        assert!(config.catalog_url.contains("{org_id}"));
    }
}
