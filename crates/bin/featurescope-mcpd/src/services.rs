use featurescope_core::cache::{CacheConfig, RedisTier};
use featurescope_core::integrations::HttpSettings;
use featurescope_core::services::{Services, ServicesConfig};

use crate::config::FeatureScopeConfig;

pub fn services_config(config: &FeatureScopeConfig) -> ServicesConfig {
    let http = HttpSettings {
        bearer_token: config.bearer_token.clone(),
        timeout: config.api_timeout,
        retry: config.retry,
    };
    let warehouse_http = HttpSettings {
        bearer_token: config.warehouse_token.clone(),
        ..http.clone()
    };

    let mut cache = CacheConfig::memory_only();
    if let Some(redis) = &config.redis {
        cache = cache.with_remote(RedisTier::connector(redis.clone()));
    }

    let base = if config.use_mock_api {
        ServicesConfig::mock()
    } else {
        ServicesConfig::live(http)
    };
    base.with_endpoints(&config.catalog_api_url, &config.metadata_api_url)
        .with_warehouse(config.warehouse.clone(), warehouse_http)
        .with_cache(cache)
        .with_ttls(config.ttls)
}

pub fn build_services(config: &FeatureScopeConfig) -> Services {
    Services::new(services_config(config))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use featurescope_core::control::ApiMode;

    use super::*;
    use crate::config::tests::mock_config;

    #[test]
    fn mock_flag_selects_mock_collaborators() {
        let config = mock_config();
        let services = services_config(&config);
        assert_eq!(services.api_mode, ApiMode::Mock);
        assert_eq!(services.warehouse.project, "zeotap-dev-datascience");
    }

    #[test]
    fn warehouse_gets_its_own_token() {
        let mut config = mock_config();
        config.use_mock_api = false;
        config.bearer_token = Some("catalog".to_string());
        config.warehouse_token = Some("warehouse".to_string());
        config.api_timeout = Duration::from_secs(5);

        let services = services_config(&config);
        assert_eq!(services.api_mode, ApiMode::Live);
        assert_eq!(services.http.bearer_token.as_deref(), Some("catalog"));
        assert_eq!(services.warehouse_http.bearer_token.as_deref(), Some("warehouse"));
        assert_eq!(services.warehouse_http.timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn mock_services_connect_without_network() {
        let services = build_services(&mock_config());
        services.connect_all().await.expect("mock collaborators connect");
        assert!(!services.cache().is_remote_connected());
        services.disconnect_all().await;
    }
}
