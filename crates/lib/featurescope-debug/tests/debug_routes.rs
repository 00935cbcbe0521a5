use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use featurescope_core::ServerResult;
use featurescope_core::cache::{CacheConfig, CacheManager};
use featurescope_core::control::{ControlSettings, FeatureScopeControlPlane};
use featurescope_core::integrations::{
    CatalogApi,
    Collaborator,
    MockMetadata,
    MockWarehouse,
};
use featurescope_core::schema::{CacheTtls, SchemaManager};
use featurescope_core::services::{Services, ServicesConfig};
use featurescope_debug::{DebugServerConfig, router};
use featurescope_store::{Attribute, CatalogFilters, CatalogSchema};
use serde_json::{Value, json};
use tower::ServiceExt;

/// Catalog that never answers normally.
enum BrokenCatalog {
    Panics,
    Hangs,
}

#[async_trait]
impl Collaborator for BrokenCatalog {
    fn name(&self) -> &'static str {
        "broken_catalog"
    }

    async fn connect(&self) -> ServerResult<()> {
        Ok(())
    }

    async fn disconnect(&self) {}

    async fn health_check(&self) -> bool {
        false
    }
}

#[async_trait]
impl CatalogApi for BrokenCatalog {
    async fn get_catalog_schema(
        &self,
        _org_id: &str,
        _filters: Option<CatalogFilters>,
    ) -> ServerResult<CatalogSchema> {
        match self {
            Self::Panics => panic!("catalog exploded"),
            Self::Hangs => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                unreachable!("request should have timed out")
            }
        }
    }

    async fn search_attributes(
        &self,
        _org_id: &str,
        _query: &str,
        _filters: Option<CatalogFilters>,
        _size: usize,
    ) -> ServerResult<Vec<Attribute>> {
        Ok(Vec::new())
    }
}

fn mock_control() -> FeatureScopeControlPlane {
    Services::new(ServicesConfig::mock()).control()
}

fn broken_control(catalog: BrokenCatalog) -> FeatureScopeControlPlane {
    let schema = SchemaManager::new(
        Arc::new(catalog),
        Arc::new(MockMetadata),
        Arc::new(CacheManager::new(CacheConfig::memory_only())),
        CacheTtls::default(),
    );
    FeatureScopeControlPlane::new(
        Arc::new(schema),
        Arc::new(MockWarehouse),
        ControlSettings::default(),
    )
}

fn post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn health_reports_debug_mode() {
    let app = router(mock_control(), &DebugServerConfig::default());
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("valid request");

    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"status": "ok", "debug_mode": true})
    );
}

#[tokio::test]
async fn discovery_body_uses_tool_defaults() {
    let app = router(mock_control(), &DebugServerConfig::default());
    let response = app
        .oneshot(post("/schema_discovery", &json!({"org_id": "acme"})))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let overview = json_body(response).await;
    assert_eq!(overview["total_columns"], 22);
    assert_eq!(overview["org_id"], "acme");
}

#[tokio::test]
async fn domain_errors_are_values() {
    let app = router(mock_control(), &DebugServerConfig::default());
    let response = app
        .oneshot(post(
            "/schema_discovery",
            &json!({"org_id": "acme", "operation": "store"}),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let error = json_body(response).await;
    assert_eq!(error["code"], "VALIDATION_ERROR");
    assert_eq!(error["details"]["field"], "store_type");
    assert_eq!(error["operation"], "store");
}

#[tokio::test]
async fn feature_analysis_mirrors_tool() {
    let app = router(mock_control(), &DebugServerConfig::default());
    let response = app
        .oneshot(post(
            "/feature_analysis",
            &json!({"org_id": "acme", "use_case": "segmentation"}),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let report = json_body(response).await;
    assert_eq!(report["use_case"], "segmentation");
    assert!(report["features"].is_object());
}

#[tokio::test]
async fn panicking_handler_returns_500() {
    let app = router(
        broken_control(BrokenCatalog::Panics),
        &DebugServerConfig::default(),
    );
    let response = app
        .oneshot(post("/schema_discovery", &json!({"org_id": "acme"})))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let failure = json_body(response).await;
    assert!(failure["detail"].as_str().unwrap().starts_with("handler failed"));
}

#[tokio::test]
async fn slow_handler_times_out() {
    let config = DebugServerConfig::default().with_request_timeout(Duration::from_millis(50));
    let app = router(broken_control(BrokenCatalog::Hangs), &config);
    let response = app
        .oneshot(post("/feature_analysis", &json!({"org_id": "acme"})))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["detail"], "request timed out");
}
