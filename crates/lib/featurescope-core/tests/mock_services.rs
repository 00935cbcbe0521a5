use featurescope_core::ServerError;
use featurescope_core::control::discovery::DiscoveryReport;
use featurescope_core::control::query::BuiltQuery;
use featurescope_core::control::{
    ComplianceRequest,
    FeatureAnalysisRequest,
    FeatureScopeControlPlane,
    QueryBuilderRequest,
    SchemaDiscoveryRequest,
};
use featurescope_core::services::{Services, ServicesConfig};

async fn connected_services() -> Services {
    let services = Services::new(ServicesConfig::mock());
    services
        .connect_all()
        .await
        .unwrap_or_else(|err| panic!("mock services failed to connect: {err}"));
    services
}

fn control(services: &Services) -> FeatureScopeControlPlane {
    services.control()
}

#[tokio::test]
async fn overview_counts_every_column_once() {
    let services = connected_services().await;
    let report = control(&services)
        .schema_discovery(SchemaDiscoveryRequest::new("acme", "overview"))
        .await
        .expect("overview should succeed");

    let DiscoveryReport::Overview(overview) = report else {
        panic!("expected an overview report");
    };
    assert_eq!(overview.total_columns, 22);
    assert_eq!(overview.stores.values().sum::<usize>(), overview.total_columns);
    assert_eq!(
        overview.data_type_distribution.values().sum::<usize>(),
        overview.total_columns
    );
    assert!(!overview.refresh_performed);

    services.disconnect_all().await;
}

#[tokio::test]
async fn force_refresh_repopulates_the_cache() {
    let services = connected_services().await;
    let control = control(&services);

    control
        .schema_discovery(SchemaDiscoveryRequest::new("acme", "overview"))
        .await
        .expect("first overview");
    let refreshed = control
        .schema_discovery(SchemaDiscoveryRequest::new("acme", "overview").with_force_refresh(true))
        .await
        .expect("refreshed overview");

    let DiscoveryReport::Overview(overview) = refreshed else {
        panic!("expected an overview report");
    };
    assert!(overview.refresh_performed);
    assert_eq!(services.cache().get_cache_stats().memory_cache_size, 1);
}

#[tokio::test]
async fn tools_share_one_schema_fetch() {
    let services = connected_services().await;
    let control = control(&services);

    let (analysis, compliance) = tokio::join!(
        control.feature_analysis(FeatureAnalysisRequest::new("acme", "churn_prediction")),
        control.compliance_checker(ComplianceRequest::new("acme", "pii")),
    );
    let analysis = analysis.expect("feature analysis");
    let compliance = compliance.expect("compliance check");

    assert_eq!(analysis.org_id, "acme");
    assert!(analysis.analyzed_columns > 0);
    assert!(compliance.pii_compliance.is_some());
    assert!(compliance.consent_compliance.is_none());
    assert_eq!(services.cache().get_cache_stats().memory_cache_size, 1);
}

#[tokio::test]
async fn executed_query_reports_mock_rows() {
    let services = connected_services().await;
    let report = control(&services)
        .query_builder(
            QueryBuilderRequest::new("acme", "feature_extraction")
                .with_table("analytics", "users")
                .with_features(vec!["email".to_string(), "not_a_column".to_string()])
                .with_limit(25)
                .with_execute(true),
        )
        .await
        .expect("query builder");

    let BuiltQuery::FeatureExtraction(query) = &report.built else {
        panic!("expected a feature extraction query");
    };
    assert_eq!(query.features_included, vec!["email".to_string()]);
    assert_eq!(query.features_not_found, vec!["not_a_column".to_string()]);
    assert!(query.query.contains("`zeotap-dev-datascience.analytics.users`"));
    assert!(query.query.ends_with("LIMIT 25"));

    let results = report.execution_results.expect("mock execution results");
    assert_eq!(results.rows_returned, 2);
    assert!(report.execution_error.is_none());
}

#[tokio::test]
async fn empty_org_id_is_rejected_before_any_fetch() {
    let services = connected_services().await;
    let err = control(&services)
        .schema_discovery(SchemaDiscoveryRequest::new("  ", "overview"))
        .await
        .expect_err("blank org id must fail");

    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert!(matches!(err, ServerError::Validation { .. }));
    assert_eq!(err.details()["field"], "org_id");
    assert_eq!(services.cache().get_cache_stats().memory_cache_size, 0);
}
