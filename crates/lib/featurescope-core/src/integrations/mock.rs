//! Deterministic stand-ins for the collaborators, used in mock mode and tests.
//!
//! Values derive from column names only, so repeated calls return identical data.

use std::collections::BTreeMap;

use async_trait::async_trait;
use featurescope_store::{
    Attribute,
    Cardinality,
    CatalogFilters,
    CatalogSchema,
    ColumnDistribution,
    ColumnQuality,
    CorrelationMatrix,
    DistributionBucket,
    LengthStats,
    QualityMetrics,
    QueryRow,
    RawColumnMetadata,
    TableField,
    TableStatistics,
    round_to,
};
use serde_json::{Value, json};

use super::{
    CatalogApi,
    Collaborator,
    MetadataApi,
    Warehouse,
    require_correlation_columns,
    require_org_id,
};
use crate::error::ServerResult;

/// `(name, data type, attribute type, raw PII)` of the canned retail catalog.
const MOCK_ATTRIBUTES: [(&str, &str, &str, bool); 22] = [
    ("user_id", "STRING", "IDENTITY", false),
    ("email", "STRING", "IDENTITY", true),
    ("phone_number", "STRING", "IDENTITY", true),
    ("age", "INTEGER", "DEMOGRAPHIC", false),
    ("gender", "STRING", "DEMOGRAPHIC", false),
    ("city", "STRING", "LOCATION", false),
    ("country", "STRING", "LOCATION", false),
    ("income_bracket", "STRING", "DEMOGRAPHIC", false),
    ("event_timestamp", "TIMESTAMP", "EVENT", false),
    ("event_type", "STRING", "EVENT", false),
    ("product_viewed", "STRING", "BEHAVIORAL", false),
    ("product_purchased", "STRING", "BEHAVIORAL", false),
    ("purchase_amount", "FLOAT", "BEHAVIORAL", false),
    ("session_duration", "INTEGER", "BEHAVIORAL", false),
    ("page_views", "INTEGER", "BEHAVIORAL", false),
    ("ltv_score", "FLOAT", "CALCULATED", false),
    ("churn_probability", "FLOAT", "CALCULATED", false),
    ("engagement_score", "FLOAT", "CALCULATED", false),
    ("preferred_category", "STRING", "CALCULATED", false),
    ("gdpr_consent", "BOOLEAN", "CONSENT", false),
    ("marketing_consent", "BOOLEAN", "CONSENT", false),
    ("consent_timestamp", "TIMESTAMP", "CONSENT", false),
];

/// Stable per-name seed for generated figures.
fn name_seed(name: &str) -> u32 {
    name.bytes()
        .fold(17_u32, |acc, byte| acc.wrapping_mul(31).wrapping_add(u32::from(byte)))
}

fn mock_attributes() -> Vec<Attribute> {
    MOCK_ATTRIBUTES
        .iter()
        .map(|(name, data_type, attribute_type, pii)| {
            Attribute::new(*name, Some(*data_type), Some(*attribute_type), *pii)
        })
        .collect()
}

fn matches_filters(attribute: &Attribute, filters: &CatalogFilters) -> bool {
    if let Some(wanted) = filters.get("attributeType").and_then(Value::as_str)
        && attribute.attribute_type.as_deref() != Some(wanted)
    {
        return false;
    }
    if let Some(wanted) = filters.get("isRawPII").and_then(Value::as_bool)
        && attribute.is_raw_pii != wanted
    {
        return false;
    }
    true
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MockCatalog;

#[async_trait]
impl Collaborator for MockCatalog {
    fn name(&self) -> &'static str {
        "catalog_api"
    }

    async fn connect(&self) -> ServerResult<()> {
        Ok(())
    }

    async fn disconnect(&self) {}

    async fn health_check(&self) -> bool {
        true
    }
}

#[async_trait]
impl CatalogApi for MockCatalog {
    async fn get_catalog_schema(
        &self,
        org_id: &str,
        filters: Option<CatalogFilters>,
    ) -> ServerResult<CatalogSchema> {
        require_org_id(org_id)?;
        let filters = filters.unwrap_or_default();
        let attributes: Vec<Attribute> = mock_attributes()
            .into_iter()
            .filter(|attribute| matches_filters(attribute, &filters))
            .collect();
        Ok(CatalogSchema {
            org_id: org_id.to_string(),
            total_count: u64::try_from(attributes.len()).unwrap_or(u64::MAX),
            attributes,
        })
    }

    async fn search_attributes(
        &self,
        org_id: &str,
        query: &str,
        filters: Option<CatalogFilters>,
        size: usize,
    ) -> ServerResult<Vec<Attribute>> {
        let query = query.to_lowercase();
        Ok(self
            .get_catalog_schema(org_id, filters)
            .await?
            .attributes
            .into_iter()
            .filter(|attribute| query.is_empty() || attribute.name.to_lowercase().contains(&query))
            .take(size)
            .collect())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MockMetadata;

/// Canned metadata for one column, chosen by the first matching name fragment.
#[allow(clippy::cast_precision_loss)]
fn mock_column_metadata(column: &str, sample_size: usize) -> RawColumnMetadata {
    let lower = column.to_lowercase();
    let (values, count): (Vec<Value>, u64) = if lower.contains("id") {
        (
            (1..=sample_size.min(1000)).map(|i| json!(format!("ID_{i:05}"))).collect(),
            100_000,
        )
    } else if lower.contains("email") {
        (
            (1..=sample_size.min(100))
                .map(|i| json!(format!("user{i}@example.com")))
                .collect(),
            50_000,
        )
    } else if lower.contains("age") {
        let values: Vec<Value> = (18..18 + sample_size.min(63)).map(|age| json!(age)).collect();
        let count = u64::try_from(values.len()).unwrap_or(0) * 1_000;
        (values, count)
    } else if lower.contains("gender") {
        (vec![json!("M"), json!("F"), json!("Other")], 100_000)
    } else if lower.contains("country") {
        (
            ["USA", "UK", "Canada", "Germany", "France", "Japan", "Australia"]
                .into_iter()
                .map(Value::from)
                .collect(),
            100_000,
        )
    } else if lower.contains("score") || lower.contains("amount") {
        let seed = name_seed(column) as usize;
        (
            (0..sample_size)
                .map(|i| json!(((seed + i * 7_919) % 10_000) as f64 / 100.0))
                .collect(),
            100_000,
        )
    } else if lower.contains("timestamp") {
        (
            (1..=sample_size.min(31))
                .map(|day| json!(format!("2024-01-{day:02}T12:00:00Z")))
                .collect(),
            100_000,
        )
    } else if lower.contains("consent") {
        (vec![json!(true), json!(false)], 100_000)
    } else {
        (
            (1..=sample_size.min(20))
                .map(|i| json!(format!("{column}_value_{i}")))
                .collect(),
            50_000,
        )
    };

    let null_count = count / 20;
    RawColumnMetadata {
        column: Some(column.to_string()),
        values: values.into_iter().take(sample_size).collect(),
        count,
        null_count,
        total_count: count + null_count,
    }
}

#[async_trait]
impl Collaborator for MockMetadata {
    fn name(&self) -> &'static str {
        "metadata_api"
    }

    async fn connect(&self) -> ServerResult<()> {
        Ok(())
    }

    async fn disconnect(&self) {}

    async fn health_check(&self) -> bool {
        true
    }
}

#[async_trait]
impl MetadataApi for MockMetadata {
    async fn get_column_metadata(
        &self,
        _org_id: &str,
        columns: &[String],
        sample_size: usize,
    ) -> ServerResult<Vec<RawColumnMetadata>> {
        Ok(columns
            .iter()
            .map(|column| mock_column_metadata(column, sample_size))
            .collect())
    }

    /// Name-based levels: identifiers are `VERY_HIGH`, enumerations `LOW`.
    async fn analyze_cardinality(
        &self,
        _org_id: &str,
        columns: &[String],
    ) -> ServerResult<BTreeMap<String, Cardinality>> {
        Ok(columns
            .iter()
            .map(|column| {
                let lower = column.to_lowercase();
                let level = if lower.contains("id") {
                    Cardinality::VeryHigh
                } else if ["gender", "country", "type", "consent"]
                    .iter()
                    .any(|fragment| lower.contains(fragment))
                {
                    Cardinality::Low
                } else {
                    Cardinality::High
                };
                (column.clone(), level)
            })
            .collect())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MockWarehouse;

const MOCK_TABLE_ROWS: u64 = 1_000_000;

#[allow(clippy::cast_precision_loss)]
fn with_percentages(buckets: Vec<(Value, u64)>) -> Vec<DistributionBucket> {
    let total: u64 = buckets.iter().map(|(_, count)| count).sum::<u64>().max(1);
    buckets
        .into_iter()
        .map(|(value, count)| DistributionBucket {
            value,
            count,
            percentage: round_to(count as f64 * 100.0 / total as f64, 2),
        })
        .collect()
}

#[async_trait]
impl Collaborator for MockWarehouse {
    fn name(&self) -> &'static str {
        "warehouse"
    }

    async fn connect(&self) -> ServerResult<()> {
        Ok(())
    }

    async fn disconnect(&self) {}

    async fn health_check(&self) -> bool {
        true
    }
}

#[async_trait]
impl Warehouse for MockWarehouse {
    async fn analyze_table_statistics(
        &self,
        dataset_id: &str,
        table_id: &str,
    ) -> ServerResult<TableStatistics> {
        let field = |name: &str, field_type: &str, mode: &str, description: &str| TableField {
            name: name.to_string(),
            field_type: field_type.to_string(),
            mode: Some(mode.to_string()),
            description: Some(description.to_string()),
        };
        Ok(TableStatistics {
            table_id: table_id.to_string(),
            dataset_id: dataset_id.to_string(),
            row_count: Some(MOCK_TABLE_ROWS),
            size_bytes: Some(100 * 1024 * 1024),
            created: Some("2024-01-01T00:00:00".to_string()),
            modified: Some("2024-01-15T12:00:00".to_string()),
            schema: vec![
                field("user_id", "STRING", "REQUIRED", "User identifier"),
                field("age", "INTEGER", "NULLABLE", "User age"),
                field("purchase_amount", "FLOAT", "NULLABLE", "Purchase amount"),
                field("created_at", "TIMESTAMP", "REQUIRED", "Record creation time"),
            ],
        })
    }

    async fn get_column_distribution(
        &self,
        _dataset_id: &str,
        _table_id: &str,
        column: &str,
        limit: usize,
    ) -> ServerResult<ColumnDistribution> {
        let lower = column.to_lowercase();
        let buckets: Vec<(Value, u64)> = if lower.contains("age") {
            (18_u64..65)
                .map(|age| (json!(age), 5_000 + (age * 7_919) % 15_000))
                .collect()
        } else if lower.contains("gender") {
            vec![
                (json!("M"), 450_000),
                (json!("F"), 480_000),
                (json!("Other"), 70_000),
            ]
        } else if lower.contains("country") {
            ["USA", "UK", "Canada", "Germany", "France"]
                .into_iter()
                .zip(0_u64..)
                .map(|(country, i)| (json!(country), 100_000 + (i * 37_000) % 200_000))
                .collect()
        } else {
            (0_u64..20)
                .take(limit)
                .map(|i| (json!(format!("Value_{i}")), 1_000 + (i * 2_459) % 49_000))
                .collect()
        };

        let distribution = with_percentages(buckets);
        let unique_values = distribution.len();
        Ok(ColumnDistribution {
            column: column.to_string(),
            distribution: distribution.into_iter().take(limit).collect(),
            unique_values,
        })
    }

    async fn calculate_correlation_matrix(
        &self,
        _dataset_id: &str,
        _table_id: &str,
        columns: &[String],
    ) -> ServerResult<CorrelationMatrix> {
        require_correlation_columns(columns)?;
        let pair = |left: &str, right: &str, a: &str, b: &str| {
            (left.contains(a) && right.contains(b)) || (left.contains(b) && right.contains(a))
        };

        let mut matrix = CorrelationMatrix::new();
        for left in columns {
            let row = columns
                .iter()
                .map(|right| {
                    let value = if left == right {
                        1.0
                    } else if pair(left.as_str(), right.as_str(), "age", "income") {
                        0.45
                    } else if pair(left.as_str(), right.as_str(), "purchase", "ltv") {
                        0.72
                    } else {
                        let seed = name_seed(left).wrapping_add(name_seed(right));
                        round_to((f64::from(seed % 41) - 20.0) / 100.0, 4)
                    };
                    (right.clone(), Some(value))
                })
                .collect();
            matrix.insert(left.clone(), row);
        }
        Ok(matrix)
    }

    async fn get_data_quality_metrics(
        &self,
        _dataset_id: &str,
        _table_id: &str,
        columns: &[String],
    ) -> ServerResult<BTreeMap<String, ColumnQuality>> {
        Ok(columns
            .iter()
            .map(|column| {
                let lower = column.to_lowercase();
                let seed = name_seed(column);
                let (completeness, uniqueness) = if lower.contains("id") {
                    (100.0, 99.9)
                } else if lower.contains("email") {
                    (95.0, 98.0)
                } else {
                    (
                        85.0 + f64::from(seed % 13),
                        10.0 + f64::from(seed % 81),
                    )
                };
                let null_percentage = round_to(100.0 - completeness, 2);
                let metrics = QualityMetrics {
                    completeness,
                    uniqueness,
                    null_count: percent_of_rows(null_percentage),
                    null_percentage,
                    unique_count: percent_of_rows(uniqueness),
                    length_stats: LengthStats {
                        min: Some(3 + u64::from(seed % 8)),
                        max: Some(20 + u64::from(seed % 31)),
                        avg: Some(10.0 + f64::from(seed % 1_500) / 100.0),
                    },
                };
                (column.clone(), ColumnQuality::Measured(metrics))
            })
            .collect())
    }

    async fn run_custom_query(&self, _sql: &str) -> ServerResult<Vec<QueryRow>> {
        let rows = [
            json!({"result": "Mock query executed successfully", "rows_returned": 10}),
            json!({"sample_data": {"col1": "value1", "col2": 123, "col3": 45.67}}),
        ];
        Ok(rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect())
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn percent_of_rows(percentage: f64) -> u64 {
    (MOCK_TABLE_ROWS as f64 * percentage / 100.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn catalog_returns_twenty_two_attributes_and_filters() {
        let catalog = MockCatalog;
        let schema = catalog.get_catalog_schema("acme", None).await.unwrap();
        assert_eq!(schema.total_count, 22);
        assert_eq!(schema.attributes.len(), 22);

        let pii = catalog.get_pii_attributes("acme").await.unwrap();
        let names: Vec<&str> = pii.iter().map(|attr| attr.name.as_str()).collect();
        assert_eq!(names, ["email", "phone_number"]);

        let consent = catalog.get_attributes_by_type("acme", "consent").await.unwrap();
        assert_eq!(consent.len(), 3);
    }

    #[tokio::test]
    async fn search_matches_names_case_insensitively() {
        let found = MockCatalog
            .search_attributes("acme", "CONSENT", None, 2)
            .await
            .unwrap();
        let names: Vec<&str> = found.iter().map(|attr| attr.name.as_str()).collect();
        assert_eq!(names, ["gdpr_consent", "marketing_consent"]);
    }

    #[tokio::test]
    async fn metadata_is_deterministic() {
        let columns = vec!["user_id".to_string(), "purchase_amount".to_string()];
        let first = MockMetadata.get_column_metadata("acme", &columns, 100).await.unwrap();
        let second = MockMetadata.get_column_metadata("acme", &columns, 100).await.unwrap();
        assert_eq!(first, second);

        assert_eq!(first[0].count, 100_000);
        assert_eq!(first[0].values.len(), 100);
        assert_eq!(first[0].null_count, 5_000);
        assert_eq!(first[0].total_count, 105_000);
    }

    #[tokio::test]
    async fn statistics_and_samples_use_metadata() {
        let columns = vec!["gender".to_string()];
        let stats = MockMetadata.get_column_statistics("acme", &columns).await.unwrap();
        assert_eq!(stats["gender"].unique_values, 3);
        assert!((stats["gender"].null_percentage - 4.76).abs() < f64::EPSILON);

        let samples = MockMetadata.get_sample_data("acme", &columns, 2).await.unwrap();
        assert_eq!(samples["gender"], vec![json!("M"), json!("F")]);
    }

    #[tokio::test]
    async fn correlation_matrix_is_symmetric_with_unit_diagonal() {
        let columns = vec!["age".to_string(), "income_bracket".to_string(), "ltv_score".to_string()];
        let matrix = MockWarehouse
            .calculate_correlation_matrix("d", "t", &columns)
            .await
            .unwrap();

        assert_eq!(matrix["age"]["age"], Some(1.0));
        assert_eq!(matrix["age"]["income_bracket"], Some(0.45));
        assert_eq!(matrix["ltv_score"]["age"], matrix["age"]["ltv_score"]);
    }

    #[tokio::test]
    async fn distribution_percentages_sum_to_about_one_hundred() {
        let distribution = MockWarehouse
            .get_column_distribution("d", "t", "gender", 10)
            .await
            .unwrap();
        let total: f64 = distribution.distribution.iter().map(|bucket| bucket.percentage).sum();
        assert!((total - 100.0).abs() < 0.1);
        assert_eq!(distribution.unique_values, 3);
    }
}
