use std::collections::BTreeMap;

use featurescope_store::{QueryRow, Schema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info};

use super::analysis::UseCase;
use super::{FeatureScopeControlPlane, name_has_any, unknown_choice};
use crate::error::{ServerError, ServerResult};
use crate::integrations::warehouse::{quote_ident, quote_table};
use crate::integrations::require_org_id;

const DEFAULT_SAMPLE_SIZE: u64 = 10_000;
/// Row count the random sampling ratio is computed against.
const ASSUMED_TABLE_ROWS: u64 = 1_000_000;
const ASSUMED_SEGMENTS: u64 = 10;
const MAX_DEFAULT_FEATURES: usize = 20;
const GENERIC_DEFAULT_FEATURES: usize = 15;
const MAX_SAMPLE_ROWS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    FeatureExtraction,
    Aggregation,
    Sampling,
}

impl QueryType {
    /// # Errors
    /// Validation error on `query_type` for any other name.
    pub fn parse(value: &str) -> ServerResult<Self> {
        match value {
            "feature_extraction" => Ok(Self::FeatureExtraction),
            "aggregation" => Ok(Self::Aggregation),
            "sampling" => Ok(Self::Sampling),
            other => Err(unknown_choice("query_type", "query_type", other)),
        }
    }
}

fn default_query_type() -> String {
    "feature_extraction".to_string()
}

fn default_use_case() -> String {
    "collaborative_filtering".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryBuilderRequest {
    pub org_id: String,
    #[serde(default = "default_query_type")]
    pub query_type: String,
    #[serde(default = "default_use_case")]
    pub use_case: String,
    #[serde(default)]
    pub dataset_id: Option<String>,
    #[serde(default)]
    pub table_id: Option<String>,
    #[serde(default)]
    pub features: Option<Vec<String>>,
    /// Column to value (`=`), or to `{min, max}` for a range.
    #[serde(default)]
    pub filters: Option<Map<String, Value>>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub execute: bool,
}

impl QueryBuilderRequest {
    #[must_use]
    pub fn new(org_id: impl Into<String>, query_type: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            query_type: query_type.into(),
            use_case: default_use_case(),
            dataset_id: None,
            table_id: None,
            features: None,
            filters: None,
            limit: None,
            execute: false,
        }
    }

    #[must_use]
    pub fn with_use_case(mut self, use_case: impl Into<String>) -> Self {
        self.use_case = use_case.into();
        self
    }

    #[must_use]
    pub fn with_table(mut self, dataset_id: impl Into<String>, table_id: impl Into<String>) -> Self {
        self.dataset_id = Some(dataset_id.into());
        self.table_id = Some(table_id.into());
        self
    }

    #[must_use]
    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.features = Some(features);
        self
    }

    #[must_use]
    pub fn with_filters(mut self, filters: Map<String, Value>) -> Self {
        self.filters = Some(filters);
        self
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn with_execute(mut self, execute: bool) -> Self {
        self.execute = execute;
        self
    }

    fn requested_features(&self) -> Option<&[String]> {
        self.features.as_deref().filter(|features| !features.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FeatureExtractionQuery {
    pub use_case: String,
    pub query: String,
    pub features_requested: Vec<String>,
    pub features_included: Vec<String>,
    pub features_not_found: Vec<String>,
    pub filters_applied: Map<String, Value>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AggregationLevel {
    User,
    Custom,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AggregationQuery {
    pub use_case: String,
    pub query: String,
    pub aggregation_level: AggregationLevel,
    pub features_created: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SamplingQuery {
    pub sample_size: u64,
    pub sampling_strategies: BTreeMap<String, String>,
    pub recommended_strategy: String,
    pub features_included: Vec<String>,
    pub notes: Vec<String>,
}

impl SamplingQuery {
    #[must_use]
    pub fn recommended_query(&self) -> Option<&str> {
        self.sampling_strategies
            .get(&self.recommended_strategy)
            .map(String::as_str)
    }
}

/// Generated SQL, tagged by `query_type`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "query_type", rename_all = "snake_case")]
pub enum BuiltQuery {
    FeatureExtraction(FeatureExtractionQuery),
    Aggregation(AggregationQuery),
    Sampling(SamplingQuery),
}

impl BuiltQuery {
    /// The statement `execute` runs; sampling runs its recommended strategy.
    #[must_use]
    pub fn runnable_sql(&self) -> Option<&str> {
        match self {
            Self::FeatureExtraction(query) => Some(&query.query),
            Self::Aggregation(query) => Some(&query.query),
            Self::Sampling(query) => query.recommended_query(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExecutionResults {
    pub rows_returned: usize,
    pub sample_data: Vec<QueryRow>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueryBuilderReport {
    #[serde(flatten)]
    pub built: BuiltQuery,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_results: Option<ExecutionResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_error: Option<String>,
}

impl FeatureScopeControlPlane {
    /// Generates warehouse SQL for an ML dataset and optionally runs it.
    ///
    /// A failed execution is reported in `execution_error`, not as an error.
    ///
    /// # Errors
    /// Validation errors for an empty `org_id`, an unknown `query_type` or a
    /// missing dataset/table; catalog failures are propagated.
    pub async fn query_builder(&self, request: QueryBuilderRequest) -> ServerResult<QueryBuilderReport> {
        require_org_id(&request.org_id)?;
        let query_type = QueryType::parse(&request.query_type)?;
        let (Some(dataset_id), Some(table_id)) =
            (request.dataset_id.as_deref(), request.table_id.as_deref())
        else {
            return Err(ServerError::invalid_field(
                "dataset_id and table_id required for query generation",
                "dataset_id",
            ));
        };

        let schema = self.schema().get_schema(&request.org_id, false).await?;
        let table = quote_table(&self.settings().project, dataset_id, table_id);
        let use_case = UseCase::from_name(&request.use_case);
        info!(org_id = %request.org_id, query_type = %request.query_type, %table, "building query");

        let built = match query_type {
            QueryType::FeatureExtraction => {
                BuiltQuery::FeatureExtraction(feature_extraction(&request, &schema, use_case, &table))
            }
            QueryType::Aggregation => BuiltQuery::Aggregation(aggregation(&request, use_case, &table)),
            QueryType::Sampling => BuiltQuery::Sampling(sampling(&request, &schema, &table)),
        };

        let mut report = QueryBuilderReport {
            built,
            execution_results: None,
            execution_error: None,
        };
        if request.execute
            && let Some(sql) = report.built.runnable_sql()
        {
            match self.warehouse().run_custom_query(sql).await {
                Ok(rows) => {
                    report.execution_results = Some(ExecutionResults {
                        rows_returned: rows.len(),
                        sample_data: rows.into_iter().take(MAX_SAMPLE_ROWS).collect(),
                    });
                }
                Err(err) => {
                    error!(org_id = %request.org_id, "query execution failed: {err}");
                    report.execution_error = Some(err.to_string());
                }
            }
        }
        Ok(report)
    }
}

/// Renders a scalar JSON value as a SQL literal; other shapes have none.
fn sql_literal(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'"))),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(if *flag { "TRUE" } else { "FALSE" }.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn where_conditions(filters: &Map<String, Value>) -> Vec<String> {
    let mut conditions = Vec::new();
    for (field, value) in filters {
        let column = quote_ident(field);
        if let Value::Object(range) = value {
            if let Some(min) = range.get("min").and_then(sql_literal) {
                conditions.push(format!("{column} >= {min}"));
            }
            if let Some(max) = range.get("max").and_then(sql_literal) {
                conditions.push(format!("{column} <= {max}"));
            }
        } else if let Some(literal) = sql_literal(value) {
            conditions.push(format!("{column} = {literal}"));
        }
    }
    conditions
}

fn select_list(columns: &[String]) -> String {
    if columns.is_empty() {
        return "*".to_string();
    }
    columns
        .iter()
        .map(|column| quote_ident(column))
        .collect::<Vec<_>>()
        .join(",\n    ")
}

fn default_features(schema: &Schema, use_case: UseCase) -> Vec<String> {
    let terms: &[&str] = match use_case {
        UseCase::CollaborativeFiltering => &["user", "product", "item", "purchase", "rating", "view"],
        UseCase::ChurnPrediction => &["user", "event", "activity", "engagement", "last", "count"],
        UseCase::Segmentation | UseCase::Generic => {
            return schema
                .raw_attributes
                .iter()
                .take(GENERIC_DEFAULT_FEATURES)
                .map(|attribute| attribute.name.clone())
                .collect();
        }
    };
    schema
        .raw_attributes
        .iter()
        .filter(|attribute| name_has_any(&attribute.name, terms))
        .take(MAX_DEFAULT_FEATURES)
        .map(|attribute| attribute.name.clone())
        .collect()
}

fn feature_extraction(
    request: &QueryBuilderRequest,
    schema: &Schema,
    use_case: UseCase,
    table: &str,
) -> FeatureExtractionQuery {
    let requested = request
        .requested_features()
        .map_or_else(|| default_features(schema, use_case), <[String]>::to_vec);
    let (included, not_found): (Vec<String>, Vec<String>) = requested
        .iter()
        .cloned()
        .partition(|feature| schema.attribute(feature).is_some());

    let filters = request.filters.clone().unwrap_or_default();
    let mut lines = vec![
        "SELECT".to_string(),
        format!("    {}", select_list(&included)),
        format!("FROM {table}"),
    ];
    let conditions = where_conditions(&filters);
    if !conditions.is_empty() {
        lines.push(format!("WHERE {}", conditions.join(" AND ")));
    }
    if let Some(limit) = request.limit.filter(|limit| *limit > 0) {
        lines.push(format!("LIMIT {limit}"));
    }

    FeatureExtractionQuery {
        use_case: request.use_case.clone(),
        query: lines.join("\n"),
        recommendations: query_recommendations(use_case, &included),
        features_requested: requested,
        features_included: included,
        features_not_found: not_found,
        filters_applied: filters,
    }
}

fn query_recommendations(use_case: UseCase, features: &[String]) -> Vec<String> {
    let any_named = |terms: &[&str]| features.iter().any(|name| name_has_any(name, terms));
    let mut recommendations = vec![
        "Consider adding appropriate indexes for better query performance".to_string(),
        "Use partitioning on timestamp columns if available".to_string(),
    ];
    match use_case {
        UseCase::CollaborativeFiltering => {
            if !any_named(&["user"]) {
                recommendations.push("Add user identifier column for collaborative filtering".to_string());
            }
            if !any_named(&["product", "item"]) {
                recommendations.push("Add item/product identifier column".to_string());
            }
        }
        UseCase::ChurnPrediction => {
            if !any_named(&["timestamp", "date"]) {
                recommendations.push("Add timestamp columns to calculate recency features".to_string());
            }
        }
        UseCase::Segmentation | UseCase::Generic => {}
    }
    recommendations.push("Filter out records with null values in key columns".to_string());
    recommendations.push("Consider data validation before model training".to_string());
    recommendations
}

fn aggregation(request: &QueryBuilderRequest, use_case: UseCase, table: &str) -> AggregationQuery {
    let (query, level, created): (String, AggregationLevel, &[&str]) = match use_case {
        UseCase::CollaborativeFiltering => (
            format!(
                "WITH user_item_stats AS (
    SELECT
        user_id,
        COUNT(DISTINCT product_id) as products_interacted,
        COUNT(*) as total_interactions,
        AVG(CASE WHEN event_type = 'purchase' THEN 1 ELSE 0 END) as purchase_rate,
        MAX(event_timestamp) as last_interaction
    FROM {table}
    GROUP BY user_id
),
item_stats AS (
    SELECT
        product_id,
        COUNT(DISTINCT user_id) as unique_users,
        COUNT(*) as total_interactions,
        AVG(CASE WHEN event_type = 'purchase' THEN purchase_amount ELSE 0 END) as avg_purchase_amount
    FROM {table}
    GROUP BY product_id
)
SELECT * FROM user_item_stats
UNION ALL
SELECT * FROM item_stats"
            ),
            AggregationLevel::User,
            &[
                "products_interacted",
                "total_interactions",
                "purchase_rate",
                "last_interaction",
                "unique_users",
                "avg_purchase_amount",
            ],
        ),
        UseCase::ChurnPrediction => (
            format!(
                "SELECT
    user_id,
    COUNT(*) as total_events,
    COUNT(DISTINCT DATE(event_timestamp)) as active_days,
    DATE_DIFF(CURRENT_DATE(), MAX(DATE(event_timestamp)), DAY) as days_since_last_activity,
    AVG(session_duration) as avg_session_duration,
    SUM(purchase_amount) as total_purchase_amount,
    COUNT(DISTINCT product_id) as unique_products
FROM {table}
GROUP BY user_id"
            ),
            AggregationLevel::User,
            &[
                "total_events",
                "active_days",
                "days_since_last_activity",
                "avg_session_duration",
                "total_purchase_amount",
                "unique_products",
            ],
        ),
        UseCase::Segmentation | UseCase::Generic => {
            let group_by = quote_ident(
                request
                    .requested_features()
                    .and_then(<[String]>::first)
                    .map_or("user_id", String::as_str),
            );
            (
                format!(
                    "SELECT
    {group_by},
    COUNT(*) as count,
    MIN(event_timestamp) as first_seen,
    MAX(event_timestamp) as last_seen
FROM {table}
GROUP BY {group_by}"
                ),
                AggregationLevel::Custom,
                &["count", "first_seen", "last_seen"],
            )
        }
    };

    AggregationQuery {
        use_case: request.use_case.clone(),
        query,
        aggregation_level: level,
        features_created: created.iter().map(ToString::to_string).collect(),
    }
}

#[allow(clippy::cast_precision_loss)]
fn sampling(request: &QueryBuilderRequest, schema: &Schema, table: &str) -> SamplingQuery {
    let sample_size = request
        .limit
        .filter(|limit| *limit > 0)
        .unwrap_or(DEFAULT_SAMPLE_SIZE);
    let features = request.requested_features().map_or_else(
        || {
            schema
                .raw_attributes
                .iter()
                .take(MAX_DEFAULT_FEATURES)
                .map(|attribute| attribute.name.clone())
                .collect()
        },
        <[String]>::to_vec,
    );
    let select = select_list(&features);
    let ratio = sample_size as f64 / ASSUMED_TABLE_ROWS as f64;
    let per_segment = sample_size / ASSUMED_SEGMENTS;

    let mut strategies = BTreeMap::new();
    strategies.insert(
        "random_sample".to_string(),
        format!(
            "SELECT
    {select}
FROM {table}
WHERE RAND() < {ratio}
LIMIT {sample_size}"
        ),
    );
    strategies.insert(
        "stratified_sample".to_string(),
        format!(
            "WITH stratified AS (
    SELECT
        *,
        ROW_NUMBER() OVER (PARTITION BY user_segment ORDER BY RAND()) as rn
    FROM {table}
)
SELECT
    {select}
FROM stratified
WHERE rn <= {per_segment}"
        ),
    );
    strategies.insert(
        "time_based_sample".to_string(),
        format!(
            "SELECT
    {select}
FROM {table}
WHERE DATE(event_timestamp) >= DATE_SUB(CURRENT_DATE(), INTERVAL 30 DAY)
ORDER BY RAND()
LIMIT {sample_size}"
        ),
    );

    SamplingQuery {
        sample_size,
        sampling_strategies: strategies,
        recommended_strategy: "random_sample".to_string(),
        features_included: features,
        notes: vec![
            "Random sampling is fastest but may miss rare classes".to_string(),
            "Stratified sampling ensures balanced representation".to_string(),
            "Time-based sampling focuses on recent data".to_string(),
        ],
    }
}
