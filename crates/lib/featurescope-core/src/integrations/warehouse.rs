//! Warehouse client over the BigQuery v2 REST API (`jobs.query` and `tables.get`).

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::DateTime;
use featurescope_store::round_to;
use featurescope_store::{
    ColumnDistribution,
    ColumnQuality,
    CorrelationMatrix,
    DistributionBucket,
    LengthStats,
    QualityMetrics,
    QueryRow,
    TableField,
    TableStatistics,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info};

use super::http::{HttpClient, HttpSettings};
use super::{Collaborator, Warehouse, require_correlation_columns};
use crate::error::{ServerError, ServerResult};

/// Project coordinates of the warehouse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseSettings {
    pub api_url: String,
    pub project: String,
    pub location: String,
    pub dataset: String,
}

impl Default for WarehouseSettings {
    fn default() -> Self {
        Self {
            api_url: "https://bigquery.googleapis.com/bigquery/v2".to_string(),
            project: "zeotap-dev-datascience".to_string(),
            location: "europe-west1".to_string(),
            dataset: "schema_statistics".to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    #[serde(default)]
    schema: Option<ResultSchema>,
    #[serde(default)]
    rows: Vec<ResultRow>,
}

#[derive(Deserialize)]
struct ResultSchema {
    #[serde(default)]
    fields: Vec<TableField>,
}

#[derive(Deserialize)]
struct ResultRow {
    #[serde(default)]
    f: Vec<ResultCell>,
}

#[derive(Deserialize)]
struct ResultCell {
    #[serde(default)]
    v: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableResource {
    #[serde(default)]
    num_rows: Option<String>,
    #[serde(default)]
    num_bytes: Option<String>,
    #[serde(default)]
    creation_time: Option<String>,
    #[serde(default)]
    last_modified_time: Option<String>,
    #[serde(default)]
    schema: Option<ResultSchema>,
}

pub struct BigQueryWarehouse {
    http: HttpClient,
    settings: WarehouseSettings,
}

impl BigQueryWarehouse {
    #[must_use]
    pub fn new(settings: WarehouseSettings, http: HttpSettings) -> Self {
        Self {
            http: HttpClient::new(http),
            settings,
        }
    }

    fn table_ref(&self, dataset_id: &str, table_id: &str) -> String {
        format!("{}.{dataset_id}.{table_id}", self.settings.project)
    }

    fn table_endpoint(&self, dataset_id: &str, table_id: &str) -> String {
        format!("bigquery://{}", self.table_ref(dataset_id, table_id))
    }

    async fn query(&self, sql: &str) -> ServerResult<Vec<QueryRow>> {
        let url = format!(
            "{}/projects/{}/queries",
            self.settings.api_url.trim_end_matches('/'),
            self.settings.project
        );
        let body = json!({
            "query": sql,
            "useLegacySql": false,
            "location": self.settings.location,
        });
        let response: QueryResponse = self.http.post_json(&url, &body).await?;
        if !response.job_complete {
            return Err(ServerError::api_at(
                "Query did not complete before the request deadline",
                None,
                url,
            ));
        }
        let fields = response.schema.map(|schema| schema.fields).unwrap_or_default();
        Ok(response
            .rows
            .into_iter()
            .map(|row| decode_row(&fields, row))
            .collect())
    }

    async fn query_at(&self, sql: &str, endpoint: &str, context: &str) -> ServerResult<Vec<QueryRow>> {
        self.query(sql).await.map_err(|err| match err {
            ServerError::Api { message, status, .. } => ServerError::Api {
                message: format!("{context}: {message}"),
                status,
                endpoint: Some(endpoint.to_string()),
            },
            other => other,
        })
    }
}

/// Quotes an identifier for standard SQL. Backslashes and backticks are
/// escaped so the name cannot close the quote early.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
}

/// Quotes `project.dataset.table` as a single path identifier.
pub(crate) fn quote_table(project: &str, dataset_id: &str, table_id: &str) -> String {
    quote_ident(&format!("{project}.{dataset_id}.{table_id}"))
}

fn decode_row(fields: &[TableField], row: ResultRow) -> QueryRow {
    fields
        .iter()
        .zip(row.f)
        .map(|(field, cell)| (field.name.clone(), decode_cell(&field.field_type, cell.v)))
        .collect()
}

/// Converts a cell from its REST string encoding into a typed JSON value.
fn decode_cell(field_type: &str, value: Value) -> Value {
    let Value::String(text) = value else {
        return value;
    };
    match field_type {
        "INTEGER" | "INT64" => text.parse::<i64>().map_or(Value::String(text), Value::from),
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => {
            text.parse::<f64>().map_or(Value::String(text), Value::from)
        }
        "BOOLEAN" | "BOOL" => match text.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(text),
        },
        _ => Value::String(text),
    }
}

fn millis_to_rfc3339(millis: Option<&str>) -> Option<String> {
    let millis = millis?.parse::<i64>().ok()?;
    DateTime::from_timestamp_millis(millis).map(|time| time.to_rfc3339())
}

fn as_u64(row: &QueryRow, key: &str) -> Option<u64> {
    row.get(key).and_then(Value::as_u64)
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round_to(part as f64 / whole as f64 * 100.0, 2)
    }
}

fn quality_from_row(row: &QueryRow) -> QualityMetrics {
    let total_rows = as_u64(row, "total_rows").filter(|total| *total > 0).unwrap_or(1);
    let non_null = as_u64(row, "non_null_count").unwrap_or(0);
    let unique_count = as_u64(row, "unique_count").unwrap_or(0);
    let null_count = total_rows.saturating_sub(non_null);
    QualityMetrics {
        completeness: percent(non_null, total_rows),
        uniqueness: percent(unique_count, non_null),
        null_count,
        null_percentage: percent(null_count, total_rows),
        unique_count,
        length_stats: LengthStats {
            min: as_u64(row, "min_length"),
            max: as_u64(row, "max_length"),
            avg: row
                .get("avg_length")
                .and_then(Value::as_f64)
                .map(|avg| round_to(avg, 2)),
        },
    }
}

#[async_trait]
impl Collaborator for BigQueryWarehouse {
    fn name(&self) -> &'static str {
        "warehouse"
    }

    async fn connect(&self) -> ServerResult<()> {
        self.http.connect().await?;
        info!(project = %self.settings.project, "warehouse client ready");
        Ok(())
    }

    async fn disconnect(&self) {
        self.http.disconnect().await;
    }

    async fn health_check(&self) -> bool {
        match self.query("SELECT 1").await {
            Ok(_) => true,
            Err(err) => {
                error!("warehouse health check failed: {err}");
                false
            }
        }
    }
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn analyze_table_statistics(
        &self,
        dataset_id: &str,
        table_id: &str,
    ) -> ServerResult<TableStatistics> {
        let url = format!(
            "{}/projects/{}/datasets/{dataset_id}/tables/{table_id}",
            self.settings.api_url.trim_end_matches('/'),
            self.settings.project
        );
        let table: TableResource = self.http.get_json(&url).await.map_err(|err| match err {
            ServerError::Api { message, status, .. } => ServerError::Api {
                message: format!(
                    "Failed to analyze table {}: {message}",
                    self.table_ref(dataset_id, table_id)
                ),
                status,
                endpoint: Some(self.table_endpoint(dataset_id, table_id)),
            },
            other => other,
        })?;

        Ok(TableStatistics {
            table_id: table_id.to_string(),
            dataset_id: dataset_id.to_string(),
            row_count: table.num_rows.and_then(|rows| rows.parse().ok()),
            size_bytes: table.num_bytes.and_then(|bytes| bytes.parse().ok()),
            created: millis_to_rfc3339(table.creation_time.as_deref()),
            modified: millis_to_rfc3339(table.last_modified_time.as_deref()),
            schema: table.schema.map(|schema| schema.fields).unwrap_or_default(),
        })
    }

    async fn get_column_distribution(
        &self,
        dataset_id: &str,
        table_id: &str,
        column: &str,
        limit: usize,
    ) -> ServerResult<ColumnDistribution> {
        let column_sql = quote_ident(column);
        let sql = format!(
            "SELECT {column_sql} AS value, COUNT(*) AS count, \
             ROUND(COUNT(*) * 100.0 / SUM(COUNT(*)) OVER(), 2) AS percentage \
             FROM {} GROUP BY {column_sql} ORDER BY count DESC LIMIT {limit}",
            quote_table(&self.settings.project, dataset_id, table_id)
        );
        let rows = self
            .query_at(
                &sql,
                &self.table_endpoint(dataset_id, table_id),
                &format!("Failed to get distribution for {column}"),
            )
            .await?;

        let distribution: Vec<DistributionBucket> = rows
            .into_iter()
            .map(|mut row| DistributionBucket {
                count: as_u64(&row, "count").unwrap_or(0),
                percentage: row.get("percentage").and_then(Value::as_f64).unwrap_or(0.0),
                value: row.remove("value").unwrap_or(Value::Null),
            })
            .collect();
        Ok(ColumnDistribution {
            column: column.to_string(),
            unique_values: distribution.len(),
            distribution,
        })
    }

    async fn calculate_correlation_matrix(
        &self,
        dataset_id: &str,
        table_id: &str,
        columns: &[String],
    ) -> ServerResult<CorrelationMatrix> {
        require_correlation_columns(columns)?;
        let table_sql = quote_table(&self.settings.project, dataset_id, table_id);

        let mut matrix = CorrelationMatrix::new();
        for left in columns {
            let mut row = BTreeMap::new();
            for right in columns {
                if left == right {
                    row.insert(right.clone(), Some(1.0));
                    continue;
                }
                let (left_sql, right_sql) = (quote_ident(left), quote_ident(right));
                let sql = format!(
                    "SELECT CORR({left_sql}, {right_sql}) AS correlation FROM {table_sql} \
                     WHERE {left_sql} IS NOT NULL AND {right_sql} IS NOT NULL"
                );
                let value = match self.query(&sql).await {
                    Ok(rows) => rows
                        .first()
                        .and_then(|first| first.get("correlation"))
                        .and_then(Value::as_f64)
                        .map(|value| round_to(value, 4)),
                    Err(err) => {
                        error!(left = %left, right = %right, "correlation query failed: {err}");
                        None
                    }
                };
                row.insert(right.clone(), value);
            }
            matrix.insert(left.clone(), row);
        }
        Ok(matrix)
    }

    async fn get_data_quality_metrics(
        &self,
        dataset_id: &str,
        table_id: &str,
        columns: &[String],
    ) -> ServerResult<BTreeMap<String, ColumnQuality>> {
        let table_sql = quote_table(&self.settings.project, dataset_id, table_id);
        let mut metrics = BTreeMap::new();
        for column in columns {
            let column_sql = quote_ident(column);
            let sql = format!(
                "SELECT COUNT(*) AS total_rows, COUNT({column_sql}) AS non_null_count, \
                 COUNT(DISTINCT {column_sql}) AS unique_count, \
                 MIN(LENGTH(CAST({column_sql} AS STRING))) AS min_length, \
                 MAX(LENGTH(CAST({column_sql} AS STRING))) AS max_length, \
                 AVG(LENGTH(CAST({column_sql} AS STRING))) AS avg_length \
                 FROM {table_sql}"
            );
            match self.query(&sql).await {
                Ok(rows) => {
                    if let Some(row) = rows.first() {
                        metrics.insert(column.clone(), ColumnQuality::Measured(quality_from_row(row)));
                    }
                }
                Err(err) => {
                    error!(column = %column, "quality query failed: {err}");
                    metrics.insert(
                        column.clone(),
                        ColumnQuality::Failed {
                            error: err.to_string(),
                        },
                    );
                }
            }
        }
        Ok(metrics)
    }

    async fn run_custom_query(&self, sql: &str) -> ServerResult<Vec<QueryRow>> {
        let rows = self
            .query_at(sql, "bigquery://custom_query", "Failed to execute query")
            .await?;
        info!(rows = rows.len(), "custom query returned");
        Ok(rows)
    }
}

impl Default for BigQueryWarehouse {
    fn default() -> Self {
        Self::new(WarehouseSettings::default(), HttpSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn field(name: &str, field_type: &str) -> TableField {
        TableField {
            name: name.to_string(),
            field_type: field_type.to_string(),
            mode: None,
            description: None,
        }
    }

    #[test]
    fn rows_decode_typed_cells() {
        let fields = vec![
            field("total_rows", "INTEGER"),
            field("avg_length", "FLOAT"),
            field("flag", "BOOLEAN"),
            field("name", "STRING"),
            field("missing", "INTEGER"),
        ];
        let row: ResultRow = serde_json::from_value(json!({
            "f": [{"v": "10"}, {"v": "4.5"}, {"v": "true"}, {"v": "ada"}, {"v": null}]
        }))
        .expect("row decodes");

        let decoded = decode_row(&fields, row);
        assert_eq!(decoded["total_rows"], 10);
        assert_eq!(decoded["avg_length"], 4.5);
        assert_eq!(decoded["flag"], true);
        assert_eq!(decoded["name"], "ada");
        assert_eq!(decoded["missing"], Value::Null);
    }

    #[test]
    fn quality_row_computes_percentages() {
        let mut row = Map::new();
        row.insert("total_rows".to_string(), json!(200));
        row.insert("non_null_count".to_string(), json!(150));
        row.insert("unique_count".to_string(), json!(30));
        row.insert("avg_length".to_string(), json!(7.456));

        let metrics = quality_from_row(&row);
        assert!((metrics.completeness - 75.0).abs() < f64::EPSILON);
        assert!((metrics.uniqueness - 20.0).abs() < f64::EPSILON);
        assert_eq!(metrics.null_count, 50);
        assert!((metrics.null_percentage - 25.0).abs() < f64::EPSILON);
        assert_eq!(metrics.length_stats.avg, Some(7.46));
        assert_eq!(metrics.length_stats.min, None);
    }

    #[test]
    fn identifiers_are_backtick_quoted() {
        assert_eq!(quote_ident("age"), "`age`");
        assert_eq!(quote_ident("a`b"), r"`a\`b`");
        // A trailing backslash must not escape the closing quote.
        assert_eq!(quote_ident("x\\"), r"`x\\`");
        assert_eq!(quote_table("proj", "ds`x", "t"), r"`proj.ds\`x.t`");
    }

    #[test]
    fn table_times_render_as_rfc3339() {
        assert_eq!(
            millis_to_rfc3339(Some("0")).as_deref(),
            Some("1970-01-01T00:00:00+00:00")
        );
        assert_eq!(millis_to_rfc3339(Some("soon")), None);
    }

    #[tokio::test]
    async fn correlation_requires_two_columns() {
        let warehouse = BigQueryWarehouse::default();
        let err = warehouse
            .calculate_correlation_matrix("d", "t", &["age".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.details()["field"], "numeric_columns");
    }
}
