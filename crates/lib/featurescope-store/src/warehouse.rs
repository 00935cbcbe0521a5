//! Result shapes returned by the analytics warehouse.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableStatistics {
    pub table_id: String,
    pub dataset_id: String,
    pub row_count: Option<u64>,
    pub size_bytes: Option<u64>,
    pub created: Option<String>,
    pub modified: Option<String>,
    pub schema: Vec<TableField>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DistributionBucket {
    pub value: Value,
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnDistribution {
    pub column: String,
    pub distribution: Vec<DistributionBucket>,
    pub unique_values: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LengthStats {
    pub min: Option<u64>,
    pub max: Option<u64>,
    pub avg: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityMetrics {
    pub completeness: f64,
    pub uniqueness: f64,
    pub null_count: u64,
    pub null_percentage: f64,
    pub unique_count: u64,
    pub length_stats: LengthStats,
}

/// Quality result for one column. A failed column records its error instead
/// of failing the whole request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ColumnQuality {
    Measured(QualityMetrics),
    Failed { error: String },
}

impl ColumnQuality {
    #[must_use]
    pub const fn metrics(&self) -> Option<&QualityMetrics> {
        match self {
            Self::Measured(metrics) => Some(metrics),
            Self::Failed { .. } => None,
        }
    }
}

/// Pairwise correlations; `None` where the warehouse could not compute one.
pub type CorrelationMatrix = BTreeMap<String, BTreeMap<String, Option<f64>>>;

/// One result row keyed by column name.
pub type QueryRow = Map<String, Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_quality_serializes_as_error_object() {
        let failed = ColumnQuality::Failed {
            error: "column not found".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&failed).expect("quality encodes"),
            serde_json::json!({"error": "column not found"})
        );
        assert!(failed.metrics().is_none());
    }
}
