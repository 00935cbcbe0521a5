use std::collections::BTreeMap;

use featurescope_store::schema::ratio_cardinality;
use featurescope_store::{Cardinality, ColumnQuality, CorrelationMatrix, Schema, StoreKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{FeatureScopeControlPlane, name_has_any};
use crate::error::ServerResult;
use crate::integrations::require_org_id;
use crate::schema::SchemaManager;

const MAX_RELEVANT_COLUMNS: usize = 100;
const MAX_ANALYZED_FEATURES: usize = 50;
const MAX_QUALITY_COLUMNS: usize = 20;
const MAX_CORRELATION_COLUMNS: usize = 10;
const FEATURE_SAMPLE_SIZE: usize = 100;
const NUMERIC_TYPES: [&str; 3] = ["INTEGER", "FLOAT", "NUMERIC"];

const READY_SCORE: u32 = 80;
const PARTIALLY_READY_SCORE: u32 = 60;

/// Use cases with their own column selection and readiness rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseCase {
    CollaborativeFiltering,
    ChurnPrediction,
    Segmentation,
    /// Any other name; gets a generic mix of columns.
    Generic,
}

impl UseCase {
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "collaborative_filtering" => Self::CollaborativeFiltering,
            "churn_prediction" => Self::ChurnPrediction,
            "segmentation" => Self::Segmentation,
            _ => Self::Generic,
        }
    }

    const fn stores(self) -> &'static [StoreKind] {
        match self {
            Self::CollaborativeFiltering => &[StoreKind::Profile, StoreKind::Event],
            Self::Segmentation => &[StoreKind::Profile, StoreKind::Calculated],
            Self::ChurnPrediction | Self::Generic => {
                &[StoreKind::Profile, StoreKind::Event, StoreKind::Calculated]
            }
        }
    }

    const fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::CollaborativeFiltering => &["user", "product", "item", "purchase", "view", "rating"],
            Self::ChurnPrediction => &["user", "engagement", "activity", "last", "churn", "ltv"],
            Self::Segmentation => &["age", "gender", "location", "income", "segment", "cluster"],
            Self::Generic => &[],
        }
    }

    /// Names of the columns worth analyzing for this use case, store by store.
    fn relevant_columns(self, schema: &Schema) -> Vec<String> {
        let keywords = self.keywords();
        self.stores()
            .iter()
            .flat_map(|store| schema.store(*store))
            .filter(|attribute| keywords.is_empty() || name_has_any(&attribute.name, keywords))
            .map(|attribute| attribute.name.clone())
            .take(MAX_RELEVANT_COLUMNS)
            .collect()
    }
}

fn default_use_case() -> String {
    "collaborative_filtering".to_string()
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureAnalysisRequest {
    pub org_id: String,
    #[serde(default = "default_use_case")]
    pub use_case: String,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub dataset_id: Option<String>,
    #[serde(default)]
    pub table_id: Option<String>,
    #[serde(default = "default_true")]
    pub include_statistics: bool,
    #[serde(default = "default_true")]
    pub include_quality: bool,
    #[serde(default)]
    pub include_correlations: bool,
}

impl FeatureAnalysisRequest {
    #[must_use]
    pub fn new(org_id: impl Into<String>, use_case: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            use_case: use_case.into(),
            columns: None,
            dataset_id: None,
            table_id: None,
            include_statistics: true,
            include_quality: true,
            include_correlations: false,
        }
    }

    #[must_use]
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    #[must_use]
    pub fn with_table(mut self, dataset_id: impl Into<String>, table_id: impl Into<String>) -> Self {
        self.dataset_id = Some(dataset_id.into());
        self.table_id = Some(table_id.into());
        self
    }

    #[must_use]
    pub const fn with_correlations(mut self, include: bool) -> Self {
        self.include_correlations = include;
        self
    }

    fn table(&self) -> Option<(&str, &str)> {
        Some((self.dataset_id.as_deref()?, self.table_id.as_deref()?))
    }
}

/// How a column would be treated as a model input.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MlFeatureType {
    Numerical,
    Binary,
    Categorical,
    Text,
    Temporal,
    Unknown,
}

impl MlFeatureType {
    /// Classifies by data type; strings split on cardinality.
    #[must_use]
    pub fn classify(data_type: &str, cardinality: Option<Cardinality>) -> Self {
        match (data_type, cardinality) {
            (data_type, _) if NUMERIC_TYPES.contains(&data_type) => Self::Numerical,
            ("BOOLEAN", _) => Self::Binary,
            ("STRING" | "VARCHAR", Some(Cardinality::Low)) => Self::Categorical,
            ("STRING" | "VARCHAR", Some(Cardinality::High | Cardinality::VeryHigh)) => Self::Text,
            ("TIMESTAMP" | "DATE" | "DATETIME", _) => Self::Temporal,
            _ => Self::Unknown,
        }
    }

    const fn suggestions(self) -> &'static [&'static str] {
        match self {
            Self::Numerical => &[
                "Consider normalization or standardization",
                "Check for outliers and handle appropriately",
                "Create buckets/bins for tree-based models",
            ],
            Self::Categorical => &[
                "Use one-hot encoding for low cardinality",
                "Consider target encoding for high cardinality",
                "Create interaction features with other categoricals",
            ],
            Self::Text => &[
                "Extract text features (length, word count)",
                "Use TF-IDF or word embeddings",
                "Consider topic modeling",
            ],
            Self::Temporal => &[
                "Extract date components (year, month, day, hour)",
                "Calculate time differences and intervals",
                "Create cyclical features for periodic patterns",
            ],
            Self::Binary | Self::Unknown => &[],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureStatistics {
    pub unique_values: usize,
    pub sample_values: Vec<Value>,
    pub cardinality: Cardinality,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureProfile {
    pub name: String,
    pub data_type: String,
    pub attribute_type: String,
    pub is_pii: bool,
    pub store: StoreKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<FeatureStatistics>,
    pub ml_feature_type: MlFeatureType,
    pub engineering_suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FeatureEntry {
    Analyzed(Box<FeatureProfile>),
    Missing { error: String },
}

impl FeatureEntry {
    #[must_use]
    pub fn profile(&self) -> Option<&FeatureProfile> {
        match self {
            Self::Analyzed(profile) => Some(profile.as_ref()),
            Self::Missing { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadinessStatus {
    Ready,
    PartiallyReady,
    NotReady,
}

impl ReadinessStatus {
    #[must_use]
    pub const fn from_score(score: u32) -> Self {
        if score >= READY_SCORE {
            Self::Ready
        } else if score >= PARTIALLY_READY_SCORE {
            Self::PartiallyReady
        } else {
            Self::NotReady
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadinessAssessment {
    pub score: u32,
    pub status: ReadinessStatus,
    pub strengths: Vec<String>,
    pub gaps: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureAnalysisReport {
    pub org_id: String,
    pub use_case: String,
    pub analyzed_columns: usize,
    pub features: BTreeMap<String, FeatureEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_quality: Option<BTreeMap<String, ColumnQuality>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlations: Option<CorrelationMatrix>,
    pub readiness_assessment: ReadinessAssessment,
}

impl FeatureScopeControlPlane {
    /// Profiles candidate features for an ML use case and scores readiness.
    ///
    /// # Errors
    /// Validation error for an empty `org_id`; catalog, metadata and warehouse
    /// failures are propagated.
    pub async fn feature_analysis(
        &self,
        request: FeatureAnalysisRequest,
    ) -> ServerResult<FeatureAnalysisReport> {
        require_org_id(&request.org_id)?;
        let org_id = request.org_id.as_str();
        let use_case = UseCase::from_name(&request.use_case);
        let schema = self.schema().get_schema(org_id, false).await?;

        let columns = match request.columns.as_deref() {
            Some(columns) if !columns.is_empty() => columns.to_vec(),
            _ => use_case.relevant_columns(&schema),
        };
        info!(org_id, use_case = %request.use_case, columns = columns.len(), "analyzing features");

        let mut features = BTreeMap::new();
        for column in columns.iter().take(MAX_ANALYZED_FEATURES) {
            let entry = self
                .analyze_feature(org_id, &schema, column, request.include_statistics)
                .await?;
            features.insert(column.clone(), entry);
        }

        let mut data_quality = None;
        let mut correlations = None;
        if let Some((dataset_id, table_id)) = request.table() {
            if request.include_quality {
                let quality_columns: Vec<String> =
                    columns.iter().take(MAX_QUALITY_COLUMNS).cloned().collect();
                data_quality = Some(
                    self.warehouse()
                        .get_data_quality_metrics(dataset_id, table_id, &quality_columns)
                        .await?,
                );
            }
            if request.include_correlations {
                let numeric: Vec<String> = features
                    .iter()
                    .filter_map(|(name, entry)| {
                        let profile = entry.profile()?;
                        NUMERIC_TYPES
                            .contains(&profile.data_type.as_str())
                            .then(|| name.clone())
                    })
                    .take(MAX_CORRELATION_COLUMNS)
                    .collect();
                if numeric.len() >= 2 {
                    correlations = Some(
                        self.warehouse()
                            .calculate_correlation_matrix(dataset_id, table_id, &numeric)
                            .await?,
                    );
                } else {
                    debug!(org_id, "fewer than two numeric features; skipping correlations");
                }
            }
        }

        let readiness_assessment = assess_readiness(use_case, &features, data_quality.as_ref());
        Ok(FeatureAnalysisReport {
            org_id: request.org_id.clone(),
            use_case: request.use_case.clone(),
            analyzed_columns: columns.len(),
            features,
            data_quality,
            correlations,
            readiness_assessment,
        })
    }

    async fn analyze_feature(
        &self,
        org_id: &str,
        schema: &Schema,
        column: &str,
        include_statistics: bool,
    ) -> ServerResult<FeatureEntry> {
        let Some(attribute) = schema.attribute(column) else {
            return Ok(FeatureEntry::Missing {
                error: "Column not found in schema".to_string(),
            });
        };

        let statistics = if include_statistics {
            let metadata = self
                .schema()
                .metadata()
                .get_column_metadata(org_id, &[column.to_string()], FEATURE_SAMPLE_SIZE)
                .await?;
            metadata.into_iter().next().map(|raw| {
                let unique = u64::try_from(raw.values.len()).unwrap_or(u64::MAX);
                FeatureStatistics {
                    unique_values: raw.values.len(),
                    cardinality: ratio_cardinality(unique, raw.count),
                    sample_values: raw.values.into_iter().take(5).collect(),
                }
            })
        } else {
            None
        };

        let data_type = attribute.data_type_or_unknown().to_string();
        let ml_feature_type = MlFeatureType::classify(
            &data_type,
            statistics.as_ref().map(|stats| stats.cardinality),
        );
        let mut engineering_suggestions: Vec<String> = ml_feature_type
            .suggestions()
            .iter()
            .map(ToString::to_string)
            .collect();
        if attribute.is_raw_pii {
            engineering_suggestions
                .push("Apply privacy-preserving techniques (hashing, anonymization)".to_string());
        }

        Ok(FeatureEntry::Analyzed(Box::new(FeatureProfile {
            name: column.to_string(),
            attribute_type: attribute.attribute_type_or_unknown().to_string(),
            is_pii: attribute.is_raw_pii,
            store: SchemaManager::determine_store(attribute),
            data_type,
            statistics,
            ml_feature_type,
            engineering_suggestions,
        })))
    }
}

/// Scores how ready the analyzed features are. Only collaborative filtering has
/// scoring rules; every use case gets the data quality checks.
#[allow(clippy::cast_precision_loss)]
fn assess_readiness(
    use_case: UseCase,
    features: &BTreeMap<String, FeatureEntry>,
    data_quality: Option<&BTreeMap<String, ColumnQuality>>,
) -> ReadinessAssessment {
    let mut readiness = ReadinessAssessment {
        score: 0,
        status: ReadinessStatus::NotReady,
        strengths: Vec::new(),
        gaps: Vec::new(),
        recommendations: Vec::new(),
    };

    if use_case == UseCase::CollaborativeFiltering {
        let any_named = |terms: &[&str]| features.keys().any(|name| name_has_any(name, terms));
        let checks = [
            (&["user"][..], 30, "User identifiers found", "No user identifiers found"),
            (
                &["product", "item"][..],
                30,
                "Item/product identifiers found",
                "No item/product identifiers found",
            ),
            (
                &["purchase", "view", "rating"][..],
                40,
                "User-item interactions found",
                "No user-item interaction data found",
            ),
        ];
        for (terms, points, strength, gap) in checks {
            if any_named(terms) {
                readiness.strengths.push(strength.to_string());
                readiness.score += points;
            } else {
                readiness.gaps.push(gap.to_string());
            }
        }
    }

    if let Some(quality) = data_quality {
        let scores: Vec<f64> = quality
            .values()
            .filter_map(|entry| entry.metrics().map(|metrics| metrics.completeness))
            .collect();
        if !scores.is_empty() {
            let average = scores.iter().sum::<f64>() / scores.len() as f64;
            if average >= 90.0 {
                readiness
                    .strengths
                    .push(format!("High data quality ({average:.1}% completeness)"));
            } else if average < 70.0 {
                readiness
                    .gaps
                    .push(format!("Low data quality ({average:.1}% completeness)"));
                readiness
                    .recommendations
                    .push("Improve data quality before model training".to_string());
            }
        }
    }

    readiness.status = ReadinessStatus::from_score(readiness.score);
    if readiness.status != ReadinessStatus::Ready {
        readiness.recommendations.extend(
            [
                "Identify and collect missing feature types",
                "Ensure sufficient data volume for training",
                "Validate data consistency across stores",
            ]
            .map(String::from),
        );
    }
    readiness
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::testing::mock_control;

    #[test]
    fn ml_feature_types_follow_data_type_and_cardinality() {
        assert_eq!(MlFeatureType::classify("FLOAT", None), MlFeatureType::Numerical);
        assert_eq!(MlFeatureType::classify("BOOLEAN", None), MlFeatureType::Binary);
        assert_eq!(
            MlFeatureType::classify("STRING", Some(Cardinality::Low)),
            MlFeatureType::Categorical
        );
        assert_eq!(
            MlFeatureType::classify("VARCHAR", Some(Cardinality::VeryHigh)),
            MlFeatureType::Text
        );
        assert_eq!(MlFeatureType::classify("STRING", None), MlFeatureType::Unknown);
        assert_eq!(MlFeatureType::classify("DATE", None), MlFeatureType::Temporal);
    }

    #[test]
    fn readiness_thresholds() {
        assert_eq!(ReadinessStatus::from_score(100), ReadinessStatus::Ready);
        assert_eq!(ReadinessStatus::from_score(80), ReadinessStatus::Ready);
        assert_eq!(ReadinessStatus::from_score(60), ReadinessStatus::PartiallyReady);
        assert_eq!(ReadinessStatus::from_score(59), ReadinessStatus::NotReady);
    }

    #[tokio::test]
    async fn collaborative_filtering_on_mock_catalog_is_ready() {
        let control = mock_control();
        let report = control
            .feature_analysis(FeatureAnalysisRequest::new("acme", "collaborative_filtering"))
            .await
            .unwrap();

        assert!(report.features.contains_key("user_id"));
        assert!(report.features.contains_key("product_purchased"));
        assert_eq!(report.readiness_assessment.score, 100);
        assert_eq!(report.readiness_assessment.status, ReadinessStatus::Ready);
        assert!(report.readiness_assessment.recommendations.is_empty());
        assert!(report.data_quality.is_none());
    }

    #[tokio::test]
    async fn explicit_columns_report_missing_entries() {
        let control = mock_control();
        let request = FeatureAnalysisRequest::new("acme", "segmentation")
            .with_columns(vec!["age".to_string(), "shoe_size".to_string(), "email".to_string()]);

        let report = control.feature_analysis(request).await.unwrap();
        assert_eq!(report.analyzed_columns, 3);
        assert!(matches!(report.features["shoe_size"], FeatureEntry::Missing { .. }));

        let age = report.features["age"].profile().unwrap();
        assert_eq!(age.ml_feature_type, MlFeatureType::Numerical);
        assert_eq!(age.store, StoreKind::Profile);
        assert_eq!(age.statistics.as_ref().unwrap().cardinality, Cardinality::Low);

        let email = report.features["email"].profile().unwrap();
        assert!(email.engineering_suggestions.iter().any(|s| s.contains("privacy")));
        assert_eq!(report.readiness_assessment.status, ReadinessStatus::NotReady);
        assert_eq!(report.readiness_assessment.recommendations.len(), 3);
    }

    #[tokio::test]
    async fn warehouse_sections_need_a_table() {
        let control = mock_control();
        let request = FeatureAnalysisRequest::new("acme", "churn_prediction")
            .with_columns(vec![
                "age".to_string(),
                "purchase_amount".to_string(),
                "ltv_score".to_string(),
                "gender".to_string(),
            ])
            .with_table("analytics", "users")
            .with_correlations(true);

        let report = control.feature_analysis(request).await.unwrap();
        assert_eq!(report.data_quality.as_ref().unwrap().len(), 4);
        let correlations = report.correlations.unwrap();
        assert_eq!(correlations.len(), 3);
        assert!(!correlations.contains_key("gender"));
        assert_eq!(correlations["purchase_amount"]["ltv_score"], Some(0.72));
    }
}
