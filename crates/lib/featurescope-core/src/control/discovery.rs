use std::collections::BTreeMap;

use featurescope_store::{Attribute, Cardinality, ColumnMetadata, StoreKind};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{FeatureScopeControlPlane, required_list, required_text, unknown_choice};
use crate::error::{ServerError, ServerResult};
use crate::integrations::require_org_id;
use crate::schema::SchemaManager;

const SEARCH_PAGE_SIZE: usize = 50;

const COMPLIANCE_NOTES: [&str; 4] = [
    "Ensure GDPR compliance for EU users",
    "CCPA compliance required for California residents",
    "Consider data minimization principles",
    "Implement proper access controls",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryOperation {
    Overview,
    Store,
    Columns,
    Search,
    Pii,
}

impl DiscoveryOperation {
    /// # Errors
    /// Validation error on `operation` for any other name.
    pub fn parse(value: &str) -> ServerResult<Self> {
        match value {
            "overview" => Ok(Self::Overview),
            "store" => Ok(Self::Store),
            "columns" => Ok(Self::Columns),
            "search" => Ok(Self::Search),
            "pii" => Ok(Self::Pii),
            other => Err(unknown_choice("operation", "operation", other)),
        }
    }
}

fn default_operation() -> String {
    "overview".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDiscoveryRequest {
    pub org_id: String,
    #[serde(default = "default_operation")]
    pub operation: String,
    #[serde(default)]
    pub store_type: Option<String>,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub search_query: Option<String>,
    #[serde(default)]
    pub force_refresh: bool,
}

impl SchemaDiscoveryRequest {
    #[must_use]
    pub fn new(org_id: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            operation: operation.into(),
            store_type: None,
            columns: None,
            search_query: None,
            force_refresh: false,
        }
    }

    #[must_use]
    pub fn with_store_type(mut self, store_type: impl Into<String>) -> Self {
        self.store_type = Some(store_type.into());
        self
    }

    #[must_use]
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    #[must_use]
    pub fn with_search_query(mut self, query: impl Into<String>) -> Self {
        self.search_query = Some(query.into());
        self
    }

    #[must_use]
    pub const fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }
}

/// Catalog fields surfaced for a single column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnSummary {
    pub name: String,
    pub data_type: Option<String>,
    pub attribute_type: Option<String>,
    pub is_pii: bool,
}

impl From<&Attribute> for ColumnSummary {
    fn from(attribute: &Attribute) -> Self {
        Self {
            name: attribute.name.clone(),
            data_type: attribute.data_type.clone(),
            attribute_type: attribute.attribute_type.clone(),
            is_pii: attribute.is_raw_pii,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaOverview {
    pub org_id: String,
    pub total_columns: usize,
    pub store_distribution: BTreeMap<StoreKind, usize>,
    pub data_type_distribution: BTreeMap<String, usize>,
    pub stores: BTreeMap<StoreKind, usize>,
    pub refresh_performed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreListing {
    pub org_id: String,
    pub store_type: StoreKind,
    pub column_count: usize,
    pub columns: Vec<ColumnSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnDetail {
    #[serde(flatten)]
    pub column: ColumnSummary,
    /// Ratio-aware cardinality name, `UNKNOWN` when the metadata API had no entry.
    pub cardinality: String,
    pub metadata: Option<ColumnMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnDetails {
    pub org_id: String,
    pub requested_columns: Vec<String>,
    pub found_columns: Vec<ColumnDetail>,
    pub missing_columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResults {
    pub org_id: String,
    pub search_query: String,
    pub total_results: usize,
    pub results_by_store: BTreeMap<StoreKind, Vec<ColumnSummary>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarkedPiiColumn {
    pub name: String,
    pub data_type: Option<String>,
    pub attribute_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarkedPii {
    pub count: usize,
    pub columns: Vec<MarkedPiiColumn>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetectedPii {
    pub high_sensitivity: Vec<String>,
    pub medium_sensitivity: Vec<String>,
    pub low_sensitivity: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PiiOverview {
    pub org_id: String,
    pub marked_pii: MarkedPii,
    pub detected_pii: DetectedPii,
    pub compliance_notes: Vec<String>,
}

/// Result of one `schema_discovery` call; the shape depends on the operation.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum DiscoveryReport {
    Overview(SchemaOverview),
    Store(StoreListing),
    Columns(ColumnDetails),
    Search(SearchResults),
    Pii(PiiOverview),
}

impl FeatureScopeControlPlane {
    /// Runs one schema discovery operation.
    ///
    /// # Errors
    /// Validation errors for an empty `org_id`, an unknown operation, a missing
    /// operation argument or an unknown store; collaborator failures are propagated.
    pub async fn schema_discovery(
        &self,
        request: SchemaDiscoveryRequest,
    ) -> ServerResult<DiscoveryReport> {
        require_org_id(&request.org_id)?;
        let operation = DiscoveryOperation::parse(&request.operation)?;
        info!(org_id = %request.org_id, operation = %request.operation, "schema discovery");

        match operation {
            DiscoveryOperation::Overview => self
                .schema_overview(&request.org_id, request.force_refresh)
                .await
                .map(DiscoveryReport::Overview),
            DiscoveryOperation::Store => {
                let store_type = required_text(
                    request.store_type.as_deref(),
                    "store_type required for store operation",
                    "store_type",
                )?;
                self.store_listing(&request.org_id, store_type, request.force_refresh)
                    .await
                    .map(DiscoveryReport::Store)
            }
            DiscoveryOperation::Columns => {
                let columns = required_list(
                    request.columns.as_deref(),
                    "columns required for columns operation",
                    "columns",
                )?;
                self.column_details(&request.org_id, columns)
                    .await
                    .map(DiscoveryReport::Columns)
            }
            DiscoveryOperation::Search => {
                let query = required_text(
                    request.search_query.as_deref(),
                    "search_query required for search operation",
                    "search_query",
                )?;
                self.search_columns(&request.org_id, query)
                    .await
                    .map(DiscoveryReport::Search)
            }
            DiscoveryOperation::Pii => self
                .pii_overview(&request.org_id, request.force_refresh)
                .await
                .map(DiscoveryReport::Pii),
        }
    }

    async fn schema_overview(&self, org_id: &str, force_refresh: bool) -> ServerResult<SchemaOverview> {
        let schema = self.schema().get_schema(org_id, force_refresh).await?;
        let summary = SchemaManager::get_schema_summary(&schema);
        Ok(SchemaOverview {
            org_id: org_id.to_string(),
            total_columns: summary.total_columns,
            stores: summary.by_store.clone(),
            store_distribution: summary.by_store,
            data_type_distribution: summary.by_data_type,
            refresh_performed: force_refresh,
        })
    }

    async fn store_listing(
        &self,
        org_id: &str,
        store_type: &str,
        force_refresh: bool,
    ) -> ServerResult<StoreListing> {
        let schema = self.schema().get_schema(org_id, force_refresh).await?;
        let store = StoreKind::parse(store_type).ok_or_else(|| {
            ServerError::invalid_value(
                format!("Invalid store_type: {store_type}"),
                "store_type",
                store_type,
            )
        })?;
        let columns: Vec<ColumnSummary> = schema.store(store).iter().map(ColumnSummary::from).collect();
        Ok(StoreListing {
            org_id: org_id.to_string(),
            store_type: store,
            column_count: columns.len(),
            columns,
        })
    }

    async fn column_details(&self, org_id: &str, columns: &[String]) -> ServerResult<ColumnDetails> {
        let schema = self.schema().get_schema(org_id, false).await?;
        let (found, missing): (Vec<&String>, Vec<&String>) = columns
            .iter()
            .partition(|name| schema.attribute(name).is_some());
        let found_names: Vec<String> = found.into_iter().cloned().collect();

        let (mut metadata, cardinality) = if found_names.is_empty() {
            (BTreeMap::new(), BTreeMap::new())
        } else {
            let metadata = self.schema().get_column_metadata(org_id, &found_names).await?;
            let cardinality = self
                .schema()
                .metadata()
                .analyze_cardinality(org_id, &found_names)
                .await?;
            (metadata, cardinality)
        };

        let found_columns = found_names
            .iter()
            .filter_map(|name| schema.attribute(name))
            .map(|attribute| ColumnDetail {
                column: ColumnSummary::from(attribute),
                cardinality: cardinality
                    .get(&attribute.name)
                    .copied()
                    .map_or("UNKNOWN", Cardinality::as_str)
                    .to_string(),
                metadata: metadata.remove(&attribute.name),
            })
            .collect();

        Ok(ColumnDetails {
            org_id: org_id.to_string(),
            requested_columns: columns.to_vec(),
            found_columns,
            missing_columns: missing.into_iter().cloned().collect(),
        })
    }

    async fn search_columns(&self, org_id: &str, query: &str) -> ServerResult<SearchResults> {
        let results = self
            .schema()
            .catalog()
            .search_attributes(org_id, query, None, SEARCH_PAGE_SIZE)
            .await?;

        let mut results_by_store: BTreeMap<StoreKind, Vec<ColumnSummary>> = BTreeMap::new();
        for attribute in &results {
            results_by_store
                .entry(SchemaManager::determine_store(attribute))
                .or_default()
                .push(ColumnSummary::from(attribute));
        }

        Ok(SearchResults {
            org_id: org_id.to_string(),
            search_query: query.to_string(),
            total_results: results.len(),
            results_by_store,
        })
    }

    async fn pii_overview(&self, org_id: &str, force_refresh: bool) -> ServerResult<PiiOverview> {
        let schema = self.schema().get_schema(org_id, force_refresh).await?;
        let marked = self.schema().catalog().get_pii_attributes(org_id).await?;
        let detected = SchemaManager::detect_pii_columns(&schema);

        Ok(PiiOverview {
            org_id: org_id.to_string(),
            marked_pii: MarkedPii {
                count: marked.len(),
                columns: marked
                    .into_iter()
                    .map(|attribute| MarkedPiiColumn {
                        name: attribute.name,
                        data_type: attribute.data_type,
                        attribute_type: attribute.attribute_type,
                    })
                    .collect(),
            },
            detected_pii: DetectedPii {
                high_sensitivity: detected.high,
                medium_sensitivity: detected.medium,
                low_sensitivity: detected.low,
            },
            compliance_notes: COMPLIANCE_NOTES.iter().map(ToString::to_string).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::testing::mock_control;

    #[tokio::test]
    async fn overview_counts_add_up() {
        let control = mock_control();
        let report = control
            .schema_discovery(SchemaDiscoveryRequest::new("acme", "overview"))
            .await
            .unwrap();

        let DiscoveryReport::Overview(overview) = report else {
            panic!("expected an overview");
        };
        assert_eq!(overview.total_columns, 22);
        assert_eq!(overview.stores.values().sum::<usize>(), 22);
        assert_eq!(overview.stores.len(), 4);
        assert!(!overview.refresh_performed);
    }

    #[tokio::test]
    async fn store_operation_validates_its_argument() {
        let control = mock_control();

        let err = control
            .schema_discovery(SchemaDiscoveryRequest::new("acme", "store"))
            .await
            .unwrap_err();
        assert_eq!(err.details()["field"], "store_type");

        let err = control
            .schema_discovery(SchemaDiscoveryRequest::new("acme", "store").with_store_type("warehouse"))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Invalid store_type: warehouse");

        let report = control
            .schema_discovery(
                SchemaDiscoveryRequest::new("acme", "store").with_store_type("consent_store"),
            )
            .await
            .unwrap();
        let DiscoveryReport::Store(listing) = report else {
            panic!("expected a store listing");
        };
        assert_eq!(listing.column_count, listing.columns.len());
        assert!(listing.columns.iter().any(|column| column.name == "gdpr_consent"));
    }

    #[tokio::test]
    async fn columns_split_found_and_missing() {
        let control = mock_control();
        let request = SchemaDiscoveryRequest::new("acme", "columns")
            .with_columns(vec!["user_id".to_string(), "nope".to_string()]);

        let DiscoveryReport::Columns(details) = control.schema_discovery(request).await.unwrap()
        else {
            panic!("expected column details");
        };
        assert_eq!(details.missing_columns, vec!["nope".to_string()]);
        assert_eq!(details.found_columns.len(), 1);
        let user_id = &details.found_columns[0];
        assert_eq!(user_id.cardinality, "VERY_HIGH");
        assert!(user_id.metadata.is_some());
    }

    #[tokio::test]
    async fn search_groups_by_store() {
        let control = mock_control();
        let request = SchemaDiscoveryRequest::new("acme", "search").with_search_query("consent");

        let DiscoveryReport::Search(results) = control.schema_discovery(request).await.unwrap()
        else {
            panic!("expected search results");
        };
        assert_eq!(results.total_results, 3);
        assert_eq!(results.results_by_store[&StoreKind::Consent].len(), 2);
        // `timestamp` is an event keyword and event rules are checked first.
        assert_eq!(results.results_by_store[&StoreKind::Event][0].name, "consent_timestamp");
    }

    #[tokio::test]
    async fn pii_lists_marked_and_detected_columns() {
        let control = mock_control();
        let DiscoveryReport::Pii(pii) = control
            .schema_discovery(SchemaDiscoveryRequest::new("acme", "pii"))
            .await
            .unwrap()
        else {
            panic!("expected a pii overview");
        };
        assert_eq!(pii.marked_pii.count, 2);
        assert!(pii.detected_pii.high_sensitivity.contains(&"email".to_string()));
        assert!(pii.detected_pii.low_sensitivity.contains(&"country".to_string()));
        assert_eq!(pii.compliance_notes.len(), 4);
    }

    #[tokio::test]
    async fn unknown_operation_and_empty_org_are_rejected() {
        let control = mock_control();

        let err = control
            .schema_discovery(SchemaDiscoveryRequest::new("acme", "drop"))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Unknown operation: drop");

        let err = control
            .schema_discovery(SchemaDiscoveryRequest::new("", "overview"))
            .await
            .unwrap_err();
        assert_eq!(err.details()["field"], "org_id");
    }
}
