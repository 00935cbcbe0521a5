//! External collaborators: the catalog API, the column metadata API and the
//! analytics warehouse. Each has a live implementation and a deterministic mock.

pub mod catalog;
pub mod http;
pub mod metadata;
pub mod mock;
pub mod warehouse;

use std::collections::BTreeMap;

use async_trait::async_trait;
use featurescope_store::schema::ratio_cardinality;
use featurescope_store::{
    Attribute,
    Cardinality,
    CatalogFilters,
    CatalogSchema,
    ColumnDistribution,
    ColumnQuality,
    ColumnStatistics,
    CorrelationMatrix,
    QueryRow,
    RawColumnMetadata,
    TableStatistics,
};
use serde_json::Value;

use crate::error::{ServerError, ServerResult};

pub use catalog::CatalogClient;
pub use http::{HttpClient, HttpSettings};
pub use metadata::MetadataClient;
pub use mock::{MockCatalog, MockMetadata, MockWarehouse};
pub use warehouse::{BigQueryWarehouse, WarehouseSettings};

/// Lifecycle shared by every collaborator. `connect` and `disconnect` are idempotent.
#[async_trait]
pub trait Collaborator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn connect(&self) -> ServerResult<()>;

    async fn disconnect(&self);

    async fn health_check(&self) -> bool;
}

#[async_trait]
pub trait CatalogApi: Collaborator {
    async fn get_catalog_schema(
        &self,
        org_id: &str,
        filters: Option<CatalogFilters>,
    ) -> ServerResult<CatalogSchema>;

    async fn search_attributes(
        &self,
        org_id: &str,
        query: &str,
        filters: Option<CatalogFilters>,
        size: usize,
    ) -> ServerResult<Vec<Attribute>>;

    async fn get_attributes_by_type(
        &self,
        org_id: &str,
        attribute_type: &str,
    ) -> ServerResult<Vec<Attribute>> {
        let mut filters = CatalogFilters::new();
        filters.insert(
            "attributeType".to_string(),
            Value::from(attribute_type.to_uppercase()),
        );
        Ok(self.get_catalog_schema(org_id, Some(filters)).await?.attributes)
    }

    async fn get_pii_attributes(&self, org_id: &str) -> ServerResult<Vec<Attribute>> {
        let mut filters = CatalogFilters::new();
        filters.insert("isRawPII".to_string(), Value::Bool(true));
        Ok(self.get_catalog_schema(org_id, Some(filters)).await?.attributes)
    }
}

#[async_trait]
pub trait MetadataApi: Collaborator {
    async fn get_column_metadata(
        &self,
        org_id: &str,
        columns: &[String],
        sample_size: usize,
    ) -> ServerResult<Vec<RawColumnMetadata>>;

    async fn get_column_statistics(
        &self,
        org_id: &str,
        columns: &[String],
    ) -> ServerResult<BTreeMap<String, ColumnStatistics>> {
        let metadata = self.get_column_metadata(org_id, columns, 100).await?;
        Ok(metadata
            .iter()
            .filter_map(|item| {
                let column = item.column.clone()?;
                Some((column, ColumnStatistics::from_raw(item)))
            })
            .collect())
    }

    /// Ratio-aware cardinality per column.
    async fn analyze_cardinality(
        &self,
        org_id: &str,
        columns: &[String],
    ) -> ServerResult<BTreeMap<String, Cardinality>> {
        let metadata = self.get_column_metadata(org_id, columns, 100).await?;
        Ok(metadata
            .iter()
            .filter_map(|item| {
                let column = item.column.clone()?;
                let unique = u64::try_from(item.values.len()).unwrap_or(u64::MAX);
                Some((column, ratio_cardinality(unique, item.count)))
            })
            .collect())
    }

    async fn get_sample_data(
        &self,
        org_id: &str,
        columns: &[String],
        limit: usize,
    ) -> ServerResult<BTreeMap<String, Vec<Value>>> {
        let metadata = self.get_column_metadata(org_id, columns, limit).await?;
        Ok(metadata
            .into_iter()
            .filter_map(|item| {
                let column = item.column?;
                Some((column, item.values.into_iter().take(limit).collect()))
            })
            .collect())
    }
}

#[async_trait]
pub trait Warehouse: Collaborator {
    async fn analyze_table_statistics(
        &self,
        dataset_id: &str,
        table_id: &str,
    ) -> ServerResult<TableStatistics>;

    async fn get_column_distribution(
        &self,
        dataset_id: &str,
        table_id: &str,
        column: &str,
        limit: usize,
    ) -> ServerResult<ColumnDistribution>;

    /// Fails with a validation error for fewer than two columns.
    async fn calculate_correlation_matrix(
        &self,
        dataset_id: &str,
        table_id: &str,
        columns: &[String],
    ) -> ServerResult<CorrelationMatrix>;

    async fn get_data_quality_metrics(
        &self,
        dataset_id: &str,
        table_id: &str,
        columns: &[String],
    ) -> ServerResult<BTreeMap<String, ColumnQuality>>;

    async fn run_custom_query(&self, sql: &str) -> ServerResult<Vec<QueryRow>>;
}

pub(crate) fn require_org_id(org_id: &str) -> ServerResult<()> {
    if org_id.trim().is_empty() {
        return Err(ServerError::invalid_field(
            "Organization ID is required",
            "org_id",
        ));
    }
    Ok(())
}

pub(crate) fn require_correlation_columns(columns: &[String]) -> ServerResult<()> {
    if columns.len() < 2 {
        return Err(ServerError::invalid_field(
            "At least 2 numeric columns required for correlation",
            "numeric_columns",
        ));
    }
    Ok(())
}
