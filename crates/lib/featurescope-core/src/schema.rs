//! Organization schema retrieval, store categorization and derived analyses.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use featurescope_store::schema::{
    DEFAULT_STORE,
    PII_HIGH_PATTERNS,
    PII_LOW_PATTERNS,
    PII_MEDIUM_PATTERNS,
    STORE_RULES,
    metadata_cache_key,
    schema_cache_key,
};
use featurescope_store::{
    Attribute,
    CatalogSchema,
    ColumnMetadata,
    PiiColumns,
    RawColumnMetadata,
    Schema,
    SchemaSummary,
    StoreKind,
};
use tracing::{debug, info};

pub use featurescope_store::schema::{ratio_cardinality, threshold_cardinality};

use crate::cache::CacheManager;
use crate::error::ServerResult;
use crate::integrations::{CatalogApi, MetadataApi, require_org_id};

/// Sample size requested when fetching column metadata.
const METADATA_SAMPLE_SIZE: usize = 100;

/// Remote-tier expiry for the three classes of cached data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub short: Duration,
    pub medium: Duration,
    pub long: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            short: Duration::from_secs(300),
            medium: Duration::from_secs(3_600),
            long: Duration::from_secs(7_200),
        }
    }
}

pub struct SchemaManager {
    catalog: Arc<dyn CatalogApi>,
    metadata: Arc<dyn MetadataApi>,
    cache: Arc<CacheManager>,
    ttls: CacheTtls,
}

impl SchemaManager {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogApi>,
        metadata: Arc<dyn MetadataApi>,
        cache: Arc<CacheManager>,
        ttls: CacheTtls,
    ) -> Self {
        Self {
            catalog,
            metadata,
            cache,
            ttls,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<dyn CatalogApi> {
        &self.catalog
    }

    #[must_use]
    pub fn metadata(&self) -> &Arc<dyn MetadataApi> {
        &self.metadata
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Returns the categorized schema for `org_id`, from cache unless `force_refresh`.
    ///
    /// # Errors
    /// Validation error for an empty `org_id`; catalog failures are propagated.
    pub async fn get_schema(&self, org_id: &str, force_refresh: bool) -> ServerResult<Schema> {
        require_org_id(org_id)?;
        let key = schema_cache_key(org_id);

        if !force_refresh && let Some(schema) = self.cache.get_as::<Schema>(&key).await {
            debug!(org_id, "schema served from cache");
            return Ok(schema);
        }

        info!(org_id, force_refresh, "fetching schema from catalog");
        let raw = self.catalog.get_catalog_schema(org_id, None).await?;
        let schema = Self::categorize(raw);
        self.cache.set(&key, &schema, Some(self.ttls.medium)).await?;
        Ok(schema)
    }

    /// Splits a catalog response into the four stores. Every store is present,
    /// possibly empty.
    #[must_use]
    pub fn categorize(raw: CatalogSchema) -> Schema {
        let mut stores: BTreeMap<StoreKind, Vec<Attribute>> = StoreKind::ALL
            .into_iter()
            .map(|store| (store, Vec::new()))
            .collect();
        for attribute in &raw.attributes {
            stores
                .entry(Self::determine_store(attribute))
                .or_default()
                .push(attribute.clone());
        }

        Schema {
            org_id: raw.org_id,
            total_columns: raw.attributes.len(),
            stores,
            raw_attributes: raw.attributes,
        }
    }

    /// First store whose attribute types contain the attribute's type, or whose
    /// keywords occur in its lower-cased name. Falls back to the event store.
    #[must_use]
    pub fn determine_store(attribute: &Attribute) -> StoreKind {
        let attribute_type = attribute
            .attribute_type
            .as_deref()
            .unwrap_or_default()
            .to_uppercase();
        let name = attribute.name.to_lowercase();

        STORE_RULES
            .iter()
            .find(|rule| {
                rule.attribute_types.contains(&attribute_type.as_str())
                    || rule.keywords.iter().any(|keyword| name.contains(keyword))
            })
            .map_or(DEFAULT_STORE, |rule| rule.store)
    }

    /// Per-column values, count and threshold cardinality. An empty column
    /// list yields an empty map without any lookup.
    ///
    /// # Errors
    /// Metadata API failures and cache encoding failures are propagated.
    pub async fn get_column_metadata(
        &self,
        org_id: &str,
        columns: &[String],
    ) -> ServerResult<BTreeMap<String, ColumnMetadata>> {
        if columns.is_empty() {
            return Ok(BTreeMap::new());
        }
        let key = metadata_cache_key(org_id, columns);
        if let Some(cached) = self
            .cache
            .get_as::<BTreeMap<String, ColumnMetadata>>(&key)
            .await
        {
            debug!(org_id, columns = columns.len(), "column metadata served from cache");
            return Ok(cached);
        }

        info!(org_id, columns = columns.len(), "fetching column metadata");
        let raw = self
            .metadata
            .get_column_metadata(org_id, columns, METADATA_SAMPLE_SIZE)
            .await?;
        let processed = process_metadata(raw);
        self.cache.set(&key, &processed, Some(self.ttls.long)).await?;
        Ok(processed)
    }

    /// Groups column names by heuristic PII sensitivity. Columns flagged by the
    /// catalog are always high; others land in the first tier with a matching
    /// pattern, or nowhere.
    #[must_use]
    pub fn detect_pii_columns(schema: &Schema) -> PiiColumns {
        let mut pii = PiiColumns::default();
        for attribute in &schema.raw_attributes {
            if attribute.is_raw_pii {
                pii.high.push(attribute.name.clone());
                continue;
            }
            let name = attribute.name.to_lowercase();
            let tiers = [
                (PII_HIGH_PATTERNS, &mut pii.high),
                (PII_MEDIUM_PATTERNS, &mut pii.medium),
                (PII_LOW_PATTERNS, &mut pii.low),
            ];
            if let Some((_, tier)) = tiers
                .into_iter()
                .find(|(patterns, _)| patterns.iter().any(|pattern| name.contains(pattern)))
            {
                tier.push(attribute.name.clone());
            }
        }
        pii
    }

    #[must_use]
    pub fn get_schema_summary(schema: &Schema) -> SchemaSummary {
        let mut by_data_type = BTreeMap::new();
        for attribute in &schema.raw_attributes {
            *by_data_type
                .entry(attribute.data_type_or_unknown().to_string())
                .or_insert(0) += 1;
        }
        SchemaSummary {
            total_columns: schema.total_columns,
            by_store: schema
                .stores
                .iter()
                .map(|(store, attributes)| (*store, attributes.len()))
                .collect(),
            by_data_type,
        }
    }
}

fn process_metadata(raw: Vec<RawColumnMetadata>) -> BTreeMap<String, ColumnMetadata> {
    raw.into_iter()
        .filter_map(|item| {
            let column = item.column?;
            Some((
                column,
                ColumnMetadata {
                    cardinality: threshold_cardinality(item.count),
                    values: item.values,
                    count: item.count,
                },
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::integrations::{Collaborator, MockCatalog, MockMetadata};
    use async_trait::async_trait;
    use featurescope_store::{Cardinality, CatalogFilters};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting<T> {
        inner: T,
        calls: AtomicUsize,
    }

    impl<T> Counting<T> {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl<T: Collaborator> Collaborator for Counting<T> {
        fn name(&self) -> &'static str {
            self.inner.name()
        }

        async fn connect(&self) -> ServerResult<()> {
            self.inner.connect().await
        }

        async fn disconnect(&self) {
            self.inner.disconnect().await;
        }

        async fn health_check(&self) -> bool {
            self.inner.health_check().await
        }
    }

    #[async_trait]
    impl<T: CatalogApi> CatalogApi for Counting<T> {
        async fn get_catalog_schema(
            &self,
            org_id: &str,
            filters: Option<CatalogFilters>,
        ) -> ServerResult<CatalogSchema> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_catalog_schema(org_id, filters).await
        }

        async fn search_attributes(
            &self,
            org_id: &str,
            query: &str,
            filters: Option<CatalogFilters>,
            size: usize,
        ) -> ServerResult<Vec<Attribute>> {
            self.inner.search_attributes(org_id, query, filters, size).await
        }
    }

    #[async_trait]
    impl<T: MetadataApi> MetadataApi for Counting<T> {
        async fn get_column_metadata(
            &self,
            org_id: &str,
            columns: &[String],
            sample_size: usize,
        ) -> ServerResult<Vec<RawColumnMetadata>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_column_metadata(org_id, columns, sample_size).await
        }
    }

    struct Fixture {
        catalog: Arc<Counting<MockCatalog>>,
        metadata: Arc<Counting<MockMetadata>>,
        manager: SchemaManager,
    }

    fn fixture() -> Fixture {
        let catalog = Arc::new(Counting::<MockCatalog>::default());
        let metadata = Arc::new(Counting::<MockMetadata>::default());
        let manager = SchemaManager::new(
            catalog.clone(),
            metadata.clone(),
            Arc::new(CacheManager::new(CacheConfig::memory_only())),
            CacheTtls::default(),
        );
        Fixture {
            catalog,
            metadata,
            manager,
        }
    }

    fn attribute(name: &str, attribute_type: &str) -> Attribute {
        Attribute::new(name, Some("STRING"), Some(attribute_type), false)
    }

    fn schema_of(attributes: Vec<Attribute>) -> Schema {
        SchemaManager::categorize(CatalogSchema {
            org_id: "acme".to_string(),
            total_count: 0,
            attributes,
        })
    }

    #[test]
    fn store_rules_apply_in_priority_order() {
        assert_eq!(
            SchemaManager::determine_store(&attribute("user_id", "IDENTITY")),
            StoreKind::Profile
        );
        assert_eq!(
            SchemaManager::determine_store(&attribute("event_count", "UNKNOWN")),
            StoreKind::Event
        );
        assert_eq!(
            SchemaManager::determine_store(&attribute("random_field", "UNKNOWN")),
            StoreKind::Event
        );
        assert_eq!(
            SchemaManager::determine_store(&attribute("ltv_score", "calculated")),
            StoreKind::Calculated
        );
        assert_eq!(
            SchemaManager::determine_store(&attribute("CLV", "UNKNOWN")),
            StoreKind::Calculated
        );
        assert_eq!(
            SchemaManager::determine_store(&Attribute::new("gdpr_opt_in", None, None, false)),
            StoreKind::Consent
        );
    }

    #[test]
    fn categorization_is_total_and_idempotent() {
        let attributes = vec![
            attribute("user_id", "IDENTITY"),
            attribute("event_type", "EVENT"),
            attribute("engagement_score", "CALCULATED"),
            attribute("gdpr_consent", "CONSENT"),
            attribute("mystery", ""),
        ];
        let first = schema_of(attributes.clone());
        let second = schema_of(attributes);

        assert_eq!(first, second);
        assert_eq!(first.total_columns, 5);
        let assigned: usize = first.stores.values().map(Vec::len).sum();
        assert_eq!(assigned, 5);
        assert_eq!(first.stores.len(), 4);
    }

    #[test]
    fn pii_detection_uses_flag_then_first_matching_tier() {
        let schema = schema_of(vec![
            Attribute::new("customer_ref", Some("STRING"), None, true),
            attribute("ssn", "UNKNOWN"),
            attribute("ip_address", "UNKNOWN"),
            attribute("email_name", "UNKNOWN"),
            attribute("city", "LOCATION"),
            attribute("age", "DEMOGRAPHIC"),
        ]);

        let pii = SchemaManager::detect_pii_columns(&schema);
        assert_eq!(pii.high, ["customer_ref", "ssn", "email_name"]);
        assert_eq!(pii.medium, ["ip_address"]);
        assert_eq!(pii.low, ["city"]);
        assert!(!pii.contains("age"));
    }

    #[test]
    fn summary_counts_match_total() {
        let schema = schema_of(vec![
            attribute("user_id", "IDENTITY"),
            attribute("event_type", "EVENT"),
            Attribute::new("mystery", None, None, false),
        ]);

        let summary = SchemaManager::get_schema_summary(&schema);
        assert_eq!(summary.total_columns, 3);
        assert_eq!(summary.by_store.values().sum::<usize>(), 3);
        assert_eq!(summary.by_store[&StoreKind::Consent], 0);
        assert_eq!(summary.by_data_type["STRING"], 2);
        assert_eq!(summary.by_data_type["UNKNOWN"], 1);
    }

    #[tokio::test]
    async fn schema_is_cached_until_forced_refresh() {
        let fx = fixture();

        let first = fx.manager.get_schema("acme", false).await.unwrap();
        let second = fx.manager.get_schema("acme", false).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(fx.catalog.calls(), 1);

        fx.manager.get_schema("acme", true).await.unwrap();
        assert_eq!(fx.catalog.calls(), 2);
        assert_eq!(first.total_columns, 22);
    }

    #[tokio::test]
    async fn empty_org_is_a_validation_error() {
        let fx = fixture();
        let err = fx.manager.get_schema("", false).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(fx.catalog.calls(), 0);
    }

    #[tokio::test]
    async fn empty_column_request_makes_no_call() {
        let fx = fixture();
        let metadata = fx.manager.get_column_metadata("org", &[]).await.unwrap();
        assert!(metadata.is_empty());
        assert_eq!(fx.metadata.calls(), 0);
    }

    #[tokio::test]
    async fn metadata_cache_key_ignores_column_order() {
        let fx = fixture();
        let forward = vec!["user_id".to_string(), "age".to_string()];
        let reverse = vec!["age".to_string(), "user_id".to_string()];

        let first = fx.manager.get_column_metadata("org", &forward).await.unwrap();
        let second = fx.manager.get_column_metadata("org", &reverse).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(fx.metadata.calls(), 1);

        assert_eq!(first["user_id"].cardinality, Cardinality::High);
        assert_eq!(first["user_id"].count, 100_000);
        assert_eq!(first["age"].cardinality, Cardinality::High);
    }
}
