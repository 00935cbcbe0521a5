use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form filter object forwarded to the catalog search endpoint.
pub type CatalogFilters = Map<String, Value>;

/// Catalog attribute as returned by the upstream catalog API.
///
/// Only the fields below are read; everything else is carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_type: Option<String>,
    #[serde(default, rename = "isRawPII")]
    pub is_raw_pii: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Attribute {
    /// Builds an attribute with the fields the classifier reads.
    pub fn new(
        name: impl Into<String>,
        data_type: Option<&str>,
        attribute_type: Option<&str>,
        is_raw_pii: bool,
    ) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.map(str::to_string),
            attribute_type: attribute_type.map(str::to_string),
            is_raw_pii,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn data_type_or_unknown(&self) -> &str {
        self.data_type.as_deref().unwrap_or("UNKNOWN")
    }

    #[must_use]
    pub fn attribute_type_or_unknown(&self) -> &str {
        self.attribute_type.as_deref().unwrap_or("UNKNOWN")
    }
}

/// Raw catalog response for one organization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSchema {
    pub org_id: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub total_count: u64,
}

/// The four stores an attribute can be classified into.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StoreKind {
    #[serde(rename = "profile_store")]
    Profile,
    #[serde(rename = "event_store")]
    Event,
    #[serde(rename = "calculated_attribute")]
    Calculated,
    #[serde(rename = "consent_store")]
    Consent,
}

impl StoreKind {
    pub const ALL: [Self; 4] = [Self::Profile, Self::Event, Self::Calculated, Self::Consent];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Profile => "profile_store",
            Self::Event => "event_store",
            Self::Calculated => "calculated_attribute",
            Self::Consent => "consent_store",
        }
    }

    /// Parses a store name such as `profile_store`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|store| store.as_str() == value.trim())
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorized schema for an organization, as cached by the schema manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schema {
    pub org_id: String,
    pub total_columns: usize,
    pub stores: BTreeMap<StoreKind, Vec<Attribute>>,
    pub raw_attributes: Vec<Attribute>,
}

impl Schema {
    /// Returns the attributes assigned to `store`, or an empty slice.
    #[must_use]
    pub fn store(&self, store: StoreKind) -> &[Attribute] {
        self.stores.get(&store).map_or(&[], Vec::as_slice)
    }

    /// Finds an attribute by exact name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.raw_attributes.iter().find(|attr| attr.name == name)
    }
}

/// Coarse cardinality bucket used for ML feature typing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cardinality {
    Low,
    High,
    VeryHigh,
}

impl Cardinality {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::High => "HIGH",
            Self::VeryHigh => "VERY_HIGH",
        }
    }
}

/// Column metadata as returned by the metadata API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawColumnMetadata {
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub values: Vec<Value>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub null_count: u64,
    #[serde(default)]
    pub total_count: u64,
}

/// Processed per-column metadata cached by the schema manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnMetadata {
    pub values: Vec<Value>,
    pub count: u64,
    pub cardinality: Cardinality,
}

/// Summary statistics derived from a metadata response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnStatistics {
    pub count: u64,
    pub unique_values: usize,
    pub sample_values: Vec<Value>,
    pub null_count: u64,
    pub null_percentage: f64,
}

impl ColumnStatistics {
    /// Summarizes a metadata response: the first ten values are kept as samples
    /// and the null share is a percentage rounded to two places.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_raw(raw: &RawColumnMetadata) -> Self {
        let null_percentage = if raw.total_count == 0 {
            0.0
        } else {
            round_to(raw.null_count as f64 / raw.total_count as f64 * 100.0, 2)
        };
        Self {
            count: raw.count,
            unique_values: raw.values.len(),
            sample_values: raw.values.iter().take(10).cloned().collect(),
            null_count: raw.null_count,
            null_percentage,
        }
    }
}

/// Rounds `value` to `places` decimal places.
#[must_use]
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (value * factor).round() / factor
}

/// Column names grouped by heuristic PII sensitivity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PiiColumns {
    pub high: Vec<String>,
    pub medium: Vec<String>,
    pub low: Vec<String>,
}

impl PiiColumns {
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.sensitivity_of(column).is_some()
    }

    /// Returns the tier name a column was placed in, if any.
    #[must_use]
    pub fn sensitivity_of(&self, column: &str) -> Option<&'static str> {
        [("high", &self.high), ("medium", &self.medium), ("low", &self.low)]
            .into_iter()
            .find(|(_, columns)| columns.iter().any(|name| name == column))
            .map(|(tier, _)| tier)
    }
}

/// Aggregate counts over a categorized schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaSummary {
    pub total_columns: usize,
    pub by_store: BTreeMap<StoreKind, usize>,
    pub by_data_type: BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_keeps_unknown_fields() {
        let raw = serde_json::json!({
            "name": "email",
            "dataType": "STRING",
            "attributeType": "IDENTITY",
            "isRawPII": true,
            "displayName": "Email"
        });

        let attr: Attribute = serde_json::from_value(raw.clone()).expect("attribute decodes");
        assert!(attr.is_raw_pii);
        assert_eq!(attr.extra.get("displayName"), Some(&Value::from("Email")));
        assert_eq!(serde_json::to_value(&attr).expect("attribute encodes"), raw);
    }

    #[test]
    fn statistics_round_null_share() {
        let raw = RawColumnMetadata {
            column: Some("age".to_string()),
            values: (0..12).map(Value::from).collect(),
            count: 1_000,
            null_count: 1,
            total_count: 3,
        };

        let stats = ColumnStatistics::from_raw(&raw);
        assert_eq!(stats.unique_values, 12);
        assert_eq!(stats.sample_values.len(), 10);
        assert!((stats.null_percentage - 33.33).abs() < f64::EPSILON);

        let empty = RawColumnMetadata {
            total_count: 0,
            ..raw
        };
        assert!(ColumnStatistics::from_raw(&empty).null_percentage.abs() < f64::EPSILON);
    }

    #[test]
    fn store_names_round_trip_as_map_keys() {
        let mut stores = BTreeMap::new();
        stores.insert(StoreKind::Consent, 1_usize);
        stores.insert(StoreKind::Profile, 2_usize);

        let encoded = serde_json::to_value(&stores).expect("map encodes");
        assert_eq!(encoded["profile_store"], 2);
        assert_eq!(encoded["consent_store"], 1);
        assert_eq!(StoreKind::parse("calculated_attribute"), Some(StoreKind::Calculated));
        assert_eq!(StoreKind::parse("warehouse"), None);
    }
}
