use crate::models::{Cardinality, StoreKind};

/// Classification rule for one store.
#[derive(Debug, Clone, Copy)]
pub struct StoreRule {
    pub store: StoreKind,
    pub attribute_types: &'static [&'static str],
    pub keywords: &'static [&'static str],
}

/// Store rules in priority order: the first matching rule wins.
pub const STORE_RULES: &[StoreRule] = &[
    StoreRule {
        store: StoreKind::Profile,
        attribute_types: &["USER", "PROFILE", "IDENTITY", "DEMOGRAPHIC"],
        keywords: &["age", "gender", "location", "preference", "demographic", "email"],
    },
    StoreRule {
        store: StoreKind::Event,
        attribute_types: &["EVENT", "INTERACTION", "BEHAVIORAL"],
        keywords: &["event", "action", "click", "view", "purchase", "timestamp"],
    },
    StoreRule {
        store: StoreKind::Calculated,
        attribute_types: &["CALCULATED", "DERIVED", "AGGREGATE"],
        keywords: &["score", "sum", "avg", "count", "last_", "total_", "clv"],
    },
    StoreRule {
        store: StoreKind::Consent,
        attribute_types: &["CONSENT", "PRIVACY"],
        keywords: &["consent", "opt", "gdpr", "privacy", "permission"],
    },
];

/// Store used when no rule matches.
pub const DEFAULT_STORE: StoreKind = StoreKind::Event;

/// Name fragments that flag a column as likely PII, by sensitivity tier.
pub const PII_HIGH_PATTERNS: &[&str] = &["email", "phone", "ssn", "credit_card", "password"];
pub const PII_MEDIUM_PATTERNS: &[&str] = &["name", "address", "device_id", "cookie", "user_agent"];
pub const PII_LOW_PATTERNS: &[&str] = &["country", "city", "state", "zip", "postal"];

/// Distinct-value count at or below which a column is `LOW` cardinality.
pub const LOW_CARDINALITY_THRESHOLD: u64 = 100;

/// Unique/total ratio above which a column is `VERY_HIGH` cardinality.
pub const VERY_HIGH_CARDINALITY_RATIO: f64 = 0.95;

/// Page size requested from the catalog search endpoint.
pub const CATALOG_PAGE_SIZE: usize = 10_000;

pub const SCHEMA_KEY_PREFIX: &str = "schema";
pub const METADATA_KEY_PREFIX: &str = "metadata";

#[must_use]
pub fn schema_cache_key(org_id: &str) -> String {
    format!("{SCHEMA_KEY_PREFIX}:{org_id}")
}

/// Cache key for a metadata request; column order does not matter.
#[must_use]
pub fn metadata_cache_key(org_id: &str, columns: &[String]) -> String {
    let mut sorted: Vec<&str> = columns.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    format!("{METADATA_KEY_PREFIX}:{org_id}:{}", sorted.join(","))
}

/// Two-bucket cardinality from a column's reported value count.
#[must_use]
pub const fn threshold_cardinality(count: u64) -> Cardinality {
    if count <= LOW_CARDINALITY_THRESHOLD {
        Cardinality::Low
    } else {
        Cardinality::High
    }
}

/// Three-bucket cardinality from distinct and total counts. A column whose
/// distinct values cover more than 95% of its rows is `VERY_HIGH`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn ratio_cardinality(unique: u64, total: u64) -> Cardinality {
    if unique <= LOW_CARDINALITY_THRESHOLD {
        Cardinality::Low
    } else if unique as f64 / total.max(1) as f64 > VERY_HIGH_CARDINALITY_RATIO {
        Cardinality::VeryHigh
    } else {
        Cardinality::High
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_key_ignores_column_order() {
        let left = metadata_cache_key("org", &["b".to_string(), "a".to_string()]);
        let right = metadata_cache_key("org", &["a".to_string(), "b".to_string()]);
        assert_eq!(left, right);
        assert_eq!(left, "metadata:org:a,b");
    }

    #[test]
    fn cardinality_heuristics_disagree_above_threshold() {
        assert_eq!(threshold_cardinality(100), Cardinality::Low);
        assert_eq!(threshold_cardinality(101), Cardinality::High);

        assert_eq!(ratio_cardinality(100, 100), Cardinality::Low);
        assert_eq!(ratio_cardinality(990, 1_000), Cardinality::VeryHigh);
        assert_eq!(ratio_cardinality(500, 1_000), Cardinality::High);
        assert_eq!(ratio_cardinality(500, 0), Cardinality::VeryHigh);
    }

    #[test]
    fn rules_cover_every_store_once() {
        for store in StoreKind::ALL {
            let count = STORE_RULES.iter().filter(|rule| rule.store == store).count();
            assert_eq!(count, 1, "{store} should have exactly one rule");
        }
    }
}
