use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use featurescope_store::{Schema, StoreKind};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{FeatureScopeControlPlane, name_has_any, unknown_choice};
use crate::error::ServerResult;
use crate::integrations::require_org_id;
use crate::schema::SchemaManager;

const DEFAULT_REGULATIONS: [&str; 2] = ["GDPR", "CCPA"];
const REQUIRED_CONSENT_FIELDS: [&str; 4] = [
    "gdpr_consent",
    "marketing_consent",
    "consent_timestamp",
    "consent_version",
];
const TEMPORAL_TYPES: [&str; 3] = ["TIMESTAMP", "DATE", "DATETIME"];
const RETENTION_MARKERS: [&str; 4] = ["deleted", "retention", "expiry", "ttl"];
const HEALTH_TERMS: [&str; 5] = ["health", "medical", "diagnosis", "treatment", "medication"];
/// Share of raw-PII columns under which data minimization counts as good.
const MINIMIZATION_RATIO: f64 = 0.2;
const MAJOR_ISSUE_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckType {
    Full,
    Pii,
    Consent,
    Retention,
    Regulations,
}

impl CheckType {
    /// # Errors
    /// Validation error on `check_type` for any other name.
    pub fn parse(value: &str) -> ServerResult<Self> {
        match value {
            "full" => Ok(Self::Full),
            "pii" => Ok(Self::Pii),
            "consent" => Ok(Self::Consent),
            "retention" => Ok(Self::Retention),
            "regulations" => Ok(Self::Regulations),
            other => Err(unknown_choice("check_type", "check_type", other)),
        }
    }

    /// `full` covers the pii, consent and retention sections but not regulations.
    fn includes(self, section: Self) -> bool {
        self == section
            || (self == Self::Full && matches!(section, Self::Pii | Self::Consent | Self::Retention))
    }
}

fn default_check_type() -> String {
    "full".to_string()
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceRequest {
    pub org_id: String,
    #[serde(default = "default_check_type")]
    pub check_type: String,
    /// Defaults to GDPR and CCPA.
    #[serde(default)]
    pub regulations: Option<Vec<String>>,
    /// Restricts the PII section to these columns.
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub generate_report: bool,
}

impl ComplianceRequest {
    #[must_use]
    pub fn new(org_id: impl Into<String>, check_type: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            check_type: check_type.into(),
            regulations: None,
            columns: None,
            generate_report: true,
        }
    }

    #[must_use]
    pub fn with_regulations(mut self, regulations: Vec<String>) -> Self {
        self.regulations = Some(regulations);
        self
    }

    #[must_use]
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    #[must_use]
    pub const fn with_report(mut self, generate_report: bool) -> Self {
        self.generate_report = generate_report;
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    High,
    Medium,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComplianceIssue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub issue: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,
}

impl ComplianceIssue {
    fn new(issue: impl Into<String>) -> Self {
        Self {
            column: None,
            issue: issue.into(),
            sensitivity: None,
            severity: None,
            recommendation: None,
            impact: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComplianceWarning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub warning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PiiCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PiiCompliance {
    pub marked_pii_columns: usize,
    pub detected_pii: PiiCounts,
    pub issues: Vec<ComplianceIssue>,
    pub warnings: Vec<ComplianceWarning>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentGranularity {
    Good,
    NeedsImprovement,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsentCompliance {
    pub has_consent_store: bool,
    pub consent_fields_found: Vec<String>,
    pub consent_fields_missing: Vec<String>,
    pub consent_types: Vec<String>,
    pub consent_granularity: ConsentGranularity,
    pub issues: Vec<ComplianceIssue>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetentionCompliance {
    pub timestamp_columns: Vec<String>,
    pub retention_markers: Vec<String>,
    pub has_retention_tracking: bool,
    pub issues: Vec<ComplianceIssue>,
    pub warnings: Vec<ComplianceWarning>,
    pub recommendations: Vec<String>,
    pub retention_periods: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegulationCheck {
    pub regulation: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub health_columns_found: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requirements: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_items: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceStatus {
    Compliant,
    CompliantWithWarnings,
    MinorIssues,
    MajorIssues,
}

impl ComplianceStatus {
    #[must_use]
    pub const fn from_counts(issues: usize, warnings: usize) -> Self {
        match (issues, warnings) {
            (0, 0) => Self::Compliant,
            (0, _) => Self::CompliantWithWarnings,
            (issues, _) if issues < MAJOR_ISSUE_COUNT => Self::MinorIssues,
            _ => Self::MajorIssues,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Compliant => "COMPLIANT",
            Self::CompliantWithWarnings => "COMPLIANT_WITH_WARNINGS",
            Self::MinorIssues => "MINOR_ISSUES",
            Self::MajorIssues => "MAJOR_ISSUES",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComplianceSummary {
    pub status: ComplianceStatus,
    pub issues_found: usize,
    pub warnings: usize,
    pub recommendations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportScope {
    pub organization: String,
    pub regulations_checked: Vec<String>,
    pub check_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssueFinding {
    pub area: String,
    pub issue: ComplianceIssue,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WarningFinding {
    pub area: String,
    pub warning: ComplianceWarning,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Findings {
    pub critical_issues: Vec<IssueFinding>,
    pub warnings: Vec<WarningFinding>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComplianceDocument {
    pub executive_summary: String,
    pub report_date: String,
    pub scope: ReportScope,
    pub findings: Findings,
    pub next_steps: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComplianceReport {
    pub org_id: String,
    pub check_type: String,
    pub regulations: Vec<String>,
    pub timestamp: String,
    pub summary: ComplianceSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pii_compliance: Option<PiiCompliance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent_compliance: Option<ConsentCompliance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_compliance: Option<RetentionCompliance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regulation_compliance: Option<BTreeMap<String, RegulationCheck>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_report: Option<ComplianceDocument>,
}

/// Borrowed view over one section's findings, in report order.
struct SectionFindings<'a> {
    area: &'static str,
    issues: &'a [ComplianceIssue],
    warnings: &'a [ComplianceWarning],
    recommendations: &'a [String],
}

impl ComplianceReport {
    fn sections(&self) -> Vec<SectionFindings<'_>> {
        let mut sections = Vec::new();
        if let Some(pii) = &self.pii_compliance {
            sections.push(SectionFindings {
                area: "pii_compliance",
                issues: &pii.issues,
                warnings: &pii.warnings,
                recommendations: &pii.recommendations,
            });
        }
        if let Some(consent) = &self.consent_compliance {
            sections.push(SectionFindings {
                area: "consent_compliance",
                issues: &consent.issues,
                warnings: &[],
                recommendations: &consent.recommendations,
            });
        }
        if let Some(retention) = &self.retention_compliance {
            sections.push(SectionFindings {
                area: "retention_compliance",
                issues: &retention.issues,
                warnings: &retention.warnings,
                recommendations: &retention.recommendations,
            });
        }
        sections
    }

    fn summarize(&self) -> ComplianceSummary {
        let sections = self.sections();
        let issues_found = sections.iter().map(|section| section.issues.len()).sum();
        let warnings = sections.iter().map(|section| section.warnings.len()).sum();
        ComplianceSummary {
            status: ComplianceStatus::from_counts(issues_found, warnings),
            issues_found,
            warnings,
            recommendations: sections
                .iter()
                .map(|section| section.recommendations.len())
                .sum(),
        }
    }

    fn document(&self) -> ComplianceDocument {
        let mut findings = Findings::default();
        for section in self.sections() {
            findings
                .critical_issues
                .extend(section.issues.iter().map(|issue| IssueFinding {
                    area: section.area.to_string(),
                    issue: issue.clone(),
                }));
            findings
                .warnings
                .extend(section.warnings.iter().map(|warning| WarningFinding {
                    area: section.area.to_string(),
                    warning: warning.clone(),
                }));
            findings
                .recommendations
                .extend_from_slice(section.recommendations);
        }

        let mut next_steps = Vec::new();
        if !findings.critical_issues.is_empty() {
            next_steps.push("Address critical compliance issues immediately".to_string());
        }
        next_steps.extend(
            [
                "Implement automated compliance monitoring",
                "Schedule regular compliance audits",
                "Train team on data privacy requirements",
            ]
            .map(String::from),
        );

        ComplianceDocument {
            executive_summary: format!(
                "Compliance check completed with status: {}",
                self.summary.status.as_str()
            ),
            report_date: self.timestamp.clone(),
            scope: ReportScope {
                organization: self.org_id.clone(),
                regulations_checked: self.regulations.clone(),
                check_type: self.check_type.clone(),
            },
            findings,
            next_steps,
        }
    }
}

impl FeatureScopeControlPlane {
    /// Checks PII marking, consent tracking, retention and regulation coverage.
    ///
    /// # Errors
    /// Validation errors for an empty `org_id` or an unknown `check_type`;
    /// catalog failures are propagated.
    pub async fn compliance_checker(&self, request: ComplianceRequest) -> ServerResult<ComplianceReport> {
        require_org_id(&request.org_id)?;
        let check_type = CheckType::parse(&request.check_type)?;
        let regulations = match request.regulations {
            Some(regulations) if !regulations.is_empty() => regulations,
            _ => DEFAULT_REGULATIONS.map(String::from).to_vec(),
        };
        let schema = self.schema().get_schema(&request.org_id, false).await?;
        info!(org_id = %request.org_id, check_type = %request.check_type, "checking compliance");

        let mut report = ComplianceReport {
            org_id: request.org_id,
            check_type: request.check_type,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            summary: ComplianceSummary {
                status: ComplianceStatus::Compliant,
                issues_found: 0,
                warnings: 0,
                recommendations: 0,
            },
            pii_compliance: check_type
                .includes(CheckType::Pii)
                .then(|| check_pii(&schema, request.columns.as_deref())),
            consent_compliance: check_type
                .includes(CheckType::Consent)
                .then(|| check_consent(&schema)),
            retention_compliance: check_type
                .includes(CheckType::Retention)
                .then(|| check_retention(&schema)),
            regulation_compliance: check_type
                .includes(CheckType::Regulations)
                .then(|| check_regulations(&schema, &regulations)),
            regulations,
            compliance_report: None,
        };
        report.summary = report.summarize();
        if request.generate_report {
            report.compliance_report = Some(report.document());
        }
        Ok(report)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

fn check_pii(schema: &Schema, columns: Option<&[String]>) -> PiiCompliance {
    let detected = SchemaManager::detect_pii_columns(schema);
    let in_scope = |name: &str| {
        columns.is_none_or(|columns| columns.is_empty() || columns.iter().any(|column| column == name))
    };

    let mut marked = 0;
    let mut issues = Vec::new();
    let mut warnings = Vec::new();
    for attribute in schema.raw_attributes.iter().filter(|attribute| in_scope(&attribute.name)) {
        let name = &attribute.name;
        if attribute.is_raw_pii {
            marked += 1;
        } else if let Some(tier) = detected.sensitivity_of(name) {
            issues.push(ComplianceIssue {
                column: Some(name.clone()),
                sensitivity: Some(tier.to_string()),
                recommendation: Some("Review and mark as PII if confirmed".to_string()),
                ..ComplianceIssue::new("Potential PII not marked")
            });
        }
        if attribute.is_raw_pii || detected.high.contains(name) {
            warnings.push(ComplianceWarning {
                column: Some(name.clone()),
                warning: "Ensure PII data is encrypted at rest and in transit".to_string(),
                requirement: Some("GDPR Article 32".to_string()),
                recommendation: None,
            });
        }
    }

    PiiCompliance {
        marked_pii_columns: marked,
        detected_pii: PiiCounts {
            high: detected.high.len(),
            medium: detected.medium.len(),
            low: detected.low.len(),
        },
        issues,
        warnings,
        recommendations: strings(&[
            "Implement data classification system",
            "Regular PII audits recommended",
            "Consider pseudonymization for analytics",
        ]),
    }
}

fn check_consent(schema: &Schema) -> ConsentCompliance {
    let consent_store = schema.store(StoreKind::Consent);
    let names: Vec<String> = consent_store
        .iter()
        .map(|attribute| attribute.name.to_lowercase())
        .collect();
    let (found, missing): (Vec<&str>, Vec<&str>) = REQUIRED_CONSENT_FIELDS
        .into_iter()
        .partition(|field| names.iter().any(|name| name.contains(field)));
    let consent_types: Vec<String> = consent_store
        .iter()
        .filter(|attribute| name_has_any(&attribute.name, &["consent"]))
        .map(|attribute| attribute.name.clone())
        .collect();

    let mut issues = Vec::new();
    if consent_store.is_empty() {
        issues.push(ComplianceIssue {
            severity: Some(Severity::High),
            recommendation: Some("Implement consent management system".to_string()),
            ..ComplianceIssue::new("No consent store found")
        });
    }
    if !missing.is_empty() {
        issues.push(ComplianceIssue {
            severity: Some(Severity::Medium),
            recommendation: Some("Add missing consent tracking fields".to_string()),
            ..ComplianceIssue::new(format!("Missing consent fields: {}", missing.join(", ")))
        });
    }

    ConsentCompliance {
        has_consent_store: !consent_store.is_empty(),
        consent_fields_found: strings(&found),
        consent_fields_missing: strings(&missing),
        consent_granularity: if consent_types.len() > 3 {
            ConsentGranularity::Good
        } else {
            ConsentGranularity::NeedsImprovement
        },
        consent_types,
        issues,
        recommendations: strings(&[
            "Implement consent versioning",
            "Track consent withdrawal",
            "Maintain consent audit trail",
        ]),
    }
}

fn retention_periods() -> BTreeMap<String, BTreeMap<String, String>> {
    let table = |entries: &[(&str, &str)]| {
        entries
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect::<BTreeMap<_, _>>()
    };
    BTreeMap::from([
        (
            "GDPR".to_string(),
            table(&[
                ("default", "No longer than necessary"),
                ("marketing", "2 years after last interaction"),
                ("employee_data", "6 years after employment ends"),
            ]),
        ),
        (
            "CCPA".to_string(),
            table(&[("default", "12 months unless longer retention justified")]),
        ),
    ])
}

fn check_retention(schema: &Schema) -> RetentionCompliance {
    let timestamp_columns: Vec<String> = schema
        .raw_attributes
        .iter()
        .filter(|attribute| {
            attribute
                .data_type
                .as_deref()
                .is_some_and(|data_type| TEMPORAL_TYPES.contains(&data_type))
        })
        .map(|attribute| attribute.name.clone())
        .collect();
    let retention_markers: Vec<String> = schema
        .raw_attributes
        .iter()
        .filter(|attribute| name_has_any(&attribute.name, &RETENTION_MARKERS))
        .map(|attribute| attribute.name.clone())
        .collect();

    let mut issues = Vec::new();
    if timestamp_columns.is_empty() {
        issues.push(ComplianceIssue {
            severity: Some(Severity::High),
            impact: Some("Cannot determine data age for retention policies".to_string()),
            ..ComplianceIssue::new("No timestamp columns found")
        });
    }
    let mut warnings = Vec::new();
    if retention_markers.is_empty() {
        warnings.push(ComplianceWarning {
            column: None,
            warning: "No retention policy markers found".to_string(),
            requirement: None,
            recommendation: Some("Add retention period tracking".to_string()),
        });
    }

    RetentionCompliance {
        has_retention_tracking: !retention_markers.is_empty(),
        timestamp_columns,
        retention_markers,
        issues,
        warnings,
        recommendations: strings(&[
            "Implement automated data retention policies",
            "Add data lifecycle management",
            "Regular retention policy audits",
        ]),
        retention_periods: retention_periods(),
    }
}

fn check_regulations(schema: &Schema, regulations: &[String]) -> BTreeMap<String, RegulationCheck> {
    regulations
        .iter()
        .map(|regulation| match regulation.to_uppercase().as_str() {
            "GDPR" => ("GDPR".to_string(), check_gdpr(schema)),
            "CCPA" => ("CCPA".to_string(), check_ccpa(schema)),
            "HIPAA" => ("HIPAA".to_string(), check_hipaa(schema)),
            _ => (
                regulation.clone(),
                RegulationCheck {
                    regulation: regulation.clone(),
                    status: "NOT_IMPLEMENTED".to_string(),
                    message: Some(format!("Compliance check for {regulation} not implemented")),
                    health_columns_found: Vec::new(),
                    requirements: BTreeMap::new(),
                    action_items: Vec::new(),
                },
            ),
        })
        .collect()
}

fn requirements(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn check_gdpr(schema: &Schema) -> RegulationCheck {
    let lawful_basis = if schema.store(StoreKind::Consent).is_empty() {
        "UNKNOWN"
    } else {
        "IMPLEMENTED"
    };
    let pii = schema
        .raw_attributes
        .iter()
        .filter(|attribute| attribute.is_raw_pii)
        .count();
    let pii_ratio = pii as f64 / schema.total_columns.max(1) as f64;
    let minimization = if pii_ratio < MINIMIZATION_RATIO {
        "GOOD"
    } else {
        "NEEDS_REVIEW"
    };

    RegulationCheck {
        regulation: "GDPR".to_string(),
        status: "PARTIAL_COMPLIANCE".to_string(),
        message: None,
        health_columns_found: Vec::new(),
        requirements: requirements(&[
            ("lawful_basis", lawful_basis),
            ("data_minimization", minimization),
            ("purpose_limitation", "UNKNOWN"),
            ("right_to_erasure", "NOT_IMPLEMENTED"),
            ("right_to_portability", "PARTIAL"),
            ("privacy_by_design", "UNKNOWN"),
        ]),
        action_items: strings(&[
            "Implement right to erasure (Article 17)",
            "Document lawful basis for processing",
            "Create data processing registry",
            "Implement data portability APIs",
        ]),
    }
}

fn check_ccpa(schema: &Schema) -> RegulationCheck {
    let opt_out = if schema
        .raw_attributes
        .iter()
        .any(|attribute| name_has_any(&attribute.name, &["opt_out", "do_not_sell"]))
    {
        "FOUND"
    } else {
        "NOT_FOUND"
    };

    RegulationCheck {
        regulation: "CCPA".to_string(),
        status: "PARTIAL_COMPLIANCE".to_string(),
        message: None,
        health_columns_found: Vec::new(),
        requirements: requirements(&[
            ("consumer_rights", "UNKNOWN"),
            ("opt_out_mechanism", opt_out),
            ("data_deletion", "NOT_IMPLEMENTED"),
            ("data_disclosure", "PARTIAL"),
        ]),
        action_items: strings(&[
            "Implement consumer data deletion process",
            "Add 'Do Not Sell' opt-out mechanism",
            "Create data collection disclosure",
            "Implement consumer request handling",
        ]),
    }
}

fn check_hipaa(schema: &Schema) -> RegulationCheck {
    let health_columns: Vec<String> = schema
        .raw_attributes
        .iter()
        .filter(|attribute| name_has_any(&attribute.name, &HEALTH_TERMS))
        .map(|attribute| attribute.name.clone())
        .collect();

    if health_columns.is_empty() {
        return RegulationCheck {
            regulation: "HIPAA".to_string(),
            status: "NOT_APPLICABLE".to_string(),
            message: Some("No health-related data detected".to_string()),
            health_columns_found: Vec::new(),
            requirements: BTreeMap::new(),
            action_items: Vec::new(),
        };
    }

    RegulationCheck {
        regulation: "HIPAA".to_string(),
        status: "REQUIRES_REVIEW".to_string(),
        message: None,
        health_columns_found: health_columns,
        requirements: requirements(&[
            ("encryption", "REQUIRED"),
            ("access_controls", "REQUIRED"),
            ("audit_trails", "REQUIRED"),
            ("breach_notification", "REQUIRED"),
        ]),
        action_items: strings(&[
            "Implement HIPAA-compliant encryption",
            "Set up access control lists",
            "Enable comprehensive audit logging",
            "Create breach notification procedures",
        ]),
    }
}

#[cfg(test)]
mod tests {
    use featurescope_store::{Attribute, CatalogSchema};

    use super::*;
    use crate::control::testing::mock_control;

    #[test]
    fn status_thresholds() {
        assert_eq!(ComplianceStatus::from_counts(0, 0), ComplianceStatus::Compliant);
        assert_eq!(
            ComplianceStatus::from_counts(0, 3),
            ComplianceStatus::CompliantWithWarnings
        );
        assert_eq!(ComplianceStatus::from_counts(4, 0), ComplianceStatus::MinorIssues);
        assert_eq!(ComplianceStatus::from_counts(5, 0), ComplianceStatus::MajorIssues);
    }

    #[tokio::test]
    async fn full_check_on_mock_catalog() {
        let control = mock_control();
        let report = control
            .compliance_checker(ComplianceRequest::new("acme", "full"))
            .await
            .unwrap();

        assert_eq!(report.regulations, ["GDPR", "CCPA"]);
        assert!(report.regulation_compliance.is_none());

        let pii = report.pii_compliance.as_ref().unwrap();
        assert_eq!(pii.marked_pii_columns, 2);
        // city and country match location patterns but are not flagged by the catalog.
        assert!(pii.issues.iter().any(|issue| issue.column.as_deref() == Some("city")));
        assert_eq!(pii.warnings.len(), 2);

        let consent = report.consent_compliance.as_ref().unwrap();
        assert!(consent.has_consent_store);
        // consent_timestamp is categorized into the event store.
        assert_eq!(
            consent.consent_fields_missing,
            ["consent_timestamp", "consent_version"]
        );
        assert_eq!(consent.consent_granularity, ConsentGranularity::NeedsImprovement);

        let retention = report.retention_compliance.as_ref().unwrap();
        assert!(retention.timestamp_columns.contains(&"event_timestamp".to_string()));
        assert!(!retention.has_retention_tracking);

        let expected_issues = pii.issues.len() + consent.issues.len();
        assert_eq!(report.summary.issues_found, expected_issues);
        assert_eq!(report.summary.status, ComplianceStatus::MinorIssues);
        assert_eq!(report.summary.warnings, 3);
        assert_eq!(report.summary.recommendations, 9);

        let document = report.compliance_report.as_ref().unwrap();
        assert_eq!(document.findings.critical_issues.len(), expected_issues);
        assert_eq!(document.next_steps[0], "Address critical compliance issues immediately");
        assert_eq!(document.scope.organization, "acme");
    }

    #[tokio::test]
    async fn regulations_check_only_runs_regulations() {
        let control = mock_control();
        let request = ComplianceRequest::new("acme", "regulations")
            .with_regulations(vec!["gdpr".to_string(), "HIPAA".to_string(), "LGPD".to_string()])
            .with_report(false);

        let report = control.compliance_checker(request).await.unwrap();
        assert!(report.pii_compliance.is_none());
        assert!(report.compliance_report.is_none());
        assert_eq!(report.summary.status, ComplianceStatus::Compliant);

        let regulations = report.regulation_compliance.unwrap();
        assert_eq!(regulations["GDPR"].requirements["lawful_basis"], "IMPLEMENTED");
        assert_eq!(regulations["GDPR"].requirements["data_minimization"], "GOOD");
        assert_eq!(regulations["HIPAA"].status, "NOT_APPLICABLE");
        assert_eq!(regulations["LGPD"].status, "NOT_IMPLEMENTED");
    }

    #[test]
    fn empty_schema_has_high_severity_gaps() {
        let schema = SchemaManager::categorize(CatalogSchema {
            org_id: "acme".to_string(),
            attributes: vec![Attribute::new("patient_diagnosis", Some("STRING"), None, false)],
            total_count: 1,
        });

        let consent = check_consent(&schema);
        assert_eq!(consent.issues[0].severity, Some(Severity::High));
        assert_eq!(consent.consent_fields_missing.len(), 4);

        let retention = check_retention(&schema);
        assert_eq!(retention.issues[0].issue, "No timestamp columns found");

        assert_eq!(check_hipaa(&schema).health_columns_found, ["patient_diagnosis"]);
    }

    fn schema_with_pii(pii: usize) -> Schema {
        let attributes = (0..10)
            .map(|i| Attribute::new(format!("col_{i}"), Some("STRING"), None, i < pii))
            .collect();
        SchemaManager::categorize(CatalogSchema {
            org_id: "acme".to_string(),
            attributes,
            total_count: 10,
        })
    }

    #[test]
    fn data_minimization_flips_at_pii_ratio() {
        let lean = check_gdpr(&schema_with_pii(1));
        assert_eq!(lean.requirements["data_minimization"], "GOOD");

        let heavy = check_gdpr(&schema_with_pii(2));
        assert_eq!(heavy.requirements["data_minimization"], "NEEDS_REVIEW");
    }

    #[tokio::test]
    async fn unknown_check_type_is_rejected() {
        let control = mock_control();
        let err = control
            .compliance_checker(ComplianceRequest::new("acme", "sox"))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Unknown check_type: sox");
    }
}
