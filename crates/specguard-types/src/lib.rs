//! Data types (catalog config, knowledge bases, findings, results) for specguard.
//!
//! This crate is intentionally "dumb": pure DTOs with serde + schemars.

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ── Schema Identifiers ─────────────────────────────────────────
pub const RESULT_SCHEMA_V1: &str = "specguard.result.v1";
pub const BASELINE_SCHEMA_V1: &str = "specguard.baseline.v1";

pub const TOOL_NAME: &str = "specguard";

/// Outcome classification of a single check.
///
/// There is no total order; only membership in the failing subset
/// (`GAP`, `MISMATCH`, `MISSING`) matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[serde(alias = "pass")]
    Pass,
    #[serde(alias = "info")]
    Info,
    #[serde(alias = "gap")]
    Gap,
    #[serde(alias = "mismatch")]
    Mismatch,
    #[serde(alias = "missing")]
    Missing,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Pass,
        Severity::Info,
        Severity::Gap,
        Severity::Mismatch,
        Severity::Missing,
    ];

    pub const FAILING: [Severity; 3] = [Severity::Gap, Severity::Mismatch, Severity::Missing];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Pass => "PASS",
            Severity::Info => "INFO",
            Severity::Gap => "GAP",
            Severity::Mismatch => "MISMATCH",
            Severity::Missing => "MISSING",
        }
    }

    pub fn is_failing(self) -> bool {
        Self::FAILING.contains(&self)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ToolMeta {
    pub name: String,
    pub version: String,
}

/// The evaluated outcome of one check against one knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Finding {
    pub modality: String,
    pub check_id: String,
    pub title: String,
    pub severity: Severity,
    pub detail: String,
    /// Severity the same check held in the baseline run. Only set by a delta pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_severity: Option<Severity>,
}

/// Per-severity tallies for one grouping of findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct SeverityCounts {
    pub total: u32,
    pub pass: u32,
    /// Informational findings. Omitted when zero.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub info: u32,
    pub gap: u32,
    pub mismatch: u32,
    pub missing: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl SeverityCounts {
    pub fn bump(&mut self, severity: Severity) {
        self.total = self.total.saturating_add(1);
        let slot = match severity {
            Severity::Pass => &mut self.pass,
            Severity::Info => &mut self.info,
            Severity::Gap => &mut self.gap,
            Severity::Mismatch => &mut self.mismatch,
            Severity::Missing => &mut self.missing,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn add(&mut self, other: &SeverityCounts) {
        self.total = self.total.saturating_add(other.total);
        self.pass = self.pass.saturating_add(other.pass);
        self.info = self.info.saturating_add(other.info);
        self.gap = self.gap.saturating_add(other.gap);
        self.mismatch = self.mismatch.saturating_add(other.mismatch);
        self.missing = self.missing.saturating_add(other.missing);
    }

    /// Count of findings in the failing subset.
    pub fn failing(&self) -> u32 {
        self.gap
            .saturating_add(self.mismatch)
            .saturating_add(self.missing)
    }

    /// `pass + info + gap + mismatch + missing == total`.
    pub fn is_consistent(&self) -> bool {
        u64::from(self.pass)
            + u64::from(self.info)
            + u64::from(self.gap)
            + u64::from(self.mismatch)
            + u64::from(self.missing)
            == u64::from(self.total)
    }
}

/// Share of checks classified `PASS`.
///
/// Serializes as a bare integer percentage, or `null` when the grouping is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Coverage {
    Percent(u8),
    Unavailable,
}

impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coverage::Percent(p) => write!(f, "{p}%"),
            Coverage::Unavailable => f.write_str("n/a"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ModalityCoverage {
    pub modality: String,
    pub counts: SeverityCounts,
    pub coverage: Coverage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CoverageSummary {
    /// One entry per modality, in first-seen order.
    pub modalities: Vec<ModalityCoverage>,
    pub totals: SeverityCounts,
    pub coverage: Coverage,
}

/// How a check moved relative to the baseline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeltaClass {
    /// Failing in the baseline, `PASS` now.
    Resolved,
    /// `PASS` in the baseline, failing now.
    Regressed,
    Unchanged,
    /// Any other severity change, e.g. `MISSING` to `GAP`.
    Shifted,
    /// No baseline severity recorded for the check id.
    New,
}

impl DeltaClass {
    pub fn as_str(self) -> &'static str {
        match self {
            DeltaClass::Resolved => "resolved",
            DeltaClass::Regressed => "regressed",
            DeltaClass::Unchanged => "unchanged",
            DeltaClass::Shifted => "shifted",
            DeltaClass::New => "new",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CheckDelta {
    pub check_id: String,
    pub modality: String,
    pub title: String,
    pub current: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Severity>,
    pub class: DeltaClass,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ModalityDelta {
    pub modality: String,
    pub baseline_failing: u32,
    pub current_failing: u32,
    /// `baseline_failing - current_failing`. Negative when the modality regressed.
    pub net_resolved: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeltaReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_label: Option<String>,
    /// The baseline was produced by a catalog with different `(id, modality)` pairs.
    #[serde(default)]
    pub catalog_changed: bool,
    pub resolved: u32,
    pub regressed: u32,
    pub shifted: u32,
    pub unchanged: u32,
    pub new: u32,
    /// Current findings in the failing subset.
    pub remaining: u32,
    /// Failing checks in the baseline (per-modality table total when supplied).
    pub baseline_total_failing: u32,
    pub checks: Vec<CheckDelta>,
    /// Empty unless a per-modality baseline table was supplied.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modalities: Vec<ModalityDelta>,
    /// Baseline check ids with no counterpart in the current catalog.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped: Vec<String>,
}

/// The persisted result of one harness run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HarnessResult {
    pub schema: String,
    pub tool: ToolMeta,
    /// Harness version tag, e.g. "v3".
    pub version: String,
    /// Label of the specification version the knowledge base mirrors.
    pub spec_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
    pub total_checks: u32,
    pub passes: u32,
    pub gaps: u32,
    pub mismatches: u32,
    pub missing: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub info: u32,
    /// Findings in the failing subset.
    pub remaining_gaps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_from_baseline: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_total_gaps: Option<u32>,
    pub coverage: CoverageSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<DeltaReport>,
    pub findings: Vec<Finding>,
}

/// A prior run's severities keyed by check id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Baseline {
    pub schema: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Digest of the catalog that produced the baseline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_digest: Option<String>,
    #[serde(default)]
    pub severities: BTreeMap<String, Severity>,
    /// Optional externally supplied failing-count table per modality.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modality_failing: Option<BTreeMap<String, u32>>,
}

impl Default for Baseline {
    fn default() -> Self {
        Self {
            schema: BASELINE_SCHEMA_V1.to_string(),
            label: None,
            created_at: None,
            catalog_digest: None,
            severities: BTreeMap::new(),
            modality_failing: None,
        }
    }
}

// ============================================================================
// Knowledge base input
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    #[default]
    Fields,
    Enumeration,
}

impl StructureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StructureKind::Fields => "fields",
            StructureKind::Enumeration => "enumeration",
        }
    }

    /// Noun used for one member in human-readable details.
    pub fn member_noun(self) -> &'static str {
        match self {
            StructureKind::Fields => "field",
            StructureKind::Enumeration => "value",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StructureDef {
    #[serde(default)]
    pub kind: StructureKind,
    #[serde(default)]
    pub members: Vec<String>,
    /// Field name to the name of the structure it references.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub refs: BTreeMap<String, String>,
}

/// The on-disk knowledge base file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct KnowledgeBaseFile {
    /// Specification-version label carried into the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub structure: BTreeMap<String, StructureDef>,
}

// ============================================================================
// Catalog configuration
// ============================================================================

/// When a harness run should be reported as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailOn {
    /// Any `MISSING` finding.
    Missing,
    /// Any finding in the failing subset.
    Failing,
    Never,
}

impl FailOn {
    pub fn as_str(self) -> &'static str {
        match self {
            FailOn::Missing => "missing",
            FailOn::Failing => "failing",
            FailOn::Never => "never",
        }
    }
}

/// Catalog-level run defaults. Unset keys fall through to included catalogs, then to the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Defaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_on: Option<FailOn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,
}


/// The on-disk catalog file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CatalogFile {
    /// Include other catalog files. Paths are relative to this file's directory.
    /// Checks are merged: later definitions override earlier ones by check ID.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub check: Vec<CheckConfig>,
}

impl Default for CatalogFile {
    fn default() -> Self {
        Self {
            includes: vec![],
            defaults: Defaults::default(),
            check: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CheckConfig {
    /// Stable identifier, e.g. "DT-01". Never renumber: it keys delta tracking.
    pub id: String,
    pub modality: String,
    pub title: String,
    pub predicate: PredicateConfig,

    /// Failing severities for this check. Unset entries use the defaults
    /// (`MISSING` for absence, `GAP` for partial support, `MISMATCH` for conflicts).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyConfig>,

    /// Appended to the generated detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct PolicyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absent: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<Severity>,
}

/// The fixed predicate forms a check may use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredicateConfig {
    /// `structure` contains `member`.
    HasMember { structure: String, member: String },
    /// `structure` contains every entry of `members`.
    HasAll {
        structure: String,
        members: Vec<String>,
    },
    /// `structure` contains at least one entry of `members`.
    HasAny {
        structure: String,
        members: Vec<String>,
    },
    /// When `claim` is present in `structure`, every entry of `requires` must be too.
    Companion {
        structure: String,
        claim: String,
        requires: Vec<String>,
    },
    /// `path` resolves through field references starting at `structure`.
    Path {
        structure: String,
        path: Vec<String>,
    },
    /// Fixed outcome for checks verified outside the knowledge base.
    Attest { severity: Severity, detail: String },
}

impl PredicateConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            PredicateConfig::HasMember { .. } => "has_member",
            PredicateConfig::HasAll { .. } => "has_all",
            PredicateConfig::HasAny { .. } => "has_any",
            PredicateConfig::Companion { .. } => "companion",
            PredicateConfig::Path { .. } => "path",
            PredicateConfig::Attest { .. } => "attest",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_as_str_and_failing_subset() {
        assert_eq!(Severity::Pass.as_str(), "PASS");
        assert_eq!(Severity::Mismatch.to_string(), "MISMATCH");

        let failing: Vec<_> = Severity::ALL.iter().filter(|s| s.is_failing()).collect();
        assert_eq!(
            failing,
            vec![&Severity::Gap, &Severity::Mismatch, &Severity::Missing]
        );
    }

    #[test]
    fn severity_serializes_upper_case_and_accepts_lower_case() {
        let json = serde_json::to_string(&Severity::Missing).expect("serialize");
        assert_eq!(json, "\"MISSING\"");

        let lower: Severity = serde_json::from_str("\"gap\"").expect("deserialize alias");
        assert_eq!(lower, Severity::Gap);
    }

    #[test]
    fn counts_track_failing_and_consistency() {
        let mut counts = SeverityCounts::default();
        for s in [
            Severity::Pass,
            Severity::Gap,
            Severity::Missing,
            Severity::Missing,
        ] {
            counts.bump(s);
        }
        assert_eq!(counts.total, 4);
        assert_eq!(counts.failing(), 3);
        assert!(counts.is_consistent());

        counts.total += 1;
        assert!(!counts.is_consistent());
    }

    #[test]
    fn coverage_serializes_as_number_or_null() {
        let v = serde_json::to_value(Coverage::Percent(33)).expect("serialize");
        assert_eq!(v, serde_json::json!(33));
        let v = serde_json::to_value(Coverage::Unavailable).expect("serialize");
        assert!(v.is_null());

        assert_eq!(Coverage::Percent(100).to_string(), "100%");
        assert_eq!(Coverage::Unavailable.to_string(), "n/a");
    }

    #[test]
    fn finding_omits_baseline_severity_when_unset() {
        let f = Finding {
            modality: "Radar".to_string(),
            check_id: "R-01".to_string(),
            title: "t".to_string(),
            severity: Severity::Pass,
            detail: "d".to_string(),
            baseline_severity: None,
        };
        let value = serde_json::to_value(&f).expect("serialize finding");
        let obj = value.as_object().expect("finding should be object");
        assert!(!obj.contains_key("baseline_severity"));
        assert_eq!(obj.get("severity").and_then(|v| v.as_str()), Some("PASS"));
    }

    #[test]
    fn predicate_config_parses_from_toml() {
        let cfg: CatalogFile = toml::from_str(
            r#"
[[check]]
id = "R-02"
modality = "Radar"
title = "Per-detection velocity"
predicate = { kind = "has_all", structure = "Detection", members = ["velocity"] }
policy = { absent = "GAP" }
"#,
        )
        .expect("parse catalog");

        assert_eq!(cfg.check.len(), 1);
        assert_eq!(cfg.check[0].predicate.kind(), "has_all");
        assert_eq!(
            cfg.check[0].policy.as_ref().and_then(|p| p.absent),
            Some(Severity::Gap)
        );
        assert_eq!(cfg.defaults, Defaults::default());
    }

    #[test]
    fn knowledge_base_kind_defaults_to_fields() {
        let kb: KnowledgeBaseFile = toml::from_str(
            r#"
label = "Spec 1.5"

[structure.Detection]
members = ["position"]

[structure.SensorType]
kind = "enumeration"
members = ["SHORT_RANGE"]
"#,
        )
        .expect("parse kb");

        assert_eq!(kb.label.as_deref(), Some("Spec 1.5"));
        assert_eq!(kb.structure["Detection"].kind, StructureKind::Fields);
        assert_eq!(kb.structure["SensorType"].kind, StructureKind::Enumeration);
    }
}
