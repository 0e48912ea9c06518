//! Analytics helpers for specguard: coverage aggregation and baseline deltas.
//!
//! This crate is intentionally pure (no filesystem/process/env I/O).

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use specguard_types::{
    BASELINE_SCHEMA_V1, Baseline, CheckDelta, Coverage, CoverageSummary, DeltaClass, DeltaReport,
    Finding, HarnessResult, ModalityCoverage, ModalityDelta, Severity, SeverityCounts,
};

// ── Coverage ───────────────────────────────────────────────────

/// Share of `PASS` findings as a whole percentage, rounding half to even.
///
/// `Unavailable` when `counts.total == 0`.
pub fn coverage_of(counts: &SeverityCounts) -> Coverage {
    if counts.total == 0 {
        return Coverage::Unavailable;
    }
    let pass = u64::from(counts.pass.min(counts.total));
    let total = u64::from(counts.total);
    let (quot, rem) = ((100 * pass) / total, (100 * pass) % total);
    let pct = match (2 * rem).cmp(&total) {
        Ordering::Greater => quot + 1,
        Ordering::Equal => quot + quot % 2,
        Ordering::Less => quot,
    };
    Coverage::Percent(u8::try_from(pct).unwrap_or(100))
}

/// Per-modality (first-seen order) and overall severity counts and coverage.
pub fn summarize_coverage(findings: &[Finding]) -> CoverageSummary {
    let mut modalities: Vec<ModalityCoverage> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut totals = SeverityCounts::default();

    for f in findings {
        let i = *index.entry(f.modality.as_str()).or_insert_with(|| {
            modalities.push(ModalityCoverage {
                modality: f.modality.clone(),
                counts: SeverityCounts::default(),
                coverage: Coverage::Unavailable,
            });
            modalities.len() - 1
        });
        modalities[i].counts.bump(f.severity);
        totals.bump(f.severity);
    }

    for m in &mut modalities {
        debug_assert!(m.counts.is_consistent(), "inconsistent counts for {}", m.modality);
        m.coverage = coverage_of(&m.counts);
    }
    debug_assert!(totals.is_consistent());
    debug_assert_eq!(
        modalities.iter().map(|m| u64::from(m.counts.total)).sum::<u64>(),
        u64::from(totals.total)
    );

    CoverageSummary {
        coverage: coverage_of(&totals),
        modalities,
        totals,
    }
}

// ── Catalog digest ─────────────────────────────────────────────

/// Computes the catalog digest used to detect renumbered or removed checks.
///
/// Format: hex SHA-256 over `id \0 modality \n` for each pair, in order.
pub fn catalog_digest<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut hasher = Sha256::new();
    for (id, modality) in pairs {
        hasher.update(id.as_bytes());
        hasher.update([0u8]);
        hasher.update(modality.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// Catalog digest of the checks that produced `findings`.
pub fn digest_of_findings(findings: &[Finding]) -> String {
    catalog_digest(
        findings
            .iter()
            .map(|f| (f.check_id.as_str(), f.modality.as_str())),
    )
}

// ── Delta tracking ─────────────────────────────────────────────

/// Classifies one check's movement between the baseline and the current run.
pub fn classify(current: Severity, baseline: Option<Severity>) -> DeltaClass {
    match baseline {
        None => DeltaClass::New,
        Some(b) if b == current => DeltaClass::Unchanged,
        Some(b) if b.is_failing() && current == Severity::Pass => DeltaClass::Resolved,
        Some(Severity::Pass) if current.is_failing() => DeltaClass::Regressed,
        Some(_) => DeltaClass::Shifted,
    }
}

/// Correlates current findings with baseline severities by check id.
///
/// The findings must be in catalog order (one per check) since the catalog
/// digest is taken over them.
pub fn track_delta(findings: &[Finding], baseline: &Baseline) -> DeltaReport {
    let mut report = DeltaReport {
        baseline_label: baseline.label.clone(),
        catalog_changed: false,
        resolved: 0,
        regressed: 0,
        shifted: 0,
        unchanged: 0,
        new: 0,
        remaining: 0,
        baseline_total_failing: 0,
        checks: Vec::with_capacity(findings.len()),
        modalities: vec![],
        dropped: vec![],
    };

    for f in findings {
        let prior = baseline.severities.get(&f.check_id).copied();
        let class = classify(f.severity, prior);
        let slot = match class {
            DeltaClass::Resolved => &mut report.resolved,
            DeltaClass::Regressed => &mut report.regressed,
            DeltaClass::Unchanged => &mut report.unchanged,
            DeltaClass::Shifted => &mut report.shifted,
            DeltaClass::New => &mut report.new,
        };
        *slot = slot.saturating_add(1);
        if f.severity.is_failing() {
            report.remaining = report.remaining.saturating_add(1);
        }

        report.checks.push(CheckDelta {
            check_id: f.check_id.clone(),
            modality: f.modality.clone(),
            title: f.title.clone(),
            current: f.severity,
            baseline: prior,
            class,
        });
    }

    let current_ids: BTreeSet<&str> = findings.iter().map(|f| f.check_id.as_str()).collect();
    report.dropped = baseline
        .severities
        .keys()
        .filter(|id| !current_ids.contains(id.as_str()))
        .cloned()
        .collect();

    if let Some(expected) = baseline.catalog_digest.as_deref() {
        let actual = digest_of_findings(findings);
        if expected != actual {
            warn!(
                baseline = expected,
                current = %actual,
                dropped = report.dropped.len(),
                "catalog changed since the baseline was recorded; delta for renumbered checks is unreliable"
            );
            report.catalog_changed = true;
        }
    }

    match &baseline.modality_failing {
        Some(table) => {
            report.modalities = modality_deltas(findings, table);
            report.baseline_total_failing = table
                .values()
                .fold(0u32, |acc, n| acc.saturating_add(*n));
        }
        None => {
            report.baseline_total_failing = baseline
                .severities
                .values()
                .filter(|s| s.is_failing())
                .count()
                .try_into()
                .unwrap_or(u32::MAX);
        }
    }

    debug!(
        resolved = report.resolved,
        regressed = report.regressed,
        shifted = report.shifted,
        new = report.new,
        remaining = report.remaining,
        "delta computed"
    );
    report
}

/// Current modalities first (first-seen order), then baseline-only ones by name.
fn modality_deltas(findings: &[Finding], table: &BTreeMap<String, u32>) -> Vec<ModalityDelta> {
    let mut order: Vec<&str> = Vec::new();
    let mut current: HashMap<&str, u32> = HashMap::new();
    for f in findings {
        let n = current.entry(f.modality.as_str()).or_insert_with(|| {
            order.push(f.modality.as_str());
            0
        });
        if f.severity.is_failing() {
            *n = n.saturating_add(1);
        }
    }
    for name in table.keys() {
        if !current.contains_key(name.as_str()) {
            order.push(name.as_str());
        }
    }

    order
        .into_iter()
        .map(|modality| {
            let baseline_failing = table.get(modality).copied().unwrap_or(0);
            let current_failing = current.get(modality).copied().unwrap_or(0);
            ModalityDelta {
                modality: modality.to_string(),
                baseline_failing,
                current_failing,
                net_resolved: i64::from(baseline_failing) - i64::from(current_failing),
            }
        })
        .collect()
}

// ── Baselines ──────────────────────────────────────────────────

/// Deterministically normalizes a baseline by setting the schema id when missing.
pub fn normalize_baseline(mut baseline: Baseline) -> Baseline {
    if baseline.schema.is_empty() {
        baseline.schema = BASELINE_SCHEMA_V1.to_string();
    }
    baseline
}

/// Builds a baseline from a prior result: severities by id, the per-modality
/// failing table and the digest of the catalog that produced it.
pub fn baseline_from_result(result: &HarnessResult) -> Baseline {
    let severities = result
        .findings
        .iter()
        .map(|f| (f.check_id.clone(), f.severity))
        .collect();

    let modality_failing = result
        .coverage
        .modalities
        .iter()
        .map(|m| (m.modality.clone(), m.counts.failing()))
        .collect();

    let label = match &result.dataset {
        Some(dataset) => format!("{} {} ({dataset})", result.version, result.spec_version),
        None => format!("{} {}", result.version, result.spec_version),
    };

    Baseline {
        schema: BASELINE_SCHEMA_V1.to_string(),
        label: Some(label),
        created_at: None,
        catalog_digest: Some(digest_of_findings(&result.findings)),
        severities,
        modality_failing: Some(modality_failing),
    }
}
