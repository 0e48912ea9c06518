//! Property-based tests for specguard-analytics.

use proptest::prelude::*;

use specguard_analytics::{baseline_from_result, summarize_coverage, track_delta};
use specguard_testkit::arb::{arb_baseline, arb_findings};
use specguard_types::{
    Coverage, CoverageSummary, DeltaClass, HarnessResult, RESULT_SCHEMA_V1, Severity, ToolMeta,
};

fn result_with(
    findings: Vec<specguard_types::Finding>,
    coverage: CoverageSummary,
) -> HarnessResult {
    let totals = coverage.totals.clone();
    HarnessResult {
        schema: RESULT_SCHEMA_V1.to_string(),
        tool: ToolMeta {
            name: "specguard".to_string(),
            version: "0.1.0".to_string(),
        },
        version: "v2".to_string(),
        spec_version: "1.5".to_string(),
        dataset: None,
        total_checks: totals.total,
        passes: totals.pass,
        gaps: totals.gap,
        mismatches: totals.mismatch,
        missing: totals.missing,
        info: totals.info,
        remaining_gaps: totals.failing(),
        resolved_from_baseline: None,
        baseline_total_gaps: None,
        coverage,
        delta: None,
        findings,
    }
}

proptest! {
    #[test]
    fn modality_counts_sum_to_totals(findings in arb_findings()) {
        let summary = summarize_coverage(&findings);

        prop_assert!(summary.totals.is_consistent());
        prop_assert_eq!(summary.totals.total as usize, findings.len());

        let mut sum = 0u32;
        for m in &summary.modalities {
            prop_assert!(m.counts.is_consistent());
            prop_assert!(m.counts.total > 0);
            sum += m.counts.total;
        }
        prop_assert_eq!(sum, summary.totals.total);
    }

    #[test]
    fn coverage_is_a_percentage_or_unavailable(findings in arb_findings()) {
        let summary = summarize_coverage(&findings);
        match summary.coverage {
            Coverage::Percent(p) => {
                prop_assert!(!findings.is_empty());
                prop_assert!(p <= 100);
            }
            Coverage::Unavailable => prop_assert!(findings.is_empty()),
        }
    }

    #[test]
    fn delta_classes_partition_findings(findings in arb_findings(), baseline in arb_baseline()) {
        let report = track_delta(&findings, &baseline);

        prop_assert_eq!(report.checks.len(), findings.len());
        let classified =
            report.resolved + report.regressed + report.shifted + report.unchanged + report.new;
        prop_assert_eq!(classified as usize, findings.len());

        let failing = findings.iter().filter(|f| f.severity.is_failing()).count();
        prop_assert_eq!(report.remaining as usize, failing);

        for c in &report.checks {
            if c.baseline == Some(Severity::Pass) && c.current.is_failing() {
                prop_assert_eq!(c.class, DeltaClass::Regressed);
            }
        }
    }

    #[test]
    fn baseline_from_result_is_unchanged_against_itself(findings in arb_findings()) {
        // Duplicate ids collapse in the baseline map, so keep the first of each.
        let mut seen = std::collections::HashSet::new();
        let findings: Vec<_> = findings
            .into_iter()
            .filter(|f| seen.insert(f.check_id.clone()))
            .collect();

        let result = result_with(findings.clone(), summarize_coverage(&findings));
        let baseline = baseline_from_result(&result);
        let report = track_delta(&findings, &baseline);

        prop_assert!(!report.catalog_changed);
        prop_assert_eq!(report.unchanged as usize, findings.len());
        prop_assert!(report.modalities.iter().all(|m| m.net_resolved == 0));
    }
}
