use tracing::{info, warn};

use specguard_analytics::{summarize_coverage, track_delta};
use specguard_domain::{Catalog, Checker, EvalMode, KnowledgeBase};
use specguard_types::{
    Baseline, FailOn, HarnessResult, RESULT_SCHEMA_V1, SeverityCounts, TOOL_NAME, ToolMeta,
};

/// Label used when neither the plan nor the knowledge base names the specification version.
pub const UNLABELLED_SPEC: &str = "unlabelled";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessPlan {
    /// Harness version tag recorded in the result, e.g. "v3".
    pub version: String,
    /// Overrides the knowledge base label.
    pub spec_version: Option<String>,
    pub dataset: Option<String>,
    pub fail_on: FailOn,
    pub mode: EvalMode,
}

impl Default for HarnessPlan {
    fn default() -> Self {
        Self {
            version: "v1".to_string(),
            spec_version: None,
            dataset: None,
            fail_on: FailOn::Never,
            mode: EvalMode::Sequential,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessRun {
    pub result: HarnessResult,
    pub markdown: String,
    pub exit_code: i32,
}

/// Evaluates the catalog, aggregates coverage and, when a baseline is given,
/// tracks the delta against it.
pub fn run_harness(
    plan: &HarnessPlan,
    catalog: &Catalog,
    kb: &KnowledgeBase,
    baseline: Option<&Baseline>,
) -> HarnessRun {
    let mut store = Checker::new(catalog, kb).mode(plan.mode).run();

    let delta = baseline.map(|b| {
        if let Err(err) = store.annotate_baseline(&b.severities) {
            warn!(%err, "skipping baseline annotation");
        }
        track_delta(store.as_slice(), b)
    });

    let findings = store.into_vec();
    let coverage = summarize_coverage(&findings);
    let totals = coverage.totals.clone();

    let spec_version = plan
        .spec_version
        .clone()
        .or_else(|| kb.label().map(str::to_string))
        .unwrap_or_else(|| UNLABELLED_SPEC.to_string());

    let result = HarnessResult {
        schema: RESULT_SCHEMA_V1.to_string(),
        tool: ToolMeta {
            name: TOOL_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        version: plan.version.clone(),
        spec_version,
        dataset: plan.dataset.clone(),
        total_checks: totals.total,
        passes: totals.pass,
        gaps: totals.gap,
        mismatches: totals.mismatch,
        missing: totals.missing,
        info: totals.info,
        remaining_gaps: totals.failing(),
        resolved_from_baseline: delta.as_ref().map(|d| d.resolved),
        baseline_total_gaps: delta.as_ref().map(|d| d.baseline_total_failing),
        coverage,
        delta,
        findings,
    };

    let markdown = crate::render::render_markdown_for_result(&result);
    let exit_code = compute_exit_code(plan.fail_on, &totals);

    info!(
        total = result.total_checks,
        pass = result.passes,
        remaining = result.remaining_gaps,
        coverage = %result.coverage.coverage,
        exit_code,
        "harness run complete"
    );

    HarnessRun {
        result,
        markdown,
        exit_code,
    }
}

/// 0 when the run satisfies the fail policy, 2 when it trips.
pub fn compute_exit_code(fail_on: FailOn, counts: &SeverityCounts) -> i32 {
    let tripped = match fail_on {
        FailOn::Never => false,
        FailOn::Missing => counts.missing > 0,
        FailOn::Failing => counts.failing() > 0,
    };
    if tripped { 2 } else { 0 }
}
