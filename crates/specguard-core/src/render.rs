use std::fmt::Write as _;

use specguard_types::{
    CoverageSummary, DeltaClass, DeltaReport, Finding, HarnessResult, ModalityDelta, Severity,
};

pub fn render_markdown_for_result(result: &HarnessResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "## specguard {}: {}\n\n",
        escape_md(&result.version),
        escape_md(&result.spec_version)
    ));

    if let Some(dataset) = &result.dataset {
        out.push_str(&format!("Dataset: **{}**\n\n", escape_md(dataset)));
    }

    out.push_str(&format!(
        "**{}/{}** PASS | **{}** remaining",
        result.passes, result.total_checks, result.remaining_gaps
    ));
    if let Some(resolved) = result.resolved_from_baseline {
        out.push_str(&format!(" | **{resolved}** resolved from baseline"));
    }
    out.push_str("\n\n");

    if result.findings.is_empty() {
        out.push_str("No checks.\n");
        return out;
    }

    for m in &result.coverage.modalities {
        let resolved = result.delta.as_ref().map(|_| {
            result
                .findings
                .iter()
                .filter(|f| f.modality == m.modality && is_resolved(f))
                .count()
        });
        match resolved {
            Some(n) => out.push_str(&format!(
                "### {} ({}/{} pass, {n} resolved)\n\n",
                escape_md(&m.modality),
                m.counts.pass,
                m.counts.total
            )),
            None => out.push_str(&format!(
                "### {} ({}/{} pass)\n\n",
                escape_md(&m.modality),
                m.counts.pass,
                m.counts.total
            )),
        }
        out.push_str("| Check | Severity | Title | Detail |\n");
        out.push_str("|---|---|---|---|\n");
        for f in result.findings.iter().filter(|f| f.modality == m.modality) {
            out.push_str(&render_finding_row(f));
        }
        out.push('\n');
    }

    out.push_str("### Coverage\n\n");
    out.push_str(&render_coverage_matrix(&result.coverage));
    out.push('\n');

    let deferred: Vec<&Finding> = result.findings.iter().filter(|f| is_deferred(f)).collect();
    if !deferred.is_empty() {
        out.push_str("### Deferred items\n\n");
        for f in deferred {
            let _ = writeln!(
                out,
                "- `{}` {}: {}",
                escape_md(&f.check_id),
                escape_md(&f.title),
                f.severity
            );
        }
        out.push('\n');
    }

    if let Some(delta) = &result.delta {
        out.push_str(&render_delta(delta, &result.findings));
    }

    out
}

/// Coverage table: one row per modality in first-seen order plus a TOTAL row.
pub fn render_coverage_matrix(summary: &CoverageSummary) -> String {
    let mut out = String::new();
    out.push_str("| Modality | Checks | Pass | Gap | Missing | Coverage |\n");
    out.push_str("|---|---:|---:|---:|---:|---:|\n");
    for m in &summary.modalities {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} |",
            escape_md(&m.modality),
            m.counts.total,
            m.counts.pass,
            m.counts.gap,
            m.counts.missing,
            m.coverage
        );
    }
    let t = &summary.totals;
    let _ = writeln!(
        out,
        "| **TOTAL** | {} | {} | {} | {} | {} |",
        t.total, t.pass, t.gap, t.missing, summary.coverage
    );
    out
}

fn is_resolved(f: &Finding) -> bool {
    f.severity == Severity::Pass && f.baseline_severity.is_some_and(Severity::is_failing)
}

/// Findings whose detail marks them as under separate discussion.
fn is_deferred(f: &Finding) -> bool {
    f.detail.contains("Deferred") || f.detail.contains("deferred")
}

fn render_finding_row(f: &Finding) -> String {
    let severity = match f.baseline_severity {
        Some(prior) if prior != f.severity => format!("{} (was {prior})", f.severity),
        _ => f.severity.to_string(),
    };
    format!(
        "| `{id}` | {severity} | {title} | {detail} |\n",
        id = escape_md(&f.check_id),
        title = escape_md(&f.title),
        detail = escape_md(&f.detail),
    )
}

fn render_delta(delta: &DeltaReport, findings: &[Finding]) -> String {
    let mut out = String::new();
    match &delta.baseline_label {
        Some(label) => out.push_str(&format!("### Delta from baseline `{}`\n\n", escape_md(label))),
        None => out.push_str("### Delta from baseline\n\n"),
    }

    if delta.catalog_changed {
        out.push_str(
            "> **Note:** the catalog changed since the baseline was recorded; \
             renumbered checks are reported as new.\n\n",
        );
    }

    let _ = writeln!(
        out,
        "Resolved **{}** | regressed **{}** | shifted **{}** | unchanged **{}** | new **{}**\n",
        delta.resolved, delta.regressed, delta.shifted, delta.unchanged, delta.new
    );

    for (heading, class) in [
        ("Resolved", DeltaClass::Resolved),
        ("Regressed", DeltaClass::Regressed),
    ] {
        let rows: Vec<_> = delta.checks.iter().filter(|c| c.class == class).collect();
        let _ = writeln!(out, "**{heading}: {}**\n", rows.len());
        for c in rows {
            let was = c.baseline.map(Severity::as_str).unwrap_or("none");
            let _ = writeln!(
                out,
                "- `{}` {} (was {was}, now {})",
                escape_md(&c.check_id),
                escape_md(&c.title),
                c.current
            );
        }
        out.push('\n');
    }

    let _ = writeln!(out, "**Remaining: {}**\n", delta.remaining);
    for f in findings.iter().filter(|f| f.severity.is_failing()) {
        let _ = writeln!(
            out,
            "- `{}` {}: {}",
            escape_md(&f.check_id),
            escape_md(&f.title),
            f.severity
        );
    }
    out.push('\n');

    if !delta.dropped.is_empty() {
        let ids: Vec<String> = delta
            .dropped
            .iter()
            .map(|id| format!("`{}`", escape_md(id)))
            .collect();
        let _ = writeln!(out, "Dropped since baseline: {}\n", ids.join(", "));
    }

    if !delta.modalities.is_empty() {
        out.push_str(&render_scorecard(&delta.modalities));
        out.push('\n');
    }

    out
}

fn render_scorecard(rows: &[ModalityDelta]) -> String {
    let mut out = String::new();
    out.push_str("| Modality | Baseline | Current | Resolved | Status |\n");
    out.push_str("|---|---:|---:|---:|---|\n");

    let (mut before, mut after) = (0u32, 0u32);
    for m in rows {
        let status = if m.current_failing == 0 {
            "complete".to_string()
        } else {
            format!("{} remaining", m.current_failing)
        };
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {status} |",
            escape_md(&m.modality),
            m.baseline_failing,
            m.current_failing,
            m.net_resolved
        );
        before = before.saturating_add(m.baseline_failing);
        after = after.saturating_add(m.current_failing);
    }
    let _ = writeln!(
        out,
        "| **TOTAL** | {before} | {after} | {} | |",
        i64::from(before) - i64::from(after)
    );
    out
}

fn escape_md(s: &str) -> String {
    s.replace('|', "\\|").replace('`', "\\`")
}
