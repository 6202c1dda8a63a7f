//! Markdown report: summary table, then one section per case in run order.

#![allow(missing_docs)]

use std::fmt::Write as _;

use crate::report::ReportMeta;
use crate::report::tally::Tally;
use crate::scenario::test_case::TestCase;

/// Render the full report. Every case is included, whatever its verdict.
#[must_use]
pub fn render(cases: &[TestCase], meta: &ReportMeta) -> String {
    let tally = Tally::from_cases(cases);
    let mut out = String::with_capacity(4096);

    out.push_str("# Raft Cluster Integration Test Report\n\n");
    let _ = writeln!(
        out,
        "**Run date:** {}\n",
        meta.generated_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(hash) = &meta.config_hash {
        let _ = writeln!(out, "**Config fingerprint:** `{hash}`\n");
    }
    if meta.simulated {
        out.push_str("**Mode:** simulated cluster\n\n");
    }

    out.push_str("## Summary\n\n");
    out.push_str("| Status | Count |\n|--------|-------|\n");
    let _ = writeln!(out, "| PASS | {} |", tally.passed);
    let _ = writeln!(out, "| FAIL | {} |", tally.failed);
    let _ = writeln!(out, "| SKIP | {} |", tally.skipped);
    let _ = writeln!(out, "| **Total** | **{}** |\n", tally.total);

    out.push_str("## Detailed Results\n\n");
    for case in cases {
        render_case(&mut out, case);
    }
    out
}

fn render_case(out: &mut String, case: &TestCase) {
    let duration = case
        .duration()
        .map(|d| format!(" ({:.2}s)", d.as_secs_f64()))
        .unwrap_or_default();
    let _ = writeln!(
        out,
        "### {} {}{duration}\n",
        case.verdict().marker(),
        case.name()
    );
    let _ = writeln!(out, "{}\n", case.description());
    if case.logs().is_empty() {
        return;
    }
    out.push_str("**Execution log:**\n\n```\n");
    for line in case.logs() {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("```\n\n");
}
