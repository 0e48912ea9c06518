//! Core engine: orchestrates evaluation + aggregation + delta tracking + reporting.

mod check;
mod render;

pub use check::{HarnessPlan, HarnessRun, UNLABELLED_SPEC, compute_exit_code, run_harness};
pub use render::{render_coverage_matrix, render_markdown_for_result};
