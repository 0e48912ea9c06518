//! Shared test utilities for the specguard workspace.
//!
//! This crate provides:
//! - **arb**: Proptest strategies for catalogs, knowledge bases, findings and baselines
//! - **fixtures**: The radar scenario and a multi-modality sample harness
//!
//! # Example
//!
//! ```rust,ignore
//! use specguard_testkit::arb;
//! use proptest::prelude::*;
//!
//! proptest! {
//!     fn catalogs_compile(checks in arb::arb_check_configs()) {
//!         assert!(specguard_domain::compile_catalog(&checks).is_ok());
//!     }
//! }
//! ```

pub mod arb;
pub mod fixtures;

pub use arb::{
    arb_baseline, arb_check_configs, arb_fail_on, arb_finding, arb_findings,
    arb_knowledge_base_file, arb_predicate_config, arb_severity,
};
pub use fixtures::{baseline, finding, radar, sample_harness};
