//! Proptest strategies for generating valid test inputs.
//!
//! Strategies are constructive: generated catalogs always compile and
//! generated knowledge bases always load. Names are drawn from small
//! pools so that predicates and knowledge bases overlap often enough to
//! exercise every outcome.
//!
//! # Bounds
//!
//! - Max checks per catalog: 24
//! - Max members per predicate: 4
//! - Max modalities: 5

use std::collections::BTreeMap;

use proptest::prelude::*;
use specguard_types::{
    Baseline, CheckConfig, FailOn, Finding, KnowledgeBaseFile, PolicyConfig, PredicateConfig,
    Severity, StructureDef, StructureKind,
};

// =============================================================================
// Pools and bounds
// =============================================================================

pub const MAX_CHECKS: usize = 24;

pub const MAX_MEMBERS_PER_PREDICATE: usize = 4;

pub const STRUCTURES: &[&str] = &[
    "Detection",
    "SensorType",
    "Frame",
    "FrameHeader",
    "RadarMeta",
];

pub const MEMBERS: &[&str] = &[
    "position",
    "velocity",
    "velocity_xyz",
    "rcs",
    "hdr",
    "blobs",
    "has_velocity",
    "SHORT_RANGE",
    "LONG_RANGE",
    "IMAGING_4D",
];

pub const MODALITIES: &[&str] = &["Radar", "Vision", "Lidar", "Semantics", "Common"];

// =============================================================================
// Enum Strategies
// =============================================================================

pub fn arb_severity() -> impl Strategy<Value = Severity> {
    prop::sample::select(Severity::ALL.to_vec())
}

/// Only `GAP`, `MISMATCH` and `MISSING`.
pub fn arb_failing_severity() -> impl Strategy<Value = Severity> {
    prop::sample::select(Severity::FAILING.to_vec())
}

pub fn arb_fail_on() -> impl Strategy<Value = FailOn> {
    prop_oneof![
        Just(FailOn::Missing),
        Just(FailOn::Failing),
        Just(FailOn::Never),
    ]
}

pub fn arb_structure_kind() -> impl Strategy<Value = StructureKind> {
    prop_oneof![Just(StructureKind::Fields), Just(StructureKind::Enumeration)]
}

// =============================================================================
// Name Strategies
// =============================================================================

pub fn arb_structure_name() -> impl Strategy<Value = String> {
    prop::sample::select(STRUCTURES).prop_map(str::to_string)
}

pub fn arb_member_name() -> impl Strategy<Value = String> {
    prop::sample::select(MEMBERS).prop_map(str::to_string)
}

pub fn arb_modality() -> impl Strategy<Value = String> {
    prop::sample::select(MODALITIES).prop_map(str::to_string)
}

/// Non-empty list of distinct members.
pub fn arb_member_list() -> impl Strategy<Value = Vec<String>> {
    prop::sample::subsequence(MEMBERS, 1..=MAX_MEMBERS_PER_PREDICATE)
        .prop_map(|v| v.into_iter().map(str::to_string).collect())
}

/// Strategy for generating non-empty strings suitable for titles and details.
pub fn arb_non_empty_string() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_ .\\-]{0,39}")
        .expect("valid regex for non-empty string")
}

// =============================================================================
// Catalog Strategies
// =============================================================================

/// Any declarative predicate with a non-empty member list.
pub fn arb_predicate_config() -> impl Strategy<Value = PredicateConfig> {
    prop_oneof![
        (arb_structure_name(), arb_member_name())
            .prop_map(|(structure, member)| PredicateConfig::HasMember { structure, member }),
        (arb_structure_name(), arb_member_list())
            .prop_map(|(structure, members)| PredicateConfig::HasAll { structure, members }),
        (arb_structure_name(), arb_member_list())
            .prop_map(|(structure, members)| PredicateConfig::HasAny { structure, members }),
        (arb_structure_name(), arb_member_name(), arb_member_list()).prop_map(
            |(structure, claim, requires)| PredicateConfig::Companion {
                structure,
                claim,
                requires,
            }
        ),
        (
            arb_structure_name(),
            prop::collection::vec(arb_member_name(), 1..3)
        )
            .prop_map(|(structure, path)| PredicateConfig::Path { structure, path }),
        (arb_severity(), arb_non_empty_string())
            .prop_map(|(severity, detail)| PredicateConfig::Attest { severity, detail }),
    ]
}

/// Policies only ever map failure cases to failing severities.
pub fn arb_policy_config() -> impl Strategy<Value = PolicyConfig> {
    (
        prop::option::of(arb_failing_severity()),
        prop::option::of(arb_failing_severity()),
        prop::option::of(arb_failing_severity()),
    )
        .prop_map(|(absent, partial, conflict)| PolicyConfig {
            absent,
            partial,
            conflict,
        })
}

/// A check with the given id.
pub fn arb_check_config_with_id(id: String) -> impl Strategy<Value = CheckConfig> {
    (
        arb_modality(),
        arb_non_empty_string(),
        arb_predicate_config(),
        prop::option::of(arb_policy_config()),
        prop::option::of(arb_non_empty_string()),
    )
        .prop_map(move |(modality, title, predicate, policy, note)| CheckConfig {
            id: id.clone(),
            modality,
            title,
            predicate,
            policy,
            note,
        })
}

/// A list of checks with unique ids `CHK-000`, `CHK-001`, ... that always compiles.
pub fn arb_check_configs() -> impl Strategy<Value = Vec<CheckConfig>> {
    (0..=MAX_CHECKS).prop_flat_map(|n| {
        (0..n)
            .map(|i| arb_check_config_with_id(format!("CHK-{i:03}")))
            .collect::<Vec<_>>()
    })
}

// =============================================================================
// Knowledge Base Strategies
// =============================================================================

/// A knowledge base over a subset of [`STRUCTURES`].
///
/// Field structures that contain `hdr` reference `FrameHeader`, which may or
/// may not be present, so path predicates hit both the resolved and the
/// missing-reference branches.
pub fn arb_knowledge_base_file() -> impl Strategy<Value = KnowledgeBaseFile> {
    let structure = (
        arb_structure_kind(),
        prop::sample::subsequence(MEMBERS, 0..=MEMBERS.len()),
    )
        .prop_map(|(kind, members)| {
            let members: Vec<String> = members.into_iter().map(str::to_string).collect();
            let mut refs = BTreeMap::new();
            if kind == StructureKind::Fields && members.iter().any(|m| m == "hdr") {
                refs.insert("hdr".to_string(), "FrameHeader".to_string());
            }
            StructureDef {
                kind,
                members,
                refs,
            }
        });

    (
        prop::option::of(arb_non_empty_string()),
        prop::collection::btree_map(arb_structure_name(), structure, 0..=STRUCTURES.len()),
    )
        .prop_map(|(label, structure)| KnowledgeBaseFile { label, structure })
}

// =============================================================================
// Finding and Baseline Strategies
// =============================================================================

pub fn arb_finding() -> impl Strategy<Value = Finding> {
    (
        arb_modality(),
        prop::string::string_regex("[A-Z]{1,2}-[0-9]{2}").expect("valid regex for check id"),
        arb_non_empty_string(),
        arb_severity(),
        arb_non_empty_string(),
    )
        .prop_map(|(modality, check_id, title, severity, detail)| Finding {
            modality,
            check_id,
            title,
            severity,
            detail,
            baseline_severity: None,
        })
}

pub fn arb_findings() -> impl Strategy<Value = Vec<Finding>> {
    prop::collection::vec(arb_finding(), 0..=MAX_CHECKS)
}

/// A baseline over the ids `CHK-000` .. `CHK-{MAX_CHECKS}`, so it overlaps
/// with [`arb_check_configs`] and also carries dropped ids.
pub fn arb_baseline() -> impl Strategy<Value = Baseline> {
    prop::collection::btree_map(
        (0..=MAX_CHECKS).prop_map(|i| format!("CHK-{i:03}")),
        arb_severity(),
        0..=MAX_CHECKS,
    )
    .prop_map(|severities| Baseline {
        severities,
        ..Baseline::default()
    })
}
