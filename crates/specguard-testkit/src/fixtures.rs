//! Common test fixtures for specguard.
//!
//! Sample catalogs and knowledge bases, as parsed DTOs and as the TOML text
//! the CLI reads from disk.

use std::collections::BTreeMap;

use specguard_types::{
    Baseline, CatalogFile, CheckConfig, Finding, KnowledgeBaseFile, PredicateConfig, Severity,
};

/// Builds a finding with a generated title and detail.
pub fn finding(check_id: &str, modality: &str, severity: Severity) -> Finding {
    Finding {
        modality: modality.to_string(),
        check_id: check_id.to_string(),
        title: format!("check {check_id}"),
        severity,
        detail: format!("{check_id} is {severity}"),
        baseline_severity: None,
    }
}

/// Builds a baseline from `(check_id, severity)` pairs.
pub fn baseline(entries: &[(&str, Severity)]) -> Baseline {
    Baseline {
        severities: entries
            .iter()
            .map(|(id, s)| (id.to_string(), *s))
            .collect::<BTreeMap<_, _>>(),
        ..Baseline::default()
    }
}

// =============================================================================
// Radar scenario
// =============================================================================

/// Three radar checks over a knowledge base that lacks RCS and long-range sensors.
///
/// Expected: `A` PASS, `B` MISSING, `C` MISSING; coverage 33%.
pub mod radar {
    use super::*;

    pub const CATALOG_TOML: &str = r#"
[[check]]
id = "A"
modality = "Radar"
title = "Per-detection velocity"
predicate = { kind = "has_member", structure = "Detection", member = "velocity" }

[[check]]
id = "B"
modality = "Radar"
title = "Per-detection RCS"
predicate = { kind = "has_member", structure = "Detection", member = "rcs" }

[[check]]
id = "C"
modality = "Radar"
title = "Long-range sensor type"
predicate = { kind = "has_member", structure = "SensorType", member = "LONG_RANGE" }
"#;

    pub const KB_TOML: &str = r#"
label = "SpatialDDS 1.4"

[structure.Detection]
members = ["position", "velocity"]

[structure.SensorType]
kind = "enumeration"
members = ["SHORT_RANGE"]
"#;

    pub const KB_JSON: &str = r#"{
  "label": "SpatialDDS 1.4",
  "structure": {
    "Detection": { "members": ["position", "velocity"] },
    "SensorType": { "kind": "enumeration", "members": ["SHORT_RANGE"] }
  }
}"#;

    pub fn checks() -> Vec<CheckConfig> {
        let check = |id: &str, title: &str, structure: &str, member: &str| CheckConfig {
            id: id.to_string(),
            modality: "Radar".to_string(),
            title: title.to_string(),
            predicate: PredicateConfig::HasMember {
                structure: structure.to_string(),
                member: member.to_string(),
            },
            policy: None,
            note: None,
        };
        vec![
            check("A", "Per-detection velocity", "Detection", "velocity"),
            check("B", "Per-detection RCS", "Detection", "rcs"),
            check("C", "Long-range sensor type", "SensorType", "LONG_RANGE"),
        ]
    }

    pub fn catalog_file() -> CatalogFile {
        CatalogFile {
            check: checks(),
            ..CatalogFile::default()
        }
    }

    pub fn knowledge_base() -> KnowledgeBaseFile {
        toml::from_str(KB_TOML).expect("radar knowledge base fixture parses")
    }

    /// A prior run in which every radar check was failing.
    pub fn prior_baseline() -> Baseline {
        baseline(&[
            ("A", Severity::Missing),
            ("B", Severity::Missing),
            ("C", Severity::Gap),
        ])
    }
}

// =============================================================================
// Multi-modality harness
// =============================================================================

/// A dataset-mapping harness spanning several modalities and every predicate form.
pub mod sample_harness {
    use super::*;

    pub const CATALOG_TOML: &str = r#"
[defaults]
fail_on = "missing"

[[check]]
id = "R-01"
modality = "Radar"
title = "Detection-centric profile exists"
predicate = { kind = "has_all", structure = "RadDetection", members = ["xyz_m", "v_r_mps", "rcs_dbsm"] }

[[check]]
id = "R-02"
modality = "Radar"
title = "Per-detection velocity (Cartesian + radial)"
predicate = { kind = "companion", structure = "RadDetection", claim = "has_velocity_xyz", requires = ["velocity_xyz"] }

[[check]]
id = "R-06"
modality = "Radar"
title = "RadSensorType enum"
predicate = { kind = "has_any", structure = "RadSensorType", members = ["LONG_RANGE", "MEDIUM_RANGE"] }
policy = { absent = "gap" }

[[check]]
id = "V-04"
modality = "Vision"
title = "is_key_frame on VisionFrame"
predicate = { kind = "has_member", structure = "VisionFrame", member = "is_key_frame" }
policy = { absent = "gap" }

[[check]]
id = "V-05"
modality = "Vision"
title = "Quaternion reorder table"
predicate = { kind = "attest", severity = "PASS", detail = "Section 2 carries the reorder table." }

[[check]]
id = "L-02"
modality = "Lidar"
title = "Per-point timestamp layout"
predicate = { kind = "path", structure = "LidarFrame", path = ["layout", "XYZ_I_R_T"] }
note = "Spinning lidars need per-point time."

[[check]]
id = "S-02"
modality = "Semantics"
title = "Detection3D.attributes"
predicate = { kind = "has_member", structure = "Detection3D", member = "attributes" }
"#;

    pub const KB_TOML: &str = r#"
label = "SpatialDDS 1.5"

[structure.RadDetection]
members = ["xyz_m", "v_r_mps", "has_velocity_xyz"]

[structure.RadSensorType]
kind = "enumeration"
members = ["SHORT_RANGE", "MEDIUM_RANGE", "IMAGING_4D"]

[structure.VisionFrame]
members = ["hdr", "frame_seq"]

[structure.LidarFrame]
members = ["hdr", "layout"]
refs = { layout = "PointLayout" }

[structure.PointLayout]
kind = "enumeration"
members = ["XYZ_I", "XYZ_I_R", "XYZ_I_R_T"]
"#;

    /// Severities this harness produces, in catalog order.
    pub const EXPECTED: &[(&str, Severity)] = &[
        ("R-01", Severity::Gap),
        ("R-02", Severity::Mismatch),
        ("R-06", Severity::Pass),
        ("V-04", Severity::Gap),
        ("V-05", Severity::Pass),
        ("L-02", Severity::Pass),
        ("S-02", Severity::Missing),
    ];

    pub fn catalog_file() -> CatalogFile {
        toml::from_str(CATALOG_TOML).expect("sample catalog fixture parses")
    }

    pub fn knowledge_base() -> KnowledgeBaseFile {
        toml::from_str(KB_TOML).expect("sample knowledge base fixture parses")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radar_toml_matches_structs() {
        let parsed: CatalogFile = toml::from_str(radar::CATALOG_TOML).expect("parse");
        assert_eq!(parsed, radar::catalog_file());

        let from_json: KnowledgeBaseFile = serde_json::from_str(radar::KB_JSON).expect("parse");
        assert_eq!(from_json, radar::knowledge_base());
    }

    #[test]
    fn sample_harness_parses() {
        let catalog = sample_harness::catalog_file();
        assert_eq!(catalog.check.len(), sample_harness::EXPECTED.len());
        assert_eq!(sample_harness::knowledge_base().structure.len(), 5);
    }
}
