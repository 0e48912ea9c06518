use assert_cmd::Command;
use assert_cmd::cargo;
use tempfile::TempDir;

use specguard_testkit::fixtures::{radar, sample_harness};

/// Knowledge base from before per-detection velocity was added.
const RADAR_PRIOR_KB: &str = r#"
label = "SpatialDDS 1.3"

[structure.Detection]
members = ["position"]

[structure.SensorType]
kind = "enumeration"
members = ["SHORT_RANGE"]
"#;

fn write_radar(dir: &std::path::Path) {
    std::fs::write(dir.join("catalog.toml"), radar::CATALOG_TOML).unwrap();
    std::fs::write(dir.join("kb.toml"), radar::KB_TOML).unwrap();
}

fn specguard(dir: &std::path::Path) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("specguard"));
    cmd.current_dir(dir);
    cmd
}

fn read_json(path: &std::path::Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn prints_markdown_and_passes_without_fail_policy() {
    let td = TempDir::new().expect("temp");
    write_radar(td.path());

    let output = specguard(td.path())
        .args(["check", "--catalog", "catalog.toml", "--kb", "kb.toml"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("## specguard v1: SpatialDDS 1.4"));
    assert!(stdout.contains("**1/3** PASS | **2** remaining"));
    assert!(stdout.contains("| Radar | 3 | 1 | 0 | 2 | 33% |"));
}

#[test]
fn fail_on_missing_exits_2_and_writes_artifacts() {
    let td = TempDir::new().expect("temp");
    write_radar(td.path());

    let output = specguard(td.path())
        .args([
            "check",
            "--catalog",
            "catalog.toml",
            "--kb",
            "kb.toml",
            "--fail-on",
            "missing",
            "--out",
            "artifacts/specguard/result.json",
            "--md",
            "artifacts/specguard/report.md",
        ])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());

    let result = read_json(&td.path().join("artifacts/specguard/result.json"));
    assert_eq!(result["schema"], "specguard.result.v1");
    assert_eq!(result["total_checks"], 3);
    assert_eq!(result["passes"], 1);
    assert_eq!(result["missing"], 2);
    assert_eq!(result["findings"][1]["check_id"], "B");
    assert_eq!(result["findings"][1]["severity"], "MISSING");

    let md = std::fs::read_to_string(td.path().join("artifacts/specguard/report.md")).unwrap();
    assert!(md.contains("### Radar (1/3 pass)"));
}

#[test]
fn fail_on_failing_trips_on_gaps_but_missing_does_not() {
    let td = TempDir::new().expect("temp");
    std::fs::write(
        td.path().join("catalog.toml"),
        r#"
[[check]]
id = "G-01"
modality = "Vision"
title = "Key frame flag"
predicate = { kind = "has_member", structure = "VisionFrame", member = "is_key_frame" }
policy = { absent = "gap" }
"#,
    )
    .unwrap();
    std::fs::write(
        td.path().join("kb.toml"),
        "[structure.VisionFrame]\nmembers = [\"hdr\"]\n",
    )
    .unwrap();

    for (fail_on, code) in [("missing", 0), ("failing", 2), ("never", 0)] {
        let output = specguard(td.path())
            .args([
                "check",
                "--catalog",
                "catalog.toml",
                "--kb",
                "kb.toml",
                "--fail-on",
                fail_on,
            ])
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(code), "fail_on={fail_on}");
    }
}

#[test]
fn catalog_defaults_apply_and_flags_override_them() {
    let td = TempDir::new().expect("temp");
    std::fs::write(td.path().join("catalog.toml"), sample_harness::CATALOG_TOML).unwrap();
    std::fs::write(td.path().join("kb.toml"), sample_harness::KB_TOML).unwrap();

    // `[defaults] fail_on = "missing"` and S-02 is MISSING.
    specguard(td.path())
        .args(["check", "--catalog", "catalog.toml", "--kb", "kb.toml"])
        .assert()
        .code(2);

    specguard(td.path())
        .args([
            "check",
            "--catalog",
            "catalog.toml",
            "--kb",
            "kb.toml",
            "--fail-on",
            "never",
            "--parallel",
        ])
        .assert()
        .code(0);
}

#[test]
fn json_knowledge_base_matches_toml() {
    let td = TempDir::new().expect("temp");
    write_radar(td.path());
    std::fs::write(td.path().join("kb.json"), radar::KB_JSON).unwrap();

    for kb in ["kb.toml", "kb.json"] {
        specguard(td.path())
            .args([
                "check",
                "--catalog",
                "catalog.toml",
                "--kb",
                kb,
                "--out",
                &format!("{kb}.result.json"),
            ])
            .assert()
            .code(0);
    }

    let from_toml = read_json(&td.path().join("kb.toml.result.json"));
    let from_json = read_json(&td.path().join("kb.json.result.json"));
    assert_eq!(from_toml["findings"], from_json["findings"]);
}

#[test]
fn baseline_round_trip_reports_resolved_checks() {
    let td = TempDir::new().expect("temp");
    write_radar(td.path());
    std::fs::write(td.path().join("prior.toml"), RADAR_PRIOR_KB).unwrap();

    specguard(td.path())
        .args([
            "check",
            "--catalog",
            "catalog.toml",
            "--kb",
            "prior.toml",
            "--version-tag",
            "v1",
            "--out",
            "prior.json",
        ])
        .assert()
        .code(0);

    specguard(td.path())
        .args(["baseline", "--from", "prior.json", "--out", "baseline.json"])
        .assert()
        .success();

    let baseline = read_json(&td.path().join("baseline.json"));
    assert_eq!(baseline["schema"], "specguard.baseline.v1");
    assert_eq!(baseline["severities"]["A"], "MISSING");
    assert!(baseline["created_at"].is_string());
    assert!(baseline["catalog_digest"].is_string());

    let output = specguard(td.path())
        .args([
            "check",
            "--catalog",
            "catalog.toml",
            "--kb",
            "kb.toml",
            "--baseline",
            "baseline.json",
            "--version-tag",
            "v2",
            "--out",
            "current.json",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("**1** resolved from baseline"));
    assert!(stdout.contains("- `A` Per-detection velocity (was MISSING, now PASS)"));
    assert!(!stdout.contains("the catalog changed"));

    let current = read_json(&td.path().join("current.json"));
    assert_eq!(current["resolved_from_baseline"], 1);
    assert_eq!(current["baseline_total_gaps"], 3);
    assert_eq!(current["findings"][0]["baseline_severity"], "MISSING");
}

#[test]
fn missing_knowledge_base_is_an_error() {
    let td = TempDir::new().expect("temp");
    write_radar(td.path());

    let output = specguard(td.path())
        .args(["check", "--catalog", "catalog.toml", "--kb", "nope.toml"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("read knowledge base"));
}

#[test]
fn result_file_is_accepted_as_baseline() {
    let td = TempDir::new().expect("temp");
    write_radar(td.path());
    std::fs::write(td.path().join("prior.toml"), RADAR_PRIOR_KB).unwrap();

    specguard(td.path())
        .args([
            "check",
            "--catalog",
            "catalog.toml",
            "--kb",
            "prior.toml",
            "--out",
            "prior.json",
        ])
        .assert()
        .code(0);

    specguard(td.path())
        .args([
            "check",
            "--catalog",
            "catalog.toml",
            "--kb",
            "kb.toml",
            "--baseline",
            "prior.json",
            "--out",
            "current.json",
        ])
        .assert()
        .code(0);

    let current = read_json(&td.path().join("current.json"));
    assert_eq!(current["resolved_from_baseline"], 1);
    assert_eq!(current["baseline_total_gaps"], 3);
    assert_eq!(current["delta"]["new"], 0);
    assert_eq!(current["findings"][0]["baseline_severity"], "MISSING");
}

#[test]
fn baseline_with_foreign_schema_is_rejected() {
    let td = TempDir::new().expect("temp");
    write_radar(td.path());
    std::fs::write(
        td.path().join("baseline.json"),
        r#"{"schema":"coverage.report.v3","severities":{"A":"MISSING"}}"#,
    )
    .unwrap();

    let output = specguard(td.path())
        .args([
            "check",
            "--catalog",
            "catalog.toml",
            "--kb",
            "kb.toml",
            "--baseline",
            "baseline.json",
        ])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("has schema 'coverage.report.v3'"));
    assert!(stderr.contains("specguard baseline --from"));
}

#[test]
fn included_fail_on_survives_partial_defaults_in_main_catalog() {
    let td = TempDir::new().expect("temp");
    std::fs::write(
        td.path().join("radar.toml"),
        format!("[defaults]\nfail_on = \"missing\"\n{}", radar::CATALOG_TOML),
    )
    .unwrap();
    std::fs::write(
        td.path().join("catalog.toml"),
        "includes = [\"radar.toml\"]\n\n[defaults]\nparallel = true\n",
    )
    .unwrap();
    std::fs::write(td.path().join("kb.toml"), radar::KB_TOML).unwrap();

    specguard(td.path())
        .args(["check", "--catalog", "catalog.toml", "--kb", "kb.toml"])
        .assert()
        .code(2);
}
