//! CLI integration tests

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

/// Build command for the kihier-cli binary (finds it in target/debug when run via cargo test).
fn kihier_cli() -> Command {
    cargo_bin_cmd!("kihier-cli")
}

/// Path to kihier library test fixtures (relative to workspace).
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("kihier")
        .join("tests")
        .join("fixtures")
}

fn json_stdout(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.output().unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn test_cli_help() {
    let mut cmd = kihier_cli();

    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("KiCad"))
        .stdout(predicate::str::contains("clone"));
}

#[test]
fn test_cli_version() {
    let mut cmd = kihier_cli();

    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_parse_file() {
    let mut cmd = kihier_cli();
    let path = fixtures_dir().join("demo").join("demo.kicad_pcb");

    cmd.arg("parse").arg(path);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("(kicad_pcb)"))
        .stdout(predicate::str::contains("nodes"));
}

#[test]
fn test_cli_parse_print_with_reference_parser() {
    let mut cmd = kihier_cli();
    let path = fixtures_dir().join("demo").join("demo.kicad_sch");

    cmd.arg("--parser")
        .arg("reference")
        .arg("parse")
        .arg(path)
        .arg("--print");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Reference parser"))
        .stdout(predicate::str::contains("\"Amp A\""));
}

#[test]
fn test_cli_parse_json() {
    let path = fixtures_dir().join("demo").join("amp.kicad_sch");
    let json = json_stdout(kihier_cli().arg("parse").arg(path).arg("--format").arg("json"));

    assert_eq!(json["key"], "kicad_sch");
    assert_eq!(json["parser"], "batched");
    assert!(json["nodes"].as_u64().unwrap() > 10);
    assert!(json.get("tree").is_none());
}

#[test]
fn test_cli_tree() {
    let mut cmd = kihier_cli();
    let path = fixtures_dir().join("demo").join("demo.kicad_sch");

    cmd.arg("tree").arg(path);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("  Amp A [amp.kicad_sch] page 2"))
        .stdout(predicate::str::contains("  Amp B [amp.kicad_sch] page 3"));
}

#[test]
fn test_cli_tree_discovers_project_dir() {
    let json = json_stdout(
        kihier_cli()
            .arg("tree")
            .arg(fixtures_dir().join("nested"))
            .arg("-f")
            .arg("json"),
    );

    assert_eq!(json["project"], "nested");
    assert_eq!(json["sheets"].as_array().unwrap().len(), 5);
}

#[test]
fn test_cli_components_with_board() {
    let mut cmd = kihier_cli();

    cmd.arg("components").arg(fixtures_dir().join("demo"));
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("U2"))
        .stdout(predicate::str::contains("LM358"))
        .stdout(predicate::str::contains("B.Cu (80, 40)"));
}

#[test]
fn test_cli_components_json() {
    let path = fixtures_dir().join("demo").join("demo.kicad_sch");
    let json = json_stdout(kihier_cli().arg("components").arg(path).arg("-f").arg("json"));

    let components = json.as_array().unwrap();
    assert_eq!(components.len(), 6);
    // Loaded without a board, so nothing is placed
    assert!(components.iter().all(|c| c["footprint"].is_null()));
}

#[test]
fn test_cli_check_valid_project() {
    let mut cmd = kihier_cli();

    cmd.arg("check").arg(fixtures_dir().join("demo"));
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("No issues found"))
        .stdout(predicate::str::contains("Board only:      1"));
}

#[test]
fn test_cli_check_structural_error() {
    let mut cmd = kihier_cli();
    let path = fixtures_dir().join("broken").join("broken.kicad_sch");

    cmd.arg("check").arg(path).arg("--format").arg("json");
    cmd.assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("\"ok\": false"))
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_cli_check_missing_file() {
    let mut cmd = kihier_cli();

    cmd.arg("check").arg("/nonexistent/path/design.kicad_sch");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_cli_clone_relative() {
    let mut cmd = kihier_cli();

    cmd.arg("clone").arg(fixtures_dir().join("demo")).arg("U1");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("move R2 by (20, 0)"))
        .stdout(predicate::str::contains("rotate R2 by 270° around (160, 80)"))
        .stdout(predicate::str::contains("F.Cu (160, 80) -90°"));
}

#[test]
fn test_cli_clone_grid_json() {
    let json = json_stdout(
        kihier_cli()
            .arg("clone")
            .arg(fixtures_dir().join("demo"))
            .arg("R1")
            .args(["--grid", "2", "--spacing-x", "50", "--spacing-y", "30"])
            .args(["--format", "json"]),
    );

    assert_eq!(json["anchor"], "R1");
    assert_eq!(json["targets"].as_array().unwrap().len(), 1);
    assert!(!json["commands"].as_array().unwrap().is_empty());
    let placements = json["placements"].as_array().unwrap();
    let r2 = placements.iter().find(|p| p["reference"] == "R2").unwrap();
    assert_eq!(r2["placement"]["position"]["x"], 150.0);
    assert_eq!(r2["placement"]["position"]["y"], 50.0);
}

#[test]
fn test_cli_clone_without_board_fails() {
    let mut cmd = kihier_cli();

    cmd.arg("clone").arg(fixtures_dir().join("nested")).arg("C10");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("no board file"));
}

#[test]
fn test_cli_clone_unknown_anchor() {
    let mut cmd = kihier_cli();

    cmd.arg("clone").arg(fixtures_dir().join("demo")).arg("Q9");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Q9"));
}
