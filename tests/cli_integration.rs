//! CLI integration tests
//!
//! Runs the compiled binary with a scrubbed environment so no remote
//! classifier or override model is reached.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

const SCRUBBED_VARS: &[&str] = &[
    "HF_TOKEN",
    "CIFORGE_CLASSIFIER_TOKEN",
    "CIFORGE_OVERRIDE_MODEL",
    "CIFORGE_TEMPLATE_POLICY",
    "CIFORGE_MERGE_THRESHOLD",
    "CIFORGE_REQUEST_TIMEOUT",
    "CIFORGE_LOG_LEVEL",
    "CIFORGE_LOG_JSON",
];

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/features")
        .join(name)
}

fn ciforge() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ciforge"));
    for var in SCRUBBED_VARS {
        cmd.env_remove(var);
    }
    cmd.env("CIFORGE_CACHE_ENABLED", "false");
    cmd
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_cli_help() {
    let output = ciforge().arg("--help").output().unwrap();
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("analyze"));
    assert!(text.contains("detect"));
    assert!(text.contains("health"));
}

#[test]
fn test_cli_version() {
    let output = ciforge().arg("--version").output().unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_analyze_prints_parameter_json() {
    let output = ciforge()
        .args(["analyze", "--quiet"])
        .arg(fixture_path("node_docker.json"))
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let doc: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(doc["project_type"], "node");
    assert_eq!(doc["package_manager"], "npm");
    assert_eq!(doc["container"]["enabled"], true);
    assert_eq!(doc["container"]["image"], "ghcr.io/acme/checkout-api");
}

#[test]
fn test_analyze_yaml_format() {
    let output = ciforge()
        .args(["analyze", "--quiet", "--format", "yaml"])
        .arg(fixture_path("python_java.json"))
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let doc: serde_yaml::Value = serde_yaml::from_str(&stdout(&output)).unwrap();
    assert_eq!(doc["project_type"].as_str(), Some("python"));
}

#[test]
fn test_analyze_report_from_stdin() {
    let mut child = ciforge()
        .args(["analyze", "--quiet", "--report", "--policy", "multi"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    let raw = std::fs::read_to_string(fixture_path("monorepo.json")).unwrap();
    child.stdin.take().unwrap().write_all(raw.as_bytes()).unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["primary"], "node");
    assert_eq!(report["repository"], "acme/platform");
    assert_eq!(report["classifier"]["source"], "heuristic");
    assert!(report["chosen"].as_array().unwrap().len() > 1);
    assert!(report["run_id"].as_str().is_some());
}

#[test]
fn test_analyze_writes_output_file() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("params/static.json");
    let output = ciforge()
        .args(["analyze", "--quiet"])
        .arg(fixture_path("static_site.json"))
        .arg("--output")
        .arg(&out)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).is_empty());

    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(doc["deploy"]["provider"], "netlify");
}

#[test]
fn test_detect_json() {
    let output = ciforge()
        .args(["detect", "--format", "json"])
        .arg(fixture_path("go_service.json"))
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let detection: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(detection["candidates"][0]["label"], "go");
    assert!(detection["summary"].as_str().unwrap().contains("go.mod"));
}

#[test]
fn test_detect_human_is_default() {
    let output = ciforge()
        .arg("detect")
        .arg(fixture_path("empty_repo.json"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Rule Candidates"));
    assert!(text.contains("generic"));
}

#[test]
fn test_invalid_json_exits_with_failure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();

    let output = ciforge().arg("analyze").arg(&path).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Error"));
}

#[test]
fn test_missing_input_exits_with_failure() {
    let output = ciforge()
        .args(["analyze", "/nonexistent/features.json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_invalid_config_exits_with_config_error() {
    let output = ciforge()
        .env("CIFORGE_REQUEST_TIMEOUT", "0")
        .arg("analyze")
        .arg(fixture_path("node_basic.json"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("timeout"));
}

#[test]
fn test_invalid_threshold_rejected_by_parser() {
    let output = ciforge()
        .args(["analyze", "--threshold", "1.5"])
        .arg(fixture_path("node_basic.json"))
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_health_without_classifier_succeeds() {
    let output = ciforge()
        .args(["health", "--format", "json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

    let health: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(health["checks"]["configuration"]["available"], true);
    assert_eq!(health["checks"]["classifier"]["available"], false);
    assert_eq!(health["checks"]["override"]["available"], false);
}

#[test]
fn test_health_invalid_config() {
    let output = ciforge()
        .env("CIFORGE_MERGE_THRESHOLD", "7")
        .arg("health")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}
