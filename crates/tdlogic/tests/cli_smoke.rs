//! CLI smoke tests for `tdl`.
//!
//! Every command runs with `TDLOGIC_CONFIG` pointing at a temp config so the
//! user's own config never leaks in.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

#[allow(deprecated)]
fn tdl(config_dir: &Path) -> Command {
    let config = config_dir.join("tdlogic.toml");
    fs::write(&config, "[general]\nlog_level = \"error\"\n").expect("write config");
    let mut cmd = Command::cargo_bin("tdl").expect("tdl binary should be built");
    cmd.env("TDLOGIC_CONFIG", config);
    cmd.env_remove("RUST_LOG");
    cmd
}

const SNAPSHOT: &str = r#"{
  "threads": [
    {
      "name": "[STUCK] ExecuteThread: '3' for queue: 'ReportQueue'",
      "stack": "\tat com.example.Report.render(Report.java:12)\n",
      "state": "RUNNING"
    },
    { "name": "GC task thread#0 (ParallelGC)", "state": "RUNNING" }
  ]
}"#;

// =============================================================================
// analyze
// =============================================================================

#[test]
fn analyze_prints_json_report() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("snapshot.json");
    fs::write(&snapshot, SNAPSHOT).unwrap();

    let output = tdl(dir.path())
        .args(["analyze", snapshot.to_str().unwrap(), "--compact"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["summary"]["threads"], 2);
    assert_eq!(report["summary"]["worst_health"], "FATAL");
    assert_eq!(report["threads"][1]["group"], "JVM Threads");
}

#[test]
fn analyze_missing_snapshot_fails_with_context() {
    let dir = tempfile::tempdir().unwrap();
    tdl(dir.path())
        .args(["analyze", "/nonexistent/snapshot.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read snapshot"));
}

#[test]
fn analyze_bad_json_prints_remediation() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("broken.json");
    fs::write(&snapshot, "{\"threads\": [").unwrap();
    tdl(dir.path())
        .args(["analyze", snapshot.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("To fix:"));
}

#[test]
fn analyze_with_extra_advisories() {
    let dir = tempfile::tempdir().unwrap();
    let defs = dir.path().join("defs");
    fs::create_dir(&defs).unwrap();
    fs::write(
        defs.join("report.toml"),
        r#"
[[advisory]]
keyword = "com.example.Report.render"
health = "WATCH"
pattern = "Report Rendering"
"#,
    )
    .unwrap();
    let snapshot = dir.path().join("snapshot.json");
    fs::write(&snapshot, SNAPSHOT).unwrap();

    tdl(dir.path())
        .args(["analyze", snapshot.to_str().unwrap(), "--advisories", defs.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Report Rendering"));
}

// =============================================================================
// advisories / groups
// =============================================================================

#[test]
fn advisories_list_starts_with_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let output = tdl(dir.path()).args(["advisories", "list"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.lines().next().unwrap().starts_with("FATAL"));
    assert!(stdout.contains("Socket Read"));
}

#[test]
fn advisories_show_by_keyword_and_name() {
    let dir = tempfile::tempdir().unwrap();
    tdl(dir.path())
        .args(["advisories", "show", "java/net/SocketInputStream/socketRead0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Socket Read\""));
    tdl(dir.path())
        .args(["advisories", "show", "Stuck Thread"])
        .assert()
        .success()
        .stdout(predicate::str::contains("FATAL"));
}

#[test]
fn advisories_show_unknown_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    tdl(dir.path())
        .args(["advisories", "show", "no.such.Keyword"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No advisory matches"));
}

#[test]
fn groups_list_shows_kinds() {
    let dir = tempfile::tempdir().unwrap();
    tdl(dir.path())
        .args(["groups", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("muxer"))
        .stdout(predicate::str::contains("JVM Threads"));
}

#[test]
fn missing_explicit_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    tdl(dir.path())
        .args(["--config", "/nonexistent/tdlogic.toml", "groups", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("To fix:"));
}
