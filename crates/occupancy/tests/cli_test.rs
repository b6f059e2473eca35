//! Integration tests for the `occupancy` CLI binary.
//!
//! Every test runs against the fixtures in `tests/fixtures` with the
//! environment isolated from the user's real configuration.
#![allow(clippy::unwrap_used)]

use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `occupancy` binary with env isolation.
///
/// Clears the `OCCUPANCY_*` variables the CLI reads and points config
/// directories at a nonexistent path.
fn occupancy_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("occupancy");
    cmd.env("HOME", "/tmp/occupancy-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/occupancy-cli-test-nonexistent")
        .env("NO_COLOR", "1")
        .env_remove("OCCUPANCY_CONFIG")
        .env_remove("OCCUPANCY_OUTPUT")
        .env_remove("RUST_LOG");
    cmd
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// `occupancy --config tests/fixtures/house.toml <args>`
fn house_cmd(args: &[&str]) -> assert_cmd::Command {
    let mut cmd = occupancy_cmd();
    cmd.arg("--config").arg(fixture("house.toml")).args(args);
    cmd
}

fn walk() -> String {
    fixture("walk.jsonl").display().to_string()
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = occupancy_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    occupancy_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("replay")
            .and(predicate::str::contains("verify"))
            .and(predicate::str::contains("live")),
    );
}

#[test]
fn test_completions_zsh() {
    occupancy_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Configuration ───────────────────────────────────────────────────

#[test]
fn test_missing_config_exits_with_config_code() {
    let output = occupancy_cmd().args(["replay", &walk()]).output().unwrap();
    assert_eq!(output.status.code(), Some(3));
    let text = combined_output(&output);
    assert!(text.contains("config init"), "Expected init hint:\n{text}");
}

#[test]
fn test_config_init_then_check() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let path = path.to_str().unwrap();

    occupancy_cmd()
        .args(["--config", path, "config", "init"])
        .assert()
        .success();

    // A second init refuses to clobber the file.
    occupancy_cmd()
        .args(["--config", path, "config", "init"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("--force"));

    occupancy_cmd()
        .args(["--config", path, "config", "init", "--force"])
        .assert()
        .success();

    occupancy_cmd()
        .args(["--config", path, "config", "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration OK: 4 areas, 5 sensors"));
}

#[test]
fn test_config_check_reports_unsupported_sensor() {
    house_cmd(&["-o", "plain", "config", "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "sensors.doorbell: unsupported sensor type",
        ));
}

#[test]
fn test_config_show_keeps_file_order() {
    let output = house_cmd(&["config", "show"]).output().unwrap();
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    let frontyard = text.find("[areas.frontyard]").unwrap();
    let living = text.find("[areas.living]").unwrap();
    assert!(frontyard < living, "areas out of order:\n{text}");
}

#[test]
fn test_env_overrides_engine_settings() {
    let output = house_cmd(&["-o", "json", "config", "show"])
        .env("OCCUPANCY_ENGINE__MAX_SNAPSHOTS", "42")
        .output()
        .unwrap();
    assert!(output.status.success());
    let shown: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(shown["engine"]["max_snapshots"], 42);
}

// ── Replay ──────────────────────────────────────────────────────────

#[test]
fn test_replay_plain_occupancy() {
    let output = house_cmd(&["-o", "plain", "replay", &walk()])
        .output()
        .unwrap();
    assert!(output.status.success());
    insta::assert_snapshot!(
        String::from_utf8_lossy(&output.stdout).trim_end(),
        @r"
    frontyard 0
    entrance 0
    hall 1
    living 1
    "
    );
}

#[test]
fn test_replay_json_report() {
    let output = house_cmd(&["-o", "json", "replay", &walk(), "--verify", "all"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();

    assert_eq!(report["status"]["total_occupancy"], 2);
    assert_eq!(report["status"]["active_warnings"], 1);
    assert_eq!(report["evaluated_at"], 1700.0);
    assert_eq!(report["counts"]["entries"], 14);
    assert_eq!(report["counts"]["sweeps"], 1);
    assert_eq!(report["verification"]["summary"]["passed"], true);
}

#[test]
fn test_replay_table_has_summary() {
    house_cmd(&["replay", &walk()])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Living Room")
                .and(predicate::str::contains("Total:     2 people")),
        );
}

#[test]
fn test_replay_missing_trace_is_not_found() {
    house_cmd(&["replay", "/tmp/occupancy-no-such-trace.jsonl"])
        .assert()
        .code(4);
}

#[test]
fn test_replay_malformed_trace_is_invalid_input() {
    let output = house_cmd(&["replay", fixture("broken.jsonl").to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(5));
    assert!(combined_output(&output).contains("line 2"));
}

// ── Warnings ────────────────────────────────────────────────────────

#[test]
fn test_warnings_by_kind() {
    house_cmd(&["-o", "plain", "warnings", &walk(), "--kind", "unexpected_motion"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Warning[unexpected_motion]"));
}

#[test]
fn test_warnings_unknown_kind_is_usage_error() {
    house_cmd(&["warnings", &walk(), "--kind", "ghost"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("stuck_sensor"));
}

#[test]
fn test_warnings_unknown_area_is_not_found() {
    house_cmd(&["warnings", &walk(), "--area", "attic"])
        .assert()
        .code(4);
}

// ── History and verification ────────────────────────────────────────

#[test]
fn test_history_starts_with_initial_tick() {
    let output = house_cmd(&["-o", "json", "history", &walk()])
        .output()
        .unwrap();
    assert!(output.status.success());
    let history: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(history[0]["event_type"], "tick");
    assert_eq!(history[0]["description"], "initial");
    assert_eq!(history[1]["description"], "sensor:motion_frontyard:on");
}

#[test]
fn test_merged_history_carries_area_names() {
    house_cmd(&["-o", "json-compact", "history", &walk(), "--merged"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""name":"Living Room""#));
}

#[test]
fn test_exported_history_verifies() {
    let dir = tempfile::tempdir().unwrap();
    let exported = dir.path().join("history.json");
    let exported = exported.to_str().unwrap();

    house_cmd(&["-q", "replay", &walk(), "--export", exported])
        .assert()
        .success();

    house_cmd(&["-o", "plain", "verify", exported, "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pass"));
}

#[test]
fn test_tampered_history_fails_verification() {
    let dir = tempfile::tempdir().unwrap();
    let exported = dir.path().join("history.json");

    house_cmd(&["-q", "replay", &walk(), "--export", exported.to_str().unwrap()])
        .assert()
        .success();

    let mut history: Vec<serde_json::Value> =
        serde_json::from_str(&std::fs::read_to_string(&exported).unwrap()).unwrap();
    let last = history.last_mut().unwrap();
    last["areas"]["hall"]["occupancy"] = serde_json::json!(5);
    std::fs::write(&exported, serde_json::to_string(&history).unwrap()).unwrap();

    let output = house_cmd(&["verify", exported.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(6));
    let text = combined_output(&output);
    assert!(text.contains("FAIL"), "{text}");
    assert!(text.contains("hall"), "{text}");
}

#[test]
fn test_verify_rejects_garbage_history() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    std::fs::write(&path, "{\"not\": \"a list\"}").unwrap();
    house_cmd(&["verify", path.to_str().unwrap()])
        .assert()
        .code(5);
}

// ── Sensors ─────────────────────────────────────────────────────────

#[test]
fn test_sensors_diagnose_unsupported_type() {
    house_cmd(&["-o", "plain", "sensors", &walk()])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("motion_hall off ok")
                .and(predicate::str::contains("doorbell on unsupported sensor type")),
        );
}

// ── Live ────────────────────────────────────────────────────────────

#[test]
fn test_live_pushes_one_line_per_input() {
    let input = concat!(
        r#"{"sensor": "motion_frontyard", "state": "on", "at": 1000}"#,
        "\n",
        r#"{"sensor": "motion_frontyard", "state": "unavailable", "at": 1001}"#,
        "\n",
        r#"{"sensor": "motion_entrance", "state": true, "at": 1005}"#,
        "\n",
    );
    let output = house_cmd(&["live", "--sweep-every", "1h"])
        .write_stdin(input)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let pushes: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(pushes.len(), 2);
    assert_eq!(pushes[0]["status"]["occupied_areas"]["frontyard"], 1);
    assert_eq!(pushes[1]["status"]["occupied_areas"]["entrance"], 1);
    assert_eq!(pushes[1]["status"]["total_occupancy"], 1);
}

#[test]
fn test_live_rejects_bad_interval() {
    house_cmd(&["live", "--sweep-every", "soon"])
        .write_stdin("")
        .assert()
        .code(2);
}
