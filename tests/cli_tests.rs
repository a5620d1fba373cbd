//! CLI integration tests
//!
//! Tests the command-line interface using assert_cmd

mod common;

use std::process::{Child, Command as StdCommand, Stdio};

use assert_cmd::Command;
use predicates::prelude::*;

use common::{free_port, loopback_config, ConfigFixture};

/// Get a command for the tempsync binary
fn tempsync_cmd() -> Command {
    let mut cmd = Command::cargo_bin("tempsync").unwrap();
    cmd.env_remove("TEMPSYNC_CONFIG")
        .env_remove("TEMPSYNC_PORT")
        .env_remove("TEMPSYNC_HOST")
        .env_remove("TEMPSYNC_MAX_ROUNDS");
    cmd
}

// ─────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    tempsync_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("central"))
        .stdout(predicate::str::contains("external"))
        .stdout(predicate::str::contains("simulate"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_command() {
    tempsync_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tempsync"))
        .stdout(predicate::str::contains("Build Information"))
        .stdout(predicate::str::contains("Protocol:"));
}

#[test]
fn test_short_version_flag() {
    tempsync_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tempsync"));
}

// ─────────────────────────────────────────────────────────────────
// Argument Validation
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_external_index_out_of_range() {
    tempsync_cmd()
        .args(["external", "5", "20"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("between 1 and 4"));
}

#[test]
fn test_central_requires_temperature() {
    tempsync_cmd().arg("central").assert().failure();
}

#[test]
fn test_port_zero_rejected() {
    tempsync_cmd()
        .args(["central", "20", "--port", "0"])
        .assert()
        .failure()
        .code(10)
        .stderr(predicate::str::contains("E102"));
}

// ─────────────────────────────────────────────────────────────────
// Config Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_config_show_explicit() {
    let fixture = ConfigFixture::with_content(&loopback_config(2345, 1000));

    tempsync_cmd()
        .args(["config", "show", "--config", fixture.path()])
        .assert()
        .success()
        .stdout(predicate::str::contains("[network]"))
        .stdout(predicate::str::contains("port = 2345"))
        .stdout(predicate::str::contains("[protocol]"));
}

#[test]
fn test_config_validate_valid() {
    let fixture = ConfigFixture::with_content(&loopback_config(2345, 1000));

    tempsync_cmd()
        .args(["config", "validate", "--config", fixture.path()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid."));
}

#[test]
fn test_config_validate_invalid_level() {
    let fixture = ConfigFixture::with_content("[logging]\nlevel = \"shouty\"\n");

    tempsync_cmd()
        .args(["config", "validate", "--config", fixture.path()])
        .assert()
        .failure()
        .code(10)
        .stderr(predicate::str::contains("E102"))
        .stderr(predicate::str::contains("shouty"));
}

#[test]
fn test_config_validate_syntax_error() {
    let fixture = ConfigFixture::with_content("[network\nport = 1\n");

    tempsync_cmd()
        .args(["config", "validate", "--config", fixture.path()])
        .assert()
        .failure()
        .code(10)
        .stderr(predicate::str::contains("E101"));
}

#[test]
fn test_config_validate_missing_file() {
    tempsync_cmd()
        .args(["config", "validate", "--config", "/nonexistent/tempsync.toml"])
        .assert()
        .failure()
        .code(10)
        .stderr(predicate::str::contains("E100"))
        .stderr(predicate::str::contains("tempsync config init"));
}

#[test]
fn test_config_init_writes_file() {
    let fixture = ConfigFixture::new();

    tempsync_cmd()
        .args(["config", "init", "--path", fixture.path()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration written to"));
    assert!(fixture.config_path.exists());

    tempsync_cmd()
        .args(["config", "init", "--path", fixture.path()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    tempsync_cmd()
        .args(["config", "validate", "--config", fixture.path()])
        .assert()
        .success();
}

// ─────────────────────────────────────────────────────────────────
// Protocol Runs
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_simulate_converges() {
    tempsync_cmd()
        .args(["-q", "simulate", "100", "0", "10", "-20", "30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Stabilized after"))
        .stdout(predicate::str::contains("external 1"))
        .stdout(predicate::str::contains("external 4"));
}

#[test]
fn test_simulate_writes_report() {
    let fixture = ConfigFixture::new();
    let report_path = fixture.temp_dir.path().join("reports").join("session.json");

    tempsync_cmd()
        .args(["-q", "simulate", "20", "20", "20", "20", "20", "--report"])
        .arg(&report_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Report written to"));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    // Identical inputs still need a second round to clear the baseline
    assert_eq!(json["rounds"], 2);
    assert_eq!(json["final_central"], 20.0);
    assert_eq!(json["externals"].as_array().unwrap().len(), 4);
}

#[test]
fn test_simulate_round_limit_exit_code() {
    tempsync_cmd()
        .args(["-q", "simulate", "100", "0", "10", "20", "30", "--max-rounds", "3"])
        .assert()
        .failure()
        .code(50)
        .stderr(predicate::str::contains("E500"))
        .stderr(predicate::str::contains("protocol.max_rounds"));
}

#[test]
fn test_simulate_rejects_non_finite_temperatures() {
    tempsync_cmd()
        .args(["simulate", "nan", "1", "2", "3", "4"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("finite"));

    tempsync_cmd()
        .args(["simulate", "0", "1", "2", "3e38", "4"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("finite"));
}

#[test]
fn test_external_without_central_times_out() {
    let fixture = ConfigFixture::with_content(&loopback_config(free_port(), 300));

    tempsync_cmd()
        .args(["-q", "external", "1", "10", "--config", fixture.path()])
        .assert()
        .failure()
        .code(30)
        .stderr(predicate::str::contains("E301"));
}

fn spawn_tempsync(config_path: &str, args: &[&str]) -> Child {
    StdCommand::new(assert_cmd::cargo::cargo_bin("tempsync"))
        .arg("-q")
        .args(args)
        .args(["--config", config_path])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap()
}

#[test]
fn test_separate_processes_converge() {
    let fixture = ConfigFixture::with_content(&loopback_config(free_port(), 10_000));

    let central = spawn_tempsync(fixture.path(), &["central", "100"]);
    let externals: Vec<Child> = [["1", "0"], ["2", "10"], ["3", "20"], ["4", "30"]]
        .iter()
        .map(|[index, temp]| spawn_tempsync(fixture.path(), &["external", *index, *temp]))
        .collect();

    let central = central.wait_with_output().unwrap();
    assert!(
        central.status.success(),
        "central failed: {}",
        String::from_utf8_lossy(&central.stderr)
    );
    assert!(String::from_utf8_lossy(&central.stdout).contains("Stabilized after"));

    for (i, external) in externals.into_iter().enumerate() {
        let output = external.wait_with_output().unwrap();
        assert!(output.status.success(), "external {} failed", i + 1);
        assert!(String::from_utf8_lossy(&output.stdout)
            .contains(&format!("External {} done after", i + 1)));
    }
}
