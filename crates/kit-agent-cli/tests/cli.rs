//! Integration tests for the `kit-sample-agent` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// Binary with the platform environment cleared so runs are local.
fn agent() -> Command {
    let mut cmd = Command::cargo_bin("kit-sample-agent").unwrap();
    for var in [
        "KIT_API_ENDPOINT",
        "KIT_API_KEY",
        "KIT_RUN_ID",
        "KIT_LOCAL_DATA_PATH",
        "KIT_CONTEXT_SOCKET",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn write_config(temp_dir: &TempDir, content: &str) -> String {
    let path = temp_dir.path().join("config.json");
    fs::write(&path, content).unwrap();
    path.to_str().unwrap().to_string()
}

fn metric_lines(out: &Path, series: &str) -> Vec<String> {
    let prefix = format!("{series},");
    fs::read_to_string(out.join("metrics.log"))
        .unwrap()
        .lines()
        .filter(|line| line.starts_with(&prefix))
        .map(str::to_string)
        .collect()
}

#[test]
fn test_train_records_pnl_series() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(&temp_dir, r#"{"sleep_duration": 3, "tick_ms": 0}"#);
    let out = temp_dir.path().join("out");

    agent()
        .args(["train", "--config", &config, "--output-path"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Starting training for 3 iterations."))
        .stdout(predicate::str::contains("Training complete."));

    assert_eq!(metric_lines(&out, "pnl"), vec!["pnl,0,0.0", "pnl,1,0.1", "pnl,2,0.2"]);
    assert_eq!(
        metric_lines(&out, "progress"),
        vec!["progress,1,1.0", "progress,2,2.0", "progress,3,3.0"]
    );

    let stats: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("norm_stats.json")).unwrap()).unwrap();
    assert_eq!(stats["samples"], 3);
}

#[test]
fn test_train_then_test_records_backtest() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(&temp_dir, r#"{"sleep_duration": 2, "tick_ms": 0}"#);
    let out = temp_dir.path().join("out");

    agent()
        .args(["train", "--config", &config, "--output-path"])
        .arg(&out)
        .assert()
        .success();
    agent()
        .args(["test", "--config", &config, "--output-path"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Backtest complete."));

    assert_eq!(metric_lines(&out, "test_pnl").len(), 2);
}

#[test]
fn test_test_without_training_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(&temp_dir, r#"{"tick_ms": 0}"#);

    agent()
        .args(["test", "--config", &config, "--output-path"])
        .arg(temp_dir.path().join("out"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("norm_stats.json"));
}

#[test]
fn test_missing_config_fails_before_agent_runs() {
    let temp_dir = TempDir::new().unwrap();
    let out = temp_dir.path().join("out");

    agent()
        .args(["train", "--config"])
        .arg(temp_dir.path().join("absent.json"))
        .arg("--output-path")
        .arg(&out)
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("error: configuration error"));

    assert!(!out.exists());
}

#[test]
fn test_output_path_that_is_a_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(&temp_dir, r#"{"tick_ms": 0}"#);
    let file = temp_dir.path().join("taken");
    fs::write(&file, "occupied").unwrap();

    agent()
        .args(["train", "--config", &config, "--output-path"])
        .arg(&file)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("is not a directory"));
}

#[test]
fn test_invalid_sleep_duration_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(&temp_dir, r#"{"sleep_duration": "three", "tick_ms": 0}"#);

    agent()
        .args(["train", "--config", &config, "--output-path"])
        .arg(temp_dir.path().join("out"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("sleep_duration"));
}

/// `u64::MAX` iterations is a valid config: the agent runs until killed
/// instead of aborting up front.
#[cfg(unix)]
#[test]
fn test_huge_sleep_duration_runs_without_panicking() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(
        &temp_dir,
        r#"{"sleep_duration": 18446744073709551615, "tick_ms": 50}"#,
    );
    let out = temp_dir.path().join("out");

    agent()
        .args(["train", "--config", &config, "--output-path"])
        .arg(&out)
        .timeout(Duration::from_secs(2))
        .assert()
        .interrupted()
        .stdout(predicate::str::contains(
            "Starting training for 18446744073709551615 iterations.",
        ))
        .stderr(predicate::str::contains("panicked").not());

    assert_eq!(metric_lines(&out, "pnl").first().map(String::as_str), Some("pnl,0,0.0"));
}

#[test]
fn test_non_object_config_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(&temp_dir, "[1, 2, 3]");

    agent()
        .args(["train", "--config", &config, "--output-path"])
        .arg(temp_dir.path().join("out"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("must be a JSON object"));
}

#[test]
fn test_malformed_config_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(&temp_dir, "{\"sleep_duration\": ");

    agent()
        .args(["train", "--config", &config, "--output-path"])
        .arg(temp_dir.path().join("out"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("is not valid JSON"));
}

#[test]
fn test_missing_arguments_exit_2() {
    agent().arg("train").assert().code(2);
    agent().assert().code(2);
}

#[test]
fn test_help_lists_commands() {
    agent()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("train"))
        .stdout(predicate::str::contains("test"));
}
