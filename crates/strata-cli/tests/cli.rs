//! End-to-end CLI tests against a temporary project directory.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const EVENTS: &str = r#"{"event_id":"t-1","event_type":"transaction-initiated","timestamp":"2024-03-01T11:00:00Z","payload":{"transaction_id":"tx-1","user_id":"user-7731","amount":120.5,"currency":"USD"}}
{"event_id":"t-2","event_type":"transaction-initiated","timestamp":"2024-03-01T11:05:00Z","payload":{"transaction_id":"tx-2","user_id":"user-7731","amount":79.5,"currency":"USD"}}

{"event_id":"t-3","event_type":"transaction-initiated","timestamp":"2024-03-01T11:10:00Z","payload":{"transaction_id":"tx-3","user_id":"user-7731","amount":0,"currency":"USD"}}
"#;

fn strata(project: &Path) -> Command {
    let mut cmd = Command::cargo_bin("strata").unwrap();
    cmd.arg("--project").arg(project);
    cmd.env_remove("PII_TOKEN_SECRET").env_remove("PII_ENCRYPTION_KEY");
    cmd
}

fn project_with_events() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("events.jsonl"), EVENTS).unwrap();
    temp
}

// ============================================================================
// Parsing and configuration
// ============================================================================

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("strata")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ingest"))
        .stdout(predicate::str::contains("silver"))
        .stdout(predicate::str::contains("detokenize"));
}

#[test]
fn config_show_layers_project_file_and_environment() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("strata.toml"),
        "[bronze]\nflush_batch_size = 250\n\n[pii]\ntoken_secret = \"hunter2\"\n",
    )
    .unwrap();

    strata(temp.path())
        .args(["config", "show", "--format", "toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("flush_batch_size = 250"))
        .stdout(predicate::str::contains("hunter2").not());

    strata(temp.path())
        .env("STRATA_BRONZE__FLUSH_BATCH_SIZE", "500")
        .args(["config", "show", "--format", "toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("flush_batch_size = 500"));
}

#[test]
fn generated_secrets_are_loadable_toml() {
    let temp = TempDir::new().unwrap();
    let output = strata(temp.path()).args(["config", "secrets"]).output().unwrap();
    assert!(output.status.success());
    fs::write(temp.path().join("strata.local.toml"), &output.stdout).unwrap();

    strata(temp.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("development defaults").not());
}

#[test]
fn invalid_config_is_reported() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("strata.toml"), "[silver]\nrejection_rate_threshold = 2.0\n").unwrap();

    strata(temp.path())
        .args(["checkpoints"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration"));
}

// ============================================================================
// Pipeline flow
// ============================================================================

#[test]
fn ingest_process_refresh_and_query() {
    let temp = project_with_events();
    let project = temp.path();

    strata(project)
        .args(["ingest", "events.jsonl"])
        .current_dir(project)
        .assert()
        .success()
        .stdout(predicate::str::contains("Ingested"))
        .stdout(predicate::str::contains("Flushed 1 partition(s) at exit"));

    strata(project)
        .arg("checkpoints")
        .assert()
        .success()
        .stdout(predicate::str::contains("trebanx.transaction.events"));

    strata(project)
        .args(["silver", "process"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 passed, 1 rejected"));

    strata(project)
        .args(["silver", "rejected"])
        .assert()
        .success()
        .stdout(predicate::str::contains("t-3"))
        .stdout(predicate::str::contains("0 <= 0"));

    strata(project)
        .args(["gold", "refresh", "daily-transaction-summary"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 dataset(s) refreshed"));

    let output = strata(project)
        .args(["gold", "query", "daily-transaction-summary", "--json", "--from", "2024-03-01"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(!stdout.contains("user-7731"));

    let row: serde_json::Value = serde_json::from_str(stdout.lines().next().unwrap()).unwrap();
    assert_eq!(row["transaction_count"], 2);
    assert_eq!(row["date"], "2024-03-01");

    let token = row["user_id"].as_str().unwrap().to_string();
    assert!(token.starts_with("tok_user_id_"));
    strata(project)
        .args(["detokenize", &token])
        .assert()
        .success()
        .stdout(predicate::str::contains("user-7731"));
}

#[test]
fn replaying_a_file_skips_committed_offsets() {
    let temp = project_with_events();
    let project = temp.path();
    let file = project.join("events.jsonl");

    strata(project).arg("ingest").arg(&file).assert().success();
    strata(project)
        .arg("ingest")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Flushed 0 partition(s) at exit"));

    strata(project)
        .args(["bronze", "partitions"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(1 row)"));
}

#[test]
fn processing_twice_finds_nothing_pending() {
    let temp = project_with_events();
    let project = temp.path();

    strata(project).arg("ingest").arg(project.join("events.jsonl")).assert().success();
    strata(project).args(["silver", "process"]).assert().success();
    strata(project)
        .args(["silver", "process"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No pending bronze partitions."));
}

#[test]
fn schema_registration_is_insert_if_absent() {
    let temp = TempDir::new().unwrap();
    let schema = temp.path().join("schema.json");
    fs::write(&schema, r#"{"required": ["event_id"]}"#).unwrap();

    strata(temp.path())
        .args(["schema", "register", "session-started", "1.0"])
        .arg(&schema)
        .assert()
        .success()
        .stdout(predicate::str::contains("Registered session-started v1.0"));

    strata(temp.path())
        .args(["schema", "register", "session-started", "1.0"])
        .arg(&schema)
        .assert()
        .success()
        .stdout(predicate::str::contains("already registered"));

    strata(temp.path())
        .args(["schema", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("session-started"));
}

#[test]
fn gold_errors() {
    let temp = TempDir::new().unwrap();

    strata(temp.path())
        .args(["gold", "query", "weekly-fun"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("weekly-fun"));

    strata(temp.path()).args(["gold", "refresh"]).assert().failure();

    strata(temp.path())
        .args(["gold", "refresh", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no data"));

    strata(temp.path())
        .args(["detokenize", "tok_user_id_000000000000000000000000"])
        .assert()
        .failure();
}
