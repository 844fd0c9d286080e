//! End-to-end integration tests for the hwr CLI.
//!
//! These tests invoke the binary with a throwaway config and session file,
//! so nothing here needs the platform's services to be running.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

/// A temp dir holding `config.toml`, with the session file alongside it
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = r#"
[channel]
endpoint = "http://127.0.0.1:9"
connect_timeout_ms = 500

[services]
auth_url = "http://127.0.0.1:9/api"
datasets_url = "http://127.0.0.1:9/api"
models_url = "http://127.0.0.1:9/api"
logs_url = "http://127.0.0.1:9/api"
training_api_url = "http://127.0.0.1:9/api"
training_service_url = "http://127.0.0.1:9"
request_timeout_secs = 2
"#;
        fs::write(dir.path().join("config.toml"), config).unwrap();
        Self { dir }
    }

    fn session_file(&self) -> PathBuf {
        self.dir.path().join("session.json")
    }

    fn write_session(&self, json: &str) {
        fs::write(self.session_file(), json).unwrap();
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("hwr").unwrap();
        cmd.arg("--config")
            .arg(self.dir.path().join("config.toml"))
            .env("HWR_SESSION_FILE", self.session_file())
            .env_remove("HWR_CHANNEL_ENDPOINT")
            .env_remove("RUST_LOG");
        cmd
    }
}

fn read_session(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

// =============================================================================
// Help and Version
// =============================================================================

#[test]
fn test_cli_help() {
    Command::cargo_bin("hwr")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("train"))
        .stdout(predicate::str::contains("datasets"));
}

#[test]
fn test_cli_version() {
    Command::cargo_bin("hwr")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hwr"));
}

#[test]
fn test_train_help_lists_actions() {
    Command::cargo_bin("hwr")
        .unwrap()
        .args(["train", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("stop"))
        .stdout(predicate::str::contains("watch"));
}

// =============================================================================
// Navigation Guard
// =============================================================================

#[test]
fn test_guarded_commands_require_login() {
    let ws = Workspace::new();

    for args in [
        vec!["datasets", "list"],
        vec!["models", "list"],
        vec!["logs"],
        vec!["train", "health"],
    ] {
        ws.cmd()
            .args(&args)
            .assert()
            .failure()
            .code(1)
            .stderr(predicate::str::contains("Not logged in"));
    }
}

#[test]
fn test_stale_token_is_cleared() {
    let ws = Workspace::new();
    ws.write_session(r#"{"authToken": "expired", "userId": "7"}"#);

    ws.cmd()
        .args(["models", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not logged in"));

    let session = read_session(&ws.session_file());
    assert!(session.get("authToken").is_none());
    assert!(session.get("userId").is_none());
}

#[test]
fn test_invalid_training_request_rejected_before_network() {
    let ws = Workspace::new();
    ws.write_session(r#"{"authToken": "authenticated", "userId": "7"}"#);

    ws.cmd()
        .args(["train", "start", "--batch-size", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("batch_size"));
}

// =============================================================================
// Session Commands
// =============================================================================

#[test]
fn test_logout_without_session() {
    let ws = Workspace::new();

    ws.cmd()
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not logged in"));
}

#[test]
fn test_login_when_already_logged_in() {
    let ws = Workspace::new();
    ws.write_session(r#"{"authToken": "authenticated", "userId": "7"}"#);

    ws.cmd()
        .arg("login")
        .assert()
        .success()
        .stdout(predicate::str::contains("Already logged in as user 7"));
}

#[test]
fn test_status_reports_session_and_unreachable_service() {
    let ws = Workspace::new();

    ws.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("not logged in"))
        .stdout(predicate::str::contains("unreachable"));
}
