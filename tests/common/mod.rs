//! Common utilities for integration tests

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Get the path to the `taskshare` binary
///
/// Prefers `CARGO_BIN_EXE_taskshare` (set by cargo for custom target
/// directories) and falls back to `cargo_bin()`.
#[allow(deprecated)]
pub fn taskshare_binary() -> PathBuf {
    std::env::var("CARGO_BIN_EXE_taskshare")
        .map(PathBuf::from)
        .unwrap_or_else(|_| assert_cmd::cargo::cargo_bin("taskshare"))
}

/// A `taskshare` command bound to the given database, isolated from HOME.
#[allow(dead_code)]
pub fn taskshare_command(db_path: &Path) -> Command {
    let mut cmd = Command::new(taskshare_binary());
    cmd.env("HOME", "/nonexistent")
        .env("TASKSHARE_DB_PATH", db_path)
        .env_remove("TASKSHARE_LOG_LEVEL")
        .env_remove("RUST_LOG");
    cmd
}

/// A temp dir plus the database path inside it.
#[allow(dead_code)]
pub fn setup_test_env() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("taskshare.db");
    (temp_dir, db_path)
}

/// Register an account and sign it in.
#[allow(dead_code)]
pub fn signed_in(db_path: &Path, email: &str) {
    taskshare_command(db_path)
        .args(["auth", "signup", email, "--password", "secret1"])
        .assert()
        .success();
    taskshare_command(db_path)
        .args(["auth", "signin", email, "--password", "secret1"])
        .assert()
        .success();
}

/// Extract the `id` field of a JSON object printed on stdout.
#[allow(dead_code)]
pub fn json_id(stdout: &[u8]) -> String {
    let value: serde_json::Value = serde_json::from_slice(stdout).unwrap();
    value["id"].as_str().unwrap().to_string()
}
