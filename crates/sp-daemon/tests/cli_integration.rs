//! CLI integration tests
//!
//! Tests the spiped binary using assert_cmd.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

fn spiped() -> Command {
    Command::cargo_bin("spiped")
        .expect("Failed to locate spiped binary - ensure it's built before running tests")
}

#[test]
fn test_cli_help() {
    spiped()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--source"))
        .stdout(predicate::str::contains("--max-connections"));
}

#[test]
fn test_cli_version() {
    spiped()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("spiped"));
}

#[test]
fn test_missing_flags_print_usage() {
    spiped()
        .args(["-s", "127.0.0.1:0", "-t", "127.0.0.1:1"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_no_arguments_print_usage() {
    spiped()
        .assert()
        .success()
        .stderr(predicate::str::contains("--key-file"));
}

#[test]
fn test_unreadable_key_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("no-such.key");

    spiped()
        .args(["-s", "127.0.0.1:0", "-t", "127.0.0.1:1", "-k"])
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load key"));
}

#[test]
fn test_empty_key_file_is_fatal() {
    let key = tempfile::NamedTempFile::new().unwrap();

    spiped()
        .args(["-s", "127.0.0.1:0", "-t", "127.0.0.1:1", "-k"])
        .arg(key.path())
        .assert()
        .failure();
}

#[test]
fn test_zero_max_connections_is_fatal() {
    let mut key = tempfile::NamedTempFile::new().unwrap();
    key.write_all(b"secret").unwrap();

    spiped()
        .args(["-s", "127.0.0.1:0", "-t", "127.0.0.1:1", "-n", "0", "-k"])
        .arg(key.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_missing_config_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();

    spiped()
        .arg("-c")
        .arg(dir.path().join("spiped.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}
