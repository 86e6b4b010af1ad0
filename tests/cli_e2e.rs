//! End-to-end CLI tests for the mediadl binary.

#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Command with config lookup pointed at an empty directory.
fn mediadl(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("mediadl").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("RUST_LOG");
    cmd
}

/// Test that the binary with no input exits with code 0.
#[test]
fn test_binary_invocation_without_input_returns_zero() {
    let config_home = TempDir::new().unwrap();
    mediadl(&config_home).assert().success();
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let config_home = TempDir::new().unwrap();
    mediadl(&config_home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Fetch album media"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let config_home = TempDir::new().unwrap();
    mediadl(&config_home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mediadl"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    let config_home = TempDir::new().unwrap();
    mediadl(&config_home)
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

/// Test that a missing explicit config file is reported.
#[test]
fn test_binary_missing_config_file_fails() {
    let config_home = TempDir::new().unwrap();
    mediadl(&config_home)
        .args(["--config", "/nonexistent/mediadl.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

/// Test that unknown keys in the default config file are rejected.
#[test]
fn test_binary_rejects_unknown_config_key() {
    let config_home = TempDir::new().unwrap();
    let dir = config_home.path().join("mediadl");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), "rate_limit = 10\n").unwrap();

    mediadl(&config_home)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config file"));
}

#[tokio::test]
async fn test_binary_downloads_album_and_prints_json() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pics/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"jpeg".to_vec(), "image/jpeg"))
        .mount(&mock_server)
        .await;
    let config_home = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let url = format!("{}/pics/a.jpg", mock_server.uri());

    mediadl(&config_home)
        .args(["-q", "--json", "-a", "Beach Day", "-o"])
        .arg(output.path())
        .arg(&url)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""status": "ok""#));

    let saved = output.path().join("Beach Day").join("a.jpg");
    assert_eq!(std::fs::read(saved).unwrap(), b"jpeg");
}

#[tokio::test]
async fn test_binary_reads_urls_from_stdin_and_reports_errors() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    let config_home = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let stdin = format!("# album\n{}/missing.jpg\n", mock_server.uri());

    mediadl(&config_home)
        .args(["-r", "1", "-o"])
        .arg(output.path())
        .write_stdin(stdin)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Errors: 1"))
        .stdout(predicate::str::contains("  - 404 (1)"));
}
