//! CLI integration tests for the Sift command-line interface.
//!
//! These tests do not start a server; they cover argument parsing, help
//! output and the offline commands.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for the sift binary, isolated from the user's config and
/// data directories.
fn sift(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("sift").unwrap();
    cmd.env("SIFT_CONFIG_DIR", home.path().join("config"))
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env_remove("SIFT_CONFIG")
        .env_remove("RUST_LOG")
        .current_dir(home.path());
    cmd
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    sift(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sift"))
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("components"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_displays() {
    let home = TempDir::new().unwrap();
    sift(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sift"));
}

#[test]
fn test_start_help() {
    let home = TempDir::new().unwrap();
    sift(&home)
        .args(["start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Start the Sift server"))
        .stdout(predicate::str::contains("--port"))
        .stdout(predicate::str::contains("--default-timeout"));
}

#[test]
fn test_unknown_subcommand_fails() {
    let home = TempDir::new().unwrap();
    sift(&home)
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Components
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_components_lists_builtins() {
    let home = TempDir::new().unwrap();
    sift(&home)
        .arg("components")
        .assert()
        .success()
        .stdout(predicate::str::contains("Uppercase"))
        .stdout(predicate::str::contains("Value distribution"))
        .stdout(predicate::str::contains("analyzer"));
}

#[test]
fn test_components_json() {
    let home = TempDir::new().unwrap();
    let output = sift(&home)
        .args(["--json", "components", "Concatenator"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let descriptors: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(descriptors[0]["name"], "Concatenator");
    assert_eq!(descriptors[0]["kind"], "transformer");
}

#[test]
fn test_unknown_component_fails() {
    let home = TempDir::new().unwrap();
    sift(&home)
        .args(["components", "Nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown component"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_init_then_show() {
    let home = TempDir::new().unwrap();
    sift(&home)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config file"));

    let written = std::fs::read_to_string(home.path().join("config").join("config.toml")).unwrap();
    assert!(written.contains("[session]"));

    sift(&home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default timeout: 86400000 ms"));
}

#[test]
fn test_explicit_config_file() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("custom.toml");
    std::fs::write(&path, "[server]\nport = 9123\n\n[logging]\nfile = false\n").unwrap();

    sift(&home)
        .args(["--config", path.to_str().unwrap(), "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("127.0.0.1:9123"));
}

#[test]
fn test_broken_explicit_config_fails() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("broken.toml");
    std::fs::write(&path, "[server\nport = ").unwrap();

    sift(&home)
        .args(["--config", path.to_str().unwrap(), "components"])
        .assert()
        .failure();
}
