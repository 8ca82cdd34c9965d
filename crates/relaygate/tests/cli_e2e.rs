#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn relaygate(data: &TempDir) -> Command {
    let mut cmd = Command::new(cargo_bin("relaygate"));
    cmd.env("RELAYGATE_DATA", data.path().as_os_str())
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_device_user_and_gate_workflow() {
    let data = TempDir::new().unwrap();

    relaygate(&data)
        .args(["device", "add", "Gate", "0400000000", "--password", "1234"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Device added"));

    relaygate(&data)
        .args(["user", "add", "Ann", "0411222333", "--serial", "005"])
        .assert()
        .success();

    relaygate(&data)
        .args(["user", "authorize", "ann"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "SMS to 0400000000: 1234A005#0411222333#",
        ));

    relaygate(&data)
        .args(["open"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SMS to 0400000000: 1234CC"));

    // The log masks the password.
    relaygate(&data)
        .args(["logs", "list", "--device", "gate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Gate Open"))
        .stdout(predicate::str::contains("1234CC").not());

    // Naked invocation lists devices with the active marker.
    relaygate(&data)
        .assert()
        .success()
        .stdout(predicate::str::contains("● Gate"));
}

#[test]
fn test_json_output() {
    let data = TempDir::new().unwrap();
    relaygate(&data)
        .args(["device", "add", "Gate", "0400000000"])
        .assert()
        .success();

    let output = relaygate(&data)
        .args(["device", "list", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["listed_devices"][0]["name"], "Gate");
}

#[test]
fn test_backup_and_restore_between_data_dirs() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    let backups = TempDir::new().unwrap();

    relaygate(&source)
        .args(["device", "add", "Gate", "0400000000"])
        .assert()
        .success();
    relaygate(&source)
        .args(["backup", "--dir", backups.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup written to"));

    let file = fs::read_dir(backups.path())
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
        .path();

    relaygate(&target)
        .args(["restore", file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored"));

    relaygate(&target)
        .args(["device", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Gate"));
}

#[test]
fn test_restore_from_stdin_rejects_garbage() {
    let data = TempDir::new().unwrap();
    relaygate(&data)
        .args(["restore", "-"])
        .write_stdin("nothing useful here")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_reset_requires_confirmation() {
    let data = TempDir::new().unwrap();
    relaygate(&data)
        .args(["device", "add", "Gate", "0400000000"])
        .assert()
        .success();

    relaygate(&data).args(["reset"]).assert().failure();
    relaygate(&data)
        .args(["reset", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("All data removed"));
    relaygate(&data)
        .args(["device", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Gate").not());
}

#[test]
fn test_validation_errors_exit_nonzero() {
    let data = TempDir::new().unwrap();
    relaygate(&data)
        .args(["device", "add", "Gate", "0400000000", "--password", "12"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_config_reads_file_in_data_dir() {
    let data = TempDir::new().unwrap();
    fs::write(
        data.path().join("relaygate.toml"),
        "max_logs_per_device = 25\n",
    )
    .unwrap();
    relaygate(&data)
        .args(["config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("max_logs_per_device = 25"));
}
