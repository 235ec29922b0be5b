//! CLI smoke tests

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn flitter(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("flitter").unwrap();
    cmd.env("HOME", home.path())
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .current_dir(home.path());
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    flitter(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("referee"))
        .stdout(predicate::str::contains("worker"))
        .stdout(predicate::str::contains("lookup"))
        .stdout(predicate::str::contains("busy"));
}

#[test]
fn test_referee_rejects_bad_path() {
    let home = TempDir::new().unwrap();
    flitter(&home)
        .args(["referee", "-p", "badpath"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid referee path"));
}

#[test]
fn test_worker_rejects_bad_path() {
    let home = TempDir::new().unwrap();
    flitter(&home)
        .args(["worker", "-p", "no-group-here"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid worker path"));
}

#[test]
fn test_lookup_against_unreachable_referee_fails() {
    let home = TempDir::new().unwrap();
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    flitter(&home)
        .args(["lookup", "groupA", "0", "-r", &format!("127.0.0.1:{port}")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Lookup request failed"));
}

#[test]
fn test_config_file_is_honored() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("custom.yml");
    std::fs::write(&config, "referee:\n  path: \"not a path\"\n").unwrap();
    flitter(&home)
        .args(["-c", config.to_str().unwrap(), "referee"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a path"));
}

#[test]
fn test_busy_against_unreachable_referee_fails() {
    let home = TempDir::new().unwrap();
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    flitter(&home)
        .args(["busy", "on", "-r", &format!("127.0.0.1:{port}")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Busy request failed"));
}
