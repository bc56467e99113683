// CLI-level tests driving the compiled binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const VALID_CONFIG: &str = r#"
[global]
root_backup_dir = "/data/redis/backups"
rsync_module = "redis_backups"

[[instances]]
address = "10.0.0.1"
port = 6379

[[instances]]
address = "10.0.0.2"
port = 6380
"#;

#[test]
fn test_validate_with_valid_config() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("config.toml");
    fs::write(&config_path, VALID_CONFIG).unwrap();

    Command::cargo_bin("redis-backup")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("Instances: 2"));
}

#[test]
fn test_validate_with_missing_config_fails() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("missing.toml");

    Command::cargo_bin("redis-backup")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "validate"])
        .assert()
        .failure();
}

#[test]
fn test_validate_rejects_duplicate_instances() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("config.toml");
    fs::write(
        &config_path,
        r#"
[global]
root_backup_dir = "/backups"
rsync_module = "dumps"

[[instances]]
address = "10.0.0.1"
port = 6379

[[instances]]
address = "10.0.0.1"
port = 6379
"#,
    )
    .unwrap();

    Command::cargo_bin("redis-backup")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("duplicate instance"));
}

#[test]
fn test_list_prints_instances() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("config.toml");
    fs::write(&config_path, VALID_CONFIG).unwrap();

    Command::cargo_bin("redis-backup")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("10.0.0.1:6379"))
        .stdout(predicate::str::contains("10.0.0.2:6380"));
}
