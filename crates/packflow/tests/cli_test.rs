#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn packflow() -> Command {
    let mut cmd = Command::cargo_bin("packflow").unwrap();
    cmd.env_remove("PACKFLOW_CONFIG_PATH")
        .env_remove("PACKFLOW_REQUIRE_ROOT")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("config.json");
    let document = serde_json::json!({
        "ApplicationSettings": {
            "Images": [
                {
                    "Name": "api",
                    "BaseImage": "acme-api",
                    "ContextPath": "./api",
                    "Volumes": ["./data"],
                    "Version": "1.0.3"
                }
            ]
        }
    });
    fs::write(&path, serde_json::to_string_pretty(&document).unwrap()).unwrap();
    path
}

/// CLIヘルプが正しく表示されることを確認
#[test]
fn test_cli_help() {
    packflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("images"))
        .stdout(predicate::str::contains("test"));
}

/// バージョン表示が正しく動作することを確認
#[test]
fn test_cli_version() {
    packflow()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("packflow"));
}

/// buildコマンドのヘルプにオプションが表示されることを確認
#[test]
fn test_build_help() {
    packflow()
        .args(["build", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--all"))
        .stdout(predicate::str::contains("--release"))
        .stdout(predicate::str::contains("--pack-volumes"))
        .stdout(predicate::str::contains("--set-version"));
}

/// 設定済みイメージが一覧表示されることを確認
#[test]
fn test_images_lists_configured_images() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir);

    packflow()
        .arg("--config")
        .arg(&config)
        .arg("images")
        .assert()
        .success()
        .stdout(predicate::str::contains("api"))
        .stdout(predicate::str::contains("acme-api:1.0.3"))
        .stdout(predicate::str::contains("./data"));
}

/// 設定ファイルが見つからない場合はエラーになることを確認
#[test]
fn test_images_without_config() {
    let dir = tempfile::tempdir().unwrap();

    packflow()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path())
        .arg("images")
        .assert()
        .failure();
}

/// 存在しないイメージ名はビルド開始前に拒否されることを確認
#[test]
fn test_build_rejects_unknown_image() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir);

    packflow()
        .arg("--config")
        .arg(&config)
        .args(["build", "-i", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing"));
}

/// 対象を指定しないビルドはエラーになることを確認
#[test]
fn test_build_without_targets() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir);

    packflow()
        .arg("--config")
        .arg(&config)
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--all"));
}

/// 不正なバージョン上書きは引数解析の段階で拒否されることを確認
#[test]
fn test_build_rejects_malformed_version_override() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir);

    packflow()
        .arg("--config")
        .arg(&config)
        .args(["build", "--release", "api", "--set-version", "api=1.0-beta"])
        .assert()
        .failure();
}

/// 不正なコマンドでエラーになることを確認
#[test]
fn test_invalid_command() {
    packflow().arg("invalid-command").assert().failure();
}
