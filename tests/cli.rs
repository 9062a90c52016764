// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 reportflow contributors

//! CLI smoke tests

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn reportflow() -> Command {
    Command::cargo_bin("reportflow").unwrap()
}

#[test]
fn help_lists_commands() {
    reportflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("storage"));
}

#[test]
fn version_matches_package() {
    reportflow()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn storage_stats_on_empty_root() {
    let temp = TempDir::new().unwrap();

    reportflow()
        .args(["storage", "stats", "Acme Corp", "--output-root"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("acme_corp"));
}

#[test]
fn storage_stats_json_output() {
    let temp = TempDir::new().unwrap();

    reportflow()
        .args(["storage", "stats", "Acme Corp", "--format", "json", "--output-root"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"company_slug\": \"acme_corp\""));
}

#[test]
fn storage_list_empty_directory() {
    let temp = TempDir::new().unwrap();

    reportflow()
        .args(["storage", "list", "Acme Corp", "final", "--output-root"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No files"));
}

#[test]
fn run_requires_company_name() {
    reportflow().arg("run").assert().failure();
}

#[test]
fn run_with_missing_config_fails() {
    reportflow()
        .args(["run", "Acme Corp", "--config", "/nonexistent/reportflow.yaml"])
        .assert()
        .failure();
}
