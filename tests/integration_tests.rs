//! Integration tests driving the shtest binary
#![cfg(unix)]

mod common;

use assert_cmd::Command;
use common::write_test_file;
use predicates::prelude::*;

fn shtest() -> Command {
    Command::cargo_bin("shtest").unwrap()
}

#[test]
fn test_passing_test_prints_pass_line() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_test_file(dir.path(), "ok.c", "// RUN: echo hello\n");

    shtest()
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("PASS: "));
}

#[test]
fn test_failing_test_prints_report_and_fails() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_test_file(dir.path(), "bad.c", "// RUN: false\n");

    shtest()
        .arg(&source)
        .assert()
        .failure()
        .stdout(predicate::str::contains("FAIL: "))
        .stdout(predicate::str::contains("Exit Code: 1"))
        .stderr(predicate::str::contains("1 test(s) failed"));
}

#[test]
fn test_no_execute_passes_without_running() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_test_file(dir.path(), "skip.c", "// RUN: false\n");

    shtest()
        .arg("--no-execute")
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("PASS: "));
}

#[test]
fn test_missing_feature_is_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_test_file(
        dir.path(),
        "gpu.c",
        "// RUN: echo x\n// REQUIRES: gpu\n",
    );

    shtest()
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("UNSUPPORTED: "));
}

#[test]
fn test_feature_flag_satisfies_requires() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_test_file(
        dir.path(),
        "gpu.c",
        "// RUN: echo x\n// REQUIRES: gpu\n",
    );

    shtest()
        .arg("--feature")
        .arg("gpu")
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("PASS: "));
}

#[test]
fn test_param_substitution_applies() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_test_file(dir.path(), "sub.c", "// RUN: test @word@ = expanded\n");

    shtest()
        .arg("--param")
        .arg("@word@=expanded")
        .arg(&source)
        .assert()
        .success();
}

#[test]
fn test_external_mode_runs_host_shell() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_test_file(dir.path(), "ext.c", "// RUN: echo from-shell\n");

    shtest()
        .arg("--external")
        .arg("--verbose")
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains("from-shell"));
}

#[test]
fn test_multiple_tests_report_individually() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_test_file(dir.path(), "good.c", "// RUN: true\n");
    let bad = write_test_file(dir.path(), "bad.c", "// RUN: false\n");

    shtest()
        .arg(&good)
        .arg(&bad)
        .assert()
        .failure()
        .stdout(predicate::str::contains("PASS: "))
        .stdout(predicate::str::contains("FAIL: "));
}

#[test]
fn test_unresolved_test_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_test_file(dir.path(), "empty.c", "int main() {}\n");

    shtest()
        .arg(&source)
        .assert()
        .failure()
        .stdout(predicate::str::contains("UNRESOLVED: "))
        .stdout(predicate::str::contains("Test has no run line!"));
}

#[test]
fn test_unknown_option_is_rejected() {
    shtest()
        .arg("--bogus")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown option"));
}

#[test]
fn test_help_and_version() {
    shtest()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("USAGE"));

    shtest()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("shtest"));
}
