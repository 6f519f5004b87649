//! End-to-end tests for the internal shell interpreter
#![cfg(unix)]

mod common;

use common::{make_test, run_internal, write_test_file};
use shtest::{execute_sh_test, RunnerConfig, TestStatus};

#[test]
fn test_basic_run_reports_pass() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_internal(dir.path(), "// RUN: echo hello\n");
    assert_eq!(result.status, TestStatus::Pass);
    assert!(result.output.contains("Exit Code: 0"));
    assert!(result.output.contains("hello"));
}

#[test]
fn test_pipefail_decides_pipeline_failure() {
    let dir = tempfile::tempdir().unwrap();

    // pipefail is on by default: the failing first stage wins.
    let result = run_internal(dir.path(), "// RUN: false | true\n");
    assert_eq!(result.status, TestStatus::Fail);
    assert!(!result.output.contains("Exit Code: 0"));

    // With pipefail off, only the last stage counts.
    let source = write_test_file(dir.path(), "nofail.c", "// RUN: false | true\n");
    let mut test = make_test(&source);
    test.config.pipefail = false;
    let result = execute_sh_test(&mut test, &RunnerConfig::default(), false, &[]).unwrap();
    assert_eq!(result.status, TestStatus::Pass);
    assert!(result.output.contains("Exit Code: 0"));
}

#[test]
fn test_pipe_data_flows_between_stages() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_internal(dir.path(), "// RUN: echo needle | grep needle\n");
    assert_eq!(result.status, TestStatus::Pass);
    assert!(result.output.contains("needle"));
}

#[test]
fn test_redirect_fusion_lands_in_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_internal(
        dir.path(),
        "// RUN: sh -c 'echo o; echo e 1>&2' > %t 2>&1\n// RUN: cat %t\n",
    );
    assert_eq!(result.status, TestStatus::Pass);

    let out_file = dir.path().join("Output").join("case.c.tmp");
    let contents = std::fs::read_to_string(out_file).unwrap();
    assert!(contents.contains('o'));
    assert!(contents.contains('e'));

    // The first command's own captured stdout stays empty.
    assert!(result.output.contains("Command 0 Output:\n\n"));
}

#[test]
fn test_unknown_operator_fails_with_127() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_internal(dir.path(), "// RUN: true & true\n");
    assert_eq!(result.status, TestStatus::Fail);
    assert!(result.output.contains("Exit Code: 127"));
    assert!(result.output.contains("unsupported shell operator: '&'"));
}

#[test]
fn test_command_not_found_fails_with_127() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_internal(dir.path(), "// RUN: this-command-does-not-exist\n");
    assert_eq!(result.status, TestStatus::Fail);
    assert!(result.output.contains("Exit Code: 127"));
    assert!(result
        .output
        .contains("this-command-does-not-exist: command not found"));
}

#[test]
fn test_negation_inverts_result() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_internal(dir.path(), "// RUN: ! false\n");
    assert_eq!(result.status, TestStatus::Pass);

    let result = run_internal(dir.path(), "// RUN: ! true\n");
    assert_eq!(result.status, TestStatus::Fail);
}

#[test]
fn test_sequence_operators() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_internal(dir.path(), "// RUN: false || echo rescued\n");
    assert_eq!(result.status, TestStatus::Pass);
    assert!(result.output.contains("rescued"));

    let result = run_internal(dir.path(), "// RUN: false ; true\n");
    assert_eq!(result.status, TestStatus::Pass);
}

#[test]
fn test_run_lines_chain_fail_fast() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_internal(dir.path(), "// RUN: false\n// RUN: echo unreachable\n");
    assert_eq!(result.status, TestStatus::Fail);
    assert!(!result.output.contains("unreachable"));
}

#[test]
fn test_mid_pipeline_stderr_is_captured() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_internal(
        dir.path(),
        "// RUN: sh -c 'echo noise 1>&2; echo data' | cat\n",
    );
    assert_eq!(result.status, TestStatus::Pass);
    assert!(result.output.contains("Command 0 Stderr:\nnoise\n"));
    assert!(result.output.contains("Command 1 Output:\ndata\n"));
}

#[test]
fn test_per_command_dump_lists_each_stage() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_internal(dir.path(), "// RUN: echo one | cat\n");
    assert_eq!(result.status, TestStatus::Pass);
    assert!(result.output.contains("Command 0: \"echo\" \"one\""));
    assert!(result.output.contains("Command 1: \"cat\""));
    assert!(result.output.contains("Command 0 Result: 0"));
    assert!(result.output.contains("Command 1 Result: 0"));
}

#[test]
fn test_xfail_star_converts_failure() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_internal(dir.path(), "// XFAIL: *\n// RUN: false\n");
    assert_eq!(result.status, TestStatus::Xfail);

    // A passing test is not remapped.
    let result = run_internal(dir.path(), "// XFAIL: *\n// RUN: true\n");
    assert_eq!(result.status, TestStatus::Pass);
}
