//! Common test utilities for shtest integration tests

use std::path::{Path, PathBuf};

use shtest::{execute_sh_test, RunnerConfig, Substitution, Test, TestConfig, TestResult};

/// Write a test source file into `dir` and return its path.
pub fn write_test_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Build a `Test` for a source file, inheriting this process's environment.
#[allow(dead_code)]
pub fn make_test(source: &Path) -> Test {
    Test::new(
        source.to_path_buf(),
        source.to_path_buf(),
        TestConfig::from_env(),
    )
}

/// Run a test source end to end with the internal shell.
#[allow(dead_code)]
pub fn run_internal(dir: &Path, content: &str) -> TestResult {
    let source = write_test_file(dir, "case.c", content);
    let mut test = make_test(&source);
    execute_sh_test(&mut test, &RunnerConfig::default(), false, &[]).unwrap()
}

/// Run a test source end to end with the external shell.
#[allow(dead_code)]
pub fn run_external(dir: &Path, content: &str) -> TestResult {
    let source = write_test_file(dir, "case.c", content);
    let mut test = make_test(&source);
    let path = std::env::var("PATH").unwrap_or_default();
    execute_sh_test(&mut test, &RunnerConfig::detect(&path), true, &[]).unwrap()
}

/// Like `run_internal` but with extra substitutions.
#[allow(dead_code)]
pub fn run_internal_with(dir: &Path, content: &str, extra: &[Substitution]) -> TestResult {
    let source = write_test_file(dir, "case.c", content);
    let mut test = make_test(&source);
    execute_sh_test(&mut test, &RunnerConfig::default(), false, extra).unwrap()
}
