//! Test and runner configuration
//!
//! All state is passed explicitly: a `TestConfig` describes one test's
//! environment and substitutions, a `RunnerConfig` the host-level switches,
//! and `TestPaths` the per-test path set derived from the source and exec
//! locations.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::resolver;
use crate::subst::Substitution;

/// Final disposition of one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    Pass,
    Fail,
    Xfail,
    Unresolved,
    Unsupported,
}

impl TestStatus {
    /// True for outcomes that should fail a run.
    pub fn is_failure(self) -> bool {
        matches!(self, TestStatus::Fail | TestStatus::Unresolved)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TestStatus::Pass => "PASS",
            TestStatus::Fail => "FAIL",
            TestStatus::Xfail => "XFAIL",
            TestStatus::Unresolved => "UNRESOLVED",
            TestStatus::Unsupported => "UNSUPPORTED",
        };
        f.write_str(name)
    }
}

/// A status plus the human-readable report that goes with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    pub status: TestStatus,
    pub output: String,
}

impl TestResult {
    pub fn new(status: TestStatus, output: impl Into<String>) -> Self {
        TestResult {
            status,
            output: output.into(),
        }
    }

    pub fn unresolved(message: impl Into<String>) -> Self {
        TestResult::new(TestStatus::Unresolved, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        TestResult::new(TestStatus::Unsupported, message)
    }

    pub fn fail(message: impl Into<String>) -> Self {
        TestResult::new(TestStatus::Fail, message)
    }
}

/// Per-test configuration.
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Environment for spawned commands; must contain PATH for lookups.
    pub environment: HashMap<String, String>,
    /// Suite-level substitutions, applied in declared order.
    pub substitutions: Vec<Substitution>,
    /// Features that `REQUIRES:` lines may ask for.
    pub available_features: BTreeSet<String>,
    /// Whether pipelines fail when any stage fails.
    pub pipefail: bool,
    /// Marks the whole test unsupported before anything runs.
    pub unsupported: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        TestConfig {
            environment: HashMap::new(),
            substitutions: Vec::new(),
            available_features: BTreeSet::new(),
            pipefail: true,
            unsupported: false,
        }
    }
}

impl TestConfig {
    /// A config inheriting this process's environment.
    pub fn from_env() -> Self {
        TestConfig {
            environment: std::env::vars().collect(),
            ..TestConfig::default()
        }
    }
}

/// Host-level switches shared by all tests in a run.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub is_windows: bool,
    /// Replace `/dev/null` with temp files on hosts without a null device.
    pub avoid_dev_null: bool,
    pub bash_path: Option<PathBuf>,
    pub use_valgrind: bool,
    pub valgrind_args: Vec<String>,
    /// Parse and report PASS without running anything.
    pub no_execute: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            is_windows: cfg!(windows),
            avoid_dev_null: cfg!(windows),
            bash_path: None,
            use_valgrind: false,
            valgrind_args: Vec::new(),
            no_execute: false,
        }
    }
}

impl RunnerConfig {
    /// Default config with bash located on the given PATH, if present.
    pub fn detect(path: &str) -> Self {
        RunnerConfig {
            bash_path: resolver::which("bash", path),
            ..RunnerConfig::default()
        }
    }
}

/// One test: where its source lives, where its artifacts go, and its config.
#[derive(Debug, Clone)]
pub struct Test {
    pub source_path: PathBuf,
    pub exec_path: PathBuf,
    pub config: TestConfig,
    /// Accumulated `XFAIL:` entries.
    pub xfails: Vec<String>,
}

impl Test {
    pub fn new(source_path: PathBuf, exec_path: PathBuf, config: TestConfig) -> Self {
        Test {
            source_path,
            exec_path,
            config,
            xfails: Vec::new(),
        }
    }

    /// Whether a failure of this test was declared expected.
    ///
    /// An entry of `*` matches unconditionally; any other entry matches when
    /// it names an available feature.
    pub fn is_expected_to_fail(&self) -> bool {
        self.xfails
            .iter()
            .any(|x| x == "*" || self.config.available_features.contains(x))
    }
}

/// The path set derived from a test's source and exec locations.
///
/// Kept as strings because these values feed the substitution table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPaths {
    pub source_path: String,
    pub source_dir: String,
    pub exec_dir: PathBuf,
    pub tmp_dir: String,
    pub tmp_base: String,
}

impl TestPaths {
    /// Derive the temporary locations for a test. The temp directory is
    /// always under the exec directory, not the source tree.
    pub fn derive(test: &Test, normalize_slashes: bool) -> Self {
        let mut source_path = test.source_path.to_string_lossy().into_owned();
        let mut source_dir = parent_str(&test.source_path);
        let exec_dir = test
            .exec_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let exec_base = test
            .exec_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp_dir_path = exec_dir.join("Output");
        let mut tmp_dir = tmp_dir_path.to_string_lossy().into_owned();
        let mut tmp_base = tmp_dir_path.join(&exec_base).to_string_lossy().into_owned();

        if normalize_slashes {
            for s in [&mut source_path, &mut source_dir, &mut tmp_dir, &mut tmp_base] {
                *s = s.replace('\\', "/");
            }
        }

        TestPaths {
            source_path,
            source_dir,
            exec_dir,
            tmp_dir,
            tmp_base,
        }
    }
}

fn parent_str(path: &Path) -> String {
    path.parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}
