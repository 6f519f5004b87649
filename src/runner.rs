//! Test dispatch and reporting
//!
//! Ties the stages together: assemble the script, pick the internal or
//! external executor, and render the fixed report skeleton. Script lines run
//! fail-fast: internally they are folded into one `&&` sequence, externally
//! the generated script file chains them the same way.

use std::io;
use std::path::Path;

use log::info;
use thiserror::Error;

use crate::config::{RunnerConfig, Test, TestResult, TestStatus};
use crate::exec::{execute_node, ExecContext, ExecError, ExecutedCommand};
use crate::external::execute_script_external;
use crate::parser::parse;
use crate::script::{parse_test_script, ParsedScript};
use crate::subst::Substitution;
use crate::ast::{Node, SeqOp};

#[derive(Error, Debug)]
pub enum RunnerError {
    /// A child was killed by SIGINT; the whole run stops.
    #[error("interrupted")]
    Interrupted,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Outcome of running an assembled script.
enum RunOutcome {
    Completed {
        out: String,
        err: String,
        exit_code: i32,
    },
    /// A result decided before anything ran; passed through unchanged.
    Early(TestResult),
}

/// Run the script with the internal interpreter.
///
/// Produces a per-command diagnostic dump as the run's stdout text; an
/// internal shell error becomes a synthetic exit-127 record.
fn execute_script_internal(
    test: &Test,
    runner: &RunnerConfig,
    commands: &[String],
    cwd: &Path,
) -> Result<RunOutcome, RunnerError> {
    let mut nodes = Vec::with_capacity(commands.len());
    for ln in commands {
        match parse(ln, runner.is_windows, test.config.pipefail) {
            Ok(node) => nodes.push(node),
            Err(_) => {
                return Ok(RunOutcome::Early(TestResult::fail(format!(
                    "shell parser error on: '{}'",
                    ln
                ))))
            }
        }
    }

    let mut iter = nodes.into_iter();
    let Some(mut root) = iter.next() else {
        return Ok(RunOutcome::Completed {
            out: String::new(),
            err: String::new(),
            exit_code: 0,
        });
    };
    for node in iter {
        root = Node::seq(SeqOp::And, root, node);
    }

    let ctx = ExecContext {
        environment: &test.config.environment,
        cwd,
        avoid_dev_null: runner.avoid_dev_null,
    };
    let mut results: Vec<ExecutedCommand> = Vec::new();
    let exit_code = match execute_node(&root, &ctx, &mut results) {
        Ok(code) => code.unwrap_or(0),
        Err(ExecError::Internal { command, message }) => {
            results.push(ExecutedCommand {
                command: command.unwrap_or_default(),
                stdout: String::new(),
                stderr: message,
                exit: 127,
            });
            127
        }
        Err(ExecError::Interrupted) => return Err(RunnerError::Interrupted),
    };

    let mut out = String::new();
    for (i, r) in results.iter().enumerate() {
        out.push_str(&format!("Command {}: {}\n", i, r.command.display_args()));
        out.push_str(&format!("Command {} Result: {}\n", i, r.exit));
        out.push_str(&format!("Command {} Output:\n{}\n\n", i, r.stdout));
        out.push_str(&format!("Command {} Stderr:\n{}\n\n", i, r.stderr));
    }

    Ok(RunOutcome::Completed {
        out,
        err: String::new(),
        exit_code,
    })
}

/// Render the fixed report skeleton for one finished test.
pub fn format_test_output(
    status: TestStatus,
    out: &str,
    err: &str,
    exit_code: i32,
    script: &[String],
) -> TestResult {
    let mut output = format!(
        "Script:\n--\n{}\n--\nExit Code: {}\n\n",
        script.join("\n"),
        exit_code
    );
    if !out.is_empty() {
        output.push_str(&format!("Command Output (stdout):\n--\n{}\n--\n", out));
    }
    if !err.is_empty() {
        output.push_str(&format!("Command Output (stderr):\n--\n{}\n--\n", err));
    }
    TestResult::new(status, output)
}

/// Run one test end to end.
///
/// With `use_external_shell` the script runs under a host shell (and path
/// substitutions are slash-normalized for it); otherwise the internal
/// interpreter is used. Only a SIGINT cancellation or a filesystem failure
/// surfaces as an error; everything else is a `TestResult`.
pub fn execute_sh_test(
    test: &mut Test,
    runner: &RunnerConfig,
    use_external_shell: bool,
    extra_substitutions: &[Substitution],
) -> Result<TestResult, RunnerError> {
    if test.config.unsupported {
        return Ok(TestResult::unsupported("Test is unsupported"));
    }

    let parsed = match parse_test_script(test, use_external_shell, extra_substitutions) {
        Ok(parsed) => parsed,
        Err(early) => return Ok(early),
    };

    if runner.no_execute {
        return Ok(TestResult::new(TestStatus::Pass, ""));
    }

    let ParsedScript {
        script,
        tmp_base,
        exec_dir,
    } = parsed;

    if let Some(parent) = Path::new(&tmp_base).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let cwd = if exec_dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        exec_dir.as_path()
    };

    let (out, err, exit_code) = if use_external_shell {
        execute_script_external(test, runner, &tmp_base, &script, cwd)?
    } else {
        match execute_script_internal(test, runner, &script, cwd)? {
            RunOutcome::Early(result) => return Ok(result),
            RunOutcome::Completed {
                out,
                err,
                exit_code,
            } => (out, err, exit_code),
        }
    };

    let mut status = if exit_code == 0 {
        TestStatus::Pass
    } else {
        TestStatus::Fail
    };
    if status == TestStatus::Fail && test.is_expected_to_fail() {
        status = TestStatus::Xfail;
    }
    info!(
        "{}: {} (exit {})",
        status,
        test.source_path.display(),
        exit_code
    );
    Ok(format_test_output(status, &out, &err, exit_code, &script))
}
