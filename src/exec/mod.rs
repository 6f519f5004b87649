//! Internal shell interpreter
//!
//! Walks the parsed script AST and runs it without a host shell: sequences
//! here, pipelines (spawning, fd wiring, draining, reaping) in `pipeline`,
//! redirect resolution in `wiring`.
//!
//! Errors that abort a pipeline (unknown command, unsupported redirect or
//! operator, I/O failure during setup) are returned as values; the caller
//! turns them into a synthetic exit-127 result record. Only a child killed
//! by SIGINT unwinds differently, as a cancellation.

mod pipeline;
mod wiring;

use std::collections::HashMap;
use std::path::Path;
use std::process::ExitStatus;

use thiserror::Error;

use crate::ast::{Command, Node, SeqOp};

/// Captured outcome of one spawned command, in encounter order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedCommand {
    pub command: Command,
    pub stdout: String,
    pub stderr: String,
    pub exit: i32,
}

#[derive(Error, Debug)]
pub enum ExecError {
    /// Pipeline setup failed; converts to exit 127.
    #[error("{message}")]
    Internal {
        command: Option<Command>,
        message: String,
    },
    /// A child died from SIGINT; the whole run is cancelled.
    #[error("interrupted")]
    Interrupted,
}

impl ExecError {
    pub(crate) fn internal(command: &Command, message: impl Into<String>) -> Self {
        ExecError::Internal {
            command: Some(command.clone()),
            message: message.into(),
        }
    }
}

/// Everything a pipeline needs from its surroundings.
#[derive(Debug, Clone, Copy)]
pub struct ExecContext<'a> {
    pub environment: &'a HashMap<String, String>,
    pub cwd: &'a Path,
    /// Replace `/dev/null` with temp files (hosts without a null device).
    pub avoid_dev_null: bool,
}

impl ExecContext<'_> {
    pub(crate) fn path(&self) -> &str {
        self.environment.get("PATH").map(String::as_str).unwrap_or("")
    }
}

/// Execute a script node, appending one result record per spawned command.
///
/// The exit is `None` only for degenerate sequences; a pipeline always
/// yields a concrete code.
pub fn execute_node(
    node: &Node,
    ctx: &ExecContext<'_>,
    results: &mut Vec<ExecutedCommand>,
) -> Result<Option<i32>, ExecError> {
    match node {
        Node::Pipeline(p) => pipeline::execute_pipeline(p, ctx, results).map(Some),
        Node::Seq { op, lhs, rhs } => match op {
            SeqOp::Semi => {
                execute_node(lhs, ctx, results)?;
                execute_node(rhs, ctx, results)
            }
            SeqOp::Background => Err(ExecError::Internal {
                command: None,
                message: format!("unsupported shell operator: '{}'", op.symbol()),
            }),
            SeqOp::And => {
                let res = execute_node(lhs, ctx, results)?;
                match res {
                    None => Ok(None),
                    Some(0) => execute_node(rhs, ctx, results),
                    Some(_) => Ok(res),
                }
            }
            SeqOp::Or => {
                let res = execute_node(lhs, ctx, results)?;
                if res != Some(0) {
                    execute_node(rhs, ctx, results)
                } else {
                    Ok(res)
                }
            }
        },
    }
}

/// Exit code of a reaped child; signal deaths become negative codes.
#[cfg(unix)]
pub(crate) fn exit_code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    match status.code() {
        Some(code) => code,
        None => -status.signal().unwrap_or(0),
    }
}

#[cfg(not(unix))]
pub(crate) fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Strict ASCII decoding first; anything else passes through lossily.
pub(crate) fn decode_output(bytes: &[u8]) -> String {
    if bytes.is_ascii() {
        bytes.iter().map(|&b| b as char).collect()
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}
