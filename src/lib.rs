//! shtest - a test driver for sources with embedded shell scripts
//!
//! # Overview
//!
//! A test source file carries directive lines that describe how to run it:
//!
//! ```text
//! // RUN: mytool %s -o %t
//! // RUN: grep expected %t
//! // REQUIRES: mytool
//! // XFAIL: arm
//! ```
//!
//! `RUN:` lines form a small shell script. After path and line-number
//! substitution (`%s`, `%t`, `%(line+1)`, ...), the script runs either under
//! a from-scratch internal interpreter - no host shell involved - or as a
//! generated script file handed to `bash`, `/bin/sh`, or `cmd.exe`. Both
//! paths chain the lines fail-fast and support `pipefail` semantics, and
//! produce the same pass/fail report.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use shtest::{execute_sh_test, RunnerConfig, Test, TestConfig};
//!
//! let source = PathBuf::from("tests/basic.c");
//! let mut test = Test::new(source.clone(), source, TestConfig::from_env());
//! let result = execute_sh_test(&mut test, &RunnerConfig::default(), false, &[]).unwrap();
//! println!("{}: {}", result.status, result.output);
//! ```

pub mod ast;
pub mod config;
pub mod directive;
pub mod exec;
pub mod external;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod runner;
pub mod script;
pub mod subst;

// Re-export commonly used items
pub use ast::{Command, Node, Pipeline, Redirect, SeqOp};
pub use config::{RunnerConfig, Test, TestConfig, TestResult, TestStatus};
pub use directive::{scan_bytes, scan_file, Directive, DirectiveKind, ScanError};
pub use exec::{execute_node, ExecContext, ExecError, ExecutedCommand};
pub use external::execute_script_external;
pub use lexer::{lex, LexError, Token};
pub use parser::{parse, ParseError};
pub use resolver::which;
pub use runner::{execute_sh_test, format_test_output, RunnerError};
pub use script::{parse_test_script, ParsedScript};
pub use subst::{build_substitutions, Substitution, SubstitutionTable};
