//! Script assembly
//!
//! Walks a test source's directives and produces the final script: RUN lines
//! are right-trimmed, line-number macros expanded, backslash continuations
//! merged, and the substitution table applied. `XFAIL:` entries accumulate
//! on the test, `REQUIRES:` entries gate the result, and a bare `END.`
//! stops the scan.

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::config::{Test, TestPaths, TestResult};
use crate::directive::{scan_bytes, DirectiveKind};
use crate::subst::{build_substitutions, Substitution, SubstitutionTable};

/// The assembled script plus the locations execution needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedScript {
    pub script: Vec<String>,
    pub tmp_base: String,
    pub exec_dir: PathBuf,
}

/// Assemble the script for one test.
///
/// An early `TestResult` carries UNRESOLVED for malformed scripts and
/// UNSUPPORTED for missing required features; callers pass it through.
pub fn parse_test_script(
    test: &mut Test,
    normalize_slashes: bool,
    extra_substitutions: &[Substitution],
) -> Result<ParsedScript, TestResult> {
    let paths = TestPaths::derive(test, normalize_slashes);
    let substitutions =
        build_substitutions(&paths, &test.config.substitutions, extra_substitutions);
    let table = SubstitutionTable::compile(&substitutions, cfg!(windows))
        .map_err(|e| TestResult::unresolved(e.to_string()))?;

    let data = std::fs::read(&test.source_path)
        .map_err(|e| TestResult::unresolved(format!("cannot read test source: {}", e)))?;

    let mut script: Vec<String> = Vec::new();
    let mut requires: Vec<String> = Vec::new();
    for item in scan_bytes(&data) {
        let directive = item.map_err(|e| TestResult::unresolved(e.to_string()))?;
        match directive.kind {
            DirectiveKind::Run => {
                let ln = directive.rest.trim_end();
                let ln = expand_line_macros(ln, directive.line_number);
                match script.last_mut() {
                    Some(prev) if prev.ends_with('\\') => {
                        // Continuation: drop the backslash and concatenate.
                        prev.pop();
                        prev.push_str(&ln);
                    }
                    _ => script.push(ln),
                }
            }
            DirectiveKind::Xfail => test.xfails.extend(split_list(&directive.rest)),
            DirectiveKind::Requires => requires.extend(split_list(&directive.rest)),
            DirectiveKind::End => {
                // Honored only when the rest of the line is blank.
                if directive.rest.trim().is_empty() {
                    break;
                }
            }
        }
    }

    let script: Vec<String> = script
        .iter()
        .map(|ln| table.apply(ln).trim().to_string())
        .collect();

    if script.is_empty() {
        return Err(TestResult::unresolved("Test has no run line!"));
    }
    if script.last().is_some_and(|ln| ln.ends_with('\\')) {
        return Err(TestResult::unresolved(
            "Test has unterminated run lines (with '\\')",
        ));
    }

    let missing: Vec<String> = requires
        .iter()
        .filter(|f| !test.config.available_features.contains(f.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(TestResult::unsupported(format!(
            "Test requires the following features: {}",
            missing.join(", ")
        )));
    }

    Ok(ParsedScript {
        script,
        tmp_base: paths.tmp_base,
        exec_dir: paths.exec_dir,
    })
}

/// Expand `%(line)` and `%(line ± N)` against a directive's own line number.
fn expand_line_macros(line: &str, line_number: usize) -> String {
    static PLAIN: OnceLock<Regex> = OnceLock::new();
    static RELATIVE: OnceLock<Regex> = OnceLock::new();
    let plain = PLAIN.get_or_init(|| Regex::new(r"%\(line\)").expect("line pattern is valid"));
    let relative = RELATIVE.get_or_init(|| {
        Regex::new(r"%\(line *([+-]) *([0-9]+)\)").expect("relative line pattern is valid")
    });

    let ln = plain.replace_all(line, line_number.to_string().as_str());
    let ln = relative.replace_all(&ln, |caps: &Captures<'_>| {
        let offset: i64 = caps[2].parse().unwrap_or(0);
        let base = line_number as i64;
        let value = if &caps[1] == "+" {
            base + offset
        } else {
            base - offset
        };
        value.to_string()
    });
    ln.into_owned()
}

fn split_list(rest: &str) -> Vec<String> {
    rest.split(',').map(|s| s.trim().to_string()).collect()
}
