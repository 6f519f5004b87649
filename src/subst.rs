//! RUN-line substitutions
//!
//! Substitution keys are full regular expressions, applied to the whole line
//! in table order; later entries may match text produced by earlier ones.
//! `%%` is protected with a marker while the `%`-rules run, then restored to
//! a single `%`.

use regex::Regex;
use thiserror::Error;

use crate::config::TestPaths;

/// One ordered `(pattern, replacement)` rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub pattern: String,
    pub replacement: String,
}

impl Substitution {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Substitution {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SubstError {
    #[error("invalid substitution pattern '{pattern}': {source}")]
    BadPattern {
        pattern: String,
        source: regex::Error,
    },
}

/// Hides `%%` from the `%`-rules until the table restores it.
const PERCENT_MARKER: &str = "#_MARKER_#";

/// A compiled substitution table.
#[derive(Debug)]
pub struct SubstitutionTable {
    entries: Vec<(Regex, String)>,
}

impl SubstitutionTable {
    /// Compile patterns in order.
    ///
    /// With `escape_replacements` (Windows hosts), replacement text is made
    /// literal for the replacement grammar so substituted paths survive
    /// untouched; this applies to every entry, user-supplied ones included.
    pub fn compile(
        substitutions: &[Substitution],
        escape_replacements: bool,
    ) -> Result<Self, SubstError> {
        let mut entries = Vec::with_capacity(substitutions.len());
        for sub in substitutions {
            let regex = Regex::new(&sub.pattern).map_err(|source| SubstError::BadPattern {
                pattern: sub.pattern.clone(),
                source,
            })?;
            let replacement = if escape_replacements {
                escape_replacement(&sub.replacement)
            } else {
                sub.replacement.clone()
            };
            entries.push((regex, replacement));
        }
        Ok(SubstitutionTable { entries })
    }

    /// Rewrite one line through the whole table.
    pub fn apply(&self, line: &str) -> String {
        let mut ln = line.to_string();
        for (regex, replacement) in &self.entries {
            ln = regex.replace_all(&ln, replacement.as_str()).into_owned();
        }
        ln
    }
}

/// Make a replacement string literal for the replacement grammar.
///
/// The replacement grammar treats `$` as the capture-reference escape, so
/// doubling it is what keeps substituted text verbatim here (the analogue of
/// doubling backslashes under engines where `\` is the escape).
fn escape_replacement(text: &str) -> String {
    text.replace('$', "$$")
}

/// Build the full, ordered substitution table for one test.
///
/// Order matters: caller-provided extras first, then the `%%` guard, the
/// suite substitutions, the positional path tokens, the guard's restore, and
/// finally the slash-normalized `%/…` variants.
pub fn build_substitutions(
    paths: &TestPaths,
    config_substitutions: &[Substitution],
    extra_substitutions: &[Substitution],
) -> Vec<Substitution> {
    let tmp_file = format!("{}.tmp", paths.tmp_base);

    let mut subs: Vec<Substitution> = extra_substitutions.to_vec();
    subs.push(Substitution::new("%%", PERCENT_MARKER));
    subs.extend(config_substitutions.iter().cloned());
    subs.extend([
        Substitution::new("%s", paths.source_path.clone()),
        Substitution::new("%S", paths.source_dir.clone()),
        Substitution::new("%p", paths.source_dir.clone()),
        Substitution::new(r"%\{pathsep\}", host_path_separator()),
        Substitution::new("%t", tmp_file),
        Substitution::new("%T", paths.tmp_dir.clone()),
        Substitution::new(PERCENT_MARKER, "%"),
    ]);
    subs.extend([
        Substitution::new("%/s", forward_slashes(&paths.source_path)),
        Substitution::new("%/S", forward_slashes(&paths.source_dir)),
        Substitution::new("%/p", forward_slashes(&paths.source_dir)),
        Substitution::new("%/t", format!("{}.tmp", forward_slashes(&paths.tmp_base))),
        Substitution::new("%/T", forward_slashes(&paths.tmp_dir)),
    ]);
    subs
}

fn forward_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

fn host_path_separator() -> &'static str {
    if cfg!(windows) {
        ";"
    } else {
        ":"
    }
}
