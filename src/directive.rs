//! Directive scanner for integrated test sources
//!
//! A test source is read as raw bytes so arbitrary encodings do not break
//! the scan; the directive keywords themselves and everything to the right
//! of them must be ASCII. Matching is purely textual: a directive inside a
//! comment or a string literal is picked up all the same.

use std::fmt;
use std::io;
use std::path::Path;
use std::sync::OnceLock;

use regex::bytes::Regex;
use thiserror::Error;

/// Directive kinds recognized in test sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    Run,
    Xfail,
    Requires,
    End,
}

impl DirectiveKind {
    /// Map a matched keyword (with its trailing `:` or `.`) to a kind.
    fn from_keyword(keyword: &[u8]) -> Option<Self> {
        match keyword {
            b"RUN:" => Some(DirectiveKind::Run),
            b"XFAIL:" => Some(DirectiveKind::Xfail),
            b"REQUIRES:" => Some(DirectiveKind::Requires),
            b"END." => Some(DirectiveKind::End),
            _ => None,
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DirectiveKind::Run => "RUN",
            DirectiveKind::Xfail => "XFAIL",
            DirectiveKind::Requires => "REQUIRES",
            DirectiveKind::End => "END",
        };
        f.write_str(name)
    }
}

/// One directive line: its 1-based line number, kind, and the text to the
/// right of the keyword (without the trailing newline).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub line_number: usize,
    pub kind: DirectiveKind,
    pub rest: String,
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("cannot read test source: {0}")]
    Io(#[from] io::Error),
    #[error("directive at line {line_number} is not ASCII")]
    NonAscii { line_number: usize },
    #[error("unknown script command type: '{0}'")]
    UnknownKeyword(String),
}

fn directive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Unicode mode off: `.` must match arbitrary bytes, not codepoints.
        Regex::new(r"(?-u)(RUN:|XFAIL:|REQUIRES:|END\.)(.*)\n").expect("directive pattern is valid")
    })
}

/// Scan raw source bytes for directives, lazily.
///
/// Line numbers are computed by counting newline bytes between consecutive
/// match starts, so a directive's own terminating newline is attributed to
/// the lines in between.
pub fn scan_bytes(data: &[u8]) -> impl Iterator<Item = Result<Directive, ScanError>> + '_ {
    let mut line_number = 1usize;
    let mut last_match_pos = 0usize;
    directive_regex().captures_iter(data).map(move |caps| {
        let whole = caps.get(0).expect("capture 0 is the whole match");
        line_number += count_newlines(&data[last_match_pos..whole.start()]);
        last_match_pos = whole.start();

        let keyword = &caps[1];
        let rest = &caps[2];
        if !keyword.is_ascii() || !rest.is_ascii() {
            return Err(ScanError::NonAscii { line_number });
        }
        let kind = DirectiveKind::from_keyword(keyword).ok_or_else(|| {
            ScanError::UnknownKeyword(String::from_utf8_lossy(keyword).into_owned())
        })?;
        Ok(Directive {
            line_number,
            kind,
            rest: String::from_utf8_lossy(rest).into_owned(),
        })
    })
}

/// Scan a test source file for directives.
pub fn scan_file(path: &Path) -> Result<Vec<Directive>, ScanError> {
    let data = std::fs::read(path)?;
    scan_bytes(&data).collect()
}

fn count_newlines(data: &[u8]) -> usize {
    data.iter().filter(|&&b| b == b'\n').count()
}
