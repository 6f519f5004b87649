//! Tokenization for RUN-line shell commands
//!
//! Splits a single substituted script line into words, control operators and
//! redirect operators. Quoting follows the POSIX subset the executor
//! understands: single quotes are literal, double quotes honor backslash
//! escapes, bare segments glue onto quoted ones. With `win32_escapes` the
//! backslash is an ordinary character outside quotes (it is the path
//! separator on those hosts).

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::digit1,
    combinator::{opt, value},
    IResult,
};
use thiserror::Error;

/// Redirect operator families recognized by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirKind {
    /// `>`
    Out,
    /// `>>`
    Append,
    /// `>&` - a dup when fd-prefixed (`2>&1`), a merge-to-file otherwise
    OutAnd,
    /// `<`
    In,
    /// `&>`
    Merge,
    /// `&>>`
    MergeAppend,
}

/// A redirect operator with its optional attached fd prefix (`2>`, `1>&`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectOp {
    pub kind: RedirKind,
    pub fd: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A (possibly quoted) word
    Word(String),
    /// `;`
    Semi,
    /// `&`
    Background,
    /// `&&`
    AndIf,
    /// `||`
    OrIf,
    /// `|`
    Pipe,
    /// A redirect operator; its target is the following word
    Redirect(RedirectOp),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LexError {
    #[error("unterminated quoted string")]
    UnterminatedQuote,
}

/// Parse `&&`, `||`, `;`, `|`.
fn control_operator(input: &str) -> IResult<&str, Token> {
    alt((
        value(Token::AndIf, tag("&&")),
        value(Token::OrIf, tag("||")),
        value(Token::Semi, tag(";")),
        value(Token::Pipe, tag("|")),
    ))(input)
}

/// Parse `&>>` and `&>`.
fn merge_operator(input: &str) -> IResult<&str, Token> {
    alt((
        value(
            Token::Redirect(RedirectOp {
                kind: RedirKind::MergeAppend,
                fd: None,
            }),
            tag("&>>"),
        ),
        value(
            Token::Redirect(RedirectOp {
                kind: RedirKind::Merge,
                fd: None,
            }),
            tag("&>"),
        ),
    ))(input)
}

/// Parse `>`, `>>`, `>&`, `<` with an optional attached fd prefix.
fn fd_redirect(input: &str) -> IResult<&str, Token> {
    let (rest, fd) = opt(digit1)(input)?;
    let (rest, kind) = alt((
        value(RedirKind::Append, tag(">>")),
        value(RedirKind::OutAnd, tag(">&")),
        value(RedirKind::Out, tag(">")),
        value(RedirKind::In, tag("<")),
    ))(rest)?;
    let fd = match fd {
        Some(digits) => match digits.parse::<u32>() {
            Ok(n) => Some(n),
            Err(_) => {
                return Err(nom::Err::Error(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::Digit,
                )))
            }
        },
        None => None,
    };
    Ok((rest, Token::Redirect(RedirectOp { kind, fd })))
}

fn redirect_operator(input: &str) -> IResult<&str, Token> {
    alt((merge_operator, fd_redirect))(input)
}

fn is_word_delimiter(c: char) -> bool {
    matches!(c, ' ' | '\t' | ';' | '&' | '|' | '>' | '<' | '\'' | '"')
}

/// Consume a single-quoted segment (after the opening quote).
fn take_single_quoted(rest: &str) -> Result<(String, &str), LexError> {
    let inner = &rest[1..];
    match inner.find('\'') {
        Some(end) => Ok((inner[..end].to_string(), &inner[end + 1..])),
        None => Err(LexError::UnterminatedQuote),
    }
}

/// Consume a double-quoted segment with backslash escapes.
fn take_double_quoted(rest: &str) -> Result<(String, &str), LexError> {
    let inner = &rest[1..];
    let mut out = String::new();
    let mut chars = inner.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((out, &inner[i + c.len_utf8()..])),
            '\\' => match chars.next() {
                Some((_, e)) => {
                    if matches!(e, '"' | '\\' | '$' | '`') {
                        out.push(e);
                    } else {
                        out.push('\\');
                        out.push(e);
                    }
                }
                None => return Err(LexError::UnterminatedQuote),
            },
            _ => out.push(c),
        }
    }
    Err(LexError::UnterminatedQuote)
}

/// Consume a bare segment up to the next delimiter.
fn take_bare(rest: &str, win32_escapes: bool) -> (String, &str) {
    let mut out = String::new();
    let mut consumed = rest.len();
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        if is_word_delimiter(c) {
            consumed = i;
            break;
        }
        if c == '\\' && !win32_escapes {
            match chars.next() {
                Some((_, e)) => out.push(e),
                None => {
                    out.push('\\');
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    (out, &rest[consumed..])
}

/// Consume one word made of glued bare/quoted segments.
fn lex_word(input: &str, win32_escapes: bool) -> Result<(Token, &str), LexError> {
    let mut rest = input;
    let mut text = String::new();
    loop {
        match rest.chars().next() {
            Some('\'') => {
                let (seg, next) = take_single_quoted(rest)?;
                text.push_str(&seg);
                rest = next;
            }
            Some('"') => {
                let (seg, next) = take_double_quoted(rest)?;
                text.push_str(&seg);
                rest = next;
            }
            Some(c) if !is_word_delimiter(c) => {
                let (seg, next) = take_bare(rest, win32_escapes);
                text.push_str(&seg);
                rest = next;
            }
            _ => break,
        }
    }
    Ok((Token::Word(text), rest))
}

/// Tokenize one script line.
pub fn lex(line: &str, win32_escapes: bool) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut rest = line.trim_start_matches([' ', '\t']);
    while !rest.is_empty() {
        if let Ok((next, tok)) = redirect_operator(rest) {
            tokens.push(tok);
            rest = next;
        } else if let Ok((next, tok)) = control_operator(rest) {
            tokens.push(tok);
            rest = next;
        } else if let Some(next) = rest.strip_prefix('&') {
            tokens.push(Token::Background);
            rest = next;
        } else {
            let (tok, next) = lex_word(rest, win32_escapes)?;
            tokens.push(tok);
            rest = next;
        }
        rest = rest.trim_start_matches([' ', '\t']);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(s: &str) -> Token {
        Token::Word(s.to_string())
    }

    #[test]
    fn test_plain_words() {
        let tokens = lex("echo hello world", false).unwrap();
        assert_eq!(tokens, vec![word("echo"), word("hello"), word("world")]);
    }

    #[test]
    fn test_quoted_words_keep_operators_literal() {
        let tokens = lex("sh -c 'echo o; echo e 1>&2'", false).unwrap();
        assert_eq!(
            tokens,
            vec![word("sh"), word("-c"), word("echo o; echo e 1>&2")]
        );
    }

    #[test]
    fn test_glued_segments() {
        let tokens = lex("a'b c'd", false).unwrap();
        assert_eq!(tokens, vec![word("ab cd")]);
    }

    #[test]
    fn test_double_quote_escapes() {
        let tokens = lex(r#"echo "a\"b" "x\ty""#, false).unwrap();
        assert_eq!(tokens, vec![word("echo"), word("a\"b"), word("x\\ty")]);
    }

    #[test]
    fn test_control_operators() {
        let tokens = lex("a && b || c ; d | e & f", false).unwrap();
        assert_eq!(
            tokens,
            vec![
                word("a"),
                Token::AndIf,
                word("b"),
                Token::OrIf,
                word("c"),
                Token::Semi,
                word("d"),
                Token::Pipe,
                word("e"),
                Token::Background,
                word("f"),
            ]
        );
    }

    #[test]
    fn test_redirect_operators() {
        let tokens = lex("cmd > out.txt 2>&1", false).unwrap();
        assert_eq!(
            tokens,
            vec![
                word("cmd"),
                Token::Redirect(RedirectOp {
                    kind: RedirKind::Out,
                    fd: None,
                }),
                word("out.txt"),
                Token::Redirect(RedirectOp {
                    kind: RedirKind::OutAnd,
                    fd: Some(2),
                }),
                word("1"),
            ]
        );
    }

    #[test]
    fn test_fd_prefix_only_attaches_to_redirects() {
        // A standalone digit word stays a word.
        let tokens = lex("echo 2 > out", false).unwrap();
        assert_eq!(
            tokens,
            vec![
                word("echo"),
                word("2"),
                Token::Redirect(RedirectOp {
                    kind: RedirKind::Out,
                    fd: None,
                }),
                word("out"),
            ]
        );

        let tokens = lex("cmd 2>> err.log", false).unwrap();
        assert_eq!(
            tokens[1],
            Token::Redirect(RedirectOp {
                kind: RedirKind::Append,
                fd: Some(2),
            })
        );
    }

    #[test]
    fn test_merge_redirects() {
        let tokens = lex("cmd &> all.txt", false).unwrap();
        assert_eq!(
            tokens[1],
            Token::Redirect(RedirectOp {
                kind: RedirKind::Merge,
                fd: None,
            })
        );

        let tokens = lex("cmd &>> all.txt", false).unwrap();
        assert_eq!(
            tokens[1],
            Token::Redirect(RedirectOp {
                kind: RedirKind::MergeAppend,
                fd: None,
            })
        );
    }

    #[test]
    fn test_backslash_escapes_depend_on_host_mode() {
        let tokens = lex(r"echo \>", false).unwrap();
        assert_eq!(tokens, vec![word("echo"), word(">")]);

        // With win32 escapes the backslash is an ordinary path character.
        let tokens = lex(r"type C:\file.txt", true).unwrap();
        assert_eq!(tokens, vec![word("type"), word(r"C:\file.txt")]);
    }

    #[test]
    fn test_unterminated_quote() {
        assert_eq!(lex("echo 'oops", false), Err(LexError::UnterminatedQuote));
        assert_eq!(lex("echo \"oops", false), Err(LexError::UnterminatedQuote));
    }

    #[test]
    fn test_empty_line() {
        assert_eq!(lex("   ", false).unwrap(), vec![]);
    }
}
