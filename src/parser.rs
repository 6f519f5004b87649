//! Parser for RUN-line shell commands
//!
//! Converts tokens into the sequence/pipeline AST. Precedence is the shell's:
//! `;` and `&` bind loosest, then `&&`/`||`, then `|`. A leading `!` negates
//! the pipeline's exit. The parser never executes anything; operators the
//! executor refuses (like `&`) still parse.

use thiserror::Error;

use crate::ast::{Command, Node, Pipeline, Redirect, SeqOp};
use crate::lexer::{lex, LexError, RedirKind, RedirectOp, Token};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("empty command")]
    EmptyCommand,
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unexpected token: {0:?}")]
    UnexpectedToken(Token),
    #[error("redirect is missing its target")]
    MissingRedirectTarget,
}

/// Parser state over the token stream of one script line.
pub struct ShParser {
    tokens: Vec<Token>,
    pos: usize,
    pipefail: bool,
}

/// Parse one script line into an AST.
///
/// `is_windows` selects the host quoting rules for the lexer; `pipefail` is
/// stamped on every pipeline produced.
pub fn parse(line: &str, is_windows: bool, pipefail: bool) -> Result<Node, ParseError> {
    let tokens = lex(line, is_windows)?;
    ShParser::new(tokens, pipefail).parse()
}

impl ShParser {
    pub fn new(tokens: Vec<Token>, pipefail: bool) -> Self {
        ShParser {
            tokens,
            pos: 0,
            pipefail,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Parse the whole line; all tokens must be consumed.
    pub fn parse(&mut self) -> Result<Node, ParseError> {
        let node = self.parse_sequence()?;
        match self.peek() {
            None => Ok(node),
            Some(tok) => Err(ParseError::UnexpectedToken(tok.clone())),
        }
    }

    /// `and_or ((';' | '&') and_or)*`
    fn parse_sequence(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.parse_and_or()?;
        loop {
            let op = match self.peek() {
                Some(Token::Semi) => SeqOp::Semi,
                Some(Token::Background) => SeqOp::Background,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_and_or()?;
            lhs = Node::seq(op, lhs, rhs);
        }
        Ok(lhs)
    }

    /// `pipeline (('&&' | '||') pipeline)*`
    fn parse_and_or(&mut self) -> Result<Node, ParseError> {
        let mut lhs = Node::Pipeline(self.parse_pipeline()?);
        loop {
            let op = match self.peek() {
                Some(Token::AndIf) => SeqOp::And,
                Some(Token::OrIf) => SeqOp::Or,
                _ => break,
            };
            self.advance();
            let rhs = Node::Pipeline(self.parse_pipeline()?);
            lhs = Node::seq(op, lhs, rhs);
        }
        Ok(lhs)
    }

    /// `['!'] command ('|' command)*`
    fn parse_pipeline(&mut self) -> Result<Pipeline, ParseError> {
        let negate = match self.peek() {
            Some(Token::Word(w)) if w == "!" => {
                self.advance();
                true
            }
            _ => false,
        };
        let mut commands = vec![self.parse_command()?];
        while matches!(self.peek(), Some(Token::Pipe)) {
            self.advance();
            commands.push(self.parse_command()?);
        }
        Ok(Pipeline {
            commands,
            pipe_err: self.pipefail,
            negate,
        })
    }

    /// Words and redirects until a control operator.
    fn parse_command(&mut self) -> Result<Command, ParseError> {
        let mut command = Command::default();
        loop {
            match self.peek() {
                Some(Token::Word(_)) => {
                    if let Some(Token::Word(w)) = self.advance() {
                        command.args.push(w);
                    }
                }
                Some(Token::Redirect(_)) => {
                    if let Some(Token::Redirect(op)) = self.advance() {
                        let target = match self.advance() {
                            Some(Token::Word(w)) => w,
                            Some(_) | None => return Err(ParseError::MissingRedirectTarget),
                        };
                        command.redirects.push(resolve_redirect(op, target));
                    }
                }
                _ => break,
            }
        }
        if command.args.is_empty() {
            if self.at_end() {
                Err(ParseError::UnexpectedEof)
            } else {
                Err(ParseError::EmptyCommand)
            }
        } else {
            Ok(command)
        }
    }
}

/// Turn a lexed redirect operator plus its target into an AST redirect.
fn resolve_redirect(op: RedirectOp, target: String) -> Redirect {
    match (op.kind, op.fd) {
        (RedirKind::Out, fd) => Redirect::Out {
            fd: fd.unwrap_or(1),
            path: target,
            append: false,
        },
        (RedirKind::Append, fd) => Redirect::Out {
            fd: fd.unwrap_or(1),
            path: target,
            append: true,
        },
        (RedirKind::In, fd) => Redirect::In {
            fd: fd.unwrap_or(0),
            path: target,
        },
        // An fd-prefixed `>&` duplicates a descriptor; a bare one merges
        // both output streams into a file, same as `&>`.
        (RedirKind::OutAnd, Some(fd)) => Redirect::Dup { fd, target },
        (RedirKind::OutAnd, None) => Redirect::MergeOutErr {
            path: target,
            append: false,
        },
        (RedirKind::Merge, _) => Redirect::MergeOutErr {
            path: target,
            append: false,
        },
        (RedirKind::MergeAppend, _) => Redirect::MergeOutErr {
            path: target,
            append: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_line(line: &str) -> Node {
        parse(line, false, false).unwrap()
    }

    fn single_pipeline(node: Node) -> Pipeline {
        match node {
            Node::Pipeline(p) => p,
            Node::Seq { .. } => panic!("expected a pipeline"),
        }
    }

    #[test]
    fn test_simple_command() {
        let p = single_pipeline(parse_line("echo hello"));
        assert_eq!(p.commands.len(), 1);
        assert_eq!(p.commands[0].args, vec!["echo", "hello"]);
        assert!(!p.negate);
    }

    #[test]
    fn test_pipeline() {
        let p = single_pipeline(parse_line("cat file | grep foo | wc -l"));
        assert_eq!(p.commands.len(), 3);
        assert_eq!(p.commands[1].args, vec!["grep", "foo"]);
    }

    #[test]
    fn test_pipefail_is_stamped_on_every_pipeline() {
        let p = single_pipeline(parse("false | true", false, true).unwrap());
        assert!(p.pipe_err);
        let p = single_pipeline(parse("false | true", false, false).unwrap());
        assert!(!p.pipe_err);
    }

    #[test]
    fn test_negate() {
        let p = single_pipeline(parse_line("! false"));
        assert!(p.negate);
        assert_eq!(p.commands[0].args, vec!["false"]);
    }

    #[test]
    fn test_sequence_precedence() {
        // `a && b ; c` groups as `(a && b) ; c`.
        let node = parse_line("a && b ; c");
        match node {
            Node::Seq { op, lhs, rhs } => {
                assert_eq!(op, SeqOp::Semi);
                assert!(matches!(*lhs, Node::Seq { op: SeqOp::And, .. }));
                assert!(matches!(*rhs, Node::Pipeline(_)));
            }
            Node::Pipeline(_) => panic!("expected sequence"),
        }
    }

    #[test]
    fn test_background_operator_parses() {
        let node = parse_line("a & b");
        match node {
            Node::Seq { op, .. } => assert_eq!(op, SeqOp::Background),
            Node::Pipeline(_) => panic!("expected sequence"),
        }
    }

    #[test]
    fn test_redirects() {
        let p = single_pipeline(parse_line("sh -c 'echo o' > out.txt 2>&1"));
        let cmd = &p.commands[0];
        assert_eq!(cmd.args, vec!["sh", "-c", "echo o"]);
        assert_eq!(
            cmd.redirects,
            vec![
                Redirect::Out {
                    fd: 1,
                    path: "out.txt".into(),
                    append: false,
                },
                Redirect::Dup {
                    fd: 2,
                    target: "1".into(),
                },
            ]
        );
    }

    #[test]
    fn test_merge_redirect() {
        let p = single_pipeline(parse_line("cmd >& all.txt"));
        assert_eq!(
            p.commands[0].redirects,
            vec![Redirect::MergeOutErr {
                path: "all.txt".into(),
                append: false,
            }]
        );
    }

    #[test]
    fn test_input_redirect() {
        let p = single_pipeline(parse_line("cat < input.txt"));
        assert_eq!(
            p.commands[0].redirects,
            vec![Redirect::In {
                fd: 0,
                path: "input.txt".into(),
            }]
        );
    }

    #[test]
    fn test_redirect_in_mid_pipeline() {
        let p = single_pipeline(parse_line("echo x | cat < file | wc"));
        assert_eq!(p.commands.len(), 3);
        assert_eq!(
            p.commands[1].redirects,
            vec![Redirect::In {
                fd: 0,
                path: "file".into(),
            }]
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse("", false, false), Err(ParseError::UnexpectedEof));
        assert_eq!(parse("a &&", false, false), Err(ParseError::UnexpectedEof));
        assert_eq!(
            parse("a | | b", false, false),
            Err(ParseError::EmptyCommand)
        );
        assert_eq!(
            parse("echo >", false, false),
            Err(ParseError::MissingRedirectTarget)
        );
        assert!(parse("echo 'x", false, false).is_err());
    }
}
