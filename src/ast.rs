//! Shell AST for RUN-line scripts
//!
//! A parsed script line is a tree of sequences over pipelines. Redirects are
//! kept as tagged variants on each command; forms outside the supported
//! subset stay representable and are rejected when the command is executed.

/// A single command: argv plus its redirections, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    pub args: Vec<String>,
    pub redirects: Vec<Redirect>,
}

impl Command {
    pub fn new(args: Vec<String>) -> Self {
        Command {
            args,
            redirects: Vec::new(),
        }
    }

    /// Quoted argv rendering used in diagnostic dumps: `"sh" "-c" "..."`.
    pub fn display_args(&self) -> String {
        self.args
            .iter()
            .map(|a| format!("\"{}\"", a))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A redirection attached to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// `> path`, `>> path`, `2> path`, `2>> path`
    Out { fd: u32, path: String, append: bool },
    /// `< path`
    In { fd: u32, path: String },
    /// `2>&1` and friends; the target word is validated at execution time.
    Dup { fd: u32, target: String },
    /// `&> path` / bare `>& path`: redirect both stdout and stderr.
    MergeOutErr { path: String, append: bool },
}

impl std::fmt::Display for Redirect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Redirect::Out { fd, path, append } => {
                let op = if *append { ">>" } else { ">" };
                if *fd == 1 {
                    write!(f, "{} {}", op, path)
                } else {
                    write!(f, "{}{} {}", fd, op, path)
                }
            }
            Redirect::In { fd, path } => {
                if *fd == 0 {
                    write!(f, "< {}", path)
                } else {
                    write!(f, "{}< {}", fd, path)
                }
            }
            Redirect::Dup { fd, target } => write!(f, "{}>&{}", fd, target),
            Redirect::MergeOutErr { path, append } => {
                write!(f, "{} {}", if *append { "&>>" } else { "&>" }, path)
            }
        }
    }
}

/// Sequencing operator between two script nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqOp {
    /// `;`
    Semi,
    /// `&` - representable but rejected by the executor
    Background,
    /// `&&`
    And,
    /// `||`
    Or,
}

impl SeqOp {
    pub fn symbol(self) -> &'static str {
        match self {
            SeqOp::Semi => ";",
            SeqOp::Background => "&",
            SeqOp::And => "&&",
            SeqOp::Or => "||",
        }
    }
}

/// One or more commands connected by `|`.
///
/// `pipe_err` derives the pipeline exit from every stage rather than the
/// last; `negate` inverts the zero/nonzero polarity of the final exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub commands: Vec<Command>,
    pub pipe_err: bool,
    pub negate: bool,
}

/// A parsed script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Pipeline(Pipeline),
    Seq {
        op: SeqOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
}

impl Node {
    /// Chain two nodes with an operator, consuming both.
    pub fn seq(op: SeqOp, lhs: Node, rhs: Node) -> Self {
        Node::Seq {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
}
