use std::fmt::Display;

use lume_syntax::{source::LineLog, token::TextRange};

use crate::types::Value;

#[derive(Clone, Debug, PartialEq)]
pub enum ErrorMsg {
    // Value errors
    DivisionByZero,
    OutOfBounds { min: i64, max: i64, found: String },
    EmptyContainer,
    IllegalOperation(&'static str, Option<&'static str>),
    Expected(&'static str),
    NonContainerIndex,
    InvalidNumber,
    // Memory errors
    UnknownIdentifier,
    ConstantVariable,
    IndexCannotBeConstant,
    NotAnIdentifier,
    // Call errors
    TooManyArgs { expected: usize, found: usize },
    TooFewArgs { expected: usize, found: usize },
    // Control flow
    InfiniteLoop,
    ReturnOutsideFunction,
    BreakOutsideLoop,
    ContinueOutsideLoop,
    Thrown(String),
    // File errors
    UnknownFileMode,
    CannotOpenFile,
    FileAlreadyOpened,
    FileOpenedForReading,
    FileOpenedForWriting,
    CannotReferenceFiles,
    Io(String),
}

impl Display for ErrorMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DivisionByZero => f.write_str("division by 0"),
            Self::OutOfBounds { min, max, found } => {
                write!(f, "out of bounds: [{min}, {max}] - {found}")
            }
            Self::EmptyContainer => f.write_str("empty container"),
            Self::IllegalOperation(lhs, Some(rhs)) => write!(f, "illegal operation: {lhs}, {rhs}"),
            Self::IllegalOperation(ty, None) => write!(f, "illegal operation: {ty}"),
            Self::Expected(types) => write!(f, "expected {types}"),
            Self::NonContainerIndex => f.write_str("accessing index of non-container value"),
            Self::InvalidNumber => f.write_str("invalid number"),
            Self::UnknownIdentifier => f.write_str("unknown identifier"),
            Self::ConstantVariable => f.write_str("constant variable"),
            Self::IndexCannotBeConstant => f.write_str("index cannot be constant"),
            Self::NotAnIdentifier => f.write_str("not an identifier"),
            Self::TooManyArgs { expected, found } => {
                write!(f, "too many arguments, expected {expected} but found {found}")
            }
            Self::TooFewArgs { expected, found } => {
                write!(f, "too few arguments, expected {expected} but found {found}")
            }
            Self::InfiniteLoop => f.write_str("infinite loop"),
            Self::ReturnOutsideFunction => f.write_str("cannot return values outside of functions"),
            Self::BreakOutsideLoop => f.write_str("cannot use 'break' outside of loops"),
            Self::ContinueOutsideLoop => f.write_str("cannot use 'continue' outside of loops"),
            Self::Thrown(msg) => f.write_str(msg),
            Self::UnknownFileMode => f.write_str("unknown file mode"),
            Self::CannotOpenFile => f.write_str("cannot open file"),
            Self::FileAlreadyOpened => f.write_str("file already opened"),
            Self::FileOpenedForReading => f.write_str("file opened for reading"),
            Self::FileOpenedForWriting => f.write_str("file opened for writing/appending"),
            Self::CannotReferenceFiles => f.write_str("cannot reference files"),
            Self::Io(e) => write!(f, "input/output failure: {e}"),
        }
    }
}

/// A call site recorded while a function runs: the scope the call was
/// made from and the logged line it was made on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub scope: String,
    pub line: usize,
}

/// Where a control flow signal was raised.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Site {
    pub scope: String,
    pub range: TextRange,
}

#[derive(thiserror::Error, Clone, Debug, PartialEq)]
#[error("Runtime error - {msg}")]
pub struct RuntimeError {
    pub scope: String,
    pub msg: ErrorMsg,
    pub range: TextRange,
    pub trace: Vec<Frame>,
}

impl RuntimeError {
    pub fn render(&self, lines: &LineLog) -> String {
        let number = |line: usize| lines.get(line).map(|l| l.number).unwrap_or_default();
        let mut out = "Traceback (innermost call first):\n".to_string();
        let here = Frame {
            scope: self.scope.clone(),
            line: self.range.start.line,
        };
        if self.trace.last() != Some(&here) {
            out += &format!("   In {}, line {}\n", here.scope, number(here.line));
        }
        for frame in self.trace.iter().rev() {
            out += &format!("   In {}, line {}\n", frame.scope, number(frame.line));
        }
        format!("{out}{}\n{self}", lines.snippet(self.range))
    }
}

/// Everything that unwinds evaluation. Only `Error` is a failure; the
/// other variants are control flow that a construct further up owns.
#[derive(Debug)]
pub enum Exception {
    Error(RuntimeError),
    Return(Value, Site),
    Break(Site),
    Continue(Site),
    Exit(String),
}

impl Display for Exception {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error(e) => write!(f, "{e}"),
            Self::Return(val, _) => write!(f, "return {val}"),
            Self::Break(_) => f.write_str("break"),
            Self::Continue(_) => f.write_str("continue"),
            Self::Exit(code) => write!(f, "exit {code}"),
        }
    }
}

impl Exception {
    /// Convert a signal that escaped every owner into a reportable failure.
    pub fn into_failure(self) -> Failure {
        let stray = |msg, site: Site| {
            Failure::Runtime(RuntimeError {
                scope: site.scope,
                msg,
                range: site.range,
                trace: vec![],
            })
        };
        match self {
            Self::Error(e) => Failure::Runtime(e),
            Self::Return(_, site) => stray(ErrorMsg::ReturnOutsideFunction, site),
            Self::Break(site) => stray(ErrorMsg::BreakOutsideLoop, site),
            Self::Continue(site) => stray(ErrorMsg::ContinueOutsideLoop, site),
            Self::Exit(code) => Failure::Exit(code),
        }
    }
}

/// Why a top-level statement did not produce a value.
#[derive(thiserror::Error, Debug)]
pub enum Failure {
    #[error(transparent)]
    Syntax(#[from] lume_syntax::error::Error),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("Program quit with code {0}")]
    Exit(String),
}

impl Failure {
    pub fn render(&self, lines: &LineLog) -> String {
        match self {
            Self::Syntax(e) => e.render(lines),
            Self::Runtime(e) => e.render(lines),
            Self::Exit(_) => self.to_string(),
        }
    }
}
