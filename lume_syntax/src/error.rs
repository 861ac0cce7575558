use std::fmt::Display;

use crate::{source::LineLog, token::TextRange};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Lex,
    Parse,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Lex => "Lexing error",
            Self::Parse => "Parsing error",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorMsg {
    // Lex errors
    InvalidSyntax,
    UnterminatedChar,
    UseDoubleQuotes,
    UnterminatedString,
    // Parse errors
    ExpressionExpected,
    IdentifierExpected,
    AssignmentExpected,
    InvalidAssignment,
    IncorrectInstruction,
    StringExpected,
    Expected(&'static str),
    UnclosedBody,
}

impl Display for ErrorMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSyntax => f.write_str("invalid syntax"),
            Self::UnterminatedChar => f.write_str("expected '"),
            Self::UseDoubleQuotes => f.write_str("use \"\" for strings"),
            Self::UnterminatedString => f.write_str("expected \""),
            Self::ExpressionExpected => f.write_str("expression expected"),
            Self::IdentifierExpected => f.write_str("identifier expected"),
            Self::AssignmentExpected => f.write_str("assignment expected"),
            Self::InvalidAssignment => f.write_str("invalid assignment target"),
            Self::IncorrectInstruction => f.write_str("incorrect instruction"),
            Self::StringExpected => f.write_str("string expected"),
            Self::Expected(what) => write!(f, "expected '{what}'"),
            Self::UnclosedBody => {
                f.write_str("reached end of input and not all bodies are closed")
            }
        }
    }
}

/// A lexing or parsing failure. These abort the current statement and
/// cannot be caught by the program.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("{kind} - {msg}")]
pub struct Error {
    pub kind: ErrorKind,
    pub msg: ErrorMsg,
    pub range: TextRange,
}

impl Error {
    pub fn lex(msg: ErrorMsg, range: TextRange) -> Self {
        Self {
            kind: ErrorKind::Lex,
            msg,
            range,
        }
    }

    pub fn parse(msg: ErrorMsg, range: TextRange) -> Self {
        Self {
            kind: ErrorKind::Parse,
            msg,
            range,
        }
    }

    /// Full diagnostic with the file header and the marked source line.
    pub fn render(&self, lines: &LineLog) -> String {
        let header = match lines.get(self.range.start.line) {
            Some(line) => format!("File {}, line {}", line.origin, line.number),
            None => "File <unknown>".to_string(),
        };
        format!("{header}\n{}\n{self}", lines.snippet(self.range))
    }
}
