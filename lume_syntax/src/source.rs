use std::{
    collections::{HashMap, VecDeque},
    io::BufRead,
};

use crate::token::TextRange;

/// A line of source as it was read, tagged with the origin it came from
/// and its running line number within that origin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    pub origin: String,
    pub text: String,
    pub number: usize,
}

/// Append-only record of every line read during a session.
///
/// Token positions index into this log, so diagnostics can show the
/// offending line long after it has been parsed.
#[derive(Clone, Debug, Default)]
pub struct LineLog {
    lines: Vec<Line>,
    counters: HashMap<String, usize>,
}

impl LineLog {
    /// Log `text` as the next line of `origin`, returning its index.
    pub fn push(&mut self, origin: &str, text: &str) -> usize {
        let counter = self.counters.entry(origin.to_string()).or_default();
        *counter += 1;
        self.lines.push(Line {
            origin: origin.to_string(),
            text: text.to_string(),
            number: *counter,
        });
        self.lines.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of lines read from `origin` since the last counter reset.
    pub fn count(&self, origin: &str) -> usize {
        self.counters.get(origin).copied().unwrap_or_default()
    }

    /// Restart line numbering for every origin. Logged lines are kept.
    pub fn reset_counters(&mut self) {
        self.counters.clear();
    }

    /// The source line under `range` followed by a caret marker line.
    pub fn snippet(&self, range: TextRange) -> String {
        let Some(line) = self.get(range.start.line) else {
            return String::default();
        };
        let text: String = {
            let trimmed = line.text.trim_start_matches('\t');
            let tabs = line.text.len() - trimmed.len();
            " ".repeat(tabs) + trimmed
        };
        let start = range.start.column.min(text.len());
        let end = if range.end.line == range.start.line {
            range.end.column.min(text.len())
        } else {
            text.len()
        };
        let carets = "^".repeat(end.saturating_sub(start).max(1));
        format!("{text}\n{}{carets}", " ".repeat(start))
    }
}

/// A supplier of source lines: the console, a script, an included file.
///
/// The parser pulls from the active source whenever a body spans more
/// than one line.
pub trait LineSource {
    /// Name under which lines from this source are logged.
    fn origin(&self) -> &str;
    /// The next line without its terminator, or `None` at end of input.
    fn next_line(&mut self) -> Option<String>;
}

/// Lines held in memory.
#[derive(Clone, Debug)]
pub struct ScriptSource {
    origin: String,
    lines: VecDeque<String>,
}

impl ScriptSource {
    pub fn new(origin: &str, text: &str) -> Self {
        Self {
            origin: origin.to_string(),
            lines: text.lines().map(str::to_string).collect(),
        }
    }
}

impl LineSource for ScriptSource {
    fn origin(&self) -> &str {
        &self.origin
    }

    fn next_line(&mut self) -> Option<String> {
        self.lines.pop_front()
    }
}

/// Lines read lazily from any buffered reader.
#[derive(Debug)]
pub struct ReaderSource<R> {
    origin: String,
    reader: R,
}

impl<R: BufRead> ReaderSource<R> {
    pub fn new(origin: &str, reader: R) -> Self {
        Self {
            origin: origin.to_string(),
            reader,
        }
    }
}

impl<R: BufRead> LineSource for ReaderSource<R> {
    fn origin(&self) -> &str {
        &self.origin
    }

    fn next_line(&mut self) -> Option<String> {
        let mut line = String::default();
        match self.reader.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                if line.ends_with('\n') {
                    line.pop();
                    if line.ends_with('\r') {
                        line.pop();
                    }
                }
                Some(line)
            }
        }
    }
}
