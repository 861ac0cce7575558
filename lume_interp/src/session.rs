use std::{
    collections::{HashMap, VecDeque},
    fs::File,
    io::{self, BufReader, Write},
    mem,
};

use log::{debug, error, trace};
use lume_syntax::{
    ast::Node,
    error::Error as SyntaxError,
    lex::DEFAULT_COMMENT,
    source::{LineLog, LineSource, ReaderSource},
    token::{Keywords, TextRange},
};

use crate::{
    environment::Env,
    error::{ErrorMsg, Exception, Failure, Frame, RuntimeError},
    types::Value,
};

pub const DEFAULT_PROGRAM_NAME: &str = "main";
pub const DEFAULT_MAX_LOOP_ITERATIONS: usize = 100_000;

#[derive(Clone, Debug)]
pub struct Settings {
    /// Byte that starts a comment running to the end of the line.
    pub comment: u8,
    /// Iterations a `while` or `do` loop may run before it is reported
    /// as infinite.
    pub max_loop_iterations: usize,
    /// Name of the global scope and of lines typed at the console.
    pub program_name: String,
    pub keywords: Keywords,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            comment: DEFAULT_COMMENT,
            max_loop_iterations: DEFAULT_MAX_LOOP_ITERATIONS,
            program_name: DEFAULT_PROGRAM_NAME.to_string(),
            keywords: Keywords::default(),
        }
    }
}

/// Output of `print` with no target. Every output line starts with the
/// current indent.
pub struct Console {
    out: Box<dyn Write>,
    indent: String,
    at_line_start: bool,
}

impl Console {
    pub fn new(out: Box<dyn Write>) -> Self {
        Self {
            out,
            indent: String::default(),
            at_line_start: true,
        }
    }

    pub fn set_indent(&mut self, indent: &str) {
        self.indent = indent.to_string();
    }

    pub fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        if bytes.is_empty() && self.at_line_start {
            self.out.write_all(self.indent.as_bytes())?;
            self.at_line_start = false;
        }
        for line in bytes.split_inclusive(|&c| c == b'\n') {
            if self.at_line_start {
                self.out.write_all(self.indent.as_bytes())?;
            }
            self.out.write_all(line)?;
            self.at_line_start = line.ends_with(b"\n");
        }
        self.out.flush()
    }

    /// End a partially written line.
    pub fn finish_line(&mut self) -> io::Result<()> {
        if !self.at_line_start {
            self.out.write_all(b"\n")?;
            self.at_line_start = true;
        }
        self.out.flush()
    }

    /// Show the indent before the console waits for input. The user's
    /// return key ends the line.
    pub fn prompt(&mut self) -> io::Result<()> {
        if !self.indent.is_empty() {
            self.finish_line()?;
            self.out.write_all(self.indent.as_bytes())?;
            self.out.flush()?;
        }
        self.at_line_start = true;
        Ok(())
    }
}

/// Lines from the process's standard input, read through the shared
/// stdin buffer so that several readers can interleave.
#[derive(Debug)]
pub struct StdinLines {
    origin: String,
}

impl StdinLines {
    pub fn new(origin: &str) -> Self {
        Self {
            origin: origin.to_string(),
        }
    }
}

impl LineSource for StdinLines {
    fn origin(&self) -> &str {
        &self.origin
    }

    fn next_line(&mut self) -> Option<String> {
        let mut line = String::default();
        match io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\n', '\r']).to_string()),
        }
    }
}

/// The value of a statement and whether the REPL should echo it.
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    pub value: Value,
    pub echo: bool,
}

impl Outcome {
    pub fn shown(value: Value) -> Self {
        Self { value, echo: true }
    }

    pub fn quiet(value: Value) -> Self {
        Self { value, echo: false }
    }
}

/// Everything an interpreter run owns: scopes, the line log, the call
/// trace, buffered numeric input and the I/O endpoints.
pub struct Session {
    pub settings: Settings,
    pub(crate) env: Env,
    pub(crate) lines: LineLog,
    pub(crate) console: Console,
    input: Box<dyn LineSource>,
    diagnostics: Box<dyn Write>,
    pub(crate) trace: Vec<Frame>,
    pub(crate) read_buffers: HashMap<String, VecDeque<f64>>,
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        Self {
            env: Env::new(&settings.program_name),
            lines: LineLog::default(),
            console: Console::new(Box::new(io::stdout())),
            input: Box::new(StdinLines::new(&settings.program_name)),
            diagnostics: Box::new(io::stderr()),
            trace: vec![],
            read_buffers: HashMap::default(),
            settings,
        }
    }

    pub fn with_console(mut self, out: Box<dyn Write>) -> Self {
        self.console = Console::new(out);
        self
    }

    pub fn with_input(mut self, input: Box<dyn LineSource>) -> Self {
        self.input = input;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Box<dyn Write>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn console(&mut self) -> &mut Console {
        &mut self.console
    }

    pub fn lines(&self) -> &LineLog {
        &self.lines
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    /// Number of lines typed at the console since the last reset.
    pub fn line_count(&self) -> usize {
        self.lines.count(&self.settings.program_name)
    }

    /// Drop every global binding, open file and buffered input. Lines
    /// already logged stay available for diagnostics.
    pub fn reset(&mut self) {
        debug!("Reset session");
        self.env.reset(&self.settings.program_name);
        self.read_buffers.clear();
        self.lines.reset_counters();
    }

    /// Parse and run one statement starting with `text`. Bodies that span
    /// several lines keep reading from `source`.
    pub fn run_line(
        &mut self,
        text: &str,
        source: &mut dyn LineSource,
    ) -> Result<Outcome, Failure> {
        self.trace.clear();
        let Some(node) = self.parse(text, source)? else {
            return Ok(Outcome::quiet(Value::NULL));
        };
        self.interpret(&node).map_err(Exception::into_failure)
    }

    /// Run every statement of `source`. Compile errors are reported and
    /// skipped; a runtime error or `exit` ends the run.
    pub fn run_source(&mut self, source: &mut dyn LineSource) -> Result<(), Failure> {
        while let Some(text) = source.next_line() {
            match self.run_line(&text, source) {
                Ok(_) => {}
                Err(failure @ Failure::Syntax(_)) => self.report(&failure),
                Err(failure @ Failure::Runtime(_)) => {
                    self.report(&failure);
                    return Err(failure);
                }
                Err(failure) => return Err(failure),
            }
        }
        Ok(())
    }

    pub fn report(&mut self, failure: &Failure) {
        let text = failure.render(&self.lines);
        if let Err(e) = writeln!(self.diagnostics, "{text}").and_then(|()| self.diagnostics.flush())
        {
            error!("Cannot write diagnostics: {e}");
        }
    }

    pub fn error(&self, msg: ErrorMsg, range: TextRange) -> Exception {
        Exception::Error(RuntimeError {
            scope: self.env.current().name.clone(),
            msg,
            range,
            trace: self.trace.clone(),
        })
    }

    fn parse(
        &mut self,
        text: &str,
        source: &mut dyn LineSource,
    ) -> Result<Option<Node>, SyntaxError> {
        trace!("Parsing {text}");
        let node = lume_syntax::parse_line(
            text,
            &mut self.lines,
            source,
            &self.settings.keywords,
            self.settings.comment,
        )?;
        trace!("Interpreting {node:#?}");
        Ok(node)
    }

    /// Run the file at `path` line by line unless it has already been
    /// read since the last reset.
    pub(crate) fn include(&mut self, path: &str, range: TextRange) -> Result<(), Exception> {
        if self.lines.count(path) > 0 {
            debug!("Skip {path}, already included");
            return Ok(());
        }
        let file = File::open(path).map_err(|e| {
            debug!("Cannot include {path}: {e}");
            self.error(ErrorMsg::CannotOpenFile, range)
        })?;
        debug!("Include {path}");
        let mut source = ReaderSource::new(path, BufReader::new(file));
        let name = mem::replace(&mut self.env.global_mut().name, path.to_string());
        let frames = self.env.take_frames();
        let result = self.execute(&mut source);
        self.env.restore_frames(frames);
        self.env.global_mut().name = name;
        result
    }

    fn execute(&mut self, source: &mut dyn LineSource) -> Result<(), Exception> {
        while let Some(text) = source.next_line() {
            match self.parse(&text, source) {
                Ok(Some(node)) => {
                    self.interpret(&node)?;
                }
                Ok(None) => {}
                Err(e) => self.report(&Failure::Syntax(e)),
            }
        }
        Ok(())
    }

    /// Next line typed at the console for a `read`.
    pub(crate) fn read_console(&mut self) -> Option<String> {
        if let Err(e) = self.console.prompt() {
            error!("Cannot write prompt: {e}");
        }
        self.input.next_line()
    }
}
