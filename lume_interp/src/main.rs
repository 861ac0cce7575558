use std::{
    env,
    fs::File,
    io::{self, BufReader, Write},
    process,
};

use log::error;
use lume_interp::{
    error::Failure,
    session::{Session, Settings, StdinLines},
};
use lume_syntax::source::{LineSource, ReaderSource};

fn main() {
    pretty_env_logger::init();
    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() > 1 {
        eprintln!("Usage: lume [file]");
        process::exit(2);
    }
    let session = Session::new(Settings::default());
    let code = match args.first() {
        Some(path) => run_file(session, path),
        None => run_repl(session),
    };
    process::exit(code);
}

/// Continuation lines typed while a body is still open, prompted with
/// the line number they will be logged under.
struct Continuation {
    stdin: StdinLines,
    next: usize,
}

impl LineSource for Continuation {
    fn origin(&self) -> &str {
        self.stdin.origin()
    }

    fn next_line(&mut self) -> Option<String> {
        print!("{} ... ", self.next);
        if let Err(e) = io::stdout().flush() {
            error!("Failed to flush stdout: {e}");
        }
        self.next += 1;
        self.stdin.next_line()
    }
}

fn run_repl(mut session: Session) -> i32 {
    let mut stdin = Continuation {
        stdin: StdinLines::new(&session.settings.program_name),
        next: 0,
    };
    loop {
        if let Err(e) = session.console().finish_line() {
            error!("Failed to write to stdout: {e}");
        }
        let n = session.line_count() + 1;
        let indent = format!("{}   < ", " ".repeat(n.to_string().len()));
        session.console().set_indent(&indent);
        print!("{n} >>> ");
        if let Err(e) = io::stdout().flush() {
            error!("Failed to flush stdout: {e}");
        }
        // End of input, usually Ctrl-D
        let Some(line) = stdin.stdin.next_line() else {
            println!();
            return 0;
        };
        stdin.next = n + 1;
        match session.run_line(&line, &mut stdin) {
            Ok(outcome) if outcome.echo => {
                let console = session.console();
                let echo = format!("{}\n", outcome.value.repr());
                let echoed = console
                    .finish_line()
                    .and_then(|()| console.write(echo.as_bytes()));
                if let Err(e) = echoed {
                    error!("Failed to write to stdout: {e}");
                }
            }
            Ok(_) => {}
            Err(Failure::Exit(code)) => return quit(&mut session, &code),
            Err(failure) => {
                if let Err(e) = session.console().finish_line() {
                    error!("Failed to write to stdout: {e}");
                }
                session.report(&failure);
            }
        }
    }
}

fn run_file(mut session: Session, path: &str) -> i32 {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Cannot open {path}: {e}");
            return 1;
        }
    };
    let mut source = ReaderSource::new(path, BufReader::new(file));
    match session.run_source(&mut source) {
        Ok(()) => 0,
        Err(Failure::Exit(code)) => quit(&mut session, &code),
        Err(_) => 1,
    }
}

/// Announce an `exit` and turn its code into a process status.
fn quit(session: &mut Session, code: &str) -> i32 {
    if let Err(e) = session.console().finish_line() {
        error!("Failed to write to stdout: {e}");
    }
    println!("\n{}\n", Failure::Exit(code.to_string()));
    code.parse().unwrap_or_default()
}
