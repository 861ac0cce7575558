use std::{
    cell::RefCell,
    env, fs,
    io::{self, Write},
    process,
    rc::Rc,
};

use lume_interp::{
    error::{ErrorMsg, Failure},
    run,
    session::{Outcome, Session, Settings},
    types::Value,
};
use lume_syntax::source::{LineSource, ScriptSource};

#[derive(Clone, Default)]
struct Capture(Rc<RefCell<Vec<u8>>>);

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Capture {
    fn take(&self) -> String {
        let bytes = std::mem::take(&mut *self.0.borrow_mut());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

struct Harness {
    session: Session,
    out: Capture,
    diagnostics: Capture,
}

impl Harness {
    fn new() -> Self {
        Self::with_input("")
    }

    fn with_input(input: &str) -> Self {
        let (out, diagnostics) = (Capture::default(), Capture::default());
        let session = Session::new(Settings::default())
            .with_console(Box::new(out.clone()))
            .with_diagnostics(Box::new(diagnostics.clone()))
            .with_input(Box::new(ScriptSource::new("input", input)));
        Self {
            session,
            out,
            diagnostics,
        }
    }

    /// Feed `program` the way the REPL would and return the last outcome.
    fn lines(&mut self, program: &str) -> Result<Outcome, Failure> {
        let mut source = ScriptSource::new("main", program);
        let mut last = Ok(Outcome::quiet(Value::NULL));
        while let Some(line) = source.next_line() {
            last = self.session.run_line(&line, &mut source);
            if last.is_err() {
                break;
            }
        }
        last
    }

    fn value(&mut self, program: &str) -> Value {
        match self.lines(program) {
            Ok(outcome) => outcome.value,
            Err(e) => panic!("{program:?} failed: {}", e.render(self.session.lines())),
        }
    }

    fn runtime_error(&mut self, program: &str) -> ErrorMsg {
        match self.lines(program) {
            Err(Failure::Runtime(e)) => e.msg,
            Err(e) => panic!("{program:?} failed to compile: {e}"),
            Ok(outcome) => panic!("{program:?} succeeded with {}", outcome.value),
        }
    }
}

fn temp_file(tag: &str, contents: &str) -> String {
    let path = env::temp_dir().join(format!("lume_{tag}_{}.lume", process::id()));
    fs::write(&path, contents).expect("temporary file should be writable");
    path.to_string_lossy().into_owned()
}

fn numbers(ns: &[f64]) -> Value {
    Value::array(ns.iter().map(|&n| Value::number(n)).collect())
}

#[test]
fn variables_update() {
    let mut h = Harness::new();
    assert_eq!(h.value("let a <- 5\na <- a + 1\na"), Value::number(6.0));
}

#[test]
fn for_loop_prints_and_collects() {
    let mut h = Harness::new();
    let value = h.value("for i <- 1, 3 execute print i end");
    assert_eq!(h.out.take(), "123");
    assert_eq!(value, numbers(&[1.0, 2.0, 3.0]));
    assert_eq!(value.to_string(), "[ 1, 2, 3 ]");
}

#[test]
fn array_bounds_and_append() {
    let mut h = Harness::new();
    h.value("let arr <- [1,2,3]");
    assert_eq!(
        h.runtime_error("arr[5] <- 9"),
        ErrorMsg::OutOfBounds {
            min: -3,
            max: 2,
            found: "5".to_string()
        }
    );
    h.value("arr[3] <- 9");
    assert_eq!(h.value("arr").to_string(), "[ 1, 2, 3, 9 ]");
    assert_eq!(h.value("arr[-4]"), Value::number(1.0));
    assert_eq!(
        h.runtime_error("arr[-5]"),
        ErrorMsg::OutOfBounds {
            min: -4,
            max: 3,
            found: "-5".to_string()
        }
    );
}

#[test]
fn function_arity() {
    let mut h = Harness::new();
    h.value("function add(x,y): return x + y end");
    assert_eq!(h.value("add(2,3)"), Value::number(5.0));
    assert_eq!(
        h.runtime_error("add(2)"),
        ErrorMsg::TooFewArgs {
            expected: 2,
            found: 1
        }
    );
}

#[test]
fn arity_is_checked_before_the_body_runs() {
    let mut h = Harness::new();
    h.value("function noisy(x): print \"ran\" end");
    h.runtime_error("noisy()");
    assert_eq!(h.out.take(), "");
}

#[test]
fn try_catches_runtime_errors() {
    let mut h = Harness::new();
    let outcome = h
        .lines("try let a <- 1/0 catch print \"caught\" end")
        .expect("the error is caught");
    assert_eq!(h.out.take(), "caught");
    assert_eq!(outcome.value, Value::string("caught"));
    assert_eq!(h.runtime_error("a"), ErrorMsg::UnknownIdentifier);
}

#[test]
fn while_loop_cap() {
    let mut h = Harness::new();
    h.value("n <- 0");
    assert_eq!(
        h.runtime_error("while true execute n <- n + 1 end"),
        ErrorMsg::InfiniteLoop
    );
    assert_eq!(h.value("n"), Value::number(100_000.0));

    h.value("n <- 0");
    let Value { data, .. } = h.value("while n < 100000 execute n <- n + 1 end");
    assert!(matches!(data, lume_interp::types::Data::Array(items) if items.len() == 100_000));
}

#[test]
fn multi_line_bodies() {
    let mut h = Harness::new();
    let program = "\
function classify(n):
    if n < 0 then
        return \"negative\"
    else
        if n = 0 then return \"zero\" end
    end
    return \"positive\"
end
[classify(-1), classify(0), classify(2)]";
    assert_eq!(
        h.value(program).to_string(),
        "[ \"negative\", \"zero\", \"positive\" ]"
    );
    assert_eq!(h.session.line_count(), 9);
}

#[test]
fn runtime_errors_render_a_traceback() {
    let mut h = Harness::new();
    h.value("function inner(x): return x / 0 end");
    h.value("function outer(): return inner(1) end");
    let failure = h.lines("outer()").expect_err("division by zero");
    assert_eq!(
        failure.render(h.session.lines()),
        [
            "Traceback (innermost call first):",
            "   In inner, line 1",
            "   In outer, line 2",
            "   In main, line 3",
            "function inner(x): return x / 0 end",
            "                              ^",
            "Runtime error - division by 0",
        ]
        .join("\n")
    );
}

#[test]
fn compile_errors_are_reported_and_skipped() {
    let mut h = Harness::new();
    run("script", "print 1\nx <- [1,\nprint 2", &mut h.session).expect("no runtime errors");
    assert_eq!(h.out.take(), "12");
    let report = h.diagnostics.take();
    assert!(report.starts_with("File script, line 2\nx <- [1,\n"), "{report}");
    assert!(report.contains("Parsing error - "), "{report}");
}

#[test]
fn stray_break_is_an_error() {
    let mut h = Harness::new();
    assert_eq!(h.runtime_error("break"), ErrorMsg::BreakOutsideLoop);
    let mut h = Harness::new();
    let result = run("script", "print 1\nbreak\nprint 2", &mut h.session);
    assert!(matches!(result, Err(Failure::Runtime(_))));
    assert_eq!(h.out.take(), "1");
    assert!(h
        .diagnostics
        .take()
        .ends_with("Runtime error - cannot use 'break' outside of loops\n"));
}

#[test]
fn const_names_and_containers() {
    let mut h = Harness::new();
    h.value("const limits <- {\"max\": 3}");
    assert_eq!(h.runtime_error("limits <- 1"), ErrorMsg::ConstantVariable);
    assert_eq!(
        h.runtime_error("limits[\"max\"] <- 4"),
        ErrorMsg::ConstantVariable
    );
    assert_eq!(h.value("limits[\"max\"]"), Value::number(3.0));
    assert_eq!(h.value("limits[\"min\"]"), Value::NULL);
}

#[test]
fn strings_and_chars() {
    let mut h = Harness::new();
    assert_eq!(h.value("'a' + 2"), Value::char(b'c'));
    assert_eq!(h.value("\"ab\" * 2 + 'c'"), Value::string("ababc"));
    assert_eq!(h.value("\"hello\" + 3"), Value::string("lo"));
    assert_eq!(h.value("\"abc\" < \"abd\""), Value::number(1.0));
    assert_eq!(h.value("0.1 + 0.2 = 0.3"), Value::number(1.0));
    assert_eq!(h.value("[1, 2] = [1, 2]"), Value::number(1.0));
    assert_eq!(h.value("1 = \"1\""), Value::number(0.0));
    assert_eq!(
        h.runtime_error("1 < \"1\""),
        ErrorMsg::IllegalOperation("NUMBER", Some("STRING"))
    );
}

#[test]
fn reading_console_input() {
    let mut h = Harness::with_input("1 2 3\nname\n");
    h.value("read a, b");
    h.value("read c, d, e");
    assert_eq!(
        h.value("[a, b, c, d, e]").to_string(),
        "[ 1, 2, 3, \"name\", NULL ]"
    );
}

#[test]
fn include_inside_a_function_binds_globals() {
    let path = temp_file("from_call", "g <- 41\nfunction h(): return g + 1 end");
    let mut h = Harness::new();
    h.value(&format!(
        "function load(): local <- 1\ninclude \"{path}\"\nreturn local end"
    ));
    assert_eq!(h.value("load()"), Value::number(1.0));
    assert_eq!(h.value("g"), Value::number(41.0));
    assert_eq!(h.value("h()"), Value::number(42.0));
    assert_eq!(h.runtime_error("local"), ErrorMsg::UnknownIdentifier);
    fs::remove_file(path).expect("temporary file should be removable");
}

#[test]
fn try_catches_stray_control_flow() {
    let mut h = Harness::new();
    assert_eq!(
        h.value("for i <- 1, 3 execute try break catch 7 end end"),
        numbers(&[7.0, 7.0, 7.0])
    );
    h.value("function f(): try return 3 catch return 9 end end");
    assert_eq!(h.value("f()"), Value::number(9.0));
}

#[test]
fn huge_repetition_is_a_runtime_error() {
    let mut h = Harness::new();
    assert!(matches!(
        h.runtime_error("[1, 2] * 1000000000000000000000000000000"),
        ErrorMsg::OutOfBounds { .. }
    ));
    assert!(matches!(
        h.runtime_error("\"ab\" * 1000000000000000000000000000000"),
        ErrorMsg::OutOfBounds { .. }
    ));
    assert_eq!(
        h.value("try 'a' * 1000000000000000000000000000000 catch \"big\" end"),
        Value::string("big")
    );
    assert_eq!(
        h.runtime_error("[1,2,3][-1000000000000000000000000000000]"),
        ErrorMsg::OutOfBounds {
            min: -3,
            max: 2,
            found: "-1000000000000000019884624838656".to_string()
        }
    );
}

#[test]
fn include_runs_once() {
    let path = temp_file("include", "counter <- counter + 1\nfunction twice(x): return x * 2 end");
    let mut h = Harness::new();
    h.value("counter <- 0");
    h.value(&format!("include \"{path}\""));
    h.value(&format!("include \"{path}\""));
    assert_eq!(h.value("counter"), Value::number(1.0));
    assert_eq!(h.value("twice(4)"), Value::number(8.0));
    assert_eq!(
        h.runtime_error("include \"/nonexistent/lume/file\""),
        ErrorMsg::CannotOpenFile
    );
    fs::remove_file(path).expect("temporary file should be removable");
}

#[test]
fn include_reports_compile_errors_and_continues() {
    let path = temp_file("broken", "x <- 1\ny <- (\nz <- 3");
    let mut h = Harness::new();
    h.value(&format!("include \"{path}\""));
    assert_eq!(h.value("x + z"), Value::number(4.0));
    let report = h.diagnostics.take();
    assert!(report.starts_with(&format!("File {path}, line 2\n")), "{report}");
    fs::remove_file(path).expect("temporary file should be removable");
}

#[test]
fn included_errors_name_the_file() {
    let path = temp_file("failing", "ok <- 1\nbad <- missing");
    let mut h = Harness::new();
    let failure = h
        .lines(&format!("include \"{path}\""))
        .expect_err("unknown identifier");
    let Failure::Runtime(e) = &failure else {
        panic!("expected a runtime error");
    };
    assert_eq!(e.scope, path);
    assert!(failure
        .render(h.session.lines())
        .starts_with(&format!("Traceback (innermost call first):\n   In {path}, line 2\n")));
    // The global scope gets its name back
    assert_eq!(h.session.env().global().name, "main");
    fs::remove_file(path).expect("temporary file should be removable");
}

#[test]
fn run_resets_first() {
    let path = temp_file("run", "fresh <- 1");
    let mut h = Harness::new();
    h.value("stale <- 1");
    h.value(&format!("run \"{path}\""));
    assert_eq!(h.runtime_error("stale"), ErrorMsg::UnknownIdentifier);
    assert_eq!(h.value("fresh"), Value::number(1.0));
    // Running again re-reads the file since counters were reset
    h.value("fresh <- 5");
    h.value(&format!("run \"{path}\""));
    assert_eq!(h.value("fresh"), Value::number(1.0));
    fs::remove_file(path).expect("temporary file should be removable");
}

#[test]
fn files_round_trip() {
    let path = temp_file("data", "");
    let mut h = Harness::new();
    h.value(&format!("open_file(\"f\", \"{path}\", \"write\")"));
    h.value("print \"1 2\\n\", \"text\\n\" : f");
    h.value("close_file(\"f\")");
    h.value(&format!("open_file(\"f\", \"{path}\", \"append\")"));
    h.value("print 3 : f");
    h.value("close_file(\"f\")");
    h.value(&format!("open_file(\"f\", \"{path}\", \"read\")"));
    assert_eq!(
        h.value("locals()[\"f\"]"),
        Value::string(&format!("File -> read {path}"))
    );
    h.value("read a, b, c, d : f");
    assert_eq!(
        h.value("[a, b, c, d]").to_string(),
        "[ 1, 2, \"text\", 3 ]"
    );
    h.value("close_file(\"f\")");
    assert_eq!(h.runtime_error("read a : f"), ErrorMsg::UnknownIdentifier);
    fs::remove_file(path).expect("temporary file should be removable");
}

#[test]
fn files_close_with_their_frame() {
    let path = temp_file("frame", "");
    let mut h = Harness::new();
    h.value(&format!(
        "function log(x): open_file(\"out\", \"{path}\", \"append\")\nprint x : out end"
    ));
    h.value("log(1)");
    h.value("log(2)");
    assert_eq!(fs::read_to_string(&path).expect("file exists"), "12");
    assert_eq!(h.runtime_error("print 3 : out"), ErrorMsg::UnknownIdentifier);
    fs::remove_file(path).expect("temporary file should be removable");
}

#[test]
fn exit_ends_the_program() {
    let mut h = Harness::new();
    let result = run("script", "print 1\nexit(4)\nprint 2", &mut h.session);
    assert!(matches!(result, Err(Failure::Exit(code)) if code == "4"));
    assert_eq!(h.out.take(), "1");
    assert_eq!(
        Failure::Exit("4".to_string()).to_string(),
        "Program quit with code 4"
    );
}

#[test]
fn reset_restores_builtins() {
    let mut h = Harness::new();
    h.value("x <- 1");
    h.value("reset()");
    assert_eq!(h.runtime_error("x"), ErrorMsg::UnknownIdentifier);
    assert_eq!(h.value("type(true)"), Value::string("NUMBER"));
    // Counting restarts after the reset call
    assert_eq!(h.session.line_count(), 2);
}
