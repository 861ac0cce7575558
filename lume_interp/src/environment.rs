use std::{
    collections::HashMap,
    fmt::Display,
    fs::{File, OpenOptions},
    io::{self, BufReader, BufWriter},
    mem,
    str::FromStr,
};

use log::debug;
use lume_syntax::source::ReaderSource;

use crate::{stdlib, types::Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileMode {
    Read,
    Write,
    Append,
}

impl Display for FileMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Append => "append",
        })
    }
}

impl FromStr for FileMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "append" => Ok(Self::Append),
            _ => Err(()),
        }
    }
}

#[derive(Debug)]
pub struct InputFile {
    pub path: String,
    pub reader: ReaderSource<BufReader<File>>,
}

#[derive(Debug)]
pub struct OutputFile {
    pub path: String,
    pub mode: FileMode,
    pub writer: BufWriter<File>,
}

/// Bindings and open files of the program or of one running call.
#[derive(Debug, Default)]
pub struct Scope {
    pub name: String,
    values: HashMap<String, Value>,
    inputs: HashMap<String, InputFile>,
    outputs: HashMap<String, OutputFile>,
}

impl Scope {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.values.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    pub fn is_const(&self, name: &str) -> bool {
        self.values.get(name).map_or(false, |v| v.is_const)
    }

    pub fn values(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn is_file(&self, name: &str) -> bool {
        self.inputs.contains_key(name) || self.outputs.contains_key(name)
    }

    pub fn open(&mut self, name: &str, path: &str, mode: FileMode) -> io::Result<()> {
        debug!("Open {name} -> {mode} {path}");
        match mode {
            FileMode::Read => {
                let file = File::open(path)?;
                self.inputs.insert(
                    name.to_string(),
                    InputFile {
                        path: path.to_string(),
                        reader: ReaderSource::new(path, BufReader::new(file)),
                    },
                );
            }
            FileMode::Write | FileMode::Append => {
                let file = OpenOptions::new()
                    .write(true)
                    .create(true)
                    .append(mode == FileMode::Append)
                    .truncate(mode == FileMode::Write)
                    .open(path)?;
                self.outputs.insert(
                    name.to_string(),
                    OutputFile {
                        path: path.to_string(),
                        mode,
                        writer: BufWriter::new(file),
                    },
                );
            }
        }
        Ok(())
    }

    /// Close the handle called `name`, returning the path it had open.
    pub fn close(&mut self, name: &str) -> Option<String> {
        debug!("Close {name}");
        if let Some(input) = self.inputs.remove(name) {
            return Some(input.path);
        }
        self.outputs.remove(name).map(|output| output.path)
    }

    pub fn input_mut(&mut self, name: &str) -> Option<&mut InputFile> {
        self.inputs.get_mut(name)
    }

    pub fn output_mut(&mut self, name: &str) -> Option<&mut OutputFile> {
        self.outputs.get_mut(name)
    }

    pub fn is_input(&self, name: &str) -> bool {
        self.inputs.contains_key(name)
    }

    pub fn is_output(&self, name: &str) -> bool {
        self.outputs.contains_key(name)
    }

    /// Open handles as `(name, mode, path)`.
    pub fn files(&self) -> impl Iterator<Item = (&String, FileMode, &String)> {
        self.inputs
            .iter()
            .map(|(name, file)| (name, FileMode::Read, &file.path))
            .chain(
                self.outputs
                    .iter()
                    .map(|(name, file)| (name, file.mode, &file.path)),
            )
    }
}

/// The global scope plus one scope per active call. Lookups consult the
/// innermost call first and fall back to the global scope; there is no
/// chaining through enclosing calls.
#[derive(Debug)]
pub struct Env {
    global: Scope,
    frames: Vec<Scope>,
}

impl Env {
    pub fn new(name: &str) -> Self {
        let mut global = Scope::new(name);
        stdlib::init(&mut global);
        Self {
            global,
            frames: vec![],
        }
    }

    pub fn current(&self) -> &Scope {
        self.frames.last().unwrap_or(&self.global)
    }

    pub fn current_mut(&mut self) -> &mut Scope {
        match self.frames.last_mut() {
            Some(frame) => frame,
            None => &mut self.global,
        }
    }

    pub fn global(&self) -> &Scope {
        &self.global
    }

    pub fn global_mut(&mut self) -> &mut Scope {
        &mut self.global
    }

    pub fn push_frame(&mut self, scope: Scope) {
        debug!("Enter {}", scope.name);
        self.frames.push(scope);
    }

    pub fn pop_frame(&mut self) -> Option<Scope> {
        let scope = self.frames.pop();
        if let Some(scope) = &scope {
            debug!("Leave {}", scope.name);
        }
        scope
    }

    /// Detach every call frame, leaving the global scope current.
    pub fn take_frames(&mut self) -> Vec<Scope> {
        debug!("Suspend {} frames", self.frames.len());
        mem::take(&mut self.frames)
    }

    /// Reattach frames detached by `take_frames`.
    pub fn restore_frames(&mut self, frames: Vec<Scope>) {
        self.frames = frames;
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        debug!("Get {name}");
        self.current().get(name).or_else(|| {
            debug!("Get {name} from global");
            self.global.get(name)
        })
    }

    pub fn set(&mut self, name: &str, value: Value) {
        debug!("Set {name} -> {value:?}");
        self.current_mut().set(name, value);
    }

    pub fn binding_mut(&mut self, name: &str) -> Option<&mut Value> {
        debug!("Assign into {name}");
        if self.in_frame(|frame| frame.get(name).is_some()) {
            return self.frames.last_mut().and_then(|frame| frame.get_mut(name));
        }
        self.global.get_mut(name)
    }

    pub fn input_mut(&mut self, name: &str) -> Option<&mut InputFile> {
        if self.in_frame(|frame| frame.is_input(name)) {
            return self.frames.last_mut().and_then(|frame| frame.input_mut(name));
        }
        self.global.input_mut(name)
    }

    pub fn output_mut(&mut self, name: &str) -> Option<&mut OutputFile> {
        if self.in_frame(|frame| frame.is_output(name)) {
            return self.frames.last_mut().and_then(|frame| frame.output_mut(name));
        }
        self.global.output_mut(name)
    }

    pub fn is_input(&self, name: &str) -> bool {
        self.current().is_input(name) || self.global.is_input(name)
    }

    pub fn is_output(&self, name: &str) -> bool {
        self.current().is_output(name) || self.global.is_output(name)
    }

    fn in_frame(&self, found: impl Fn(&Scope) -> bool) -> bool {
        self.frames.last().map_or(false, found)
    }

    /// Replace the global scope with a freshly seeded one, closing its
    /// files. Active call frames are left alone.
    pub fn reset(&mut self, name: &str) {
        debug!("Reset global scope {name}");
        self.global = Scope::new(name);
        stdlib::init(&mut self.global);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs, io::Write, process};

    fn temp_path(tag: &str) -> String {
        env::temp_dir()
            .join(format!("lume_env_{tag}_{}", process::id()))
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn frames_fall_back_to_global() {
        let mut env = Env::new("main");
        env.set("a", Value::number(1.0));
        env.push_frame(Scope::new("f"));
        assert_eq!(env.current().name, "f");
        assert_eq!(env.get("a"), Some(&Value::number(1.0)));
        env.set("a", Value::number(2.0));
        assert_eq!(env.get("a"), Some(&Value::number(2.0)));
        assert_eq!(env.global().get("a"), Some(&Value::number(1.0)));

        env.push_frame(Scope::new("g"));
        // Only the innermost frame and the global scope are visible
        assert_eq!(env.get("a"), Some(&Value::number(1.0)));
        env.pop_frame();
        env.pop_frame();
        assert_eq!(env.current().name, "main");
        assert_eq!(env.depth(), 0);
    }

    #[test]
    fn suspended_frames_come_back() {
        let mut env = Env::new("main");
        let mut frame = Scope::new("f");
        frame.set("local", Value::number(1.0));
        env.push_frame(frame);
        let frames = env.take_frames();
        assert_eq!(env.current().name, "main");
        env.set("shared", Value::number(2.0));
        env.restore_frames(frames);
        assert_eq!(env.current().name, "f");
        assert_eq!(env.get("local"), Some(&Value::number(1.0)));
        assert_eq!(env.get("shared"), Some(&Value::number(2.0)));
    }

    #[test]
    fn binding_mut_prefers_frame() {
        let mut env = Env::new("main");
        env.set("x", Value::number(1.0));
        env.push_frame(Scope::new("f"));
        *env.binding_mut("x").unwrap() = Value::number(5.0);
        env.pop_frame();
        assert_eq!(env.get("x"), Some(&Value::number(5.0)));
        assert!(env.binding_mut("missing").is_none());
    }

    #[test]
    fn builtins_are_seeded_const() {
        let env = Env::new("main");
        for name in ["true", "false", "null", "size", "open_file"] {
            assert!(env.global().is_const(name), "{name} should be const");
        }
        assert_eq!(env.get("true"), Some(&Value::number(1.0).with_const(true)));
    }

    #[test]
    fn reset_drops_bindings() {
        let mut env = Env::new("main");
        env.set("x", Value::number(1.0));
        env.global_mut().name = "lib.lume".to_string();
        env.reset("main");
        assert!(env.get("x").is_none());
        assert!(env.get("type").is_some());
        assert_eq!(env.global().name, "main");
    }

    #[test]
    fn file_modes() {
        assert_eq!("append".parse::<FileMode>(), Ok(FileMode::Append));
        assert!("rw".parse::<FileMode>().is_err());
        assert_eq!(FileMode::Write.to_string(), "write");
    }

    #[test]
    fn open_and_close_files() {
        let path = temp_path("files");
        let mut scope = Scope::new("main");
        scope.open("out", &path, FileMode::Write).unwrap();
        assert!(scope.is_output("out") && scope.is_file("out"));
        scope
            .output_mut("out")
            .unwrap()
            .writer
            .write_all(b"12\n")
            .unwrap();
        assert_eq!(scope.close("out"), Some(path.clone()));
        assert_eq!(fs::read_to_string(&path).unwrap(), "12\n");

        scope.open("in", &path, FileMode::Read).unwrap();
        let files: Vec<_> = scope.files().collect();
        assert_eq!(files, vec![(&"in".to_string(), FileMode::Read, &path)]);
        assert!(scope.open("bad", &temp_path("missing/x"), FileMode::Read).is_err());
        fs::remove_file(&path).unwrap();
    }
}
