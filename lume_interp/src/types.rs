use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fmt::{Debug, Display},
    rc::Rc,
};

use lume_syntax::{ast::FunctionDecl, lex::escape, token::TextRange};

use crate::{
    error::{ErrorMsg, Exception},
    session::Session,
};

pub const NULL: &str = "NULL";
pub const NUMBER: &str = "NUMBER";
pub const CHAR: &str = "CHAR";
pub const ARRAY: &str = "ARRAY";
pub const STRING: &str = "STRING";
pub const DICTIONARY: &str = "DICTIONARY";
pub const FUNCTION: &str = "FUNCTION";

/// Containers are shared between copies of a value until one of them is
/// written through an index, at which point the writer gets its own copy.
#[derive(Clone, Debug, PartialEq)]
pub enum Data {
    Null,
    Number(f64),
    Char(u8),
    Array(Rc<Vec<Value>>),
    Str(Rc<Vec<u8>>),
    Dict(Rc<BTreeMap<String, Value>>),
    Func(Func),
    NativeFunc(NativeFunc),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Value {
    pub data: Data,
    pub is_const: bool,
}

impl From<Data> for Value {
    fn from(data: Data) -> Self {
        Self {
            data,
            is_const: false,
        }
    }
}

impl Value {
    pub const NULL: Self = Self {
        data: Data::Null,
        is_const: false,
    };

    pub fn number(n: f64) -> Self {
        Data::Number(n).into()
    }

    pub fn boolean(b: bool) -> Self {
        Self::number(if b { 1.0 } else { 0.0 })
    }

    pub fn char(c: u8) -> Self {
        Data::Char(c).into()
    }

    pub fn str(bytes: Vec<u8>) -> Self {
        Data::Str(Rc::new(bytes)).into()
    }

    pub fn string(s: &str) -> Self {
        Self::str(s.as_bytes().to_vec())
    }

    pub fn array(items: Vec<Value>) -> Self {
        Data::Array(Rc::new(items)).into()
    }

    pub fn dict(entries: BTreeMap<String, Value>) -> Self {
        Data::Dict(Rc::new(entries)).into()
    }

    pub fn with_const(mut self, is_const: bool) -> Self {
        self.is_const = is_const;
        self
    }

    pub fn is_null(&self) -> bool {
        matches!(self.data, Data::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self.data {
            Data::Null => NULL,
            Data::Number(_) => NUMBER,
            Data::Char(_) => CHAR,
            Data::Array(_) => ARRAY,
            Data::Str(_) => STRING,
            Data::Dict(_) => DICTIONARY,
            Data::Func(_) | Data::NativeFunc(_) => FUNCTION,
        }
    }

    pub fn is_true(&self) -> bool {
        match &self.data {
            Data::Null => false,
            Data::Number(n) => *n != 0.0,
            Data::Char(c) => *c != 0,
            Data::Array(items) => !items.is_empty(),
            Data::Str(s) => !s.is_empty(),
            Data::Dict(entries) => !entries.is_empty(),
            Data::Func(_) | Data::NativeFunc(_) => true,
        }
    }

    /// Source-like form: chars and strings are quoted and escaped.
    pub fn repr(&self) -> String {
        match &self.data {
            Data::Char(c) => {
                let mut out = "'".to_string();
                push_escaped(&mut out, &[*c]);
                out.push('\'');
                out
            }
            Data::Str(s) => {
                let mut out = "\"".to_string();
                push_escaped(&mut out, s);
                out.push('"');
                out
            }
            _ => self.to_string(),
        }
    }

    /// Raw bytes written by `print`.
    pub fn to_bytes(&self) -> Vec<u8> {
        match &self.data {
            Data::Char(c) => vec![*c],
            Data::Str(s) => s.to_vec(),
            _ => self.to_string().into_bytes(),
        }
    }
}

fn push_escaped(out: &mut String, bytes: &[u8]) {
    for c in String::from_utf8_lossy(bytes).chars() {
        match u8::try_from(c).ok().and_then(escape) {
            Some(e) => {
                out.push('\\');
                out.push(e);
            }
            None => out.push(c),
        }
    }
}

/// Fixed notation with six decimals, trailing zeros and dot stripped.
pub fn format_number(n: f64) -> String {
    let mut s = format!("{n:.6}");
    if s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.').len();
        s.truncate(trimmed);
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.data {
            Data::Null => f.write_str(NULL),
            Data::Number(n) => f.write_str(&format_number(*n)),
            Data::Char(c) => write!(f, "{}", char::from(*c)),
            Data::Str(s) => f.write_str(&String::from_utf8_lossy(s)),
            Data::Array(items) if items.is_empty() => f.write_str("[]"),
            Data::Array(items) => {
                let items: Vec<String> = items.iter().map(Value::repr).collect();
                write!(f, "[ {} ]", items.join(", "))
            }
            Data::Dict(entries) if entries.is_empty() => f.write_str("{}"),
            Data::Dict(entries) => {
                let entries: Vec<String> = entries
                    .iter()
                    .map(|(key, value)| format!("{key} : {}", value.repr()))
                    .collect();
                write!(f, "{{ {} }}", entries.join(", "))
            }
            Data::Func(func) => write!(f, "{func}"),
            Data::NativeFunc(func) => write!(f, "{func}"),
        }
    }
}

/// A value passed to a call, with the source range of its argument.
#[derive(Clone, Debug, PartialEq)]
pub struct Arg {
    pub value: Value,
    pub range: TextRange,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtMost(usize),
}

impl Arity {
    pub fn check(self, found: usize) -> Result<(), ErrorMsg> {
        let (expected, at_most) = match self {
            Self::Exact(n) => (n, false),
            Self::AtMost(n) => (n, true),
        };
        match expected.cmp(&found) {
            Ordering::Greater if !at_most => Err(ErrorMsg::TooFewArgs { expected, found }),
            Ordering::Less => Err(ErrorMsg::TooManyArgs { expected, found }),
            _ => Ok(()),
        }
    }
}

pub trait Callable {
    fn arity(&self) -> Arity;
    fn call(
        &self,
        session: &mut Session,
        args: Vec<Arg>,
        parens: TextRange,
    ) -> Result<Value, Exception>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct Func {
    pub name: String,
    pub decl: Rc<FunctionDecl>,
}

impl Display for Func {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let params: Vec<&str> = self.decl.params.iter().map(|p| p.name.as_str()).collect();
        write!(f, "{FUNCTION} {} ({})", self.name, params.join(", "))
    }
}

impl Callable for Func {
    fn arity(&self) -> Arity {
        Arity::Exact(self.decl.params.len())
    }

    fn call(
        &self,
        session: &mut Session,
        args: Vec<Arg>,
        parens: TextRange,
    ) -> Result<Value, Exception> {
        session.call_func(self, args, parens)
    }
}

pub type NativeBody = fn(&mut Session, Vec<Arg>, TextRange) -> Result<Value, Exception>;

#[derive(Clone)]
pub struct NativeFunc {
    pub name: String,
    pub args: Vec<String>,
    pub arity: Arity,
    pub body: NativeBody,
}

impl PartialEq for NativeFunc {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.args == other.args
    }
}

impl Debug for NativeFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunc")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish()
    }
}

impl Display for NativeFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{FUNCTION} {} ({})", self.name, self.args.join(", "))
    }
}

impl Callable for NativeFunc {
    fn arity(&self) -> Arity {
        self.arity
    }

    fn call(
        &self,
        session: &mut Session,
        args: Vec<Arg>,
        parens: TextRange,
    ) -> Result<Value, Exception> {
        (self.body)(session, args, parens)
    }
}
