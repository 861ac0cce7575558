use std::collections::BTreeMap;

use log::debug;
use lume_syntax::token::TextRange;

use crate::{
    environment::{FileMode, Scope},
    error::{ErrorMsg, Exception},
    session::Session,
    types::{self, Arg, Arity, Data, NativeBody, NativeFunc, Value},
};

/// Seed `scope` with the constants and built-in functions. Every one of
/// them is bound const.
pub fn init(scope: &mut Scope) {
    scope.set("true", Value::boolean(true).with_const(true));
    scope.set("false", Value::boolean(false).with_const(true));
    scope.set("null", Value::NULL.with_const(true));

    define(scope, "exit", &["code"], Arity::AtMost(1), |_, args, _| {
        let code = args
            .first()
            .map_or_else(|| "0".to_string(), |arg| arg.value.to_string());
        Err(Exception::Exit(code))
    });
    define(scope, "reset", &[], Arity::Exact(0), |session, _, _| {
        session.reset();
        Ok(Value::NULL)
    });
    define(scope, "int", &["value"], Arity::Exact(1), |session, args, _| {
        match args[0].value.data {
            Data::Number(n) => Ok(Value::number(n.trunc())),
            _ => Err(session.error(ErrorMsg::Expected(types::NUMBER), args[0].range)),
        }
    });
    define(scope, "size", &["array"], Arity::Exact(1), |session, args, _| {
        let len = match &args[0].value.data {
            Data::Array(items) => items.len(),
            Data::Str(s) => s.len(),
            Data::Dict(entries) => entries.len(),
            _ => {
                return Err(session.error(
                    ErrorMsg::Expected("ARRAY, STRING, DICTIONARY"),
                    args[0].range,
                ))
            }
        };
        Ok(Value::number(len as f64))
    });
    define(scope, "type", &["value"], Arity::Exact(1), |_, args, _| {
        Ok(Value::string(args[0].value.type_name()))
    });
    define(scope, "locals", &[], Arity::Exact(0), |session, _, _| {
        Ok(describe(session.env.current()))
    });
    define(scope, "globals", &[], Arity::Exact(0), |session, _, _| {
        Ok(describe(session.env.global()))
    });
    define(scope, "number", &["value"], Arity::Exact(1), |session, args, _| {
        args[0]
            .value
            .to_string()
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Value::number)
            .ok_or_else(|| session.error(ErrorMsg::InvalidNumber, args[0].range))
    });
    define(scope, "string", &["value"], Arity::Exact(1), |_, args, _| {
        Ok(Value::str(args[0].value.to_bytes()))
    });
    define(
        scope,
        "open_file",
        &["identifier", "path", "mode"],
        Arity::Exact(3),
        open_file,
    );
    define(
        scope,
        "close_file",
        &["identifier"],
        Arity::Exact(1),
        close_file,
    );
    define(
        scope,
        "global_assign",
        &["name", "value"],
        Arity::Exact(2),
        global_assign,
    );
    define(
        scope,
        "get_dict_keys",
        &["dictionary"],
        Arity::Exact(1),
        |session, args, _| match &args[0].value.data {
            Data::Dict(entries) => Ok(Value::array(
                entries.keys().map(|key| Value::string(key)).collect(),
            )),
            _ => Err(session.error(ErrorMsg::Expected(types::DICTIONARY), args[0].range)),
        },
    );
}

fn define(scope: &mut Scope, name: &str, args: &[&str], arity: Arity, body: NativeBody) {
    let func = NativeFunc {
        name: name.to_string(),
        args: args.iter().map(|arg| arg.to_string()).collect(),
        arity,
        body,
    };
    scope.set(name, Value::from(Data::NativeFunc(func)).with_const(true));
}

/// Bindings and open files of `scope`, keyed by the quoted name.
fn describe(scope: &Scope) -> Value {
    let mut entries = BTreeMap::new();
    for (name, value) in scope.values() {
        entries.insert(Value::string(name).repr(), value.clone().with_const(false));
    }
    for (name, mode, path) in scope.files() {
        entries.insert(
            Value::string(name).repr(),
            Value::string(&format!("File -> {mode} {path}")),
        );
    }
    Value::dict(entries)
}

fn text(session: &Session, arg: &Arg) -> Result<String, Exception> {
    match &arg.value.data {
        Data::Str(s) => Ok(String::from_utf8_lossy(s).into_owned()),
        _ => Err(session.error(ErrorMsg::Expected(types::STRING), arg.range)),
    }
}

/// A string argument naming a variable or file handle.
fn identifier(session: &Session, arg: &Arg) -> Result<String, Exception> {
    let name = text(session, arg)?;
    let mut bytes = name.bytes();
    let valid = bytes
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == b'_')
        && bytes.all(|c| c.is_ascii_alphanumeric() || c == b'_')
        && session.settings.keywords.get(&name).is_none();
    if !valid {
        return Err(session.error(ErrorMsg::NotAnIdentifier, arg.range));
    }
    Ok(name)
}

fn open_file(session: &mut Session, args: Vec<Arg>, _: TextRange) -> Result<Value, Exception> {
    let name = identifier(session, &args[0])?;
    let path = text(session, &args[1])?;
    let mode: FileMode = text(session, &args[2])?
        .parse()
        .map_err(|()| session.error(ErrorMsg::UnknownFileMode, args[2].range))?;
    let scope = session.env.current();
    if scope.is_file(&name) {
        return Err(session.error(ErrorMsg::FileAlreadyOpened, args[0].range));
    }
    if scope.is_const(&name) {
        return Err(session.error(ErrorMsg::ConstantVariable, args[0].range));
    }
    let opened = {
        let scope = session.env.current_mut();
        scope.remove(&name);
        scope.open(&name, &path, mode)
    };
    opened.map_err(|e| {
        debug!("Cannot open {path}: {e}");
        session.error(ErrorMsg::CannotOpenFile, args[1].range)
    })?;
    Ok(Value::NULL)
}

fn close_file(session: &mut Session, args: Vec<Arg>, _: TextRange) -> Result<Value, Exception> {
    let name = text(session, &args[0])?;
    let closed = match session.env.current_mut().close(&name) {
        Some(path) => Some(path),
        None => session.env.global_mut().close(&name),
    };
    let Some(path) = closed else {
        return Err(session.error(ErrorMsg::UnknownIdentifier, args[0].range));
    };
    session.read_buffers.remove(&path);
    Ok(Value::NULL)
}

fn global_assign(session: &mut Session, args: Vec<Arg>, _: TextRange) -> Result<Value, Exception> {
    let name = identifier(session, &args[0])?;
    let global = session.env.global();
    if global.is_file(&name) {
        return Err(session.error(ErrorMsg::FileAlreadyOpened, args[0].range));
    }
    if global.is_const(&name) {
        return Err(session.error(ErrorMsg::ConstantVariable, args[0].range));
    }
    debug!("Set global {name}");
    let value = args[1].value.clone().with_const(false);
    session.env.global_mut().set(&name, value);
    Ok(Value::NULL)
}
