use std::{io::Write, rc::Rc};

use log::debug;
use lume_syntax::{
    ast::{BinOp, Body, Expr, FunctionDecl, Ident, Literal, Node, Target, UnaryOp},
    source::LineSource,
    token::TextRange,
};

use crate::{
    environment::Scope,
    error::{ErrorMsg, Exception, Frame, Site},
    ops::{self, Blame, OpError},
    session::{Outcome, Session},
    types::{self, Arg, Callable, Data, Func, Value},
};

const ANONYMOUS: &str = "<anonymous>";
/// Read buffer key for numbers typed at the console.
const CONSOLE_STREAM: &str = "<console>";
const NUMERIC_INPUT: &[u8] = b".- 0123456789";

impl Session {
    pub fn interpret(&mut self, node: &Node) -> Result<Outcome, Exception> {
        match &node.expr {
            Expr::Literal(literal) => Ok(Outcome::shown(Self::interpret_literal(literal))),
            Expr::Array(items) => self.interpret_array(items).map(Outcome::shown),
            Expr::Dict(entries) => self.interpret_dict(entries).map(Outcome::shown),
            Expr::Variable(ident) => self.interpret_variable(ident).map(Outcome::shown),
            Expr::Unary { op, expr } => self.interpret_unary(*op, expr).map(Outcome::shown),
            Expr::Binary { lhs, op, rhs } => {
                self.interpret_binary(lhs, *op, rhs).map(Outcome::shown)
            }
            Expr::Logical { lhs, op, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                Ok(Outcome::shown(ops::logical(*op, &lhs, &rhs)))
            }
            Expr::Assignment {
                target,
                value,
                is_const,
            } => self
                .interpret_assignment(target, value, *is_const)
                .map(Outcome::quiet),
            Expr::Index { container, index } => {
                self.interpret_index(container, index).map(Outcome::shown)
            }
            Expr::Call { func, args, parens } => {
                self.interpret_call(func, args, *parens).map(Self::unless_null)
            }
            Expr::If {
                condition,
                then_body,
                else_body,
            } => self
                .interpret_if(condition, then_body, else_body.as_deref())
                .map(Outcome::quiet),
            Expr::For {
                target,
                start,
                stop,
                step,
                body,
            } => self
                .interpret_for(target, start, stop, step.as_deref(), body)
                .map(Outcome::quiet),
            Expr::While { condition, body } => {
                self.interpret_while(condition, body).map(Outcome::shown)
            }
            Expr::DoUntil { body, condition } => {
                self.interpret_do(body, condition).map(Outcome::shown)
            }
            Expr::Print { args, target } => self
                .interpret_print(args, target.as_ref())
                .map(Outcome::quiet),
            Expr::Read { targets, source } => self
                .interpret_read(targets, source.as_ref())
                .map(Outcome::quiet),
            Expr::Try { body, catch } => self
                .interpret_try(body, catch.as_deref())
                .map(Self::unless_null),
            Expr::Throw(value) => {
                let value = self.eval(value)?;
                Err(self.error(ErrorMsg::Thrown(value.to_string()), node.range))
            }
            Expr::Function(decl) => self.interpret_function(decl).map(Outcome::quiet),
            Expr::Return(value) => {
                let value = match value {
                    Some(value) => self.eval(value)?,
                    None => Value::NULL,
                };
                Err(Exception::Return(value, self.site(node.range)))
            }
            Expr::Break => Err(Exception::Break(self.site(node.range))),
            Expr::Continue => Err(Exception::Continue(self.site(node.range))),
            Expr::Include(path) => self
                .include(path, node.range)
                .map(|()| Outcome::quiet(Value::NULL)),
            Expr::Run(path) => {
                self.reset();
                self.include(path, node.range)
                    .map(|()| Outcome::quiet(Value::NULL))
            }
        }
    }

    fn eval(&mut self, node: &Node) -> Result<Value, Exception> {
        self.interpret(node).map(|outcome| outcome.value)
    }

    fn unless_null(value: Value) -> Outcome {
        if value.is_null() {
            Outcome::quiet(value)
        } else {
            Outcome::shown(value)
        }
    }

    fn site(&self, range: TextRange) -> Site {
        Site {
            scope: self.env.current().name.clone(),
            range,
        }
    }

    /// Point an operator error at the operand it blames.
    fn op_error(&self, e: OpError, lhs: TextRange, rhs: TextRange) -> Exception {
        let range = match e.blame {
            Blame::Lhs => lhs,
            Blame::Rhs => rhs,
            Blame::Both | Blame::Value => lhs.to(rhs),
        };
        self.error(e.msg, range)
    }

    fn interpret_literal(literal: &Literal) -> Value {
        match literal {
            Literal::Number(n) => Value::number(*n),
            Literal::Char(c) => Value::char(*c),
            Literal::Str(s) => Value::string(s),
        }
    }

    fn interpret_array(&mut self, items: &[Node]) -> Result<Value, Exception> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            values.push(self.eval(item)?.with_const(false));
        }
        Ok(Value::array(values))
    }

    fn interpret_dict(&mut self, entries: &[(Node, Node)]) -> Result<Value, Exception> {
        let mut dict = std::collections::BTreeMap::new();
        for (key, value) in entries {
            let k = self.eval(key)?;
            let k = ops::dict_key(&k).map_err(|e| self.error(e.msg, key.range))?;
            dict.insert(k, self.eval(value)?.with_const(false));
        }
        Ok(Value::dict(dict))
    }

    fn interpret_variable(&self, ident: &Ident) -> Result<Value, Exception> {
        if self.env.current().is_file(&ident.name) {
            return Err(self.error(ErrorMsg::CannotReferenceFiles, ident.range));
        }
        self.env
            .get(&ident.name)
            .map(|value| value.clone().with_const(false))
            .ok_or_else(|| self.error(ErrorMsg::UnknownIdentifier, ident.range))
    }

    fn interpret_unary(&mut self, op: UnaryOp, expr: &Node) -> Result<Value, Exception> {
        let value = self.eval(expr)?;
        match op {
            UnaryOp::Plus => Ok(value),
            UnaryOp::Minus => ops::negate(&value).map_err(|e| self.error(e.msg, expr.range)),
        }
    }

    fn interpret_binary(&mut self, lhs: &Node, op: BinOp, rhs: &Node) -> Result<Value, Exception> {
        let l = self.eval(lhs)?;
        let r = self.eval(rhs)?;
        ops::binary(op, &l, &r).map_err(|e| self.op_error(e, lhs.range, rhs.range))
    }

    fn interpret_index(&mut self, container: &Node, index: &Node) -> Result<Value, Exception> {
        let c = self.eval(container)?;
        let i = self.eval(index)?;
        ops::get_at_index(&c, &i)
            .map(|value| value.with_const(false))
            .map_err(|e| self.op_error(e, container.range, index.range))
    }

    fn interpret_assignment(
        &mut self,
        target: &Target,
        value: &Node,
        is_const: bool,
    ) -> Result<Value, Exception> {
        let range = value.range;
        let value = self.eval(value)?.with_const(false);
        self.assign(target, value.clone(), is_const, range)?;
        Ok(value)
    }

    /// Store `value` through `target`. `value_range` is blamed when the
    /// value does not fit the container it is written into.
    fn assign(
        &mut self,
        target: &Target,
        value: Value,
        is_const: bool,
        value_range: TextRange,
    ) -> Result<(), Exception> {
        let ident = &target.ident;
        if target.indices.is_empty() {
            let scope = self.env.current();
            if scope.is_file(&ident.name) {
                return Err(self.error(ErrorMsg::FileAlreadyOpened, ident.range));
            }
            if scope.is_const(&ident.name) {
                return Err(self.error(ErrorMsg::ConstantVariable, ident.range));
            }
            self.env.set(&ident.name, value.with_const(is_const));
            return Ok(());
        }

        match self.env.get(&ident.name) {
            Some(root) if root.is_const => {
                return Err(self.error(ErrorMsg::ConstantVariable, ident.range))
            }
            Some(_) => {}
            None => return Err(self.error(ErrorMsg::UnknownIdentifier, ident.range)),
        }
        if is_const {
            return Err(self.error(ErrorMsg::IndexCannotBeConstant, target.range()));
        }
        let mut indices = Vec::with_capacity(target.indices.len());
        for index in &target.indices {
            indices.push((self.eval(index)?, index.range));
        }

        let written = match self.env.binding_mut(&ident.name) {
            Some(root) => write_through(root, &indices, value),
            None => Err((OpError::new(ErrorMsg::UnknownIdentifier, Blame::Lhs), 0)),
        };
        written.map_err(|(e, depth)| {
            let range = match e.blame {
                Blame::Lhs if depth == 0 => ident.range,
                Blame::Lhs => ident.range.to(indices[depth - 1].1),
                Blame::Rhs => indices[depth].1,
                Blame::Value => value_range,
                Blame::Both => target.range(),
            };
            self.error(e.msg, range)
        })
    }

    fn interpret_call(
        &mut self,
        func: &Node,
        args: &[Node],
        parens: TextRange,
    ) -> Result<Value, Exception> {
        let callee = self.eval(func)?;
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(Arg {
                value: self.eval(arg)?,
                range: arg.range,
            });
        }
        let callable: &dyn Callable = match &callee.data {
            Data::Func(f) => f,
            Data::NativeFunc(f) => f,
            _ => {
                return Err(self.error(
                    ErrorMsg::IllegalOperation(callee.type_name(), None),
                    parens,
                ))
            }
        };
        callable
            .arity()
            .check(values.len())
            .map_err(|msg| self.error(msg, parens))?;
        callable.call(self, values, parens)
    }

    /// Run a user function in a fresh frame named after it.
    pub(crate) fn call_func(
        &mut self,
        func: &Func,
        args: Vec<Arg>,
        parens: TextRange,
    ) -> Result<Value, Exception> {
        debug!("Call {func}");
        let caller = Frame {
            scope: self.env.current().name.clone(),
            line: parens.start.line,
        };
        let traced = self.trace.last() != Some(&caller);
        if traced {
            self.trace.push(caller);
        }

        let mut scope = Scope::new(&func.name);
        for (param, arg) in func.decl.params.iter().zip(args) {
            scope.set(&param.name, arg.value.with_const(false));
        }
        self.env.push_frame(scope);
        let result = self.interpret_body(&func.decl.body);
        self.env.pop_frame();
        if traced {
            self.trace.pop();
        }

        match result {
            Ok(_) => Ok(Value::NULL),
            Err(Exception::Return(value, _)) => Ok(value),
            Err(e) => Err(e),
        }
    }

    fn interpret_body(&mut self, body: &[Node]) -> Result<Value, Exception> {
        let mut value = Value::NULL;
        for node in body {
            value = self.eval(node)?;
        }
        Ok(value)
    }

    fn interpret_if(
        &mut self,
        condition: &Node,
        then_body: &Body,
        else_body: Option<&[Node]>,
    ) -> Result<Value, Exception> {
        if self.eval(condition)?.is_true() {
            self.interpret_body(then_body)
        } else if let Some(body) = else_body {
            self.interpret_body(body)
        } else {
            Ok(Value::NULL)
        }
    }

    /// One pass through a loop body. `None` means the loop was broken.
    fn iterate(&mut self, body: &[Node]) -> Result<Option<Value>, Exception> {
        match self.interpret_body(body) {
            Ok(value) => Ok(Some(value.with_const(false))),
            Err(Exception::Continue(_)) => Ok(Some(Value::NULL)),
            Err(Exception::Break(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn number(&mut self, node: &Node) -> Result<f64, Exception> {
        match self.eval(node)?.data {
            Data::Number(n) => Ok(n),
            _ => Err(self.error(ErrorMsg::Expected(types::NUMBER), node.range)),
        }
    }

    fn interpret_for(
        &mut self,
        target: &Target,
        start: &Node,
        stop: &Node,
        step: Option<&Node>,
        body: &[Node],
    ) -> Result<Value, Exception> {
        let mut counter = self.number(start)?;
        let stop = self.number(stop)?;
        let step = match step {
            Some(step) => self.number(step)?,
            None => 1.0,
        };
        self.assign(target, Value::number(counter), false, start.range)?;

        let in_range = |counter: f64| {
            if step >= 0.0 {
                counter <= stop
            } else {
                counter >= stop
            }
        };
        let mut values = vec![];
        while in_range(counter) {
            match self.iterate(body)? {
                Some(value) => values.push(value),
                None => break,
            }
            counter += step;
            self.assign(target, Value::number(counter), false, start.range)?;
        }
        Ok(Value::array(values))
    }

    fn interpret_while(&mut self, condition: &Node, body: &[Node]) -> Result<Value, Exception> {
        let mut values = vec![];
        while self.eval(condition)?.is_true() {
            if values.len() == self.settings.max_loop_iterations {
                return Err(self.error(ErrorMsg::InfiniteLoop, condition.range));
            }
            match self.iterate(body)? {
                Some(value) => values.push(value),
                None => break,
            }
        }
        Ok(Value::array(values))
    }

    fn interpret_do(&mut self, body: &[Node], condition: &Node) -> Result<Value, Exception> {
        let mut values = vec![];
        loop {
            if values.len() == self.settings.max_loop_iterations {
                return Err(self.error(ErrorMsg::InfiniteLoop, condition.range));
            }
            match self.iterate(body)? {
                Some(value) => values.push(value),
                None => break,
            }
            if self.eval(condition)?.is_true() {
                break;
            }
        }
        Ok(Value::array(values))
    }

    fn interpret_try(&mut self, body: &[Node], catch: Option<&[Node]>) -> Result<Value, Exception> {
        match (self.interpret_body(body), catch) {
            (Err(Exception::Exit(code)), _) => Err(Exception::Exit(code)),
            (Err(e), Some(catch)) => {
                debug!("Caught {e}");
                self.interpret_body(catch)
            }
            (result, _) => result,
        }
    }

    fn interpret_function(&mut self, decl: &Rc<FunctionDecl>) -> Result<Value, Exception> {
        let name = decl
            .name
            .as_ref()
            .map_or(ANONYMOUS, |ident| ident.name.as_str());
        let func = Value::from(Data::Func(Func {
            name: name.to_string(),
            decl: Rc::clone(decl),
        }));
        if let Some(ident) = &decl.name {
            let scope = self.env.current();
            if scope.is_file(&ident.name) {
                return Err(self.error(ErrorMsg::FileAlreadyOpened, ident.range));
            }
            if scope.is_const(&ident.name) {
                return Err(self.error(ErrorMsg::ConstantVariable, ident.range));
            }
            self.env.set(&ident.name, func.clone().with_const(true));
        }
        Ok(func)
    }

    fn interpret_print(&mut self, args: &[Node], target: Option<&Ident>) -> Result<Value, Exception> {
        let mut last = Value::NULL;
        for arg in args {
            let value = self.eval(arg)?;
            self.emit(target, &value.to_bytes(), arg.range)?;
            last = value;
        }
        Ok(last)
    }

    /// Write to the console, or to the output file named by `target` in
    /// the current scope or the global scope.
    fn emit(&mut self, target: Option<&Ident>, bytes: &[u8], range: TextRange) -> Result<(), Exception> {
        let written = match target {
            None => self.console.write(bytes),
            Some(ident) => {
                if !self.env.is_output(&ident.name) {
                    let msg = if self.env.is_input(&ident.name) {
                        ErrorMsg::FileOpenedForReading
                    } else {
                        ErrorMsg::UnknownIdentifier
                    };
                    return Err(self.error(msg, ident.range));
                }
                match self.env.output_mut(&ident.name) {
                    Some(file) => file
                        .writer
                        .write_all(bytes)
                        .and_then(|()| file.writer.flush()),
                    None => Ok(()),
                }
            }
        };
        written.map_err(|e| self.error(ErrorMsg::Io(e.to_string()), range))
    }

    fn interpret_read(&mut self, targets: &[Target], source: Option<&Ident>) -> Result<Value, Exception> {
        let mut last = Value::NULL;
        for target in targets {
            let value = self.next_input(source)?;
            self.assign(target, value.clone(), false, target.range())?;
            last = value;
        }
        Ok(last)
    }

    /// Next item from the console or an input file. Lines made of
    /// numbers are split and their numbers handed out one per read.
    fn next_input(&mut self, source: Option<&Ident>) -> Result<Value, Exception> {
        let stream = match source {
            None => CONSOLE_STREAM.to_string(),
            Some(ident) => {
                if !self.env.is_input(&ident.name) {
                    let msg = if self.env.is_output(&ident.name) {
                        ErrorMsg::FileOpenedForWriting
                    } else {
                        ErrorMsg::UnknownIdentifier
                    };
                    return Err(self.error(msg, ident.range));
                }
                self.env
                    .input_mut(&ident.name)
                    .map(|file| file.path.clone())
                    .unwrap_or_default()
            }
        };

        loop {
            if let Some(n) = self.read_buffers.get_mut(&stream).and_then(|b| b.pop_front()) {
                return Ok(Value::number(n));
            }
            let line = match source {
                None => self.read_console(),
                Some(ident) => self
                    .env
                    .input_mut(&ident.name)
                    .and_then(|file| file.reader.next_line()),
            };
            let Some(line) = line else {
                return Ok(Value::NULL);
            };
            if !line.bytes().all(|c| NUMERIC_INPUT.contains(&c)) {
                return Ok(Value::str(line.into_bytes()));
            }
            let numbers = line
                .split_whitespace()
                .map_while(|word| word.parse::<f64>().ok());
            self.read_buffers
                .entry(stream.clone())
                .or_default()
                .extend(numbers);
        }
    }
}

/// Walk `indices` down from `root` and store `value` at the last one.
/// Errors carry the depth of the index that failed.
fn write_through(
    root: &mut Value,
    indices: &[(Value, TextRange)],
    value: Value,
) -> Result<(), (OpError, usize)> {
    let ((last, _), path) = indices
        .split_last()
        .expect("indexed targets always carry an index");
    let mut slot = root;
    for (depth, (index, _)) in path.iter().enumerate() {
        slot = ops::element_mut(slot, index).map_err(|e| (e, depth))?;
    }
    ops::set_at_index(slot, last, value).map_err(|e| (e, path.len()))
}
