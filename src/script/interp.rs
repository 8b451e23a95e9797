// src/script/interp.rs

//! Tree-walking interpreter.
//!
//! Module-level bindings go straight to the [`Globals`] implementation, so
//! a program that fails half-way leaves its earlier writes visible.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use super::ScriptError;
use super::ast::{BinOp, BoolOp, CmpOp, Expr, FunctionDef, Program, Stmt, StmtKind, Target, UnaryOp};
use super::builtins::{self, Builtin, MAX_REPEAT_LEN};
use super::value::Value;

/// Maximum nesting of user-defined function calls.
pub const MAX_CALL_DEPTH: usize = 64;

/// Read/write access to module-level variables.
pub trait Globals {
    fn get(&self, name: &str) -> Option<Value>;
    fn set(&self, name: &str, value: Value);
}

/// Result of running a program.
#[derive(Debug, Clone)]
pub struct Execution {
    /// Everything written by `print`, including output produced before an
    /// error.
    pub stdout: String,
    /// Value of the trailing bare expression, if any.
    pub result: Result<Option<Value>, ScriptError>,
}

/// Run `program` against `globals`.
pub fn execute(program: &Program, globals: &dyn Globals) -> Execution {
    let mut interp = Interpreter {
        globals,
        stdout: String::new(),
        line: 1,
        depth: 0,
    };
    let result = interp.run_program(program);
    Execution {
        stdout: interp.stdout,
        result,
    }
}

enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

enum Scope {
    Module,
    Local(HashMap<String, Value>),
}

struct Interpreter<'a> {
    globals: &'a dyn Globals,
    stdout: String,
    line: usize,
    depth: usize,
}

type Eval = Result<Value, ScriptError>;

impl Interpreter<'_> {
    fn fail<T>(&self, message: impl Into<String>) -> Result<T, ScriptError> {
        Err(ScriptError::Runtime {
            line: self.line,
            message: message.into(),
        })
    }

    fn run_program(&mut self, program: &Program) -> Result<Option<Value>, ScriptError> {
        let mut scope = Scope::Module;
        let last = program.body.len().saturating_sub(1);

        for (i, stmt) in program.body.iter().enumerate() {
            self.line = stmt.line;
            if i == last {
                if let StmtKind::Expr(expr) = &stmt.kind {
                    let value = self.eval(expr, &mut scope)?;
                    return Ok(match value {
                        Value::None => None,
                        v => Some(v),
                    });
                }
            }
            match self.exec(stmt, &mut scope)? {
                Flow::Normal => {}
                Flow::Return(_) => return self.fail("'return' outside function"),
                Flow::Break => return self.fail("'break' outside loop"),
                Flow::Continue => return self.fail("'continue' not properly in loop"),
            }
        }
        Ok(None)
    }

    fn exec_block(&mut self, body: &[Stmt], scope: &mut Scope) -> Result<Flow, ScriptError> {
        for stmt in body {
            match self.exec(stmt, scope)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt, scope: &mut Scope) -> Result<Flow, ScriptError> {
        self.line = stmt.line;
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(expr, scope)?;
            }
            StmtKind::Assign { target, value } => {
                let value = self.eval(value, scope)?;
                self.assign(target, value, scope)?;
            }
            StmtKind::AugAssign { target, op, value } => {
                let current = self.lookup(target, scope)?;
                let rhs = self.eval(value, scope)?;
                let updated = self.binary(*op, current, rhs)?;
                self.bind(target, updated, scope);
            }
            StmtKind::If { branches, orelse } => {
                for (cond, body) in branches {
                    if self.eval(cond, scope)?.truthy() {
                        return self.exec_block(body, scope);
                    }
                }
                return self.exec_block(orelse, scope);
            }
            StmtKind::For { target, iter, body } => {
                let iterable = self.eval(iter, scope)?;
                for item in self.iterate(iterable)? {
                    self.assign(target, item, scope)?;
                    match self.exec_block(body, scope)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
            }
            StmtKind::With {
                context,
                binding,
                body,
            } => {
                let value = self.eval(context, scope)?;
                if let Some(name) = binding {
                    self.bind(name, value, scope);
                }
                return self.exec_block(body, scope);
            }
            StmtKind::FunctionDef(def) => {
                self.bind(&def.name, Value::Function(Arc::clone(def)), scope);
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Pass => {}
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
        }
        Ok(Flow::Normal)
    }

    fn assign(&mut self, target: &Target, value: Value, scope: &mut Scope) -> Result<(), ScriptError> {
        match target {
            Target::Name(name) => {
                self.bind(name, value, scope);
                Ok(())
            }
            Target::Tuple(names) => {
                let items = self.iterate(value)?;
                if items.len() != names.len() {
                    return self.fail(format!(
                        "cannot unpack {} values into {} names",
                        items.len(),
                        names.len()
                    ));
                }
                for (name, item) in names.iter().zip(items) {
                    self.bind(name, item, scope);
                }
                Ok(())
            }
        }
    }

    fn bind(&mut self, name: &str, value: Value, scope: &mut Scope) {
        match scope {
            Scope::Module => self.globals.set(name, value),
            Scope::Local(locals) => {
                locals.insert(name.to_string(), value);
            }
        }
    }

    fn lookup(&self, name: &str, scope: &Scope) -> Eval {
        if let Scope::Local(locals) = scope {
            if let Some(v) = locals.get(name) {
                return Ok(v.clone());
            }
        }
        if let Some(v) = self.globals.get(name) {
            return Ok(v);
        }
        if let Some(b) = builtins::lookup(name) {
            return Ok(Value::Builtin(b));
        }
        self.fail(format!("name '{name}' is not defined"))
    }

    fn iterate(&self, value: Value) -> Result<Vec<Value>, ScriptError> {
        match value {
            Value::List(items) => Ok(items),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            Value::Dict(map) => Ok(map.into_keys().map(Value::Str).collect()),
            Value::Table(table) => Ok(table
                .rows
                .iter()
                .map(|row| {
                    let record: IndexMap<String, Value> = table
                        .columns
                        .iter()
                        .cloned()
                        .zip(row.iter().cloned())
                        .collect();
                    Value::Dict(record)
                })
                .collect()),
            other => self.fail(format!("'{}' object is not iterable", other.type_name())),
        }
    }

    fn eval(&mut self, expr: &Expr, scope: &mut Scope) -> Eval {
        match expr {
            Expr::None => Ok(Value::None),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Name(name) => self.lookup(name, scope),
            Expr::List(items) | Expr::Tuple(items) => {
                let values = items
                    .iter()
                    .map(|e| self.eval(e, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::List(values))
            }
            Expr::Dict(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (k, v) in entries {
                    let key = match self.eval(k, scope)? {
                        Value::Str(s) => s,
                        other => {
                            return self.fail(format!(
                                "dict keys must be strings, not '{}'",
                                other.type_name()
                            ));
                        }
                    };
                    let value = self.eval(v, scope)?;
                    map.insert(key, value);
                }
                Ok(Value::Dict(map))
            }
            Expr::Unary { op, operand } => {
                let v = self.eval(operand, scope)?;
                match (op, v) {
                    (UnaryOp::Not, v) => Ok(Value::Bool(!v.truthy())),
                    (UnaryOp::Neg, Value::Int(i)) => match i.checked_neg() {
                        Some(n) => Ok(Value::Int(n)),
                        None => self.fail("integer overflow"),
                    },
                    (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
                    (UnaryOp::Pos, v @ (Value::Int(_) | Value::Float(_))) => Ok(v),
                    (_, v) => self.fail(format!("bad operand type for unary operator: '{}'", v.type_name())),
                }
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval(left, scope)?;
                let r = self.eval(right, scope)?;
                self.binary(*op, l, r)
            }
            Expr::Compare { op, left, right } => {
                let l = self.eval(left, scope)?;
                let r = self.eval(right, scope)?;
                self.compare(*op, &l, &r).map(Value::Bool)
            }
            Expr::Logical { op, left, right } => {
                let l = self.eval(left, scope)?;
                match (op, l.truthy()) {
                    (BoolOp::And, false) | (BoolOp::Or, true) => Ok(l),
                    _ => self.eval(right, scope),
                }
            }
            Expr::Call { func, args } => {
                let callee = self.eval(func, scope)?;
                let args = args
                    .iter()
                    .map(|a| self.eval(a, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call(callee, args)
            }
            Expr::Method {
                receiver,
                name,
                args,
            } => {
                let mut target = self.eval(receiver, scope)?;
                let args = args
                    .iter()
                    .map(|a| self.eval(a, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                let result = match builtins::call_method(&mut target, name, args) {
                    Ok(v) => v,
                    Err(message) => return self.fail(message),
                };
                // In-place mutation through a plain name is visible afterwards.
                if let Expr::Name(var) = receiver.as_ref() {
                    if builtins::is_mutating_method(name) {
                        self.bind(var, target, scope);
                    }
                }
                Ok(result)
            }
            Expr::Index { value, index } => {
                let container = self.eval(value, scope)?;
                let index = self.eval(index, scope)?;
                self.index(container, index)
            }
        }
    }

    fn call(&mut self, callee: Value, args: Vec<Value>) -> Eval {
        match callee {
            Value::Builtin(b) => self.call_builtin(b, args),
            Value::Function(def) => self.call_function(&def, args),
            other => self.fail(format!("'{}' object is not callable", other.type_name())),
        }
    }

    fn call_builtin(&mut self, b: Builtin, args: Vec<Value>) -> Eval {
        match b.call(args, &mut self.stdout) {
            Ok(v) => Ok(v),
            Err(message) => self.fail(message),
        }
    }

    fn call_function(&mut self, def: &FunctionDef, args: Vec<Value>) -> Eval {
        if args.len() != def.params.len() {
            return self.fail(format!(
                "{}() takes {} positional argument(s) but {} were given",
                def.name,
                def.params.len(),
                args.len()
            ));
        }
        if self.depth >= MAX_CALL_DEPTH {
            return self.fail("maximum recursion depth exceeded");
        }

        let locals: HashMap<String, Value> = def.params.iter().cloned().zip(args).collect();
        let mut scope = Scope::Local(locals);
        let caller_line = self.line;

        self.depth += 1;
        let flow = self.exec_block(&def.body, &mut scope);
        self.depth -= 1;

        let value = match flow? {
            Flow::Return(v) => v,
            Flow::Normal => Value::None,
            Flow::Break => return self.fail("'break' outside loop"),
            Flow::Continue => return self.fail("'continue' not properly in loop"),
        };
        self.line = caller_line;
        Ok(value)
    }

    fn index(&self, container: Value, index: Value) -> Eval {
        match (&container, &index) {
            (Value::List(items), Value::Int(i)) => match resolve_index(*i, items.len()) {
                Some(idx) => Ok(items[idx].clone()),
                None => self.fail("list index out of range"),
            },
            (Value::Str(s), Value::Int(i)) => {
                let chars: Vec<char> = s.chars().collect();
                match resolve_index(*i, chars.len()) {
                    Some(idx) => Ok(Value::Str(chars[idx].to_string())),
                    None => self.fail("string index out of range"),
                }
            }
            (Value::Dict(map), Value::Str(key)) => match map.get(key) {
                Some(v) => Ok(v.clone()),
                None => self.fail(format!("key '{key}' not found")),
            },
            (Value::Table(table), Value::Str(column)) => {
                match table.columns.iter().position(|c| c == column) {
                    Some(col) => Ok(Value::List(
                        table.rows.iter().map(|row| row[col].clone()).collect(),
                    )),
                    None => self.fail(format!("column '{column}' not found")),
                }
            }
            _ => self.fail(format!(
                "'{}' object cannot be indexed by '{}'",
                container.type_name(),
                index.type_name()
            )),
        }
    }

    /// Validated repeat count for `seq * n`. Negative counts give an empty
    /// sequence.
    fn repeat_count(&self, len: usize, n: i64) -> Result<usize, ScriptError> {
        let n = usize::try_from(n.max(0)).unwrap_or(usize::MAX);
        match len.checked_mul(n) {
            Some(0) => Ok(0),
            Some(total) if total <= MAX_REPEAT_LEN => Ok(n),
            _ => self.fail("repeated sequence too large"),
        }
    }

    fn binary(&self, op: BinOp, l: Value, r: Value) -> Eval {
        let unsupported = || {
            self.fail(format!(
                "unsupported operand type(s) for {}: '{}' and '{}'",
                op.symbol(),
                l.type_name(),
                r.type_name()
            ))
        };

        match (op, &l, &r) {
            (BinOp::Add, Value::Str(a), Value::Str(b)) => return Ok(Value::Str(format!("{a}{b}"))),
            (BinOp::Add, Value::List(a), Value::List(b)) => {
                return Ok(Value::List(a.iter().chain(b.iter()).cloned().collect()));
            }
            (BinOp::Mul, Value::Str(s), Value::Int(n)) | (BinOp::Mul, Value::Int(n), Value::Str(s)) => {
                let n = self.repeat_count(s.len(), *n)?;
                return Ok(Value::Str(s.repeat(n)));
            }
            (BinOp::Mul, Value::List(items), Value::Int(n)) => {
                let n = self.repeat_count(items.len(), *n)?;
                let mut out = Vec::with_capacity(items.len() * n);
                for _ in 0..n {
                    out.extend(items.iter().cloned());
                }
                return Ok(Value::List(out));
            }
            _ => {}
        }

        if let (Some(a), Some(b)) = (l.as_i64(), r.as_i64()) {
            let overflow = || self.fail("integer overflow");
            return match op {
                BinOp::Add => a.checked_add(b).map(Value::Int).map_or_else(overflow, Ok),
                BinOp::Sub => a.checked_sub(b).map(Value::Int).map_or_else(overflow, Ok),
                BinOp::Mul => a.checked_mul(b).map(Value::Int).map_or_else(overflow, Ok),
                BinOp::Div => {
                    if b == 0 {
                        return self.fail("division by zero");
                    }
                    Ok(Value::Float(a as f64 / b as f64))
                }
                BinOp::FloorDiv => {
                    if b == 0 {
                        return self.fail("integer division or modulo by zero");
                    }
                    let q = a.wrapping_div(b);
                    let q = if (a % b != 0) && ((a < 0) != (b < 0)) { q - 1 } else { q };
                    Ok(Value::Int(q))
                }
                BinOp::Mod => {
                    if b == 0 {
                        return self.fail("integer division or modulo by zero");
                    }
                    let m = a.wrapping_rem(b);
                    let m = if m != 0 && ((m < 0) != (b < 0)) { m + b } else { m };
                    Ok(Value::Int(m))
                }
                BinOp::Pow => {
                    if b < 0 {
                        Ok(Value::Float((a as f64).powf(b as f64)))
                    } else {
                        u32::try_from(b)
                            .ok()
                            .and_then(|e| a.checked_pow(e))
                            .map(Value::Int)
                            .map_or_else(overflow, Ok)
                    }
                }
            };
        }

        let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) else {
            return unsupported();
        };
        match op {
            BinOp::Add => Ok(Value::Float(a + b)),
            BinOp::Sub => Ok(Value::Float(a - b)),
            BinOp::Mul => Ok(Value::Float(a * b)),
            BinOp::Div | BinOp::FloorDiv | BinOp::Mod if b == 0.0 => self.fail("float division by zero"),
            BinOp::Div => Ok(Value::Float(a / b)),
            BinOp::FloorDiv => Ok(Value::Float((a / b).floor())),
            BinOp::Mod => Ok(Value::Float(a - b * (a / b).floor())),
            BinOp::Pow => Ok(Value::Float(a.powf(b))),
        }
    }

    fn compare(&self, op: CmpOp, l: &Value, r: &Value) -> Result<bool, ScriptError> {
        match op {
            CmpOp::Eq => Ok(l == r),
            CmpOp::NotEq => Ok(l != r),
            CmpOp::In | CmpOp::NotIn => {
                let found = match (l, r) {
                    (needle, Value::List(items)) => items.contains(needle),
                    (Value::Str(needle), Value::Str(hay)) => hay.contains(needle.as_str()),
                    (Value::Str(key), Value::Dict(map)) => map.contains_key(key),
                    _ => {
                        return self.fail(format!(
                            "argument of type '{}' is not a container for '{}'",
                            r.type_name(),
                            l.type_name()
                        ));
                    }
                };
                Ok(if op == CmpOp::In { found } else { !found })
            }
            CmpOp::Lt | CmpOp::LtE | CmpOp::Gt | CmpOp::GtE => {
                let Some(ord) = l.compare(r) else {
                    return self.fail(format!(
                        "comparison not supported between instances of '{}' and '{}'",
                        l.type_name(),
                        r.type_name()
                    ));
                };
                Ok(match op {
                    CmpOp::Lt => ord.is_lt(),
                    CmpOp::LtE => ord.is_le(),
                    CmpOp::Gt => ord.is_gt(),
                    _ => ord.is_ge(),
                })
            }
        }
    }
}

fn resolve_index(i: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let idx = if i < 0 { len + i } else { i };
    (0..len).contains(&idx).then_some(idx as usize)
}
