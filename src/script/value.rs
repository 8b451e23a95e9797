// src/script/value.rs

//! Runtime values of the script language.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::ast::FunctionDef;
use super::builtins::Builtin;

/// A rectangular result produced by `table(...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table from a list of dicts. Columns are the union of keys in
    /// first-seen order; missing cells become `None`.
    pub fn from_records(records: &[Value]) -> Option<Self> {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            let Value::Dict(map) = record else {
                return None;
            };
            for key in map.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .filter_map(|record| match record {
                Value::Dict(map) => Some(
                    columns
                        .iter()
                        .map(|c| map.get(c).cloned().unwrap_or(Value::None))
                        .collect(),
                ),
                _ => None,
            })
            .collect();

        Some(Self { columns, rows })
    }

    /// Build a table from a dict of equally long column lists.
    pub fn from_columns(map: &IndexMap<String, Value>) -> Option<Self> {
        let mut len = None;
        for value in map.values() {
            let Value::List(items) = value else {
                return None;
            };
            match len {
                None => len = Some(items.len()),
                Some(n) if n != items.len() => return None,
                Some(_) => {}
            }
        }

        let len = len.unwrap_or(0);
        let columns: Vec<String> = map.keys().cloned().collect();
        let rows = (0..len)
            .map(|i| {
                map.values()
                    .map(|v| match v {
                        Value::List(items) => items[i].clone(),
                        _ => Value::None,
                    })
                    .collect()
            })
            .collect();

        Some(Self { columns, rows })
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Dict(IndexMap<String, Value>),
    Function(Arc<FunctionDef>),
    Builtin(Builtin),
    Table(Arc<Table>),
    Html(String),
    /// Base64 payload plus its MIME type.
    Image { mime: String, data: String },
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin_function",
            Value::Table(_) => "table",
            Value::Html(_) => "html",
            Value::Image { .. } => "image",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Dict(map) => !map.is_empty(),
            Value::Table(t) => !t.rows.is_empty(),
            Value::Html(s) => !s.is_empty(),
            Value::Function(_) | Value::Builtin(_) | Value::Image { .. } => true,
        }
    }

    /// Numeric view used by arithmetic and comparisons; bools count as ints.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// `repr()`-style rendering: strings are quoted.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            other => other.to_string(),
        }
    }

    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y)? {
                        Ordering::Equal => continue,
                        ord => return Some(ord),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => a == b,
            (Value::Html(a), Value::Html(b)) => a == b,
            (
                Value::Image { mime: m1, data: d1 },
                Value::Image { mime: m2, data: d2 },
            ) => m1 == m2 && d1 == d2,
            (Value::Int(a), Value::Int(b)) => a == b,
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

/// `str()`-style rendering. This is also what query placeholders substitute.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => {
                if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
                    write!(f, "{x:.1}")
                } else {
                    write!(f, "{x}")
                }
            }
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&item.repr())?;
                }
                f.write_str("]")
            }
            Value::Dict(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "'{k}': {}", v.repr())?;
                }
                f.write_str("}")
            }
            Value::Function(def) => write!(f, "<function {}>", def.name),
            Value::Builtin(b) => write!(f, "<built-in function {}>", b.name()),
            Value::Table(t) => write!(f, "<table {}x{}>", t.rows.len(), t.columns.len()),
            Value::Html(s) => f.write_str(s),
            Value::Image { mime, .. } => write!(f, "<image {mime}>"),
        }
    }
}
