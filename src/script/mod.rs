// src/script/mod.rs

//! A small Python-flavoured language used by code cells.
//!
//! Supports assignments, arithmetic, `if`/`for`/`with` blocks, function
//! definitions, lists, dicts and a fixed set of builtins. Classes, imports,
//! `while` and lambdas are rejected at parse time.

pub mod ast;
pub mod builtins;
mod interp;
mod lexer;
mod parser;
pub mod value;

use thiserror::Error;

pub use ast::Program;
pub use interp::{Execution, Globals, MAX_CALL_DEPTH, execute};
pub use parser::parse;
pub use value::{Table, Value};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("syntax error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("line {line}: {message}")]
    Runtime { line: usize, message: String },
}

impl ScriptError {
    pub fn line(&self) -> usize {
        match self {
            ScriptError::Parse { line, .. } | ScriptError::Runtime { line, .. } => *line,
        }
    }
}
