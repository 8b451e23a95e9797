// src/exec/mod.rs

//! Cell execution layer.
//!
//! - [`backend`] provides the `CellExecutor` trait the scheduler talks to,
//!   plus the result and environment types that cross that boundary.
//! - [`router`] dispatches cells to an adapter by kind.
//! - [`code`] runs code cells with the [`crate::script`] runtime.
//! - [`query`] substitutes placeholders and runs query cells.
//! - [`datasource`] resolves connection strings and talks to SQLite.
//! - [`output`] classifies values into rich outputs.

pub mod backend;
pub mod code;
pub mod datasource;
pub mod output;
pub mod query;
pub mod router;

pub use backend::{
    CellExecutor, DEFAULT_MAX_ROWS, EnvironmentConfig, ExecFuture, ExecutionResult,
};
pub use code::CodeExecutor;
pub use datasource::{DataSource, QueryRows, SqliteDataSource};
pub use output::{Output, classify};
pub use query::QueryExecutor;
pub use router::KindRouter;
