// src/exec/backend.rs

//! Pluggable executor abstraction.
//!
//! The scheduler talks to a [`CellExecutor`] instead of a concrete runtime.
//! This makes it easy to swap in a fake executor in tests while keeping the
//! production adapters in [`super::code`] and [`super::query`].

use std::future::Future;
use std::pin::Pin;

use indexmap::IndexMap;

use crate::errors::CellError;
use crate::notebook::{CellSnapshot, SharedNamespace};
use crate::script::Value;

use super::output::Output;

/// Default cap on rows returned by a query cell.
pub const DEFAULT_MAX_ROWS: usize = 1000;

/// Per-notebook settings executors may consult.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentConfig {
    /// Data source connection string for query cells.
    pub connection: Option<String>,
    /// Row cap for query results.
    pub max_rows: usize,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            connection: None,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

impl EnvironmentConfig {
    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = Some(connection.into());
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }
}

/// What came back from running one cell.
///
/// Failures are data: `error` is set and the other fields hold whatever was
/// produced before the failure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionResult {
    /// Current value of every variable the cell writes.
    pub bindings: IndexMap<String, Value>,
    pub stdout: String,
    pub outputs: Vec<Output>,
    pub error: Option<CellError>,
}

impl ExecutionResult {
    pub fn failed(error: CellError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub type ExecFuture<'a> = Pin<Box<dyn Future<Output = ExecutionResult> + Send + 'a>>;

/// Trait abstracting how a cell is executed.
///
/// Production code uses [`super::KindRouter`]; tests can provide their own
/// implementation that records calls and returns scripted results.
pub trait CellExecutor: Send + Sync {
    /// Run `cell` against `namespace`.
    ///
    /// Implementations may write the namespace while running; the scheduler
    /// additionally commits [`ExecutionResult::bindings`] on success.
    fn execute(
        &self,
        cell: CellSnapshot,
        namespace: SharedNamespace,
        env: EnvironmentConfig,
    ) -> ExecFuture<'_>;
}
