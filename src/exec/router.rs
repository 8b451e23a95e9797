// src/exec/router.rs

use std::sync::Arc;

use tracing::debug;

use crate::notebook::{CellSnapshot, SharedNamespace};
use crate::types::CellKind;

use super::backend::{CellExecutor, EnvironmentConfig, ExecFuture};
use super::code::CodeExecutor;
use super::query::QueryExecutor;

/// Dispatches each cell to the adapter registered for its kind.
#[derive(Clone)]
pub struct KindRouter {
    code: Arc<dyn CellExecutor>,
    query: Arc<dyn CellExecutor>,
}

impl Default for KindRouter {
    fn default() -> Self {
        Self {
            code: Arc::new(CodeExecutor::new()),
            query: Arc::new(QueryExecutor::new()),
        }
    }
}

impl KindRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the adapter used for code cells.
    pub fn with_code(mut self, executor: Arc<dyn CellExecutor>) -> Self {
        self.code = executor;
        self
    }

    /// Replace the adapter used for query cells.
    pub fn with_query(mut self, executor: Arc<dyn CellExecutor>) -> Self {
        self.query = executor;
        self
    }

    fn adapter(&self, kind: CellKind) -> &Arc<dyn CellExecutor> {
        match kind {
            CellKind::Code => &self.code,
            CellKind::Query => &self.query,
        }
    }
}

impl CellExecutor for KindRouter {
    fn execute(
        &self,
        cell: CellSnapshot,
        namespace: SharedNamespace,
        env: EnvironmentConfig,
    ) -> ExecFuture<'_> {
        debug!(cell = %cell.id, kind = %cell.kind, "dispatching cell");
        self.adapter(cell.kind).execute(cell, namespace, env)
    }
}
