// src/notebook/cell.rs

use serde::Serialize;

use crate::errors::CellError;
use crate::exec::Output;
use crate::extract::{Dependencies, extract};
use crate::types::{CellId, CellKind, CellStatus};

/// A cell and everything the scheduler knows about its last run.
#[derive(Debug, Clone, Serialize)]
pub struct Cell {
    pub id: CellId,
    pub kind: CellKind,
    pub source: String,
    pub status: CellStatus,
    /// Captured stdout of the last run.
    pub stdout: String,
    pub outputs: Vec<Output>,
    pub error: Option<CellError>,
    #[serde(flatten)]
    pub deps: Dependencies,
    /// Bumped on every source update.
    pub revision: u64,
}

impl Cell {
    pub fn new(id: impl Into<CellId>, kind: CellKind, source: impl Into<String>) -> Self {
        let source = source.into();
        let deps = extract(&source, kind);
        Self {
            id: id.into(),
            kind,
            source,
            status: CellStatus::Idle,
            stdout: String::new(),
            outputs: Vec::new(),
            error: None,
            deps,
            revision: 0,
        }
    }

    /// Replace the source and re-derive the read/write sets.
    pub fn update_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
        self.deps = extract(&self.source, self.kind);
        self.revision += 1;
    }

    /// Forget stdout, outputs and error from the previous run.
    pub fn clear_run_state(&mut self) {
        self.stdout.clear();
        self.outputs.clear();
        self.error = None;
    }

    pub fn snapshot(&self) -> CellSnapshot {
        CellSnapshot {
            id: self.id.clone(),
            kind: self.kind,
            source: self.source.clone(),
            revision: self.revision,
        }
    }
}

/// What an executor needs to run a cell, detached from the notebook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellSnapshot {
    pub id: CellId,
    pub kind: CellKind,
    pub source: String,
    pub revision: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_bumps_revision_and_dependencies() {
        let mut cell = Cell::new("b", CellKind::Code, "y = x + 5");
        assert!(cell.deps.reads.contains("x"));

        cell.update_source("y = w");
        assert_eq!(cell.revision, 1);
        assert!(cell.deps.reads.contains("w"));
        assert!(!cell.deps.reads.contains("x"));
    }

    #[test]
    fn query_cells_only_read() {
        let cell = Cell::new("q", CellKind::Query, "SELECT * FROM t WHERE id = {uid}");
        assert!(cell.deps.writes.is_empty());
        assert!(cell.deps.reads.contains("uid"));
    }
}
