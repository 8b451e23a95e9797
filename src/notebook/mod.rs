// src/notebook/mod.rs

//! Synchronous notebook state: ordered cells, their dependency graph and
//! cycle bookkeeping.
//!
//! - [`cell`] defines a cell and the snapshot handed to executors.
//! - [`namespace`] holds the per-notebook variable store.
//!
//! [`CellBook`] performs no IO and owns no locks. Edits return the events
//! they caused so the async shell in [`crate::engine`] can broadcast them.

pub mod cell;
pub mod namespace;

use std::collections::BTreeSet;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::dag::DependencyGraph;
use crate::engine::{CellEvent, EventKind};
use crate::errors::{CellError, CellErrorKind, CellflowError, Result};
use crate::types::{CellId, CellKind, CellStatus, NotebookId};

pub use cell::{Cell, CellSnapshot};
pub use namespace::{Namespace, SharedNamespace};

#[derive(Debug, Clone)]
pub struct CellBook {
    notebook: NotebookId,
    cells: IndexMap<CellId, Cell>,
    graph: DependencyGraph,
    /// Cells currently on a dependency cycle.
    cyclic: BTreeSet<CellId>,
}

impl CellBook {
    pub fn new(notebook: impl Into<NotebookId>) -> Self {
        Self {
            notebook: notebook.into(),
            cells: IndexMap::new(),
            graph: DependencyGraph::new(),
            cyclic: BTreeSet::new(),
        }
    }

    pub fn notebook(&self) -> &str {
        &self.notebook
    }

    pub fn cell(&self, id: &str) -> Option<&Cell> {
        self.cells.get(id)
    }

    pub fn cell_mut(&mut self, id: &str) -> Option<&mut Cell> {
        self.cells.get_mut(id)
    }

    /// Cells in notebook order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    pub fn cell_ids(&self) -> Vec<CellId> {
        self.cells.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn is_cyclic(&self, id: &str) -> bool {
        self.cyclic.contains(id)
    }

    pub fn add_cell(
        &mut self,
        id: impl Into<CellId>,
        kind: CellKind,
        source: impl Into<String>,
    ) -> Result<Vec<CellEvent>> {
        let id = id.into();
        if self.cells.contains_key(&id) {
            return Err(CellflowError::DuplicateCell(id));
        }
        let cell = Cell::new(id.clone(), kind, source);
        debug!(notebook = %self.notebook, cell = %id, reads = ?cell.deps.reads, writes = ?cell.deps.writes, "cell added");

        self.graph.upsert(&id, cell.deps.clone());
        self.cells.insert(id, cell);
        Ok(self.refresh_cycles())
    }

    /// Replace a cell's source, re-extract its dependencies and rebuild its
    /// edges.
    pub fn update_source(&mut self, id: &str, source: impl Into<String>) -> Result<Vec<CellEvent>> {
        let cell = self
            .cells
            .get_mut(id)
            .ok_or_else(|| CellflowError::CellNotFound(id.to_string()))?;
        cell.update_source(source);
        debug!(
            notebook = %self.notebook,
            cell = %id,
            revision = cell.revision,
            reads = ?cell.deps.reads,
            writes = ?cell.deps.writes,
            "cell source updated"
        );

        let deps = cell.deps.clone();
        self.graph.upsert(id, deps);
        Ok(self.refresh_cycles())
    }

    /// Remove a cell. Variables it wrote stay in the namespace.
    pub fn delete_cell(&mut self, id: &str) -> Result<(Cell, Vec<CellEvent>)> {
        let cell = self
            .cells
            .shift_remove(id)
            .ok_or_else(|| CellflowError::CellNotFound(id.to_string()))?;
        self.graph.remove(id);
        self.cyclic.remove(id);
        debug!(notebook = %self.notebook, cell = %id, "cell deleted");
        Ok((cell, self.refresh_cycles()))
    }

    /// Re-run cycle detection and reconcile cell states.
    ///
    /// New cycle members are forced into `error` with a cycle error. Cells
    /// that left a cycle go back to `idle` with the error cleared.
    pub fn refresh_cycles(&mut self) -> Vec<CellEvent> {
        let members: BTreeSet<CellId> = self
            .graph
            .detect_cycle()
            .map(|ids| ids.into_iter().collect())
            .unwrap_or_default();

        let mut events = Vec::new();

        let released: Vec<CellId> = self.cyclic.difference(&members).cloned().collect();
        for id in released {
            let Some(cell) = self.cells.get_mut(&id) else {
                continue;
            };
            if matches!(&cell.error, Some(e) if e.kind == CellErrorKind::Cycle) {
                cell.error = None;
            }
            if cell.status != CellStatus::Idle {
                cell.status = CellStatus::Idle;
                events.push(CellEvent::status(&self.notebook, &id, CellStatus::Idle));
            }
            debug!(notebook = %self.notebook, cell = %id, "cell left dependency cycle");
        }

        if !members.is_empty() {
            let cycles = self.graph.cycles();
            for cycle in &cycles {
                let message = format!("dependency cycle among {}", cycle.join(", "));
                warn!(notebook = %self.notebook, cells = ?cycle, "dependency cycle detected");
                for id in cycle {
                    let Some(cell) = self.cells.get_mut(id) else {
                        continue;
                    };
                    let error = CellError::cycle(message.clone());
                    if cell.status == CellStatus::Error && cell.error.as_ref() == Some(&error) {
                        continue;
                    }
                    cell.clear_run_state();
                    cell.status = CellStatus::Error;
                    cell.error = Some(error.clone());
                    events.push(CellEvent::status(&self.notebook, id, CellStatus::Error));
                    events.push(CellEvent::new(&self.notebook, id, EventKind::ErrorSet { error }));
                }
            }
        }

        self.cyclic = members;
        events
    }

    /// Ordered list of cells to run when `triggers` change.
    pub fn plan<S: AsRef<str>>(&self, triggers: &[S]) -> Result<Vec<CellId>> {
        for t in triggers {
            if !self.cells.contains_key(t.as_ref()) {
                return Err(CellflowError::CellNotFound(t.as_ref().to_string()));
            }
        }
        Ok(self.graph.topo_order(triggers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(cells: &[(&str, &str)]) -> CellBook {
        let mut b = CellBook::new("nb");
        for (id, src) in cells {
            b.add_cell(*id, CellKind::Code, *src).unwrap();
        }
        b
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut b = book(&[("a", "x = 1")]);
        let err = b.add_cell("a", CellKind::Code, "y = 2").unwrap_err();
        assert!(matches!(err, CellflowError::DuplicateCell(id) if id == "a"));
    }

    #[test]
    fn plan_rejects_unknown_triggers() {
        let b = book(&[("a", "x = 1")]);
        assert!(matches!(
            b.plan(&["nope"]),
            Err(CellflowError::CellNotFound(id)) if id == "nope"
        ));
    }

    #[test]
    fn cycle_message_lists_members_without_implying_an_order() {
        // Data flows a -> c -> b -> a, against the sorted order of the ids.
        let b = book(&[("a", "a = b"), ("b", "b = c"), ("c", "c = a")]);
        let err = b.cell("b").unwrap().error.as_ref().unwrap();
        assert_eq!(err.message, "dependency cycle among a, b, c");
        assert!(!err.message.contains("->"));
    }

    #[test]
    fn cycle_members_error_then_recover() {
        let mut b = book(&[("a", "a = c + 1"), ("b", "b = a + 1")]);
        assert!(!b.is_cyclic("a"));

        let events = b.add_cell("c", CellKind::Code, "c = b + 1").unwrap();
        for id in ["a", "b", "c"] {
            let cell = b.cell(id).unwrap();
            assert_eq!(cell.status, CellStatus::Error);
            let err = cell.error.as_ref().unwrap();
            assert_eq!(err.kind, CellErrorKind::Cycle);
            assert_eq!(err.message, "dependency cycle among a, b, c");
        }
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e.kind, EventKind::ErrorSet { .. }))
                .count(),
            3
        );

        b.update_source("c", "c = 1").unwrap();
        for id in ["a", "b", "c"] {
            let cell = b.cell(id).unwrap();
            assert_eq!(cell.status, CellStatus::Idle);
            assert!(cell.error.is_none());
        }
    }

    #[test]
    fn deleting_a_member_breaks_the_cycle() {
        let mut b = book(&[("a", "a = b"), ("b", "b = a")]);
        assert!(b.is_cyclic("a"));
        b.delete_cell("b").unwrap();
        assert!(!b.is_cyclic("a"));
        assert_eq!(b.cell("a").unwrap().status, CellStatus::Idle);
    }
}
