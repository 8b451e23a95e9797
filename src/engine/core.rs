// src/engine/core.rs

//! Pure per-batch state machine.
//!
//! [`BatchRun`] walks an ordered batch of cells and decides, for each one,
//! whether it runs, is blocked by a failed producer, or is skipped. It
//! mutates the [`CellBook`] and returns the events to broadcast, but never
//! touches channels, locks or executors. The async shell
//! (`engine::runtime::Notebook`) feeds it execution results.
//!
//! The core is intended to be unit tested without any Tokio.

use std::collections::{HashSet, VecDeque};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::exec::ExecutionResult;
use crate::notebook::{CellBook, CellSnapshot};
use crate::script::Value;
use crate::types::{CellId, CellStatus};

use super::{CellEvent, EventKind};

/// Summary of one batch, returned to the caller that requested it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Cells handed to the executor, in order.
    pub executed: Vec<CellId>,
    pub succeeded: Vec<CellId>,
    /// Cells that ended in error, including cyclic cells that were not run
    /// or whose result was dropped because they joined a cycle mid-run.
    pub failed: Vec<CellId>,
    pub blocked: Vec<CellId>,
    /// Cells not executed because they are cyclic or were deleted, plus
    /// cells whose result went stale because they were edited mid-run.
    pub skipped: Vec<CellId>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.blocked.is_empty()
    }
}

/// Result of [`BatchRun::advance`].
#[derive(Debug, Clone, Default)]
pub struct Advance {
    /// Events produced while skipping or blocking cells, then the `running`
    /// transition of `cell` if there is one.
    pub events: Vec<CellEvent>,
    /// Next cell to execute; `None` once the batch is exhausted.
    pub cell: Option<CellSnapshot>,
}

/// Result of [`BatchRun::complete`].
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub events: Vec<CellEvent>,
    /// Bindings to commit to the namespace. Only set on success.
    pub bindings: Option<IndexMap<String, Value>>,
}

#[derive(Debug)]
pub struct BatchRun {
    pending: VecDeque<CellId>,
    members: HashSet<CellId>,
    /// Cells of this batch that failed or were blocked.
    broken: HashSet<CellId>,
    /// Running cell and the source revision it was started with.
    in_flight: Option<(CellId, u64)>,
    report: BatchReport,
}

impl BatchRun {
    pub fn new(order: Vec<CellId>) -> Self {
        Self {
            members: order.iter().cloned().collect(),
            pending: order.into(),
            broken: HashSet::new(),
            in_flight: None,
            report: BatchReport::default(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_none()
    }

    pub fn report(&self) -> &BatchReport {
        &self.report
    }

    pub fn into_report(self) -> BatchReport {
        self.report
    }

    /// Move to the next runnable cell.
    ///
    /// Cyclic and deleted cells are skipped. A cell with a direct producer
    /// that failed or was blocked earlier in this batch becomes `blocked`.
    /// The returned cell has already been marked `running` with its previous
    /// stdout, outputs and error cleared.
    pub fn advance(&mut self, book: &mut CellBook) -> Advance {
        let mut events = Vec::new();
        let notebook = book.notebook().to_string();

        while let Some(id) = self.pending.pop_front() {
            if book.cell(&id).is_none() {
                debug!(notebook = %notebook, cell = %id, "cell deleted before it ran; skipping");
                self.report.skipped.push(id);
                continue;
            }

            if book.is_cyclic(&id) {
                debug!(notebook = %notebook, cell = %id, "cell is on a dependency cycle; skipping");
                self.broken.insert(id.clone());
                self.report.failed.push(id.clone());
                self.report.skipped.push(id);
                continue;
            }

            let upstream_broken = book
                .graph()
                .producers_of(&id)
                .into_iter()
                .find(|p| self.members.contains(p) && self.broken.contains(p));
            if let Some(producer) = upstream_broken {
                if let Some(cell) = book.cell_mut(&id) {
                    cell.status = CellStatus::Blocked;
                }
                info!(notebook = %notebook, cell = %id, upstream = %producer, "cell blocked");
                events.push(CellEvent::status(&notebook, &id, CellStatus::Blocked));
                self.broken.insert(id.clone());
                self.report.blocked.push(id);
                continue;
            }

            let Some(cell) = book.cell_mut(&id) else {
                continue;
            };
            cell.clear_run_state();
            cell.status = CellStatus::Running;
            let snapshot = cell.snapshot();

            events.push(CellEvent::status(&notebook, &id, CellStatus::Running));
            self.report.executed.push(id.clone());
            self.in_flight = Some((id, snapshot.revision));
            return Advance {
                events,
                cell: Some(snapshot),
            };
        }

        Advance { events, cell: None }
    }

    /// Record the result of the cell returned by the last [`Self::advance`].
    ///
    /// On success the direct consumers that are currently `blocked` return to
    /// `idle`, and the bindings are handed back for the caller to commit.
    ///
    /// A result for a cell that was edited or pulled into a cycle while it
    /// ran is stale and dropped: no events besides the status reset, no
    /// bindings. The cell counts as broken for the rest of the batch.
    pub fn complete(&mut self, book: &mut CellBook, result: ExecutionResult) -> Completion {
        let Some((id, revision)) = self.in_flight.take() else {
            warn!("completion received with no cell in flight");
            return Completion::default();
        };
        let notebook = book.notebook().to_string();
        let cyclic = book.is_cyclic(&id);

        let Some(cell) = book.cell_mut(&id) else {
            debug!(notebook = %notebook, cell = %id, "cell deleted while running; dropping result");
            return Completion::default();
        };

        if cyclic {
            info!(notebook = %notebook, cell = %id, "cell joined a dependency cycle while running; dropping result");
            self.broken.insert(id.clone());
            self.report.failed.push(id);
            return Completion::default();
        }
        if cell.revision != revision {
            info!(
                notebook = %notebook,
                cell = %id,
                started = revision,
                current = cell.revision,
                "cell edited while running; dropping stale result"
            );
            let mut events = Vec::new();
            if cell.status != CellStatus::Idle {
                cell.status = CellStatus::Idle;
                events.push(CellEvent::status(&notebook, &id, CellStatus::Idle));
            }
            self.broken.insert(id.clone());
            self.report.skipped.push(id);
            return Completion {
                events,
                bindings: None,
            };
        }

        let mut events = Vec::new();
        if !result.stdout.is_empty() {
            events.push(CellEvent::new(
                &notebook,
                &id,
                EventKind::StdoutAppended {
                    text: result.stdout.clone(),
                },
            ));
        }
        for output in &result.outputs {
            events.push(CellEvent::new(
                &notebook,
                &id,
                EventKind::OutputAppended {
                    output: output.clone(),
                },
            ));
        }
        cell.stdout = result.stdout;
        cell.outputs = result.outputs;

        if let Some(error) = result.error {
            info!(notebook = %notebook, cell = %id, error = %error, "cell failed");
            cell.status = CellStatus::Error;
            cell.error = Some(error.clone());
            events.push(CellEvent::new(&notebook, &id, EventKind::ErrorSet { error }));
            events.push(CellEvent::status(&notebook, &id, CellStatus::Error));

            self.broken.insert(id.clone());
            self.report.failed.push(id);
            return Completion {
                events,
                bindings: None,
            };
        }

        cell.status = CellStatus::Success;
        cell.error = None;
        events.push(CellEvent::status(&notebook, &id, CellStatus::Success));
        debug!(notebook = %notebook, cell = %id, "cell succeeded");

        for consumer in book.graph().consumers_of(&id) {
            if let Some(c) = book.cell_mut(&consumer) {
                if c.status == CellStatus::Blocked {
                    c.status = CellStatus::Idle;
                    events.push(CellEvent::status(&notebook, &consumer, CellStatus::Idle));
                }
            }
        }

        self.report.succeeded.push(id);
        Completion {
            events,
            bindings: Some(result.bindings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CellError;
    use crate::types::CellKind;

    fn book(cells: &[(&str, &str)]) -> CellBook {
        let mut b = CellBook::new("nb");
        for (id, src) in cells {
            b.add_cell(*id, CellKind::Code, *src).unwrap();
        }
        b
    }

    fn ok() -> ExecutionResult {
        ExecutionResult::default()
    }

    fn fail() -> ExecutionResult {
        ExecutionResult::failed(CellError::runtime("boom"))
    }

    /// Drive a batch, answering each executed cell with `answer(id)`.
    fn drive(
        book: &mut CellBook,
        order: Vec<CellId>,
        answer: impl Fn(&str) -> ExecutionResult,
    ) -> (BatchReport, Vec<CellEvent>) {
        let mut run = BatchRun::new(order);
        let mut events = Vec::new();
        loop {
            let step = run.advance(book);
            events.extend(step.events);
            let Some(cell) = step.cell else {
                break;
            };
            let done = run.complete(book, answer(&cell.id));
            events.extend(done.events);
        }
        assert!(run.is_finished());
        (run.into_report(), events)
    }

    #[test]
    fn chain_runs_in_order() {
        let mut b = book(&[("a", "x = 1"), ("b", "y = x"), ("c", "z = y")]);
        let order = b.plan(&["a"]).unwrap();
        let (report, _) = drive(&mut b, order, |_| ok());
        assert_eq!(report.executed, vec!["a", "b", "c"]);
        assert_eq!(report.succeeded, vec!["a", "b", "c"]);
        assert!(report.is_success());
    }

    #[test]
    fn failure_blocks_transitive_dependents() {
        let mut b = book(&[
            ("a", "x = 1"),
            ("b", "y = x"),
            ("c", "z = y"),
            ("d", "w = 1"),
        ]);
        let mut order = b.plan(&["a"]).unwrap();
        order.push("d".into());

        let (report, events) = drive(&mut b, order, |id| if id == "a" { fail() } else { ok() });
        assert_eq!(report.executed, vec!["a", "d"]);
        assert_eq!(report.failed, vec!["a"]);
        assert_eq!(report.blocked, vec!["b", "c"]);
        assert_eq!(b.cell("c").unwrap().status, CellStatus::Blocked);
        assert!(events.iter().any(|e| e.cell == "a" && matches!(e.kind, EventKind::ErrorSet { .. })));
    }

    #[test]
    fn success_unblocks_direct_consumers() {
        let mut b = book(&[("a", "x = 1"), ("b", "y = x")]);
        let order = b.plan(&["a"]).unwrap();
        drive(&mut b, order, |id| if id == "a" { fail() } else { ok() });
        assert_eq!(b.cell("b").unwrap().status, CellStatus::Blocked);

        let (report, events) = drive(&mut b, vec!["a".into()], |_| ok());
        assert_eq!(report.succeeded, vec!["a"]);
        assert_eq!(b.cell("b").unwrap().status, CellStatus::Idle);
        assert!(events.contains(&CellEvent::status("nb", "b", CellStatus::Idle)));
    }

    #[test]
    fn cyclic_cells_are_skipped_and_block_consumers() {
        let mut b = book(&[("a", "a = b"), ("b", "b = a"), ("c", "c = a")]);
        let order = b.plan(&["a"]).unwrap();
        let (report, _) = drive(&mut b, order, |_| ok());
        assert!(report.executed.is_empty());
        assert_eq!(report.skipped, vec!["a", "b"]);
        assert_eq!(report.blocked, vec!["c"]);
        assert_eq!(b.cell("a").unwrap().status, CellStatus::Error);
    }

    #[test]
    fn running_clears_previous_results() {
        let mut b = book(&[("a", "x = 1")]);
        drive(&mut b, vec!["a".into()], |_| ExecutionResult {
            stdout: "hello\n".into(),
            ..ExecutionResult::default()
        });
        assert_eq!(b.cell("a").unwrap().stdout, "hello\n");

        drive(&mut b, vec!["a".into()], |_| fail());
        let cell = b.cell("a").unwrap();
        assert!(cell.stdout.is_empty());
        assert_eq!(cell.status, CellStatus::Error);
    }

    #[test]
    fn result_of_a_cell_edited_mid_run_is_dropped() {
        let mut b = book(&[("a", "x = 1"), ("b", "y = x")]);
        let mut run = BatchRun::new(b.plan(&["a"]).unwrap());

        let step = run.advance(&mut b);
        assert_eq!(step.cell.map(|c| c.id), Some("a".to_string()));
        b.update_source("a", "x = 2").unwrap();

        let done = run.complete(&mut b, ok());
        assert!(done.bindings.is_none());
        assert_eq!(done.events, vec![CellEvent::status("nb", "a", CellStatus::Idle)]);
        assert_eq!(b.cell("a").unwrap().status, CellStatus::Idle);

        let step = run.advance(&mut b);
        assert!(step.cell.is_none());
        let report = run.into_report();
        assert_eq!(report.skipped, vec!["a"]);
        assert_eq!(report.blocked, vec!["b"]);
    }

    #[test]
    fn cell_pulled_into_a_cycle_mid_run_stays_in_error() {
        let mut b = book(&[("a", "a = 1"), ("b", "b = a")]);
        let mut run = BatchRun::new(vec!["a".into()]);

        let step = run.advance(&mut b);
        assert!(step.cell.is_some());
        b.update_source("a", "a = b").unwrap();
        assert!(b.is_cyclic("a"));

        let done = run.complete(&mut b, ok());
        assert!(done.bindings.is_none());
        assert!(done.events.is_empty());

        let cell = b.cell("a").unwrap();
        assert_eq!(cell.status, CellStatus::Error);
        assert_eq!(cell.error.as_ref().map(|e| e.kind), Some(crate::errors::CellErrorKind::Cycle));
        assert_eq!(run.into_report().failed, vec!["a"]);
    }

    #[test]
    fn event_order_for_a_successful_cell() {
        let mut b = book(&[("a", "x = 1")]);
        let (_, events) = drive(&mut b, vec!["a".into()], |_| ExecutionResult {
            stdout: "out".into(),
            ..ExecutionResult::default()
        });
        let kinds: Vec<_> = events.into_iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::StatusChanged {
                    status: CellStatus::Running
                },
                EventKind::StdoutAppended { text: "out".into() },
                EventKind::StatusChanged {
                    status: CellStatus::Success
                },
            ]
        );
    }
}
