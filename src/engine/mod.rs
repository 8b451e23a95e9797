// src/engine/mod.rs

//! Reactive scheduler.
//!
//! This module ties together:
//! - the per-batch decision logic (which cell runs next, which are blocked)
//! - the per-notebook FIFO run queue
//! - the async shell that serializes execution behind a notebook mutex and
//!   talks to the executor
//! - the multi-notebook registry
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use serde::Serialize;
use tokio::sync::mpsc;

use crate::errors::CellError;
use crate::exec::Output;
use crate::types::{CellId, CellStatus, NotebookId};

/// What happened to a cell, as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EventKind {
    StatusChanged { status: CellStatus },
    StdoutAppended { text: String },
    OutputAppended { output: Output },
    ErrorSet { error: CellError },
}

/// Event broadcast to subscribers of a notebook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellEvent {
    pub notebook: NotebookId,
    pub cell: CellId,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl CellEvent {
    pub fn new(notebook: &str, cell: &str, kind: EventKind) -> Self {
        Self {
            notebook: notebook.to_string(),
            cell: cell.to_string(),
            kind,
        }
    }

    pub fn status(notebook: &str, cell: &str, status: CellStatus) -> Self {
        Self::new(notebook, cell, EventKind::StatusChanged { status })
    }
}

/// Fire-and-forget event publisher.
///
/// Sending never blocks and never fails: when the receiving side has gone
/// away events are silently dropped.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<CellEvent>>,
}

impl EventSink {
    /// Create a sink together with the receiver subscribers read from.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CellEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that discards everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: CellEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn emit_all(&self, events: impl IntoIterator<Item = CellEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

/// Why a batch was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// Explicit run request.
    Manual,
    /// A cell's source was edited and the cell re-run.
    Edit,
    /// The notebook file changed on disk.
    FileWatch,
}

pub mod core;
pub mod queue;
pub mod runtime;
pub mod workspace;

pub use core::{Advance, BatchReport, BatchRun, Completion};
pub use queue::{Batch, RunQueue};
pub use runtime::Notebook;
pub use workspace::Workspace;
