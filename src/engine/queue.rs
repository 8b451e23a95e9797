// src/engine/queue.rs

use std::collections::VecDeque;

use tokio::sync::oneshot;
use tracing::debug;

use crate::types::CellId;

use super::TriggerReason;
use super::core::BatchReport;

/// One run request waiting for the notebook's execution lock.
#[derive(Debug)]
pub struct Batch {
    pub order: Vec<CellId>,
    pub reason: TriggerReason,
    /// Where to deliver the report once the batch has been drained.
    pub reply: oneshot::Sender<BatchReport>,
}

/// FIFO of batches for a single notebook.
///
/// Semantics:
/// - Every run request becomes exactly one batch; batches are never merged
///   or dropped.
/// - Whoever holds the execution lock drains the queue front to back, so a
///   request that arrives during a drain runs after everything queued
///   before it.
#[derive(Debug, Default)]
pub struct RunQueue {
    batches: VecDeque<Batch>,
}

impl RunQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, batch: Batch) {
        debug!(
            cells = batch.order.len(),
            reason = ?batch.reason,
            queued = self.batches.len(),
            "enqueue batch"
        );
        self.batches.push_back(batch);
    }

    pub fn pop(&mut self) -> Option<Batch> {
        self.batches.pop_front()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}
