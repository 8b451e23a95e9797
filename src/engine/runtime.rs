// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tracing::{debug, info};

use crate::errors::{CellflowError, Result};
use crate::exec::{CellExecutor, EnvironmentConfig, KindRouter};
use crate::notebook::{Cell, CellBook, SharedNamespace};
use crate::script::Value;
use crate::types::{CellId, CellKind, NotebookId};

use super::core::{BatchReport, BatchRun};
use super::queue::{Batch, RunQueue};
use super::{EventSink, TriggerReason};

struct Inner {
    id: NotebookId,
    book: Mutex<CellBook>,
    namespace: SharedNamespace,
    queue: Mutex<RunQueue>,
    /// Held for the whole drain of the run queue.
    exec_lock: AsyncMutex<()>,
    executor: Arc<dyn CellExecutor>,
    env: EnvironmentConfig,
    events: EventSink,
}

/// A live notebook: cells, namespace, run queue and execution lock.
///
/// This is the async shell around [`CellBook`] and [`BatchRun`], which hold
/// the scheduling semantics. Handles are cheap to clone and every clone
/// refers to the same notebook.
///
/// Synchronous locks (`book`, `queue`) are only taken for short critical
/// sections and never held across an await point.
#[derive(Clone)]
pub struct Notebook {
    inner: Arc<Inner>,
}

impl fmt::Debug for Notebook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notebook")
            .field("id", &self.inner.id)
            .field("env", &self.inner.env)
            .finish_non_exhaustive()
    }
}

impl Notebook {
    /// Create an empty notebook using the default kind router.
    pub fn new(id: impl Into<NotebookId>, env: EnvironmentConfig, events: EventSink) -> Self {
        Self::with_executor(id, env, events, Arc::new(KindRouter::new()))
    }

    pub fn with_executor(
        id: impl Into<NotebookId>,
        env: EnvironmentConfig,
        events: EventSink,
        executor: Arc<dyn CellExecutor>,
    ) -> Self {
        let id = id.into();
        Self {
            inner: Arc::new(Inner {
                book: Mutex::new(CellBook::new(id.clone())),
                id,
                namespace: SharedNamespace::new(),
                queue: Mutex::new(RunQueue::new()),
                exec_lock: AsyncMutex::new(()),
                executor,
                env,
                events,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn env(&self) -> &EnvironmentConfig {
        &self.inner.env
    }

    pub fn namespace(&self) -> SharedNamespace {
        self.inner.namespace.clone()
    }

    pub fn namespace_value(&self, name: &str) -> Option<Value> {
        self.inner.namespace.get(name)
    }

    pub fn cell(&self, id: &str) -> Option<Cell> {
        self.inner.book.lock().cell(id).cloned()
    }

    /// All cells in notebook order.
    pub fn cells(&self) -> Vec<Cell> {
        self.inner.book.lock().cells().cloned().collect()
    }

    pub fn cell_ids(&self) -> Vec<CellId> {
        self.inner.book.lock().cell_ids()
    }

    /// Current `(producer, consumer)` edges.
    pub fn edges(&self) -> Vec<(CellId, CellId)> {
        self.inner.book.lock().graph().edges()
    }

    /// Order in which `triggers` and their dependents would run.
    pub fn plan<S: AsRef<str>>(&self, triggers: &[S]) -> Result<Vec<CellId>> {
        self.inner.book.lock().plan(triggers)
    }

    pub fn add_cell(
        &self,
        id: impl Into<CellId>,
        kind: CellKind,
        source: impl Into<String>,
    ) -> Result<()> {
        let events = self.inner.book.lock().add_cell(id, kind, source)?;
        self.inner.events.emit_all(events);
        Ok(())
    }

    /// Replace a cell's source without running it.
    pub fn update_code(&self, id: &str, source: impl Into<String>) -> Result<()> {
        let events = self.inner.book.lock().update_source(id, source)?;
        self.inner.events.emit_all(events);
        Ok(())
    }

    pub fn delete_cell(&self, id: &str) -> Result<Cell> {
        let (cell, events) = self.inner.book.lock().delete_cell(id)?;
        self.inner.events.emit_all(events);
        Ok(cell)
    }

    /// Update a cell's source, then run it and everything downstream.
    pub async fn edit_and_run(&self, id: &str, source: impl Into<String>) -> Result<BatchReport> {
        self.update_code(id, source)?;
        self.run_with_reason(&[id], TriggerReason::Edit).await
    }

    /// Run `triggers` and their transitive dependents.
    ///
    /// The batch is queued behind any batch already waiting on this
    /// notebook; the returned report covers this batch only.
    pub async fn run_cells<S: AsRef<str>>(&self, triggers: &[S]) -> Result<BatchReport> {
        self.run_with_reason(triggers, TriggerReason::Manual).await
    }

    /// Run every cell in notebook order (respecting dependencies).
    pub async fn run_all(&self) -> Result<BatchReport> {
        let ids = self.cell_ids();
        self.run_cells(&ids).await
    }

    pub async fn run_with_reason<S: AsRef<str>>(
        &self,
        triggers: &[S],
        reason: TriggerReason,
    ) -> Result<BatchReport> {
        let order = self.plan(triggers)?;
        debug!(notebook = %self.inner.id, ?order, ?reason, "planned batch");

        let (tx, rx) = oneshot::channel();
        self.inner.queue.lock().push(Batch {
            order,
            reason,
            reply: tx,
        });

        {
            let _guard = self.inner.exec_lock.lock().await;
            self.drain().await;
        }

        rx.await.map_err(|_| {
            CellflowError::Other(anyhow::anyhow!(
                "batch for notebook '{}' was dropped before it ran",
                self.inner.id
            ))
        })
    }

    fn next_batch(&self) -> Option<Batch> {
        self.inner.queue.lock().pop()
    }

    /// Run queued batches until the queue is empty. Caller holds the
    /// execution lock.
    async fn drain(&self) {
        while let Some(batch) = self.next_batch() {
            let report = self.run_batch(batch.order).await;
            info!(
                notebook = %self.inner.id,
                executed = report.executed.len(),
                failed = report.failed.len(),
                blocked = report.blocked.len(),
                "batch finished"
            );
            // The requester may have given up waiting.
            let _ = batch.reply.send(report);
        }
    }

    async fn run_batch(&self, order: Vec<CellId>) -> BatchReport {
        let inner = &self.inner;
        let mut run = BatchRun::new(order);

        loop {
            let step = run.advance(&mut inner.book.lock());
            inner.events.emit_all(step.events);
            let Some(cell) = step.cell else {
                break;
            };

            debug!(notebook = %inner.id, cell = %cell.id, kind = %cell.kind, "executing cell");
            let result = inner
                .executor
                .execute(cell, inner.namespace.clone(), inner.env.clone())
                .await;

            let done = run.complete(&mut inner.book.lock(), result);
            if let Some(bindings) = done.bindings {
                inner.namespace.commit(bindings);
            }
            inner.events.emit_all(done.events);
        }

        run.into_report()
    }
}
