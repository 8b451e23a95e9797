// src/engine/workspace.rs

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::info;

use crate::errors::{CellflowError, Result};
use crate::exec::{CellExecutor, EnvironmentConfig, KindRouter};
use crate::types::NotebookId;

use super::EventSink;
use super::runtime::Notebook;

/// Registry of independent notebooks.
///
/// Notebooks share nothing but the executor and the event sink: each one
/// has its own namespace, graph, queue and execution lock, so batches on
/// different notebooks run concurrently.
#[derive(Clone)]
pub struct Workspace {
    notebooks: Arc<DashMap<NotebookId, Notebook>>,
    executor: Arc<dyn CellExecutor>,
    events: EventSink,
}

impl Workspace {
    pub fn new(events: EventSink) -> Self {
        Self::with_executor(events, Arc::new(KindRouter::new()))
    }

    pub fn with_executor(events: EventSink, executor: Arc<dyn CellExecutor>) -> Self {
        Self {
            notebooks: Arc::new(DashMap::new()),
            executor,
            events,
        }
    }

    /// Create and register a notebook. Ids must be unique.
    pub fn create(&self, id: impl Into<NotebookId>, env: EnvironmentConfig) -> Result<Notebook> {
        let id = id.into();
        match self.notebooks.entry(id.clone()) {
            Entry::Occupied(_) => Err(CellflowError::ConfigError(format!(
                "notebook '{id}' already exists"
            ))),
            Entry::Vacant(slot) => {
                let nb = Notebook::with_executor(
                    id.clone(),
                    env,
                    self.events.clone(),
                    Arc::clone(&self.executor),
                );
                slot.insert(nb.clone());
                info!(notebook = %id, "notebook created");
                Ok(nb)
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Notebook> {
        self.notebooks.get(id).map(|nb| nb.clone())
    }

    pub fn remove(&self, id: &str) -> Option<Notebook> {
        self.notebooks.remove(id).map(|(_, nb)| nb)
    }

    pub fn ids(&self) -> Vec<NotebookId> {
        let mut ids: Vec<_> = self.notebooks.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.notebooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notebooks.is_empty()
    }
}
