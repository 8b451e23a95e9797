#![allow(dead_code)]

use std::sync::Arc;

use tokio::sync::mpsc;

use cellflow::config::{CellConfig, NotebookFile, NotebookSection, RawNotebookFile};
use cellflow::engine::{CellEvent, EventSink, Notebook};
use cellflow::exec::{CellExecutor, EnvironmentConfig, KindRouter};
use cellflow::types::CellKind;

/// Builder for `NotebookFile` to simplify config tests.
pub struct NotebookFileBuilder {
    raw: RawNotebookFile,
}

impl NotebookFileBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawNotebookFile {
                notebook: NotebookSection::default(),
                cells: Vec::new(),
            },
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.raw.notebook.id = id.to_string();
        self
    }

    pub fn connection(mut self, conn: &str) -> Self {
        self.raw.notebook.connection = Some(conn.to_string());
        self
    }

    pub fn max_rows(mut self, n: usize) -> Self {
        self.raw.notebook.max_rows = n;
        self
    }

    pub fn code(self, id: &str, source: &str) -> Self {
        self.cell(id, CellKind::Code, source)
    }

    pub fn query(self, id: &str, source: &str) -> Self {
        self.cell(id, CellKind::Query, source)
    }

    pub fn cell(mut self, id: &str, kind: CellKind, source: &str) -> Self {
        self.raw.cells.push(CellConfig {
            id: id.to_string(),
            kind,
            source: source.to_string(),
        });
        self
    }

    /// The unvalidated file, for validation tests.
    pub fn raw(self) -> RawNotebookFile {
        self.raw
    }

    pub fn build(self) -> NotebookFile {
        NotebookFile::try_from(self.raw).expect("Failed to build valid notebook from builder")
    }
}

impl Default for NotebookFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a live `Notebook` with its event receiver.
pub struct NotebookBuilder {
    id: String,
    env: EnvironmentConfig,
    cells: Vec<(String, CellKind, String)>,
    executor: Option<Arc<dyn CellExecutor>>,
}

impl NotebookBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            env: EnvironmentConfig::default(),
            cells: Vec::new(),
            executor: None,
        }
    }

    pub fn code(mut self, id: &str, source: &str) -> Self {
        self.cells.push((id.to_string(), CellKind::Code, source.to_string()));
        self
    }

    pub fn query(mut self, id: &str, source: &str) -> Self {
        self.cells.push((id.to_string(), CellKind::Query, source.to_string()));
        self
    }

    pub fn env(mut self, env: EnvironmentConfig) -> Self {
        self.env = env;
        self
    }

    pub fn executor(mut self, executor: Arc<dyn CellExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn build(self) -> (Notebook, mpsc::UnboundedReceiver<CellEvent>) {
        let (sink, rx) = EventSink::channel();
        let executor = self
            .executor
            .unwrap_or_else(|| Arc::new(KindRouter::new()));
        let notebook = Notebook::with_executor(self.id, self.env, sink, executor);
        for (id, kind, source) in self.cells {
            notebook
                .add_cell(id, kind, source)
                .expect("Failed to add cell from builder");
        }
        (notebook, rx)
    }
}
