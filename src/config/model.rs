// src/config/model.rs

use std::path::Path;

use serde::Deserialize;

use crate::exec::{DEFAULT_MAX_ROWS, EnvironmentConfig};
use crate::types::{CellId, CellKind, NotebookId};

/// Notebook file as read from TOML, before validation.
///
/// ```toml
/// [notebook]
/// id = "sales"
/// connection = "sqlite://sales.db"
/// max_rows = 500
///
/// [[cell]]
/// id = "threshold"
/// source = "min_total = 100"
///
/// [[cell]]
/// id = "big_orders"
/// kind = "query"
/// source = "SELECT * FROM orders WHERE total > {min_total}"
/// ```
///
/// The `[notebook]` section is optional and has reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawNotebookFile {
    #[serde(default)]
    pub notebook: NotebookSection,

    /// Cells in notebook order, from `[[cell]]`.
    #[serde(default, rename = "cell")]
    pub cells: Vec<CellConfig>,
}

/// `[notebook]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NotebookSection {
    #[serde(default = "default_notebook_id")]
    pub id: NotebookId,

    /// Data source for query cells: `sqlite://<path>`, `sqlite::memory:` or
    /// a bare path. Relative paths are resolved against the notebook file.
    #[serde(default)]
    pub connection: Option<String>,

    /// Maximum rows returned by a query cell.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

impl Default for NotebookSection {
    fn default() -> Self {
        Self {
            id: default_notebook_id(),
            connection: None,
            max_rows: default_max_rows(),
        }
    }
}

fn default_notebook_id() -> NotebookId {
    "default".to_string()
}

fn default_max_rows() -> usize {
    DEFAULT_MAX_ROWS
}

/// One `[[cell]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CellConfig {
    pub id: CellId,

    #[serde(default)]
    pub kind: CellKind,

    #[serde(default)]
    pub source: String,
}

/// A validated notebook file.
///
/// Only constructed through `TryFrom<RawNotebookFile>` (see `validate.rs`),
/// so holders can rely on unique, non-empty cell ids and a usable
/// environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotebookFile {
    pub notebook: NotebookSection,
    pub cells: Vec<CellConfig>,
}

impl NotebookFile {
    pub(crate) fn new_unchecked(notebook: NotebookSection, cells: Vec<CellConfig>) -> Self {
        Self { notebook, cells }
    }

    pub fn env(&self) -> EnvironmentConfig {
        EnvironmentConfig {
            connection: self.notebook.connection.clone(),
            max_rows: self.notebook.max_rows,
        }
    }

    pub fn cell(&self, id: &str) -> Option<&CellConfig> {
        self.cells.iter().find(|c| c.id == id)
    }

    /// Make a relative SQLite path absolute with respect to `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        if let Some(conn) = self.notebook.connection.take() {
            self.notebook.connection = Some(resolve_connection(&conn, base));
        }
    }
}

fn resolve_connection(conn: &str, base: &Path) -> String {
    if conn.starts_with("sqlite::memory:") || conn == "sqlite://:memory:" {
        return conn.to_string();
    }
    let (prefix, path) = match conn.strip_prefix("sqlite://") {
        Some(rest) => ("sqlite://", rest),
        None if conn.contains("://") => return conn.to_string(),
        None => ("", conn),
    };
    if path.is_empty() || Path::new(path).is_absolute() {
        return conn.to_string();
    }
    format!("{prefix}{}", base.join(path).display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_against_base() {
        let base = Path::new("/data/nb");
        assert_eq!(resolve_connection("sqlite://x.db", base), "sqlite:///data/nb/x.db");
        assert_eq!(resolve_connection("x.db", base), "/data/nb/x.db");
        assert_eq!(resolve_connection("sqlite:///abs.db", base), "sqlite:///abs.db");
        assert_eq!(resolve_connection("sqlite::memory:", base), "sqlite::memory:");
        assert_eq!(resolve_connection("pg://host/db", base), "pg://host/db");
    }
}
