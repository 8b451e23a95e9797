// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical cell identifier type used throughout the crate.
pub type CellId = String;

/// Canonical notebook identifier type.
pub type NotebookId = String;

/// Closed set of cell kinds.
///
/// - `Code`: script source run against the shared namespace.
/// - `Query`: SQL text with `{name}` placeholders, sent to the notebook's
///   configured data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Code,
    Query,
}

impl Default for CellKind {
    fn default() -> Self {
        CellKind::Code
    }
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellKind::Code => f.write_str("code"),
            CellKind::Query => f.write_str("query"),
        }
    }
}

impl FromStr for CellKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "code" => Ok(CellKind::Code),
            "query" | "sql" => Ok(CellKind::Query),
            other => Err(format!(
                "invalid cell kind: {other} (expected \"code\" or \"query\")"
            )),
        }
    }
}

/// Execution status of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellStatus {
    /// Never run, or reset after an upstream recovery / cycle fix.
    Idle,
    /// Handed to the executor.
    Running,
    /// Last execution succeeded.
    Success,
    /// Last execution failed, or the cell is part of a dependency cycle.
    Error,
    /// Not run because a producer in the same batch failed.
    Blocked,
}

impl Default for CellStatus {
    fn default() -> Self {
        CellStatus::Idle
    }
}

impl fmt::Display for CellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CellStatus::Idle => "idle",
            CellStatus::Running => "running",
            CellStatus::Success => "success",
            CellStatus::Error => "error",
            CellStatus::Blocked => "blocked",
        };
        f.write_str(s)
    }
}
