// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! [`CellflowError`] covers failures of the crate's own API (bad config,
//! unknown cells). Failures *inside* a cell are never errors of this kind:
//! they are carried as data in a [`CellError`] and stored on the cell.

use serde::Serialize;
use thiserror::Error;

use crate::types::CellId;

#[derive(Error, Debug)]
pub enum CellflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cell not found: {0}")]
    CellNotFound(CellId),

    #[error("Duplicate cell id: {0}")]
    DuplicateCell(CellId),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, CellflowError>;

/// Category of a cell-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellErrorKind {
    /// Source could not be parsed.
    Parse,
    /// Execution raised an error.
    Runtime,
    /// The external data source was unreachable, misconfigured or rejected
    /// the query.
    DataSource,
    /// The cell participates in a dependency cycle.
    Cycle,
}

/// A cell-level failure, stored on the cell and broadcast as `error-set`.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{kind:?}: {message}")]
pub struct CellError {
    pub kind: CellErrorKind,
    pub message: String,
}

impl CellError {
    pub fn new(kind: CellErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(CellErrorKind::Parse, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(CellErrorKind::Runtime, message)
    }

    pub fn data_source(message: impl Into<String>) -> Self {
        Self::new(CellErrorKind::DataSource, message)
    }

    pub fn cycle(message: impl Into<String>) -> Self {
        Self::new(CellErrorKind::Cycle, message)
    }
}
