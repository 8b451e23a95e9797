// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{NotebookFile, RawNotebookFile};
use crate::errors::{CellflowError, Result};
use crate::types::CellKind;

impl TryFrom<RawNotebookFile> for NotebookFile {
    type Error = CellflowError;

    fn try_from(raw: RawNotebookFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_notebook(&raw)?;
        Ok(NotebookFile::new_unchecked(raw.notebook, raw.cells))
    }
}

fn validate_raw_notebook(raw: &RawNotebookFile) -> Result<()> {
    ensure_has_cells(raw)?;
    validate_notebook_section(raw)?;
    validate_cell_ids(raw)?;
    validate_query_connection(raw)?;
    Ok(())
}

fn ensure_has_cells(raw: &RawNotebookFile) -> Result<()> {
    if raw.cells.is_empty() {
        return Err(CellflowError::ConfigError(
            "notebook must contain at least one [[cell]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_notebook_section(raw: &RawNotebookFile) -> Result<()> {
    if raw.notebook.id.trim().is_empty() {
        return Err(CellflowError::ConfigError(
            "[notebook].id must not be empty".to_string(),
        ));
    }
    if raw.notebook.max_rows == 0 {
        return Err(CellflowError::ConfigError(
            "[notebook].max_rows must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_cell_ids(raw: &RawNotebookFile) -> Result<()> {
    let mut seen = HashSet::new();
    for (idx, cell) in raw.cells.iter().enumerate() {
        if cell.id.trim().is_empty() {
            return Err(CellflowError::ConfigError(format!(
                "cell #{} has an empty id",
                idx + 1
            )));
        }
        if !seen.insert(cell.id.as_str()) {
            return Err(CellflowError::DuplicateCell(cell.id.clone()));
        }
    }
    Ok(())
}

fn validate_query_connection(raw: &RawNotebookFile) -> Result<()> {
    let has_connection = raw
        .notebook
        .connection
        .as_deref()
        .is_some_and(|c| !c.trim().is_empty());
    if has_connection {
        return Ok(());
    }
    if let Some(cell) = raw.cells.iter().find(|c| c.kind == CellKind::Query) {
        return Err(CellflowError::ConfigError(format!(
            "query cell '{}' requires [notebook].connection",
            cell.id
        )));
    }
    Ok(())
}

/// Validate an already-parsed notebook file.
pub fn validate_notebook(raw: RawNotebookFile) -> Result<NotebookFile> {
    NotebookFile::try_from(raw)
}
