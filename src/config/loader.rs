// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{NotebookFile, RawNotebookFile};
use crate::errors::Result;

/// Load a notebook file from a given path and return the raw
/// `RawNotebookFile`.
///
/// This only performs TOML deserialization; it does **not** perform
/// semantic validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawNotebookFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    load_from_str(&contents)
}

pub fn load_from_str(contents: &str) -> Result<RawNotebookFile> {
    let raw: RawNotebookFile = toml::from_str(contents)?;
    Ok(raw)
}

/// Load a notebook file from path, validate it and resolve relative data
/// source paths against the file's directory.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<NotebookFile> {
    let path = path.as_ref();
    let raw = load_from_path(path)?;
    let mut notebook = NotebookFile::try_from(raw)?;
    notebook.resolve_relative_to(&notebook_dir(path));
    Ok(notebook)
}

/// Directory containing the notebook file, falling back to the current
/// working directory for bare file names.
pub fn notebook_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
