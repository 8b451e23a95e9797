// src/config/mod.rs

//! Notebook file loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a notebook file from disk (`loader.rs`).
//! - Validate basic invariants like unique cell ids (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_from_str};
pub use model::{CellConfig, NotebookFile, NotebookSection, RawNotebookFile};
pub use validate::validate_notebook;
