// src/extract/mod.rs

//! Static read/write analysis of cell source.
//!
//! - [`code`] walks the syntax tree of a code cell.
//! - [`query`] scans a query cell for `{name}` placeholders.
//!
//! Extraction never fails. Source that does not parse yields empty sets;
//! the syntax error is reported when the cell executes.

pub mod code;
pub mod query;

use std::collections::BTreeSet;

use serde::Serialize;

use crate::types::CellKind;

/// Variables a cell reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Dependencies {
    pub reads: BTreeSet<String>,
    pub writes: BTreeSet<String>,
}

impl Dependencies {
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty() && self.writes.is_empty()
    }
}

/// Compute the read and write sets of `source` for a cell of `kind`.
pub fn extract(source: &str, kind: CellKind) -> Dependencies {
    match kind {
        CellKind::Code => code::extract_code(source),
        CellKind::Query => query::extract_query(source),
    }
}
