// src/watch/hash.rs

//! Content fingerprints used to decide which cells changed on disk.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::debug;

use crate::config::CellConfig;
use crate::types::{CellId, CellKind};

/// Hash of a cell's kind and source.
pub fn fingerprint(kind: CellKind, source: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(kind.to_string().as_bytes());
    hasher.update(&[0]);
    hasher.update(source.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Hash of a whole file, used to ignore notify events that did not change
/// the content.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file =
        File::open(path).with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Cell-level differences between two versions of a notebook file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotebookDiff {
    /// Cells that did not exist before, in file order.
    pub added: Vec<CellConfig>,
    /// Cells whose source changed, in file order.
    pub changed: Vec<CellConfig>,
    /// Cells no longer present. A cell whose kind changed is reported as
    /// removed and added.
    pub removed: Vec<CellId>,
}

impl NotebookDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }

    /// Cells that should run after the diff is applied.
    pub fn triggers(&self) -> Vec<CellId> {
        self.changed
            .iter()
            .chain(self.added.iter())
            .map(|c| c.id.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    kind: CellKind,
    hash: String,
}

/// Last seen fingerprint of every cell.
#[derive(Debug, Default)]
pub struct FingerprintStore {
    cells: HashMap<CellId, Entry>,
}

impl FingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store from the cells a notebook was loaded with.
    pub fn from_cells(cells: &[CellConfig]) -> Self {
        let mut store = Self::new();
        store.reconcile(cells);
        store
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.cells.get(id).map(|e| e.hash.as_str())
    }

    /// Compare `cells` with the stored fingerprints, record the new state
    /// and return what changed.
    pub fn reconcile(&mut self, cells: &[CellConfig]) -> NotebookDiff {
        let mut diff = NotebookDiff::default();
        let mut next: HashMap<CellId, Entry> = HashMap::with_capacity(cells.len());

        for cell in cells {
            let entry = Entry {
                kind: cell.kind,
                hash: fingerprint(cell.kind, &cell.source),
            };
            match self.cells.get(&cell.id) {
                None => diff.added.push(cell.clone()),
                Some(old) if old.kind != entry.kind => {
                    diff.removed.push(cell.id.clone());
                    diff.added.push(cell.clone());
                }
                Some(old) if old.hash != entry.hash => diff.changed.push(cell.clone()),
                Some(_) => {}
            }
            next.insert(cell.id.clone(), entry);
        }

        let mut gone: Vec<CellId> = self
            .cells
            .keys()
            .filter(|id| !next.contains_key(*id))
            .cloned()
            .collect();
        gone.sort();
        diff.removed.extend(gone);

        debug!(
            added = diff.added.len(),
            changed = diff.changed.len(),
            removed = diff.removed.len(),
            "reconciled notebook fingerprints"
        );
        self.cells = next;
        diff
    }
}
