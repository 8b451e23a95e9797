#![allow(dead_code)]

use cellflow::engine::Notebook;
use cellflow::script::Value;
use cellflow::types::CellStatus;

pub use cellflow_test_utils::{drain_events, init_tracing, with_timeout};

/// Status of every cell, in notebook order.
pub fn statuses(nb: &Notebook) -> Vec<(String, CellStatus)> {
    nb.cells().into_iter().map(|c| (c.id, c.status)).collect()
}

pub fn status(nb: &Notebook, id: &str) -> CellStatus {
    nb.cell(id).expect("cell exists").status
}

pub fn int(nb: &Notebook, name: &str) -> Option<i64> {
    match nb.namespace_value(name) {
        Some(Value::Int(i)) => Some(i),
        _ => None,
    }
}
