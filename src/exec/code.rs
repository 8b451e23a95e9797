// src/exec/code.rs

//! Code cell adapter backed by the [`crate::script`] runtime.

use indexmap::IndexMap;
use tracing::{debug, error};

use crate::errors::CellError;
use crate::extract::code::extract_code;
use crate::notebook::{CellSnapshot, SharedNamespace};
use crate::script::{self, ScriptError};

use super::backend::{CellExecutor, EnvironmentConfig, ExecFuture, ExecutionResult};
use super::output::classify;

/// Runs code cells on Tokio's blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeExecutor;

impl CodeExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CellExecutor for CodeExecutor {
    fn execute(
        &self,
        cell: CellSnapshot,
        namespace: SharedNamespace,
        _env: EnvironmentConfig,
    ) -> ExecFuture<'_> {
        Box::pin(async move {
            let id = cell.id.clone();
            match tokio::task::spawn_blocking(move || run_code(&cell.source, &namespace)).await {
                Ok(result) => result,
                Err(e) => {
                    error!(cell = %id, error = %e, "code execution task failed");
                    ExecutionResult::failed(CellError::runtime(format!(
                        "execution task failed: {e}"
                    )))
                }
            }
        })
    }
}

/// Parse and run `source` synchronously.
///
/// Top-level assignments land in `namespace` as they happen, so a failure
/// part-way leaves the earlier writes in place.
pub fn run_code(source: &str, namespace: &SharedNamespace) -> ExecutionResult {
    let program = match script::parse(source) {
        Ok(p) => p,
        Err(e) => return ExecutionResult::failed(to_cell_error(e)),
    };

    let run = script::execute(&program, namespace);
    match run.result {
        Ok(value) => {
            let writes = extract_code(source).writes;
            let bindings: IndexMap<_, _> = writes
                .into_iter()
                .filter_map(|name| namespace.get(&name).map(|v| (name, v)))
                .collect();
            debug!(bindings = bindings.len(), "code cell finished");
            ExecutionResult {
                bindings,
                stdout: run.stdout,
                outputs: value.as_ref().and_then(classify).into_iter().collect(),
                error: None,
            }
        }
        Err(e) => ExecutionResult {
            stdout: run.stdout,
            error: Some(to_cell_error(e)),
            ..ExecutionResult::default()
        },
    }
}

fn to_cell_error(e: ScriptError) -> CellError {
    match e {
        ScriptError::Parse { .. } => CellError::parse(e.to_string()),
        ScriptError::Runtime { .. } => CellError::runtime(e.to_string()),
    }
}
