use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cellflow::errors::CellError;
use cellflow::exec::{CellExecutor, EnvironmentConfig, ExecFuture, ExecutionResult};
use cellflow::notebook::{CellSnapshot, SharedNamespace};
use cellflow::script::Value;

#[derive(Debug, Clone, Default)]
struct Script {
    error: Option<CellError>,
    bindings: Vec<(String, Value)>,
    stdout: String,
    delay: Option<Duration>,
}

/// A fake executor that:
/// - records which cells were "run", in order
/// - returns a scripted result per cell id (success with no bindings by
///   default)
/// - tracks how many executions overlap, so tests can assert that a
///   notebook never runs two cells at once.
#[derive(Debug, Clone, Default)]
pub struct FakeExecutor {
    scripts: Arc<Mutex<HashMap<String, Script>>>,
    executed: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self, cell: &str, f: impl FnOnce(&mut Script)) {
        let mut scripts = self.scripts.lock().unwrap();
        f(scripts.entry(cell.to_string()).or_default());
    }

    /// Make `cell` fail with a runtime error.
    pub fn fail(&self, cell: &str, message: &str) -> &Self {
        self.script(cell, |s| s.error = Some(CellError::runtime(message)));
        self
    }

    /// Make `cell` succeed again.
    pub fn succeed(&self, cell: &str) -> &Self {
        self.script(cell, |s| s.error = None);
        self
    }

    /// Return `name = value` as a binding of `cell`.
    pub fn bind(&self, cell: &str, name: &str, value: Value) -> &Self {
        self.script(cell, |s| s.bindings.push((name.to_string(), value)));
        self
    }

    pub fn stdout(&self, cell: &str, text: &str) -> &Self {
        self.script(cell, |s| s.stdout = text.to_string());
        self
    }

    /// Sleep before answering for `cell`.
    pub fn delay(&self, cell: &str, delay: Duration) -> &Self {
        self.script(cell, |s| s.delay = Some(delay));
        self
    }

    /// Cell ids in execution order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl CellExecutor for FakeExecutor {
    fn execute(
        &self,
        cell: CellSnapshot,
        _namespace: SharedNamespace,
        _env: EnvironmentConfig,
    ) -> ExecFuture<'_> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&cell.id)
            .cloned()
            .unwrap_or_default();
        let this = self.clone();

        Box::pin(async move {
            let now = this.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            this.max_in_flight.fetch_max(now, Ordering::SeqCst);
            this.executed.lock().unwrap().push(cell.id.clone());

            if let Some(d) = script.delay {
                tokio::time::sleep(d).await;
            }

            this.in_flight.fetch_sub(1, Ordering::SeqCst);
            ExecutionResult {
                bindings: script.bindings.into_iter().collect(),
                stdout: script.stdout,
                outputs: Vec::new(),
                error: script.error,
            }
        })
    }
}
