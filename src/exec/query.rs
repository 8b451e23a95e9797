// src/exec/query.rs

//! Query cell adapter.
//!
//! `{name}` placeholders are replaced by the plain string form of the
//! namespace value. The substitution is textual: strings are inserted
//! unquoted and nothing is escaped, so the query author controls quoting.

use std::sync::Arc;

use tracing::{debug, error};

use crate::errors::CellError;
use crate::extract::query::PLACEHOLDER;
use crate::notebook::{CellSnapshot, SharedNamespace};

use super::backend::{CellExecutor, EnvironmentConfig, ExecFuture, ExecutionResult};
use super::datasource::{DataSource, QueryRows, connect};
use super::output::Output;

/// Runs query cells against the notebook's data source.
#[derive(Clone, Default)]
pub struct QueryExecutor {
    /// Fixed data source. When unset the notebook's connection string is
    /// resolved for every query.
    source: Option<Arc<dyn DataSource>>,
}

impl QueryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(source: Arc<dyn DataSource>) -> Self {
        Self {
            source: Some(source),
        }
    }

    fn run_blocking(&self, sql: String, env: &EnvironmentConfig) -> Result<QueryRows, CellError> {
        let max_rows = env.max_rows;
        match &self.source {
            Some(source) => source.query(&sql, max_rows),
            None => {
                let Some(connection) = env.connection.as_deref() else {
                    return Err(CellError::data_source(
                        "no data source configured for query cells",
                    ));
                };
                connect(connection)?.query(&sql, max_rows)
            }
        }
    }
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("fixed_source", &self.source.is_some())
            .finish()
    }
}

impl CellExecutor for QueryExecutor {
    fn execute(
        &self,
        cell: CellSnapshot,
        namespace: SharedNamespace,
        env: EnvironmentConfig,
    ) -> ExecFuture<'_> {
        let this = self.clone();
        Box::pin(async move {
            let sql = match substitute(&cell.source, &namespace) {
                Ok(sql) => sql,
                Err(e) => return ExecutionResult::failed(e),
            };
            debug!(cell = %cell.id, sql = %sql, "running query");

            let joined = tokio::task::spawn_blocking(move || this.run_blocking(sql, &env)).await;
            let rows = match joined {
                Ok(Ok(rows)) => rows,
                Ok(Err(e)) => return ExecutionResult::failed(e),
                Err(e) => {
                    error!(cell = %cell.id, error = %e, "query task failed");
                    return ExecutionResult::failed(CellError::runtime(format!(
                        "execution task failed: {e}"
                    )));
                }
            };

            ExecutionResult {
                outputs: vec![Output::Table {
                    columns: rows.columns,
                    rows: rows.rows,
                    truncated: rows.truncated,
                }],
                ..ExecutionResult::default()
            }
        })
    }
}

/// Replace every `{name}` with the `str()` form of its namespace value.
pub fn substitute(query: &str, namespace: &SharedNamespace) -> Result<String, CellError> {
    let mut out = String::with_capacity(query.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(query) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = namespace.get(name.as_str()).ok_or_else(|| {
            CellError::runtime(format!("name '{}' is not defined", name.as_str()))
        })?;
        out.push_str(&query[last..whole.start()]);
        out.push_str(&value.to_string());
        last = whole.end();
    }
    out.push_str(&query[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CellErrorKind;
    use crate::script::Value;
    use crate::types::CellKind;

    fn snapshot(source: &str) -> CellSnapshot {
        CellSnapshot {
            id: "q".into(),
            kind: CellKind::Query,
            source: source.into(),
            revision: 0,
        }
    }

    #[test]
    fn substitutes_plain_string_forms() {
        let ns = SharedNamespace::new();
        ns.set("user_id", Value::Int(5));
        ns.set("name", Value::Str("bob".into()));
        assert_eq!(
            substitute("SELECT * FROM users WHERE id = {user_id}", &ns).unwrap(),
            "SELECT * FROM users WHERE id = 5"
        );
        assert_eq!(
            substitute("WHERE name = {name} OR name = '{name}'", &ns).unwrap(),
            "WHERE name = bob OR name = 'bob'"
        );
    }

    #[test]
    fn unknown_placeholder_is_a_runtime_error() {
        let err = substitute("SELECT {missing}", &SharedNamespace::new()).unwrap_err();
        assert_eq!(err.kind, CellErrorKind::Runtime);
    }

    #[tokio::test]
    async fn missing_connection_is_a_data_source_error() {
        let result = QueryExecutor::new()
            .execute(snapshot("SELECT 1"), SharedNamespace::new(), EnvironmentConfig::default())
            .await;
        assert_eq!(result.error.map(|e| e.kind), Some(CellErrorKind::DataSource));
    }

    #[tokio::test]
    async fn memory_connection_returns_a_table() {
        let ns = SharedNamespace::new();
        ns.set("n", Value::Int(41));
        let env = EnvironmentConfig::default().with_connection("sqlite::memory:");
        let result = QueryExecutor::new()
            .execute(snapshot("SELECT {n} + 1 AS answer"), ns, env)
            .await;
        assert!(result.is_success());
        assert_eq!(
            result.outputs,
            vec![Output::Table {
                columns: vec!["answer".into()],
                rows: vec![vec![serde_json::json!(42)]],
                truncated: false,
            }]
        );
    }
}
