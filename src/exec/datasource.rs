// src/exec/datasource.rs

//! External data sources for query cells.

use std::path::PathBuf;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde_json::{Number, Value as Json};

use crate::errors::CellError;

/// Rows returned by a data source, already capped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Json>>,
    /// More rows were available than the cap allowed.
    pub truncated: bool,
}

/// A blocking query endpoint. Called from Tokio's blocking pool.
pub trait DataSource: Send + Sync {
    fn query(&self, sql: &str, max_rows: usize) -> Result<QueryRows, CellError>;
}

/// Resolve a connection string to a data source.
///
/// Accepted forms: `sqlite://<path>`, `sqlite::memory:` and a bare file
/// path. Anything else with a `scheme://` prefix is rejected.
pub fn connect(connection: &str) -> Result<Box<dyn DataSource>, CellError> {
    let connection = connection.trim();
    if connection.is_empty() {
        return Err(CellError::data_source("empty connection string"));
    }
    if connection == "sqlite::memory:" || connection == "sqlite://:memory:" {
        return Ok(Box::new(SqliteDataSource::memory()));
    }
    if let Some(path) = connection.strip_prefix("sqlite://") {
        return Ok(Box::new(SqliteDataSource::open(path)));
    }
    if let Some((scheme, _)) = connection.split_once("://") {
        return Err(CellError::data_source(format!(
            "unsupported data source scheme '{scheme}'"
        )));
    }
    Ok(Box::new(SqliteDataSource::open(connection)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SqliteTarget {
    Memory,
    File(PathBuf),
}

/// SQLite database opened per query.
///
/// File databases are opened read-write but never created; a missing file
/// is a data source error. `:memory:` gives every query a fresh database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteDataSource {
    target: SqliteTarget,
}

impl SqliteDataSource {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            target: SqliteTarget::File(path.into()),
        }
    }

    pub fn memory() -> Self {
        Self {
            target: SqliteTarget::Memory,
        }
    }

    fn connection(&self) -> rusqlite::Result<Connection> {
        match &self.target {
            SqliteTarget::Memory => Connection::open_in_memory(),
            SqliteTarget::File(path) => Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            ),
        }
    }
}

impl DataSource for SqliteDataSource {
    fn query(&self, sql: &str, max_rows: usize) -> Result<QueryRows, CellError> {
        let conn = self
            .connection()
            .map_err(|e| CellError::data_source(format!("cannot open database: {e}")))?;
        run_query(&conn, sql, max_rows).map_err(|e| CellError::data_source(e.to_string()))
    }
}

fn run_query(conn: &Connection, sql: &str, max_rows: usize) -> rusqlite::Result<QueryRows> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    let width = columns.len();

    let mut out = QueryRows {
        columns,
        ..QueryRows::default()
    };
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        if out.rows.len() >= max_rows {
            out.truncated = true;
            break;
        }
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(to_json(row.get_ref(i)?));
        }
        out.rows.push(values);
    }
    Ok(out)
}

fn to_json(value: ValueRef<'_>) -> Json {
    match value {
        ValueRef::Null => Json::Null,
        ValueRef::Integer(i) => Json::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map(Json::Number).unwrap_or(Json::Null),
        ValueRef::Text(bytes) => Json::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Json::String(format!("<blob {} bytes>", bytes.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CellErrorKind;
    use serde_json::json;

    #[test]
    fn memory_database_answers_queries() {
        let rows = SqliteDataSource::memory()
            .query("SELECT 1 AS one, 'a' AS letter, NULL AS nothing", 10)
            .unwrap();
        assert_eq!(rows.columns, vec!["one", "letter", "nothing"]);
        assert_eq!(rows.rows, vec![vec![json!(1), json!("a"), Json::Null]]);
        assert!(!rows.truncated);
    }

    #[test]
    fn rows_beyond_the_cap_are_dropped_and_flagged() {
        let sql = "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 5) SELECT i FROM n";
        let rows = SqliteDataSource::memory().query(sql, 3).unwrap();
        assert_eq!(rows.rows.len(), 3);
        assert!(rows.truncated);

        let rows = SqliteDataSource::memory().query(sql, 5).unwrap();
        assert_eq!(rows.rows.len(), 5);
        assert!(!rows.truncated);
    }

    #[test]
    fn bad_sql_is_a_data_source_error() {
        let err = SqliteDataSource::memory().query("SELEC nonsense", 10).unwrap_err();
        assert_eq!(err.kind, CellErrorKind::DataSource);
    }

    #[test]
    fn connection_strings() {
        assert!(connect("sqlite::memory:").is_ok());
        assert!(connect("sqlite:///tmp/x.db").is_ok());
        assert!(connect("data.db").is_ok());
        let err = connect("postgres://localhost/db").err().unwrap();
        assert_eq!(err.kind, CellErrorKind::DataSource);
        assert!(err.message.contains("postgres"));
    }

    #[test]
    fn missing_file_is_reported_on_query() {
        let dir = tempfile::tempdir().unwrap();
        let src = SqliteDataSource::open(dir.path().join("missing.db"));
        let err = src.query("SELECT 1", 10).unwrap_err();
        assert_eq!(err.kind, CellErrorKind::DataSource);
    }
}
