// tests/query_cells.rs

mod common;
use crate::common::{init_tracing, status, with_timeout};

use std::error::Error;
use std::path::Path;

use rusqlite::Connection;
use serde_json::json;
use tempfile::TempDir;

use cellflow::errors::CellErrorKind;
use cellflow::exec::{EnvironmentConfig, Output};
use cellflow::types::CellStatus;
use cellflow_test_utils::builders::NotebookBuilder;

type TestResult = Result<(), Box<dyn Error>>;

fn seed_database(dir: &Path) -> Result<String, Box<dyn Error>> {
    let path = dir.join("app.db");
    let conn = Connection::open(&path)?;
    conn.execute_batch(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         INSERT INTO users (id, name) VALUES
           (1, 'ada'), (2, 'grace'), (3, 'linus'), (4, 'barbara'), (5, 'ken');",
    )?;
    Ok(format!("sqlite://{}", path.display()))
}

fn table(nb: &cellflow::engine::Notebook, id: &str) -> Option<Output> {
    nb.cell(id).and_then(|c| c.outputs.into_iter().next())
}

#[tokio::test]
async fn query_reruns_when_its_placeholder_changes() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let conn = seed_database(dir.path())?;

    let (nb, _rx) = NotebookBuilder::new("nb")
        .code("pick", "user_id = 2")
        .query("lookup", "SELECT name FROM users WHERE id = {user_id}")
        .env(EnvironmentConfig::default().with_connection(conn))
        .build();
    assert_eq!(nb.edges(), vec![("pick".to_string(), "lookup".to_string())]);

    with_timeout(nb.run_all()).await?;
    assert_eq!(
        table(&nb, "lookup"),
        Some(Output::Table {
            columns: vec!["name".into()],
            rows: vec![vec![json!("grace")]],
            truncated: false,
        })
    );

    let report = with_timeout(nb.edit_and_run("pick", "user_id = 4")).await?;
    assert_eq!(report.executed, vec!["pick", "lookup"]);
    let Some(Output::Table { rows, .. }) = table(&nb, "lookup") else {
        panic!("expected a table output");
    };
    assert_eq!(rows, vec![vec![json!("barbara")]]);
    Ok(())
}

#[tokio::test]
async fn strings_are_substituted_unquoted() -> TestResult {
    let dir = TempDir::new()?;
    let conn = seed_database(dir.path())?;

    let (nb, _rx) = NotebookBuilder::new("nb")
        .code("who", "name = 'linus'")
        .query("lookup", "SELECT id FROM users WHERE name = '{name}'")
        .env(EnvironmentConfig::default().with_connection(conn))
        .build();

    nb.run_all().await?;
    let Some(Output::Table { rows, .. }) = table(&nb, "lookup") else {
        panic!("expected a table output");
    };
    assert_eq!(rows, vec![vec![json!(3)]]);
    Ok(())
}

#[tokio::test]
async fn rows_beyond_the_cap_are_truncated() -> TestResult {
    let dir = TempDir::new()?;
    let conn = seed_database(dir.path())?;

    let (nb, _rx) = NotebookBuilder::new("nb")
        .query("all", "SELECT id, name FROM users ORDER BY id")
        .env(
            EnvironmentConfig::default()
                .with_connection(conn)
                .with_max_rows(3),
        )
        .build();

    nb.run_all().await?;
    let Some(Output::Table {
        columns,
        rows,
        truncated,
    }) = table(&nb, "all")
    else {
        panic!("expected a table output");
    };
    assert_eq!(columns, vec!["id", "name"]);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], vec![json!(1), json!("ada")]);
    assert!(truncated);
    Ok(())
}

#[tokio::test]
async fn undefined_placeholder_is_a_runtime_error() -> TestResult {
    let (nb, _rx) = NotebookBuilder::new("nb")
        .query("q", "SELECT {missing}")
        .env(EnvironmentConfig::default().with_connection("sqlite::memory:"))
        .build();

    nb.run_all().await?;
    let err = nb.cell("q").unwrap().error.unwrap();
    assert_eq!(err.kind, CellErrorKind::Runtime);
    assert!(err.message.contains("missing"));
    Ok(())
}

#[tokio::test]
async fn bad_sql_and_missing_database_are_data_source_errors() -> TestResult {
    let dir = TempDir::new()?;
    let conn = seed_database(dir.path())?;

    let (nb, _rx) = NotebookBuilder::new("nb")
        .query("q", "SELEC broken")
        .env(EnvironmentConfig::default().with_connection(conn))
        .build();
    nb.run_all().await?;
    assert_eq!(status(&nb, "q"), CellStatus::Error);
    assert_eq!(
        nb.cell("q").unwrap().error.map(|e| e.kind),
        Some(CellErrorKind::DataSource)
    );

    let missing = dir.path().join("nope.db");
    let (nb, _rx) = NotebookBuilder::new("nb")
        .query("q", "SELECT 1")
        .env(EnvironmentConfig::default().with_connection(format!("sqlite://{}", missing.display())))
        .build();
    nb.run_all().await?;
    assert_eq!(
        nb.cell("q").unwrap().error.map(|e| e.kind),
        Some(CellErrorKind::DataSource)
    );
    assert!(!missing.exists());
    Ok(())
}

#[tokio::test]
async fn failed_query_blocks_nothing_it_does_not_feed() -> TestResult {
    let (nb, _rx) = NotebookBuilder::new("nb")
        .code("a", "x = 1")
        .query("q", "SELECT {x} AS v")
        .code("b", "y = x + 1")
        .build();

    // No connection configured.
    let report = nb.run_all().await?;
    assert_eq!(report.failed, vec!["q"]);
    assert_eq!(report.succeeded, vec!["a", "b"]);
    assert_eq!(status(&nb, "b"), CellStatus::Success);
    Ok(())
}
