// tests/blocking.rs

mod common;
use crate::common::{drain_events, init_tracing, int, status, with_timeout};

use std::error::Error;
use std::sync::Arc;

use cellflow::engine::{CellEvent, EventKind};
use cellflow::script::Value;
use cellflow::types::CellStatus;
use cellflow_test_utils::builders::NotebookBuilder;
use cellflow_test_utils::fake_executor::FakeExecutor;

type TestResult = Result<(), Box<dyn Error>>;

fn statuses_of(events: &[CellEvent], cell: &str) -> Vec<CellStatus> {
    events
        .iter()
        .filter(|e| e.cell == cell)
        .filter_map(|e| match e.kind {
            EventKind::StatusChanged { status } => Some(status),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn error_blocks_then_success_unblocks() -> TestResult {
    init_tracing();

    let fake = FakeExecutor::new();
    fake.fail("a", "boom");

    let (nb, mut rx) = NotebookBuilder::new("nb")
        .code("a", "x = 1")
        .code("b", "y = x + 1")
        .code("c", "z = y + 1")
        .code("d", "w = 1")
        .executor(Arc::new(fake.clone()))
        .build();

    let report = with_timeout(nb.run_all()).await?;
    assert_eq!(report.failed, vec!["a"]);
    assert_eq!(report.blocked, vec!["b", "c"]);
    assert_eq!(report.succeeded, vec!["d"]);
    assert_eq!(fake.executed(), vec!["a", "d"]);

    assert_eq!(status(&nb, "a"), CellStatus::Error);
    assert_eq!(status(&nb, "b"), CellStatus::Blocked);
    assert_eq!(status(&nb, "c"), CellStatus::Blocked);
    assert_eq!(status(&nb, "d"), CellStatus::Success);
    drain_events(&mut rx);

    // Fixing the producer re-runs the whole chain.
    fake.succeed("a");
    let report = with_timeout(nb.run_cells(&["a"])).await?;
    assert_eq!(report.executed, vec!["a", "b", "c"]);
    assert!(report.is_success());

    let events = drain_events(&mut rx);
    assert_eq!(
        statuses_of(&events, "b"),
        vec![CellStatus::Idle, CellStatus::Running, CellStatus::Success]
    );
    Ok(())
}

#[tokio::test]
async fn blocked_cell_outside_the_batch_keeps_its_status() -> TestResult {
    let fake = FakeExecutor::new();
    fake.fail("a", "boom");

    let (nb, _rx) = NotebookBuilder::new("nb")
        .code("a", "x = 1")
        .code("b", "y = x + 1")
        .executor(Arc::new(fake.clone()))
        .build();

    nb.run_all().await?;
    assert_eq!(status(&nb, "b"), CellStatus::Blocked);

    // `b` no longer reads `x`, so it is outside the next batch.
    nb.update_code("b", "y = 2")?;
    fake.succeed("a");
    let report = nb.run_cells(&["a"]).await?;
    assert_eq!(report.executed, vec!["a"]);
    assert_eq!(status(&nb, "b"), CellStatus::Blocked);
    Ok(())
}

#[tokio::test]
async fn failed_cells_commit_no_bindings() -> TestResult {
    let fake = FakeExecutor::new();
    fake.bind("a", "x", Value::Int(7)).fail("a", "boom");
    fake.bind("b", "y", Value::Int(1));

    let (nb, _rx) = NotebookBuilder::new("nb")
        .code("a", "x = 7")
        .code("b", "y = 1")
        .executor(Arc::new(fake.clone()))
        .build();

    nb.run_all().await?;
    assert_eq!(nb.namespace_value("x"), None);
    assert_eq!(int(&nb, "y"), Some(1));
    Ok(())
}

#[tokio::test]
async fn real_code_recovers_after_a_fix() -> TestResult {
    let (nb, _rx) = NotebookBuilder::new("nb")
        .code("load", "data = [1, 2, 3]\ntotal = sum(data) / 0")
        .code("report", "summary = total * 2")
        .build();

    let report = nb.run_all().await?;
    assert_eq!(report.failed, vec!["load"]);
    assert_eq!(report.blocked, vec!["report"]);

    let report = nb
        .edit_and_run("load", "data = [1, 2, 3]\ntotal = sum(data)")
        .await?;
    assert_eq!(report.executed, vec!["load", "report"]);
    assert_eq!(int(&nb, "summary"), Some(12));
    assert_eq!(status(&nb, "report"), CellStatus::Success);
    assert!(nb.cell("load").unwrap().error.is_none());
    Ok(())
}

#[tokio::test]
async fn diamond_blocks_both_branches_and_the_join() -> TestResult {
    let fake = FakeExecutor::new();
    fake.fail("root", "boom");

    let (nb, _rx) = NotebookBuilder::new("nb")
        .code("root", "x = 1")
        .code("left", "l = x")
        .code("right", "r = x")
        .code("join", "j = l + r")
        .executor(Arc::new(fake.clone()))
        .build();

    let report = nb.run_cells(&["root"]).await?;
    assert_eq!(report.blocked, vec!["left", "right", "join"]);
    assert_eq!(fake.executed(), vec!["root"]);
    Ok(())
}
