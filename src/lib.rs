// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod extract;
pub mod logging;
pub mod notebook;
pub mod script;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::NotebookFile;
use crate::config::loader::load_and_validate;
use crate::engine::{BatchReport, CellEvent, EventSink, Notebook, TriggerReason};
use crate::notebook::CellBook;
use crate::watch::{FingerprintStore, NotebookDiff, compute_file_hash, spawn_watcher};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - notebook file loading
/// - the notebook runtime and its executors
/// - event printing (one JSON object per line on stdout)
/// - (optional) notebook file watching with Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let path = PathBuf::from(&args.notebook);
    let file = load_and_validate(&path)?;

    if args.dry_run {
        print_dry_run(&file)?;
        return Ok(());
    }

    let (events, mut event_rx) = EventSink::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            print_event(&event);
        }
    });

    let notebook = build_notebook(&file, events)?;
    info!(notebook = %notebook.id(), cells = file.cells.len(), "notebook loaded");

    let report = if args.run.is_empty() {
        notebook.run_all().await?
    } else {
        notebook.run_cells(&args.run).await?
    };
    log_report(&report);

    if args.watch {
        let fingerprints = FingerprintStore::from_cells(&file.cells);
        watch_loop(&path, &notebook, fingerprints).await?;
    }

    // Dropping the last handle closes the event channel and ends the printer.
    drop(notebook);
    printer.await?;
    Ok(())
}

/// Create a notebook from a validated file and add its cells in order.
pub fn build_notebook(file: &NotebookFile, events: EventSink) -> crate::errors::Result<Notebook> {
    let notebook = Notebook::new(file.notebook.id.clone(), file.env(), events);
    for cell in &file.cells {
        notebook.add_cell(cell.id.clone(), cell.kind, cell.source.clone())?;
    }
    Ok(notebook)
}

/// Bring `notebook` in line with `diff` and return the cells to re-run.
pub fn apply_diff(notebook: &Notebook, diff: &NotebookDiff) -> crate::errors::Result<Vec<String>> {
    for id in &diff.removed {
        notebook.delete_cell(id)?;
    }
    for cell in &diff.added {
        notebook.add_cell(cell.id.clone(), cell.kind, cell.source.clone())?;
    }
    for cell in &diff.changed {
        notebook.update_code(&cell.id, cell.source.clone())?;
    }
    Ok(diff.triggers())
}

async fn watch_loop(path: &Path, notebook: &Notebook, mut fingerprints: FingerprintStore) -> Result<()> {
    let (changed_tx, mut changed_rx) = mpsc::unbounded_channel::<()>();
    let _watcher = spawn_watcher(path, changed_tx)?;
    let mut last_hash = compute_file_hash(path).ok();

    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                }
                info!("shutdown requested; stopping watch");
                break;
            }
            signal = changed_rx.recv() => {
                if signal.is_none() {
                    break;
                }
                // Editors often emit several events per save.
                while changed_rx.try_recv().is_ok() {}

                let hash = match compute_file_hash(path) {
                    Ok(h) => h,
                    Err(e) => {
                        debug!(error = %e, "notebook file not readable yet");
                        continue;
                    }
                };
                if last_hash.as_deref() == Some(hash.as_str()) {
                    continue;
                }
                last_hash = Some(hash);

                let file = match load_and_validate(path) {
                    Ok(f) => f,
                    Err(e) => {
                        warn!(error = %e, "notebook file is invalid; keeping previous cells");
                        continue;
                    }
                };
                if file.env() != *notebook.env() {
                    warn!("data source settings changed; restart to apply them");
                }

                let diff = fingerprints.reconcile(&file.cells);
                if diff.is_empty() {
                    continue;
                }
                let triggers = apply_diff(notebook, &diff)?;
                if triggers.is_empty() {
                    continue;
                }
                let report = notebook
                    .run_with_reason(&triggers, TriggerReason::FileWatch)
                    .await?;
                log_report(&report);
            }
        }
    }
    Ok(())
}

fn print_event(event: &CellEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!(error = %e, "failed to serialize event"),
    }
}

fn log_report(report: &BatchReport) {
    if report.is_success() {
        info!(executed = ?report.executed, "batch succeeded");
    } else {
        warn!(
            executed = ?report.executed,
            failed = ?report.failed,
            blocked = ?report.blocked,
            "batch finished with failures"
        );
    }
}

/// Simple dry-run output: cells, their read/write sets, edges and the
/// order a full run would use.
fn print_dry_run(file: &NotebookFile) -> Result<()> {
    let mut book = CellBook::new(file.notebook.id.clone());
    for cell in &file.cells {
        book.add_cell(cell.id.clone(), cell.kind, cell.source.clone())?;
    }

    println!("cellflow dry-run");
    println!("  notebook.id = {}", file.notebook.id);
    if let Some(conn) = &file.notebook.connection {
        println!("  notebook.connection = {conn}");
    }
    println!("  notebook.max_rows = {}", file.notebook.max_rows);
    println!();

    println!("cells ({}):", book.len());
    for cell in book.cells() {
        println!("  - {} [{}]", cell.id, cell.kind);
        if !cell.deps.reads.is_empty() {
            println!("      reads: {:?}", cell.deps.reads);
        }
        if !cell.deps.writes.is_empty() {
            println!("      writes: {:?}", cell.deps.writes);
        }
        if let Some(err) = &cell.error {
            println!("      error: {}", err.message);
        }
    }

    let edges = book.graph().edges();
    if !edges.is_empty() {
        println!();
        println!("edges:");
        for (producer, consumer) in edges {
            println!("  {producer} -> {consumer}");
        }
    }

    println!();
    println!("run order: {:?}", book.plan(&book.cell_ids())?);

    debug!("dry-run complete (no execution)");
    Ok(())
}
