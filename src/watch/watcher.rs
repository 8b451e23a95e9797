// src/watch/watcher.rs

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Handle for the notebook file watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive for
/// as long as needed. Dropping this handle will stop file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch a single notebook file and send a unit signal on `changed_tx`
/// whenever it is created, modified or replaced.
///
/// The parent directory is watched non-recursively so editors that save by
/// renaming a temporary file over the original are still noticed. Signals
/// are coalesced by the receiver; content comparison happens there.
pub fn spawn_watcher(
    notebook_path: impl AsRef<Path>,
    changed_tx: mpsc::UnboundedSender<()>,
) -> Result<WatcherHandle> {
    let path = notebook_path.as_ref();
    let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .map(OsString::from)
        .with_context(|| format!("notebook path has no file name: {:?}", path))?;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    // Called synchronously by notify whenever an event arrives.
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("cellflow: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("cellflow: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    info!("watching notebook file {:?}", path);

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if !is_relevant(&event, &file_name) {
                continue;
            }
            debug!(?event, "notebook file changed");
            if changed_tx.send(()).is_err() {
                break;
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}

fn is_relevant(event: &Event, file_name: &OsString) -> bool {
    let touches_file = event
        .paths
        .iter()
        .any(|p| p.file_name() == Some(file_name.as_os_str()));
    touches_file
        && matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind};

    #[test]
    fn only_events_for_the_notebook_file_count() {
        let name = OsString::from("nb.toml");
        let hit = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(PathBuf::from("/x/nb.toml"));
        let miss = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(PathBuf::from("/x/other.toml"));
        let create = Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from("/x/nb.toml"));
        let access = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/x/nb.toml"));

        assert!(is_relevant(&hit, &name));
        assert!(!is_relevant(&miss, &name));
        assert!(is_relevant(&create, &name));
        assert!(!is_relevant(&access, &name));
    }
}
