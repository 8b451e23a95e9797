// src/watch/mod.rs

//! Notebook file watching and change detection.
//!
//! This module is responsible for:
//! - Wiring up a cross-platform watcher (`notify`) on the notebook file.
//! - Fingerprinting cells (`blake3`) so only cells whose kind or source
//!   changed are re-run.
//!
//! It does **not** know about the dependency graph; it only turns file
//! changes into cell-level differences.

pub mod hash;
pub mod watcher;

pub use hash::{FingerprintStore, NotebookDiff, compute_file_hash, fingerprint};
pub use watcher::{WatcherHandle, spawn_watcher};
