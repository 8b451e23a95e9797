// src/dag/mod.rs

//! Dependency graph between the cells of a notebook.
//!
//! - [`graph`] holds the producer/consumer edges, cycle detection and the
//!   deterministic topological order used by the scheduler.

pub mod graph;

pub use graph::DependencyGraph;
