//! Dependency graph construction and cycle detection.

mod graph;

pub use graph::Graph;
