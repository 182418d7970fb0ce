//! Dependency resolution engine: builds per-framework dependency graphs
//! through a pluggable provider, analyzes them for cycles, downgrades and
//! nearest-wins version conflicts, and solves flat package pools with a
//! backtracking constraint search.

pub mod analyze;
pub mod cache;
pub mod diagnostics;
pub mod graph;
pub mod provider;
pub mod solver;
pub mod walker;
