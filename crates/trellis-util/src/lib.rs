//! Shared utilities for the trellis dependency resolver.
//!
//! This crate provides the cross-cutting concerns used by the other trellis
//! crates: the unified error type and Cargo-style terminal status lines.

pub mod errors;
pub mod progress;
