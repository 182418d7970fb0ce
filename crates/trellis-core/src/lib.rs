//! Core data types for the trellis dependency resolver.
//!
//! This crate defines the vocabulary shared by the graph walker, the graph
//! analyzer and the constraint solver: what is wanted ([`library::LibraryRange`]),
//! what was found ([`library::LibraryIdentity`]), versions and version ranges,
//! target frameworks, flat package dependencies, and global configuration.
//!
//! This crate is intentionally free of async code and network I/O.

pub mod config;
pub mod dependency;
pub mod framework;
pub mod library;
pub mod version;
