#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]
#![warn(clippy::cast_possible_truncation)]
#![warn(clippy::cast_possible_wrap)]
#![forbid(unsafe_code)]

//! # Quiverdb: an embedded multi-model query execution core
//!
//! `quiverdb` is the query/command execution engine of an embedded
//! document+graph database. It executes parsed statements over a pull-based
//! operator pipeline:
//! - lazy, single-pass execution streams with cooperative timeout checks
//! - schema-aware scans, gates and counting steps, with parallel fan-out
//! - graph-aware deletes that never leave dangling edge references
//! - write-through transactions with undo-log rollback
//! - scripting blocks (FOREACH/WHILE/IF/LET/RETURN) sharing one context
//!
//! The SQL-dialect parser and the durable storage engine are out of scope;
//! statements arrive as `Statement` values and records live behind the
//! `RecordStore` trait (an in-memory engine is bundled).

pub mod api;
pub mod core;

// Re-export key types for easier use by library consumers
pub use crate::core::common::QuiverError;
pub use api::Quiver;

/// Core result type for the library
pub type Result<T> = std::result::Result<T, QuiverError>;
