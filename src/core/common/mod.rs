// src/core/common/mod.rs

pub mod error;
pub mod types;

pub use error::QuiverError;
