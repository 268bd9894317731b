// src/core/mod.rs

pub mod common;
pub mod config;
pub mod index;
pub mod query;
pub mod schema;
pub mod security;
pub mod session;
pub mod storage;
pub mod transaction;
pub mod types;
