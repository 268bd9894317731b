// src/api/mod.rs

//! Public facade. `Quiver` bundles a session with an executor and is the
//! entry point embedders use; everything underneath stays reachable through
//! `core` for callers that need the lower layers.

use crate::core::common::QuiverError;
use crate::core::config::Config;
use crate::core::query::executor::{QueryExecutor, ResultSet};
use crate::core::query::statements::Statement;
use crate::core::session::DatabaseSession;
use crate::core::storage::RecordStore;
use std::path::Path;
use std::sync::Arc;

/// An embedded database instance: one shared session plus the statement
/// executor driving it. Cloning is cheap and shares the underlying session.
#[derive(Debug, Clone)]
pub struct Quiver {
    session: Arc<DatabaseSession>,
    executor: QueryExecutor,
}

impl Quiver {
    /// Fresh in-memory instance with default configuration.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_config(Config::default())
    }

    #[must_use]
    pub fn with_config(config: Config) -> Self {
        let session = Arc::new(DatabaseSession::new(config));
        let executor = QueryExecutor::new(Arc::clone(&session));
        Self { session, executor }
    }

    /// Instance over an embedder-supplied storage engine.
    #[must_use]
    pub fn with_store(config: Config, store: Box<dyn RecordStore>) -> Self {
        let session = Arc::new(DatabaseSession::with_store(config, store));
        let executor = QueryExecutor::new(Arc::clone(&session));
        Self { session, executor }
    }

    /// Opens an instance configured from a TOML file.
    pub fn open<P: AsRef<Path>>(config_path: P) -> Result<Self, QuiverError> {
        Ok(Self::with_config(Config::load_from_file(config_path)?))
    }

    pub fn execute(&self, statement: &Statement) -> Result<ResultSet, QuiverError> {
        self.executor.execute(statement)
    }

    pub fn execute_script(&self, script: &[Statement]) -> Result<ResultSet, QuiverError> {
        self.executor.execute_script(script)
    }

    #[must_use]
    pub fn session(&self) -> &Arc<DatabaseSession> {
        &self.session
    }
}
