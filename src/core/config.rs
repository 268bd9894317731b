// src/core/config.rs

use crate::core::common::QuiverError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Tunables for the execution core.
///
/// Only knobs the execution layer actually consults live here; storage-level
/// settings belong to the embedding engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Time budget for one statement, in milliseconds. `0` disables the
    /// cooperative timeout checks performed by long-scanning steps.
    pub query_timeout_ms: u64,
    /// Batch size applied to `DELETE VERTEX/EDGE` when the statement does not
    /// carry an explicit `BATCH n` clause.
    pub default_delete_batch_size: usize,
    /// Upper bound on worker threads used by parallel fan-out steps.
    pub parallel_workers: usize,
    /// When set, every executed plan records per-step elapsed time even
    /// without an explicit `PROFILE`.
    pub profiling_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            query_timeout_ms: 0,
            default_delete_batch_size: 100,
            parallel_workers: 4,
            profiling_enabled: false,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, QuiverError> {
        let text = fs::read_to_string(path.as_ref())?;
        toml::from_str(&text).map_err(|e| {
            QuiverError::Configuration(format!(
                "failed to parse config file {}: {e}",
                path.as_ref().display()
            ))
        })
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), QuiverError> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| QuiverError::Configuration(format!("failed to serialize config: {e}")))?;
        fs::write(path.as_ref(), text)?;
        Ok(())
    }

    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for [`Config`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    query_timeout_ms: Option<u64>,
    default_delete_batch_size: Option<usize>,
    parallel_workers: Option<usize>,
    profiling_enabled: Option<bool>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn query_timeout_ms(mut self, ms: u64) -> Self {
        self.query_timeout_ms = Some(ms);
        self
    }

    #[must_use]
    pub const fn default_delete_batch_size(mut self, size: usize) -> Self {
        self.default_delete_batch_size = Some(size);
        self
    }

    #[must_use]
    pub const fn parallel_workers(mut self, workers: usize) -> Self {
        self.parallel_workers = Some(workers);
        self
    }

    #[must_use]
    pub const fn profiling_enabled(mut self, enabled: bool) -> Self {
        self.profiling_enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn build(self) -> Config {
        let defaults = Config::default();
        Config {
            query_timeout_ms: self.query_timeout_ms.unwrap_or(defaults.query_timeout_ms),
            default_delete_batch_size: self
                .default_delete_batch_size
                .unwrap_or(defaults.default_delete_batch_size),
            parallel_workers: self.parallel_workers.unwrap_or(defaults.parallel_workers),
            profiling_enabled: self.profiling_enabled.unwrap_or(defaults.profiling_enabled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn builder_overrides_defaults() {
        let config = Config::builder()
            .query_timeout_ms(250)
            .default_delete_batch_size(10)
            .build();
        assert_eq!(config.query_timeout_ms, 250);
        assert_eq!(config.default_delete_batch_size, 10);
        assert_eq!(config.parallel_workers, Config::default().parallel_workers);
    }

    #[test]
    fn toml_round_trip() {
        let file = NamedTempFile::new().expect("temp file");
        let config = Config::builder().parallel_workers(2).profiling_enabled(true).build();
        config.save_to_file(file.path()).expect("save");
        let loaded = Config::load_from_file(file.path()).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn malformed_file_reports_configuration_error() {
        let file = NamedTempFile::new().expect("temp file");
        std::fs::write(file.path(), "query_timeout_ms = \"not a number\"").expect("write");
        let err = Config::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, QuiverError::Configuration(_)));
    }
}
