// src/core/storage/mod.rs

//! Record persistence interface. The execution core only needs fetch/save/
//! delete by rid and per-cluster iteration; the bundled implementation is an
//! in-memory engine, with on-disk engines supplied by the embedder behind the
//! same trait.

pub mod record;

pub use record::Record;

use crate::core::common::types::{ClusterId, Rid};
use crate::core::common::QuiverError;
use std::collections::BTreeMap;

/// Storage capability consumed by leaf steps and statement executors.
pub trait RecordStore: Send + Sync {
    /// Fetches a record by rid. `Ok(None)` when the rid no longer resolves.
    fn fetch(&self, rid: Rid) -> Result<Option<Record>, QuiverError>;

    /// Inserts or overwrites a record at its rid.
    fn save(&mut self, record: Record) -> Result<(), QuiverError>;

    /// Deletes a record, returning it. `Ok(None)` when absent.
    fn delete(&mut self, rid: Rid) -> Result<Option<Record>, QuiverError>;

    /// Snapshot of the rids currently stored in one cluster, in position order.
    fn cluster_rids(&self, cluster: ClusterId) -> Vec<Rid>;

    /// Number of records in one cluster.
    fn cluster_size(&self, cluster: ClusterId) -> u64;

    /// Allocates the next free position in a cluster.
    fn next_position(&mut self, cluster: ClusterId) -> u64;
}

/// In-memory store backing the embedded engine and the test suites.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    clusters: BTreeMap<ClusterId, BTreeMap<u64, Record>>,
    next_positions: BTreeMap<ClusterId, u64>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for InMemoryStore {
    fn fetch(&self, rid: Rid) -> Result<Option<Record>, QuiverError> {
        Ok(self.clusters.get(&rid.cluster).and_then(|c| c.get(&rid.position)).cloned())
    }

    fn save(&mut self, record: Record) -> Result<(), QuiverError> {
        let rid = record.rid;
        self.clusters.entry(rid.cluster).or_default().insert(rid.position, record);
        let next = self.next_positions.entry(rid.cluster).or_insert(0);
        if rid.position >= *next {
            *next = rid.position.wrapping_add(1);
        }
        Ok(())
    }

    fn delete(&mut self, rid: Rid) -> Result<Option<Record>, QuiverError> {
        Ok(self.clusters.get_mut(&rid.cluster).and_then(|c| c.remove(&rid.position)))
    }

    fn cluster_rids(&self, cluster: ClusterId) -> Vec<Rid> {
        self.clusters
            .get(&cluster)
            .map(|c| c.keys().map(|&p| Rid::new(cluster, p)).collect())
            .unwrap_or_default()
    }

    fn cluster_size(&self, cluster: ClusterId) -> u64 {
        self.clusters.get(&cluster).map(|c| c.len() as u64).unwrap_or(0)
    }

    fn next_position(&mut self, cluster: ClusterId) -> u64 {
        let next = self.next_positions.entry(cluster).or_insert(0);
        let position = *next;
        *next = next.wrapping_add(1);
        position
    }
}
