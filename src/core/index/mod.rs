// src/core/index/mod.rs

//! Property indexes over schema classes. Entries are kept in a value-ordered
//! map so counts can be taken over the whole index or by walking values in
//! either direction.

use crate::core::common::types::Rid;
use crate::core::common::QuiverError;
use crate::core::schema::Schema;
use crate::core::storage::RecordStore;
use crate::core::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub class_name: String,
    pub property: String,
    pub unique: bool,
}

/// How `CountFromIndexStep` walks an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexCountKind {
    /// Count every key/rid entry without ordering.
    Entries,
    /// Walk values in ascending key order.
    ValuesAsc,
    /// Walk values in descending key order.
    ValuesDesc,
}

#[derive(Debug)]
pub struct Index {
    pub definition: IndexDefinition,
    entries: BTreeMap<Value, Vec<Rid>>,
}

impl Index {
    fn new(definition: IndexDefinition) -> Self {
        Self { definition, entries: BTreeMap::new() }
    }

    pub fn put(&mut self, key: Value, rid: Rid) -> Result<(), QuiverError> {
        let bucket = self.entries.entry(key).or_default();
        if self.definition.unique && !bucket.is_empty() && !bucket.contains(&rid) {
            return Err(QuiverError::Index(format!(
                "duplicate key on unique index '{}'",
                self.definition.name
            )));
        }
        if !bucket.contains(&rid) {
            bucket.push(rid);
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &Value, rid: Rid) {
        if let Some(bucket) = self.entries.get_mut(key) {
            bucket.retain(|r| *r != rid);
            if bucket.is_empty() {
                self.entries.remove(key);
            }
        }
    }

    /// Rids for an exact key.
    #[must_use]
    pub fn lookup(&self, key: &Value) -> &[Rid] {
        self.entries.get(key).map_or(&[], Vec::as_slice)
    }

    /// Total key/rid entries, walked per `kind`. All three kinds agree on the
    /// total; they differ in traversal order only.
    #[must_use]
    pub fn count(&self, kind: IndexCountKind) -> u64 {
        match kind {
            IndexCountKind::Entries => self.entries.values().map(|b| b.len() as u64).sum(),
            IndexCountKind::ValuesAsc => {
                self.entries.iter().map(|(_, b)| b.len() as u64).sum()
            }
            IndexCountKind::ValuesDesc => {
                self.entries.iter().rev().map(|(_, b)| b.len() as u64).sum()
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug, Default)]
pub struct IndexManager {
    indexes: HashMap<String, Index>,
}

impl IndexManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_index(&mut self, definition: IndexDefinition) -> Result<(), QuiverError> {
        if self.indexes.contains_key(&definition.name) {
            return Err(QuiverError::AlreadyExists { name: definition.name });
        }
        self.indexes.insert(definition.name.clone(), Index::new(definition));
        Ok(())
    }

    pub fn drop_index(&mut self, name: &str) -> Result<(), QuiverError> {
        self.indexes
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| QuiverError::NotFound(format!("index '{name}'")))
    }

    #[must_use]
    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.get(name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.indexes.keys().cloned().collect()
    }

    pub fn require_index(&self, name: &str) -> Result<&Index, QuiverError> {
        self.index(name).ok_or_else(|| QuiverError::NotFound(format!("index '{name}'")))
    }

    /// Rebuilds one index from scratch by scanning every cluster currently
    /// owned by the class and its subclasses. Clusters added to the class
    /// after the index was created are included. Returns the number of
    /// records indexed.
    pub fn rebuild_index(
        &mut self,
        name: &str,
        schema: &Schema,
        store: &dyn RecordStore,
    ) -> Result<u64, QuiverError> {
        let index = self
            .indexes
            .get_mut(name)
            .ok_or_else(|| QuiverError::NotFound(format!("index '{name}'")))?;
        let clusters = schema.polymorphic_clusters(&index.definition.class_name);
        index.clear();
        let mut indexed = 0u64;
        for cluster in clusters {
            for rid in store.cluster_rids(cluster) {
                let Some(record) = store.fetch(rid)? else { continue };
                let key = record.property(&index.definition.property).cloned().unwrap_or(Value::Null);
                index.put(key, rid)?;
                indexed = indexed.wrapping_add(1);
            }
        }
        log::debug!("index '{name}' rebuilt over {indexed} records");
        Ok(indexed)
    }

    /// Index maintenance on record save: adds the new key, removing the old
    /// one first when an old image is supplied.
    pub fn on_record_saved(
        &mut self,
        record: &crate::core::storage::Record,
        old_image: Option<&crate::core::storage::Record>,
        schema: &Schema,
    ) -> Result<(), QuiverError> {
        for index in self.indexes.values_mut() {
            if !schema.is_same_or_subclass(&record.class_name, &index.definition.class_name) {
                continue;
            }
            if let Some(old) = old_image {
                let old_key =
                    old.property(&index.definition.property).cloned().unwrap_or(Value::Null);
                index.remove(&old_key, old.rid);
            }
            let key = record.property(&index.definition.property).cloned().unwrap_or(Value::Null);
            index.put(key, record.rid)?;
        }
        Ok(())
    }

    /// Index maintenance on record delete.
    pub fn on_record_deleted(
        &mut self,
        record: &crate::core::storage::Record,
        _schema: &Schema,
    ) {
        for index in self.indexes.values_mut() {
            let key = record.property(&index.definition.property).cloned().unwrap_or(Value::Null);
            index.remove(&key, record.rid);
        }
    }
}
