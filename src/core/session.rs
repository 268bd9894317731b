// src/core/session.rs

//! The database/session handle bound into every `CommandContext`. One session
//! is shared (`Arc`) across a whole context tree and across parallel
//! sub-plans; it serializes access to the store, catalog, indexes, security
//! metadata and the single active transaction behind `RwLock`s.

use crate::core::common::types::{ClusterId, Rid, TransactionId};
use crate::core::common::QuiverError;
use crate::core::config::Config;
use crate::core::index::IndexManager;
use crate::core::schema::{ClassKind, Schema};
use crate::core::security::SecurityManager;
use crate::core::storage::{InMemoryStore, Record, RecordStore};
use crate::core::transaction::{TransactionManager, UndoEntry};
use crate::core::types::Value;
use std::collections::BTreeMap;
use std::sync::RwLock;

pub struct DatabaseSession {
    config: Config,
    store: RwLock<Box<dyn RecordStore>>,
    schema: RwLock<Schema>,
    indexes: RwLock<IndexManager>,
    security: RwLock<SecurityManager>,
    transactions: RwLock<TransactionManager>,
}

impl std::fmt::Debug for DatabaseSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSession").field("config", &self.config).finish_non_exhaustive()
    }
}

impl DatabaseSession {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_store(config, Box::new(InMemoryStore::new()))
    }

    /// Builds a session over an embedder-supplied storage engine.
    #[must_use]
    pub fn with_store(config: Config, store: Box<dyn RecordStore>) -> Self {
        Self {
            config,
            store: RwLock::new(store),
            schema: RwLock::new(Schema::new()),
            indexes: RwLock::new(IndexManager::new()),
            security: RwLock::new(SecurityManager::new()),
            transactions: RwLock::new(TransactionManager::new()),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    // ---- catalog access -------------------------------------------------

    pub fn with_schema<T>(
        &self,
        f: impl FnOnce(&Schema) -> Result<T, QuiverError>,
    ) -> Result<T, QuiverError> {
        let schema = self.schema.read().map_err(|_| QuiverError::poisoned("schema"))?;
        f(&schema)
    }

    pub fn with_schema_mut<T>(
        &self,
        f: impl FnOnce(&mut Schema) -> Result<T, QuiverError>,
    ) -> Result<T, QuiverError> {
        let mut schema = self.schema.write().map_err(|_| QuiverError::poisoned("schema"))?;
        f(&mut schema)
    }

    pub fn with_indexes<T>(
        &self,
        f: impl FnOnce(&IndexManager) -> Result<T, QuiverError>,
    ) -> Result<T, QuiverError> {
        let indexes = self.indexes.read().map_err(|_| QuiverError::poisoned("indexes"))?;
        f(&indexes)
    }

    pub fn with_indexes_mut<T>(
        &self,
        f: impl FnOnce(&mut IndexManager) -> Result<T, QuiverError>,
    ) -> Result<T, QuiverError> {
        let mut indexes = self.indexes.write().map_err(|_| QuiverError::poisoned("indexes"))?;
        f(&mut indexes)
    }

    pub fn with_security<T>(
        &self,
        f: impl FnOnce(&mut SecurityManager) -> Result<T, QuiverError>,
    ) -> Result<T, QuiverError> {
        let mut security = self.security.write().map_err(|_| QuiverError::poisoned("security"))?;
        f(&mut security)
    }

    /// Rebuilds one index against the current store contents.
    pub fn rebuild_index(&self, name: &str) -> Result<u64, QuiverError> {
        let store = self.store.read().map_err(|_| QuiverError::poisoned("store"))?;
        let schema = self.schema.read().map_err(|_| QuiverError::poisoned("schema"))?;
        let mut indexes = self.indexes.write().map_err(|_| QuiverError::poisoned("indexes"))?;
        indexes.rebuild_index(name, &schema, store.as_ref())
    }

    // ---- transactions ---------------------------------------------------

    pub fn begin(&self) -> Result<TransactionId, QuiverError> {
        let mut tx = self.transactions.write().map_err(|_| QuiverError::poisoned("transactions"))?;
        tx.begin()
    }

    /// Commits the active transaction; `Ok(None)` when none is active.
    pub fn commit(&self) -> Result<Option<TransactionId>, QuiverError> {
        let mut tx = self.transactions.write().map_err(|_| QuiverError::poisoned("transactions"))?;
        Ok(tx.commit())
    }

    /// Rolls back the active transaction; `Ok(None)` when none is active.
    /// Indexes are rebuilt afterwards so they reflect the restored records.
    pub fn rollback(&self) -> Result<Option<TransactionId>, QuiverError> {
        let mut store = self.store.write().map_err(|_| QuiverError::poisoned("store"))?;
        let rolled_back = {
            let mut tx =
                self.transactions.write().map_err(|_| QuiverError::poisoned("transactions"))?;
            tx.rollback(store.as_mut())?
        };
        if rolled_back.is_some() {
            let schema = self.schema.read().map_err(|_| QuiverError::poisoned("schema"))?;
            let mut indexes =
                self.indexes.write().map_err(|_| QuiverError::poisoned("indexes"))?;
            for name in indexes.names() {
                indexes.rebuild_index(&name, &schema, store.as_ref())?;
            }
        }
        Ok(rolled_back)
    }

    #[must_use]
    pub fn transaction_active(&self) -> bool {
        self.transactions.read().map(|tx| tx.is_active()).unwrap_or(false)
    }

    // ---- record access --------------------------------------------------

    pub fn fetch(&self, rid: Rid) -> Result<Option<Record>, QuiverError> {
        let store = self.store.read().map_err(|_| QuiverError::poisoned("store"))?;
        store.fetch(rid)
    }

    /// Snapshot of the rids in one physical cluster.
    pub fn cluster_rids(&self, cluster: ClusterId) -> Result<Vec<Rid>, QuiverError> {
        let store = self.store.read().map_err(|_| QuiverError::poisoned("store"))?;
        Ok(store.cluster_rids(cluster))
    }

    /// Record count of a class across every cluster it or a subclass owns,
    /// including same-transaction writes (writes go straight to the store).
    pub fn count_class(&self, class_name: &str) -> Result<u64, QuiverError> {
        let clusters = {
            let schema = self.schema.read().map_err(|_| QuiverError::poisoned("schema"))?;
            schema.require_class(class_name)?;
            schema.polymorphic_clusters(class_name)
        };
        let store = self.store.read().map_err(|_| QuiverError::poisoned("store"))?;
        Ok(clusters.iter().map(|&c| store.cluster_size(c)).sum())
    }

    /// Inserts a new record of `class_name`, allocating a rid in the class's
    /// first cluster. The record kind follows the class kind.
    pub fn insert(
        &self,
        class_name: &str,
        properties: BTreeMap<String, Value>,
    ) -> Result<Rid, QuiverError> {
        let (kind, cluster) = self.with_schema(|schema| {
            let class = schema.require_class(class_name)?;
            if class.is_abstract {
                return Err(QuiverError::Schema(format!(
                    "cannot insert into abstract class '{class_name}'"
                )));
            }
            let cluster = *class.clusters.first().ok_or_else(|| {
                QuiverError::Schema(format!("class '{class_name}' owns no clusters"))
            })?;
            Ok((class.kind, cluster))
        })?;
        if kind == ClassKind::Edge {
            return Err(QuiverError::Execution(format!(
                "edges of class '{class_name}' must be created with create_edge"
            )));
        }
        let mut store = self.store.write().map_err(|_| QuiverError::poisoned("store"))?;
        let rid = Rid::new(cluster, store.next_position(cluster));
        let record = match kind {
            ClassKind::Vertex => Record::vertex(rid, class_name, properties),
            _ => Record::document(rid, class_name, properties),
        };
        self.save_locked(&mut store, record, None)?;
        Ok(rid)
    }

    /// Creates an edge of `class_name` from one vertex to another, patching
    /// the incident-edge lists of both endpoints.
    pub fn create_edge(
        &self,
        class_name: &str,
        from: Rid,
        to: Rid,
        properties: BTreeMap<String, Value>,
    ) -> Result<Rid, QuiverError> {
        let cluster = self.with_schema(|schema| {
            let class = schema.require_class(class_name)?;
            if class.kind != ClassKind::Edge {
                return Err(QuiverError::Schema(format!(
                    "class '{class_name}' is not an edge class"
                )));
            }
            class.clusters.first().copied().ok_or_else(|| {
                QuiverError::Schema(format!("class '{class_name}' owns no clusters"))
            })
        })?;
        let mut store = self.store.write().map_err(|_| QuiverError::poisoned("store"))?;

        let mut from_vertex = store
            .fetch(from)?
            .ok_or_else(|| QuiverError::NotFound(format!("vertex {from}")))?;
        let mut to_vertex =
            store.fetch(to)?.ok_or_else(|| QuiverError::NotFound(format!("vertex {to}")))?;
        if from_vertex.kind != ClassKind::Vertex || to_vertex.kind != ClassKind::Vertex {
            return Err(QuiverError::Execution(format!(
                "edge endpoints must be vertices ({from} -> {to})"
            )));
        }

        let rid = Rid::new(cluster, store.next_position(cluster));
        let edge = Record::edge(rid, class_name, from, to, properties);

        let from_image = from_vertex.clone();
        let to_image = to_vertex.clone();
        from_vertex.out_edges.push(rid);
        to_vertex.in_edges.push(rid);

        self.save_locked(&mut store, edge, None)?;
        self.save_locked(&mut store, from_vertex, Some(from_image))?;
        self.save_locked(&mut store, to_vertex, Some(to_image))?;
        Ok(rid)
    }

    /// Saves a record, recording undo and maintaining indexes. Used by the
    /// updatable-row write-through path.
    pub fn save(&self, record: Record) -> Result<(), QuiverError> {
        let mut store = self.store.write().map_err(|_| QuiverError::poisoned("store"))?;
        let old = store.fetch(record.rid)?;
        self.save_locked(&mut store, record, old)
    }

    /// Deletes a plain (non-graph) record. Vertices and edges must go through
    /// [`Self::delete_vertex`] / [`Self::delete_edge`].
    pub fn delete_document(&self, rid: Rid) -> Result<bool, QuiverError> {
        let mut store = self.store.write().map_err(|_| QuiverError::poisoned("store"))?;
        let Some(record) = store.fetch(rid)? else {
            return Ok(false);
        };
        if record.is_graph_element() {
            return Err(QuiverError::Execution(format!(
                "record {rid} is a {:?} and cannot be deleted as a plain record",
                record.kind
            )));
        }
        self.delete_locked(&mut store, &record)?;
        Ok(true)
    }

    /// Deletes an edge, removing it from both endpoints' incident lists.
    pub fn delete_edge(&self, rid: Rid) -> Result<bool, QuiverError> {
        let mut store = self.store.write().map_err(|_| QuiverError::poisoned("store"))?;
        self.delete_edge_locked(&mut store, rid)
    }

    /// Deletes a vertex and every edge incident to it, patching the
    /// reciprocal references on the connected vertices.
    pub fn delete_vertex(&self, rid: Rid) -> Result<bool, QuiverError> {
        let mut store = self.store.write().map_err(|_| QuiverError::poisoned("store"))?;
        let Some(vertex) = store.fetch(rid)? else {
            return Ok(false);
        };
        if vertex.kind != ClassKind::Vertex {
            return Err(QuiverError::Execution(format!("record {rid} is not a vertex")));
        }
        let mut incident: Vec<Rid> = vertex.out_edges.clone();
        incident.extend(vertex.in_edges.iter().copied());
        incident.sort_unstable();
        incident.dedup();
        for edge_rid in incident {
            self.delete_edge_locked(&mut store, edge_rid)?;
        }
        // the vertex image may have changed while edges were detached
        if let Some(current) = store.fetch(rid)? {
            self.delete_locked(&mut store, &current)?;
        }
        Ok(true)
    }

    // ---- internals ------------------------------------------------------

    fn save_locked(
        &self,
        store: &mut Box<dyn RecordStore>,
        record: Record,
        old_image: Option<Record>,
    ) -> Result<(), QuiverError> {
        {
            let mut tx =
                self.transactions.write().map_err(|_| QuiverError::poisoned("transactions"))?;
            if tx.is_active() {
                match &old_image {
                    Some(old) => tx.record_undo(UndoEntry::Updated(old.clone())),
                    None => tx.record_undo(UndoEntry::Created(record.rid)),
                }
            }
        }
        {
            let schema = self.schema.read().map_err(|_| QuiverError::poisoned("schema"))?;
            let mut indexes =
                self.indexes.write().map_err(|_| QuiverError::poisoned("indexes"))?;
            indexes.on_record_saved(&record, old_image.as_ref(), &schema)?;
        }
        store.save(record)
    }

    fn delete_locked(
        &self,
        store: &mut Box<dyn RecordStore>,
        record: &Record,
    ) -> Result<(), QuiverError> {
        {
            let mut tx =
                self.transactions.write().map_err(|_| QuiverError::poisoned("transactions"))?;
            if tx.is_active() {
                tx.record_undo(UndoEntry::Deleted(record.clone()));
            }
        }
        {
            let schema = self.schema.read().map_err(|_| QuiverError::poisoned("schema"))?;
            let mut indexes =
                self.indexes.write().map_err(|_| QuiverError::poisoned("indexes"))?;
            indexes.on_record_deleted(record, &schema);
        }
        store.delete(record.rid)?;
        Ok(())
    }

    fn delete_edge_locked(
        &self,
        store: &mut Box<dyn RecordStore>,
        rid: Rid,
    ) -> Result<bool, QuiverError> {
        let Some(edge) = store.fetch(rid)? else {
            return Ok(false);
        };
        if edge.kind != ClassKind::Edge {
            return Err(QuiverError::Execution(format!("record {rid} is not an edge")));
        }
        for endpoint in [edge.from, edge.to].into_iter().flatten() {
            if let Some(mut vertex) = store.fetch(endpoint)? {
                let image = vertex.clone();
                vertex.out_edges.retain(|e| *e != rid);
                vertex.in_edges.retain(|e| *e != rid);
                if vertex != image {
                    self.save_locked(store, vertex, Some(image))?;
                }
            }
        }
        self.delete_locked(store, &edge)?;
        Ok(true)
    }
}
