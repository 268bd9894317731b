// src/core/schema/mod.rs

//! Schema catalog: classes, their cluster ownership, superclass chains and
//! sequences. Consulted read-only during planning and by gate steps during
//! execution; mutated by the DDL handlers.

use crate::core::common::types::ClusterId;
use crate::core::common::QuiverError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What kind of records a class holds. Vertex and edge classes are the two
/// graph-typed families that the safe-delete gate refuses to delete through
/// the plain record path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassKind {
    Document,
    Vertex,
    Edge,
}

/// One schema class: name, kind, optional superclass and the clusters it owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaClass {
    pub name: String,
    pub kind: ClassKind,
    pub is_abstract: bool,
    pub superclass: Option<String>,
    pub clusters: Vec<ClusterId>,
}

/// A named sequence with a current value and an increment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sequence {
    pub name: String,
    pub value: i64,
    pub increment: i64,
}

impl Sequence {
    pub fn next(&mut self) -> i64 {
        self.value = self.value.saturating_add(self.increment);
        self.value
    }
}

/// The in-memory catalog. Class names are case-sensitive.
#[derive(Debug, Default)]
pub struct Schema {
    classes: HashMap<String, SchemaClass>,
    sequences: HashMap<String, Sequence>,
    next_cluster: u32,
}

impl Schema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a class, allocating `cluster_count` fresh clusters for it
    /// (abstract classes get none).
    pub fn create_class(
        &mut self,
        name: &str,
        kind: ClassKind,
        is_abstract: bool,
        superclass: Option<&str>,
        cluster_count: usize,
    ) -> Result<&SchemaClass, QuiverError> {
        if self.classes.contains_key(name) {
            return Err(QuiverError::AlreadyExists { name: name.to_string() });
        }
        if let Some(parent) = superclass {
            let parent_class = self
                .classes
                .get(parent)
                .ok_or_else(|| QuiverError::Schema(format!("superclass '{parent}' not found")))?;
            if parent_class.kind != kind {
                return Err(QuiverError::Schema(format!(
                    "class '{name}' ({kind:?}) cannot extend '{parent}' ({:?})",
                    parent_class.kind
                )));
            }
        }
        let clusters = if is_abstract {
            Vec::new()
        } else {
            (0..cluster_count.max(1)).map(|_| self.allocate_cluster()).collect()
        };
        let class = SchemaClass {
            name: name.to_string(),
            kind,
            is_abstract,
            superclass: superclass.map(str::to_string),
            clusters,
        };
        self.classes.insert(name.to_string(), class);
        Ok(&self.classes[name])
    }

    pub fn drop_class(&mut self, name: &str) -> Result<SchemaClass, QuiverError> {
        if self.classes.values().any(|c| c.superclass.as_deref() == Some(name)) {
            return Err(QuiverError::Schema(format!(
                "class '{name}' still has subclasses and cannot be dropped"
            )));
        }
        self.classes
            .remove(name)
            .ok_or_else(|| QuiverError::NotFound(format!("class '{name}'")))
    }

    #[must_use]
    pub fn class(&self, name: &str) -> Option<&SchemaClass> {
        self.classes.get(name)
    }

    pub fn require_class(&self, name: &str) -> Result<&SchemaClass, QuiverError> {
        self.class(name).ok_or_else(|| QuiverError::NotFound(format!("class '{name}'")))
    }

    /// Adds a newly allocated cluster to an existing class. Rebuild paths must
    /// include clusters added this way after the class's initial creation.
    pub fn add_cluster(&mut self, class_name: &str) -> Result<ClusterId, QuiverError> {
        let cluster = self.allocate_cluster();
        let class = self
            .classes
            .get_mut(class_name)
            .ok_or_else(|| QuiverError::NotFound(format!("class '{class_name}'")))?;
        class.clusters.push(cluster);
        Ok(cluster)
    }

    /// True when `child` is `parent` or a (transitive) declared subclass of it.
    #[must_use]
    pub fn is_same_or_subclass(&self, child: &str, parent: &str) -> bool {
        let mut current = Some(child);
        while let Some(name) = current {
            if name == parent {
                return true;
            }
            current = self.classes.get(name).and_then(|c| c.superclass.as_deref());
        }
        false
    }

    /// The clusters owned by `name` and all of its subclasses, i.e. the
    /// physical extent of a polymorphic scan.
    #[must_use]
    pub fn polymorphic_clusters(&self, name: &str) -> Vec<ClusterId> {
        let mut clusters = Vec::new();
        for class in self.classes.values() {
            if self.is_same_or_subclass(&class.name, name) {
                clusters.extend(class.clusters.iter().copied());
            }
        }
        clusters.sort_unstable();
        clusters
    }

    pub fn create_sequence(&mut self, name: &str, start: i64) -> Result<(), QuiverError> {
        if self.sequences.contains_key(name) {
            return Err(QuiverError::AlreadyExists { name: name.to_string() });
        }
        self.sequences
            .insert(name.to_string(), Sequence { name: name.to_string(), value: start, increment: 1 });
        Ok(())
    }

    pub fn alter_sequence_increment(&mut self, name: &str, increment: i64) -> Result<(), QuiverError> {
        let seq = self
            .sequences
            .get_mut(name)
            .ok_or_else(|| QuiverError::NotFound(format!("sequence '{name}'")))?;
        seq.increment = increment;
        Ok(())
    }

    #[must_use]
    pub fn sequence(&self, name: &str) -> Option<&Sequence> {
        self.sequences.get(name)
    }

    pub fn sequence_next(&mut self, name: &str) -> Result<i64, QuiverError> {
        let seq = self
            .sequences
            .get_mut(name)
            .ok_or_else(|| QuiverError::NotFound(format!("sequence '{name}'")))?;
        Ok(seq.next())
    }

    fn allocate_cluster(&mut self) -> ClusterId {
        let id = ClusterId(self.next_cluster);
        self.next_cluster = self.next_cluster.wrapping_add(1);
        id
    }
}
