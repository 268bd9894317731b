// src/core/storage/record.rs

use crate::core::common::types::Rid;
use crate::core::schema::ClassKind;
use crate::core::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One persisted entity: a document, vertex or edge.
///
/// Vertices track the rids of their incident edges; edges track their two
/// endpoints. The graph-aware delete path keeps these reciprocal references
/// consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub rid: Rid,
    pub class_name: String,
    pub kind: ClassKind,
    pub properties: BTreeMap<String, Value>,
    /// Edges leaving this vertex. Empty for non-vertices.
    pub out_edges: Vec<Rid>,
    /// Edges arriving at this vertex. Empty for non-vertices.
    pub in_edges: Vec<Rid>,
    /// Source vertex, set for edges only.
    pub from: Option<Rid>,
    /// Target vertex, set for edges only.
    pub to: Option<Rid>,
}

impl Record {
    #[must_use]
    pub fn document(rid: Rid, class_name: &str, properties: BTreeMap<String, Value>) -> Self {
        Self {
            rid,
            class_name: class_name.to_string(),
            kind: ClassKind::Document,
            properties,
            out_edges: Vec::new(),
            in_edges: Vec::new(),
            from: None,
            to: None,
        }
    }

    #[must_use]
    pub fn vertex(rid: Rid, class_name: &str, properties: BTreeMap<String, Value>) -> Self {
        Self { kind: ClassKind::Vertex, ..Self::document(rid, class_name, properties) }
    }

    #[must_use]
    pub fn edge(
        rid: Rid,
        class_name: &str,
        from: Rid,
        to: Rid,
        properties: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            kind: ClassKind::Edge,
            from: Some(from),
            to: Some(to),
            ..Self::document(rid, class_name, properties)
        }
    }

    #[must_use]
    pub fn is_graph_element(&self) -> bool {
        matches!(self.kind, ClassKind::Vertex | ClassKind::Edge)
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn set_property(&mut self, name: &str, value: Value) {
        self.properties.insert(name.to_string(), value);
    }
}
