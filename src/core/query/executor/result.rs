// src/core/query/executor/result.rs

use crate::core::common::types::Rid;
use crate::core::common::QuiverError;
use crate::core::query::executor::context::CommandContext;
use crate::core::schema::ClassKind;
use crate::core::storage::Record;
use crate::core::types::Value;
use std::collections::BTreeMap;

/// One unit of query output: a named-property bag, optionally backed by a
/// live entity.
///
/// Two flavors share this struct: a plain snapshot (`updatable == false`,
/// property writes rejected) and an updatable view over a stored record
/// (writes go through to the store and stay visible to later reads of the
/// same entity). Converting between the flavors preserves every property.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    rid: Option<Rid>,
    class_name: Option<String>,
    kind: Option<ClassKind>,
    properties: BTreeMap<String, Value>,
    updatable: bool,
}

impl Row {
    /// Plain projection row with no backing entity.
    #[must_use]
    pub fn projection(properties: BTreeMap<String, Value>) -> Self {
        Self { rid: None, class_name: None, kind: None, properties, updatable: false }
    }

    /// Snapshot row over a stored record.
    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self {
            rid: Some(record.rid),
            class_name: Some(record.class_name.clone()),
            kind: Some(record.kind),
            properties: record.properties.clone(),
            updatable: false,
        }
    }

    /// Single-property convenience used by reporting statements.
    #[must_use]
    pub fn report(key: &str, value: Value) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(key.to_string(), value);
        Self::projection(properties)
    }

    #[must_use]
    pub const fn rid(&self) -> Option<Rid> {
        self.rid
    }

    #[must_use]
    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    #[must_use]
    pub const fn kind(&self) -> Option<ClassKind> {
        self.kind
    }

    #[must_use]
    pub const fn is_updatable(&self) -> bool {
        self.updatable
    }

    /// Property lookup. `None` means absent, which is distinct from a stored
    /// `Value::Null`.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    #[must_use]
    pub const fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// Writes a property on an updatable row, through to the backing record
    /// so the mutation is visible to any later read of the same entity.
    pub fn set_property(
        &mut self,
        ctx: &CommandContext,
        name: &str,
        value: Value,
    ) -> Result<(), QuiverError> {
        if !self.updatable {
            return Err(QuiverError::Execution(
                "cannot mutate a plain snapshot row; convert it to updatable first".to_string(),
            ));
        }
        if let Some(rid) = self.rid {
            let mut record = ctx
                .session()
                .fetch(rid)?
                .ok_or_else(|| QuiverError::NotFound(format!("record {rid}")))?;
            record.set_property(name, value.clone());
            ctx.session().save(record)?;
        }
        self.properties.insert(name.to_string(), value);
        Ok(())
    }

    /// Re-wraps this row as a live, updatable view, refreshing the property
    /// cache from the store. Projection rows have no backing entity and pass
    /// through unchanged.
    pub fn into_updatable(mut self, ctx: &CommandContext) -> Result<Self, QuiverError> {
        let Some(rid) = self.rid else {
            return Ok(self);
        };
        let record = ctx
            .session()
            .fetch(rid)?
            .ok_or_else(|| QuiverError::NotFound(format!("record {rid}")))?;
        self.properties = record.properties;
        self.class_name = Some(record.class_name);
        self.kind = Some(record.kind);
        self.updatable = true;
        Ok(self)
    }

    /// Re-wraps this row as a plain immutable snapshot. Pending mutations
    /// already written through are retained in the snapshot.
    #[must_use]
    pub fn into_snapshot(mut self) -> Self {
        self.updatable = false;
        self
    }

    /// Stable fingerprint of the full property set, used by DISTINCT.
    #[must_use]
    pub fn fingerprint(&self) -> Vec<(String, Value)> {
        self.properties.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// JSON export of the row for the public API surface.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        if let Some(rid) = self.rid {
            object.insert("@rid".to_string(), serde_json::Value::String(rid.to_string()));
        }
        if let Some(class) = &self.class_name {
            object.insert("@class".to_string(), serde_json::Value::String(class.clone()));
        }
        for (key, value) in &self.properties {
            object.insert(key.clone(), value.to_json());
        }
        serde_json::Value::Object(object)
    }
}
