// src/core/query/executor/ddl_handlers.rs

use crate::core::common::QuiverError;
use crate::core::index::IndexDefinition;
use crate::core::query::executor::context::CommandContext;
use crate::core::query::executor::result::Row;
use crate::core::schema::ClassKind;
use crate::core::types::Value;
use std::collections::BTreeMap;

fn operation_row(operation: &str, name: &str) -> Row {
    let mut properties = BTreeMap::new();
    properties.insert("operation".to_string(), Value::from(operation));
    properties.insert("name".to_string(), Value::from(name));
    Row::projection(properties)
}

fn skipped_row(operation: &str, name: &str) -> Row {
    let mut properties = BTreeMap::new();
    properties.insert("operation".to_string(), Value::from(operation));
    properties.insert("name".to_string(), Value::from(name));
    properties.insert("skipped".to_string(), Value::Boolean(true));
    Row::projection(properties)
}

#[allow(clippy::fn_params_excessive_bools)]
pub(crate) fn create_class(
    ctx: &CommandContext,
    name: &str,
    kind: ClassKind,
    is_abstract: bool,
    superclass: Option<&str>,
    clusters: usize,
    if_not_exists: bool,
) -> Result<Vec<Row>, QuiverError> {
    let created = ctx.session().with_schema_mut(|schema| {
        match schema.create_class(name, kind, is_abstract, superclass, clusters) {
            Ok(_) => Ok(true),
            Err(QuiverError::AlreadyExists { .. }) if if_not_exists => Ok(false),
            Err(e) => Err(e),
        }
    })?;
    if created {
        Ok(vec![operation_row("create class", name)])
    } else {
        Ok(vec![skipped_row("create class", name)])
    }
}

pub(crate) fn drop_class(
    ctx: &CommandContext,
    name: &str,
    unsafe_drop: bool,
    if_exists: bool,
) -> Result<Vec<Row>, QuiverError> {
    let exists = ctx.session().with_schema(|schema| Ok(schema.class(name).is_some()))?;
    if !exists {
        if if_exists {
            return Ok(vec![skipped_row("drop class", name)]);
        }
        return Err(QuiverError::NotFound(format!("class '{name}'")));
    }
    if !unsafe_drop {
        let records = ctx.session().count_class(name)?;
        if records > 0 {
            return Err(QuiverError::Execution(format!(
                "class '{name}' holds {records} records; use UNSAFE to drop it anyway"
            )));
        }
    }
    ctx.session().with_schema_mut(|schema| schema.drop_class(name).map(|_| ()))?;
    // indexes over the dropped class go with it
    let orphaned: Vec<String> = ctx.session().with_indexes(|indexes| {
        Ok(indexes
            .names()
            .into_iter()
            .filter(|n| {
                indexes.index(n).is_some_and(|i| i.definition.class_name == name)
            })
            .collect())
    })?;
    ctx.session().with_indexes_mut(|indexes| {
        for index_name in &orphaned {
            indexes.drop_index(index_name)?;
        }
        Ok(())
    })?;
    Ok(vec![operation_row("drop class", name)])
}

pub(crate) fn create_index(
    ctx: &CommandContext,
    name: &str,
    class: &str,
    property: &str,
    unique: bool,
    if_not_exists: bool,
) -> Result<Vec<Row>, QuiverError> {
    ctx.session().with_schema(|schema| schema.require_class(class).map(|_| ()))?;
    let definition = IndexDefinition {
        name: name.to_string(),
        class_name: class.to_string(),
        property: property.to_string(),
        unique,
    };
    let created = ctx.session().with_indexes_mut(|indexes| {
        match indexes.create_index(definition) {
            Ok(()) => Ok(true),
            Err(QuiverError::AlreadyExists { .. }) if if_not_exists => Ok(false),
            Err(e) => Err(e),
        }
    })?;
    if !created {
        return Ok(vec![skipped_row("create index", name)]);
    }
    // a fresh index covers the records already stored
    let indexed = ctx.session().rebuild_index(name)?;
    Ok(vec![with_count(operation_row("create index", name), indexed)])
}

pub(crate) fn drop_index(
    ctx: &CommandContext,
    name: &str,
    if_exists: bool,
) -> Result<Vec<Row>, QuiverError> {
    let dropped = ctx.session().with_indexes_mut(|indexes| match indexes.drop_index(name) {
        Ok(()) => Ok(true),
        Err(QuiverError::NotFound(_)) if if_exists => Ok(false),
        Err(e) => Err(e),
    })?;
    if dropped {
        Ok(vec![operation_row("drop index", name)])
    } else {
        Ok(vec![skipped_row("drop index", name)])
    }
}

pub(crate) fn rebuild_index(
    ctx: &CommandContext,
    name: &str,
) -> Result<Vec<Row>, QuiverError> {
    let indexed = ctx.session().rebuild_index(name)?;
    Ok(vec![with_count(operation_row("rebuild index", name), indexed)])
}

pub(crate) fn create_sequence(
    ctx: &CommandContext,
    name: &str,
    start: i64,
) -> Result<Vec<Row>, QuiverError> {
    ctx.session().with_schema_mut(|schema| schema.create_sequence(name, start))?;
    Ok(vec![operation_row("create sequence", name)])
}

pub(crate) fn alter_sequence(
    ctx: &CommandContext,
    name: &str,
    increment: i64,
) -> Result<Vec<Row>, QuiverError> {
    ctx.session().with_schema_mut(|schema| schema.alter_sequence_increment(name, increment))?;
    Ok(vec![operation_row("alter sequence", name)])
}

fn with_count(row: Row, count: u64) -> Row {
    let mut properties = row.properties().clone();
    properties.insert("count".to_string(), Value::Integer(i64::try_from(count).unwrap_or(i64::MAX)));
    Row::projection(properties)
}
