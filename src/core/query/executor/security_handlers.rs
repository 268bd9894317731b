// src/core/query/executor/security_handlers.rs

use crate::core::common::QuiverError;
use crate::core::query::executor::context::CommandContext;
use crate::core::query::executor::result::Row;
use crate::core::security::Permission;
use crate::core::types::Value;
use std::collections::BTreeMap;

fn operation_row(operation: &str, detail: &str) -> Row {
    let mut properties = BTreeMap::new();
    properties.insert("operation".to_string(), Value::from(operation));
    properties.insert("detail".to_string(), Value::from(detail));
    Row::projection(properties)
}

/// GRANT creates the role on first use; there is no separate role DDL in the
/// statement surface.
pub(crate) fn grant(
    ctx: &CommandContext,
    permission: Permission,
    resource: &str,
    role: &str,
) -> Result<Vec<Row>, QuiverError> {
    ctx.session().with_security(|security| {
        match security.create_role(role) {
            Ok(()) | Err(QuiverError::AlreadyExists { .. }) => {}
            Err(e) => return Err(e),
        }
        security.grant(role, resource, permission)
    })?;
    Ok(vec![operation_row("grant", &format!("{} on {resource} to {role}", permission.as_str()))])
}

pub(crate) fn revoke(
    ctx: &CommandContext,
    permission: Permission,
    resource: &str,
    role: &str,
) -> Result<Vec<Row>, QuiverError> {
    ctx.session().with_security(|security| security.revoke(role, resource, permission))?;
    Ok(vec![operation_row(
        "revoke",
        &format!("{} on {resource} from {role}", permission.as_str()),
    )])
}

pub(crate) fn create_policy(
    ctx: &CommandContext,
    name: &str,
) -> Result<Vec<Row>, QuiverError> {
    ctx.session().with_security(|security| security.create_policy(name))?;
    Ok(vec![operation_row("create security policy", name)])
}

pub(crate) fn alter_policy(
    ctx: &CommandContext,
    name: &str,
    permission: Permission,
    predicate: &str,
) -> Result<Vec<Row>, QuiverError> {
    ctx.session().with_security(|security| security.alter_policy(name, permission, predicate))?;
    Ok(vec![operation_row("alter security policy", name)])
}

pub(crate) fn set_role_policy(
    ctx: &CommandContext,
    role: &str,
    resource: &str,
    policy: &str,
) -> Result<Vec<Row>, QuiverError> {
    ctx.session().with_security(|security| security.set_role_policy(role, resource, policy))?;
    Ok(vec![operation_row("alter role set policy", &format!("{policy} on {resource} for {role}"))])
}

pub(crate) fn remove_role_policy(
    ctx: &CommandContext,
    role: &str,
    resource: &str,
) -> Result<Vec<Row>, QuiverError> {
    ctx.session().with_security(|security| security.remove_role_policy(role, resource))?;
    Ok(vec![operation_row("alter role remove policy", &format!("{resource} for {role}"))])
}
