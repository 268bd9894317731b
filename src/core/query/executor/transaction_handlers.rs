// src/core/query/executor/transaction_handlers.rs

use crate::core::common::QuiverError;
use crate::core::query::executor::context::CommandContext;
use crate::core::query::executor::result::Row;
use crate::core::types::Value;

fn operation_row(operation: &str) -> Row {
    Row::report("operation", Value::from(operation))
}

/// BEGIN fails when a transaction is already active on the session.
pub(crate) fn begin(ctx: &CommandContext) -> Result<Vec<Row>, QuiverError> {
    ctx.session().begin()?;
    Ok(vec![operation_row("begin")])
}

/// COMMIT with no active transaction is a reporting no-op.
pub(crate) fn commit(ctx: &CommandContext) -> Result<Vec<Row>, QuiverError> {
    if ctx.session().commit()?.is_none() {
        log::debug!("COMMIT with no active transaction");
    }
    Ok(vec![operation_row("commit")])
}

/// ROLLBACK with no active transaction is a reporting no-op.
pub(crate) fn rollback(ctx: &CommandContext) -> Result<Vec<Row>, QuiverError> {
    if ctx.session().rollback()?.is_none() {
        log::debug!("ROLLBACK with no active transaction");
    }
    Ok(vec![operation_row("rollback")])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::session::DatabaseSession;
    use std::sync::Arc;

    fn ctx() -> CommandContext {
        CommandContext::new(Arc::new(DatabaseSession::new(Config::default())))
    }

    #[test]
    fn begin_inside_transaction_is_invalid_state() {
        let ctx = ctx();
        begin(&ctx).expect("begin");
        assert!(matches!(begin(&ctx), Err(QuiverError::InvalidState(_))));
    }

    #[test]
    fn commit_and_rollback_without_transaction_are_noops() {
        let ctx = ctx();
        let rows = commit(&ctx).expect("commit");
        assert_eq!(rows[0].property("operation"), Some(&Value::from("commit")));
        let rows = rollback(&ctx).expect("rollback");
        assert_eq!(rows[0].property("operation"), Some(&Value::from("rollback")));
    }

    #[test]
    fn begin_commit_round_trip_reports_both_operations() {
        let ctx = ctx();
        begin(&ctx).expect("begin");
        assert!(ctx.session().transaction_active());
        commit(&ctx).expect("commit");
        assert!(!ctx.session().transaction_active());
    }
}
