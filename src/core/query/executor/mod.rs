// src/core/query/executor/mod.rs

//! Statement execution: the pull-based operator pipeline (context, stream,
//! plan, steps) and the per-family statement handlers driving it.

pub mod context;
pub mod plan;
pub mod result;
pub mod result_set;
pub mod steps;
pub mod stream;

pub(crate) mod planner;

mod ddl_handlers;
mod delete_handlers;
mod script_handlers;
mod security_handlers;
mod transaction_handlers;

pub use context::CommandContext;
pub use plan::{ExecutionPlan, ExecutionStep};
pub use result::Row;
pub use result_set::ResultSet;
pub use stream::ExecutionStream;

use crate::core::common::QuiverError;
use crate::core::query::statements::Statement;
use crate::core::session::DatabaseSession;
use crate::core::types::Value;
use script_handlers::BlockSignal;
use std::sync::Arc;
use std::time::Instant;

/// Entry point for executing parsed statements against a session.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    session: Arc<DatabaseSession>,
}

impl QueryExecutor {
    #[must_use]
    pub fn new(session: Arc<DatabaseSession>) -> Self {
        Self { session }
    }

    #[must_use]
    pub fn session(&self) -> &Arc<DatabaseSession> {
        &self.session
    }

    /// Executes one statement, returning a cursor over its rows. SELECT rows
    /// stream lazily; every other statement family reports its outcome as
    /// pre-computed rows.
    pub fn execute(&self, statement: &Statement) -> Result<ResultSet, QuiverError> {
        let mut ctx = CommandContext::new(Arc::clone(&self.session));
        match execute_statement(&mut ctx, statement)? {
            StatementOutcome::Rows(rows) => Ok(ResultSet::materialized(ctx, rows)),
            StatementOutcome::Plan(plan) => ResultSet::from_plan(ctx, plan),
        }
    }

    /// Runs a statement sequence as one script sharing a context. The result
    /// carries the RETURN value when one fired, and is empty otherwise.
    pub fn execute_script(&self, script: &[Statement]) -> Result<ResultSet, QuiverError> {
        let mut ctx = CommandContext::new(Arc::clone(&self.session));
        let rows = match script_handlers::run_block(&mut ctx, script)? {
            BlockSignal::Return(value) => vec![Row::report("value", value)],
            BlockSignal::Proceed => Vec::new(),
        };
        Ok(ResultSet::materialized(ctx, rows))
    }
}

/// What a dispatched statement hands back: either finished rows or an
/// unstarted plan for the caller to stream from.
pub(crate) enum StatementOutcome {
    Rows(Vec<Row>),
    Plan(ExecutionPlan),
}

pub(crate) fn execute_statement(
    ctx: &mut CommandContext,
    statement: &Statement,
) -> Result<StatementOutcome, QuiverError> {
    log::debug!("executing {}", statement.name());
    let rows = match statement {
        Statement::Begin => transaction_handlers::begin(ctx)?,
        Statement::Commit => transaction_handlers::commit(ctx)?,
        Statement::Rollback => transaction_handlers::rollback(ctx)?,

        Statement::CreateClass { name, kind, is_abstract, superclass, clusters, if_not_exists } => {
            ddl_handlers::create_class(
                ctx,
                name,
                *kind,
                *is_abstract,
                superclass.as_deref(),
                *clusters,
                *if_not_exists,
            )?
        }
        Statement::DropClass { name, unsafe_drop, if_exists } => {
            ddl_handlers::drop_class(ctx, name, *unsafe_drop, *if_exists)?
        }
        Statement::CreateIndex { name, class, property, unique, if_not_exists } => {
            ddl_handlers::create_index(ctx, name, class, property, *unique, *if_not_exists)?
        }
        Statement::DropIndex { name, if_exists } => {
            ddl_handlers::drop_index(ctx, name, *if_exists)?
        }
        Statement::RebuildIndex { name } => ddl_handlers::rebuild_index(ctx, name)?,
        Statement::CreateSequence { name, start } => {
            ddl_handlers::create_sequence(ctx, name, *start)?
        }
        Statement::AlterSequence { name, increment } => {
            ddl_handlers::alter_sequence(ctx, name, *increment)?
        }

        Statement::Insert { class, properties } => {
            let rid = ctx.session().insert(class, properties.clone())?;
            let record = ctx
                .session()
                .fetch(rid)?
                .ok_or_else(|| QuiverError::Internal(format!("inserted record {rid} vanished")))?;
            vec![Row::from_record(&record)]
        }
        Statement::Select(select) => {
            return Ok(StatementOutcome::Plan(planner::plan_select(ctx, select)?));
        }
        Statement::Delete { class, filter, batch } => {
            delete_handlers::delete_plain(ctx, class, filter.as_ref(), *batch)?
        }
        Statement::DeleteVertex { target, batch } => {
            delete_handlers::delete_vertex(ctx, target, *batch)?
        }
        Statement::DeleteEdge { target, batch } => {
            delete_handlers::delete_edge(ctx, target, *batch)?
        }

        Statement::Grant { permission, resource, role } => {
            security_handlers::grant(ctx, *permission, resource, role)?
        }
        Statement::Revoke { permission, resource, role } => {
            security_handlers::revoke(ctx, *permission, resource, role)?
        }
        Statement::CreateSecurityPolicy { name } => security_handlers::create_policy(ctx, name)?,
        Statement::AlterSecurityPolicy { name, permission, predicate } => {
            security_handlers::alter_policy(ctx, name, *permission, predicate)?
        }
        Statement::AlterRoleSetPolicy { role, resource, policy } => {
            security_handlers::set_role_policy(ctx, role, resource, policy)?
        }
        Statement::AlterRoleRemovePolicy { role, resource } => {
            security_handlers::remove_role_policy(ctx, role, resource)?
        }

        Statement::Explain(inner) => explain(ctx, inner)?,
        Statement::Profile(inner) => profile(ctx, inner)?,

        Statement::Foreach { .. }
        | Statement::While { .. }
        | Statement::If { .. }
        | Statement::Return(_)
        | Statement::Let { .. } => {
            match script_handlers::run_block(ctx, std::slice::from_ref(statement))? {
                BlockSignal::Return(value) => vec![Row::report("value", value)],
                BlockSignal::Proceed => Vec::new(),
            }
        }
    };
    Ok(StatementOutcome::Rows(rows))
}

/// Executes a statement and drains its rows, for callers that embed one
/// statement inside another (scripts, subquery targets, PROFILE).
pub(crate) fn materialize(
    ctx: &mut CommandContext,
    statement: &Statement,
) -> Result<Vec<Row>, QuiverError> {
    match execute_statement(ctx, statement)? {
        StatementOutcome::Rows(rows) => Ok(rows),
        StatementOutcome::Plan(mut plan) => {
            let mut stream = plan.start(ctx)?;
            let mut rows = Vec::new();
            let outcome = (|| -> Result<(), QuiverError> {
                while stream.has_next(ctx)? {
                    rows.push(stream.next(ctx)?);
                }
                Ok(())
            })();
            stream.close(ctx);
            outcome.map(|()| rows)
        }
    }
}

/// EXPLAIN renders the physical plan without executing anything.
fn explain(ctx: &mut CommandContext, inner: &Statement) -> Result<Vec<Row>, QuiverError> {
    let plan = match inner {
        Statement::Select(select) => planner::plan_select(ctx, select)?,
        Statement::Delete { class, filter, .. } => {
            planner::plan_delete_candidates(class, filter.as_ref())
        }
        other => {
            return Err(QuiverError::Execution(format!(
                "EXPLAIN is not supported for {}",
                other.name()
            )));
        }
    };
    Ok(vec![Row::report("plan", Value::String(plan.pretty_print()))])
}

/// PROFILE executes the statement and reports the plan annotated with
/// per-step elapsed time; statements without a plan report wall-clock time.
fn profile(ctx: &mut CommandContext, inner: &Statement) -> Result<Vec<Row>, QuiverError> {
    match inner {
        Statement::Select(select) => {
            let mut plan = planner::plan_select(ctx, select)?;
            let mut stream = plan.start(ctx)?;
            let mut count = 0i64;
            let outcome = (|| -> Result<(), QuiverError> {
                while stream.has_next(ctx)? {
                    stream.next(ctx)?;
                    count += 1;
                }
                Ok(())
            })();
            stream.close(ctx);
            outcome?;
            let mut properties = std::collections::BTreeMap::new();
            properties.insert("profile".to_string(), Value::String(plan.profile_report()));
            properties.insert("rows".to_string(), Value::Integer(count));
            Ok(vec![Row::projection(properties)])
        }
        other => {
            let started = Instant::now();
            let rows = materialize(ctx, other)?;
            let mut properties = std::collections::BTreeMap::new();
            properties.insert(
                "profile".to_string(),
                Value::String(format!(
                    "+ {} ({})",
                    other.name(),
                    plan::format_elapsed(started.elapsed())
                )),
            );
            properties.insert("rows".to_string(), Value::Integer(rows.len() as i64));
            Ok(vec![Row::projection(properties)])
        }
    }
}
