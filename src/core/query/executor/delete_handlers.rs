// src/core/query/executor/delete_handlers.rs

use crate::core::common::types::Rid;
use crate::core::common::QuiverError;
use crate::core::query::executor::context::CommandContext;
use crate::core::query::executor::planner;
use crate::core::query::executor::result::Row;
use crate::core::query::expression::Expression;
use crate::core::query::statements::DeleteTarget;
use crate::core::schema::ClassKind;
use crate::core::types::Value;

fn count_row(deleted: u64) -> Row {
    Row::report("count", Value::Integer(i64::try_from(deleted).unwrap_or(i64::MAX)))
}

/// Plain DELETE. Candidates flow through the safe-delete gate, so the
/// statement fails before anything is removed when a graph element matches.
pub(crate) fn delete_plain(
    ctx: &mut CommandContext,
    class: &str,
    filter: Option<&Expression>,
    batch: Option<usize>,
) -> Result<Vec<Row>, QuiverError> {
    let mut plan = planner::plan_delete_candidates(class, filter);
    let mut stream = plan.start(ctx)?;
    let mut targets = Vec::new();
    let outcome = (|| -> Result<(), QuiverError> {
        while stream.has_next(ctx)? {
            if let Some(rid) = stream.next(ctx)?.rid() {
                targets.push(rid);
            }
        }
        Ok(())
    })();
    stream.close(ctx);
    outcome?;

    let deleted = run_batched(ctx, batch, targets, |ctx, rid| ctx.session().delete_document(rid))?;
    Ok(vec![count_row(deleted)])
}

pub(crate) fn delete_vertex(
    ctx: &mut CommandContext,
    target: &DeleteTarget,
    batch: Option<usize>,
) -> Result<Vec<Row>, QuiverError> {
    let targets = resolve_targets(ctx, target, ClassKind::Vertex)?;
    let batch = batch.or(Some(ctx.session().config().default_delete_batch_size));
    let deleted = run_batched(ctx, batch, targets, |ctx, rid| ctx.session().delete_vertex(rid))?;
    Ok(vec![count_row(deleted)])
}

pub(crate) fn delete_edge(
    ctx: &mut CommandContext,
    target: &DeleteTarget,
    batch: Option<usize>,
) -> Result<Vec<Row>, QuiverError> {
    let targets = resolve_targets(ctx, target, ClassKind::Edge)?;
    let batch = batch.or(Some(ctx.session().config().default_delete_batch_size));
    let deleted = run_batched(ctx, batch, targets, |ctx, rid| ctx.session().delete_edge(rid))?;
    Ok(vec![count_row(deleted)])
}

/// Resolves a delete target clause to the rid list it names. Class targets
/// must be of the expected graph kind; rid lists and subquery rows are
/// checked later by the per-record delete itself.
fn resolve_targets(
    ctx: &mut CommandContext,
    target: &DeleteTarget,
    expected: ClassKind,
) -> Result<Vec<Rid>, QuiverError> {
    match target {
        DeleteTarget::Class(name) => {
            let clusters = ctx.session().with_schema(|schema| {
                let class = schema.require_class(name)?;
                if class.kind != expected {
                    return Err(QuiverError::Execution(format!(
                        "class '{name}' is {:?}, not {expected:?}",
                        class.kind
                    )));
                }
                Ok(schema.polymorphic_clusters(name))
            })?;
            let mut rids = Vec::new();
            for cluster in clusters {
                rids.extend(ctx.session().cluster_rids(cluster)?);
            }
            Ok(rids)
        }
        DeleteTarget::Rids(rids) => Ok(rids.clone()),
        DeleteTarget::Subquery(stmt) => {
            let rows = super::materialize(ctx, stmt)?;
            Ok(rows.iter().filter_map(Row::rid).collect())
        }
    }
}

/// Deletes the targets, committing a checkpoint every `batch` removals so a
/// later failure cannot take already-committed batches with it.
///
/// When the caller already holds a transaction the deletions join it and no
/// checkpoints are taken; committing here would publish the caller's
/// unrelated writes.
fn run_batched(
    ctx: &mut CommandContext,
    batch: Option<usize>,
    targets: Vec<Rid>,
    mut delete: impl FnMut(&CommandContext, Rid) -> Result<bool, QuiverError>,
) -> Result<u64, QuiverError> {
    let caller_owns_tx = ctx.session().transaction_active();
    let checkpoint = if caller_owns_tx { None } else { batch.filter(|n| *n > 0) };

    if checkpoint.is_some() {
        ctx.session().begin()?;
    }
    let mut deleted = 0u64;
    let mut in_batch = 0usize;
    for rid in targets {
        ctx.tick();
        let outcome = ctx.check_timeout().and_then(|()| delete(ctx, rid));
        match outcome {
            Ok(true) => {
                deleted += 1;
                in_batch += 1;
            }
            Ok(false) => {}
            Err(e) => {
                if checkpoint.is_some() {
                    // committed batches stay; only the open one unwinds
                    ctx.session().rollback()?;
                }
                return Err(e);
            }
        }
        if let Some(n) = checkpoint {
            if in_batch >= n {
                log::debug!("delete checkpoint after {deleted} removals");
                ctx.session().commit()?;
                ctx.session().begin()?;
                in_batch = 0;
            }
        }
    }
    if checkpoint.is_some() {
        ctx.session().commit()?;
    }
    Ok(deleted)
}
