// src/core/query/executor/planner.rs

//! Builds physical plans for the plannable statements (SELECT and the delete
//! family's candidate scans). Reporting and DDL statements execute directly
//! in their handlers and never come through here.

use crate::core::common::QuiverError;
use crate::core::query::executor::context::CommandContext;
use crate::core::query::executor::plan::{ExecutionPlan, ExecutionStep};
use crate::core::query::executor::steps::{
    CheckSafeDeleteStep, ConvertToResultInternalStep, CountFromClassStep, CountStep,
    DistinctExecutionStep, FetchFromClassStep, FetchFromRidsStep, FilterStep, LimitStep,
    MissingRidPolicy, ParallelExecStep,
};
use crate::core::query::expression::Expression;
use crate::core::query::statements::SelectStatement;

pub(crate) fn plan_select(
    ctx: &CommandContext,
    select: &SelectStatement,
) -> Result<ExecutionPlan, QuiverError> {
    // catalog fast path: no rows need to flow at all
    if select.count
        && select.filter.is_none()
        && !select.distinct
        && select.limit.is_none()
        && !select.parallel
    {
        return Ok(ExecutionPlan::from_steps(vec![Box::new(CountFromClassStep::new(
            &select.class,
        ))]));
    }

    let mut steps: Vec<Box<dyn ExecutionStep>> = Vec::new();
    steps.push(scan_step(ctx, &select.class, select.parallel)?);
    if let Some(filter) = &select.filter {
        steps.push(Box::new(FilterStep::new(filter.clone())));
    }
    if select.distinct {
        steps.push(Box::new(DistinctExecutionStep::new()));
    }
    if select.count {
        steps.push(Box::new(CountStep::new()));
    }
    if let Some(limit) = select.limit {
        steps.push(Box::new(LimitStep::new(limit)));
    }
    steps.push(Box::new(ConvertToResultInternalStep::new()));
    Ok(ExecutionPlan::from_steps(steps))
}

/// Candidate scan for plain DELETE: class scan, optional filter, then the
/// safe-delete gate so no graph element reaches the deleting handler.
pub(crate) fn plan_delete_candidates(
    class: &str,
    filter: Option<&Expression>,
) -> ExecutionPlan {
    let mut steps: Vec<Box<dyn ExecutionStep>> =
        vec![Box::new(FetchFromClassStep::new(class))];
    if let Some(filter) = filter {
        steps.push(Box::new(FilterStep::new(filter.clone())));
    }
    steps.push(Box::new(CheckSafeDeleteStep::new()));
    ExecutionPlan::from_steps(steps)
}

/// Leaf scan over a class. `parallel` splits it into one sub-plan per owned
/// cluster, fanned out by [`ParallelExecStep`]; the rid snapshots are taken
/// at plan time.
fn scan_step(
    ctx: &CommandContext,
    class: &str,
    parallel: bool,
) -> Result<Box<dyn ExecutionStep>, QuiverError> {
    if !parallel {
        return Ok(Box::new(FetchFromClassStep::new(class)));
    }
    let clusters = ctx.session().with_schema(|schema| {
        schema.require_class(class)?;
        Ok(schema.polymorphic_clusters(class))
    })?;
    let mut sub_plans = Vec::with_capacity(clusters.len());
    for cluster in clusters {
        let rids = ctx.session().cluster_rids(cluster)?;
        sub_plans.push(ExecutionPlan::from_steps(vec![Box::new(FetchFromRidsStep::new(
            rids,
            MissingRidPolicy::Skip,
        ))]));
    }
    Ok(Box::new(ParallelExecStep::new(sub_plans)))
}
