// src/core/query/executor/steps/parallel.rs

use crate::core::common::QuiverError;
use crate::core::query::executor::context::CommandContext;
use crate::core::query::executor::plan::{ExecutionPlan, ExecutionStep, StepBase};
use crate::core::query::executor::result::Row;
use crate::core::query::executor::stream::{ExecutionStream, ResultIteratorStream};
use std::fmt::Write as _;
use std::time::Duration;

/// Fan-out operator: owns N independent sub-plans and evaluates them on
/// worker threads, each against a forked context sharing the session,
/// deadline and cancellation flag.
///
/// The merged stream concatenates each sub-plan's complete output in
/// sub-plan declaration order, so every branch's internal row order is
/// preserved. Which branch's rows appear first when branches run
/// concurrently is an implementation detail; callers must not rely on any
/// cross-branch ordering.
pub struct ParallelExecStep {
    base: StepBase,
    sub_plans: Vec<ExecutionPlan>,
}

impl ParallelExecStep {
    #[must_use]
    pub fn new(sub_plans: Vec<ExecutionPlan>) -> Self {
        Self { base: StepBase::new(), sub_plans }
    }
}

impl ExecutionStep for ParallelExecStep {
    fn set_previous(&mut self, step: Box<dyn ExecutionStep>) {
        self.base.set_previous(step);
    }

    fn start(&mut self, ctx: &mut CommandContext) -> Result<Box<dyn ExecutionStream>, QuiverError> {
        self.base.mark_started("ParallelExecStep")?;
        let sub_plans = std::mem::take(&mut self.sub_plans);
        let max_workers = ctx.session().config().parallel_workers.max(1);

        let mut finished: Vec<(usize, ExecutionPlan)> = Vec::with_capacity(sub_plans.len());
        let mut merged: Vec<(usize, Vec<Row>)> = Vec::with_capacity(sub_plans.len());
        let mut queue = sub_plans.into_iter().enumerate().collect::<Vec<_>>();
        let mut first_error = None;
        // run sub-plans in bounded waves; each job fully contributes its
        // output before the merged stream is exposed
        while !queue.is_empty() && first_error.is_none() {
            let wave: Vec<(usize, ExecutionPlan)> =
                queue.drain(..queue.len().min(max_workers)).collect();
            let mut handles = Vec::with_capacity(wave.len());
            for (slot, mut plan) in wave {
                let mut worker_ctx = ctx.fork_for_worker();
                handles.push((
                    slot,
                    std::thread::spawn(
                        move || -> (ExecutionPlan, Result<Vec<Row>, QuiverError>) {
                            let result = (|| -> Result<Vec<Row>, QuiverError> {
                                let mut stream = plan.start(&mut worker_ctx)?;
                                let mut rows = Vec::new();
                                let outcome = (|| -> Result<(), QuiverError> {
                                    while stream.has_next(&mut worker_ctx)? {
                                        rows.push(stream.next(&mut worker_ctx)?);
                                    }
                                    Ok(())
                                })();
                                stream.close(&mut worker_ctx);
                                outcome.map(|()| rows)
                            })();
                            (plan, result)
                        },
                    ),
                ));
            }
            for (slot, handle) in handles {
                match handle.join() {
                    Ok((plan, Ok(rows))) => {
                        finished.push((slot, plan));
                        merged.push((slot, rows));
                    }
                    Ok((plan, Err(e))) => {
                        finished.push((slot, plan));
                        ctx.cancel();
                        first_error.get_or_insert(e);
                    }
                    Err(_) => {
                        ctx.cancel();
                        first_error.get_or_insert_with(|| {
                            QuiverError::Internal("parallel sub-plan worker panicked".to_string())
                        });
                    }
                }
            }
        }

        // hand the sub-plans back so plan rendering stays accurate after
        // execution; never-started branches keep their unprofiled shape
        finished.extend(queue);
        finished.sort_by_key(|(slot, _)| *slot);
        self.sub_plans = finished.into_iter().map(|(_, plan)| plan).collect();

        if let Some(e) = first_error {
            return Err(e);
        }
        merged.sort_by_key(|(slot, _)| *slot);
        let rows: Vec<Row> = merged.into_iter().flat_map(|(_, rows)| rows).collect();
        Ok(self.base.timed(Box::new(ResultIteratorStream::new(rows))))
    }

    fn describe(&self) -> String {
        format!("PARALLEL EXEC ({} sub-plans)", self.sub_plans.len())
    }

    fn previous(&self) -> Option<&dyn ExecutionStep> {
        self.base.previous()
    }

    fn elapsed(&self) -> Duration {
        self.base.cost().elapsed()
    }

    fn pretty_print(&self, indent: usize, profiled: bool) -> String {
        let mut out = String::new();
        if let Some(prev) = self.previous() {
            out.push_str(&prev.pretty_print(indent, profiled));
        }
        let pad = "  ".repeat(indent);
        let _ = write!(out, "{pad}+ {}", self.describe());
        if profiled {
            let _ = write!(
                out,
                " ({})",
                crate::core::query::executor::plan::format_elapsed(self.elapsed())
            );
        }
        out.push('\n');
        for (i, plan) in self.sub_plans.iter().enumerate() {
            let _ = writeln!(out, "{pad}  [branch {i}]");
            let rendered = if profiled { plan.profile_report() } else { plan.pretty_print() };
            for line in rendered.lines() {
                let _ = writeln!(out, "{pad}    {line}");
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::query::executor::steps::fetch::{FetchFromRidsStep, MissingRidPolicy};
    use crate::core::query::executor::steps::tests_support::produce;
    use crate::core::schema::ClassKind;
    use crate::core::session::DatabaseSession;
    use crate::core::types::Value;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn plan_of_rows(rows: Vec<Row>) -> ExecutionPlan {
        ExecutionPlan::from_steps(vec![produce(rows)])
    }

    #[test]
    fn union_is_complete_and_branch_order_is_preserved_within_each_branch() {
        let session = Arc::new(DatabaseSession::new(Config::default()));
        let mut ctx = CommandContext::new(session);

        let branch_a: Vec<Row> =
            (0..5).map(|i| Row::report("a", Value::Integer(i))).collect();
        let branch_b: Vec<Row> =
            (0..3).map(|i| Row::report("b", Value::Integer(i))).collect();
        let mut step =
            ParallelExecStep::new(vec![plan_of_rows(branch_a), plan_of_rows(branch_b)]);

        let mut stream = step.start(&mut ctx).expect("start");
        let mut rows = Vec::new();
        while stream.has_next(&mut ctx).expect("peek") {
            rows.push(stream.next(&mut ctx).expect("row"));
        }
        stream.close(&mut ctx);

        assert_eq!(rows.len(), 8);
        let a_values: Vec<i64> = rows
            .iter()
            .filter_map(|r| match r.property("a") {
                Some(Value::Integer(i)) => Some(*i),
                _ => None,
            })
            .collect();
        let b_values: Vec<i64> = rows
            .iter()
            .filter_map(|r| match r.property("b") {
                Some(Value::Integer(i)) => Some(*i),
                _ => None,
            })
            .collect();
        assert_eq!(a_values, vec![0, 1, 2, 3, 4]);
        assert_eq!(b_values, vec![0, 1, 2]);
    }

    #[test]
    fn plan_rendering_stays_accurate_after_execution() {
        let session = Arc::new(DatabaseSession::new(Config::default()));
        let mut ctx = CommandContext::new(session);
        let mut step = ParallelExecStep::new(vec![
            plan_of_rows(vec![Row::report("a", Value::Integer(1))]),
            plan_of_rows(vec![Row::report("b", Value::Integer(2))]),
        ]);

        let mut stream = step.start(&mut ctx).expect("start");
        while stream.has_next(&mut ctx).expect("peek") {
            stream.next(&mut ctx).expect("row");
        }
        stream.close(&mut ctx);

        assert_eq!(step.describe(), "PARALLEL EXEC (2 sub-plans)");
        let profiled = step.pretty_print(0, true);
        assert!(profiled.contains("[branch 0]"));
        assert!(profiled.contains("[branch 1]"));
    }

    #[test]
    fn multi_cluster_scan_through_parallel_branches() {
        let session = DatabaseSession::new(Config::builder().parallel_workers(2).build());
        session
            .with_schema_mut(|schema| {
                schema.create_class("Person", ClassKind::Document, false, None, 3)?;
                Ok(())
            })
            .expect("schema");
        for i in 0..9 {
            let mut props = BTreeMap::new();
            props.insert("i".to_string(), Value::Integer(i));
            session.insert("Person", props).expect("insert");
        }
        let clusters = session
            .with_schema(|s| Ok(s.polymorphic_clusters("Person")))
            .expect("clusters");
        let session = Arc::new(session);
        let mut total_rids = 0;
        let mut sub_plans = Vec::new();
        for cluster in clusters {
            let rids = session.cluster_rids(cluster).expect("rids");
            total_rids += rids.len();
            sub_plans.push(ExecutionPlan::from_steps(vec![Box::new(FetchFromRidsStep::new(
                rids,
                MissingRidPolicy::Error,
            ))]));
        }
        assert_eq!(total_rids, 9);

        let mut ctx = CommandContext::new(session);
        let mut step = ParallelExecStep::new(sub_plans);
        let mut stream = step.start(&mut ctx).expect("start");
        let mut count = 0;
        while stream.has_next(&mut ctx).expect("peek") {
            stream.next(&mut ctx).expect("row");
            count += 1;
        }
        stream.close(&mut ctx);
        assert_eq!(count, 9);
    }
}
