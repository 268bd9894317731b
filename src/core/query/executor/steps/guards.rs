// src/core/query/executor/steps/guards.rs

//! Gate steps: validate every upstream row and either forward all of them
//! unchanged or fail the whole pipeline. A gate validates its complete input
//! before forwarding the first row, so no row leaks past a failed gate.

use crate::core::common::QuiverError;
use crate::core::query::executor::context::CommandContext;
use crate::core::query::executor::plan::{ExecutionStep, StepBase};
use crate::core::query::executor::result::Row;
use crate::core::query::executor::stream::{exhausted, ExecutionStream};
use std::collections::VecDeque;
use std::time::Duration;

type RowCheck = Box<dyn Fn(&mut CommandContext, &Row) -> Result<(), QuiverError> + Send>;

struct GateStream {
    upstream: Option<Box<dyn ExecutionStream>>,
    check: RowCheck,
    validated: Option<VecDeque<Row>>,
}

impl GateStream {
    /// Drains and validates the upstream on first pull. Binding stays lazy;
    /// validation is all-or-nothing.
    fn ensure_validated(&mut self, ctx: &mut CommandContext) -> Result<(), QuiverError> {
        if self.validated.is_some() {
            return Ok(());
        }
        let mut rows = VecDeque::new();
        if let Some(mut upstream) = self.upstream.take() {
            let outcome = (|| -> Result<(), QuiverError> {
                while upstream.has_next(ctx)? {
                    let row = upstream.next(ctx)?;
                    ctx.tick();
                    (self.check)(ctx, &row)?;
                    rows.push_back(row);
                }
                Ok(())
            })();
            upstream.close(ctx);
            outcome?;
        }
        self.validated = Some(rows);
        Ok(())
    }
}

impl ExecutionStream for GateStream {
    fn has_next(&mut self, ctx: &mut CommandContext) -> Result<bool, QuiverError> {
        self.ensure_validated(ctx)?;
        Ok(self.validated.as_ref().is_some_and(|rows| !rows.is_empty()))
    }

    fn next(&mut self, ctx: &mut CommandContext) -> Result<Row, QuiverError> {
        self.ensure_validated(ctx)?;
        self.validated.as_mut().and_then(VecDeque::pop_front).ok_or_else(exhausted)
    }

    fn close(&mut self, ctx: &mut CommandContext) {
        if let Some(mut upstream) = self.upstream.take() {
            upstream.close(ctx);
        }
        self.validated = Some(VecDeque::new());
    }
}

/// Validates that every upstream row's class is the target class or (when
/// subclasses are accepted) a declared subclass of it.
pub struct CheckClassTypeStep {
    base: StepBase,
    target_class: String,
    accept_subclasses: bool,
}

impl CheckClassTypeStep {
    #[must_use]
    pub fn new(target_class: &str, accept_subclasses: bool) -> Self {
        Self {
            base: StepBase::new(),
            target_class: target_class.to_string(),
            accept_subclasses,
        }
    }
}

impl ExecutionStep for CheckClassTypeStep {
    fn set_previous(&mut self, step: Box<dyn ExecutionStep>) {
        self.base.set_previous(step);
    }

    fn start(&mut self, ctx: &mut CommandContext) -> Result<Box<dyn ExecutionStream>, QuiverError> {
        self.base.mark_started("CheckClassTypeStep")?;
        let upstream = self.base.start_previous(ctx)?;
        let target = self.target_class.clone();
        let accept_subclasses = self.accept_subclasses;
        let check: RowCheck = Box::new(move |ctx, row| {
            let Some(class_name) = row.class_name().map(str::to_string) else {
                return Err(QuiverError::Execution(format!(
                    "row without a class cannot satisfy a type check on '{target}'"
                )));
            };
            let matches = if accept_subclasses {
                ctx.session()
                    .with_schema(|schema| Ok(schema.is_same_or_subclass(&class_name, &target)))?
            } else {
                class_name == target
            };
            if matches {
                Ok(())
            } else {
                Err(QuiverError::Execution(format!(
                    "record of class '{class_name}' is not of the expected class '{target}'"
                )))
            }
        });
        Ok(self.base.timed(Box::new(GateStream { upstream: Some(upstream), check, validated: None })))
    }

    fn describe(&self) -> String {
        if self.accept_subclasses {
            format!("CHECK CLASS TYPE {} (subclasses allowed)", self.target_class)
        } else {
            format!("CHECK CLASS TYPE {} (exact)", self.target_class)
        }
    }

    fn previous(&self) -> Option<&dyn ExecutionStep> {
        self.base.previous()
    }

    fn elapsed(&self) -> Duration {
        self.base.cost().elapsed()
    }
}

/// Validates that every upstream row's rid lives in a cluster owned by the
/// expected class (or one of its subclasses).
pub struct CheckClusterTypeStep {
    base: StepBase,
    class_name: String,
}

impl CheckClusterTypeStep {
    #[must_use]
    pub fn new(class_name: &str) -> Self {
        Self { base: StepBase::new(), class_name: class_name.to_string() }
    }
}

impl ExecutionStep for CheckClusterTypeStep {
    fn set_previous(&mut self, step: Box<dyn ExecutionStep>) {
        self.base.set_previous(step);
    }

    fn start(&mut self, ctx: &mut CommandContext) -> Result<Box<dyn ExecutionStream>, QuiverError> {
        self.base.mark_started("CheckClusterTypeStep")?;
        let upstream = self.base.start_previous(ctx)?;
        let class_name = self.class_name.clone();
        let clusters = ctx.session().with_schema(|schema| {
            schema.require_class(&class_name)?;
            Ok(schema.polymorphic_clusters(&class_name))
        })?;
        let check: RowCheck = Box::new(move |_ctx, row| {
            let Some(rid) = row.rid() else {
                return Err(QuiverError::Execution(format!(
                    "row without a record id cannot satisfy a cluster check on '{class_name}'"
                )));
            };
            if clusters.contains(&rid.cluster) {
                Ok(())
            } else {
                Err(QuiverError::Execution(format!(
                    "record {rid} is not stored in a cluster owned by class '{class_name}'"
                )))
            }
        });
        Ok(self.base.timed(Box::new(GateStream { upstream: Some(upstream), check, validated: None })))
    }

    fn describe(&self) -> String {
        format!("CHECK CLUSTER TYPE {}", self.class_name)
    }

    fn previous(&self) -> Option<&dyn ExecutionStep> {
        self.base.previous()
    }

    fn elapsed(&self) -> Duration {
        self.base.cost().elapsed()
    }
}

/// Refuses to let vertex- or edge-typed rows reach a plain record delete:
/// graph elements must go through the graph-aware delete path, otherwise
/// connected vertices would keep dangling edge references.
pub struct CheckSafeDeleteStep {
    base: StepBase,
}

impl CheckSafeDeleteStep {
    #[must_use]
    pub fn new() -> Self {
        Self { base: StepBase::new() }
    }
}

impl Default for CheckSafeDeleteStep {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionStep for CheckSafeDeleteStep {
    fn set_previous(&mut self, step: Box<dyn ExecutionStep>) {
        self.base.set_previous(step);
    }

    fn start(&mut self, ctx: &mut CommandContext) -> Result<Box<dyn ExecutionStream>, QuiverError> {
        self.base.mark_started("CheckSafeDeleteStep")?;
        let upstream = self.base.start_previous(ctx)?;
        let check: RowCheck = Box::new(|_ctx, row| match row.kind() {
            Some(crate::core::schema::ClassKind::Vertex) => Err(QuiverError::Execution(format!(
                "cannot delete vertex {} as a plain record, use DELETE VERTEX",
                row.rid().map_or_else(|| "?".to_string(), |r| r.to_string())
            ))),
            Some(crate::core::schema::ClassKind::Edge) => Err(QuiverError::Execution(format!(
                "cannot delete edge {} as a plain record, use DELETE EDGE",
                row.rid().map_or_else(|| "?".to_string(), |r| r.to_string())
            ))),
            _ => Ok(()),
        });
        Ok(self.base.timed(Box::new(GateStream { upstream: Some(upstream), check, validated: None })))
    }

    fn describe(&self) -> String {
        "CHECK SAFE DELETE".to_string()
    }

    fn previous(&self) -> Option<&dyn ExecutionStep> {
        self.base.previous()
    }

    fn elapsed(&self) -> Duration {
        self.base.cost().elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::common::types::{ClusterId, Rid};
    use crate::core::config::Config;
    use crate::core::query::executor::steps::tests_support::produce;
    use crate::core::schema::ClassKind;
    use crate::core::session::DatabaseSession;
    use crate::core::storage::Record;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn graph_session() -> Arc<DatabaseSession> {
        let session = DatabaseSession::new(Config::default());
        session
            .with_schema_mut(|schema| {
                schema.create_class("V", ClassKind::Vertex, true, None, 0)?;
                schema.create_class("Person", ClassKind::Vertex, false, Some("V"), 1)?;
                schema.create_class("Note", ClassKind::Document, false, None, 1)?;
                Ok(())
            })
            .expect("schema");
        Arc::new(session)
    }

    fn record_row(kind: ClassKind, class: &str, rid: Rid) -> Row {
        let record = match kind {
            ClassKind::Vertex => Record::vertex(rid, class, BTreeMap::new()),
            ClassKind::Edge => Record::edge(rid, class, rid, rid, BTreeMap::new()),
            ClassKind::Document => Record::document(rid, class, BTreeMap::new()),
        };
        Row::from_record(&record)
    }

    fn drain(
        step: &mut dyn ExecutionStep,
        ctx: &mut CommandContext,
    ) -> Result<Vec<Row>, QuiverError> {
        let mut stream = step.start(ctx)?;
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

    #[test]
    fn safe_delete_fails_before_forwarding_anything_on_mixed_input() {
        let mut ctx = CommandContext::new(graph_session());
        let rid = Rid::new(ClusterId(9), 0);
        let rows: Vec<Row> = (0..10)
            .map(|i| {
                if i % 2 == 0 {
                    record_row(ClassKind::Document, "Note", rid)
                } else {
                    record_row(ClassKind::Vertex, "Person", rid)
                }
            })
            .collect();
        let mut step = CheckSafeDeleteStep::new();
        step.set_previous(produce(rows));
        let err = drain(&mut step, &mut ctx).unwrap_err();
        assert!(matches!(err, QuiverError::Execution(_)));
    }

    #[test]
    fn safe_delete_forwards_plain_rows_unchanged() {
        let mut ctx = CommandContext::new(graph_session());
        let rid = Rid::new(ClusterId(9), 1);
        let rows: Vec<Row> =
            (0..10).map(|_| record_row(ClassKind::Document, "Note", rid)).collect();
        let mut step = CheckSafeDeleteStep::new();
        step.set_previous(produce(rows.clone()));
        let out = drain(&mut step, &mut ctx).expect("pass");
        assert_eq!(out, rows);
    }

    #[test]
    fn class_type_accepts_exact_and_subclass() {
        let session = graph_session();
        let rid = Rid::new(ClusterId(9), 2);

        let mut ctx = CommandContext::new(Arc::clone(&session));
        let mut step = CheckClassTypeStep::new("V", true);
        step.set_previous(produce(vec![record_row(ClassKind::Vertex, "Person", rid)]));
        assert_eq!(drain(&mut step, &mut ctx).expect("subclass passes").len(), 1);

        let mut ctx = CommandContext::new(Arc::clone(&session));
        let mut step = CheckClassTypeStep::new("V", true);
        step.set_previous(produce(vec![record_row(ClassKind::Document, "Note", rid)]));
        assert!(drain(&mut step, &mut ctx).is_err());
    }

    #[test]
    fn exact_class_check_rejects_subclasses() {
        let mut ctx = CommandContext::new(graph_session());
        let rid = Rid::new(ClusterId(9), 3);
        let mut step = CheckClassTypeStep::new("V", false);
        step.set_previous(produce(vec![record_row(ClassKind::Vertex, "Person", rid)]));
        assert!(drain(&mut step, &mut ctx).is_err());
    }

    #[test]
    fn cluster_check_validates_ownership() {
        let session = graph_session();
        let person_cluster = session
            .with_schema(|schema| Ok(schema.class("Person").map(|c| c.clusters[0])))
            .expect("schema")
            .expect("cluster");

        let mut ctx = CommandContext::new(Arc::clone(&session));
        let mut step = CheckClusterTypeStep::new("Person");
        step.set_previous(produce(vec![record_row(
            ClassKind::Vertex,
            "Person",
            Rid::new(person_cluster, 0),
        )]));
        assert_eq!(drain(&mut step, &mut ctx).expect("owned cluster passes").len(), 1);

        let mut ctx = CommandContext::new(Arc::clone(&session));
        let mut step = CheckClusterTypeStep::new("Person");
        step.set_previous(produce(vec![record_row(
            ClassKind::Vertex,
            "Person",
            Rid::new(ClusterId(999), 0),
        )]));
        assert!(drain(&mut step, &mut ctx).is_err());
    }
}
