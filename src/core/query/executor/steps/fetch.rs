// src/core/query/executor/steps/fetch.rs

use crate::core::common::types::{ClusterId, Rid};
use crate::core::common::QuiverError;
use crate::core::query::executor::context::CommandContext;
use crate::core::query::executor::plan::{ExecutionStep, StepBase};
use crate::core::query::executor::result::Row;
use crate::core::query::executor::stream::{exhausted, ExecutionStream};
use std::collections::VecDeque;
use std::time::Duration;

const TIMEOUT_CHECK_INTERVAL: u64 = 64;

/// What a rid-based fetch does when a rid no longer resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingRidPolicy {
    Skip,
    Error,
}

/// Leaf producer: yields the records behind a fixed rid list, in list order.
pub struct FetchFromRidsStep {
    base: StepBase,
    rids: Vec<Rid>,
    total: usize,
    missing: MissingRidPolicy,
}

impl FetchFromRidsStep {
    #[must_use]
    pub fn new(rids: Vec<Rid>, missing: MissingRidPolicy) -> Self {
        let total = rids.len();
        Self { base: StepBase::new(), rids, total, missing }
    }
}

impl ExecutionStep for FetchFromRidsStep {
    fn set_previous(&mut self, step: Box<dyn ExecutionStep>) {
        self.base.set_previous(step);
    }

    fn start(&mut self, ctx: &mut CommandContext) -> Result<Box<dyn ExecutionStream>, QuiverError> {
        self.base.mark_started("FetchFromRidsStep")?;
        let _ = ctx;
        let rids = std::mem::take(&mut self.rids);
        Ok(self.base.timed(Box::new(RidStream {
            rids: rids.into(),
            missing: self.missing,
            pending: None,
        })))
    }

    fn describe(&self) -> String {
        format!("FETCH FROM RIDS ({} rids)", self.total)
    }

    fn previous(&self) -> Option<&dyn ExecutionStep> {
        self.base.previous()
    }

    fn elapsed(&self) -> Duration {
        self.base.cost().elapsed()
    }
}

struct RidStream {
    rids: VecDeque<Rid>,
    missing: MissingRidPolicy,
    pending: Option<Row>,
}

impl RidStream {
    fn fill_pending(&mut self, ctx: &mut CommandContext) -> Result<(), QuiverError> {
        while self.pending.is_none() {
            let Some(rid) = self.rids.pop_front() else {
                return Ok(());
            };
            ctx.tick();
            match ctx.session().fetch(rid)? {
                Some(record) => self.pending = Some(Row::from_record(&record)),
                None => match self.missing {
                    MissingRidPolicy::Skip => {}
                    MissingRidPolicy::Error => {
                        return Err(QuiverError::NotFound(format!("record {rid}")));
                    }
                },
            }
        }
        Ok(())
    }
}

impl ExecutionStream for RidStream {
    fn has_next(&mut self, ctx: &mut CommandContext) -> Result<bool, QuiverError> {
        self.fill_pending(ctx)?;
        Ok(self.pending.is_some())
    }

    fn next(&mut self, ctx: &mut CommandContext) -> Result<Row, QuiverError> {
        self.fill_pending(ctx)?;
        self.pending.take().ok_or_else(exhausted)
    }

    fn close(&mut self, _ctx: &mut CommandContext) {
        self.rids.clear();
        self.pending = None;
    }
}

/// Leaf producer: scans every cluster owned by a class and its subclasses,
/// cluster by cluster, checking the context's time budget periodically.
pub struct FetchFromClassStep {
    base: StepBase,
    class_name: String,
}

impl FetchFromClassStep {
    #[must_use]
    pub fn new(class_name: &str) -> Self {
        Self { base: StepBase::new(), class_name: class_name.to_string() }
    }
}

impl ExecutionStep for FetchFromClassStep {
    fn set_previous(&mut self, step: Box<dyn ExecutionStep>) {
        self.base.set_previous(step);
    }

    fn start(&mut self, ctx: &mut CommandContext) -> Result<Box<dyn ExecutionStream>, QuiverError> {
        self.base.mark_started("FetchFromClassStep")?;
        let clusters = ctx.session().with_schema(|schema| {
            schema.require_class(&self.class_name)?;
            Ok(schema.polymorphic_clusters(&self.class_name))
        })?;
        Ok(self.base.timed(Box::new(ClusterScanStream {
            clusters: clusters.into(),
            current: VecDeque::new(),
            pending: None,
        })))
    }

    fn describe(&self) -> String {
        format!("FETCH FROM CLASS {}", self.class_name)
    }

    fn previous(&self) -> Option<&dyn ExecutionStep> {
        self.base.previous()
    }

    fn elapsed(&self) -> Duration {
        self.base.cost().elapsed()
    }
}

struct ClusterScanStream {
    clusters: VecDeque<ClusterId>,
    current: VecDeque<Rid>,
    pending: Option<Row>,
}

impl ClusterScanStream {
    fn fill_pending(&mut self, ctx: &mut CommandContext) -> Result<(), QuiverError> {
        while self.pending.is_none() {
            if let Some(rid) = self.current.pop_front() {
                if ctx.tick() % TIMEOUT_CHECK_INTERVAL == 0 {
                    ctx.check_timeout()?;
                }
                // a rid snapshot can outlive the record, skip holes
                if let Some(record) = ctx.session().fetch(rid)? {
                    self.pending = Some(Row::from_record(&record));
                }
                continue;
            }
            let Some(cluster) = self.clusters.pop_front() else {
                return Ok(());
            };
            self.current = ctx.session().cluster_rids(cluster)?.into();
        }
        Ok(())
    }
}

impl ExecutionStream for ClusterScanStream {
    fn has_next(&mut self, ctx: &mut CommandContext) -> Result<bool, QuiverError> {
        self.fill_pending(ctx)?;
        Ok(self.pending.is_some())
    }

    fn next(&mut self, ctx: &mut CommandContext) -> Result<Row, QuiverError> {
        self.fill_pending(ctx)?;
        self.pending.take().ok_or_else(exhausted)
    }

    fn close(&mut self, _ctx: &mut CommandContext) {
        self.clusters.clear();
        self.current.clear();
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::schema::ClassKind;
    use crate::core::session::DatabaseSession;
    use crate::core::types::Value;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn session_with_people(n: usize) -> Arc<DatabaseSession> {
        let session = DatabaseSession::new(Config::default());
        session
            .with_schema_mut(|schema| {
                schema.create_class("Person", ClassKind::Document, false, None, 1)?;
                Ok(())
            })
            .expect("schema");
        for i in 0..n {
            let mut props = BTreeMap::new();
            props.insert("n".to_string(), Value::Integer(i as i64));
            session.insert("Person", props).expect("insert");
        }
        Arc::new(session)
    }

    fn drain(step: &mut dyn ExecutionStep, ctx: &mut CommandContext) -> Vec<Row> {
        let mut stream = step.start(ctx).expect("start");
        let mut rows = Vec::new();
        while stream.has_next(ctx).expect("peek") {
            rows.push(stream.next(ctx).expect("row"));
        }
        stream.close(ctx);
        rows
    }

    #[test]
    fn fetch_from_rids_preserves_list_order() {
        let session = session_with_people(3);
        let cluster = session
            .with_schema(|s| Ok(s.class("Person").map(|c| c.clusters[0])))
            .expect("schema")
            .expect("cluster");
        let mut ctx = CommandContext::new(session);
        let rids = vec![Rid::new(cluster, 2), Rid::new(cluster, 0)];
        let mut step = FetchFromRidsStep::new(rids, MissingRidPolicy::Error);
        let rows = drain(&mut step, &mut ctx);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].property("n"), Some(&Value::Integer(2)));
        assert_eq!(rows[1].property("n"), Some(&Value::Integer(0)));
    }

    #[test]
    fn missing_rid_policy_controls_skip_versus_error() {
        let session = session_with_people(1);
        let cluster = session
            .with_schema(|s| Ok(s.class("Person").map(|c| c.clusters[0])))
            .expect("schema")
            .expect("cluster");
        let missing = Rid::new(cluster, 99);

        let mut ctx = CommandContext::new(Arc::clone(&session));
        let mut step =
            FetchFromRidsStep::new(vec![missing, Rid::new(cluster, 0)], MissingRidPolicy::Skip);
        assert_eq!(drain(&mut step, &mut ctx).len(), 1);

        let mut ctx = CommandContext::new(session);
        let mut step = FetchFromRidsStep::new(vec![missing], MissingRidPolicy::Error);
        let mut stream = step.start(&mut ctx).expect("start");
        assert!(matches!(stream.has_next(&mut ctx), Err(QuiverError::NotFound(_))));
        stream.close(&mut ctx);
    }

    #[test]
    fn class_scan_covers_late_added_clusters() {
        let session = session_with_people(2);
        session
            .with_schema_mut(|schema| {
                schema.add_cluster("Person")?;
                Ok(())
            })
            .expect("add cluster");
        let late = session
            .with_schema(|s| Ok(s.class("Person").map(|c| *c.clusters.last().expect("cluster"))))
            .expect("schema")
            .expect("cluster");
        // place a record directly in the late cluster through the session API
        let mut props = BTreeMap::new();
        props.insert("n".to_string(), Value::Integer(99));
        let record =
            crate::core::storage::Record::document(Rid::new(late, 0), "Person", props);
        session.save(record).expect("save");

        let mut ctx = CommandContext::new(session);
        let mut step = FetchFromClassStep::new("Person");
        let rows = drain(&mut step, &mut ctx);
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn scan_times_out_against_a_tiny_budget() {
        let config = Config::builder().query_timeout_ms(1).build();
        let session = DatabaseSession::new(config);
        session
            .with_schema_mut(|schema| {
                schema.create_class("Person", ClassKind::Document, false, None, 1)?;
                Ok(())
            })
            .expect("schema");
        for _ in 0..10_000 {
            session.insert("Person", BTreeMap::new()).expect("insert");
        }
        let mut ctx = CommandContext::new(Arc::new(session));
        std::thread::sleep(std::time::Duration::from_millis(5));
        let mut step = FetchFromClassStep::new("Person");
        let mut stream = step.start(&mut ctx).expect("start");
        let mut outcome = Ok(());
        loop {
            match stream.has_next(&mut ctx) {
                Ok(true) => {
                    if let Err(e) = stream.next(&mut ctx) {
                        outcome = Err(e);
                        break;
                    }
                }
                Ok(false) => break,
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }
        stream.close(&mut ctx);
        assert!(matches!(outcome, Err(QuiverError::Timeout(_))));
    }
}
