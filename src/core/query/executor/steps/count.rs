// src/core/query/executor/steps/count.rs

use crate::core::common::QuiverError;
use crate::core::index::IndexCountKind;
use crate::core::query::executor::context::CommandContext;
use crate::core::query::executor::plan::{ExecutionStep, StepBase};
use crate::core::query::executor::result::Row;
use crate::core::query::executor::stream::{ExecutionStream, ResultIteratorStream};
use crate::core::types::Value;
use std::time::Duration;

const TIMEOUT_CHECK_INTERVAL: u64 = 64;

/// Blocking aggregate: drains the whole upstream and emits exactly one row
/// whose `count` property is the number of upstream rows.
pub struct CountStep {
    base: StepBase,
}

impl CountStep {
    #[must_use]
    pub fn new() -> Self {
        Self { base: StepBase::new() }
    }
}

impl Default for CountStep {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionStep for CountStep {
    fn set_previous(&mut self, step: Box<dyn ExecutionStep>) {
        self.base.set_previous(step);
    }

    fn start(&mut self, ctx: &mut CommandContext) -> Result<Box<dyn ExecutionStream>, QuiverError> {
        self.base.mark_started("CountStep")?;
        let mut upstream = self.base.start_previous(ctx)?;
        let mut count: i64 = 0;
        // terminal operator: consumes all input before yielding
        let drained = (|| -> Result<(), QuiverError> {
            while upstream.has_next(ctx)? {
                upstream.next(ctx)?;
                count = count.wrapping_add(1);
                if ctx.tick() % TIMEOUT_CHECK_INTERVAL == 0 {
                    ctx.check_timeout()?;
                }
            }
            Ok(())
        })();
        upstream.close(ctx);
        drained?;
        let row = Row::report("count", Value::Integer(count));
        Ok(self.base.timed(Box::new(ResultIteratorStream::new(vec![row]))))
    }

    fn describe(&self) -> String {
        "COUNT".to_string()
    }

    fn previous(&self) -> Option<&dyn ExecutionStep> {
        self.base.previous()
    }

    fn elapsed(&self) -> Duration {
        self.base.cost().elapsed()
    }
}

/// Counts a class's records from catalog metadata without materializing
/// rows: the sum of the sizes of every cluster owned by the class and its
/// subclasses, which reflects writes already applied in the active
/// transaction.
pub struct CountFromClassStep {
    base: StepBase,
    class_name: String,
}

impl CountFromClassStep {
    #[must_use]
    pub fn new(class_name: &str) -> Self {
        Self { base: StepBase::new(), class_name: class_name.to_string() }
    }
}

impl ExecutionStep for CountFromClassStep {
    fn set_previous(&mut self, step: Box<dyn ExecutionStep>) {
        self.base.set_previous(step);
    }

    fn start(&mut self, ctx: &mut CommandContext) -> Result<Box<dyn ExecutionStream>, QuiverError> {
        self.base.mark_started("CountFromClassStep")?;
        let count = ctx.session().count_class(&self.class_name)?;
        let row = Row::report("count", Value::Integer(i64::try_from(count).unwrap_or(i64::MAX)));
        Ok(self.base.timed(Box::new(ResultIteratorStream::new(vec![row]))))
    }

    fn describe(&self) -> String {
        format!("COUNT FROM CLASS {}", self.class_name)
    }

    fn previous(&self) -> Option<&dyn ExecutionStep> {
        self.base.previous()
    }

    fn elapsed(&self) -> Duration {
        self.base.cost().elapsed()
    }
}

/// Counts index entries from index metadata, walking the whole index or its
/// values in either direction.
pub struct CountFromIndexStep {
    base: StepBase,
    index_name: String,
    kind: IndexCountKind,
}

impl CountFromIndexStep {
    #[must_use]
    pub fn new(index_name: &str, kind: IndexCountKind) -> Self {
        Self { base: StepBase::new(), index_name: index_name.to_string(), kind }
    }
}

impl ExecutionStep for CountFromIndexStep {
    fn set_previous(&mut self, step: Box<dyn ExecutionStep>) {
        self.base.set_previous(step);
    }

    fn start(&mut self, ctx: &mut CommandContext) -> Result<Box<dyn ExecutionStream>, QuiverError> {
        self.base.mark_started("CountFromIndexStep")?;
        let kind = self.kind;
        let count = ctx
            .session()
            .with_indexes(|indexes| Ok(indexes.require_index(&self.index_name)?.count(kind)))?;
        let row = Row::report("count", Value::Integer(i64::try_from(count).unwrap_or(i64::MAX)));
        Ok(self.base.timed(Box::new(ResultIteratorStream::new(vec![row]))))
    }

    fn describe(&self) -> String {
        format!("COUNT FROM INDEX {} ({:?})", self.index_name, self.kind)
    }

    fn previous(&self) -> Option<&dyn ExecutionStep> {
        self.base.previous()
    }

    fn elapsed(&self) -> Duration {
        self.base.cost().elapsed()
    }
}
