// src/core/query/executor/steps/distinct.rs

use crate::core::common::QuiverError;
use crate::core::query::executor::context::CommandContext;
use crate::core::query::executor::plan::{ExecutionStep, StepBase};
use crate::core::query::executor::result::Row;
use crate::core::query::executor::stream::{exhausted, ExecutionStream};
use crate::core::types::Value;
use std::collections::HashSet;
use std::time::Duration;

/// Suppresses rows whose full property set duplicates a previously emitted
/// row. First-occurrence order is preserved; the fingerprint buffer lives for
/// the statement's duration.
pub struct DistinctExecutionStep {
    base: StepBase,
}

impl DistinctExecutionStep {
    #[must_use]
    pub fn new() -> Self {
        Self { base: StepBase::new() }
    }
}

impl Default for DistinctExecutionStep {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionStep for DistinctExecutionStep {
    fn set_previous(&mut self, step: Box<dyn ExecutionStep>) {
        self.base.set_previous(step);
    }

    fn start(&mut self, ctx: &mut CommandContext) -> Result<Box<dyn ExecutionStream>, QuiverError> {
        self.base.mark_started("DistinctExecutionStep")?;
        let upstream = self.base.start_previous(ctx)?;
        Ok(self.base.timed(Box::new(DistinctStream {
            upstream,
            seen: HashSet::new(),
            pending: None,
            exhausted: false,
        })))
    }

    fn describe(&self) -> String {
        "DISTINCT".to_string()
    }

    fn previous(&self) -> Option<&dyn ExecutionStep> {
        self.base.previous()
    }

    fn elapsed(&self) -> Duration {
        self.base.cost().elapsed()
    }
}

struct DistinctStream {
    upstream: Box<dyn ExecutionStream>,
    seen: HashSet<Vec<(String, Value)>>,
    pending: Option<Row>,
    exhausted: bool,
}

impl DistinctStream {
    /// Advances the upstream until the next not-yet-seen row is buffered.
    fn fill_pending(&mut self, ctx: &mut CommandContext) -> Result<(), QuiverError> {
        while self.pending.is_none() && !self.exhausted {
            if !self.upstream.has_next(ctx)? {
                self.exhausted = true;
                break;
            }
            let row = self.upstream.next(ctx)?;
            ctx.tick();
            if self.seen.insert(row.fingerprint()) {
                self.pending = Some(row);
            }
        }
        Ok(())
    }
}

impl ExecutionStream for DistinctStream {
    fn has_next(&mut self, ctx: &mut CommandContext) -> Result<bool, QuiverError> {
        self.fill_pending(ctx)?;
        Ok(self.pending.is_some())
    }

    fn next(&mut self, ctx: &mut CommandContext) -> Result<Row, QuiverError> {
        self.fill_pending(ctx)?;
        self.pending.take().ok_or_else(exhausted)
    }

    fn close(&mut self, ctx: &mut CommandContext) {
        self.upstream.close(ctx);
        self.seen.clear();
        self.pending = None;
        self.exhausted = true;
    }
}
