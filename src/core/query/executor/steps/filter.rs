// src/core/query/executor/steps/filter.rs

use crate::core::common::QuiverError;
use crate::core::query::executor::context::CommandContext;
use crate::core::query::executor::plan::{ExecutionStep, StepBase};
use crate::core::query::executor::result::Row;
use crate::core::query::executor::stream::{exhausted, ExecutionStream};
use crate::core::query::expression::Expression;
use std::time::Duration;

/// Forwards only the upstream rows matching a predicate expression.
pub struct FilterStep {
    base: StepBase,
    predicate: Expression,
}

impl FilterStep {
    #[must_use]
    pub fn new(predicate: Expression) -> Self {
        Self { base: StepBase::new(), predicate }
    }
}

impl ExecutionStep for FilterStep {
    fn set_previous(&mut self, step: Box<dyn ExecutionStep>) {
        self.base.set_previous(step);
    }

    fn start(&mut self, ctx: &mut CommandContext) -> Result<Box<dyn ExecutionStream>, QuiverError> {
        self.base.mark_started("FilterStep")?;
        let upstream = self.base.start_previous(ctx)?;
        Ok(self.base.timed(Box::new(FilterStream {
            upstream,
            predicate: self.predicate.clone(),
            pending: None,
        })))
    }

    fn describe(&self) -> String {
        format!("FILTER {:?}", self.predicate)
    }

    fn previous(&self) -> Option<&dyn ExecutionStep> {
        self.base.previous()
    }

    fn elapsed(&self) -> Duration {
        self.base.cost().elapsed()
    }
}

struct FilterStream {
    upstream: Box<dyn ExecutionStream>,
    predicate: Expression,
    pending: Option<Row>,
}

impl FilterStream {
    fn fill_pending(&mut self, ctx: &mut CommandContext) -> Result<(), QuiverError> {
        while self.pending.is_none() {
            if !self.upstream.has_next(ctx)? {
                return Ok(());
            }
            let row = self.upstream.next(ctx)?;
            ctx.tick();
            if self.predicate.eval_truthy(ctx, Some(&row))? {
                self.pending = Some(row);
            }
        }
        Ok(())
    }
}

impl ExecutionStream for FilterStream {
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
        self.pending = None;
    }
}

/// Forwards at most `limit` upstream rows, then reports exhaustion without
/// pulling further.
pub struct LimitStep {
    base: StepBase,
    limit: usize,
}

impl LimitStep {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self { base: StepBase::new(), limit }
    }
}

impl ExecutionStep for LimitStep {
    fn set_previous(&mut self, step: Box<dyn ExecutionStep>) {
        self.base.set_previous(step);
    }

    fn start(&mut self, ctx: &mut CommandContext) -> Result<Box<dyn ExecutionStream>, QuiverError> {
        self.base.mark_started("LimitStep")?;
        let upstream = self.base.start_previous(ctx)?;
        Ok(self.base.timed(Box::new(LimitStream { upstream, remaining: self.limit })))
    }

    fn describe(&self) -> String {
        format!("LIMIT {}", self.limit)
    }

    fn previous(&self) -> Option<&dyn ExecutionStep> {
        self.base.previous()
    }

    fn elapsed(&self) -> Duration {
        self.base.cost().elapsed()
    }
}

struct LimitStream {
    upstream: Box<dyn ExecutionStream>,
    remaining: usize,
}

impl ExecutionStream for LimitStream {
    fn has_next(&mut self, ctx: &mut CommandContext) -> Result<bool, QuiverError> {
        if self.remaining == 0 {
            return Ok(false);
        }
        self.upstream.has_next(ctx)
    }

    fn next(&mut self, ctx: &mut CommandContext) -> Result<Row, QuiverError> {
        if self.remaining == 0 {
            return Err(exhausted());
        }
        let row = self.upstream.next(ctx)?;
        self.remaining -= 1;
        Ok(row)
    }

    fn close(&mut self, ctx: &mut CommandContext) {
        self.upstream.close(ctx);
        self.remaining = 0;
    }
}
