// src/core/query/executor/steps/convert.rs

use crate::core::common::QuiverError;
use crate::core::query::executor::context::CommandContext;
use crate::core::query::executor::plan::{ExecutionStep, StepBase};
use crate::core::query::executor::result::Row;
use crate::core::query::executor::stream::ExecutionStream;
use std::time::Duration;

/// Re-wraps each upstream row as a plain immutable snapshot. Property values
/// are preserved exactly; pending write-throughs stay visible in the
/// snapshot.
pub struct ConvertToResultInternalStep {
    base: StepBase,
}

impl ConvertToResultInternalStep {
    #[must_use]
    pub fn new() -> Self {
        Self { base: StepBase::new() }
    }
}

impl Default for ConvertToResultInternalStep {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionStep for ConvertToResultInternalStep {
    fn set_previous(&mut self, step: Box<dyn ExecutionStep>) {
        self.base.set_previous(step);
    }

    fn start(&mut self, ctx: &mut CommandContext) -> Result<Box<dyn ExecutionStream>, QuiverError> {
        self.base.mark_started("ConvertToResultInternalStep")?;
        let upstream = self.base.start_previous(ctx)?;
        Ok(self.base.timed(Box::new(ConvertStream { upstream, to_updatable: false })))
    }

    fn describe(&self) -> String {
        "CONVERT TO SNAPSHOT ROW".to_string()
    }

    fn previous(&self) -> Option<&dyn ExecutionStep> {
        self.base.previous()
    }

    fn elapsed(&self) -> Duration {
        self.base.cost().elapsed()
    }
}

/// Re-wraps each upstream row as a live, updatable view over the same
/// underlying entity. Rows without a backing entity pass through unchanged.
pub struct ConvertToUpdatableResultStep {
    base: StepBase,
}

impl ConvertToUpdatableResultStep {
    #[must_use]
    pub fn new() -> Self {
        Self { base: StepBase::new() }
    }
}

impl Default for ConvertToUpdatableResultStep {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionStep for ConvertToUpdatableResultStep {
    fn set_previous(&mut self, step: Box<dyn ExecutionStep>) {
        self.base.set_previous(step);
    }

    fn start(&mut self, ctx: &mut CommandContext) -> Result<Box<dyn ExecutionStream>, QuiverError> {
        self.base.mark_started("ConvertToUpdatableResultStep")?;
        let upstream = self.base.start_previous(ctx)?;
        Ok(self.base.timed(Box::new(ConvertStream { upstream, to_updatable: true })))
    }

    fn describe(&self) -> String {
        "CONVERT TO UPDATABLE ROW".to_string()
    }

    fn previous(&self) -> Option<&dyn ExecutionStep> {
        self.base.previous()
    }

    fn elapsed(&self) -> Duration {
        self.base.cost().elapsed()
    }
}

struct ConvertStream {
    upstream: Box<dyn ExecutionStream>,
    to_updatable: bool,
}

impl ExecutionStream for ConvertStream {
    fn has_next(&mut self, ctx: &mut CommandContext) -> Result<bool, QuiverError> {
        self.upstream.has_next(ctx)
    }

    fn next(&mut self, ctx: &mut CommandContext) -> Result<Row, QuiverError> {
        let row = self.upstream.next(ctx)?;
        ctx.tick();
        if self.to_updatable {
            row.into_updatable(ctx)
        } else {
            Ok(row.into_snapshot())
        }
    }

    fn close(&mut self, ctx: &mut CommandContext) {
        self.upstream.close(ctx);
    }
}
