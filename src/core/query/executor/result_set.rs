// src/core/query/executor/result_set.rs

use crate::core::common::QuiverError;
use crate::core::query::executor::context::CommandContext;
use crate::core::query::executor::plan::ExecutionPlan;
use crate::core::query::executor::result::Row;
use crate::core::query::executor::stream::{ExecutionStream, ResultIteratorStream};

/// Public cursor over one executed statement.
///
/// Owns the statement's context and outermost stream. `close` releases both
/// and is idempotent; dropping an unclosed set closes it. When the statement
/// went through the planner the plan is retained for EXPLAIN/PROFILE
/// introspection after consumption.
pub struct ResultSet {
    ctx: CommandContext,
    stream: Box<dyn ExecutionStream>,
    plan: Option<ExecutionPlan>,
    closed: bool,
}

impl std::fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet").field("closed", &self.closed).finish_non_exhaustive()
    }
}

impl ResultSet {
    /// Starts `plan` and wraps its outermost stream.
    pub(crate) fn from_plan(
        mut ctx: CommandContext,
        mut plan: ExecutionPlan,
    ) -> Result<Self, QuiverError> {
        let stream = plan.start(&mut ctx)?;
        Ok(Self { ctx, stream, plan: Some(plan), closed: false })
    }

    /// Pre-computed rows, used by reporting statements with no plan.
    pub(crate) fn materialized(ctx: CommandContext, rows: Vec<Row>) -> Self {
        Self { ctx, stream: Box::new(ResultIteratorStream::new(rows)), plan: None, closed: false }
    }

    pub fn has_next(&mut self) -> Result<bool, QuiverError> {
        if self.closed {
            return Ok(false);
        }
        self.stream.has_next(&mut self.ctx)
    }

    pub fn next(&mut self) -> Result<Row, QuiverError> {
        if self.closed {
            return Err(QuiverError::Execution(
                "next() called on a closed result set".to_string(),
            ));
        }
        self.stream.next(&mut self.ctx)
    }

    pub fn close(&mut self) {
        if !self.closed {
            self.stream.close(&mut self.ctx);
            self.closed = true;
        }
    }

    /// The physical plan behind this result, when the statement had one.
    #[must_use]
    pub fn execution_plan(&self) -> Option<&ExecutionPlan> {
        self.plan.as_ref()
    }

    /// Drains the remaining rows into a vector and closes the set.
    pub fn collect_rows(&mut self) -> Result<Vec<Row>, QuiverError> {
        let mut rows = Vec::new();
        let outcome = (|| {
            while self.has_next()? {
                rows.push(self.next()?);
            }
            Ok(())
        })();
        self.close();
        outcome.map(|()| rows)
    }
}

impl Drop for ResultSet {
    fn drop(&mut self) {
        self.close();
    }
}

impl Iterator for ResultSet {
    type Item = Result<Row, QuiverError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.has_next() {
            Ok(true) => Some(Self::next(self)),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
