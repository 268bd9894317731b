// src/core/query/executor/steps/mod.rs

//! The physical operator library. Each step owns its upstream producer and
//! yields a lazy stream; see [`crate::core::query::executor::plan`] for the
//! chaining and lifecycle contract they all share.

pub mod convert;
pub mod count;
pub mod distinct;
pub mod fetch;
pub mod filter;
pub mod guards;
pub mod parallel;

pub use convert::{ConvertToResultInternalStep, ConvertToUpdatableResultStep};
pub use count::{CountFromClassStep, CountFromIndexStep, CountStep};
pub use distinct::DistinctExecutionStep;
pub use fetch::{FetchFromClassStep, FetchFromRidsStep, MissingRidPolicy};
pub use filter::{FilterStep, LimitStep};
pub use guards::{CheckClassTypeStep, CheckClusterTypeStep, CheckSafeDeleteStep};
pub use parallel::ParallelExecStep;

#[cfg(test)]
pub(crate) mod tests_support {
    use crate::core::common::QuiverError;
    use crate::core::query::executor::context::CommandContext;
    use crate::core::query::executor::plan::{ExecutionStep, StepBase};
    use crate::core::query::executor::result::Row;
    use crate::core::query::executor::stream::{ExecutionStream, ResultIteratorStream};
    use crate::core::types::Value;
    use std::time::Duration;

    /// Leaf step that replays a fixed row list, used as the upstream of the
    /// step under test.
    struct ProduceStep {
        base: StepBase,
        rows: Vec<Row>,
    }

    impl ExecutionStep for ProduceStep {
        fn set_previous(&mut self, step: Box<dyn ExecutionStep>) {
            self.base.set_previous(step);
        }

        fn start(
            &mut self,
            _ctx: &mut CommandContext,
        ) -> Result<Box<dyn ExecutionStream>, QuiverError> {
            self.base.mark_started("ProduceStep")?;
            let rows = std::mem::take(&mut self.rows);
            Ok(self.base.timed(Box::new(ResultIteratorStream::new(rows))))
        }

        fn describe(&self) -> String {
            "PRODUCE TEST ROWS".to_string()
        }

        fn previous(&self) -> Option<&dyn ExecutionStep> {
            self.base.previous()
        }

        fn elapsed(&self) -> Duration {
            self.base.cost().elapsed()
        }
    }

    pub(crate) fn produce(rows: Vec<Row>) -> Box<dyn ExecutionStep> {
        Box::new(ProduceStep { base: StepBase::new(), rows })
    }

    pub(crate) fn rows_of(n: i64) -> Vec<Row> {
        (0..n).map(|i| Row::report("v", Value::Integer(i))).collect()
    }
}
