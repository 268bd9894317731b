// src/core/query/executor/plan.rs

use crate::core::common::QuiverError;
use crate::core::query::executor::context::CommandContext;
use crate::core::query::executor::result::Row;
use crate::core::query::executor::stream::{EmptyStream, ExecutionStream};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One node of a physical plan tree.
///
/// A step owns the reference to its upstream producer and exposes `start`,
/// which lazily binds to it: no upstream row may be pulled at bind time.
/// Steps are single-use; a second `start` without a reset is a programming
/// error and fails fast.
pub trait ExecutionStep: Send {
    /// Wires the upstream producer. A step owns its previous step.
    fn set_previous(&mut self, step: Box<dyn ExecutionStep>);

    /// Binds the step to a context and returns its output stream.
    fn start(&mut self, ctx: &mut CommandContext) -> Result<Box<dyn ExecutionStream>, QuiverError>;

    /// Human-readable operator description for explain output.
    fn describe(&self) -> String;

    /// The upstream step, if wired.
    fn previous(&self) -> Option<&dyn ExecutionStep>;

    /// Wall-clock time spent inside this step's stream so far.
    fn elapsed(&self) -> Duration;

    /// Renders this step and its upstream chain, upstream first.
    fn pretty_print(&self, indent: usize, profiled: bool) -> String {
        let mut out = String::new();
        if let Some(prev) = self.previous() {
            out.push_str(&prev.pretty_print(indent, profiled));
        }
        let pad = "  ".repeat(indent);
        let _ = write!(out, "{pad}+ {}", self.describe());
        if profiled {
            let _ = write!(out, " ({})", format_elapsed(self.elapsed()));
        }
        out.push('\n');
        out
    }
}

/// Cost accumulator shared between a step and the stream it hands out.
#[derive(Debug, Clone, Default)]
pub struct StepCost(Arc<AtomicU64>);

impl StepCost {
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.0.load(Ordering::Relaxed))
    }

    fn add(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.0.fetch_add(nanos, Ordering::Relaxed);
    }
}

/// State common to every step: the owned previous pointer, the single-use
/// start guard and the cost accumulator. Concrete steps embed one of these.
#[derive(Default)]
pub struct StepBase {
    previous: Option<Box<dyn ExecutionStep>>,
    started: bool,
    cost: StepCost,
}

impl StepBase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_previous(&mut self, step: Box<dyn ExecutionStep>) {
        self.previous = Some(step);
    }

    #[must_use]
    pub fn previous(&self) -> Option<&dyn ExecutionStep> {
        self.previous.as_deref()
    }

    #[must_use]
    pub fn cost(&self) -> StepCost {
        self.cost.clone()
    }

    /// Flags the step as started, failing fast on re-invocation.
    pub fn mark_started(&mut self, step_name: &str) -> Result<(), QuiverError> {
        if self.started {
            return Err(QuiverError::Internal(format!(
                "{step_name} started twice without a reset"
            )));
        }
        self.started = true;
        Ok(())
    }

    /// Starts the upstream step, or yields the empty stream for leaf steps.
    pub fn start_previous(
        &mut self,
        ctx: &mut CommandContext,
    ) -> Result<Box<dyn ExecutionStream>, QuiverError> {
        match self.previous.as_mut() {
            Some(prev) => prev.start(ctx),
            None => Ok(Box::new(EmptyStream)),
        }
    }

    /// Wraps a stream so time spent inside it is charged to this step.
    #[must_use]
    pub fn timed(&self, inner: Box<dyn ExecutionStream>) -> Box<dyn ExecutionStream> {
        Box::new(TimedStream { inner, cost: self.cost.clone() })
    }
}

struct TimedStream {
    inner: Box<dyn ExecutionStream>,
    cost: StepCost,
}

impl ExecutionStream for TimedStream {
    fn has_next(&mut self, ctx: &mut CommandContext) -> Result<bool, QuiverError> {
        let begun = Instant::now();
        let result = self.inner.has_next(ctx);
        self.cost.add(begun.elapsed());
        result
    }

    fn next(&mut self, ctx: &mut CommandContext) -> Result<Row, QuiverError> {
        let begun = Instant::now();
        let result = self.inner.next(ctx);
        self.cost.add(begun.elapsed());
        result
    }

    fn close(&mut self, ctx: &mut CommandContext) {
        self.inner.close(ctx);
    }
}

/// The physical plan for one statement: an owned chain of steps, the
/// outermost last. Supports explain/profile introspection before and after
/// execution.
pub struct ExecutionPlan {
    root: Option<Box<dyn ExecutionStep>>,
    started: bool,
}

impl std::fmt::Debug for ExecutionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionPlan").field("started", &self.started).finish_non_exhaustive()
    }
}

impl ExecutionPlan {
    /// Chains `steps` in order: each step becomes the previous of the next,
    /// and the last one is the plan root the consumer pulls from.
    #[must_use]
    pub fn from_steps(steps: Vec<Box<dyn ExecutionStep>>) -> Self {
        let mut iter = steps.into_iter();
        let mut root = iter.next();
        for mut step in iter {
            if let Some(prev) = root.take() {
                step.set_previous(prev);
            }
            root = Some(step);
        }
        Self { root, started: false }
    }

    /// Starts the plan, returning the outermost stream. Single-use.
    pub fn start(
        &mut self,
        ctx: &mut CommandContext,
    ) -> Result<Box<dyn ExecutionStream>, QuiverError> {
        if self.started {
            return Err(QuiverError::Internal("execution plan started twice".to_string()));
        }
        self.started = true;
        log::debug!("starting execution plan:\n{}", self.pretty_print());
        match self.root.as_mut() {
            Some(root) => root.start(ctx),
            None => Ok(Box::new(EmptyStream)),
        }
    }

    #[must_use]
    pub fn pretty_print(&self) -> String {
        self.root.as_ref().map_or_else(|| "+ empty plan\n".to_string(), |r| r.pretty_print(0, false))
    }

    /// Plan rendering annotated with per-step elapsed time.
    #[must_use]
    pub fn profile_report(&self) -> String {
        self.root.as_ref().map_or_else(|| "+ empty plan\n".to_string(), |r| r.pretty_print(0, true))
    }
}

/// Formats a duration in the human-readable unit profiling output uses.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    let nanos = elapsed.as_nanos();
    if nanos < 1_000 {
        format!("{nanos}ns")
    } else if nanos < 1_000_000 {
        format!("{:.1}µs", nanos as f64 / 1_000.0)
    } else if nanos < 1_000_000_000 {
        format!("{:.1}ms", nanos as f64 / 1_000_000.0)
    } else {
        format!("{:.2}s", nanos as f64 / 1_000_000_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::query::executor::stream::ResultIteratorStream;
    use crate::core::session::DatabaseSession;
    use crate::core::types::Value;

    /// Minimal pass-through step used to exercise the base contract.
    struct ProduceStep {
        base: StepBase,
        rows: Vec<Row>,
    }

    impl ProduceStep {
        fn boxed(rows: Vec<Row>) -> Box<dyn ExecutionStep> {
            Box::new(Self { base: StepBase::new(), rows })
        }
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

    fn ctx() -> CommandContext {
        CommandContext::new(std::sync::Arc::new(DatabaseSession::new(Config::default())))
    }

    #[test]
    fn double_start_fails_fast() {
        let mut ctx = ctx();
        let mut step = ProduceStep { base: StepBase::new(), rows: Vec::new() };
        step.start(&mut ctx).expect("first start");
        assert!(matches!(step.start(&mut ctx), Err(QuiverError::Internal(_))));
    }

    #[test]
    fn plan_chains_steps_in_order() {
        let mut ctx = ctx();
        let rows = vec![Row::report("v", Value::Integer(1))];
        let mut plan = ExecutionPlan::from_steps(vec![ProduceStep::boxed(rows)]);
        let mut stream = plan.start(&mut ctx).expect("start");
        assert!(stream.has_next(&mut ctx).expect("peek"));
        let row = stream.next(&mut ctx).expect("row");
        assert_eq!(row.property("v"), Some(&Value::Integer(1)));
        stream.close(&mut ctx);
    }

    #[test]
    fn plan_is_single_use() {
        let mut ctx = ctx();
        let mut plan = ExecutionPlan::from_steps(vec![ProduceStep::boxed(Vec::new())]);
        plan.start(&mut ctx).expect("first");
        assert!(plan.start(&mut ctx).is_err());
    }

    #[test]
    fn pretty_print_renders_upstream_first() {
        let produce = ProduceStep::boxed(Vec::new());
        let consume = ProduceStep::boxed(Vec::new());
        let plan = ExecutionPlan::from_steps(vec![produce, consume]);
        let text = plan.pretty_print();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.contains("PRODUCE TEST ROWS")));
    }

    #[test]
    fn profile_report_carries_time_units() {
        let mut ctx = ctx();
        let rows = vec![Row::report("v", Value::Integer(1))];
        let mut plan = ExecutionPlan::from_steps(vec![ProduceStep::boxed(rows)]);
        let mut stream = plan.start(&mut ctx).expect("start");
        while stream.has_next(&mut ctx).expect("peek") {
            stream.next(&mut ctx).expect("row");
        }
        stream.close(&mut ctx);
        let report = plan.profile_report();
        assert!(
            report.contains("ns") || report.contains("µs") || report.contains("ms"),
            "missing time unit in: {report}"
        );
    }

    #[test]
    fn format_elapsed_units() {
        assert_eq!(format_elapsed(Duration::from_nanos(12)), "12ns");
        assert_eq!(format_elapsed(Duration::from_micros(3)), "3.0µs");
        assert_eq!(format_elapsed(Duration::from_millis(15)), "15.0ms");
        assert_eq!(format_elapsed(Duration::from_secs(2)), "2.00s");
    }
}
