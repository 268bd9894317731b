// src/core/query/executor/context.rs

use crate::core::common::QuiverError;
use crate::core::session::DatabaseSession;
use crate::core::types::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-execution mutable state threaded through a plan tree.
///
/// Carries the shared session handle, the named-variable scope frames
/// (innermost last; lookups fall back outwards), a monotonic step counter and
/// the cooperative cancellation/timeout state. One context is created per
/// statement execution and discarded when its `ResultSet` is closed.
#[derive(Debug)]
pub struct CommandContext {
    session: Arc<DatabaseSession>,
    frames: Vec<HashMap<String, Value>>,
    counter: u64,
    started_at: Instant,
    time_budget: Option<Duration>,
    cancelled: Arc<AtomicBool>,
}

impl CommandContext {
    #[must_use]
    pub fn new(session: Arc<DatabaseSession>) -> Self {
        let timeout_ms = session.config().query_timeout_ms;
        let time_budget =
            if timeout_ms == 0 { None } else { Some(Duration::from_millis(timeout_ms)) };
        Self {
            session,
            frames: vec![HashMap::new()],
            counter: 0,
            started_at: Instant::now(),
            time_budget,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn session(&self) -> &Arc<DatabaseSession> {
        &self.session
    }

    // ---- variable scoping -----------------------------------------------

    /// Opens a nested scope (script block, loop iteration, subquery). Must be
    /// paired with [`Self::pop_scope`]; variables declared inside do not leak
    /// to siblings.
    pub fn push_scope(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Lexical lookup: innermost frame first, falling back outwards.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Assigns a variable. Updates the nearest enclosing frame that already
    /// defines the name, so accumulator updates inside a loop body reach the
    /// declaring scope; otherwise declares in the current scope.
    pub fn set_variable(&mut self, name: &str, value: Value) {
        for frame in self.frames.iter_mut().rev() {
            if let Some(slot) = frame.get_mut(name) {
                *slot = value;
                return;
            }
        }
        self.declare_variable(name, value);
    }

    /// Declares a variable in the current (innermost) scope, shadowing any
    /// outer binding of the same name. Loop variables use this.
    pub fn declare_variable(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), value);
        }
    }

    /// Flattened snapshot of the visible bindings, innermost shadowing outer.
    /// Used when a worker context is forked for a parallel sub-plan.
    #[must_use]
    pub fn visible_variables(&self) -> HashMap<String, Value> {
        let mut merged = HashMap::new();
        for frame in &self.frames {
            for (k, v) in frame {
                merged.insert(k.clone(), v.clone());
            }
        }
        merged
    }

    // ---- progress / cancellation ----------------------------------------

    /// Bumps the monotonic context counter. Long-scanning steps call this per
    /// row and periodically follow up with [`Self::check_timeout`].
    pub fn tick(&mut self) -> u64 {
        self.counter = self.counter.wrapping_add(1);
        self.counter
    }

    #[must_use]
    pub const fn steps(&self) -> u64 {
        self.counter
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Fails with a reported (recoverable) error when the caller cancelled
    /// the statement or its time budget ran out.
    pub fn check_timeout(&self) -> Result<(), QuiverError> {
        if self.is_cancelled() {
            return Err(QuiverError::Timeout("statement cancelled by caller".to_string()));
        }
        if let Some(budget) = self.time_budget {
            let elapsed = self.started_at.elapsed();
            if elapsed > budget {
                return Err(QuiverError::Timeout(format!(
                    "statement exceeded its {}ms time budget after {} steps",
                    budget.as_millis(),
                    self.counter
                )));
            }
        }
        Ok(())
    }

    /// Forks a context for a parallel sub-plan worker: same session, deadline
    /// and cancellation flag, variables snapshotted, fresh counter.
    #[must_use]
    pub fn fork_for_worker(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            frames: vec![self.visible_variables()],
            counter: 0,
            started_at: self.started_at,
            time_budget: self.time_budget,
            cancelled: Arc::clone(&self.cancelled),
        }
    }
}
