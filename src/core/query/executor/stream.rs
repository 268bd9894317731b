// src/core/query/executor/stream.rs

use crate::core::common::QuiverError;
use crate::core::query::executor::context::CommandContext;
use crate::core::query::executor::result::Row;
use std::collections::VecDeque;

/// A lazy, pull-based, single-pass sequence of result rows.
///
/// Contract: `has_next` is a side-effect-free peek and stays idempotent when
/// polled repeatedly; `next` fails once the stream is exhausted (exhaustion is
/// terminal); `close` is idempotent and must run on every terminal path,
/// including abandonment, so statement-scoped resources are released.
pub trait ExecutionStream: Send {
    fn has_next(&mut self, ctx: &mut CommandContext) -> Result<bool, QuiverError>;

    fn next(&mut self, ctx: &mut CommandContext) -> Result<Row, QuiverError>;

    fn close(&mut self, ctx: &mut CommandContext);
}

/// Error produced by any stream pulled past logical exhaustion.
pub(crate) fn exhausted() -> QuiverError {
    QuiverError::Execution("next() called on an exhausted execution stream".to_string())
}

/// Finite in-memory stream draining a pre-built row collection. Steps that
/// must materialize (counting, parallel merge) wrap their output in this.
#[derive(Debug)]
pub struct ResultIteratorStream {
    rows: VecDeque<Row>,
    closed: bool,
}

impl ResultIteratorStream {
    #[must_use]
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows: rows.into(), closed: false }
    }
}

impl ExecutionStream for ResultIteratorStream {
    fn has_next(&mut self, _ctx: &mut CommandContext) -> Result<bool, QuiverError> {
        Ok(!self.closed && !self.rows.is_empty())
    }

    fn next(&mut self, _ctx: &mut CommandContext) -> Result<Row, QuiverError> {
        if self.closed {
            return Err(exhausted());
        }
        self.rows.pop_front().ok_or_else(exhausted)
    }

    fn close(&mut self, _ctx: &mut CommandContext) {
        self.closed = true;
        self.rows.clear();
    }
}

/// The terminal "no rows" stream.
#[derive(Debug, Default)]
pub struct EmptyStream;

impl ExecutionStream for EmptyStream {
    fn has_next(&mut self, _ctx: &mut CommandContext) -> Result<bool, QuiverError> {
        Ok(false)
    }

    fn next(&mut self, _ctx: &mut CommandContext) -> Result<Row, QuiverError> {
        Err(exhausted())
    }

    fn close(&mut self, _ctx: &mut CommandContext) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::session::DatabaseSession;
    use crate::core::types::Value;
    use std::sync::Arc;

    fn ctx() -> CommandContext {
        CommandContext::new(Arc::new(DatabaseSession::new(Config::default())))
    }

    fn rows(n: i64) -> Vec<Row> {
        (0..n).map(|i| Row::report("i", Value::Integer(i))).collect()
    }

    #[test]
    fn has_next_is_idempotent() {
        let mut ctx = ctx();
        let mut stream = ResultIteratorStream::new(rows(1));
        assert!(stream.has_next(&mut ctx).expect("peek"));
        assert!(stream.has_next(&mut ctx).expect("peek"));
        stream.next(&mut ctx).expect("row");
        assert!(!stream.has_next(&mut ctx).expect("peek"));
    }

    #[test]
    fn next_past_exhaustion_is_an_execution_error() {
        let mut ctx = ctx();
        let mut stream = ResultIteratorStream::new(rows(1));
        stream.next(&mut ctx).expect("row");
        assert!(matches!(stream.next(&mut ctx), Err(QuiverError::Execution(_))));
        // exhaustion is terminal
        assert!(!stream.has_next(&mut ctx).expect("peek"));
    }

    #[test]
    fn close_is_idempotent_and_terminal() {
        let mut ctx = ctx();
        let mut stream = ResultIteratorStream::new(rows(3));
        stream.close(&mut ctx);
        stream.close(&mut ctx);
        assert!(!stream.has_next(&mut ctx).expect("peek"));
        assert!(stream.next(&mut ctx).is_err());
    }

    #[test]
    fn empty_stream_yields_nothing() {
        let mut ctx = ctx();
        let mut stream = EmptyStream;
        assert!(!stream.has_next(&mut ctx).expect("peek"));
        assert!(stream.next(&mut ctx).is_err());
    }
}
