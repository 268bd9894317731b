// src/core/query/executor/script_handlers.rs

//! Control flow for scripts: FOREACH/WHILE/IF blocks, LET bindings and
//! RETURN. A `BlockSignal` threads the RETURN decision out through every
//! nesting level so statements after the returning block never run.

use crate::core::common::QuiverError;
use crate::core::query::executor::context::CommandContext;
use crate::core::query::expression::Expression;
use crate::core::query::statements::Statement;
use crate::core::types::Value;

/// Outcome of running a statement block.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BlockSignal {
    /// The block ran to completion; continue with the next statement.
    Proceed,
    /// A RETURN fired somewhere inside; unwind the whole script with this
    /// value.
    Return(Value),
}

/// Runs a statement sequence in the current scope. Loop bodies and branch
/// bodies each get a child scope, so their LET bindings do not leak to
/// siblings while assignments to outer variables still land in the
/// declaring scope.
pub(crate) fn run_block(
    ctx: &mut CommandContext,
    body: &[Statement],
) -> Result<BlockSignal, QuiverError> {
    for statement in body {
        match statement {
            Statement::Return(expr) => {
                return Ok(BlockSignal::Return(expr.eval(ctx, None)?));
            }
            Statement::Let { name, value } => {
                let value = value.eval(ctx, None)?;
                ctx.set_variable(name, value);
            }
            Statement::Foreach { variable, items, body } => {
                if let signal @ BlockSignal::Return(_) = run_foreach(ctx, variable, items, body)? {
                    return Ok(signal);
                }
            }
            Statement::While { condition, body } => {
                if let signal @ BlockSignal::Return(_) = run_while(ctx, condition, body)? {
                    return Ok(signal);
                }
            }
            Statement::If { condition, body, else_body } => {
                let branch =
                    if condition.eval_truthy(ctx, None)? { body } else { else_body };
                if let signal @ BlockSignal::Return(_) = run_child_block(ctx, branch)? {
                    return Ok(signal);
                }
            }
            other => {
                // embedded statement; its rows are not surfaced by the script
                super::materialize(ctx, other)?;
            }
        }
    }
    Ok(BlockSignal::Proceed)
}

fn run_child_block(
    ctx: &mut CommandContext,
    body: &[Statement],
) -> Result<BlockSignal, QuiverError> {
    ctx.push_scope();
    let signal = run_block(ctx, body);
    ctx.pop_scope();
    signal
}

fn run_foreach(
    ctx: &mut CommandContext,
    variable: &str,
    items: &Expression,
    body: &[Statement],
) -> Result<BlockSignal, QuiverError> {
    let items = match items.eval(ctx, None)? {
        Value::List(items) => items,
        other => {
            return Err(QuiverError::Type(format!(
                "FOREACH needs a list, got {}",
                other.type_name()
            )));
        }
    };
    for item in items {
        ctx.tick();
        ctx.check_timeout()?;
        ctx.push_scope();
        ctx.declare_variable(variable, item);
        let signal = run_block(ctx, body);
        ctx.pop_scope();
        if let signal @ BlockSignal::Return(_) = signal? {
            return Ok(signal);
        }
    }
    Ok(BlockSignal::Proceed)
}

fn run_while(
    ctx: &mut CommandContext,
    condition: &Expression,
    body: &[Statement],
) -> Result<BlockSignal, QuiverError> {
    while condition.eval_truthy(ctx, None)? {
        ctx.tick();
        ctx.check_timeout()?;
        let signal = run_child_block(ctx, body)?;
        if let BlockSignal::Return(_) = signal {
            return Ok(signal);
        }
    }
    Ok(BlockSignal::Proceed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::query::expression::{ArithOp, CompareOp};
    use crate::core::session::DatabaseSession;
    use std::sync::Arc;

    fn ctx() -> CommandContext {
        CommandContext::new(Arc::new(DatabaseSession::new(Config::default())))
    }

    fn int_list(n: i64) -> Expression {
        Expression::literal(Value::List((0..n).map(Value::Integer).collect()))
    }

    #[test]
    fn foreach_accumulates_into_the_outer_scope() {
        let mut ctx = ctx();
        let script = vec![
            Statement::Let { name: "sum".to_string(), value: Expression::literal(Value::Integer(0)) },
            Statement::Foreach {
                variable: "i".to_string(),
                items: int_list(5),
                body: vec![Statement::Let {
                    name: "sum".to_string(),
                    value: Expression::arith(
                        Expression::variable("sum"),
                        ArithOp::Add,
                        Expression::variable("i"),
                    ),
                }],
            },
            Statement::Return(Expression::variable("sum")),
        ];
        let signal = run_block(&mut ctx, &script).expect("run");
        assert_eq!(signal, BlockSignal::Return(Value::Integer(10)));
        // the loop variable did not leak
        assert_eq!(ctx.variable("i"), None);
    }

    #[test]
    fn return_unwinds_nested_blocks_and_skips_the_tail() {
        let mut ctx = ctx();
        let script = vec![
            Statement::Foreach {
                variable: "i".to_string(),
                items: int_list(10),
                body: vec![Statement::If {
                    condition: Expression::compare(
                        Expression::variable("i"),
                        CompareOp::Eq,
                        Expression::literal(Value::Integer(3)),
                    ),
                    body: vec![Statement::While {
                        condition: Expression::literal(Value::Boolean(true)),
                        body: vec![Statement::Return(Expression::variable("i"))],
                    }],
                    else_body: Vec::new(),
                }],
            },
            // must never run
            Statement::Let {
                name: "after".to_string(),
                value: Expression::literal(Value::Boolean(true)),
            },
        ];
        let signal = run_block(&mut ctx, &script).expect("run");
        assert_eq!(signal, BlockSignal::Return(Value::Integer(3)));
        assert_eq!(ctx.variable("after"), None);
    }

    #[test]
    fn while_loop_counts_down() {
        let mut ctx = ctx();
        let script = vec![
            Statement::Let { name: "n".to_string(), value: Expression::literal(Value::Integer(4)) },
            Statement::While {
                condition: Expression::compare(
                    Expression::variable("n"),
                    CompareOp::Gt,
                    Expression::literal(Value::Integer(0)),
                ),
                body: vec![Statement::Let {
                    name: "n".to_string(),
                    value: Expression::arith(
                        Expression::variable("n"),
                        ArithOp::Sub,
                        Expression::literal(Value::Integer(1)),
                    ),
                }],
            },
            Statement::Return(Expression::variable("n")),
        ];
        let signal = run_block(&mut ctx, &script).expect("run");
        assert_eq!(signal, BlockSignal::Return(Value::Integer(0)));
    }

    #[test]
    fn foreach_over_a_non_list_is_a_type_error() {
        let mut ctx = ctx();
        let script = vec![Statement::Foreach {
            variable: "i".to_string(),
            items: Expression::literal(Value::Integer(1)),
            body: Vec::new(),
        }];
        assert!(matches!(run_block(&mut ctx, &script), Err(QuiverError::Type(_))));
    }

    #[test]
    fn runaway_while_hits_the_time_budget() {
        let session = DatabaseSession::new(Config::builder().query_timeout_ms(20).build());
        let mut ctx = CommandContext::new(Arc::new(session));
        let script = vec![Statement::While {
            condition: Expression::literal(Value::Boolean(true)),
            body: Vec::new(),
        }];
        assert!(matches!(run_block(&mut ctx, &script), Err(QuiverError::Timeout(_))));
    }

    #[test]
    fn scripts_can_manage_transactions() {
        let mut ctx = ctx();
        ctx.session()
            .with_schema_mut(|schema| {
                schema
                    .create_class("Note", crate::core::schema::ClassKind::Document, false, None, 1)
                    .map(|_| ())
            })
            .expect("schema");
        let script = vec![
            Statement::Begin,
            Statement::Insert { class: "Note".to_string(), properties: Default::default() },
            Statement::Rollback,
        ];
        let signal = run_block(&mut ctx, &script).expect("run");
        assert_eq!(signal, BlockSignal::Proceed);
        assert_eq!(ctx.session().count_class("Note").expect("count"), 0);
    }
}
