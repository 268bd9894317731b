// src/core/query/expression.rs

//! Expressions consumed by filter steps and by the scripting constructs.
//! Produced by the external parser; evaluated against the current context
//! variables and, when present, the current row.

use crate::core::common::QuiverError;
use crate::core::query::executor::context::CommandContext;
use crate::core::query::executor::result::Row;
use crate::core::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    /// `$name`: context variable lookup with parent-scope fallback.
    Variable(String),
    /// Named property of the current row.
    Property(String),
    Compare(Box<Expression>, CompareOp, Box<Expression>),
    Arith(Box<Expression>, ArithOp, Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
}

impl Expression {
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    #[must_use]
    pub fn variable(name: &str) -> Self {
        Self::Variable(name.to_string())
    }

    #[must_use]
    pub fn property(name: &str) -> Self {
        Self::Property(name.to_string())
    }

    #[must_use]
    pub fn compare(left: Self, op: CompareOp, right: Self) -> Self {
        Self::Compare(Box::new(left), op, Box::new(right))
    }

    #[must_use]
    pub fn arith(left: Self, op: ArithOp, right: Self) -> Self {
        Self::Arith(Box::new(left), op, Box::new(right))
    }

    pub fn eval(
        &self,
        ctx: &CommandContext,
        row: Option<&Row>,
    ) -> Result<Value, QuiverError> {
        match self {
            Self::Literal(v) => Ok(v.clone()),
            Self::Variable(name) => Ok(ctx.variable(name).cloned().unwrap_or(Value::Null)),
            Self::Property(name) => {
                Ok(row.and_then(|r| r.property(name)).cloned().unwrap_or(Value::Null))
            }
            Self::Compare(left, op, right) => {
                let l = left.eval(ctx, row)?;
                let r = right.eval(ctx, row)?;
                Ok(Value::Boolean(compare(&l, *op, &r)))
            }
            Self::Arith(left, op, right) => {
                let l = left.eval(ctx, row)?;
                let r = right.eval(ctx, row)?;
                arith(&l, *op, &r)
            }
            Self::And(left, right) => {
                let l = left.eval(ctx, row)?.is_truthy();
                Ok(Value::Boolean(l && right.eval(ctx, row)?.is_truthy()))
            }
            Self::Or(left, right) => {
                let l = left.eval(ctx, row)?.is_truthy();
                Ok(Value::Boolean(l || right.eval(ctx, row)?.is_truthy()))
            }
            Self::Not(inner) => Ok(Value::Boolean(!inner.eval(ctx, row)?.is_truthy())),
        }
    }

    /// Evaluates as a condition (`IF`, `WHILE`, filter predicates).
    pub fn eval_truthy(
        &self,
        ctx: &CommandContext,
        row: Option<&Row>,
    ) -> Result<bool, QuiverError> {
        Ok(self.eval(ctx, row)?.is_truthy())
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn compare(left: &Value, op: CompareOp, right: &Value) -> bool {
    use std::cmp::Ordering;
    let ordering = match (numeric(left), numeric(right)) {
        (Some(l), Some(r)) => l.partial_cmp(&r),
        _ => match (left, right) {
            (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
            _ => {
                // non-comparable types only support (in)equality
                return match op {
                    CompareOp::Eq => left == right,
                    CompareOp::Ne => left != right,
                    _ => false,
                };
            }
        },
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
    }
}

fn arith(left: &Value, op: ArithOp, right: &Value) -> Result<Value, QuiverError> {
    match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => Ok(Value::Integer(match op {
            ArithOp::Add => l.wrapping_add(*r),
            ArithOp::Sub => l.wrapping_sub(*r),
            ArithOp::Mul => l.wrapping_mul(*r),
        })),
        _ => {
            let (Some(l), Some(r)) = (numeric(left), numeric(right)) else {
                return Err(QuiverError::Type(format!(
                    "cannot apply {op:?} to {} and {}",
                    left.type_name(),
                    right.type_name()
                )));
            };
            Ok(Value::Float(match op {
                ArithOp::Add => l + r,
                ArithOp::Sub => l - r,
                ArithOp::Mul => l * r,
            }))
        }
    }
}
