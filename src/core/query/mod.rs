// src/core/query/mod.rs

//! Query surface: the parsed-statement AST, the expression tree and the
//! execution engine that drives both.

pub mod executor;
pub mod expression;
pub mod statements;

pub use executor::{QueryExecutor, ResultSet, Row};
pub use expression::Expression;
pub use statements::Statement;
