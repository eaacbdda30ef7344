//! Streaming SQL engine core for event data.
//!
//! This library provides the two central subsystems of the engine: the
//! rule parser (SQL text to a typed AST) and the expression evaluator
//! (AST plus tuples to projected values). Source/sink connectors, the
//! dataflow scheduler and the control plane consume these as a library.

pub mod eventsql;

// Re-export main API
pub use eventsql::sql::{
    ErrorCode, EvalContext, EvalInput, EventSqlParser, ExpressionEvaluator, FieldValue, JoinTuple,
    ProjectOperator, ProjectionPolicy, SelectStatement, SqlError, SqlResult, Tuple,
};
