// Streaming SQL core for event data.
// Parses rule statements into a typed AST and evaluates them over tuples.

pub mod ast;
pub mod context;
pub mod error;
pub mod execution;
pub mod functions;
pub mod parser;

// Re-export main API
pub use ast::SelectStatement;
pub use context::{EvalContext, ProjectionPolicy};
pub use error::{ErrorCode, SqlError, SqlResult};
pub use execution::{EvalInput, ExpressionEvaluator, FieldValue, JoinTuple, ProjectOperator, Tuple};
pub use parser::EventSqlParser;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
