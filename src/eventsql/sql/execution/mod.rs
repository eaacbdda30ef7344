//! Expression evaluation over tuples, joined tuple sets and grouped rows.

pub mod evaluator;
pub mod project;
pub mod types;

pub use evaluator::{EvalInput, ExpressionEvaluator};
pub use project::ProjectOperator;
pub use types::{FieldValue, JoinTuple, Tuple};
