//! Built-in function registry.
//!
//! Every function the dialect exposes is described by a [`FunctionDef`]:
//! its category (which decides where a call is legal and how arguments are
//! delivered), an arity rule applied at parse time, and the evaluator
//! entry point. Definitions live in static tables next to their
//! implementations; a lazily built map gives case-insensitive O(1) lookup.
//!
//! The registry is constructed during process init and immutable after, so
//! it is shared by reference across threads.

pub mod aggregates;
pub mod hashing;
pub mod json_path;
pub mod scalars;

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::eventsql::sql::error::{SqlError, SqlResult};
use crate::eventsql::sql::execution::types::FieldValue;

/// Where a call is legal and how its arguments are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCategory {
    /// Arguments evaluate to scalars before the call
    Scalar,
    /// Each argument slot is collected over the whole group
    Aggregate,
    /// Scalar, but the argument resolves against tuple metadata
    Meta,
}

/// Parse-time argument count rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Range(usize, usize),
    AtLeast(usize),
}

impl Arity {
    pub fn check(&self, name: &str, found: usize) -> SqlResult<()> {
        let ok = match self {
            Arity::Exact(n) => found == *n,
            Arity::Range(min, max) => found >= *min && found <= *max,
            Arity::AtLeast(min) => found >= *min,
        };
        if ok {
            return Ok(());
        }
        let expected = match self {
            Arity::Exact(n) => n.to_string(),
            Arity::Range(min, max) => format!("{} to {}", min, max),
            Arity::AtLeast(min) => format!("at least {}", min),
        };
        Err(SqlError::parse_error(
            format!(
                "Expect {} arguments but found {} for function {}.",
                expected, found, name
            ),
            None,
        ))
    }
}

/// Scalar entry point: the function name (for error messages) and the
/// already-evaluated argument values.
pub type ScalarFn = fn(&str, &[FieldValue]) -> SqlResult<FieldValue>;

/// Aggregate entry point: one value list per argument slot, collected over
/// the grouped tuples in insertion order.
pub type AggregateFn = fn(&str, &[Vec<FieldValue>]) -> SqlResult<FieldValue>;

#[derive(Clone, Copy)]
pub enum FunctionExec {
    Scalar(ScalarFn),
    Aggregate(AggregateFn),
}

pub struct FunctionDef {
    /// Lower-case canonical name
    pub name: &'static str,
    pub category: FunctionCategory,
    pub arity: Arity,
    pub exec: FunctionExec,
}

static FUNCTION_LOOKUP: LazyLock<HashMap<&'static str, &'static FunctionDef>> =
    LazyLock::new(|| {
        let mut map = HashMap::new();
        for def in scalars::FUNCTIONS
            .iter()
            .chain(hashing::FUNCTIONS.iter())
            .chain(aggregates::FUNCTIONS.iter())
            .chain(json_path::FUNCTIONS.iter())
        {
            map.insert(def.name, def);
        }
        map
    });

/// Find a function by name, case-insensitively.
pub fn find_function(name: &str) -> Option<&'static FunctionDef> {
    FUNCTION_LOOKUP.get(name.to_lowercase().as_str()).copied()
}

/// Whether a name resolves to an aggregate function.
pub fn is_aggregate_function(name: &str) -> bool {
    find_function(name)
        .map(|f| f.category == FunctionCategory::Aggregate)
        .unwrap_or(false)
}
