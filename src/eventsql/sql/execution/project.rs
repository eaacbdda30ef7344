//! Projection: evaluates the SELECT field list against a tuple context and
//! produces the output row.
//!
//! Columns whose value evaluates to null are omitted from the row, so a
//! missing input field simply does not appear in the output. Wildcards
//! merge the source message maps; joined sources merge left to right, with
//! later streams overwriting unaliased duplicates.

use std::collections::HashMap;

use crate::eventsql::sql::ast::{Expr, Field, SelectStatement, StreamName};
use crate::eventsql::sql::context::{EvalContext, ProjectionPolicy};
use crate::eventsql::sql::error::SqlResult;
use crate::eventsql::sql::functions;

use super::evaluator::{EvalInput, ExpressionEvaluator};
use super::types::FieldValue;

pub struct ProjectOperator {
    fields: Vec<Field>,
}

impl ProjectOperator {
    pub fn new(fields: Vec<Field>) -> Self {
        ProjectOperator { fields }
    }

    pub fn from_statement(stmt: &SelectStatement) -> Self {
        Self::new(stmt.fields.clone())
    }

    /// Produce one output row for the given input context.
    pub fn apply(
        &self,
        ctx: &EvalContext,
        input: EvalInput,
    ) -> SqlResult<HashMap<String, FieldValue>> {
        let mut row = HashMap::new();

        for (idx, field) in self.fields.iter().enumerate() {
            let value = match ExpressionEvaluator::eval(ctx, &field.expr, input) {
                Ok(v) => v,
                Err(err) => {
                    // Lenient policy nulls out failing scalar columns;
                    // aggregate failures always fail the whole group
                    if ctx.policy == ProjectionPolicy::Lenient && !has_aggregate(&field.expr) {
                        log::warn!(
                            "rule {}: scalar call failed, column dropped: {}",
                            ctx.rule_id,
                            err
                        );
                        continue;
                    }
                    return Err(err);
                }
            };

            if is_wildcard_field(&field.expr) {
                if let FieldValue::Map(map) = value {
                    for (k, v) in map {
                        if !v.is_null() {
                            row.insert(k, v);
                        }
                    }
                }
                continue;
            }

            if value.is_null() {
                continue;
            }

            let column = match &field.alias {
                Some(alias) => alias.clone(),
                None if !field.name.is_empty() => field.name.clone(),
                None => format!("field_{}", idx),
            };
            row.insert(column, value);
        }

        Ok(row)
    }

    /// One projected result as a JSON byte array: a single-element array of
    /// the row object, the shape sinks consume.
    pub fn apply_json(&self, ctx: &EvalContext, input: EvalInput) -> SqlResult<Vec<u8>> {
        let row = self.apply(ctx, input)?;
        rows_to_json(&[row])
    }
}

/// Serialize a sequence of projected rows for a sink.
pub fn rows_to_json(rows: &[HashMap<String, FieldValue>]) -> SqlResult<Vec<u8>> {
    serde_json::to_vec(rows).map_err(|e| {
        crate::eventsql::sql::error::SqlError::execution_error(format!(
            "failed to serialize projection output: {}",
            e
        ))
    })
}

fn is_wildcard_field(expr: &Expr) -> bool {
    match expr {
        Expr::Wildcard => true,
        Expr::FieldRef { name, .. } => name == "*",
        _ => false,
    }
}

fn has_aggregate(expr: &Expr) -> bool {
    let mut found = false;
    expr.walk(&mut |node| {
        if let Expr::Call { name, .. } = node {
            if functions::is_aggregate_function(name) {
                found = true;
            }
        }
    });
    found
}

/// Which stream a `stream.*` field selects, for callers that pre-filter.
pub fn wildcard_stream(expr: &Expr) -> Option<&StreamName> {
    match expr {
        Expr::FieldRef { stream, name } if name == "*" => Some(stream),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventsql::sql::execution::types::Tuple;
    use crate::eventsql::sql::parser::EventSqlParser;

    fn project(sql: &str, tuple: &Tuple) -> HashMap<String, FieldValue> {
        let stmt = EventSqlParser::new().parse(sql).unwrap();
        let op = ProjectOperator::from_statement(&stmt);
        op.apply(&EvalContext::new("test"), EvalInput::Single(tuple))
            .unwrap()
    }

    #[test]
    fn test_missing_field_column_is_omitted() {
        let mut tuple = Tuple::new("test");
        tuple
            .message
            .insert("a".to_string(), FieldValue::String("x".to_string()));
        let row = project("SELECT md5(d) AS a FROM test", &tuple);
        assert!(row.is_empty());
    }

    #[test]
    fn test_wildcard_merges_message() {
        let mut tuple = Tuple::new("test");
        tuple.message.insert("a".to_string(), FieldValue::Integer(1));
        tuple.message.insert("b".to_string(), FieldValue::Integer(2));
        let row = project("SELECT * FROM test", &tuple);
        assert_eq!(row.len(), 2);
        assert_eq!(row["a"], FieldValue::Integer(1));
        assert_eq!(row["b"], FieldValue::Integer(2));
    }

    #[test]
    fn test_unnamed_expression_gets_positional_name() {
        let mut tuple = Tuple::new("test");
        tuple.message.insert("a".to_string(), FieldValue::Integer(5));
        let row = project("SELECT a * 2 FROM test", &tuple);
        assert_eq!(row["field_0"], FieldValue::Integer(10));
    }

    #[test]
    fn test_lenient_policy_drops_failing_column() {
        let mut tuple = Tuple::new("test");
        tuple.message.insert("a".to_string(), FieldValue::Integer(5));

        let stmt = EventSqlParser::new()
            .parse("SELECT a AS ok, md5(a) AS bad FROM test")
            .unwrap();
        let op = ProjectOperator::from_statement(&stmt);

        let strict = EvalContext::new("test");
        assert!(op.apply(&strict, EvalInput::Single(&tuple)).is_err());

        let lenient = EvalContext::new("test").with_policy(ProjectionPolicy::Lenient);
        let row = op.apply(&lenient, EvalInput::Single(&tuple)).unwrap();
        assert_eq!(row.len(), 1);
        assert_eq!(row["ok"], FieldValue::Integer(5));
    }

    #[test]
    fn test_json_output_shape() {
        let mut tuple = Tuple::new("test");
        tuple
            .message
            .insert("r".to_string(), FieldValue::Integer(5));
        let stmt = EventSqlParser::new().parse("SELECT r FROM test").unwrap();
        let op = ProjectOperator::from_statement(&stmt);
        let bytes = op
            .apply_json(&EvalContext::new("test"), EvalInput::Single(&tuple))
            .unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"[{"r":5}]"#);
    }
}
