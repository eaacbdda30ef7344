//! Tree-walking expression evaluator.
//!
//! `eval(ctx, expr, input) -> value | error`. The evaluator is pure: it
//! never retains tuples across invocations, and all state it needs arrives
//! through the explicit [`EvalContext`] and [`EvalInput`].
//!
//! Null handling follows the dialect rules: arithmetic and comparison with
//! a null operand yield null, AND/OR use three-valued logic, and equality
//! is typed (no implicit cross-type equality beyond int/float promotion).

use std::collections::HashMap;

use crate::eventsql::sql::ast::{BinaryOperator, Expr, StreamName, SLICE_OPEN_END};
use crate::eventsql::sql::context::EvalContext;
use crate::eventsql::sql::error::{SqlError, SqlResult};
use crate::eventsql::sql::functions::{self, FunctionExec};

use super::types::{compare_values, values_equal, FieldValue, JoinTuple, Tuple};

/// What an expression is evaluated against.
#[derive(Debug, Clone, Copy)]
pub enum EvalInput<'a> {
    /// One event from a single source
    Single(&'a Tuple),
    /// One combined row from a join
    Joined(&'a JoinTuple),
    /// Tuples sharing a grouping key; aggregates compute over the list,
    /// scalar parts read the first tuple
    Grouped(&'a [Tuple]),
}

pub struct ExpressionEvaluator;

impl ExpressionEvaluator {
    /// Evaluate an expression against the input context.
    pub fn eval(ctx: &EvalContext, expr: &Expr, input: EvalInput) -> SqlResult<FieldValue> {
        ctx.check_cancelled()?;
        match expr {
            Expr::FieldRef { stream, name } => Self::resolve_field(input, stream, name),
            Expr::MetaRef { stream, name } => Ok(Self::resolve_meta(input, stream, name)),
            Expr::JsonFieldRef(name) => Err(SqlError::execution_error(format!(
                "json field {} referenced outside of ->",
                name
            ))),
            Expr::IntegerLiteral(i) => Ok(FieldValue::Integer(*i)),
            Expr::NumberLiteral(n) => Ok(FieldValue::Float(*n)),
            Expr::StringLiteral(s) => Ok(FieldValue::String(s.clone())),
            Expr::BooleanLiteral(b) => Ok(FieldValue::Boolean(*b)),
            Expr::Wildcard => Ok(FieldValue::Map(Self::merged_message(input))),
            Expr::BinaryOp { op, lhs, rhs } => Self::eval_binary(ctx, *op, lhs, rhs, input),
            Expr::Index { .. } | Expr::Slice { .. } => Err(SqlError::execution_error(
                "subset expression used outside of []",
            )),
            Expr::Call { name, args } => Self::eval_call(ctx, name, args, input),
            Expr::Case {
                value,
                when_clauses,
                else_clause,
            } => Self::eval_case(ctx, value.as_deref(), when_clauses, else_clause.as_deref(), input),
        }
    }

    /// Evaluate an expression expected to act as a filter condition.
    /// Null (unknown) reads as false.
    pub fn eval_condition(ctx: &EvalContext, expr: &Expr, input: EvalInput) -> SqlResult<bool> {
        match Self::eval(ctx, expr, input)? {
            FieldValue::Boolean(b) => Ok(b),
            FieldValue::Null => Ok(false),
            other => Err(SqlError::type_error("bool", other.type_name())),
        }
    }

    fn resolve_field(input: EvalInput, stream: &StreamName, name: &str) -> SqlResult<FieldValue> {
        match input {
            EvalInput::Single(tuple) => {
                if name == "*" {
                    Ok(FieldValue::Map(tuple.message.clone()))
                } else {
                    // A single-source context has exactly one stream, so the
                    // qualifier does not change the lookup
                    Ok(tuple.value(name))
                }
            }
            EvalInput::Joined(joined) => match stream {
                StreamName::Named(s) => {
                    match joined.tuples.iter().find(|t| &t.emitter == s) {
                        Some(tuple) if name == "*" => Ok(FieldValue::Map(tuple.message.clone())),
                        Some(tuple) => Ok(tuple.value(name)),
                        None => Ok(FieldValue::Null),
                    }
                }
                StreamName::Default => {
                    // Unqualified lookup must match a unique stream
                    let mut found: Option<&FieldValue> = None;
                    for tuple in &joined.tuples {
                        if let Some(v) = tuple.message.get(name) {
                            if found.is_some() {
                                return Err(SqlError::execution_error(format!(
                                    "ambiguous field {}, use the stream name to qualify it",
                                    name
                                )));
                            }
                            found = Some(v);
                        }
                    }
                    Ok(found.cloned().unwrap_or(FieldValue::Null))
                }
            },
            EvalInput::Grouped(tuples) => match tuples.first() {
                Some(first) => Self::resolve_field(EvalInput::Single(first), stream, name),
                None => Ok(FieldValue::Null),
            },
        }
    }

    fn resolve_meta(input: EvalInput, stream: &StreamName, name: &str) -> FieldValue {
        match input {
            EvalInput::Single(tuple) => {
                if name == "*" {
                    FieldValue::Map(tuple.metadata.clone())
                } else {
                    tuple.meta_value(name)
                }
            }
            EvalInput::Joined(joined) => match stream {
                StreamName::Named(s) => match joined.tuples.iter().find(|t| &t.emitter == s) {
                    Some(tuple) if name == "*" => FieldValue::Map(tuple.metadata.clone()),
                    Some(tuple) => tuple.meta_value(name),
                    None => FieldValue::Null,
                },
                StreamName::Default => {
                    for tuple in &joined.tuples {
                        if name == "*" {
                            return FieldValue::Map(tuple.metadata.clone());
                        }
                        if let Some(v) = tuple.metadata.get(name) {
                            return v.clone();
                        }
                    }
                    FieldValue::Null
                }
            },
            EvalInput::Grouped(tuples) => match tuples.first() {
                Some(first) => Self::resolve_meta(EvalInput::Single(first), stream, name),
                None => FieldValue::Null,
            },
        }
    }

    fn merged_message(input: EvalInput) -> HashMap<String, FieldValue> {
        match input {
            EvalInput::Single(tuple) => tuple.message.clone(),
            EvalInput::Joined(joined) => {
                let mut merged = HashMap::new();
                for tuple in &joined.tuples {
                    for (k, v) in &tuple.message {
                        merged.insert(k.clone(), v.clone());
                    }
                }
                merged
            }
            EvalInput::Grouped(tuples) => tuples
                .first()
                .map(|t| t.message.clone())
                .unwrap_or_default(),
        }
    }

    fn eval_binary(
        ctx: &EvalContext,
        op: BinaryOperator,
        lhs: &Expr,
        rhs: &Expr,
        input: EvalInput,
    ) -> SqlResult<FieldValue> {
        match op {
            BinaryOperator::Arrow => {
                let value = Self::eval(ctx, lhs, input)?;
                let key = match rhs {
                    Expr::JsonFieldRef(name) => name,
                    other => {
                        return Err(SqlError::execution_error(format!(
                            "the right side of -> must be a key name, got {:?}",
                            other
                        )));
                    }
                };
                Ok(Self::json_member(value, key))
            }
            BinaryOperator::Subset => match rhs {
                Expr::Index { index } => {
                    let value = Self::eval(ctx, lhs, input)?;
                    let idx = Self::int_operand(ctx, index, input, "index")?;
                    Ok(Self::json_index(value, idx))
                }
                Expr::Slice { start, end } => {
                    let value = Self::eval(ctx, lhs, input)?;
                    let start = Self::int_operand(ctx, start, input, "slice start")?;
                    let end = Self::int_operand(ctx, end, input, "slice end")?;
                    Ok(Self::json_slice(value, start, end))
                }
                other => Err(SqlError::execution_error(format!(
                    "the right side of [] must be an index or slice, got {:?}",
                    other
                ))),
            },
            BinaryOperator::And | BinaryOperator::Or => {
                let left = Self::bool3(Self::eval(ctx, lhs, input)?)?;
                let right = Self::bool3(Self::eval(ctx, rhs, input)?)?;
                Ok(Self::combine3(op, left, right))
            }
            BinaryOperator::Equal | BinaryOperator::NotEqual => {
                let left = Self::eval(ctx, lhs, input)?;
                let right = Self::eval(ctx, rhs, input)?;
                if left.is_null() || right.is_null() {
                    return Ok(FieldValue::Null);
                }
                let equal = values_equal(&left, &right);
                Ok(FieldValue::Boolean(if op == BinaryOperator::Equal {
                    equal
                } else {
                    !equal
                }))
            }
            BinaryOperator::GreaterThan
            | BinaryOperator::GreaterThanOrEqual
            | BinaryOperator::LessThan
            | BinaryOperator::LessThanOrEqual => {
                let left = Self::eval(ctx, lhs, input)?;
                let right = Self::eval(ctx, rhs, input)?;
                if left.is_null() || right.is_null() {
                    return Ok(FieldValue::Null);
                }
                let ordering = compare_values(&left, &right)?;
                let result = match op {
                    BinaryOperator::GreaterThan => ordering.is_gt(),
                    BinaryOperator::GreaterThanOrEqual => ordering.is_ge(),
                    BinaryOperator::LessThan => ordering.is_lt(),
                    BinaryOperator::LessThanOrEqual => ordering.is_le(),
                    _ => unreachable!(),
                };
                Ok(FieldValue::Boolean(result))
            }
            BinaryOperator::Add
            | BinaryOperator::Subtract
            | BinaryOperator::Multiply
            | BinaryOperator::Divide
            | BinaryOperator::Modulo => {
                let left = Self::eval(ctx, lhs, input)?;
                let right = Self::eval(ctx, rhs, input)?;
                Self::arithmetic(op, left, right)
            }
        }
    }

    fn int_operand(
        ctx: &EvalContext,
        expr: &Expr,
        input: EvalInput,
        what: &str,
    ) -> SqlResult<i64> {
        match Self::eval(ctx, expr, input)? {
            FieldValue::Integer(i) => Ok(i),
            other => Err(SqlError::type_error(
                format!("int {}", what),
                other.type_name(),
            )),
        }
    }

    /// `value -> key`: member access over a map, or over a JSON string
    /// parsed on the way in. Anything else reads as null.
    fn json_member(value: FieldValue, key: &str) -> FieldValue {
        match value {
            FieldValue::Map(mut m) => m.remove(key).unwrap_or(FieldValue::Null),
            FieldValue::String(s) => match FieldValue::from_json_str(&s) {
                Ok(FieldValue::Map(mut m)) => m.remove(key).unwrap_or(FieldValue::Null),
                _ => FieldValue::Null,
            },
            _ => FieldValue::Null,
        }
    }

    /// `value[idx]`: negative indices count from the end; out of range is
    /// null.
    fn json_index(value: FieldValue, idx: i64) -> FieldValue {
        let arr = match Self::as_array(value) {
            Some(arr) => arr,
            None => return FieldValue::Null,
        };
        let len = arr.len() as i64;
        let i = if idx < 0 { idx + len } else { idx };
        if i >= 0 && i < len {
            arr.into_iter().nth(i as usize).unwrap()
        } else {
            FieldValue::Null
        }
    }

    /// `value[start:end]`: bounds are clamped; the open-end sentinel runs
    /// to the end of the array.
    fn json_slice(value: FieldValue, start: i64, end: i64) -> FieldValue {
        let arr = match Self::as_array(value) {
            Some(arr) => arr,
            None => return FieldValue::Null,
        };
        let len = arr.len() as i64;
        let mut s = if start < 0 { start + len } else { start };
        let mut e = if end == SLICE_OPEN_END {
            len
        } else if end < 0 {
            end + len
        } else {
            end
        };
        s = s.clamp(0, len);
        e = e.clamp(0, len);
        if s >= e {
            return FieldValue::Array(Vec::new());
        }
        FieldValue::Array(arr[s as usize..e as usize].to_vec())
    }

    fn as_array(value: FieldValue) -> Option<Vec<FieldValue>> {
        match value {
            FieldValue::Array(arr) => Some(arr),
            FieldValue::String(s) => match FieldValue::from_json_str(&s) {
                Ok(FieldValue::Array(arr)) => Some(arr),
                _ => None,
            },
            _ => None,
        }
    }

    fn bool3(value: FieldValue) -> SqlResult<Option<bool>> {
        match value {
            FieldValue::Boolean(b) => Ok(Some(b)),
            FieldValue::Null => Ok(None),
            other => Err(SqlError::type_error("bool", other.type_name())),
        }
    }

    fn combine3(op: BinaryOperator, left: Option<bool>, right: Option<bool>) -> FieldValue {
        match op {
            BinaryOperator::And => match (left, right) {
                (Some(false), _) | (_, Some(false)) => FieldValue::Boolean(false),
                (Some(true), Some(true)) => FieldValue::Boolean(true),
                _ => FieldValue::Null,
            },
            BinaryOperator::Or => match (left, right) {
                (Some(true), _) | (_, Some(true)) => FieldValue::Boolean(true),
                (Some(false), Some(false)) => FieldValue::Boolean(false),
                _ => FieldValue::Null,
            },
            _ => unreachable!(),
        }
    }

    fn arithmetic(op: BinaryOperator, left: FieldValue, right: FieldValue) -> SqlResult<FieldValue> {
        if left.is_null() || right.is_null() {
            return Ok(FieldValue::Null);
        }

        if let (FieldValue::Integer(a), FieldValue::Integer(b)) = (&left, &right) {
            let (a, b) = (*a, *b);
            return match op {
                BinaryOperator::Add => Ok(FieldValue::Integer(a.wrapping_add(b))),
                BinaryOperator::Subtract => Ok(FieldValue::Integer(a.wrapping_sub(b))),
                BinaryOperator::Multiply => Ok(FieldValue::Integer(a.wrapping_mul(b))),
                BinaryOperator::Divide => {
                    if b == 0 {
                        Err(SqlError::execution_error("division by zero"))
                    } else {
                        Ok(FieldValue::Integer(a / b))
                    }
                }
                BinaryOperator::Modulo => {
                    if b == 0 {
                        Err(SqlError::execution_error("division by zero"))
                    } else {
                        Ok(FieldValue::Integer(a % b))
                    }
                }
                _ => unreachable!(),
            };
        }

        let (a, b) = match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                let bad = if left.as_f64().is_none() { &left } else { &right };
                return Err(SqlError::type_error("number", bad.type_name()));
            }
        };
        match op {
            BinaryOperator::Add => Ok(FieldValue::Float(a + b)),
            BinaryOperator::Subtract => Ok(FieldValue::Float(a - b)),
            BinaryOperator::Multiply => Ok(FieldValue::Float(a * b)),
            BinaryOperator::Divide => {
                if b == 0.0 {
                    Err(SqlError::execution_error("division by zero"))
                } else {
                    Ok(FieldValue::Float(a / b))
                }
            }
            BinaryOperator::Modulo => {
                if b == 0.0 {
                    Err(SqlError::execution_error("division by zero"))
                } else {
                    Ok(FieldValue::Float(a % b))
                }
            }
            _ => unreachable!(),
        }
    }

    fn eval_case(
        ctx: &EvalContext,
        value: Option<&Expr>,
        when_clauses: &[crate::eventsql::sql::ast::WhenClause],
        else_clause: Option<&Expr>,
        input: EvalInput,
    ) -> SqlResult<FieldValue> {
        match value {
            // Simple form: compare each WHEN expression for equality
            Some(value_expr) => {
                let subject = Self::eval(ctx, value_expr, input)?;
                for wc in when_clauses {
                    let candidate = Self::eval(ctx, &wc.condition, input)?;
                    if values_equal(&subject, &candidate) {
                        return Self::eval(ctx, &wc.result, input);
                    }
                }
            }
            // Searched form: the first truthy WHEN wins
            None => {
                for wc in when_clauses {
                    match Self::eval(ctx, &wc.condition, input)? {
                        FieldValue::Boolean(true) => return Self::eval(ctx, &wc.result, input),
                        FieldValue::Boolean(false) | FieldValue::Null => {}
                        other => {
                            return Err(SqlError::type_error("bool", other.type_name()));
                        }
                    }
                }
            }
        }
        match else_clause {
            Some(e) => Self::eval(ctx, e, input),
            None => Ok(FieldValue::Null),
        }
    }

    fn eval_call(
        ctx: &EvalContext,
        name: &str,
        args: &[Expr],
        input: EvalInput,
    ) -> SqlResult<FieldValue> {
        let def = functions::find_function(name)
            .ok_or_else(|| SqlError::not_found(format!("function {}", name)))?;

        match def.exec {
            FunctionExec::Scalar(exec) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(Self::eval(ctx, arg, input)?);
                }
                exec(def.name, &values)
            }
            FunctionExec::Aggregate(exec) => {
                let arg_lists = Self::collect_aggregate_args(ctx, args, input)?;
                exec(def.name, &arg_lists)
            }
        }
    }

    /// Evaluate each argument once per grouped tuple, preserving the
    /// runtime's insertion order. Cancellation is polled per tuple.
    fn collect_aggregate_args(
        ctx: &EvalContext,
        args: &[Expr],
        input: EvalInput,
    ) -> SqlResult<Vec<Vec<FieldValue>>> {
        let mut arg_lists: Vec<Vec<FieldValue>> = vec![Vec::new(); args.len()];
        match input {
            EvalInput::Grouped(tuples) => {
                for tuple in tuples {
                    ctx.check_cancelled()?;
                    for (i, arg) in args.iter().enumerate() {
                        arg_lists[i].push(Self::eval(ctx, arg, EvalInput::Single(tuple))?);
                    }
                }
            }
            other => {
                // A non-grouped input aggregates over a group of one
                for (i, arg) in args.iter().enumerate() {
                    arg_lists[i].push(Self::eval(ctx, arg, other)?);
                }
            }
        }
        Ok(arg_lists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventsql::sql::parser::EventSqlParser;

    fn tuple_with(fields: &[(&str, FieldValue)]) -> Tuple {
        let mut message = HashMap::new();
        for (k, v) in fields {
            message.insert(k.to_string(), v.clone());
        }
        Tuple::new("test").with_message(message)
    }

    fn eval_projected(sql: &str, tuple: &Tuple) -> FieldValue {
        let stmt = EventSqlParser::new().parse(sql).unwrap();
        let ctx = EvalContext::new("test");
        ExpressionEvaluator::eval(&ctx, &stmt.fields[0].expr, EvalInput::Single(tuple)).unwrap()
    }

    #[test]
    fn test_null_propagation_in_arithmetic() {
        let tuple = tuple_with(&[("a", FieldValue::Integer(1))]);
        assert_eq!(eval_projected("SELECT a + missing FROM t", &tuple), FieldValue::Null);
        assert_eq!(eval_projected("SELECT missing > 1 FROM t", &tuple), FieldValue::Null);
    }

    #[test]
    fn test_three_valued_logic() {
        let tuple = tuple_with(&[("t", FieldValue::Boolean(true)), ("f", FieldValue::Boolean(false))]);
        assert_eq!(
            eval_projected("SELECT missing AND f FROM t", &tuple),
            FieldValue::Boolean(false)
        );
        assert_eq!(
            eval_projected("SELECT missing OR t FROM t", &tuple),
            FieldValue::Boolean(true)
        );
        assert_eq!(eval_projected("SELECT missing AND t FROM t", &tuple), FieldValue::Null);
        assert_eq!(eval_projected("SELECT missing OR f FROM t", &tuple), FieldValue::Null);
    }

    #[test]
    fn test_typed_equality_no_cross_type() {
        let tuple = tuple_with(&[("s", FieldValue::String("1".to_string()))]);
        assert_eq!(eval_projected("SELECT s = 1 FROM t", &tuple), FieldValue::Boolean(false));
    }

    #[test]
    fn test_division_by_zero_is_error() {
        let tuple = tuple_with(&[("a", FieldValue::Integer(1))]);
        let stmt = EventSqlParser::new().parse("SELECT a / 0 FROM t").unwrap();
        let ctx = EvalContext::new("test");
        let err =
            ExpressionEvaluator::eval(&ctx, &stmt.fields[0].expr, EvalInput::Single(&tuple))
                .unwrap_err();
        assert!(err.to_string().contains("division by zero"));
    }

    #[test]
    fn test_arrow_and_index_access() {
        let tuple = tuple_with(&[(
            "children",
            FieldValue::from_json_str(r#"[{"first": "a"}, {"first": "b"}]"#).unwrap(),
        )]);
        assert_eq!(
            eval_projected("SELECT children[0]->first FROM t", &tuple),
            FieldValue::String("a".to_string())
        );
        assert_eq!(
            eval_projected("SELECT children[-1]->first FROM t", &tuple),
            FieldValue::String("b".to_string())
        );
        assert_eq!(eval_projected("SELECT children[9] FROM t", &tuple), FieldValue::Null);
    }

    #[test]
    fn test_arrow_auto_parses_json_strings() {
        let tuple = tuple_with(&[(
            "payload",
            FieldValue::String(r#"{"inner": {"x": 7}}"#.to_string()),
        )]);
        assert_eq!(
            eval_projected("SELECT payload->inner->x FROM t", &tuple),
            FieldValue::Integer(7)
        );
    }

    #[test]
    fn test_slice_semantics() {
        let arr = FieldValue::Array(vec![
            FieldValue::Integer(1),
            FieldValue::Integer(2),
            FieldValue::Integer(3),
        ]);
        let tuple = tuple_with(&[("a", arr)]);
        assert_eq!(
            eval_projected("SELECT a[1:] FROM t", &tuple),
            FieldValue::Array(vec![FieldValue::Integer(2), FieldValue::Integer(3)])
        );
        assert_eq!(
            eval_projected("SELECT a[:2] FROM t", &tuple),
            FieldValue::Array(vec![FieldValue::Integer(1), FieldValue::Integer(2)])
        );
        // clamped far bound
        assert_eq!(
            eval_projected("SELECT a[1:99] FROM t", &tuple),
            FieldValue::Array(vec![FieldValue::Integer(2), FieldValue::Integer(3)])
        );
        // [:] of an empty array is an empty array
        let tuple = tuple_with(&[("a", FieldValue::Array(vec![]))]);
        assert_eq!(eval_projected("SELECT a[:] FROM t", &tuple), FieldValue::Array(vec![]));
        // [:] of null is null
        let tuple = tuple_with(&[]);
        assert_eq!(eval_projected("SELECT a[:] FROM t", &tuple), FieldValue::Null);
    }

    #[test]
    fn test_index_by_expression() {
        let tuple = tuple_with(&[
            (
                "all",
                FieldValue::Array(vec![
                    FieldValue::Integer(100),
                    FieldValue::Integer(200),
                    FieldValue::Integer(300),
                ]),
            ),
            (
                "poi",
                FieldValue::Array(vec![FieldValue::Integer(0), FieldValue::Integer(1)]),
            ),
        ]);
        assert_eq!(
            eval_projected("SELECT all[poi[-1] + 1] FROM t", &tuple),
            FieldValue::Integer(300)
        );
    }

    #[test]
    fn test_case_simple_form() {
        let tuple = tuple_with(&[("temperature", FieldValue::Integer(30))]);
        assert_eq!(
            eval_projected(
                "SELECT CASE temperature WHEN 25 THEN \"bingo\" WHEN 30 THEN \"high\" ELSE \"low\" END FROM t",
                &tuple
            ),
            FieldValue::String("high".to_string())
        );
        let tuple = tuple_with(&[("temperature", FieldValue::Integer(3))]);
        assert_eq!(
            eval_projected(
                "SELECT CASE temperature WHEN 25 THEN \"bingo\" WHEN 30 THEN \"high\" END FROM t",
                &tuple
            ),
            FieldValue::Null
        );
    }

    #[test]
    fn test_case_searched_form() {
        let tuple = tuple_with(&[("temperature", FieldValue::Integer(35))]);
        assert_eq!(
            eval_projected(
                "SELECT CASE WHEN temperature > 30 THEN \"high\" ELSE \"low\" END FROM t",
                &tuple
            ),
            FieldValue::String("high".to_string())
        );
    }

    #[test]
    fn test_aggregate_over_group() {
        let tuples = vec![
            tuple_with(&[("data", FieldValue::Integer(1))]),
            tuple_with(&[("data", FieldValue::Integer(2))]),
            tuple_with(&[("data", FieldValue::Integer(4))]),
        ];
        let stmt = EventSqlParser::new().parse("SELECT count(*)-10 FROM demo").unwrap();
        let ctx = EvalContext::new("test");
        let result =
            ExpressionEvaluator::eval(&ctx, &stmt.fields[0].expr, EvalInput::Grouped(&tuples))
                .unwrap();
        assert_eq!(result, FieldValue::Integer(-7));

        let stmt = EventSqlParser::new().parse("SELECT sum(data) FROM demo").unwrap();
        let result =
            ExpressionEvaluator::eval(&ctx, &stmt.fields[0].expr, EvalInput::Grouped(&tuples))
                .unwrap();
        assert_eq!(result, FieldValue::Integer(7));
    }

    #[test]
    fn test_joined_default_stream_resolution() {
        let mut left = Tuple::new("src1");
        left.message.insert("id1".to_string(), FieldValue::String("1".to_string()));
        let mut right = Tuple::new("src2");
        right.message.insert("id2".to_string(), FieldValue::String("1".to_string()));
        let joined = JoinTuple::new(vec![left, right]);

        let stmt = EventSqlParser::new()
            .parse("SELECT id1, src2.id2 FROM src1 LEFT JOIN src2 ON src1.id1 = src2.id2")
            .unwrap();
        let ctx = EvalContext::new("test");
        assert_eq!(
            ExpressionEvaluator::eval(&ctx, &stmt.fields[0].expr, EvalInput::Joined(&joined))
                .unwrap(),
            FieldValue::String("1".to_string())
        );
        assert_eq!(
            ExpressionEvaluator::eval(&ctx, &stmt.fields[1].expr, EvalInput::Joined(&joined))
                .unwrap(),
            FieldValue::String("1".to_string())
        );
    }

    #[test]
    fn test_cancellation_stops_evaluation() {
        let tuple = tuple_with(&[("a", FieldValue::Integer(1))]);
        let ctx = EvalContext::new("test");
        ctx.cancel_handle().store(true, std::sync::atomic::Ordering::Relaxed);
        let stmt = EventSqlParser::new().parse("SELECT a FROM t").unwrap();
        let err =
            ExpressionEvaluator::eval(&ctx, &stmt.fields[0].expr, EvalInput::Single(&tuple))
                .unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }
}
