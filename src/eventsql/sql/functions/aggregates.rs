//! Aggregate function family.
//!
//! Each argument slot arrives as the list of per-tuple values collected
//! over the group, in insertion order. The first non-null element of a
//! list picks the numeric branch; later elements of another type fail the
//! call. Null elements are skipped everywhere.

use super::{Arity, FunctionCategory, FunctionDef, FunctionExec};
use crate::eventsql::sql::error::{SqlError, SqlResult};
use crate::eventsql::sql::execution::types::FieldValue;

pub static FUNCTIONS: &[FunctionDef] = &[
    FunctionDef {
        name: "count",
        category: FunctionCategory::Aggregate,
        arity: Arity::Exact(1),
        exec: FunctionExec::Aggregate(count_call),
    },
    FunctionDef {
        name: "sum",
        category: FunctionCategory::Aggregate,
        arity: Arity::Exact(1),
        exec: FunctionExec::Aggregate(sum_call),
    },
    FunctionDef {
        name: "avg",
        category: FunctionCategory::Aggregate,
        arity: Arity::Exact(1),
        exec: FunctionExec::Aggregate(avg_call),
    },
    FunctionDef {
        name: "min",
        category: FunctionCategory::Aggregate,
        arity: Arity::Exact(1),
        exec: FunctionExec::Aggregate(min_call),
    },
    FunctionDef {
        name: "max",
        category: FunctionCategory::Aggregate,
        arity: Arity::Exact(1),
        exec: FunctionExec::Aggregate(max_call),
    },
    FunctionDef {
        name: "collect",
        category: FunctionCategory::Aggregate,
        arity: Arity::Exact(1),
        exec: FunctionExec::Aggregate(collect_call),
    },
    // User-facing signature is deduplicate(col, all); the parser prepends
    // the whole-record argument.
    FunctionDef {
        name: "deduplicate",
        category: FunctionCategory::Aggregate,
        arity: Arity::Exact(2),
        exec: FunctionExec::Aggregate(deduplicate_call),
    },
];

fn non_null_count(values: &[FieldValue]) -> i64 {
    values.iter().filter(|v| !v.is_null()).count() as i64
}

fn first_valid(values: &[FieldValue]) -> Option<&FieldValue> {
    values.iter().find(|v| !v.is_null())
}

fn type_mismatch(name: &str, expected: &str, found: &FieldValue) -> SqlError {
    SqlError::function_error(
        name,
        format!("requires {} but found {}({})", expected, found.type_name(), found),
    )
}

fn int_total(name: &str, values: &[FieldValue]) -> SqlResult<i64> {
    let mut total = 0i64;
    for v in values {
        match v {
            FieldValue::Integer(i) => total += i,
            FieldValue::Null => {}
            other => return Err(type_mismatch(name, "int", other)),
        }
    }
    Ok(total)
}

fn float_total(name: &str, values: &[FieldValue]) -> SqlResult<f64> {
    let mut total = 0f64;
    for v in values {
        match v {
            FieldValue::Float(f) => total += f,
            FieldValue::Null => {}
            other => return Err(type_mismatch(name, "float", other)),
        }
    }
    Ok(total)
}

fn count_call(_name: &str, args: &[Vec<FieldValue>]) -> SqlResult<FieldValue> {
    Ok(FieldValue::Integer(non_null_count(&args[0])))
}

fn sum_call(name: &str, args: &[Vec<FieldValue>]) -> SqlResult<FieldValue> {
    let values = &args[0];
    match first_valid(values) {
        None => Ok(FieldValue::Integer(0)),
        Some(FieldValue::Integer(_)) => int_total(name, values).map(FieldValue::Integer),
        Some(FieldValue::Float(_)) => float_total(name, values).map(FieldValue::Float),
        Some(other) => Err(type_mismatch(name, "number", other)),
    }
}

fn avg_call(name: &str, args: &[Vec<FieldValue>]) -> SqlResult<FieldValue> {
    let values = &args[0];
    let count = non_null_count(values);
    if count == 0 {
        return Ok(FieldValue::Integer(0));
    }
    match first_valid(values) {
        // Integer average keeps the integer branch, including its division
        Some(FieldValue::Integer(_)) => {
            Ok(FieldValue::Integer(int_total(name, values)? / count))
        }
        Some(FieldValue::Float(_)) => {
            Ok(FieldValue::Float(float_total(name, values)? / count as f64))
        }
        Some(other) => Err(type_mismatch(name, "number", other)),
        None => Ok(FieldValue::Integer(0)),
    }
}

fn extreme_call(name: &str, values: &[FieldValue], want_max: bool) -> SqlResult<FieldValue> {
    if values.is_empty() {
        return Err(SqlError::function_error(name, "empty data"));
    }
    let first = match first_valid(values) {
        Some(v) => v,
        None => return Ok(FieldValue::Null),
    };

    match first {
        FieldValue::Integer(_) => {
            let mut best = match first {
                FieldValue::Integer(i) => *i,
                _ => unreachable!(),
            };
            for v in values {
                match v {
                    FieldValue::Integer(i) => {
                        if (want_max && *i > best) || (!want_max && *i < best) {
                            best = *i;
                        }
                    }
                    FieldValue::Null => {}
                    other => return Err(type_mismatch(name, "int", other)),
                }
            }
            Ok(FieldValue::Integer(best))
        }
        FieldValue::Float(_) => {
            let mut best = match first {
                FieldValue::Float(f) => *f,
                _ => unreachable!(),
            };
            for v in values {
                match v {
                    FieldValue::Float(f) => {
                        if (want_max && *f > best) || (!want_max && *f < best) {
                            best = *f;
                        }
                    }
                    FieldValue::Null => {}
                    other => return Err(type_mismatch(name, "float", other)),
                }
            }
            Ok(FieldValue::Float(best))
        }
        FieldValue::String(_) => {
            let mut best = match first {
                FieldValue::String(s) => s.clone(),
                _ => unreachable!(),
            };
            for v in values {
                match v {
                    FieldValue::String(s) => {
                        if (want_max && *s > best) || (!want_max && *s < best) {
                            best = s.clone();
                        }
                    }
                    FieldValue::Null => {}
                    other => return Err(type_mismatch(name, "string", other)),
                }
            }
            Ok(FieldValue::String(best))
        }
        other => Err(type_mismatch(name, "comparable value", other)),
    }
}

fn max_call(name: &str, args: &[Vec<FieldValue>]) -> SqlResult<FieldValue> {
    extreme_call(name, &args[0], true)
}

fn min_call(name: &str, args: &[Vec<FieldValue>]) -> SqlResult<FieldValue> {
    extreme_call(name, &args[0], false)
}

/// Identity over the gathered list.
fn collect_call(_name: &str, args: &[Vec<FieldValue>]) -> SqlResult<FieldValue> {
    Ok(FieldValue::Array(args[0].clone()))
}

/// deduplicate(r, col, all): keep `r[i]` for first-seen `col[i]` values.
/// With `all` false, only the latest tuple is interesting: it is returned
/// iff its key was never seen before, else the result is null.
fn deduplicate_call(name: &str, args: &[Vec<FieldValue>]) -> SqlResult<FieldValue> {
    let records = &args[0];
    let keys = &args[1];
    let all = match first_valid(&args[2]) {
        Some(FieldValue::Boolean(b)) => *b,
        _ => {
            return Err(SqlError::function_error(name, "Invalid argument type found."));
        }
    };
    if records.len() != keys.len() {
        return Err(SqlError::function_error(
            name,
            "Invalid argument type found.",
        ));
    }

    let mut seen = std::collections::HashSet::new();
    let mut result = Vec::new();
    for (i, key) in keys.iter().enumerate() {
        let key_str = key.to_string();
        if seen.insert(key_str) {
            if all || i == keys.len() - 1 {
                result.push(records[i].clone());
            }
        }
    }

    if all {
        Ok(FieldValue::Array(result))
    } else {
        Ok(result.into_iter().next().unwrap_or(FieldValue::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(vals: &[i64]) -> Vec<FieldValue> {
        vals.iter().map(|v| FieldValue::Integer(*v)).collect()
    }

    #[test]
    fn test_count_skips_nulls() {
        let values = vec![
            FieldValue::Integer(1),
            FieldValue::Null,
            FieldValue::Integer(3),
        ];
        assert_eq!(count_call("count", &[values]).unwrap(), FieldValue::Integer(2));
    }

    #[test]
    fn test_sum_branches() {
        assert_eq!(sum_call("sum", &[ints(&[1, 2, 3])]).unwrap(), FieldValue::Integer(6));
        assert_eq!(
            sum_call("sum", &[vec![FieldValue::Float(1.5), FieldValue::Float(2.5)]]).unwrap(),
            FieldValue::Float(4.0)
        );
        // empty input sums to integer zero
        assert_eq!(sum_call("sum", &[vec![]]).unwrap(), FieldValue::Integer(0));
        // the first non-null element fixes the branch
        let mixed = vec![FieldValue::Integer(1), FieldValue::Float(2.0)];
        let err = sum_call("sum", &[mixed]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "run sum function error: requires int but found float(2)"
        );
    }

    #[test]
    fn test_avg_integer_division() {
        assert_eq!(avg_call("avg", &[ints(&[1, 2, 4])]).unwrap(), FieldValue::Integer(2));
        assert_eq!(
            avg_call("avg", &[vec![FieldValue::Float(1.0), FieldValue::Float(2.0)]]).unwrap(),
            FieldValue::Float(1.5)
        );
        assert_eq!(avg_call("avg", &[vec![]]).unwrap(), FieldValue::Integer(0));
    }

    #[test]
    fn test_min_max() {
        assert_eq!(max_call("max", &[ints(&[3, 1, 2])]).unwrap(), FieldValue::Integer(3));
        assert_eq!(min_call("min", &[ints(&[3, 1, 2])]).unwrap(), FieldValue::Integer(1));
        assert_eq!(
            max_call(
                "max",
                &[vec![
                    FieldValue::String("a".into()),
                    FieldValue::String("c".into()),
                    FieldValue::String("b".into()),
                ]]
            )
            .unwrap(),
            FieldValue::String("c".to_string())
        );

        let err = max_call("max", &[vec![]]).unwrap_err();
        assert_eq!(err.to_string(), "run max function error: empty data");

        // nulls are skipped but do not fail the call
        assert_eq!(
            min_call("min", &[vec![FieldValue::Null, FieldValue::Integer(5)]]).unwrap(),
            FieldValue::Integer(5)
        );
        assert_eq!(
            min_call("min", &[vec![FieldValue::Null]]).unwrap(),
            FieldValue::Null
        );
    }

    #[test]
    fn test_collect_identity() {
        let values = ints(&[1, 2, 2]);
        assert_eq!(
            collect_call("collect", &[values.clone()]).unwrap(),
            FieldValue::Array(values)
        );
    }

    #[test]
    fn test_deduplicate_all_returns_firsts() {
        let r = ints(&[10, 20, 30, 40]);
        let col = ints(&[1, 2, 1, 3]);
        let all = vec![FieldValue::Boolean(true); 4];
        assert_eq!(
            deduplicate_call("deduplicate", &[r, col, all]).unwrap(),
            FieldValue::Array(ints(&[10, 20, 40]))
        );
    }

    #[test]
    fn test_deduplicate_latest_only() {
        // last key already seen: null
        let r = ints(&[10, 20, 30]);
        let col = ints(&[1, 2, 1]);
        let all = vec![FieldValue::Boolean(false); 3];
        assert_eq!(
            deduplicate_call("deduplicate", &[r, col, all]).unwrap(),
            FieldValue::Null
        );

        // last key fresh: the last record
        let r = ints(&[10, 20, 30]);
        let col = ints(&[1, 2, 3]);
        let all = vec![FieldValue::Boolean(false); 3];
        assert_eq!(
            deduplicate_call("deduplicate", &[r, col, all]).unwrap(),
            FieldValue::Integer(30)
        );
    }

    #[test]
    fn test_deduplicate_self_is_distinct_firsts() {
        let r = ints(&[5, 5, 7, 5, 7, 9]);
        let all = vec![FieldValue::Boolean(true); 6];
        assert_eq!(
            deduplicate_call("deduplicate", &[r.clone(), r, all]).unwrap(),
            FieldValue::Array(ints(&[5, 7, 9]))
        );
    }
}
