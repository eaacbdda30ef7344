//! JSONPath functions: `json_path_query`, `json_path_query_first`,
//! `json_path_exists`.
//!
//! The supported path dialect: `$`, `.member`, `["quoted member"]`,
//! `[index]` with negative indices, `[*]`, and filter predicates
//! `[? @.field op literal]` (parentheses around the predicate optional).
//! A wildcard or filter step fans out; later member/index steps map over
//! the fan-out and the final result is the list of matches. Without a
//! fan-out the single selected value is returned bare.

use super::{Arity, FunctionCategory, FunctionDef, FunctionExec};
use crate::eventsql::sql::error::{SqlError, SqlResult};
use crate::eventsql::sql::execution::types::FieldValue;

pub static FUNCTIONS: &[FunctionDef] = &[
    FunctionDef {
        name: "json_path_query",
        category: FunctionCategory::Scalar,
        arity: Arity::Exact(2),
        exec: FunctionExec::Scalar(query_call),
    },
    FunctionDef {
        name: "json_path_query_first",
        category: FunctionCategory::Scalar,
        arity: Arity::Exact(2),
        exec: FunctionExec::Scalar(query_first_call),
    },
    FunctionDef {
        name: "json_path_exists",
        category: FunctionCategory::Scalar,
        arity: Arity::Exact(2),
        exec: FunctionExec::Scalar(exists_call),
    },
];

#[derive(Debug, Clone, PartialEq)]
enum PathStep {
    Member(String),
    Index(i64),
    Wildcard,
    Filter(FilterPred),
}

#[derive(Debug, Clone, PartialEq)]
enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone, PartialEq)]
struct FilterPred {
    field_path: Vec<String>,
    op: FilterOp,
    literal: FieldValue,
}

fn query_call(name: &str, args: &[FieldValue]) -> SqlResult<FieldValue> {
    let (values, fanned) = run_path(name, args)?;
    if fanned {
        Ok(FieldValue::Array(values))
    } else {
        Ok(values.into_iter().next().unwrap_or(FieldValue::Null))
    }
}

fn query_first_call(name: &str, args: &[FieldValue]) -> SqlResult<FieldValue> {
    let (values, _) = run_path(name, args)?;
    Ok(values.into_iter().next().unwrap_or(FieldValue::Null))
}

fn exists_call(name: &str, args: &[FieldValue]) -> SqlResult<FieldValue> {
    let (values, fanned) = run_path(name, args)?;
    let exists = if fanned {
        !values.is_empty()
    } else {
        values.first().map(|v| !v.is_null()).unwrap_or(false)
    };
    Ok(FieldValue::Boolean(exists))
}

fn run_path(name: &str, args: &[FieldValue]) -> SqlResult<(Vec<FieldValue>, bool)> {
    let input = decode_input(name, &args[0])?;
    let path = match &args[1] {
        FieldValue::String(s) => s,
        other => {
            return Err(SqlError::function_error(
                name,
                format!("the second argument must be a path string but got {}", other.type_name()),
            ));
        }
    };
    let steps = parse_path(path).map_err(|detail| SqlError::function_error(name, detail))?;
    Ok(eval_path(&input, &steps))
}

/// The queried document: a map or array value, or a JSON string parsed once
/// on the way in.
fn decode_input(name: &str, input: &FieldValue) -> SqlResult<FieldValue> {
    match input {
        FieldValue::Map(_) | FieldValue::Array(_) => Ok(input.clone()),
        FieldValue::String(s) => FieldValue::from_json_str(s).map_err(|_| {
            SqlError::function_error(name, "the first argument is not a valid JSON string")
        }),
        FieldValue::Null => Err(SqlError::function_error(
            name,
            "the first argument must be a map but got nil",
        )),
        other => Err(SqlError::function_error(
            name,
            format!("the first argument must be a map but got {}", other.type_name()),
        )),
    }
}

fn eval_path(input: &FieldValue, steps: &[PathStep]) -> (Vec<FieldValue>, bool) {
    let mut values = vec![input.clone()];
    let mut fanned = false;

    for step in steps {
        match step {
            PathStep::Member(name) => {
                values = values
                    .into_iter()
                    .filter_map(|v| match v {
                        FieldValue::Map(mut m) => match m.remove(name) {
                            Some(found) => Some(found),
                            None if fanned => None,
                            None => Some(FieldValue::Null),
                        },
                        _ if fanned => None,
                        _ => Some(FieldValue::Null),
                    })
                    .collect();
            }
            PathStep::Index(idx) => {
                values = values
                    .into_iter()
                    .filter_map(|v| match v {
                        FieldValue::Array(arr) => {
                            let len = arr.len() as i64;
                            let i = if *idx < 0 { idx + len } else { *idx };
                            if i >= 0 && i < len {
                                Some(arr.into_iter().nth(i as usize).unwrap())
                            } else if fanned {
                                None
                            } else {
                                Some(FieldValue::Null)
                            }
                        }
                        _ if fanned => None,
                        _ => Some(FieldValue::Null),
                    })
                    .collect();
            }
            PathStep::Wildcard => {
                fanned = true;
                values = values
                    .into_iter()
                    .flat_map(|v| match v {
                        FieldValue::Array(arr) => arr,
                        _ => Vec::new(),
                    })
                    .collect();
            }
            PathStep::Filter(pred) => {
                fanned = true;
                values = values
                    .into_iter()
                    .flat_map(|v| match v {
                        FieldValue::Array(arr) => arr,
                        _ => Vec::new(),
                    })
                    .filter(|elem| filter_matches(elem, pred))
                    .collect();
            }
        }
    }

    (values, fanned)
}

fn filter_matches(elem: &FieldValue, pred: &FilterPred) -> bool {
    let mut current = elem;
    for name in &pred.field_path {
        match current {
            FieldValue::Map(m) => match m.get(name) {
                Some(v) => current = v,
                None => return false,
            },
            _ => return false,
        }
    }

    match (current.as_f64(), pred.literal.as_f64()) {
        (Some(a), Some(b)) => match pred.op {
            FilterOp::Eq => a == b,
            FilterOp::Neq => a != b,
            FilterOp::Gt => a > b,
            FilterOp::Gte => a >= b,
            FilterOp::Lt => a < b,
            FilterOp::Lte => a <= b,
        },
        _ => match (current, &pred.literal) {
            (FieldValue::String(a), FieldValue::String(b)) => match pred.op {
                FilterOp::Eq => a == b,
                FilterOp::Neq => a != b,
                FilterOp::Gt => a > b,
                FilterOp::Gte => a >= b,
                FilterOp::Lt => a < b,
                FilterOp::Lte => a <= b,
            },
            (FieldValue::Boolean(a), FieldValue::Boolean(b)) => match pred.op {
                FilterOp::Eq => a == b,
                FilterOp::Neq => a != b,
                _ => false,
            },
            _ => false,
        },
    }
}

fn parse_path(path: &str) -> Result<Vec<PathStep>, String> {
    let mut chars = path.chars().peekable();
    let mut steps = Vec::new();

    if chars.next() != Some('$') {
        return Err(format!("invalid json path \"{}\": must start with $", path));
    }

    while let Some(&c) = chars.peek() {
        match c {
            '.' => {
                chars.next();
                let name = scan_member_name(&mut chars);
                if name.is_empty() {
                    return Err(format!("invalid json path \"{}\": empty member name", path));
                }
                steps.push(PathStep::Member(name));
            }
            '[' => {
                chars.next();
                skip_ws(&mut chars);
                match chars.peek() {
                    Some('*') => {
                        chars.next();
                        skip_ws(&mut chars);
                        expect_char(&mut chars, ']', path)?;
                        steps.push(PathStep::Wildcard);
                    }
                    Some('?') => {
                        chars.next();
                        let pred = parse_filter(&mut chars, path)?;
                        steps.push(PathStep::Filter(pred));
                    }
                    Some('"') | Some('\'') => {
                        let quote = *chars.peek().unwrap();
                        chars.next();
                        let mut name = String::new();
                        loop {
                            match chars.next() {
                                Some(c) if c == quote => break,
                                Some('\\') => {
                                    if let Some(escaped) = chars.next() {
                                        name.push(escaped);
                                    }
                                }
                                Some(c) => name.push(c),
                                None => {
                                    return Err(format!(
                                        "invalid json path \"{}\": unterminated quoted name",
                                        path
                                    ));
                                }
                            }
                        }
                        skip_ws(&mut chars);
                        expect_char(&mut chars, ']', path)?;
                        steps.push(PathStep::Member(name));
                    }
                    Some(c2) if c2.is_ascii_digit() || *c2 == '-' => {
                        let mut digits = String::new();
                        if *c2 == '-' {
                            digits.push('-');
                            chars.next();
                        }
                        while let Some(&d) = chars.peek() {
                            if d.is_ascii_digit() {
                                digits.push(d);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        let idx = digits
                            .parse::<i64>()
                            .map_err(|_| format!("invalid json path \"{}\": bad index", path))?;
                        skip_ws(&mut chars);
                        expect_char(&mut chars, ']', path)?;
                        steps.push(PathStep::Index(idx));
                    }
                    _ => {
                        return Err(format!("invalid json path \"{}\": bad selector", path));
                    }
                }
            }
            _ => {
                return Err(format!(
                    "invalid json path \"{}\": unexpected character '{}'",
                    path, c
                ));
            }
        }
    }

    Ok(steps)
}

fn parse_filter(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    path: &str,
) -> Result<FilterPred, String> {
    skip_ws(chars);
    let parenthesized = if chars.peek() == Some(&'(') {
        chars.next();
        skip_ws(chars);
        true
    } else {
        false
    };

    expect_char(chars, '@', path)?;
    let mut field_path = Vec::new();
    while chars.peek() == Some(&'.') {
        chars.next();
        let name = scan_member_name(chars);
        if name.is_empty() {
            return Err(format!("invalid json path \"{}\": empty filter member", path));
        }
        field_path.push(name);
    }
    if field_path.is_empty() {
        return Err(format!("invalid json path \"{}\": filter needs a member", path));
    }

    skip_ws(chars);
    let op = match chars.peek() {
        Some('=') => {
            chars.next();
            if chars.peek() == Some(&'=') {
                chars.next();
            }
            FilterOp::Eq
        }
        Some('!') => {
            chars.next();
            if chars.next() != Some('=') {
                return Err(format!("invalid json path \"{}\": bad filter operator", path));
            }
            FilterOp::Neq
        }
        Some('>') => {
            chars.next();
            if chars.peek() == Some(&'=') {
                chars.next();
                FilterOp::Gte
            } else {
                FilterOp::Gt
            }
        }
        Some('<') => {
            chars.next();
            if chars.peek() == Some(&'=') {
                chars.next();
                FilterOp::Lte
            } else {
                FilterOp::Lt
            }
        }
        _ => {
            return Err(format!("invalid json path \"{}\": bad filter operator", path));
        }
    };

    skip_ws(chars);
    let literal = parse_filter_literal(chars, path)?;
    skip_ws(chars);
    if parenthesized {
        expect_char(chars, ')', path)?;
        skip_ws(chars);
    }
    expect_char(chars, ']', path)?;

    Ok(FilterPred {
        field_path,
        op,
        literal,
    })
}

fn parse_filter_literal(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    path: &str,
) -> Result<FieldValue, String> {
    match chars.peek() {
        Some('"') | Some('\'') => {
            let quote = *chars.peek().unwrap();
            chars.next();
            let mut s = String::new();
            loop {
                match chars.next() {
                    Some(c) if c == quote => break,
                    Some(c) => s.push(c),
                    None => {
                        return Err(format!(
                            "invalid json path \"{}\": unterminated string literal",
                            path
                        ));
                    }
                }
            }
            Ok(FieldValue::String(s))
        }
        Some(c) if c.is_ascii_digit() || *c == '-' || *c == '.' => {
            let mut num = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() || d == '.' || d == '-' || d == 'e' || d == 'E' || d == '+' {
                    num.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            if num.contains('.') || num.contains('e') || num.contains('E') {
                num.parse::<f64>()
                    .map(FieldValue::Float)
                    .map_err(|_| format!("invalid json path \"{}\": bad number literal", path))
            } else {
                num.parse::<i64>()
                    .map(FieldValue::Integer)
                    .map_err(|_| format!("invalid json path \"{}\": bad number literal", path))
            }
        }
        Some('t') | Some('f') => {
            let word = scan_member_name(chars);
            match word.as_str() {
                "true" => Ok(FieldValue::Boolean(true)),
                "false" => Ok(FieldValue::Boolean(false)),
                _ => Err(format!("invalid json path \"{}\": bad literal", path)),
            }
        }
        _ => Err(format!("invalid json path \"{}\": bad literal", path)),
    }
}

fn scan_member_name(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut name = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_alphanumeric() || c == '_' || c == '-' {
            name.push(c);
            chars.next();
        } else {
            break;
        }
    }
    name
}

fn skip_ws(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while chars.peek() == Some(&' ') || chars.peek() == Some(&'\t') {
        chars.next();
    }
}

fn expect_char(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    expected: char,
    path: &str,
) -> Result<(), String> {
    if chars.next() == Some(expected) {
        Ok(())
    } else {
        Err(format!(
            "invalid json path \"{}\": expected '{}'",
            path, expected
        ))
    }
}
