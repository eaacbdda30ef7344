//! Scalar function library: string, math, type and metadata access helpers.

use chrono::{SecondsFormat, TimeZone, Utc};
use uuid::Uuid;

use super::{Arity, FunctionCategory, FunctionDef, FunctionExec};
use crate::eventsql::sql::error::{SqlError, SqlResult};
use crate::eventsql::sql::execution::types::FieldValue;

pub static FUNCTIONS: &[FunctionDef] = &[
    FunctionDef {
        name: "meta",
        category: FunctionCategory::Meta,
        arity: Arity::Exact(1),
        exec: FunctionExec::Scalar(identity_call),
    },
    // mqtt(topic) is the transport-flavored spelling of meta(topic)
    FunctionDef {
        name: "mqtt",
        category: FunctionCategory::Meta,
        arity: Arity::Exact(1),
        exec: FunctionExec::Scalar(identity_call),
    },
    FunctionDef {
        name: "cardinality",
        category: FunctionCategory::Scalar,
        arity: Arity::Exact(1),
        exec: FunctionExec::Scalar(cardinality_call),
    },
    FunctionDef {
        name: "isnull",
        category: FunctionCategory::Scalar,
        arity: Arity::Exact(1),
        exec: FunctionExec::Scalar(isnull_call),
    },
    FunctionDef {
        name: "cast",
        category: FunctionCategory::Scalar,
        arity: Arity::Exact(2),
        exec: FunctionExec::Scalar(cast_call),
    },
    FunctionDef {
        name: "tstamp",
        category: FunctionCategory::Scalar,
        arity: Arity::Exact(0),
        exec: FunctionExec::Scalar(tstamp_call),
    },
    FunctionDef {
        name: "newuuid",
        category: FunctionCategory::Scalar,
        arity: Arity::Exact(0),
        exec: FunctionExec::Scalar(newuuid_call),
    },
    FunctionDef {
        name: "lpad",
        category: FunctionCategory::Scalar,
        arity: Arity::Exact(2),
        exec: FunctionExec::Scalar(lpad_call),
    },
    FunctionDef {
        name: "lower",
        category: FunctionCategory::Scalar,
        arity: Arity::Exact(1),
        exec: FunctionExec::Scalar(lower_call),
    },
    FunctionDef {
        name: "upper",
        category: FunctionCategory::Scalar,
        arity: Arity::Exact(1),
        exec: FunctionExec::Scalar(upper_call),
    },
    FunctionDef {
        name: "length",
        category: FunctionCategory::Scalar,
        arity: Arity::Exact(1),
        exec: FunctionExec::Scalar(length_call),
    },
    FunctionDef {
        name: "indexof",
        category: FunctionCategory::Scalar,
        arity: Arity::Exact(2),
        exec: FunctionExec::Scalar(indexof_call),
    },
    FunctionDef {
        name: "concat",
        category: FunctionCategory::Scalar,
        arity: Arity::AtLeast(1),
        exec: FunctionExec::Scalar(concat_call),
    },
    FunctionDef {
        name: "sin",
        category: FunctionCategory::Scalar,
        arity: Arity::Exact(1),
        exec: FunctionExec::Scalar(math1_call),
    },
    FunctionDef {
        name: "cos",
        category: FunctionCategory::Scalar,
        arity: Arity::Exact(1),
        exec: FunctionExec::Scalar(math1_call),
    },
    FunctionDef {
        name: "ln",
        category: FunctionCategory::Scalar,
        arity: Arity::Exact(1),
        exec: FunctionExec::Scalar(math1_call),
    },
    FunctionDef {
        name: "log",
        category: FunctionCategory::Scalar,
        arity: Arity::Exact(1),
        exec: FunctionExec::Scalar(math1_call),
    },
    FunctionDef {
        name: "abs",
        category: FunctionCategory::Scalar,
        arity: Arity::Exact(1),
        exec: FunctionExec::Scalar(abs_call),
    },
    FunctionDef {
        name: "power",
        category: FunctionCategory::Scalar,
        arity: Arity::Exact(2),
        exec: FunctionExec::Scalar(power_call),
    },
];

/// meta()/mqtt() read their already-resolved metadata argument through.
fn identity_call(_name: &str, args: &[FieldValue]) -> SqlResult<FieldValue> {
    Ok(args[0].clone())
}

fn cardinality_call(name: &str, args: &[FieldValue]) -> SqlResult<FieldValue> {
    match &args[0] {
        FieldValue::Null => Ok(FieldValue::Integer(0)),
        FieldValue::Array(arr) => Ok(FieldValue::Integer(arr.len() as i64)),
        other => Err(SqlError::function_error(
            name,
            format!("requires array but found {}({})", other.type_name(), other),
        )),
    }
}

fn isnull_call(_name: &str, args: &[FieldValue]) -> SqlResult<FieldValue> {
    Ok(FieldValue::Boolean(args[0].is_null()))
}

fn cast_call(name: &str, args: &[FieldValue]) -> SqlResult<FieldValue> {
    let target = match &args[1] {
        FieldValue::String(s) => s.to_lowercase(),
        other => {
            return Err(SqlError::function_error(
                name,
                format!("expect string type for the 2nd parameter, got {}", other.type_name()),
            ));
        }
    };
    let value = &args[0];
    if value.is_null() {
        return Ok(FieldValue::Null);
    }

    match target.as_str() {
        "int" | "bigint" => match value {
            FieldValue::Integer(i) => Ok(FieldValue::Integer(*i)),
            FieldValue::Float(f) => Ok(FieldValue::Integer(*f as i64)),
            FieldValue::String(s) => s
                .trim()
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| SqlError::function_error(name, format!("cannot cast \"{}\" to int", s))),
            FieldValue::Boolean(b) => Ok(FieldValue::Integer(*b as i64)),
            other => Err(SqlError::function_error(
                name,
                format!("cannot cast {} to int", other.type_name()),
            )),
        },
        "float" | "double" => match value {
            FieldValue::Integer(i) => Ok(FieldValue::Float(*i as f64)),
            FieldValue::Float(f) => Ok(FieldValue::Float(*f)),
            FieldValue::String(s) => s
                .trim()
                .parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|_| {
                    SqlError::function_error(name, format!("cannot cast \"{}\" to float", s))
                }),
            other => Err(SqlError::function_error(
                name,
                format!("cannot cast {} to float", other.type_name()),
            )),
        },
        "string" => Ok(FieldValue::String(value.to_string())),
        "boolean" => match value {
            FieldValue::Boolean(b) => Ok(FieldValue::Boolean(*b)),
            FieldValue::Integer(i) => Ok(FieldValue::Boolean(*i != 0)),
            FieldValue::String(s) => match s.to_lowercase().as_str() {
                "true" => Ok(FieldValue::Boolean(true)),
                "false" => Ok(FieldValue::Boolean(false)),
                _ => Err(SqlError::function_error(
                    name,
                    format!("cannot cast \"{}\" to boolean", s),
                )),
            },
            other => Err(SqlError::function_error(
                name,
                format!("cannot cast {} to boolean", other.type_name()),
            )),
        },
        // Numeric input is unix epoch milliseconds, rendered RFC-3339 UTC
        "datetime" => {
            let millis = match value {
                FieldValue::Integer(i) => *i,
                FieldValue::Float(f) => *f as i64,
                other => {
                    return Err(SqlError::function_error(
                        name,
                        format!("cannot cast {} to datetime", other.type_name()),
                    ));
                }
            };
            let dt = Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
                SqlError::function_error(name, format!("invalid epoch milliseconds {}", millis))
            })?;
            Ok(FieldValue::String(
                dt.to_rfc3339_opts(SecondsFormat::Secs, true),
            ))
        }
        other => Err(SqlError::function_error(
            name,
            format!("unknown cast target type {}", other),
        )),
    }
}

fn tstamp_call(_name: &str, _args: &[FieldValue]) -> SqlResult<FieldValue> {
    Ok(FieldValue::Integer(Utc::now().timestamp_millis()))
}

fn newuuid_call(_name: &str, _args: &[FieldValue]) -> SqlResult<FieldValue> {
    Ok(FieldValue::String(Uuid::new_v4().to_string()))
}

fn string_arg<'a>(name: &str, value: &'a FieldValue) -> SqlResult<Option<&'a str>> {
    match value {
        FieldValue::Null => Ok(None),
        FieldValue::String(s) => Ok(Some(s)),
        other => Err(SqlError::function_error(
            name,
            format!("requires string but found {}({})", other.type_name(), other),
        )),
    }
}

fn lpad_call(name: &str, args: &[FieldValue]) -> SqlResult<FieldValue> {
    let s = match string_arg(name, &args[0])? {
        Some(s) => s,
        None => return Ok(FieldValue::Null),
    };
    let n = match &args[1] {
        FieldValue::Integer(i) if *i >= 0 => *i as usize,
        FieldValue::Integer(i) => {
            return Err(SqlError::function_error(
                name,
                format!("invalid pad length {}", i),
            ));
        }
        other => {
            return Err(SqlError::function_error(
                name,
                format!("requires int but found {}({})", other.type_name(), other),
            ));
        }
    };
    Ok(FieldValue::String(format!("{}{}", " ".repeat(n), s)))
}

fn lower_call(name: &str, args: &[FieldValue]) -> SqlResult<FieldValue> {
    Ok(match string_arg(name, &args[0])? {
        Some(s) => FieldValue::String(s.to_lowercase()),
        None => FieldValue::Null,
    })
}

fn upper_call(name: &str, args: &[FieldValue]) -> SqlResult<FieldValue> {
    Ok(match string_arg(name, &args[0])? {
        Some(s) => FieldValue::String(s.to_uppercase()),
        None => FieldValue::Null,
    })
}

fn length_call(name: &str, args: &[FieldValue]) -> SqlResult<FieldValue> {
    match &args[0] {
        FieldValue::Null => Ok(FieldValue::Null),
        FieldValue::String(s) => Ok(FieldValue::Integer(s.chars().count() as i64)),
        FieldValue::Array(arr) => Ok(FieldValue::Integer(arr.len() as i64)),
        other => Err(SqlError::function_error(
            name,
            format!("requires string but found {}({})", other.type_name(), other),
        )),
    }
}

/// 0-based index of the second argument within the first, -1 when absent.
fn indexof_call(name: &str, args: &[FieldValue]) -> SqlResult<FieldValue> {
    let haystack = match string_arg(name, &args[0])? {
        Some(s) => s,
        None => return Ok(FieldValue::Null),
    };
    let needle = match string_arg(name, &args[1])? {
        Some(s) => s,
        None => return Ok(FieldValue::Null),
    };
    match haystack.find(needle) {
        Some(byte_idx) => {
            let char_idx = haystack[..byte_idx].chars().count() as i64;
            Ok(FieldValue::Integer(char_idx))
        }
        None => Ok(FieldValue::Integer(-1)),
    }
}

fn concat_call(name: &str, args: &[FieldValue]) -> SqlResult<FieldValue> {
    let mut out = String::new();
    for arg in args {
        match arg {
            FieldValue::Null => return Ok(FieldValue::Null),
            FieldValue::String(s) => out.push_str(s),
            FieldValue::Integer(_) | FieldValue::Float(_) | FieldValue::Boolean(_) => {
                out.push_str(&arg.to_string())
            }
            other => {
                return Err(SqlError::function_error(
                    name,
                    format!("requires string but found {}({})", other.type_name(), other),
                ));
            }
        }
    }
    Ok(FieldValue::String(out))
}

fn numeric_arg(name: &str, value: &FieldValue) -> SqlResult<Option<f64>> {
    match value {
        FieldValue::Null => Ok(None),
        other => other.as_f64().map(Some).ok_or_else(|| {
            SqlError::function_error(
                name,
                format!("requires number but found {}({})", other.type_name(), other),
            )
        }),
    }
}

fn math1_call(name: &str, args: &[FieldValue]) -> SqlResult<FieldValue> {
    let x = match numeric_arg(name, &args[0])? {
        Some(x) => x,
        None => return Ok(FieldValue::Null),
    };
    let result = match name {
        "sin" => x.sin(),
        "cos" => x.cos(),
        "ln" => x.ln(),
        "log" => x.log10(),
        _ => return Err(SqlError::function_error(name, "unknown math function")),
    };
    Ok(FieldValue::Float(result))
}

fn abs_call(name: &str, args: &[FieldValue]) -> SqlResult<FieldValue> {
    match &args[0] {
        FieldValue::Null => Ok(FieldValue::Null),
        FieldValue::Integer(i) => Ok(FieldValue::Integer(i.abs())),
        FieldValue::Float(f) => Ok(FieldValue::Float(f.abs())),
        other => Err(SqlError::function_error(
            name,
            format!("requires number but found {}({})", other.type_name(), other),
        )),
    }
}

fn power_call(name: &str, args: &[FieldValue]) -> SqlResult<FieldValue> {
    let x = match numeric_arg(name, &args[0])? {
        Some(x) => x,
        None => return Ok(FieldValue::Null),
    };
    let y = match numeric_arg(name, &args[1])? {
        Some(y) => y,
        None => return Ok(FieldValue::Null),
    };
    Ok(FieldValue::Float(x.powf(y)))
}
