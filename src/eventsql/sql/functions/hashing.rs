//! Hash function family: lowercase hex digests of the UTF-8 input.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use super::{Arity, FunctionCategory, FunctionDef, FunctionExec};
use crate::eventsql::sql::error::{SqlError, SqlResult};
use crate::eventsql::sql::execution::types::FieldValue;

pub static FUNCTIONS: &[FunctionDef] = &[
    FunctionDef {
        name: "md5",
        category: FunctionCategory::Scalar,
        arity: Arity::Exact(1),
        exec: FunctionExec::Scalar(hash_call),
    },
    FunctionDef {
        name: "sha1",
        category: FunctionCategory::Scalar,
        arity: Arity::Exact(1),
        exec: FunctionExec::Scalar(hash_call),
    },
    FunctionDef {
        name: "sha256",
        category: FunctionCategory::Scalar,
        arity: Arity::Exact(1),
        exec: FunctionExec::Scalar(hash_call),
    },
    FunctionDef {
        name: "sha384",
        category: FunctionCategory::Scalar,
        arity: Arity::Exact(1),
        exec: FunctionExec::Scalar(hash_call),
    },
    FunctionDef {
        name: "sha512",
        category: FunctionCategory::Scalar,
        arity: Arity::Exact(1),
        exec: FunctionExec::Scalar(hash_call),
    },
];

fn hash_call(name: &str, args: &[FieldValue]) -> SqlResult<FieldValue> {
    let bytes: &[u8] = match &args[0] {
        FieldValue::Null => return Ok(FieldValue::Null),
        FieldValue::String(s) => s.as_bytes(),
        FieldValue::Bytes(b) => b.as_slice(),
        other => {
            return Err(SqlError::function_error(
                name,
                format!("requires string but found {}({})", other.type_name(), other),
            ));
        }
    };

    let digest = match name {
        "md5" => format!("{:x}", Md5::digest(bytes)),
        "sha1" => format!("{:x}", Sha1::digest(bytes)),
        "sha256" => format!("{:x}", Sha256::digest(bytes)),
        "sha384" => format!("{:x}", Sha384::digest(bytes)),
        "sha512" => format!("{:x}", Sha512::digest(bytes)),
        _ => {
            return Err(SqlError::function_error(name, "unknown hash algorithm"));
        }
    };
    Ok(FieldValue::String(digest))
}
