use std::fmt;

/// Errors that can occur during SQL parsing and evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum SqlError {
    /// SQL parsing errors
    ParseError {
        message: String,
        position: Option<usize>,
    },

    /// Expression evaluation errors
    ExecutionError {
        message: String,
    },

    /// Type mismatch during evaluation
    TypeError {
        expected: String,
        actual: String,
    },

    /// A built-in function rejected its arguments at runtime.
    /// Rendered as `run <funcname> function error: <detail>`, which is
    /// part of the wire contract the runtime exposes to users.
    FunctionError {
        function: String,
        detail: String,
    },

    /// Lookup of a named entity (function, stream, column) failed
    NotFound {
        entity: String,
    },
}

/// Coarse error categories surfaced to the external control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotFound,
    BadRequest,
    Internal,
}

impl fmt::Display for SqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlError::ParseError { message, position } => {
                if let Some(pos) = position {
                    write!(f, "SQL parse error at position {}: {}", pos, message)
                } else {
                    write!(f, "SQL parse error: {}", message)
                }
            }
            SqlError::ExecutionError { message } => {
                write!(f, "SQL execution error: {}", message)
            }
            SqlError::TypeError { expected, actual } => {
                write!(f, "Type error: expected {}, got {}", expected, actual)
            }
            SqlError::FunctionError { function, detail } => {
                write!(f, "run {} function error: {}", function, detail)
            }
            SqlError::NotFound { entity } => {
                write!(f, "{} not found", entity)
            }
        }
    }
}

impl std::error::Error for SqlError {}

impl SqlError {
    /// Create a parse error with an optional source position
    pub fn parse_error(message: impl Into<String>, position: Option<usize>) -> Self {
        SqlError::ParseError {
            message: message.into(),
            position,
        }
    }

    /// Create an execution error
    pub fn execution_error(message: impl Into<String>) -> Self {
        SqlError::ExecutionError {
            message: message.into(),
        }
    }

    /// Create a type error
    pub fn type_error(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        SqlError::TypeError {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a function call error (`run X function error: detail`)
    pub fn function_error(function: impl Into<String>, detail: impl Into<String>) -> Self {
        SqlError::FunctionError {
            function: function.into(),
            detail: detail.into(),
        }
    }

    /// Create a not-found error for a named entity
    pub fn not_found(entity: impl Into<String>) -> Self {
        SqlError::NotFound {
            entity: entity.into(),
        }
    }

    /// The parse-level message without the position prefix, when present.
    pub fn message(&self) -> String {
        match self {
            SqlError::ParseError { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Map the error onto the control plane's coarse categories.
    pub fn code(&self) -> ErrorCode {
        match self {
            SqlError::NotFound { .. } => ErrorCode::NotFound,
            SqlError::ParseError { .. } | SqlError::TypeError { .. } => ErrorCode::BadRequest,
            SqlError::ExecutionError { .. } | SqlError::FunctionError { .. } => ErrorCode::Internal,
        }
    }
}

/// Result type for SQL operations
pub type SqlResult<T> = Result<T, SqlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_error_wire_format() {
        let err = SqlError::function_error("json_path_query", "the first argument must be a map but got nil");
        assert_eq!(
            err.to_string(),
            "run json_path_query function error: the first argument must be a map but got nil"
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(SqlError::not_found("function sample").code(), ErrorCode::NotFound);
        assert_eq!(SqlError::parse_error("bad", None).code(), ErrorCode::BadRequest);
        assert_eq!(SqlError::execution_error("boom").code(), ErrorCode::Internal);
    }
}
