/*!
# Streaming SQL parser

Recursive descent parser for rule statements over event streams. The parser
converts SQL text into the [`SelectStatement`] AST consumed by the runtime.

Two phases:

1. **Tokenization** ([`lexer`]) — text to tokens with position information
2. **Parsing** — top-down for statement shape, climbing precedence for
   expressions, with a one-token lookahead buffer

Function calls are resolved against the function registry while parsing, so
unknown names and arity mistakes surface at compile time of the rule, not
at evaluation time. Window clauses are canonicalized to millisecond lengths
and intervals here.

## Example

```rust,no_run
use eventsql::eventsql::sql::parser::EventSqlParser;

let parser = EventSqlParser::new();
let stmt = parser.parse("SELECT temperature AS t FROM sensors WHERE t > 20")?;
# Ok::<(), eventsql::eventsql::sql::error::SqlError>(())
```
*/

pub mod common;
pub mod expressions;
pub mod lexer;
pub mod select;

use std::collections::HashMap;

use crate::eventsql::sql::ast::SelectStatement;
use crate::eventsql::sql::error::SqlError;
use common::TokenParser;
use lexer::{Token, TokenType};

pub use lexer::is_reserved_word;

/// Main parser for streaming SQL rule statements.
///
/// Construction builds the keyword table once; a parser value can then be
/// shared freely (parsing never mutates it).
#[derive(Debug, Clone)]
pub struct EventSqlParser {
    keywords: HashMap<String, TokenType>,
}

impl EventSqlParser {
    pub fn new() -> Self {
        EventSqlParser {
            keywords: lexer::build_keywords(),
        }
    }

    /// Parse a single SELECT statement. Trailing semicolons are accepted;
    /// any other trailing token fails with `found "X", expected EOF.`
    pub fn parse(&self, sql: &str) -> Result<SelectStatement, SqlError> {
        let tokens = lexer::tokenize(sql, &self.keywords)?;
        let mut parser = TokenParser::new(tokens);
        let stmt = parser.parse_select()?;
        parser.consume_if(TokenType::Semicolon);
        if !parser.at_end() {
            return Err(parser.err_found("EOF"));
        }
        Ok(stmt)
    }

    /// Parse a `;`-separated sequence of SELECT statements.
    pub fn parse_statements(&self, sql: &str) -> Result<Vec<SelectStatement>, SqlError> {
        let tokens = lexer::tokenize(sql, &self.keywords)?;
        let mut parser = TokenParser::new(tokens);
        let mut statements = Vec::new();
        loop {
            while parser.consume_if(TokenType::Semicolon) {}
            if parser.at_end() {
                break;
            }
            statements.push(parser.parse_select()?);
            if !parser.at_end() && !parser.consume_if(TokenType::Semicolon) {
                return Err(parser.err_found("EOF"));
            }
        }
        Ok(statements)
    }

    #[doc(hidden)]
    pub fn tokenize(&self, sql: &str) -> Result<Vec<Token>, SqlError> {
        lexer::tokenize(sql, &self.keywords)
    }
}

impl Default for EventSqlParser {
    fn default() -> Self {
        Self::new()
    }
}
