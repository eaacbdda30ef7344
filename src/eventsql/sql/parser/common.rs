/*!
Token navigation infrastructure for recursive descent parsing.

`TokenParser` owns the token stream and provides the current/peek/advance
primitives plus the shared `found X, expected Y` error construction used by
every clause parser.
*/

use super::lexer::{Token, TokenType};
use crate::eventsql::sql::error::SqlError;

pub struct TokenParser {
    tokens: Vec<Token>,
    current: usize,
    /// Set while parsing the argument of `meta(...)`/`mqtt(...)`: field
    /// references resolve against tuple metadata instead of the message.
    pub(super) in_meta: bool,
}

impl TokenParser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            in_meta: false,
        }
    }

    /// Get the current token without advancing.
    pub fn current_token(&self) -> &Token {
        if self.current < self.tokens.len() {
            &self.tokens[self.current]
        } else {
            // tokenize() always appends Eof, so this is unreachable in
            // practice; keep a static fallback to avoid Option plumbing.
            static EOF_TOKEN: Token = Token {
                token_type: TokenType::Eof,
                value: String::new(),
                position: 0,
            };
            &EOF_TOKEN
        }
    }

    /// Peek ahead without consuming. `offset` 1 is the next token.
    pub fn peek_token(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.current + offset)
    }

    /// Advance to the next token; never moves past Eof.
    pub fn advance(&mut self) {
        if self.current < self.tokens.len() - 1 {
            self.current += 1;
        }
    }

    pub fn at_end(&self) -> bool {
        self.current_token().token_type == TokenType::Eof
    }

    /// The standard parse failure: `found "X", expected Y.`
    pub fn err_found(&self, expected: &str) -> SqlError {
        let token = self.current_token();
        SqlError::parse_error(
            format!("found \"{}\", expected {}.", token.describe(), expected),
            Some(token.position),
        )
    }

    /// Consume a token of the expected type or fail with the given
    /// human-readable expectation.
    pub fn expect(&mut self, expected: TokenType, what: &str) -> Result<Token, SqlError> {
        let token = self.current_token().clone();
        if token.token_type == expected {
            self.advance();
            Ok(token)
        } else {
            Err(self.err_found(what))
        }
    }

    /// Consume an identifier token and return its text.
    pub fn expect_identifier(&mut self, what: &str) -> Result<String, SqlError> {
        let token = self.current_token().clone();
        if token.token_type == TokenType::Identifier {
            self.advance();
            Ok(token.value)
        } else {
            Err(self.err_found(what))
        }
    }

    /// Consume the current token if it matches, returning whether it did.
    pub fn consume_if(&mut self, expected: TokenType) -> bool {
        if self.current_token().token_type == expected {
            self.advance();
            true
        } else {
            false
        }
    }
}
