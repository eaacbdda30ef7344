/*!
Expression parsing.

Implements the precedence ladder with one method per level:

```text
Level 1 (lowest):  OR                  (parse_logical_or)
Level 2:           AND                 (parse_logical_and)
Level 3:           = !=                (parse_equality)
Level 4:           > >= < <=           (parse_comparison)
Level 5:           + -                 (parse_additive)
Level 6:           * / %               (parse_multiplicative)
Level 7:           -> [idx] [s:e]      (parse_postfix)
Level 8 (highest): primary             (parse_primary)
```

`->` and `[...]` apply as postfix operators left-to-right, so
`children[0]->first` selects the key from the indexed element and
`children->first[2]` indexes into the selected key.
*/

use super::common::TokenParser;
use super::lexer::TokenType;
use crate::eventsql::sql::ast::*;
use crate::eventsql::sql::error::SqlError;
use crate::eventsql::sql::functions::{self, FunctionCategory};

impl TokenParser {
    /// Entry point for expression parsing.
    pub(super) fn parse_expression(&mut self) -> Result<Expr, SqlError> {
        self.parse_logical_or()
    }

    fn parse_logical_or(&mut self) -> Result<Expr, SqlError> {
        let mut left = self.parse_logical_and()?;
        while self.current_token().token_type == TokenType::Or {
            self.advance();
            let right = self.parse_logical_and()?;
            left = Expr::BinaryOp {
                op: BinaryOperator::Or,
                lhs: Box::new(left),
                rhs: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expr, SqlError> {
        let mut left = self.parse_equality()?;
        while self.current_token().token_type == TokenType::And {
            self.advance();
            let right = self.parse_equality()?;
            left = Expr::BinaryOp {
                op: BinaryOperator::And,
                lhs: Box::new(left),
                rhs: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, SqlError> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.current_token().token_type {
                TokenType::Equal => BinaryOperator::Equal,
                TokenType::NotEqual => BinaryOperator::NotEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::BinaryOp {
                op,
                lhs: Box::new(left),
                rhs: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, SqlError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.current_token().token_type {
                TokenType::GreaterThan => BinaryOperator::GreaterThan,
                TokenType::GreaterThanOrEqual => BinaryOperator::GreaterThanOrEqual,
                TokenType::LessThan => BinaryOperator::LessThan,
                TokenType::LessThanOrEqual => BinaryOperator::LessThanOrEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::BinaryOp {
                op,
                lhs: Box::new(left),
                rhs: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, SqlError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current_token().token_type {
                TokenType::Plus => BinaryOperator::Add,
                TokenType::Minus => BinaryOperator::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::BinaryOp {
                op,
                lhs: Box::new(left),
                rhs: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, SqlError> {
        let mut left = self.parse_postfix()?;
        loop {
            let op = match self.current_token().token_type {
                TokenType::Asterisk => BinaryOperator::Multiply,
                TokenType::Divide => BinaryOperator::Divide,
                TokenType::Modulo => BinaryOperator::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_postfix()?;
            left = Expr::BinaryOp {
                op,
                lhs: Box::new(left),
                rhs: Box::new(right),
            };
        }
        Ok(left)
    }

    /// Postfix JSON access: `-> key`, `[index]`, `[start:end]`.
    fn parse_postfix(&mut self) -> Result<Expr, SqlError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.current_token().token_type {
                TokenType::Arrow => {
                    self.advance();
                    let name = self.expect_identifier("key name after '->'")?;
                    expr = Expr::BinaryOp {
                        op: BinaryOperator::Arrow,
                        lhs: Box::new(expr),
                        rhs: Box::new(Expr::JsonFieldRef(name)),
                    };
                }
                TokenType::LeftBracket => {
                    self.advance();
                    let subset = self.parse_subset_rhs()?;
                    expr = Expr::BinaryOp {
                        op: BinaryOperator::Subset,
                        lhs: Box::new(expr),
                        rhs: Box::new(subset),
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// The interior of `[...]`: an index or a slice. Missing start is 0,
    /// missing end is the open-ended sentinel.
    fn parse_subset_rhs(&mut self) -> Result<Expr, SqlError> {
        if self.consume_if(TokenType::Colon) {
            if self.consume_if(TokenType::RightBracket) {
                return Ok(Expr::Slice {
                    start: Box::new(Expr::IntegerLiteral(0)),
                    end: Box::new(Expr::IntegerLiteral(SLICE_OPEN_END)),
                });
            }
            let end = self.parse_expression()?;
            self.expect(TokenType::RightBracket, "right bracket")?;
            return Ok(Expr::Slice {
                start: Box::new(Expr::IntegerLiteral(0)),
                end: Box::new(end),
            });
        }

        let first = self.parse_expression()?;
        if self.consume_if(TokenType::Colon) {
            let end = if self.consume_if(TokenType::RightBracket) {
                Expr::IntegerLiteral(SLICE_OPEN_END)
            } else {
                let e = self.parse_expression()?;
                self.expect(TokenType::RightBracket, "right bracket")?;
                e
            };
            Ok(Expr::Slice {
                start: Box::new(first),
                end: Box::new(end),
            })
        } else {
            self.expect(TokenType::RightBracket, "right bracket")?;
            Ok(Expr::Index {
                index: Box::new(first),
            })
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, SqlError> {
        let token = self.current_token().clone();
        match token.token_type {
            TokenType::Integer => {
                self.advance();
                let v = token.value.parse::<i64>().map_err(|_| {
                    SqlError::parse_error(
                        format!("invalid integer literal {}", token.value),
                        Some(token.position),
                    )
                })?;
                Ok(Expr::IntegerLiteral(v))
            }
            TokenType::Number => {
                self.advance();
                let v = token.value.parse::<f64>().map_err(|_| {
                    SqlError::parse_error(
                        format!("invalid number literal {}", token.value),
                        Some(token.position),
                    )
                })?;
                Ok(Expr::NumberLiteral(v))
            }
            TokenType::String => {
                self.advance();
                Ok(Expr::StringLiteral(token.value))
            }
            TokenType::True => {
                self.advance();
                Ok(Expr::BooleanLiteral(true))
            }
            TokenType::False => {
                self.advance();
                Ok(Expr::BooleanLiteral(false))
            }
            TokenType::Minus => self.parse_negative_literal(),
            TokenType::Case => {
                self.advance();
                self.parse_case_expression()
            }
            TokenType::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenType::RightParen, "right paren")?;
                Ok(expr)
            }
            TokenType::Identifier => self.parse_identifier_expr(),
            _ => Err(self.err_found("expression")),
        }
    }

    /// Unary minus folds into numeric literals only; `-.3` and the spaced
    /// `-. 3` both read as a negative fraction.
    fn parse_negative_literal(&mut self) -> Result<Expr, SqlError> {
        self.advance(); // consume '-'
        let token = self.current_token().clone();
        match token.token_type {
            TokenType::Integer => {
                self.advance();
                let v = token.value.parse::<i64>().map_err(|_| {
                    SqlError::parse_error(
                        format!("invalid integer literal {}", token.value),
                        Some(token.position),
                    )
                })?;
                Ok(Expr::IntegerLiteral(-v))
            }
            TokenType::Number => {
                self.advance();
                let v = token.value.parse::<f64>().map_err(|_| {
                    SqlError::parse_error(
                        format!("invalid number literal {}", token.value),
                        Some(token.position),
                    )
                })?;
                Ok(Expr::NumberLiteral(-v))
            }
            TokenType::Dot => {
                self.advance();
                let digits = self.expect(TokenType::Integer, "digits after '.'")?;
                let v = format!("0.{}", digits.value).parse::<f64>().map_err(|_| {
                    SqlError::parse_error(
                        format!("invalid number literal 0.{}", digits.value),
                        Some(digits.position),
                    )
                })?;
                Ok(Expr::NumberLiteral(-v))
            }
            _ => {
                // Report against the '-' itself, as the original dialect does
                Err(SqlError::parse_error(
                    "found \"-\", expected expression.".to_string(),
                    Some(token.position),
                ))
            }
        }
    }

    /// An identifier starts a call, a qualified reference, or a bare
    /// column/metadata reference depending on what follows.
    fn parse_identifier_expr(&mut self) -> Result<Expr, SqlError> {
        let token = self.current_token().clone();
        self.advance();

        match self.current_token().token_type {
            TokenType::LeftParen => self.parse_call(token.value, token.position),
            TokenType::Dot => {
                self.advance();
                let field = match self.current_token().token_type {
                    TokenType::Identifier => {
                        let name = self.current_token().value.clone();
                        self.advance();
                        name
                    }
                    TokenType::Asterisk => {
                        self.advance();
                        "*".to_string()
                    }
                    _ => return Err(self.err_found("field name after '.'")),
                };
                if self.current_token().token_type == TokenType::Dot {
                    return Err(SqlError::parse_error(
                        "Too many field names. Please use -> to reference keys in struct.",
                        Some(self.current_token().position),
                    ));
                }
                Ok(self.make_ref(StreamName::Named(token.value), field))
            }
            _ => Ok(self.make_ref(StreamName::Default, token.value)),
        }
    }

    fn make_ref(&self, stream: StreamName, name: String) -> Expr {
        if self.in_meta {
            Expr::MetaRef { stream, name }
        } else {
            Expr::FieldRef { stream, name }
        }
    }

    /// Parse `name(args...)`, consulting the function registry for
    /// existence, argument validation and metadata-mode argument parsing.
    fn parse_call(&mut self, name: String, position: usize) -> Result<Expr, SqlError> {
        let def = functions::find_function(&name).ok_or_else(|| {
            SqlError::parse_error(format!("function {} not found", name), Some(position))
        })?;

        self.advance(); // consume '('
        let was_meta = self.in_meta;
        if def.category == FunctionCategory::Meta {
            self.in_meta = true;
        }

        let result = self.parse_call_args();
        self.in_meta = was_meta;
        let mut args = result?;

        self.expect(TokenType::RightParen, "right paren")?;

        let lname = name.to_lowercase();
        def.arity.check(&lname, args.len())?;
        if lname == "deduplicate" {
            // User-facing signature is deduplicate(col, all); the evaluator
            // receives the whole record as the deduplicated value.
            args.insert(0, Expr::Wildcard);
        }

        Ok(Expr::Call { name, args })
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, SqlError> {
        let mut args = Vec::new();
        if self.current_token().token_type == TokenType::RightParen {
            return Ok(args);
        }

        if self.current_token().token_type == TokenType::Asterisk {
            // A wildcard argument must stand alone: count(*), echo(*)
            self.advance();
            if self.in_meta {
                args.push(Expr::MetaRef {
                    stream: StreamName::Default,
                    name: "*".to_string(),
                });
            } else {
                args.push(Expr::Wildcard);
            }
            if self.current_token().token_type != TokenType::RightParen {
                return Err(self.err_found("right paren"));
            }
            return Ok(args);
        }

        loop {
            args.push(self.parse_expression()?);
            if !self.consume_if(TokenType::Comma) {
                break;
            }
        }
        Ok(args)
    }

    /// CASE [value] WHEN … THEN … [WHEN …]* [ELSE …] END
    fn parse_case_expression(&mut self) -> Result<Expr, SqlError> {
        let value = if self.current_token().token_type == TokenType::When {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };

        let mut when_clauses = Vec::new();
        while self.consume_if(TokenType::When) {
            let condition = self.parse_expression()?;
            if value.is_none() && !condition.is_condition() {
                return Err(SqlError::parse_error(
                    "invalid CASE expression, WHEN expression must be a bool condition",
                    Some(self.current_token().position),
                ));
            }
            self.expect(TokenType::Then, "THEN")?;
            let result = self.parse_expression()?;
            when_clauses.push(WhenClause { condition, result });
        }

        if when_clauses.is_empty() {
            return Err(SqlError::parse_error(
                "invalid CASE expression, WHEN expected before ELSE",
                Some(self.current_token().position),
            ));
        }

        let else_clause = if self.consume_if(TokenType::Else) {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };

        self.expect(TokenType::End, "END")?;

        Ok(Expr::Case {
            value,
            when_clauses,
            else_clause,
        })
    }
}
