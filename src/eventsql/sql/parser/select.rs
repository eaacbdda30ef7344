/*!
SELECT statement parsing: projection list, sources, joins, WHERE, GROUP BY
dimensions (including the five window forms), HAVING and ORDER BY.

Window clauses are canonicalized here: time units collapse to millisecond
lengths and intervals, so the runtime only ever sees one time scale.
*/

use super::common::TokenParser;
use super::lexer::TokenType;
use crate::eventsql::sql::ast::*;
use crate::eventsql::sql::error::SqlError;
use crate::eventsql::sql::functions;

/// Millisecond factor for a window time-unit identifier.
fn time_unit_factor(unit: &str) -> Option<i64> {
    match unit {
        "dd" => Some(86_400_000),
        "hh" => Some(3_600_000),
        "mi" => Some(60_000),
        "ss" => Some(1_000),
        "ms" => Some(1),
        _ => None,
    }
}

fn window_type_for(name: &str) -> Option<WindowType> {
    match name.to_uppercase().as_str() {
        "TUMBLINGWINDOW" => Some(WindowType::Tumbling),
        "HOPPINGWINDOW" => Some(WindowType::Hopping),
        "SESSIONWINDOW" => Some(WindowType::Session),
        "SLIDINGWINDOW" => Some(WindowType::Sliding),
        "COUNTWINDOW" => Some(WindowType::Count),
        _ => None,
    }
}

impl TokenParser {
    /// Parse one SELECT statement up to (but not including) its terminator.
    pub(super) fn parse_select(&mut self) -> Result<SelectStatement, SqlError> {
        let token = self.current_token().clone();
        if token.token_type != TokenType::Select {
            return Err(SqlError::parse_error(
                format!("Found \"{}\", Expected SELECT.", token.describe()),
                Some(token.position),
            ));
        }
        self.advance();

        let fields = self.parse_field_list()?;
        self.expect(TokenType::From, "FROM")?;
        let sources = vec![self.parse_table()?];
        let joins = self.parse_joins()?;

        let condition = if self.consume_if(TokenType::Where) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        let dimensions = if self.consume_if(TokenType::Group) {
            self.expect(TokenType::By, "BY")?;
            self.parse_dimensions()?
        } else {
            Vec::new()
        };

        let having = if self.consume_if(TokenType::Having) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        let sort_fields = if self.consume_if(TokenType::Order) {
            self.expect(TokenType::By, "BY")?;
            self.parse_sort_fields()?
        } else {
            Vec::new()
        };

        let stmt = SelectStatement {
            fields,
            sources,
            joins,
            condition,
            dimensions,
            having,
            sort_fields,
        };
        validate_aggregate_placement(&stmt)?;
        Ok(stmt)
    }

    fn parse_field_list(&mut self) -> Result<Vec<Field>, SqlError> {
        let mut fields = Vec::new();
        loop {
            if self.current_token().token_type == TokenType::Asterisk {
                self.advance();
                fields.push(Field {
                    expr: Expr::Wildcard,
                    name: String::new(),
                    alias: None,
                });
                // A bare wildcard closes the projection list
                if self.current_token().token_type != TokenType::From {
                    return Err(self.err_found("FROM"));
                }
                break;
            }

            let expr = self.parse_expression()?;
            let alias = if self.consume_if(TokenType::As) {
                Some(self.expect_identifier("alias name")?)
            } else {
                None
            };
            let name = expr.default_field_name();
            fields.push(Field { expr, name, alias });

            if !self.consume_if(TokenType::Comma) {
                break;
            }
        }
        Ok(fields)
    }

    fn parse_table(&mut self) -> Result<Table, SqlError> {
        let name = self.expect_identifier("source name")?;
        let alias = if self.consume_if(TokenType::As) {
            Some(self.expect_identifier("source alias")?)
        } else {
            None
        };
        Ok(Table { name, alias })
    }

    fn parse_joins(&mut self) -> Result<Vec<Join>, SqlError> {
        let mut joins = Vec::new();
        loop {
            let join_type = match self.current_token().token_type {
                TokenType::Left => JoinType::Left,
                TokenType::Right => JoinType::Right,
                TokenType::Inner => JoinType::Inner,
                TokenType::Full => JoinType::Full,
                TokenType::Cross => JoinType::Cross,
                _ => break,
            };
            self.advance();
            self.expect(TokenType::Join, "JOIN")?;

            let table = self.parse_table()?;
            let on = if self.consume_if(TokenType::On) {
                Some(self.parse_expression()?)
            } else {
                None
            };

            if join_type == JoinType::Cross && on.is_some() {
                return Err(SqlError::parse_error(
                    "On expression is not required for cross join type.",
                    Some(self.current_token().position),
                ));
            }

            joins.push(Join {
                name: table.name,
                alias: table.alias,
                join_type,
                on,
            });
        }
        Ok(joins)
    }

    fn parse_dimensions(&mut self) -> Result<Vec<Dimension>, SqlError> {
        let mut dimensions = Vec::new();
        loop {
            let token = self.current_token().clone();
            let window_type = if token.token_type == TokenType::Identifier
                && self.peek_token(1).map(|t| t.token_type.clone()) == Some(TokenType::LeftParen)
            {
                window_type_for(&token.value)
            } else {
                None
            };

            match window_type {
                Some(wt) => {
                    let window = self.parse_window(wt)?;
                    dimensions.push(Dimension::Window(window));
                }
                None => dimensions.push(Dimension::Expr(self.parse_expression()?)),
            }

            if !self.consume_if(TokenType::Comma) {
                break;
            }
        }

        let window_count = dimensions
            .iter()
            .filter(|d| matches!(d, Dimension::Window(_)))
            .count();
        if window_count > 1 {
            return Err(SqlError::parse_error(
                "At most one window is allowed in GROUP BY clause.",
                Some(self.current_token().position),
            ));
        }

        Ok(dimensions)
    }

    fn parse_window(&mut self, window_type: WindowType) -> Result<WindowSpec, SqlError> {
        let lname = window_type.as_str().to_lowercase();
        self.advance(); // window name
        self.expect(TokenType::LeftParen, "left paren")?;

        let mut args = Vec::new();
        if self.current_token().token_type != TokenType::RightParen {
            loop {
                args.push(self.parse_expression()?);
                if !self.consume_if(TokenType::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenType::RightParen, "right paren")?;

        let (length, interval) = match window_type {
            WindowType::Tumbling | WindowType::Sliding => {
                if args.len() != 2 {
                    return Err(SqlError::parse_error(
                        format!("The arguments for {} should be 2.", lname),
                        None,
                    ));
                }
                let factor = self.window_unit(&lname, &args[0])?;
                let n = self.window_int(&lname, &args[1], "2nd")?;
                (n * factor, 0)
            }
            WindowType::Hopping | WindowType::Session => {
                if args.len() != 3 {
                    return Err(SqlError::parse_error(
                        format!("The arguments for {} should be 3.", lname),
                        None,
                    ));
                }
                let factor = self.window_unit(&lname, &args[0])?;
                let n = self.window_int(&lname, &args[1], "2nd")?;
                let m = self.window_int(&lname, &args[2], "3rd")?;
                (n * factor, m * factor)
            }
            WindowType::Count => {
                if args.is_empty() || args.len() > 2 {
                    return Err(SqlError::parse_error(
                        "The arguments for countwindow should be 1 or 2.",
                        None,
                    ));
                }
                let length = self.window_int(&lname, &args[0], "1st")?;
                let interval = if args.len() == 2 {
                    let i = self.window_int(&lname, &args[1], "2nd")?;
                    if i >= length {
                        return Err(SqlError::parse_error(
                            format!(
                                "The second parameter value {} should be less than the first parameter {}.",
                                i, length
                            ),
                            None,
                        ));
                    }
                    i
                } else {
                    0
                };
                (length, interval)
            }
        };

        let filter = self.parse_window_filter()?;

        Ok(WindowSpec {
            window_type,
            length,
            interval,
            filter,
        })
    }

    fn window_unit(&self, lname: &str, arg: &Expr) -> Result<i64, SqlError> {
        let unit_err = || {
            SqlError::parse_error(
                format!(
                    "The 1st argument for {} is expecting timer literal expression. One value of [dd|hh|mi|ss|ms].",
                    lname
                ),
                None,
            )
        };
        match arg {
            Expr::FieldRef { stream, name } if stream.is_default() => {
                time_unit_factor(name).ok_or_else(unit_err)
            }
            _ => Err(unit_err()),
        }
    }

    fn window_int(&self, lname: &str, arg: &Expr, ordinal: &str) -> Result<i64, SqlError> {
        match arg {
            Expr::IntegerLiteral(v) => Ok(*v),
            _ => Err(SqlError::parse_error(
                format!(
                    "The {} argument for {} is expecting an integer literal expression.",
                    ordinal, lname
                ),
                None,
            )),
        }
    }

    /// Optional `FILTER ( WHERE <expr> )` attached to a window.
    fn parse_window_filter(&mut self) -> Result<Option<Box<Expr>>, SqlError> {
        if self.current_token().token_type != TokenType::Filter {
            return Ok(None);
        }
        self.advance();

        if self.current_token().token_type != TokenType::LeftParen {
            let token = self.current_token().clone();
            return Err(SqlError::parse_error(
                format!(
                    "Found \"{}\" after FILTER, expect parentheses.",
                    token.describe()
                ),
                Some(token.position),
            ));
        }
        self.advance();
        self.expect(TokenType::Where, "WHERE")?;
        let expr = self.parse_expression()?;
        self.expect(TokenType::RightParen, "right paren")?;
        Ok(Some(Box::new(expr)))
    }

    fn parse_sort_fields(&mut self) -> Result<Vec<SortField>, SqlError> {
        let mut sort_fields = Vec::new();
        loop {
            let first = self.expect_identifier("sort field name")?;
            let name = if self.consume_if(TokenType::Dot) {
                let column = self.expect_identifier("sort field column")?;
                SortField::qualified_name(Some(&first), &column)
            } else {
                SortField::qualified_name(None, &first)
            };

            let ascending = if self.consume_if(TokenType::Desc) {
                false
            } else {
                self.consume_if(TokenType::Asc);
                true
            };

            sort_fields.push(SortField { name, ascending });
            if !self.consume_if(TokenType::Comma) {
                break;
            }
        }
        Ok(sort_fields)
    }
}

/// Aggregate calls are rejected in WHERE and GROUP BY; HAVING is the place
/// for them.
fn validate_aggregate_placement(stmt: &SelectStatement) -> Result<(), SqlError> {
    if let Some(condition) = &stmt.condition {
        if contains_aggregate(condition) {
            return Err(SqlError::parse_error(
                "Not allowed to call aggregate functions in WHERE clause.",
                None,
            ));
        }
    }
    for expr in stmt.grouping_exprs() {
        if contains_aggregate(expr) {
            return Err(SqlError::parse_error(
                "Not allowed to call aggregate functions in GROUP BY clause.",
                None,
            ));
        }
    }
    Ok(())
}

fn contains_aggregate(expr: &Expr) -> bool {
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
