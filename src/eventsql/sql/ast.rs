//! AST node set for the streaming SQL dialect.
//!
//! The expression tree is a closed sum type; traversals are pattern matches.
//! Every node derives `PartialEq` so parser tests can compare whole
//! statements structurally, and the `Display` implementations produce a
//! canonical form that re-parses to an equivalent AST.

use std::fmt;

use crate::eventsql::sql::parser::lexer::is_reserved_word;

/// Separator joining a stream qualifier and a column inside a sort-field
/// key, chosen to survive as a plain string key.
pub const COLUMN_SEPARATOR: char = '\u{7}';

/// Sentinel slice end meaning "to the end of the array".
pub const SLICE_OPEN_END: i64 = i32::MIN as i64;

/// The stream a field reference is resolved against.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamName {
    /// Unqualified reference; resolved by searching all streams in scope.
    Default,
    Named(String),
}

impl StreamName {
    pub fn is_default(&self) -> bool {
        matches!(self, StreamName::Default)
    }
}

/// SQL expressions for projections, conditions and dimensions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference, optionally stream-qualified (`stream.col`)
    FieldRef { stream: StreamName, name: String },
    /// Metadata reference produced inside `meta(...)` / `mqtt(...)`
    MetaRef { stream: StreamName, name: String },
    /// Key selected by the `->` operator
    JsonFieldRef(String),
    IntegerLiteral(i64),
    NumberLiteral(f64),
    StringLiteral(String),
    BooleanLiteral(bool),
    /// `*` in a projection or as a sole call argument
    Wildcard,
    /// Binary operations, including `->` (Arrow) and `[...]` (Subset)
    BinaryOp {
        op: BinaryOperator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Array index, only ever the RHS of a Subset node
    Index { index: Box<Expr> },
    /// Array slice, only ever the RHS of a Subset node.
    /// `end == SLICE_OPEN_END` means open-ended.
    Slice { start: Box<Expr>, end: Box<Expr> },
    /// Function call resolved against the registry at parse time
    Call { name: String, args: Vec<Expr> },
    /// CASE expression; `value` present means the simple (equality) form
    Case {
        value: Option<Box<Expr>>,
        when_clauses: Vec<WhenClause>,
        else_clause: Option<Box<Expr>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhenClause {
    pub condition: Expr,
    pub result: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    And,
    Or,
    /// `->` JSON field access
    Arrow,
    /// `[...]` index or slice access
    Subset,
}

impl BinaryOperator {
    fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
            BinaryOperator::Arrow => "->",
            BinaryOperator::Subset => "",
        }
    }

    /// Comparison and logical operators produce boolean-shaped results.
    pub fn is_condition(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterThanOrEqual
                | BinaryOperator::LessThan
                | BinaryOperator::LessThanOrEqual
                | BinaryOperator::And
                | BinaryOperator::Or
        )
    }
}

/// Window grouping constructs attached to GROUP BY
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowType {
    Tumbling,
    Hopping,
    Session,
    Sliding,
    Count,
}

impl WindowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowType::Tumbling => "TUMBLINGWINDOW",
            WindowType::Hopping => "HOPPINGWINDOW",
            WindowType::Session => "SESSIONWINDOW",
            WindowType::Sliding => "SLIDINGWINDOW",
            WindowType::Count => "COUNTWINDOW",
        }
    }

    pub fn is_time_based(&self) -> bool {
        !matches!(self, WindowType::Count)
    }
}

/// Canonicalized window descriptor. Time-based lengths and intervals are in
/// milliseconds; count windows carry raw element counts.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    pub window_type: WindowType,
    pub length: i64,
    pub interval: i64,
    pub filter: Option<Box<Expr>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Left,
    Right,
    Inner,
    Full,
    Cross,
}

impl JoinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Inner => "INNER",
            JoinType::Full => "FULL",
            JoinType::Cross => "CROSS",
        }
    }
}

/// One projected column: the expression, its derived name (column or
/// function name, empty for anonymous expressions) and an optional alias.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub expr: Expr,
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub name: String,
    pub alias: Option<String>,
    pub join_type: JoinType,
    pub on: Option<Expr>,
}

/// One GROUP BY item: a plain grouping expression or a window.
#[derive(Debug, Clone, PartialEq)]
pub enum Dimension {
    Expr(Expr),
    Window(WindowSpec),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortField {
    /// Plain column name, or `stream\x07column` when stream-qualified
    pub name: String,
    pub ascending: bool,
}

impl SortField {
    /// Build the sort key for an optionally qualified column.
    pub fn qualified_name(stream: Option<&str>, column: &str) -> String {
        match stream {
            Some(s) => format!("{}{}{}", s, COLUMN_SEPARATOR, column),
            None => column.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectStatement {
    pub fields: Vec<Field>,
    pub sources: Vec<Table>,
    pub joins: Vec<Join>,
    pub condition: Option<Expr>,
    pub dimensions: Vec<Dimension>,
    pub having: Option<Expr>,
    pub sort_fields: Vec<SortField>,
}

impl SelectStatement {
    /// The single window dimension, if the statement has one.
    pub fn window(&self) -> Option<&WindowSpec> {
        self.dimensions.iter().find_map(|d| match d {
            Dimension::Window(w) => Some(w),
            Dimension::Expr(_) => None,
        })
    }

    /// Grouping expressions, excluding the window dimension.
    pub fn grouping_exprs(&self) -> impl Iterator<Item = &Expr> {
        self.dimensions.iter().filter_map(|d| match d {
            Dimension::Expr(e) => Some(e),
            Dimension::Window(_) => None,
        })
    }
}

impl Expr {
    /// Visit this node and all children, preorder.
    pub fn walk(&self, visit: &mut impl FnMut(&Expr)) {
        visit(self);
        match self {
            Expr::BinaryOp { lhs, rhs, .. } => {
                lhs.walk(visit);
                rhs.walk(visit);
            }
            Expr::Index { index } => index.walk(visit),
            Expr::Slice { start, end } => {
                start.walk(visit);
                end.walk(visit);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
            Expr::Case {
                value,
                when_clauses,
                else_clause,
            } => {
                if let Some(v) = value {
                    v.walk(visit);
                }
                for wc in when_clauses {
                    wc.condition.walk(visit);
                    wc.result.walk(visit);
                }
                if let Some(e) = else_clause {
                    e.walk(visit);
                }
            }
            _ => {}
        }
    }

    /// The name a field projects under when no alias is given: the column
    /// name for plain references, the function name for calls, "" otherwise.
    pub fn default_field_name(&self) -> String {
        match self {
            Expr::FieldRef { name, .. } => name.clone(),
            Expr::Call { name, .. } => name.clone(),
            _ => String::new(),
        }
    }

    /// Whether this expression is boolean-shaped: acceptable as a searched
    /// CASE condition.
    pub fn is_condition(&self) -> bool {
        match self {
            Expr::BinaryOp { op, .. } => op.is_condition(),
            Expr::BooleanLiteral(_) => true,
            // A bare reference or call may resolve to a boolean at runtime
            Expr::FieldRef { .. } | Expr::MetaRef { .. } | Expr::Call { .. } => true,
            _ => false,
        }
    }
}

fn write_ident(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    let plain = !name.is_empty()
        && !name.chars().next().unwrap().is_ascii_digit()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !is_reserved_word(name);
    if plain {
        write!(f, "{}", name)
    } else if name == "*" {
        write!(f, "*")
    } else {
        write!(f, "`{}`", name)
    }
}

fn write_qualified(f: &mut fmt::Formatter<'_>, stream: &StreamName, name: &str) -> fmt::Result {
    if let StreamName::Named(s) = stream {
        write_ident(f, s)?;
        write!(f, ".")?;
    }
    write_ident(f, name)
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::FieldRef { stream, name } => write_qualified(f, stream, name),
            Expr::MetaRef { stream, name } => write_qualified(f, stream, name),
            Expr::JsonFieldRef(name) => write_ident(f, name),
            Expr::IntegerLiteral(i) => write!(f, "{}", i),
            Expr::NumberLiteral(n) => write!(f, "{:?}", n),
            Expr::StringLiteral(s) => {
                write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
            }
            Expr::BooleanLiteral(b) => write!(f, "{}", b),
            Expr::Wildcard => write!(f, "*"),
            Expr::BinaryOp { op, lhs, rhs } => match op {
                BinaryOperator::Arrow => write!(f, "{} -> {}", lhs, rhs),
                BinaryOperator::Subset => write!(f, "{}{}", lhs, rhs),
                _ => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
            },
            Expr::Index { index } => write!(f, "[{}]", index),
            Expr::Slice { start, end } => {
                if matches!(**end, Expr::IntegerLiteral(SLICE_OPEN_END)) {
                    write!(f, "[{}:]", start)
                } else {
                    write!(f, "[{}:{}]", start, end)
                }
            }
            Expr::Call { name, args } => {
                write!(f, "{}(", name)?;
                // deduplicate's whole-record argument is parser-injected;
                // printing it would not re-parse
                let printable: &[Expr] = if name.eq_ignore_ascii_case("deduplicate")
                    && matches!(args.first(), Some(Expr::Wildcard))
                {
                    &args[1..]
                } else {
                    args
                };
                for (i, arg) in printable.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Case {
                value,
                when_clauses,
                else_clause,
            } => {
                write!(f, "CASE")?;
                if let Some(v) = value {
                    write!(f, " {}", v)?;
                }
                for wc in when_clauses {
                    write!(f, " WHEN {} THEN {}", wc.condition, wc.result)?;
                }
                if let Some(e) = else_clause {
                    write!(f, " ELSE {}", e)?;
                }
                write!(f, " END")
            }
        }
    }
}

impl fmt::Display for WindowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Canonical form uses the ms unit so lengths print unchanged.
        match self.window_type {
            WindowType::Tumbling | WindowType::Sliding => {
                write!(f, "{}(ms, {})", self.window_type.as_str(), self.length)?
            }
            WindowType::Hopping | WindowType::Session => write!(
                f,
                "{}(ms, {}, {})",
                self.window_type.as_str(),
                self.length,
                self.interval
            )?,
            WindowType::Count => {
                if self.interval > 0 {
                    write!(f, "COUNTWINDOW({}, {})", self.length, self.interval)?
                } else {
                    write!(f, "COUNTWINDOW({})", self.length)?
                }
            }
        }
        if let Some(filter) = &self.filter {
            write!(f, " FILTER (WHERE {})", filter)?;
        }
        Ok(())
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Expr(e) => write!(f, "{}", e),
            Dimension::Window(w) => write!(f, "{}", w),
        }
    }
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", field.expr)?;
            if let Some(alias) = &field.alias {
                write!(f, " AS ")?;
                write_ident(f, alias)?;
            }
        }
        write!(f, " FROM ")?;
        for (i, table) in self.sources.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write_ident(f, &table.name)?;
            if let Some(alias) = &table.alias {
                write!(f, " AS ")?;
                write_ident(f, alias)?;
            }
        }
        for join in &self.joins {
            write!(f, " {} JOIN ", join.join_type.as_str())?;
            write_ident(f, &join.name)?;
            if let Some(alias) = &join.alias {
                write!(f, " AS ")?;
                write_ident(f, alias)?;
            }
            if let Some(on) = &join.on {
                write!(f, " ON {}", on)?;
            }
        }
        if let Some(cond) = &self.condition {
            write!(f, " WHERE {}", cond)?;
        }
        if !self.dimensions.is_empty() {
            write!(f, " GROUP BY ")?;
            for (i, dim) in self.dimensions.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", dim)?;
            }
        }
        if let Some(having) = &self.having {
            write!(f, " HAVING {}", having)?;
        }
        if !self.sort_fields.is_empty() {
            write!(f, " ORDER BY ")?;
            for (i, sf) in self.sort_fields.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                match sf.name.split_once(COLUMN_SEPARATOR) {
                    Some((stream, col)) => {
                        write_ident(f, stream)?;
                        write!(f, ".")?;
                        write_ident(f, col)?;
                    }
                    None => write_ident(f, &sf.name)?,
                }
                if !sf.ascending {
                    write!(f, " DESC")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_field_qualified_name() {
        assert_eq!(SortField::qualified_name(None, "name"), "name");
        assert_eq!(
            SortField::qualified_name(Some("s1"), "name"),
            format!("s1{}name", COLUMN_SEPARATOR)
        );
    }

    #[test]
    fn test_walk_visits_all_nodes() {
        let expr = Expr::BinaryOp {
            op: BinaryOperator::Add,
            lhs: Box::new(Expr::Call {
                name: "count".to_string(),
                args: vec![Expr::Wildcard],
            }),
            rhs: Box::new(Expr::IntegerLiteral(1)),
        };
        let mut seen = 0;
        expr.walk(&mut |_| seen += 1);
        assert_eq!(seen, 4);
    }

    #[test]
    fn test_display_backticks_reserved_words() {
        let expr = Expr::FieldRef {
            stream: StreamName::Default,
            name: "select".to_string(),
        };
        assert_eq!(expr.to_string(), "`select`");
    }

    #[test]
    fn test_display_slice_open_end() {
        let expr = Expr::BinaryOp {
            op: BinaryOperator::Subset,
            lhs: Box::new(Expr::FieldRef {
                stream: StreamName::Default,
                name: "children".to_string(),
            }),
            rhs: Box::new(Expr::Slice {
                start: Box::new(Expr::IntegerLiteral(2)),
                end: Box::new(Expr::IntegerLiteral(SLICE_OPEN_END)),
            }),
        };
        assert_eq!(expr.to_string(), "children[2:]");
    }
}
