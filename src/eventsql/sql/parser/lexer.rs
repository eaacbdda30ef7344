/*!
Tokenization for the streaming SQL dialect.

Converts rule text into tokens: keywords, identifiers (including
back-tick-quoted ones that preserve spaces and non-ASCII characters),
string and numeric literals, operators and punctuation. Line (`--`) and
block comments are consumed here so the parser never sees them.
*/

use crate::eventsql::sql::error::SqlError;
use std::collections::HashMap;

/// Token types recognized by the SQL lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Keywords
    Select,
    From,
    Where,
    Group,
    By,
    Having,
    Order,
    Asc,
    Desc,
    Filter,
    As,
    Join,
    Inner,
    Left,
    Right,
    Full,
    Cross,
    On,
    And,
    Or,
    Case,
    When,
    Then,
    Else,
    End,
    True,
    False,

    // Literals and identifiers
    Identifier,
    String,
    Integer,
    Number,

    // Punctuation
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,
    Colon,
    Semicolon,
    Asterisk,

    // Operators
    Plus,
    Minus,
    Divide,
    Modulo,
    Arrow,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,

    // End of input
    Eof,
}

/// A token with its type, source text and position.
#[derive(Debug, Clone)]
pub struct Token {
    /// The type of this token (keyword, operator, literal, etc.)
    pub token_type: TokenType,
    /// The original text of the token; keywords preserve source casing
    pub value: String,
    /// Character position in the original SQL string
    pub position: usize,
}

impl Token {
    /// How the token reads in an error message: keywords uppercased,
    /// end-of-input spelled out.
    pub fn describe(&self) -> String {
        match self.token_type {
            TokenType::Eof => "EOF".to_string(),
            TokenType::Identifier
            | TokenType::String
            | TokenType::Integer
            | TokenType::Number => self.value.clone(),
            _ if self.value.chars().any(|c| c.is_ascii_alphabetic()) => {
                self.value.to_uppercase()
            }
            _ => self.value.clone(),
        }
    }
}

const RESERVED_WORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "GROUP", "BY", "HAVING", "ORDER", "ASC", "DESC", "FILTER", "AS",
    "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "CROSS", "ON", "AND", "OR", "CASE", "WHEN", "THEN",
    "ELSE", "END", "TRUE", "FALSE",
];

/// Whether a name collides with a dialect keyword and must be back-ticked
/// when printed.
pub fn is_reserved_word(name: &str) -> bool {
    RESERVED_WORDS.contains(&name.to_uppercase().as_str())
}

/// Build the keyword lookup table for token classification.
pub(super) fn build_keywords() -> HashMap<String, TokenType> {
    let mut keywords = HashMap::new();
    keywords.insert("SELECT".to_string(), TokenType::Select);
    keywords.insert("FROM".to_string(), TokenType::From);
    keywords.insert("WHERE".to_string(), TokenType::Where);
    keywords.insert("GROUP".to_string(), TokenType::Group);
    keywords.insert("BY".to_string(), TokenType::By);
    keywords.insert("HAVING".to_string(), TokenType::Having);
    keywords.insert("ORDER".to_string(), TokenType::Order);
    keywords.insert("ASC".to_string(), TokenType::Asc);
    keywords.insert("DESC".to_string(), TokenType::Desc);
    keywords.insert("FILTER".to_string(), TokenType::Filter);
    keywords.insert("AS".to_string(), TokenType::As);
    keywords.insert("JOIN".to_string(), TokenType::Join);
    keywords.insert("INNER".to_string(), TokenType::Inner);
    keywords.insert("LEFT".to_string(), TokenType::Left);
    keywords.insert("RIGHT".to_string(), TokenType::Right);
    keywords.insert("FULL".to_string(), TokenType::Full);
    keywords.insert("CROSS".to_string(), TokenType::Cross);
    keywords.insert("ON".to_string(), TokenType::On);
    keywords.insert("AND".to_string(), TokenType::And);
    keywords.insert("OR".to_string(), TokenType::Or);
    keywords.insert("CASE".to_string(), TokenType::Case);
    keywords.insert("WHEN".to_string(), TokenType::When);
    keywords.insert("THEN".to_string(), TokenType::Then);
    keywords.insert("ELSE".to_string(), TokenType::Else);
    keywords.insert("END".to_string(), TokenType::End);
    keywords.insert("TRUE".to_string(), TokenType::True);
    keywords.insert("FALSE".to_string(), TokenType::False);
    keywords
}

/// Tokenize SQL text into a vector of tokens ending with `Eof`.
pub(super) fn tokenize(
    sql: &str,
    keywords: &HashMap<String, TokenType>,
) -> Result<Vec<Token>, SqlError> {
    let mut tokens = Vec::new();
    let mut chars = sql.chars().peekable();
    let mut position = 0;

    macro_rules! push_single {
        ($tt:expr, $text:expr) => {{
            tokens.push(Token {
                token_type: $tt,
                value: $text.to_string(),
                position,
            });
            chars.next();
            position += 1;
        }};
    }

    while let Some(&ch) = chars.peek() {
        match ch {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
                position += 1;
            }
            '(' => push_single!(TokenType::LeftParen, "("),
            ')' => push_single!(TokenType::RightParen, ")"),
            '[' => push_single!(TokenType::LeftBracket, "["),
            ']' => push_single!(TokenType::RightBracket, "]"),
            ',' => push_single!(TokenType::Comma, ","),
            ':' => push_single!(TokenType::Colon, ":"),
            ';' => push_single!(TokenType::Semicolon, ";"),
            '*' => push_single!(TokenType::Asterisk, "*"),
            '+' => push_single!(TokenType::Plus, "+"),
            '%' => push_single!(TokenType::Modulo, "%"),
            '=' => push_single!(TokenType::Equal, "="),
            '-' => {
                let start = position;
                chars.next();
                position += 1;
                match chars.peek() {
                    Some(&'-') => {
                        // line comment to end of line
                        while let Some(&c) = chars.peek() {
                            if c == '\n' {
                                break;
                            }
                            chars.next();
                            position += 1;
                        }
                    }
                    Some(&'>') => {
                        chars.next();
                        position += 1;
                        tokens.push(Token {
                            token_type: TokenType::Arrow,
                            value: "->".to_string(),
                            position: start,
                        });
                    }
                    _ => tokens.push(Token {
                        token_type: TokenType::Minus,
                        value: "-".to_string(),
                        position: start,
                    }),
                }
            }
            '/' => {
                let start = position;
                chars.next();
                position += 1;
                if let Some(&'*') = chars.peek() {
                    chars.next();
                    position += 1;
                    let mut closed = false;
                    while let Some(c) = chars.next() {
                        position += 1;
                        if c == '*' {
                            if let Some(&'/') = chars.peek() {
                                chars.next();
                                position += 1;
                                closed = true;
                                break;
                            }
                        }
                    }
                    if !closed {
                        return Err(SqlError::parse_error(
                            "Unterminated block comment",
                            Some(start),
                        ));
                    }
                } else {
                    tokens.push(Token {
                        token_type: TokenType::Divide,
                        value: "/".to_string(),
                        position: start,
                    });
                }
            }
            '<' => {
                let start = position;
                chars.next();
                position += 1;
                // whitespace may appear between the comparison characters
                while let Some(&c) = chars.peek() {
                    if c == ' ' || c == '\t' {
                        chars.next();
                        position += 1;
                    } else {
                        break;
                    }
                }
                if let Some(&'=') = chars.peek() {
                    chars.next();
                    position += 1;
                    tokens.push(Token {
                        token_type: TokenType::LessThanOrEqual,
                        value: "<=".to_string(),
                        position: start,
                    });
                } else {
                    tokens.push(Token {
                        token_type: TokenType::LessThan,
                        value: "<".to_string(),
                        position: start,
                    });
                }
            }
            '>' => {
                let start = position;
                chars.next();
                position += 1;
                while let Some(&c) = chars.peek() {
                    if c == ' ' || c == '\t' {
                        chars.next();
                        position += 1;
                    } else {
                        break;
                    }
                }
                if let Some(&'=') = chars.peek() {
                    chars.next();
                    position += 1;
                    tokens.push(Token {
                        token_type: TokenType::GreaterThanOrEqual,
                        value: ">=".to_string(),
                        position: start,
                    });
                } else {
                    tokens.push(Token {
                        token_type: TokenType::GreaterThan,
                        value: ">".to_string(),
                        position: start,
                    });
                }
            }
            '!' => {
                let start = position;
                chars.next();
                position += 1;
                // whitespace may appear between '!' and '='
                while let Some(&c) = chars.peek() {
                    if c == ' ' || c == '\t' {
                        chars.next();
                        position += 1;
                    } else {
                        break;
                    }
                }
                if let Some(&'=') = chars.peek() {
                    chars.next();
                    position += 1;
                    tokens.push(Token {
                        token_type: TokenType::NotEqual,
                        value: "!=".to_string(),
                        position: start,
                    });
                } else {
                    return Err(SqlError::parse_error(
                        "Unexpected character '!' - did you mean '!='?",
                        Some(start),
                    ));
                }
            }
            '"' => {
                let start = position;
                chars.next();
                position += 1;
                let mut value = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '"' {
                        chars.next();
                        position += 1;
                        break;
                    }
                    if c == '\\' {
                        chars.next();
                        position += 1;
                        match chars.peek() {
                            Some(&'"') => {
                                value.push('"');
                                chars.next();
                                position += 1;
                            }
                            Some(&'\\') => {
                                value.push('\\');
                                chars.next();
                                position += 1;
                            }
                            _ => value.push('\\'),
                        }
                        continue;
                    }
                    value.push(c);
                    chars.next();
                    position += 1;
                }
                tokens.push(Token {
                    token_type: TokenType::String,
                    value,
                    position: start,
                });
            }
            '`' => {
                let start = position;
                chars.next();
                position += 1;
                let mut value = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '`' {
                        chars.next();
                        position += 1;
                        break;
                    }
                    value.push(c);
                    chars.next();
                    position += 1;
                }
                tokens.push(Token {
                    token_type: TokenType::Identifier,
                    value,
                    position: start,
                });
            }
            '.' => {
                let start = position;
                chars.next();
                position += 1;
                if chars.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                    let mut value = String::from("0.");
                    scan_digits(&mut chars, &mut position, &mut value);
                    scan_exponent(&mut chars, &mut position, &mut value);
                    tokens.push(Token {
                        token_type: TokenType::Number,
                        value,
                        position: start,
                    });
                } else {
                    tokens.push(Token {
                        token_type: TokenType::Dot,
                        value: ".".to_string(),
                        position: start,
                    });
                }
            }
            '0'..='9' => {
                let start = position;
                let mut value = String::new();
                let mut is_float = false;
                scan_digits(&mut chars, &mut position, &mut value);
                if let Some(&'.') = chars.peek() {
                    is_float = true;
                    value.push('.');
                    chars.next();
                    position += 1;
                    scan_digits(&mut chars, &mut position, &mut value);
                }
                if scan_exponent(&mut chars, &mut position, &mut value) {
                    is_float = true;
                }
                tokens.push(Token {
                    token_type: if is_float {
                        TokenType::Number
                    } else {
                        TokenType::Integer
                    },
                    value,
                    position: start,
                });
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = position;
                let mut value = String::new();
                while let Some(&nc) = chars.peek() {
                    if nc.is_alphanumeric() || nc == '_' {
                        value.push(nc);
                        chars.next();
                        position += 1;
                    } else {
                        break;
                    }
                }
                let token_type = keywords
                    .get(&value.to_uppercase())
                    .cloned()
                    .unwrap_or(TokenType::Identifier);
                tokens.push(Token {
                    token_type,
                    value,
                    position: start,
                });
            }
            _ => {
                return Err(SqlError::parse_error(
                    format!("Unexpected character '{}'", ch),
                    Some(position),
                ));
            }
        }
    }

    tokens.push(Token {
        token_type: TokenType::Eof,
        value: String::new(),
        position,
    });

    Ok(tokens)
}

fn scan_digits(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    position: &mut usize,
    out: &mut String,
) {
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            out.push(c);
            chars.next();
            *position += 1;
        } else {
            break;
        }
    }
}

fn scan_exponent(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    position: &mut usize,
    out: &mut String,
) -> bool {
    if matches!(chars.peek(), Some(&'e') | Some(&'E')) {
        out.push('e');
        chars.next();
        *position += 1;
        if matches!(chars.peek(), Some(&'+') | Some(&'-')) {
            out.push(*chars.peek().unwrap());
            chars.next();
            *position += 1;
        }
        scan_digits(chars, position, out);
        true
    } else {
        false
    }
}
