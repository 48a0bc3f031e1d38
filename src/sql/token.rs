//! SQL tokens - the atomic units of SQL output.
//!
//! Tokens are dialect-agnostic representations that serialize to
//! dialect-specific strings. The set is deliberately restricted to what a
//! single read-only SELECT needs; there is no token for a DDL or DML keyword,
//! so the compiler cannot emit one.
//!
//! There is no literal token either: user-supplied values travel as
//! `Placeholder` tokens and bind at execution time.

use super::dialect::Dialect;

/// SQL token - every element the compiler can emit.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Keywords ===
    Select,
    Top,
    From,
    Where,
    And,
    As,
    On,
    Left,
    Join,
    GroupBy,
    OrderBy,
    Asc,
    Desc,
    Limit,
    In,
    Between,
    Like,

    // === Punctuation ===
    Comma,
    Dot,
    Star,
    LParen,
    RParen,

    // === Comparison operators ===
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,

    // === Whitespace ===
    Space,

    // === Dynamic content ===
    /// Identifier (table, column, alias) - always dialect-quoted.
    Ident(String),
    /// Unquoted alias reference for tables (`f`, `d1`, ...). These come from
    /// a fixed generator, never from input.
    TableAlias(String),
    /// Aggregate function name (COUNT, SUM, ...).
    FunctionName(String),
    /// Integer literal - only ever the clamped LIMIT value.
    LitInt(i64),
    /// Named bind placeholder (`:p0`).
    Placeholder(String),
}

impl Token {
    /// Serialize this token to a string for the given dialect.
    pub fn serialize(&self, dialect: Dialect) -> String {
        match self {
            Token::Select => "SELECT".into(),
            Token::Top => "TOP".into(),
            Token::From => "FROM".into(),
            Token::Where => "WHERE".into(),
            Token::And => "AND".into(),
            Token::As => "AS".into(),
            Token::On => "ON".into(),
            Token::Left => "LEFT".into(),
            Token::Join => "JOIN".into(),
            Token::GroupBy => "GROUP BY".into(),
            Token::OrderBy => "ORDER BY".into(),
            Token::Asc => "ASC".into(),
            Token::Desc => "DESC".into(),
            Token::Limit => "LIMIT".into(),
            Token::In => "IN".into(),
            Token::Between => "BETWEEN".into(),
            Token::Like => "LIKE".into(),

            Token::Comma => ",".into(),
            Token::Dot => ".".into(),
            Token::Star => "*".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),

            Token::Eq => "=".into(),
            Token::Ne => "<>".into(),
            Token::Lt => "<".into(),
            Token::Gt => ">".into(),
            Token::Lte => "<=".into(),
            Token::Gte => ">=".into(),

            Token::Space => " ".into(),

            Token::Ident(name) => dialect.quote_identifier(name),
            Token::TableAlias(name) => name.clone(),
            Token::FunctionName(name) => name.to_uppercase(),
            Token::LitInt(n) => n.to_string(),
            Token::Placeholder(name) => format!(":{}", name),
        }
    }
}

/// A stream of tokens that serializes to a SQL string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    /// Create an empty token stream.
    pub fn new() -> Self {
        Self { tokens: vec![] }
    }

    /// Push a single token.
    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    /// Append another token stream.
    pub fn append(&mut self, other: &TokenStream) -> &mut Self {
        self.tokens.extend(other.tokens.iter().cloned());
        self
    }

    /// Serialize all tokens to a SQL string.
    pub fn serialize(&self, dialect: Dialect) -> String {
        self.tokens.iter().map(|t| t.serialize(dialect)).collect()
    }

    // Convenience methods for common tokens
    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }

    pub fn comma(&mut self) -> &mut Self {
        self.push(Token::Comma)
    }

    /// Push `alias.column` with the column dialect-quoted.
    pub fn qualified(&mut self, alias: &str, column: &str) -> &mut Self {
        self.push(Token::TableAlias(alias.into()))
            .push(Token::Dot)
            .push(Token::Ident(column.into()))
    }
}
