//! Independent safety scan of compiled SQL text.
//!
//! The compiler is structurally injection-safe, and this guard exists
//! anyway: it inspects the final SQL text, not the plan, to catch compiler
//! bugs and template regressions before anything reaches execution. It fails
//! closed - text it cannot positively classify as a single read-only SELECT
//! is rejected.
//!
//! The `Display` of a violation is deliberately generic. Full detail goes to
//! the audit record only; echoing which rule tripped would help an attacker
//! probe the guard.

use once_cell::sync::Lazy;
use regex::Regex;
use sqlparser::ast::{SetExpr, Statement};
use sqlparser::dialect::{Dialect as ParserDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;

use super::dialect::Dialect;

/// Rejection from the safety guard.
///
/// Carries every issue found, not just the first, for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyViolation {
    issues: Vec<String>,
}

impl SafetyViolation {
    fn new(issues: Vec<String>) -> Self {
        Self { issues }
    }

    /// The detailed findings. Audit-only; never echo these to callers.
    pub fn issues(&self) -> &[String] {
        &self.issues
    }
}

impl std::fmt::Display for SafetyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("compiled SQL was rejected by the safety scan")
    }
}

impl std::error::Error for SafetyViolation {}

/// DDL/DML and control keywords that must never appear in compiled output.
static FORBIDDEN_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(insert|update|delete|drop|alter|truncate|create|grant|revoke|merge|exec|execute)\b",
    )
    .expect("forbidden keyword pattern")
});

/// Named bind placeholders (`:p0`), normalized before parsing.
static NAMED_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":[A-Za-z_][A-Za-z0-9_]*").expect("placeholder pattern"));

/// Catalog and metadata objects compiled SQL has no business touching.
const SYSTEM_CATALOGS: &[&str] = &[
    "information_schema",
    "pg_catalog",
    "sys.",
    "sysobjects",
    "master.",
];

/// Check that `sql` is a single, read-only SELECT statement.
pub fn check_safety(sql: &str, dialect: Dialect) -> Result<(), SafetyViolation> {
    let mut issues: Vec<String> = Vec::new();
    let trimmed = sql.trim();
    let lowered = trimmed.to_ascii_lowercase();

    if !lowered.starts_with("select") {
        issues.push("statement does not start with SELECT".into());
    }

    if let Some(m) = FORBIDDEN_KEYWORDS.find(trimmed) {
        issues.push(format!("forbidden keyword '{}'", m.as_str()));
    }

    if has_statement_terminator(trimmed) {
        issues.push("multiple statements".into());
    }

    for catalog in SYSTEM_CATALOGS {
        if lowered.contains(catalog) {
            issues.push(format!("system catalog reference '{}'", catalog));
        }
    }

    if trimmed.contains("--") || trimmed.contains("/*") {
        issues.push("comment marker in compiled SQL".into());
    }

    // Positive classification: the text must parse as exactly one SELECT
    // query. Anything the parser cannot make sense of is rejected.
    if let Err(issue) = parse_single_select(trimmed, dialect) {
        issues.push(issue);
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(SafetyViolation::new(issues))
    }
}

/// Scan for a `;` outside single-quoted strings that is not the final
/// character of the statement.
fn has_statement_terminator(sql: &str) -> bool {
    let bytes = sql.as_bytes();
    let last = bytes.len().saturating_sub(1);
    let mut in_string = false;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\'' => in_string = !in_string,
            b';' if !in_string && i != last => return true,
            b';' if !in_string && i == last => return false,
            _ => {}
        }
    }
    false
}

fn parser_dialect(dialect: Dialect) -> Box<dyn ParserDialect> {
    match dialect {
        Dialect::MySql => Box::new(MySqlDialect {}),
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
        Dialect::TSql => Box::new(MsSqlDialect {}),
    }
}

fn parse_single_select(sql: &str, dialect: Dialect) -> Result<(), String> {
    // Placeholder syntax varies by parser dialect; normalize named binds to
    // positional before classification.
    let normalized = NAMED_PLACEHOLDER.replace_all(sql, "?");
    let parsed = Parser::parse_sql(parser_dialect(dialect).as_ref(), &normalized)
        .map_err(|e| format!("unparseable statement: {}", e))?;

    if parsed.len() != 1 {
        return Err(format!("expected one statement, found {}", parsed.len()));
    }

    match &parsed[0] {
        Statement::Query(query) => match query.body.as_ref() {
            SetExpr::Select(select) if select.into.is_none() => Ok(()),
            SetExpr::Select(_) => Err("SELECT INTO is not a read".into()),
            _ => Err("query body is not a plain SELECT".into()),
        },
        _ => Err("statement is not a query".into()),
    }
}
