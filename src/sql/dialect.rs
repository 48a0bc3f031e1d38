//! SQL dialect definitions and formatting rules.
//!
//! Each dialect implements `SqlDialect` for its identifier quoting and row
//! limiting syntax:
//!
//! - MySQL: `` `ident` ``, `LIMIT n`
//! - PostgreSQL: `"ident"`, `LIMIT n`
//! - T-SQL: `[ident]`, `SELECT TOP n`

use std::fmt;

/// SQL dialect trait - defines how dialect-specific constructs are rendered.
pub trait SqlDialect: fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    /// Quote an identifier (table, column, alias).
    fn quote_identifier(&self, ident: &str) -> String;

    /// Whether row limiting is rendered as `SELECT TOP n` instead of a
    /// trailing `LIMIT n`.
    fn uses_top(&self) -> bool {
        false
    }
}

/// MySQL / MariaDB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }
}

/// PostgreSQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

/// SQL Server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TSql;

impl SqlDialect for TSql {
    fn name(&self) -> &'static str {
        "tsql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
    }

    fn uses_top(&self) -> bool {
        true
    }
}

/// The supported dialects as a closed enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    MySql,
    Postgres,
    TSql,
}

impl Dialect {
    /// Parse a dialect from a configuration name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Dialect::MySql),
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            "tsql" | "mssql" | "sqlserver" => Some(Dialect::TSql),
            _ => None,
        }
    }

    fn as_dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::MySql => &MySql,
            Dialect::Postgres => &Postgres,
            Dialect::TSql => &TSql,
        }
    }

    pub fn name(&self) -> &'static str {
        self.as_dialect().name()
    }

    pub fn quote_identifier(&self, ident: &str) -> String {
        self.as_dialect().quote_identifier(ident)
    }

    pub fn uses_top(&self) -> bool {
        self.as_dialect().uses_top()
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
