//! Schema catalog types.
//!
//! A `SchemaSnapshot` is a versioned, immutable description of the live
//! database: tables, columns, types and foreign keys. Snapshots are produced
//! by an external introspection collaborator and replaced wholesale on
//! refresh; nothing in the core mutates one after construction, so
//! validators never observe a half-updated catalog.

pub mod provider;
pub mod shared;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A foreign-key reference from a column to another table's column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint_name: Option<String>,
}

/// A single column as reported by introspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub is_nullable: bool,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub is_foreign: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Column {
    /// Whether the declared type is numeric enough for SUM/AVG.
    pub fn is_numeric(&self) -> bool {
        const NUMERIC_TYPES: &[&str] = &[
            "int", "integer", "bigint", "smallint", "tinyint", "decimal", "numeric", "float",
            "double", "real", "money",
        ];
        let lowered = self.data_type.to_ascii_lowercase();
        NUMERIC_TYPES.iter().any(|t| lowered.contains(t))
    }
}

/// A table and its columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The primary-key column, if the table declares exactly one.
    pub fn primary_key(&self) -> Option<&Column> {
        let mut keys = self.columns.iter().filter(|c| c.is_primary);
        let first = keys.next()?;
        if keys.next().is_some() {
            return None;
        }
        Some(first)
    }
}

/// Immutable snapshot of the database schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: Vec<Table>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

impl SchemaSnapshot {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn column(&self, table: &str, column: &str) -> Option<&Column> {
        self.table(table)?.column(column)
    }

    /// Build a `(table, column) -> Column` lookup for repeated membership
    /// checks during validation.
    pub fn column_lookup(&self) -> HashMap<(&str, &str), &Column> {
        let mut map = HashMap::new();
        for table in &self.tables {
            for column in &table.columns {
                map.insert((table.name.as_str(), column.name.as_str()), column);
            }
        }
        map
    }
}
