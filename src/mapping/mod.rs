//! Human-curated table and column mappings.
//!
//! Mappings record what introspection cannot: which tables are facts, which
//! are dimensions, which column scopes a table to a tenant, and what a table
//! or column means in business terms. The mapping store itself is a plain
//! CRUD collaborator; the core only reads this state.

pub mod joins;

pub use joins::{suggest_from_schema, JoinEdge, JoinGraph};

use serde::{Deserialize, Serialize};

/// Role a mapped table plays in query generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableRole {
    Fact,
    Dimension,
}

/// Curation quality tier. Informational only; never affects validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Gold,
    #[default]
    Silver,
    Bronze,
}

/// A mapped table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMapping {
    pub table: String,
    pub role: TableRole,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_column: Option<String>,
}

/// A mapped column with its business meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub table: String,
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_meaning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

/// The full mapping state, read-only to the core.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MappingState {
    #[serde(default)]
    pub tables: Vec<TableMapping>,
    #[serde(default)]
    pub columns: Vec<ColumnMapping>,
}

impl MappingState {
    pub fn table(&self, name: &str) -> Option<&TableMapping> {
        self.tables.iter().find(|t| t.table == name)
    }

    /// Mapped fact tables, best priority first, ties broken by name.
    pub fn fact_tables(&self) -> Vec<&TableMapping> {
        let mut facts: Vec<_> = self
            .tables
            .iter()
            .filter(|t| t.role == TableRole::Fact)
            .collect();
        facts.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.table.cmp(&b.table)));
        facts
    }

    pub fn dimension_tables(&self) -> Vec<&TableMapping> {
        self.tables
            .iter()
            .filter(|t| t.role == TableRole::Dimension)
            .collect()
    }

    /// The tenant column configured for a table, if any.
    pub fn tenant_column(&self, table: &str) -> Option<&str> {
        self.table(table)?.tenant_column.as_deref()
    }
}
