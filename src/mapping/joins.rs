//! Approved join edges.
//!
//! A join edge is a foreign-key relationship a human reviewer has
//! whitelisted for query generation. Edges are undirected for path-finding
//! but stored directionally in canonical order (smaller endpoint first) so
//! the graph has one representation per relationship and dedup and
//! tie-breaking stay deterministic.

use serde::{Deserialize, Serialize};

use crate::catalog::SchemaSnapshot;

/// One approved join between two table columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinEdge {
    pub left_table: String,
    pub left_column: String,
    pub right_table: String,
    pub right_column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint_name: Option<String>,
    #[serde(default)]
    pub approved: bool,
}

impl JoinEdge {
    pub fn new(
        left_table: &str,
        left_column: &str,
        right_table: &str,
        right_column: &str,
    ) -> Self {
        Self {
            left_table: left_table.into(),
            left_column: left_column.into(),
            right_table: right_table.into(),
            right_column: right_column.into(),
            constraint_name: None,
            approved: false,
        }
    }

    pub fn approved(mut self) -> Self {
        self.approved = true;
        self
    }

    /// Identity key for dedup and ordering.
    pub fn key(&self) -> (&str, &str, &str, &str) {
        (
            &self.left_table,
            &self.left_column,
            &self.right_table,
            &self.right_column,
        )
    }

    /// Reorient so the lexicographically smaller (table, column) endpoint is
    /// on the left. Join semantics are unchanged; only storage order is.
    pub fn canonical(mut self) -> Self {
        let left = (self.left_table.clone(), self.left_column.clone());
        let right = (self.right_table.clone(), self.right_column.clone());
        if right < left {
            std::mem::swap(&mut self.left_table, &mut self.right_table);
            std::mem::swap(&mut self.left_column, &mut self.right_column);
        }
        self
    }

    /// The opposite endpoint, if this edge touches `table`.
    pub fn other_side(&self, table: &str) -> Option<(&str, &str, &str)> {
        if self.left_table == table {
            Some((&self.right_table, &self.left_column, &self.right_column))
        } else if self.right_table == table {
            Some((&self.left_table, &self.right_column, &self.left_column))
        } else {
            None
        }
    }
}

/// The whitelist of approved joins.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JoinGraph {
    #[serde(default)]
    pub joins: Vec<JoinEdge>,
}

impl JoinGraph {
    pub fn new(joins: Vec<JoinEdge>) -> Self {
        let mut graph = JoinGraph::default();
        for edge in joins {
            graph.upsert(edge);
        }
        graph
    }

    /// Approved edges only, in canonical key order.
    pub fn approved_edges(&self) -> Vec<&JoinEdge> {
        let mut edges: Vec<_> = self.joins.iter().filter(|j| j.approved).collect();
        edges.sort_by_key(|e| e.key());
        edges
    }

    /// Insert or replace an edge, keyed by its canonical identity.
    pub fn upsert(&mut self, edge: JoinEdge) {
        let edge = edge.canonical();
        let key = (
            edge.left_table.clone(),
            edge.left_column.clone(),
            edge.right_table.clone(),
            edge.right_column.clone(),
        );
        match self.joins.iter_mut().find(|j| {
            j.key()
                == (
                    key.0.as_str(),
                    key.1.as_str(),
                    key.2.as_str(),
                    key.3.as_str(),
                )
        }) {
            Some(existing) => *existing = edge,
            None => self.joins.push(edge),
        }
    }

    /// Mark an edge approved, inserting it if unknown.
    pub fn approve(&mut self, edge: JoinEdge) {
        self.upsert(edge.approved());
    }

    /// Whether an approved edge directly connects the two tables.
    pub fn has_direct_join(&self, a: &str, b: &str) -> bool {
        self.joins.iter().any(|j| {
            j.approved
                && ((j.left_table == a && j.right_table == b)
                    || (j.left_table == b && j.right_table == a))
        })
    }
}

/// Suggest join edges from the snapshot's declared foreign keys.
///
/// Suggestions arrive unapproved; a reviewer promotes them explicitly.
pub fn suggest_from_schema(snapshot: &SchemaSnapshot) -> Vec<JoinEdge> {
    let mut suggestions = Vec::new();
    for table in &snapshot.tables {
        for column in &table.columns {
            if let Some(fk) = column.foreign_key.as_ref().filter(|_| column.is_foreign) {
                let mut edge =
                    JoinEdge::new(&table.name, &column.name, &fk.ref_table, &fk.ref_column)
                        .canonical();
                edge.constraint_name = fk.constraint_name.clone();
                suggestions.push(edge);
            }
        }
    }
    suggestions.sort_by(|a, b| a.key().cmp(&b.key()));
    suggestions.dedup_by(|a, b| a.key() == b.key());
    suggestions
}
