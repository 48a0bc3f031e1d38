//! Join path resolution over the approved-join graph.
//!
//! The resolver finds a path from the fact table to each requested dimension
//! using only approved edges. Paths are shortest-first; among equal-length
//! paths the one whose edge-key sequence (left_table, left_column,
//! right_table, right_column) is lexicographically smallest wins. That
//! tie-break is a policy choice: it exists so the same inputs always produce
//! the same SQL, and it is pinned by tests rather than assumed.
//!
//! Either a full path exists or the dimension is rejected; the resolver
//! never emits a partial join.

use std::collections::HashMap;

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use thiserror::Error;

use crate::mapping::{JoinEdge, JoinGraph};

/// Error resolving a join path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The table has no approved edge touching it at all.
    #[error("table '{0}' does not appear in the approved join graph")]
    UnknownTable(String),

    /// No sequence of approved edges connects the two tables.
    #[error("no approved join path from '{from}' to '{to}'")]
    NoApprovedPath { from: String, to: String },
}

/// One join hop, oriented away from the fact table: `left` is the side
/// already in the query, `right` is the table being joined in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinStep {
    pub left_table: String,
    pub left_column: String,
    pub right_table: String,
    pub right_column: String,
}

/// A full path from the fact table to one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JoinPath {
    pub steps: Vec<JoinStep>,
}

impl JoinPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Parent information for path reconstruction: the parent node and the edge
/// used to reach the current node.
struct ParentInfo {
    parent: NodeIndex,
    edge_idx: EdgeIndex,
}

/// Deterministic path finder over approved joins.
pub struct JoinResolver {
    graph: UnGraph<String, JoinEdge>,
    node_indices: HashMap<String, NodeIndex>,
}

impl JoinResolver {
    /// Build a resolver from the approved edges of a join graph.
    ///
    /// Edges are inserted in canonical key order so graph iteration order is
    /// a function of the edge set alone, not of insertion history.
    pub fn new(joins: &JoinGraph) -> Self {
        let mut graph = UnGraph::new_undirected();
        let mut node_indices: HashMap<String, NodeIndex> = HashMap::new();

        for edge in joins.approved_edges() {
            let left = *node_indices
                .entry(edge.left_table.clone())
                .or_insert_with(|| graph.add_node(edge.left_table.clone()));
            let right = *node_indices
                .entry(edge.right_table.clone())
                .or_insert_with(|| graph.add_node(edge.right_table.clone()));
            graph.add_edge(left, right, edge.clone());
        }

        Self {
            graph,
            node_indices,
        }
    }

    /// Find the shortest path between two tables using BFS.
    ///
    /// Neighbors are expanded in sorted edge-key order and each node's parent
    /// is fixed at first discovery. Expanding a level in sorted order means
    /// nodes are discovered in lexicographic order of their paths, so the
    /// reconstructed path is the lexicographically smallest shortest one.
    pub fn resolve(&self, from: &str, to: &str) -> Result<JoinPath, ResolveError> {
        if from == to {
            return Ok(JoinPath::new());
        }

        let from_idx = self
            .node_indices
            .get(from)
            .ok_or_else(|| ResolveError::UnknownTable(from.into()))?;
        let to_idx = self
            .node_indices
            .get(to)
            .ok_or_else(|| ResolveError::UnknownTable(to.into()))?;

        let mut parents: HashMap<NodeIndex, ParentInfo> = HashMap::new();
        let mut queue: std::collections::VecDeque<NodeIndex> = std::collections::VecDeque::new();

        queue.push_back(*from_idx);
        parents.insert(
            *from_idx,
            ParentInfo {
                parent: *from_idx,
                edge_idx: EdgeIndex::end(),
            },
        );

        while let Some(current) = queue.pop_front() {
            let mut neighbors: Vec<(EdgeIndex, NodeIndex)> = self
                .graph
                .edges(current)
                .map(|e| {
                    use petgraph::visit::EdgeRef;
                    (e.id(), e.target())
                })
                .collect();
            neighbors.sort_by(|a, b| self.graph[a.0].key().cmp(&self.graph[b.0].key()));

            for (edge_idx, neighbor) in neighbors {
                if parents.contains_key(&neighbor) {
                    continue;
                }

                parents.insert(
                    neighbor,
                    ParentInfo {
                        parent: current,
                        edge_idx,
                    },
                );

                if neighbor == *to_idx {
                    return Ok(self.reconstruct_path(*from_idx, neighbor, &parents));
                }

                queue.push_back(neighbor);
            }
        }

        Err(ResolveError::NoApprovedPath {
            from: from.into(),
            to: to.into(),
        })
    }

    /// Reconstruct the path from parent pointers, orienting every step away
    /// from the start table.
    fn reconstruct_path(
        &self,
        from_idx: NodeIndex,
        to_idx: NodeIndex,
        parents: &HashMap<NodeIndex, ParentInfo>,
    ) -> JoinPath {
        let mut steps = Vec::new();
        let mut current = to_idx;

        while current != from_idx {
            let info = &parents[&current];
            let edge = &self.graph[info.edge_idx];
            let parent_name = &self.graph[info.parent];
            let current_name = &self.graph[current];

            // The stored edge is canonically ordered; orient it so the
            // parent side comes first.
            let step = if edge.left_table == *parent_name {
                JoinStep {
                    left_table: parent_name.clone(),
                    left_column: edge.left_column.clone(),
                    right_table: current_name.clone(),
                    right_column: edge.right_column.clone(),
                }
            } else {
                JoinStep {
                    left_table: parent_name.clone(),
                    left_column: edge.right_column.clone(),
                    right_table: current_name.clone(),
                    right_column: edge.left_column.clone(),
                }
            };
            steps.push(step);
            current = info.parent;
        }

        steps.reverse();
        JoinPath { steps }
    }

    /// Resolve paths from a fact table to every requested dimension and
    /// merge them into one deduplicated join sequence, in dimension order.
    ///
    /// Returns the merged steps plus one error per unreachable dimension;
    /// a partial failure never contributes partial steps for that dimension.
    pub fn join_tree(
        &self,
        fact: &str,
        dimensions: &[String],
    ) -> (Vec<JoinStep>, Vec<(String, ResolveError)>) {
        let mut steps: Vec<JoinStep> = Vec::new();
        let mut errors = Vec::new();

        for dim in dimensions {
            if dim == fact {
                continue;
            }
            match self.resolve(fact, dim) {
                Ok(path) => {
                    for step in path.steps {
                        if !steps.contains(&step) {
                            steps.push(step);
                        }
                    }
                }
                Err(err) => errors.push((dim.clone(), err)),
            }
        }

        (steps, errors)
    }
}
