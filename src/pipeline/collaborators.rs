//! Collaborator interfaces.
//!
//! The external calls the pipeline depends on - intent classification, plan
//! drafting, query execution, narration - are modeled as synchronous
//! result-or-error calls behind async traits, whatever their transport. The
//! orchestrator wraps each call in a timeout; the collaborators themselves
//! implement none of the pipeline's policy.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::catalog::shared::MetadataSnapshot;
use crate::plan::draft::DraftPlan;
use crate::plan::CanonicalPlan;
use crate::sql::Param;

/// Error from an auxiliary collaborator call.
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("collaborator returned a malformed payload: {0}")]
    Malformed(String),
}

/// Error from the execution collaborator.
///
/// The raw driver message stays in here for the audit log; callers see a
/// sanitized rendering.
#[derive(Debug, Clone, Error)]
pub enum ExecuteError {
    #[error("query execution failed")]
    Driver(String),

    #[error("query execution was rejected: {0}")]
    Rejected(String),
}

impl ExecuteError {
    /// The detailed cause, for audit only.
    pub fn detail(&self) -> &str {
        match self {
            ExecuteError::Driver(detail) => detail,
            ExecuteError::Rejected(detail) => detail,
        }
    }
}

/// Rows returned by the execution collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
    /// True when rows were cut at the configured cap.
    pub truncated: bool,
}

impl ResultSet {
    /// Cap the number of rows handed back to callers.
    pub fn truncate_to(mut self, max_rows: usize) -> Self {
        if self.rows.len() > max_rows {
            self.rows.truncate(max_rows);
            self.truncated = true;
        }
        self
    }
}

/// Classifies a question into an intent label.
///
/// The core never infers intent itself; this is always an external call.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, question: &str) -> Result<String, CollaboratorError>;
}

/// Drafts a first-cut plan for a question.
///
/// The draft is untrusted output of a text-generation call; the pipeline
/// coerces and validates it before anything else happens.
#[async_trait]
pub trait PlanDrafter: Send + Sync {
    async fn draft(
        &self,
        question: &str,
        metadata: &MetadataSnapshot,
    ) -> Result<DraftPlan, CollaboratorError>;
}

/// Executes compiled SQL with bound parameters.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str, params: &[Param]) -> Result<ResultSet, ExecuteError>;
}

/// Narrates already-computed, already-safe results.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn narrate(
        &self,
        question: &str,
        plan: &CanonicalPlan,
        results: &ResultSet,
    ) -> Result<String, CollaboratorError>;
}
