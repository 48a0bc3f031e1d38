//! Audit records.
//!
//! Every pipeline run emits exactly one record: what was asked, the hash of
//! the plan that was compiled, the SQL that came out, and how the run ended.
//! Records are append-only; the core never mutates or deletes one after it
//! is handed to the sink.

pub mod sink;

pub use sink::{AuditSink, FileAuditSink, MemoryAuditSink};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::plan::CanonicalPlan;
use crate::sql::Param;

/// Terminal status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Completed,
    ValidationFailed,
    CompileFailed,
    SafetyRejected,
    ExecutionFailed,
    Cancelled,
    Failed,
}

/// One append-only audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub status: AuditStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    /// SHA-256 over the canonical JSON of the plan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    /// Bound parameter names, always recorded.
    #[serde(default)]
    pub param_names: Vec<String>,
    /// Parameter values; present only when the redaction policy allows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AuditRecord {
    pub fn new(request_id: Uuid, timestamp: DateTime<Utc>, status: AuditStatus) -> Self {
        Self {
            request_id,
            timestamp,
            status,
            intent: None,
            plan_hash: None,
            sql: None,
            param_names: Vec::new(),
            param_values: None,
            message: None,
        }
    }

    /// Attach the compiled parameters, honoring the redaction policy.
    pub fn with_params(mut self, params: &[Param], redact: bool) -> Self {
        self.param_names = params.iter().map(|p| p.name.clone()).collect();
        if !redact {
            self.param_values = Some(params.iter().map(|p| p.value.to_string()).collect());
        }
        self
    }
}

/// Compute the SHA-256 hash of a plan's canonical JSON.
///
/// Serialization of a `CanonicalPlan` is deterministic (struct field order),
/// so equal plans always hash equal. Returns a 64-character lowercase hex
/// string.
pub fn plan_hash(plan: &CanonicalPlan) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(plan)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Human-readable description of a plan for logs and audit messages.
pub fn describe_plan(plan: &CanonicalPlan, sql: Option<&str>) -> String {
    let mut lines = vec![
        format!("Intent: {}", plan.intent),
        format!("Fact table: {}", plan.fact_table),
        format!("Dimensions: {}", plan.dimensions.join(", ")),
        format!(
            "Metrics: {}",
            plan.metrics
                .iter()
                .map(|m| format!("{}({})", m.aggregation.sql_name(), m.column))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        format!(
            "Filters: {}",
            plan.filters
                .iter()
                .map(|f| f.column.clone())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        format!("Group by: {}", plan.group_by.join(", ")),
    ];
    if let Some(sql) = sql {
        lines.push(format!("SQL: {}", sql));
    }
    lines.join("\n")
}
