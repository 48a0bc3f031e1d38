//! The pipeline step model.
//!
//! A run is a fixed sequence of named stages. The stage set is closed and
//! known in advance: the report always contains one entry per stage, so a
//! caller can render a complete timeline whatever the outcome. A stage that
//! was never reached stays `pending`; a stage the caller disabled is
//! `skipped`; those are different facts and the report keeps them distinct.

pub mod collaborators;
pub mod orchestrator;

pub use collaborators::{
    CollaboratorError, ExecuteError, IntentClassifier, Narrator, PlanDrafter, QueryExecutor,
    ResultSet,
};
pub use orchestrator::{Orchestrator, PipelineRequest};

use serde::Serialize;
use uuid::Uuid;

use crate::plan::CanonicalPlan;
use crate::semantic::ValidationReport;
use crate::sql::CompiledQuery;

/// The fixed stage sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "&'static str")]
pub enum Stage {
    ValidateQuestion,
    DetectIntent,
    LoadSchema,
    GeneratePlan,
    ValidatePlan,
    CompileSql,
    ValidateSafety,
    ExecuteQuery,
    Narrate,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ALL: [Stage; 9] = [
        Stage::ValidateQuestion,
        Stage::DetectIntent,
        Stage::LoadSchema,
        Stage::GeneratePlan,
        Stage::ValidatePlan,
        Stage::CompileSql,
        Stage::ValidateSafety,
        Stage::ExecuteQuery,
        Stage::Narrate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ValidateQuestion => "validate_question",
            Stage::DetectIntent => "detect_intent",
            Stage::LoadSchema => "load_schema",
            Stage::GeneratePlan => "generate_plan",
            Stage::ValidatePlan => "validate_plan",
            Stage::CompileSql => "compile_sql",
            Stage::ValidateSafety => "validate_safety",
            Stage::ExecuteQuery => "execute_query",
            Stage::Narrate => "narrate",
        }
    }

    /// Whether the caller may toggle this stage off.
    pub fn is_optional(&self) -> bool {
        matches!(self, Stage::ExecuteQuery | Stage::Narrate)
    }
}

impl From<Stage> for &'static str {
    fn from(stage: Stage) -> Self {
        stage.as_str()
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single stage within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Success,
    Error,
    Skipped,
}

/// The recorded outcome of one stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub stage: Stage,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl StepReport {
    fn pending(stage: Stage) -> Self {
        Self {
            stage,
            status: StepStatus::Pending,
            latency_ms: None,
            error: None,
            warnings: Vec::new(),
        }
    }
}

/// The complete result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub request_id: Uuid,
    pub question: String,
    pub success: bool,
    pub steps: Vec<StepReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<CanonicalPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<CompiledQuery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<ResultSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
    /// Sum of per-stage latencies.
    pub total_latency_ms: u64,
}

impl PipelineReport {
    pub(crate) fn new(request_id: Uuid, question: &str) -> Self {
        Self {
            request_id,
            question: question.to_string(),
            success: false,
            steps: Stage::ALL.iter().map(|s| StepReport::pending(*s)).collect(),
            intent: None,
            plan: None,
            validation: None,
            query: None,
            results: None,
            narration: None,
            total_latency_ms: 0,
        }
    }

    pub fn step(&self, stage: Stage) -> &StepReport {
        self.steps
            .iter()
            .find(|s| s.stage == stage)
            .expect("report always carries every stage")
    }

    pub(crate) fn step_mut(&mut self, stage: Stage) -> &mut StepReport {
        self.steps
            .iter_mut()
            .find(|s| s.stage == stage)
            .expect("report always carries every stage")
    }
}
