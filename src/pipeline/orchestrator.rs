//! The pipeline orchestrator.
//!
//! Sequences the fixed stages, records per-stage status and latency, and
//! emits exactly one audit record per run regardless of outcome. Control
//! flow is strictly linear: a hard error halts every following mandatory
//! stage, which stays `pending` in the report rather than disappearing.
//!
//! The orchestrator holds no request-scoped state between runs; everything a
//! run touches is owned by that invocation or read from the immutable
//! metadata snapshot it loaded up front.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::time::timeout;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::audit::{plan_hash, AuditRecord, AuditSink, AuditStatus};
use crate::catalog::shared::SharedMetadata;
use crate::config::{Settings, SettingsError};
use crate::plan::builder::PlanBuilder;
use crate::semantic::{validate_question, JoinResolver, PlanValidator};
use crate::sql::{check_safety, Dialect, SqlCompiler};

use super::collaborators::{
    IntentClassifier, Narrator, PlanDrafter, QueryExecutor, ResultSet,
};
use super::{PipelineReport, Stage, StepStatus};

/// One pipeline run request.
#[derive(Clone)]
pub struct PipelineRequest {
    pub question: String,
    /// Run the compiled query against the database.
    pub execute: bool,
    /// Narrate the results (or their placeholder when execution is off).
    pub narrate: bool,
    /// Cooperative cancellation; checked between stages.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl PipelineRequest {
    pub fn new(question: &str) -> Self {
        Self {
            question: question.to_string(),
            execute: false,
            narrate: false,
            cancel: None,
        }
    }

    pub fn with_execute(mut self, execute: bool) -> Self {
        self.execute = execute;
        self
    }

    pub fn with_narrate(mut self, narrate: bool) -> Self {
        self.narrate = narrate;
        self
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

/// Sequences a run through the fixed stage list.
pub struct Orchestrator {
    settings: Settings,
    dialect: Dialect,
    metadata: Arc<SharedMetadata>,
    classifier: Arc<dyn IntentClassifier>,
    drafter: Arc<dyn PlanDrafter>,
    executor: Option<Arc<dyn QueryExecutor>>,
    narrator: Option<Arc<dyn Narrator>>,
    audit: Arc<dyn AuditSink>,
}

impl Orchestrator {
    pub fn new(
        settings: Settings,
        metadata: Arc<SharedMetadata>,
        classifier: Arc<dyn IntentClassifier>,
        drafter: Arc<dyn PlanDrafter>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, SettingsError> {
        let dialect = settings.database.dialect()?;
        Ok(Self {
            settings,
            dialect,
            metadata,
            classifier,
            drafter,
            executor: None,
            narrator: None,
            audit,
        })
    }

    pub fn with_executor(mut self, executor: Arc<dyn QueryExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_narrator(mut self, narrator: Arc<dyn Narrator>) -> Self {
        self.narrator = Some(narrator);
        self
    }

    /// Run the pipeline for one question.
    pub async fn run(&self, request: PipelineRequest) -> PipelineReport {
        let request_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut report = PipelineReport::new(request_id, &request.question);
        let mut status = AuditStatus::Failed;
        let mut audit_message: Option<String> = None;

        // Caller-disabled optional stages are skipped, which is a different
        // fact than pending (never reached).
        if !request.execute {
            report.step_mut(Stage::ExecuteQuery).status = StepStatus::Skipped;
        }
        if !request.narrate {
            report.step_mut(Stage::Narrate).status = StepStatus::Skipped;
        }

        let mut halted = false;
        let mut cancelled = false;
        let metadata = self.metadata.load();

        for stage in Stage::ALL {
            if halted {
                break;
            }
            if request.cancelled() {
                cancelled = true;
                break;
            }
            if report.step(stage).status == StepStatus::Skipped {
                continue;
            }

            report.step_mut(stage).status = StepStatus::Running;
            let stage_start = Instant::now();
            let outcome: Result<Vec<String>, String> = match stage {
                Stage::ValidateQuestion => {
                    let question_report = validate_question(&request.question);
                    if question_report.is_valid() {
                        Ok(question_report
                            .warnings
                            .iter()
                            .map(|w| w.message.clone())
                            .collect())
                    } else {
                        Err(question_report.error_messages().join("; "))
                    }
                }

                Stage::DetectIntent => {
                    let deadline = Duration::from_millis(self.settings.pipeline.classify_timeout_ms);
                    match timeout(deadline, self.classifier.classify(&request.question)).await {
                        Ok(Ok(intent)) => {
                            report.intent = Some(intent);
                            Ok(Vec::new())
                        }
                        Ok(Err(err)) => Err(format!("intent classification failed: {}", err)),
                        Err(_) => Err("intent classification timed out".to_string()),
                    }
                }

                Stage::LoadSchema => {
                    debug!(
                        tables = metadata.schema.tables.len(),
                        mappings = metadata.mappings.tables.len(),
                        joins = metadata.joins.joins.len(),
                        version = metadata.version,
                        "loaded metadata snapshot"
                    );
                    Ok(Vec::new())
                }

                Stage::GeneratePlan => {
                    let deadline = Duration::from_millis(self.settings.pipeline.draft_timeout_ms);
                    match timeout(deadline, self.drafter.draft(&request.question, &metadata)).await
                    {
                        Ok(Ok(draft)) => {
                            let builder =
                                PlanBuilder::new(&metadata.mappings, &self.settings.security);
                            match builder.from_draft(draft) {
                                Ok(mut plan) => {
                                    if plan.intent.is_empty() {
                                        if let Some(intent) = &report.intent {
                                            plan.intent = intent.clone();
                                        }
                                    }
                                    report.plan = Some(plan);
                                    Ok(Vec::new())
                                }
                                Err(err) => Err(format!("draft coercion failed: {}", err)),
                            }
                        }
                        Ok(Err(err)) => Err(format!("plan drafting failed: {}", err)),
                        Err(_) => Err("plan drafting timed out".to_string()),
                    }
                }

                Stage::ValidatePlan => {
                    let plan = report.plan.as_ref().expect("plan exists past generation");
                    let validator = PlanValidator::new(
                        &metadata.schema,
                        &metadata.mappings,
                        &metadata.joins,
                        &self.settings.security,
                    );
                    let validation = validator.validate(plan);
                    let outcome = if validation.is_valid() {
                        Ok(validation.warnings.iter().map(|w| w.message.clone()).collect())
                    } else {
                        status = AuditStatus::ValidationFailed;
                        Err(validation.error_messages().join("; "))
                    };
                    report.validation = Some(validation);
                    outcome
                }

                Stage::CompileSql => {
                    let plan = report.plan.as_ref().expect("plan exists past validation");
                    let resolver = JoinResolver::new(&metadata.joins);
                    let (join_tree, failures) = resolver.join_tree(&plan.fact_table, &plan.dimensions);
                    if !failures.is_empty() {
                        // Validation guaranteed resolvable paths; reaching
                        // this is a bug, not a user mistake.
                        status = AuditStatus::CompileFailed;
                        error!(fact = %plan.fact_table, "join resolution failed after validation");
                        Err("internal compilation error".to_string())
                    } else {
                        let compiler = SqlCompiler::new(
                            &metadata.schema,
                            self.dialect,
                            self.settings.security.max_limit,
                        );
                        match compiler.compile(plan, &join_tree, request_id) {
                            Ok(query) => {
                                report.query = Some(query);
                                Ok(Vec::new())
                            }
                            Err(err) => {
                                status = AuditStatus::CompileFailed;
                                error!(%err, "validated plan failed to compile");
                                audit_message = Some(format!("compile error: {}", err));
                                Err("internal compilation error".to_string())
                            }
                        }
                    }
                }

                Stage::ValidateSafety => {
                    let query = report.query.as_ref().expect("query exists past compilation");
                    match check_safety(&query.sql, self.dialect) {
                        Ok(()) => Ok(Vec::new()),
                        Err(violation) => {
                            status = AuditStatus::SafetyRejected;
                            audit_message =
                                Some(format!("safety issues: {}", violation.issues().join("; ")));
                            // Generic message only; detail stays in audit.
                            Err(violation.to_string())
                        }
                    }
                }

                Stage::ExecuteQuery => {
                    let query = report.query.as_ref().expect("query exists past safety");
                    match &self.executor {
                        None => {
                            status = AuditStatus::ExecutionFailed;
                            Err("no query executor configured".to_string())
                        }
                        Some(executor) => {
                            let deadline =
                                Duration::from_millis(self.settings.pipeline.execute_timeout_ms);
                            match timeout(deadline, executor.execute(&query.sql, &query.params))
                                .await
                            {
                                Ok(Ok(results)) => {
                                    report.results = Some(
                                        results
                                            .truncate_to(self.settings.pipeline.max_result_rows),
                                    );
                                    Ok(Vec::new())
                                }
                                Ok(Err(err)) => {
                                    status = AuditStatus::ExecutionFailed;
                                    audit_message =
                                        Some(format!("execution error: {}", err.detail()));
                                    Err(err.to_string())
                                }
                                Err(_) => {
                                    status = AuditStatus::ExecutionFailed;
                                    audit_message = Some("execution timed out".to_string());
                                    Err(format!(
                                        "[E_EXECUTION_TIMEOUT] query execution exceeded {} ms",
                                        self.settings.pipeline.execute_timeout_ms
                                    ))
                                }
                            }
                        }
                    }
                }

                Stage::Narrate => {
                    let plan = report.plan.as_ref().expect("plan exists past validation");
                    match &self.narrator {
                        None => Err("no narrator configured".to_string()),
                        Some(narrator) => {
                            // With execution disabled, narration runs over an
                            // empty results placeholder.
                            let placeholder = ResultSet::default();
                            let results = report.results.as_ref().unwrap_or(&placeholder);
                            let deadline =
                                Duration::from_millis(self.settings.pipeline.narrate_timeout_ms);
                            match timeout(
                                deadline,
                                narrator.narrate(&request.question, plan, results),
                            )
                            .await
                            {
                                Ok(Ok(text)) => {
                                    report.narration = Some(text);
                                    Ok(Vec::new())
                                }
                                Ok(Err(err)) => Err(format!("narration failed: {}", err)),
                                Err(_) => Err("narration timed out".to_string()),
                            }
                        }
                    }
                }
            };

            let latency = stage_start.elapsed().as_millis() as u64;
            let step = report.step_mut(stage);
            step.latency_ms = Some(latency);
            match outcome {
                Ok(warnings) => {
                    step.status = StepStatus::Success;
                    step.warnings = warnings;
                    debug!(stage = %stage, latency_ms = latency, "stage succeeded");
                }
                Err(message) => {
                    step.status = StepStatus::Error;
                    step.error = Some(message.clone());
                    if audit_message.is_none() {
                        audit_message = Some(message.clone());
                    }
                    warn!(stage = %stage, latency_ms = latency, %message, "stage failed");
                    halted = true;
                }
            }
        }

        if cancelled {
            status = AuditStatus::Cancelled;
            audit_message = Some("run cancelled by caller".to_string());
        }

        report.total_latency_ms = report.steps.iter().filter_map(|s| s.latency_ms).sum();
        report.success = report
            .steps
            .iter()
            .all(|s| matches!(s.status, StepStatus::Success | StepStatus::Skipped));
        if report.success {
            status = AuditStatus::Completed;
        }

        let mut record = AuditRecord::new(request_id, started_at, status);
        record.intent = report.intent.clone();
        if let Some(plan) = &report.plan {
            record.plan_hash = plan_hash(plan).ok();
        }
        if let Some(query) = &report.query {
            record.sql = Some(query.sql.clone());
            record = record.with_params(&query.params, self.settings.audit.redact_params);
        }
        record.message = audit_message;
        self.audit.append(record);

        report
    }
}
