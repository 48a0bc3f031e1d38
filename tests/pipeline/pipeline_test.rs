use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use palisade::audit::{AuditStatus, MemoryAuditSink};
use palisade::catalog::shared::{MetadataSnapshot, SharedMetadata};
use palisade::catalog::{Column, SchemaSnapshot, Table};
use palisade::config::Settings;
use palisade::mapping::{JoinEdge, JoinGraph, MappingState, Priority, TableMapping, TableRole};
use palisade::pipeline::{
    CollaboratorError, ExecuteError, IntentClassifier, Narrator, Orchestrator, PipelineRequest,
    PlanDrafter, QueryExecutor, ResultSet, Stage, StepStatus,
};
use palisade::plan::draft::DraftPlan;
use palisade::plan::CanonicalPlan;
use palisade::sql::Param;

fn column(name: &str, ty: &str) -> Column {
    Column {
        name: name.into(),
        data_type: ty.into(),
        is_nullable: true,
        is_primary: false,
        is_foreign: false,
        foreign_key: None,
        comment: None,
    }
}

fn metadata() -> Arc<SharedMetadata> {
    let schema = SchemaSnapshot {
        tables: vec![
            Table {
                name: "bills".into(),
                columns: vec![
                    column("id", "bigint"),
                    column("tenant_id", "varchar(36)"),
                    column("vendor_id", "bigint"),
                    column("total_amount", "decimal(12,2)"),
                ],
                comment: None,
            },
            Table {
                name: "vendors".into(),
                columns: vec![column("id", "bigint"), column("vendor_name", "varchar(100)")],
                comment: None,
            },
        ],
        database: None,
    };
    let mappings = MappingState {
        tables: vec![
            TableMapping {
                table: "bills".into(),
                role: TableRole::Fact,
                priority: Priority::Gold,
                business_name: None,
                tenant_column: Some("tenant_id".into()),
            },
            TableMapping {
                table: "vendors".into(),
                role: TableRole::Dimension,
                priority: Priority::Silver,
                business_name: None,
                tenant_column: None,
            },
        ],
        columns: vec![],
    };
    let mut joins = JoinGraph::default();
    joins.approve(JoinEdge::new("bills", "vendor_id", "vendors", "id"));

    Arc::new(SharedMetadata::new(MetadataSnapshot {
        schema,
        mappings,
        joins,
        version: 1,
        refreshed_at: None,
    }))
}

struct StubClassifier;

#[async_trait]
impl IntentClassifier for StubClassifier {
    async fn classify(&self, _question: &str) -> Result<String, CollaboratorError> {
        Ok("financial_summary".to_string())
    }
}

/// Replays a fixed draft, as if a text-generation call produced it.
struct StubDrafter(String);

#[async_trait]
impl PlanDrafter for StubDrafter {
    async fn draft(
        &self,
        _question: &str,
        _metadata: &MetadataSnapshot,
    ) -> Result<DraftPlan, CollaboratorError> {
        DraftPlan::from_json(&self.0).map_err(|e| CollaboratorError::Malformed(e.to_string()))
    }
}

struct StubExecutor {
    delay: Option<Duration>,
    fail: bool,
}

impl StubExecutor {
    fn ok() -> Self {
        Self {
            delay: None,
            fail: false,
        }
    }
}

#[async_trait]
impl QueryExecutor for StubExecutor {
    async fn execute(&self, _sql: &str, _params: &[Param]) -> Result<ResultSet, ExecuteError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ExecuteError::Driver("ERROR 1064 near 'xyz'".into()));
        }
        Ok(ResultSet {
            columns: vec!["vendor_name".into(), "sum_total_amount".into()],
            rows: vec![vec![
                serde_json::json!("Acme Corp"),
                serde_json::json!(1234.5),
            ]],
            row_count: 1,
            truncated: false,
        })
    }
}

struct StubNarrator;

#[async_trait]
impl Narrator for StubNarrator {
    async fn narrate(
        &self,
        _question: &str,
        plan: &CanonicalPlan,
        results: &ResultSet,
    ) -> Result<String, CollaboratorError> {
        Ok(format!(
            "{} row(s) from {}",
            results.row_count, plan.fact_table
        ))
    }
}

fn good_draft() -> String {
    r#"{
        "intent": "Total bill amount per vendor",
        "fact_table": "bills",
        "dimensions": ["vendors"],
        "metrics": [{"column": "total_amount", "agg": "sum"}],
        "filters": [{"column": "tenant_id", "op": "=", "value": "t-1"}],
        "group_by": ["vendor_name"],
        "order_by": [],
        "limit": 100
    }"#
    .to_string()
}

fn orchestrator(draft: String, audit: Arc<MemoryAuditSink>) -> Orchestrator {
    Orchestrator::new(
        Settings::default(),
        metadata(),
        Arc::new(StubClassifier),
        Arc::new(StubDrafter(draft)),
        audit,
    )
    .unwrap()
}

#[tokio::test]
async fn disabled_stages_are_skipped_not_pending() {
    let audit = Arc::new(MemoryAuditSink::new());
    let orch = orchestrator(good_draft(), audit.clone());
    let report = orch
        .run(PipelineRequest::new("show totals per vendor"))
        .await;

    assert!(report.success, "steps: {:#?}", report.steps);
    for stage in [
        Stage::ValidateQuestion,
        Stage::DetectIntent,
        Stage::LoadSchema,
        Stage::GeneratePlan,
        Stage::ValidatePlan,
        Stage::CompileSql,
        Stage::ValidateSafety,
    ] {
        assert_eq!(report.step(stage).status, StepStatus::Success, "{}", stage);
    }
    assert_eq!(report.step(Stage::ExecuteQuery).status, StepStatus::Skipped);
    assert_eq!(report.step(Stage::Narrate).status, StepStatus::Skipped);

    assert!(report.query.is_some());
    assert!(report.results.is_none());

    // Exactly one audit record, completed, carrying the plan hash and SQL.
    let records = audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, AuditStatus::Completed);
    assert!(records[0].plan_hash.is_some());
    assert!(records[0].sql.is_some());
    assert_eq!(records[0].param_names, vec!["p0"]);
    // Redaction is on by default.
    assert!(records[0].param_values.is_none());
}

#[tokio::test]
async fn execution_and_narration_run_when_enabled() {
    let audit = Arc::new(MemoryAuditSink::new());
    let orch = orchestrator(good_draft(), audit.clone())
        .with_executor(Arc::new(StubExecutor::ok()))
        .with_narrator(Arc::new(StubNarrator));

    let report = orch
        .run(
            PipelineRequest::new("show totals per vendor")
                .with_execute(true)
                .with_narrate(true),
        )
        .await;

    assert!(report.success, "steps: {:#?}", report.steps);
    assert_eq!(report.step(Stage::ExecuteQuery).status, StepStatus::Success);
    assert_eq!(report.step(Stage::Narrate).status, StepStatus::Success);
    assert_eq!(report.results.as_ref().unwrap().row_count, 1);
    assert_eq!(report.narration.as_deref(), Some("1 row(s) from bills"));
}

#[tokio::test]
async fn narration_without_execution_uses_the_placeholder() {
    let audit = Arc::new(MemoryAuditSink::new());
    let orch = orchestrator(good_draft(), audit).with_narrator(Arc::new(StubNarrator));

    let report = orch
        .run(PipelineRequest::new("show totals per vendor").with_narrate(true))
        .await;

    assert!(report.success);
    assert_eq!(report.step(Stage::ExecuteQuery).status, StepStatus::Skipped);
    assert_eq!(report.step(Stage::Narrate).status, StepStatus::Success);
    assert_eq!(report.narration.as_deref(), Some("0 row(s) from bills"));
}

#[tokio::test]
async fn validation_failure_halts_and_reports_every_later_stage() {
    // Draft with no tenant filter: validation fails, compilation is never
    // invoked, and the report still shows the full timeline.
    let draft = r#"{
        "fact_table": "bills",
        "metrics": [{"column": "total_amount", "agg": "sum"}],
        "limit": 100
    }"#
    .to_string();

    let audit = Arc::new(MemoryAuditSink::new());
    let orch = orchestrator(draft, audit.clone());
    let report = orch.run(PipelineRequest::new("show all the totals")).await;

    assert!(!report.success);
    assert_eq!(report.steps.len(), Stage::ALL.len());
    assert_eq!(report.step(Stage::ValidatePlan).status, StepStatus::Error);
    assert_eq!(report.step(Stage::CompileSql).status, StepStatus::Pending);
    assert_eq!(report.step(Stage::ValidateSafety).status, StepStatus::Pending);
    // Disabled stages stay skipped, distinct from pending.
    assert_eq!(report.step(Stage::ExecuteQuery).status, StepStatus::Skipped);

    assert!(report.query.is_none());
    let validation = report.validation.as_ref().unwrap();
    assert!(validation
        .errors
        .iter()
        .any(|e| e.code == palisade::semantic::ValidationCode::NoTenantFilter));

    let records = audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, AuditStatus::ValidationFailed);
    assert!(records[0].sql.is_none());
    assert!(records[0].plan_hash.is_some());
}

#[tokio::test]
async fn execution_timeout_is_reported_distinctly() {
    let mut settings = Settings::default();
    settings.pipeline.execute_timeout_ms = 20;

    let audit = Arc::new(MemoryAuditSink::new());
    let orch = Orchestrator::new(
        settings,
        metadata(),
        Arc::new(StubClassifier),
        Arc::new(StubDrafter(good_draft())),
        audit.clone(),
    )
    .unwrap()
    .with_executor(Arc::new(StubExecutor {
        delay: Some(Duration::from_millis(500)),
        fail: false,
    }));

    let report = orch
        .run(PipelineRequest::new("show totals per vendor").with_execute(true))
        .await;

    assert!(!report.success);
    let step = report.step(Stage::ExecuteQuery);
    assert_eq!(step.status, StepStatus::Error);
    assert!(step.error.as_ref().unwrap().contains("E_EXECUTION_TIMEOUT"));
    assert_eq!(audit.records()[0].status, AuditStatus::ExecutionFailed);
}

#[tokio::test]
async fn driver_errors_reach_callers_sanitized() {
    let audit = Arc::new(MemoryAuditSink::new());
    let orch = orchestrator(good_draft(), audit.clone()).with_executor(Arc::new(StubExecutor {
        delay: None,
        fail: true,
    }));

    let report = orch
        .run(PipelineRequest::new("show totals per vendor").with_execute(true))
        .await;

    let step = report.step(Stage::ExecuteQuery);
    assert_eq!(step.status, StepStatus::Error);
    // The caller-visible message hides the raw driver error.
    assert!(!step.error.as_ref().unwrap().contains("1064"));
    // The audit record keeps the detail.
    assert!(audit.records()[0]
        .message
        .as_ref()
        .unwrap()
        .contains("1064"));
}

#[tokio::test]
async fn cancellation_before_start_leaves_stages_pending() {
    let audit = Arc::new(MemoryAuditSink::new());
    let orch = orchestrator(good_draft(), audit.clone());

    let cancel = Arc::new(AtomicBool::new(true));
    let report = orch
        .run(PipelineRequest::new("show totals per vendor").with_cancel(cancel))
        .await;

    assert!(!report.success);
    assert_eq!(
        report.step(Stage::ValidateQuestion).status,
        StepStatus::Pending
    );
    assert_eq!(audit.records()[0].status, AuditStatus::Cancelled);
}

#[tokio::test]
async fn malformed_question_fails_the_first_stage() {
    let audit = Arc::new(MemoryAuditSink::new());
    let orch = orchestrator(good_draft(), audit.clone());
    let report = orch.run(PipelineRequest::new("")).await;

    assert!(!report.success);
    assert_eq!(
        report.step(Stage::ValidateQuestion).status,
        StepStatus::Error
    );
    assert_eq!(report.step(Stage::DetectIntent).status, StepStatus::Pending);
    assert_eq!(audit.records().len(), 1);
}

#[tokio::test]
async fn total_latency_is_the_sum_of_stage_latencies() {
    let audit = Arc::new(MemoryAuditSink::new());
    let orch = orchestrator(good_draft(), audit);
    let report = orch
        .run(PipelineRequest::new("show totals per vendor"))
        .await;

    let sum: u64 = report.steps.iter().filter_map(|s| s.latency_ms).sum();
    assert_eq!(report.total_latency_ms, sum);
}
