//! Palisade CLI - validate and compile query plans against metadata files.
//!
//! Usage:
//!   palisade validate --plan plan.json --schema schema.json --mappings mappings.json --joins joins.json
//!   palisade compile  --plan plan.json --schema schema.json --mappings mappings.json --joins joins.json [--dialect mysql]
//!   palisade run      --plan plan.json --schema schema.json --mappings mappings.json --joins joins.json [--narrate]
//!
//! The metadata files hold the same JSON shapes the collaborators produce,
//! which makes the CLI a fixture-driven dry run of the whole pipeline.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use palisade::audit::MemoryAuditSink;
use palisade::catalog::shared::{MetadataSnapshot, SharedMetadata};
use palisade::catalog::SchemaSnapshot;
use palisade::config::Settings;
use palisade::mapping::{JoinGraph, MappingState};
use palisade::pipeline::{
    CollaboratorError, IntentClassifier, Narrator, Orchestrator, PipelineRequest, PlanDrafter,
    ResultSet,
};
use palisade::plan::draft::DraftPlan;
use palisade::plan::CanonicalPlan;
use palisade::semantic::{JoinResolver, PlanValidator};
use palisade::sql::{check_safety, Dialect, SqlCompiler};

#[derive(Parser)]
#[command(name = "palisade")]
#[command(about = "Palisade - compile validated query plans to tenant-scoped SQL")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to palisade.toml (defaults to the standard search path)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a plan against schema, mappings and approved joins
    Validate {
        #[command(flatten)]
        inputs: InputFiles,
    },

    /// Validate and compile a plan, printing SQL and parameters
    Compile {
        #[command(flatten)]
        inputs: InputFiles,

        /// SQL dialect to generate (overrides the config)
        #[arg(short, long)]
        dialect: Option<DialectArg>,
    },

    /// Run the full pipeline over the plan file, printing the step report
    Run {
        #[command(flatten)]
        inputs: InputFiles,

        /// Narrate the (placeholder) results
        #[arg(long)]
        narrate: bool,
    },
}

#[derive(clap::Args)]
struct InputFiles {
    /// Path to the plan JSON file
    #[arg(long)]
    plan: PathBuf,

    /// Path to the schema snapshot JSON file
    #[arg(long)]
    schema: PathBuf,

    /// Path to the mappings JSON file
    #[arg(long)]
    mappings: PathBuf,

    /// Path to the approved joins JSON file
    #[arg(long)]
    joins: PathBuf,
}

#[derive(Clone, ValueEnum)]
enum DialectArg {
    Mysql,
    Postgres,
    Tsql,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Mysql => Dialect::MySql,
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Tsql => Dialect::TSql,
        }
    }
}

struct Loaded {
    draft: DraftPlan,
    schema: SchemaSnapshot,
    mappings: MappingState,
    joins: JoinGraph,
}

fn load_inputs(inputs: &InputFiles) -> Result<Loaded, String> {
    let read = |path: &PathBuf| -> Result<String, String> {
        fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))
    };

    let draft = DraftPlan::from_json(&read(&inputs.plan)?).map_err(|e| e.to_string())?;
    let schema: SchemaSnapshot =
        serde_json::from_str(&read(&inputs.schema)?).map_err(|e| e.to_string())?;
    let mappings: MappingState =
        serde_json::from_str(&read(&inputs.mappings)?).map_err(|e| e.to_string())?;
    let joins: JoinGraph =
        serde_json::from_str(&read(&inputs.joins)?).map_err(|e| e.to_string())?;

    Ok(Loaded {
        draft,
        schema,
        mappings,
        joins,
    })
}

fn validate(
    settings: &Settings,
    loaded: &Loaded,
    plan: &CanonicalPlan,
) -> palisade::semantic::ValidationReport {
    PlanValidator::new(
        &loaded.schema,
        &loaded.mappings,
        &loaded.joins,
        &settings.security,
    )
    .validate(plan)
}

fn cmd_validate(settings: &Settings, inputs: &InputFiles) -> Result<(), String> {
    let loaded = load_inputs(inputs)?;
    let plan = loaded
        .draft
        .clone()
        .coerce(settings.security.default_limit)
        .map_err(|e| e.to_string())?;
    let report = validate(settings, &loaded, &plan);

    for warning in &report.warnings {
        println!("warning [{}] {}", warning.code, warning.message);
    }
    if report.is_valid() {
        println!("plan is valid");
        println!("{}", palisade::audit::describe_plan(&plan, None));
        Ok(())
    } else {
        for error in &report.errors {
            println!("error {}", error);
            if let Some(suggestion) = &error.suggestion {
                println!("  hint: {}", suggestion);
            }
        }
        Err(format!("{} validation error(s)", report.errors.len()))
    }
}

fn cmd_compile(
    settings: &Settings,
    inputs: &InputFiles,
    dialect: Option<DialectArg>,
) -> Result<(), String> {
    let loaded = load_inputs(inputs)?;
    let plan = loaded
        .draft
        .clone()
        .coerce(settings.security.default_limit)
        .map_err(|e| e.to_string())?;
    let report = validate(settings, &loaded, &plan);
    if !report.is_valid() {
        return Err(format!(
            "plan is invalid:\n{}",
            report.error_messages().join("\n")
        ));
    }

    let dialect = match dialect {
        Some(arg) => arg.into(),
        None => settings.database.dialect().map_err(|e| e.to_string())?,
    };

    let resolver = JoinResolver::new(&loaded.joins);
    let (join_tree, failures) = resolver.join_tree(&plan.fact_table, &plan.dimensions);
    if !failures.is_empty() {
        return Err("join resolution failed after validation".to_string());
    }

    let compiler = SqlCompiler::new(&loaded.schema, dialect, settings.security.max_limit);
    let query = compiler
        .compile(&plan, &join_tree, Uuid::new_v4())
        .map_err(|e| e.to_string())?;
    check_safety(&query.sql, dialect).map_err(|e| e.to_string())?;

    println!("{}", query.sql);
    for param in &query.params {
        println!("-- :{} = {}", param.name, param.value);
    }
    Ok(())
}

/// Fixture collaborators: the drafter replays the plan file, the classifier
/// labels everything "unknown", the narrator summarizes row counts.
struct FixtureDrafter(DraftPlan);

#[async_trait]
impl PlanDrafter for FixtureDrafter {
    async fn draft(
        &self,
        _question: &str,
        _metadata: &MetadataSnapshot,
    ) -> Result<DraftPlan, CollaboratorError> {
        Ok(self.0.clone())
    }
}

struct FixedClassifier;

#[async_trait]
impl IntentClassifier for FixedClassifier {
    async fn classify(&self, _question: &str) -> Result<String, CollaboratorError> {
        Ok("unknown".to_string())
    }
}

struct RowCountNarrator;

#[async_trait]
impl Narrator for RowCountNarrator {
    async fn narrate(
        &self,
        question: &str,
        plan: &CanonicalPlan,
        results: &ResultSet,
    ) -> Result<String, CollaboratorError> {
        Ok(format!(
            "\"{}\" compiled against '{}' and returned {} row(s).",
            question, plan.fact_table, results.row_count
        ))
    }
}

async fn cmd_run(settings: Settings, inputs: &InputFiles, narrate: bool) -> Result<(), String> {
    let loaded = load_inputs(inputs)?;

    let metadata = Arc::new(SharedMetadata::new(MetadataSnapshot {
        schema: loaded.schema,
        mappings: loaded.mappings,
        joins: loaded.joins,
        version: 1,
        refreshed_at: None,
    }));
    let audit = Arc::new(MemoryAuditSink::new());

    let mut orchestrator = Orchestrator::new(
        settings,
        metadata,
        Arc::new(FixedClassifier),
        Arc::new(FixtureDrafter(loaded.draft)),
        audit.clone(),
    )
    .map_err(|e| e.to_string())?;
    if narrate {
        orchestrator = orchestrator.with_narrator(Arc::new(RowCountNarrator));
    }

    let request = PipelineRequest::new("fixture plan dry run").with_narrate(narrate);
    let report = orchestrator.run(request).await;

    println!("{:<20} {:<10} {:>10}", "stage", "status", "latency");
    for step in &report.steps {
        println!(
            "{:<20} {:<10} {:>8}ms",
            step.stage,
            format!("{:?}", step.status).to_lowercase(),
            step.latency_ms.unwrap_or(0)
        );
        if let Some(error) = &step.error {
            println!("  error: {}", error);
        }
        for warning in &step.warnings {
            println!("  warning: {}", warning);
        }
    }

    if let Some(query) = &report.query {
        println!("\n{}", query.sql);
        for param in &query.params {
            println!("-- :{} = {}", param.name, param.value);
        }
    }
    if let Some(narration) = &report.narration {
        println!("\n{}", narration);
    }

    for record in audit.records() {
        println!(
            "\naudit {} status={:?} hash={}",
            record.request_id,
            record.status,
            record.plan_hash.as_deref().unwrap_or("-")
        );
    }

    if report.success {
        Ok(())
    } else {
        Err("pipeline did not complete".to_string())
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("error: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Validate { ref inputs } => cmd_validate(&settings, inputs),
        Commands::Compile {
            ref inputs,
            ref dialect,
        } => cmd_compile(&settings, inputs, dialect.clone()),
        Commands::Run {
            ref inputs,
            narrate,
        } => {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(err) => {
                    eprintln!("error: {}", err);
                    return ExitCode::FAILURE;
                }
            };
            runtime.block_on(cmd_run(settings, inputs, narrate))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
