//! # Palisade
//!
//! A semantic compilation core for natural-language analytics: structured,
//! LLM-drafted query plans go in; parameterized, tenant-scoped, read-only
//! SQL comes out. No language model ever emits SQL text directly.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │            Draft Plan (untrusted JSON payload)           │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [plan builder - coercion]
//! ┌─────────────────────────────────────────────────────────┐
//! │              CanonicalPlan (closed Rust types)           │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [validator + join resolver]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Validated plan + deterministic join paths         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [compiler - pure lowering]
//! ┌─────────────────────────────────────────────────────────┐
//! │        CompiledQuery (SQL text + bound parameters)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [safety guard - fail closed]
//! ┌─────────────────────────────────────────────────────────┐
//! │           Single read-only SELECT, or rejection          │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The pipeline orchestrator sequences these steps together with the
//! external collaborators (intent classification, plan drafting, execution,
//! narration) and writes one audit record per run.

pub mod audit;
pub mod catalog;
pub mod config;
pub mod mapping;
pub mod pipeline;
pub mod plan;
pub mod semantic;
pub mod sql;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::audit::{plan_hash, AuditRecord, AuditSink, AuditStatus, MemoryAuditSink};
    pub use crate::catalog::shared::{MetadataSnapshot, SharedMetadata};
    pub use crate::catalog::{Column, ForeignKey, SchemaSnapshot, Table};
    pub use crate::config::Settings;
    pub use crate::mapping::{
        JoinEdge, JoinGraph, MappingState, Priority, TableMapping, TableRole,
    };
    pub use crate::pipeline::{
        Orchestrator, PipelineRequest, ResultSet, Stage, StepStatus,
    };
    pub use crate::plan::builder::{Entities, PlanBuilder, PlanTemplate, TimeWindow};
    pub use crate::plan::draft::DraftPlan;
    pub use crate::plan::{
        Aggregation, CanonicalPlan, Filter, FilterOp, FilterValue, Metric, OrderBy, SortDir,
    };
    pub use crate::semantic::{
        validate_question, JoinResolver, PlanValidator, ValidationCode, ValidationReport,
    };
    pub use crate::sql::{check_safety, CompiledQuery, Dialect, SqlCompiler};
}

// Also export the workhorse types at the crate root.
pub use plan::CanonicalPlan;
pub use semantic::{PlanValidator, ValidationCode};
pub use sql::{CompiledQuery, Dialect, SqlCompiler};
