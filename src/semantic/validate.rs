//! Plan validation.
//!
//! The validator decides whether a canonical plan may proceed to
//! compilation. It runs a fixed, ordered sequence of independent checks and
//! always runs every one of them: the point of the batch is to let a caller
//! fix every problem in one round-trip instead of resubmitting once per
//! error. Warnings never block compilation.

use std::collections::HashMap;

use serde::Serialize;

use crate::catalog::{Column, SchemaSnapshot};
use crate::config::SecuritySettings;
use crate::mapping::{JoinGraph, MappingState, TableRole};
use crate::plan::{CanonicalPlan, FilterOp, FilterValue};
use crate::semantic::resolve::JoinResolver;

/// Stable codes for validation diagnostics.
///
/// Codes, not messages, are the contract: callers and tests key on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(into = "&'static str")]
pub enum ValidationCode {
    // Errors
    TableUnknown,
    FactNotMapped,
    DimNotMapped,
    ColumnUnknown,
    NoTenantFilter,
    JoinNotApproved,
    AggNotAllowed,
    FilterMalformed,
    LimitNotPositive,
    // Warnings
    LimitClamped,
    ImplicitGroupBy,
    OrderByIgnored,
    NonNumericAgg,
    // Question checks
    QuestionEmpty,
    QuestionTooShort,
    QuestionTooLong,
    SuspiciousKeyword,
}

impl ValidationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationCode::TableUnknown => "E_TABLE_UNKNOWN",
            ValidationCode::FactNotMapped => "E_FACT_NOT_MAPPED",
            ValidationCode::DimNotMapped => "E_DIM_NOT_MAPPED",
            ValidationCode::ColumnUnknown => "E_COLUMN_UNKNOWN",
            ValidationCode::NoTenantFilter => "E_NO_TENANT_FILTER",
            ValidationCode::JoinNotApproved => "E_JOIN_NOT_APPROVED",
            ValidationCode::AggNotAllowed => "E_AGG_NOT_ALLOWED",
            ValidationCode::FilterMalformed => "E_FILTER_MALFORMED",
            ValidationCode::LimitNotPositive => "E_LIMIT_NOT_POSITIVE",
            ValidationCode::LimitClamped => "W_LIMIT_CLAMPED",
            ValidationCode::ImplicitGroupBy => "W_IMPLICIT_GROUP_BY",
            ValidationCode::OrderByIgnored => "W_ORDER_BY_IGNORED",
            ValidationCode::NonNumericAgg => "W_NON_NUMERIC_AGG",
            ValidationCode::QuestionEmpty => "E_QUESTION_EMPTY",
            ValidationCode::QuestionTooShort => "E_QUESTION_TOO_SHORT",
            ValidationCode::QuestionTooLong => "E_QUESTION_TOO_LONG",
            ValidationCode::SuspiciousKeyword => "W_SUSPICIOUS_KEYWORD",
        }
    }
}

impl From<ValidationCode> for &'static str {
    fn from(code: ValidationCode) -> Self {
        code.as_str()
    }
}

impl std::fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validation error with details.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    pub code: ValidationCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// A non-blocking validation warning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationWarning {
    pub code: ValidationCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// The complete result of one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_error(&self, code: ValidationCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    pub fn has_warning(&self, code: ValidationCode) -> bool {
        self.warnings.iter().any(|w| w.code == code)
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }

    fn error(&mut self, code: ValidationCode, message: String, field: Option<&str>) {
        self.errors.push(ValidationError {
            code,
            message,
            field: field.map(Into::into),
            suggestion: None,
        });
    }

    fn error_with_suggestion(
        &mut self,
        code: ValidationCode,
        message: String,
        field: Option<&str>,
        suggestion: String,
    ) {
        self.errors.push(ValidationError {
            code,
            message,
            field: field.map(Into::into),
            suggestion: Some(suggestion),
        });
    }

    fn warning(&mut self, code: ValidationCode, message: String, field: Option<&str>) {
        self.warnings.push(ValidationWarning {
            code,
            message,
            field: field.map(Into::into),
        });
    }
}

/// Validates canonical plans against the schema snapshot, mappings and
/// approved joins.
pub struct PlanValidator<'a> {
    snapshot: &'a SchemaSnapshot,
    mappings: &'a MappingState,
    joins: &'a JoinGraph,
    security: &'a SecuritySettings,
}

impl<'a> PlanValidator<'a> {
    pub fn new(
        snapshot: &'a SchemaSnapshot,
        mappings: &'a MappingState,
        joins: &'a JoinGraph,
        security: &'a SecuritySettings,
    ) -> Self {
        Self {
            snapshot,
            mappings,
            joins,
            security,
        }
    }

    /// Run every check and return the complete batch.
    pub fn validate(&self, plan: &CanonicalPlan) -> ValidationReport {
        let mut report = ValidationReport::default();
        let columns = self.snapshot.column_lookup();

        self.check_fact_table(plan, &mut report);
        self.check_dimensions(plan, &mut report);
        self.check_joins(plan, &mut report);
        self.check_metrics(plan, &columns, &mut report);
        self.check_filters(plan, &columns, &mut report);
        self.check_group_by(plan, &columns, &mut report);
        self.check_order_by(plan, &columns, &mut report);
        self.check_tenant_filter(plan, &mut report);
        self.check_limit(plan, &mut report);

        report
    }

    fn check_fact_table(&self, plan: &CanonicalPlan, report: &mut ValidationReport) {
        if plan.fact_table.is_empty() {
            report.error(
                ValidationCode::FactNotMapped,
                "No fact table specified in the plan".into(),
                Some("fact_table"),
            );
            return;
        }

        if self.snapshot.table(&plan.fact_table).is_none() {
            report.error(
                ValidationCode::TableUnknown,
                format!("Fact table '{}' not found in schema", plan.fact_table),
                Some("fact_table"),
            );
        }

        match self.mappings.table(&plan.fact_table) {
            Some(mapping) if mapping.role == TableRole::Fact => {}
            _ => {
                let facts: Vec<_> = self
                    .mappings
                    .fact_tables()
                    .iter()
                    .map(|t| t.table.clone())
                    .collect();
                report.error_with_suggestion(
                    ValidationCode::FactNotMapped,
                    format!("Table '{}' is not mapped as a fact table", plan.fact_table),
                    Some("fact_table"),
                    if facts.is_empty() {
                        "Map a fact table first".into()
                    } else {
                        format!("Mapped fact tables: {}", facts.join(", "))
                    },
                );
            }
        }
    }

    fn check_dimensions(&self, plan: &CanonicalPlan, report: &mut ValidationReport) {
        for dim in &plan.dimensions {
            if self.snapshot.table(dim).is_none() {
                report.error(
                    ValidationCode::TableUnknown,
                    format!("Dimension table '{}' not found in schema", dim),
                    Some("dimensions"),
                );
            }

            match self.mappings.table(dim) {
                Some(mapping) if mapping.role == TableRole::Dimension => {}
                _ => {
                    report.error(
                        ValidationCode::DimNotMapped,
                        format!("Table '{}' is not mapped as a dimension", dim),
                        Some("dimensions"),
                    );
                }
            }
        }
    }

    fn check_joins(&self, plan: &CanonicalPlan, report: &mut ValidationReport) {
        if plan.fact_table.is_empty() || plan.dimensions.is_empty() {
            return;
        }

        let resolver = JoinResolver::new(self.joins);
        let (_, failures) = resolver.join_tree(&plan.fact_table, &plan.dimensions);
        for (dim, _) in failures {
            report.error_with_suggestion(
                ValidationCode::JoinNotApproved,
                format!(
                    "No approved join path from fact '{}' to dimension '{}'",
                    plan.fact_table, dim
                ),
                Some("dimensions"),
                "Approve a join relationship between these tables".into(),
            );
        }
    }

    fn check_metrics(
        &self,
        plan: &CanonicalPlan,
        columns: &HashMap<(&str, &str), &Column>,
        report: &mut ValidationReport,
    ) {
        for (i, metric) in plan.metrics.iter().enumerate() {
            let field = format!("metrics[{}]", i);

            if !self
                .security
                .allowed_aggregations
                .iter()
                .any(|a| a == metric.aggregation.wire_name())
            {
                report.error_with_suggestion(
                    ValidationCode::AggNotAllowed,
                    format!(
                        "Aggregation '{}' is not allowed",
                        metric.aggregation.wire_name()
                    ),
                    Some(field.as_str()),
                    format!(
                        "Allowed aggregations: {}",
                        self.security.allowed_aggregations.join(", ")
                    ),
                );
            }

            match self.find_column(plan, columns, &metric.column) {
                None => {
                    let suggestions = self.similar_columns(plan, &metric.column);
                    report.error_with_suggestion(
                        ValidationCode::ColumnUnknown,
                        format!(
                            "Metric column '{}' not found in fact table or dimensions",
                            metric.column
                        ),
                        Some(field.as_str()),
                        if suggestions.is_empty() {
                            "Check the column name".into()
                        } else {
                            format!("Similar columns: {}", suggestions.join(", "))
                        },
                    );
                }
                Some(column) => {
                    if metric.aggregation.requires_numeric() && !column.is_numeric() {
                        report.warning(
                            ValidationCode::NonNumericAgg,
                            format!(
                                "Column '{}' has type '{}'; {} may not work as expected",
                                metric.column,
                                column.data_type,
                                metric.aggregation.wire_name()
                            ),
                            Some(field.as_str()),
                        );
                    }
                }
            }
        }
    }

    fn check_filters(
        &self,
        plan: &CanonicalPlan,
        columns: &HashMap<(&str, &str), &Column>,
        report: &mut ValidationReport,
    ) {
        for (i, filter) in plan.filters.iter().enumerate() {
            let field = format!("filters[{}]", i);
            if self.find_column(plan, columns, &filter.column).is_none() {
                let suggestions = self.similar_columns(plan, &filter.column);
                report.error_with_suggestion(
                    ValidationCode::ColumnUnknown,
                    format!(
                        "Filter column '{}' not found in the plan's tables",
                        filter.column
                    ),
                    Some(field.as_str()),
                    if suggestions.is_empty() {
                        "Check the column name".into()
                    } else {
                        format!("Similar columns: {}", suggestions.join(", "))
                    },
                );
            }

            match filter.op {
                FilterOp::In => {
                    let ok = matches!(&filter.value, FilterValue::List(items) if !items.is_empty() && items.iter().all(|v| v.is_scalar()));
                    if !ok {
                        report.error(
                            ValidationCode::FilterMalformed,
                            format!(
                                "Filter on '{}' uses 'in' but its value is not a non-empty list of scalars",
                                filter.column
                            ),
                            Some(field.as_str()),
                        );
                    }
                }
                FilterOp::Between => {
                    let ok = matches!(&filter.value, FilterValue::List(items) if items.len() == 2 && items.iter().all(|v| v.is_scalar()));
                    if !ok {
                        report.error(
                            ValidationCode::FilterMalformed,
                            format!(
                                "Filter on '{}' uses 'between' but its value is not a two-element list",
                                filter.column
                            ),
                            Some(field.as_str()),
                        );
                    }
                }
                _ => {
                    if !filter.value.is_scalar() {
                        report.error(
                            ValidationCode::FilterMalformed,
                            format!(
                                "Filter on '{}' binds a list to a scalar operator",
                                filter.column
                            ),
                            Some(field.as_str()),
                        );
                    }
                }
            }
        }
    }

    fn check_group_by(
        &self,
        plan: &CanonicalPlan,
        columns: &HashMap<(&str, &str), &Column>,
        report: &mut ValidationReport,
    ) {
        for (i, col) in plan.group_by.iter().enumerate() {
            if self.find_column(plan, columns, col).is_none() {
                let field = format!("group_by[{}]", i);
                report.error(
                    ValidationCode::ColumnUnknown,
                    format!("Group by column '{}' not found", col),
                    Some(field.as_str()),
                );
            }
        }

        if !plan.metrics.is_empty() && plan.group_by.is_empty() && !plan.dimensions.is_empty() {
            report.warning(
                ValidationCode::ImplicitGroupBy,
                "Metrics with dimensions but no explicit group_by; grouping keys will be inferred from the dimension joins"
                    .into(),
                Some("group_by"),
            );
        }
    }

    fn check_order_by(
        &self,
        plan: &CanonicalPlan,
        columns: &HashMap<(&str, &str), &Column>,
        report: &mut ValidationReport,
    ) {
        let metric_aliases: Vec<String> = plan.metrics.iter().map(|m| m.output_alias()).collect();

        for (i, order) in plan.order_by.iter().enumerate() {
            let known = metric_aliases.iter().any(|a| *a == order.column)
                || plan.group_by.contains(&order.column)
                || self.find_column(plan, columns, &order.column).is_some();
            if !known {
                report.warning(
                    ValidationCode::OrderByIgnored,
                    format!(
                        "Order by column '{}' is not selected and will be ignored",
                        order.column
                    ),
                    Some(format!("order_by[{}]", i).as_str()),
                );
            }
        }
    }

    /// Tenant isolation. Mandatory whenever the fact table has a mapped
    /// tenant column; an `in` or range filter does not count, the filter
    /// must bind the column to exactly one value.
    fn check_tenant_filter(&self, plan: &CanonicalPlan, report: &mut ValidationReport) {
        if !self.security.require_tenant_filter {
            return;
        }

        let Some(tenant_column) = self.mappings.tenant_column(&plan.fact_table) else {
            return;
        };

        if plan.single_value_filter(tenant_column).is_some() {
            return;
        }

        report.error_with_suggestion(
            ValidationCode::NoTenantFilter,
            format!(
                "Required tenant filter on '{}' is missing or does not bind a single value",
                tenant_column
            ),
            Some("filters"),
            format!("Add a filter: {} = <tenant id>", tenant_column),
        );
    }

    fn check_limit(&self, plan: &CanonicalPlan, report: &mut ValidationReport) {
        if plan.limit <= 0 {
            report.error(
                ValidationCode::LimitNotPositive,
                format!("Limit must be a positive integer, got {}", plan.limit),
                Some("limit"),
            );
        } else if plan.limit > self.security.max_limit {
            report.warning(
                ValidationCode::LimitClamped,
                format!(
                    "Requested limit {} exceeds the ceiling {}; it will be clamped",
                    plan.limit, self.security.max_limit
                ),
                Some("limit"),
            );
        }
    }

    /// Look a column up across the plan's tables, fact first then dimensions
    /// in plan order. The same order the compiler uses for owner resolution.
    fn find_column<'c>(
        &self,
        plan: &CanonicalPlan,
        columns: &HashMap<(&str, &str), &'c Column>,
        column: &str,
    ) -> Option<&'c Column> {
        for table in plan.referenced_tables() {
            if let Some(col) = columns.get(&(table, column)) {
                return Some(*col);
            }
        }
        None
    }

    /// Up to three fuzzy column-name suggestions across the plan's tables.
    fn similar_columns(&self, plan: &CanonicalPlan, column: &str) -> Vec<String> {
        let needle = column.to_ascii_lowercase();
        let mut suggestions = Vec::new();
        for table in plan.referenced_tables() {
            let Some(table_def) = self.snapshot.table(table) else {
                continue;
            };
            for col in &table_def.columns {
                let hay = col.name.to_ascii_lowercase();
                if hay.contains(&needle) || needle.contains(&hay) {
                    suggestions.push(format!("{}.{}", table, col.name));
                    if suggestions.len() == 3 {
                        return suggestions;
                    }
                }
            }
        }
        suggestions
    }
}

const QUESTION_MIN_LEN: usize = 5;
const QUESTION_MAX_LEN: usize = 2000;

const DANGEROUS_KEYWORDS: &[&str] = &[
    "drop", "delete", "truncate", "alter", "create", "insert", "update",
];

/// Validate the natural-language question before anything else runs.
pub fn validate_question(question: &str) -> ValidationReport {
    let mut report = ValidationReport::default();
    let trimmed = question.trim();

    if trimmed.is_empty() {
        report.error(
            ValidationCode::QuestionEmpty,
            "Question cannot be empty".into(),
            Some("question"),
        );
    } else if trimmed.len() < QUESTION_MIN_LEN {
        report.error(
            ValidationCode::QuestionTooShort,
            "Question is too short to be meaningful".into(),
            Some("question"),
        );
    } else if question.len() > QUESTION_MAX_LEN {
        report.error(
            ValidationCode::QuestionTooLong,
            format!(
                "Question exceeds maximum length of {} characters",
                QUESTION_MAX_LEN
            ),
            Some("question"),
        );
    }

    let lowered = question.to_ascii_lowercase();
    for keyword in DANGEROUS_KEYWORDS {
        if lowered
            .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .any(|word| word == *keyword)
        {
            report.warning(
                ValidationCode::SuspiciousKeyword,
                format!("Question contains SQL keyword '{}'; it will be treated as plain text", keyword),
                Some("question"),
            );
        }
    }

    report
}
