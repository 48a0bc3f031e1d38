use palisade::config::SecuritySettings;
use palisade::mapping::{JoinEdge, JoinGraph, MappingState, Priority, TableMapping, TableRole};
use palisade::plan::{
    Aggregation, CanonicalPlan, Filter, FilterOp, FilterValue, Metric, OrderBy,
};
use palisade::catalog::{Column, SchemaSnapshot, Table};
use palisade::semantic::{PlanValidator, ValidationCode};

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

fn snapshot() -> SchemaSnapshot {
    SchemaSnapshot {
        tables: vec![
            Table {
                name: "bills".into(),
                columns: vec![
                    column("id", "bigint"),
                    column("tenant_id", "varchar(36)"),
                    column("vendor_id", "bigint"),
                    column("total_amount", "decimal(12,2)"),
                    column("status", "varchar(32)"),
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
    }
}

fn mappings() -> MappingState {
    MappingState {
        tables: vec![
            TableMapping {
                table: "bills".into(),
                role: TableRole::Fact,
                priority: Priority::Gold,
                business_name: Some("Bills".into()),
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
    }
}

fn joins() -> JoinGraph {
    let mut graph = JoinGraph::default();
    graph.approve(JoinEdge::new("bills", "vendor_id", "vendors", "id"));
    graph
}

fn valid_plan() -> CanonicalPlan {
    CanonicalPlan {
        intent: "Total bill amount per vendor".into(),
        fact_table: "bills".into(),
        dimensions: vec!["vendors".into()],
        metrics: vec![Metric::new("total_amount", Aggregation::Sum)],
        filters: vec![Filter::eq("tenant_id", FilterValue::Text("t-1".into()))],
        group_by: vec!["vendor_name".into()],
        order_by: vec![],
        limit: 100,
    }
}

fn validate(plan: &CanonicalPlan) -> palisade::semantic::ValidationReport {
    let snapshot = snapshot();
    let mappings = mappings();
    let joins = joins();
    let security = SecuritySettings::default();
    PlanValidator::new(&snapshot, &mappings, &joins, &security).validate(plan)
}

#[test]
fn valid_plan_passes_with_no_errors() {
    let report = validate(&valid_plan());
    assert!(report.is_valid(), "unexpected errors: {:?}", report.errors);
    assert!(report.warnings.is_empty(), "unexpected: {:?}", report.warnings);
}

#[test]
fn batch_diagnostics_report_every_problem_at_once() {
    // Unknown dimension table, unknown metric column, and no tenant filter:
    // one call returns all three, not just the first encountered.
    let plan = CanonicalPlan {
        intent: String::new(),
        fact_table: "bills".into(),
        dimensions: vec!["warehouses".into()],
        metrics: vec![Metric::new("ghost_amount", Aggregation::Sum)],
        filters: vec![],
        group_by: vec![],
        order_by: vec![],
        limit: 100,
    };
    let report = validate(&plan);

    assert!(report.has_error(ValidationCode::TableUnknown));
    assert!(report.has_error(ValidationCode::ColumnUnknown));
    assert!(report.has_error(ValidationCode::NoTenantFilter));
}

#[test]
fn batch_diagnostics_are_exactly_one_error_per_problem() {
    // A mapped dimension with an approved join that has vanished from the
    // schema snapshot, plus an unknown column, plus a missing tenant filter:
    // exactly three errors, one per problem.
    let snapshot = snapshot();
    let mut mappings = mappings();
    mappings.tables.push(TableMapping {
        table: "archived_vendors".into(),
        role: TableRole::Dimension,
        priority: Priority::Bronze,
        business_name: None,
        tenant_column: None,
    });
    let mut joins = joins();
    joins.approve(JoinEdge::new("bills", "vendor_id", "archived_vendors", "id"));

    let plan = CanonicalPlan {
        intent: String::new(),
        fact_table: "bills".into(),
        dimensions: vec!["archived_vendors".into()],
        metrics: vec![Metric::new("ghost_amount", Aggregation::Sum)],
        filters: vec![],
        group_by: vec![],
        order_by: vec![],
        limit: 100,
    };

    let security = SecuritySettings::default();
    let report = PlanValidator::new(&snapshot, &mappings, &joins, &security).validate(&plan);

    assert_eq!(report.errors.len(), 3, "errors: {:?}", report.errors);
    assert!(report.has_error(ValidationCode::TableUnknown));
    assert!(report.has_error(ValidationCode::ColumnUnknown));
    assert!(report.has_error(ValidationCode::NoTenantFilter));
}

#[test]
fn tenant_filter_must_bind_exactly_one_value() {
    let mut plan = valid_plan();
    plan.filters = vec![Filter::new(
        "tenant_id",
        FilterOp::In,
        FilterValue::List(vec![
            FilterValue::Text("t-1".into()),
            FilterValue::Text("t-2".into()),
        ]),
    )];
    let report = validate(&plan);
    assert!(report.has_error(ValidationCode::NoTenantFilter));

    let mut plan = valid_plan();
    plan.filters.clear();
    let report = validate(&plan);
    assert!(report.has_error(ValidationCode::NoTenantFilter));
}

#[test]
fn oversized_limit_is_a_warning_not_an_error() {
    let mut plan = valid_plan();
    plan.limit = 100_000;
    let report = validate(&plan);
    assert!(report.is_valid());
    assert!(report.has_warning(ValidationCode::LimitClamped));
}

#[test]
fn non_positive_limit_is_an_error() {
    let mut plan = valid_plan();
    plan.limit = 0;
    assert!(validate(&plan).has_error(ValidationCode::LimitNotPositive));
}

#[test]
fn unapproved_join_is_rejected() {
    let snapshot = snapshot();
    let mappings = mappings();
    let security = SecuritySettings::default();
    let empty_joins = JoinGraph::default();
    let report = PlanValidator::new(&snapshot, &mappings, &empty_joins, &security)
        .validate(&valid_plan());
    assert!(report.has_error(ValidationCode::JoinNotApproved));
}

#[test]
fn metrics_without_group_by_but_with_dimensions_warn() {
    let mut plan = valid_plan();
    plan.group_by.clear();
    let report = validate(&plan);
    assert!(report.is_valid());
    assert!(report.has_warning(ValidationCode::ImplicitGroupBy));
}

#[test]
fn unknown_order_by_column_is_dropped_with_a_warning() {
    let mut plan = valid_plan();
    plan.order_by = vec![OrderBy::desc("no_such_column")];
    let report = validate(&plan);
    assert!(report.is_valid());
    assert!(report.has_warning(ValidationCode::OrderByIgnored));
}

#[test]
fn order_by_metric_alias_is_known() {
    let mut plan = valid_plan();
    plan.order_by = vec![OrderBy::desc("sum_total_amount")];
    let report = validate(&plan);
    assert!(!report.has_warning(ValidationCode::OrderByIgnored));
}

#[test]
fn sum_over_text_column_warns() {
    let mut plan = valid_plan();
    plan.metrics = vec![Metric::new("status", Aggregation::Sum)];
    let report = validate(&plan);
    assert!(report.is_valid());
    assert!(report.has_warning(ValidationCode::NonNumericAgg));
}

#[test]
fn restricted_aggregation_set_rejects_others() {
    let snapshot = snapshot();
    let mappings = mappings();
    let joins = joins();
    let security = SecuritySettings {
        allowed_aggregations: vec!["count".into()],
        ..SecuritySettings::default()
    };
    let report =
        PlanValidator::new(&snapshot, &mappings, &joins, &security).validate(&valid_plan());
    assert!(report.has_error(ValidationCode::AggNotAllowed));
}

#[test]
fn malformed_between_filter_is_an_error() {
    let mut plan = valid_plan();
    plan.filters.push(Filter::new(
        "total_amount",
        FilterOp::Between,
        FilterValue::List(vec![FilterValue::Int(10)]),
    ));
    assert!(validate(&plan).has_error(ValidationCode::FilterMalformed));
}

#[test]
fn fact_table_must_be_mapped_as_fact() {
    let mut plan = valid_plan();
    plan.fact_table = "vendors".into();
    plan.dimensions.clear();
    plan.group_by.clear();
    plan.metrics.clear();
    let report = validate(&plan);
    assert!(report.has_error(ValidationCode::FactNotMapped));
}
