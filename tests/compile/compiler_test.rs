use uuid::Uuid;

use palisade::catalog::{Column, SchemaSnapshot, Table};
use palisade::mapping::{JoinEdge, JoinGraph};
use palisade::plan::{
    Aggregation, CanonicalPlan, Filter, FilterOp, FilterValue, Metric, OrderBy,
};
use palisade::semantic::JoinResolver;
use palisade::sql::{check_safety, Dialect, SqlCompiler};

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
                    column("created_at", "datetime"),
                ],
                comment: None,
            },
            Table {
                name: "vendors".into(),
                columns: vec![
                    column("id", "bigint"),
                    column("region_id", "bigint"),
                    column("vendor_name", "varchar(100)"),
                ],
                comment: None,
            },
            Table {
                name: "regions".into(),
                columns: vec![column("id", "bigint"), column("region_name", "varchar(60)")],
                comment: None,
            },
        ],
        database: None,
    }
}

fn joins() -> JoinGraph {
    let mut graph = JoinGraph::default();
    graph.approve(JoinEdge::new("bills", "vendor_id", "vendors", "id"));
    graph.approve(JoinEdge::new("vendors", "region_id", "regions", "id"));
    graph
}

fn plan() -> CanonicalPlan {
    CanonicalPlan {
        intent: "Total bill amount per vendor".into(),
        fact_table: "bills".into(),
        dimensions: vec!["vendors".into()],
        metrics: vec![Metric::new("total_amount", Aggregation::Sum)],
        filters: vec![Filter::eq("tenant_id", FilterValue::Text("t-1".into()))],
        group_by: vec!["vendor_name".into()],
        order_by: vec![OrderBy::desc("sum_total_amount")],
        limit: 100,
    }
}

fn compile(plan: &CanonicalPlan, dialect: Dialect, max_limit: i64) -> palisade::sql::CompiledQuery {
    let snapshot = snapshot();
    let resolver = JoinResolver::new(&joins());
    let (tree, errors) = resolver.join_tree(&plan.fact_table, &plan.dimensions);
    assert!(errors.is_empty(), "unresolvable dimensions: {:?}", errors);
    SqlCompiler::new(&snapshot, dialect, max_limit)
        .compile(plan, &tree, Uuid::nil())
        .unwrap()
}

#[test]
fn compiles_the_full_clause_sequence() {
    let query = compile(&plan(), Dialect::MySql, 500);
    assert_eq!(
        query.sql,
        "SELECT d1.`vendor_name` AS `vendor_name`, SUM(f.`total_amount`) AS `sum_total_amount` \
         FROM `bills` f \
         LEFT JOIN `vendors` d1 ON f.`vendor_id` = d1.`id` \
         WHERE f.`tenant_id` = :p0 \
         GROUP BY d1.`vendor_name` \
         ORDER BY `sum_total_amount` DESC \
         LIMIT 100"
    );
    assert_eq!(query.params.len(), 1);
    assert_eq!(query.params[0].name, "p0");
    assert_eq!(query.params[0].value, FilterValue::Text("t-1".into()));
}

#[test]
fn compiling_twice_is_byte_identical() {
    let a = compile(&plan(), Dialect::MySql, 500);
    let b = compile(&plan(), Dialect::MySql, 500);
    assert_eq!(a.sql, b.sql);
    assert_eq!(a.params, b.params);
}

#[test]
fn hostile_filter_value_stays_a_parameter() {
    let mut p = plan();
    p.filters.push(Filter::eq(
        "status",
        FilterValue::Text("'; DROP TABLE orders; --".into()),
    ));
    let query = compile(&p, Dialect::MySql, 500);

    // The payload never reaches the SQL text.
    assert!(!query.sql.to_ascii_uppercase().contains("DROP"));
    assert!(!query.sql.contains("orders"));
    assert!(query.sql.contains("f.`status` = :p1"));
    assert_eq!(
        query.params[1].value,
        FilterValue::Text("'; DROP TABLE orders; --".into())
    );

    // And the guard accepts the statement as a single well-formed SELECT.
    assert!(check_safety(&query.sql, Dialect::MySql).is_ok());
}

#[test]
fn limit_is_clamped_to_the_ceiling() {
    let mut p = plan();
    p.limit = 100_000;
    let query = compile(&p, Dialect::MySql, 500);
    assert!(query.sql.ends_with("LIMIT 500"));
}

#[test]
fn transitive_join_emits_both_hops_in_path_order() {
    let mut p = plan();
    p.dimensions = vec!["regions".into()];
    p.group_by = vec!["region_name".into()];
    p.order_by.clear();
    let query = compile(&p, Dialect::MySql, 500);
    assert!(query.sql.contains(
        "FROM `bills` f \
         LEFT JOIN `vendors` d1 ON f.`vendor_id` = d1.`id` \
         LEFT JOIN `regions` d2 ON d1.`region_id` = d2.`id`"
    ));
    assert!(query.sql.contains("GROUP BY d2.`region_name`"));
}

#[test]
fn in_filter_expands_one_placeholder_per_element() {
    let mut p = plan();
    p.filters.push(Filter::new(
        "status",
        FilterOp::In,
        FilterValue::List(vec![
            FilterValue::Text("pending".into()),
            FilterValue::Text("approved".into()),
        ]),
    ));
    let query = compile(&p, Dialect::MySql, 500);
    assert!(query.sql.contains("f.`status` IN (:p1_0, :p1_1)"));
    let names: Vec<_> = query.params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["p0", "p1_0", "p1_1"]);
}

#[test]
fn between_filter_binds_low_and_high() {
    let mut p = plan();
    p.filters.push(Filter::new(
        "total_amount",
        FilterOp::Between,
        FilterValue::List(vec![FilterValue::Int(100), FilterValue::Int(5000)]),
    ));
    let query = compile(&p, Dialect::MySql, 500);
    assert!(query
        .sql
        .contains("f.`total_amount` BETWEEN :p1_lo AND :p1_hi"));
}

#[test]
fn unknown_order_by_is_silently_dropped() {
    let mut p = plan();
    p.order_by = vec![OrderBy::asc("no_such_column")];
    let query = compile(&p, Dialect::MySql, 500);
    assert!(!query.sql.contains("ORDER BY"));
}

#[test]
fn postgres_quoting_and_limit() {
    let query = compile(&plan(), Dialect::Postgres, 500);
    assert!(query.sql.contains("FROM \"bills\" f"));
    assert!(query.sql.ends_with("LIMIT 100"));
    assert!(check_safety(&query.sql, Dialect::Postgres).is_ok());
}

#[test]
fn tsql_renders_top_and_brackets() {
    let query = compile(&plan(), Dialect::TSql, 500);
    assert!(query.sql.starts_with("SELECT TOP 100 "));
    assert!(query.sql.contains("FROM [bills] f"));
    assert!(!query.sql.contains("LIMIT"));
    assert!(check_safety(&query.sql, Dialect::TSql).is_ok());
}

#[test]
fn implicit_grouping_uses_dimension_join_columns() {
    let mut p = plan();
    p.group_by.clear();
    p.order_by.clear();
    let query = compile(&p, Dialect::MySql, 500);
    // With metrics but no explicit group_by, the dimension's join column
    // becomes the grouping key.
    assert!(query.sql.contains("GROUP BY d1.`id`"));
    assert!(query.sql.contains("d1.`id` AS `id`"));
}

#[test]
fn plain_list_plan_orders_by_fact_column() {
    let p = CanonicalPlan {
        intent: "Recent bills".into(),
        fact_table: "bills".into(),
        dimensions: vec![],
        metrics: vec![],
        filters: vec![Filter::eq("tenant_id", FilterValue::Text("t-1".into()))],
        group_by: vec![],
        order_by: vec![OrderBy::desc("created_at")],
        limit: 20,
    };
    let query = compile(&p, Dialect::MySql, 500);
    assert_eq!(
        query.sql,
        "SELECT COUNT(*) AS `row_count` FROM `bills` f WHERE f.`tenant_id` = :p0 \
         ORDER BY f.`created_at` DESC LIMIT 20"
    );
}
