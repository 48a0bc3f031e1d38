use palisade::mapping::{JoinEdge, JoinGraph};
use palisade::semantic::{JoinResolver, ResolveError};

fn graph(edges: &[(&str, &str, &str, &str)]) -> JoinGraph {
    let mut graph = JoinGraph::default();
    for (lt, lc, rt, rc) in edges {
        graph.approve(JoinEdge::new(lt, lc, rt, rc));
    }
    graph
}

#[test]
fn transitive_path_through_an_intermediate_table() {
    // Approved: bills<->vendors and vendors<->regions, but no bills<->regions.
    // A plan over bills requesting regions joins through vendors.
    let resolver = JoinResolver::new(&graph(&[
        ("bills", "vendor_id", "vendors", "id"),
        ("vendors", "region_id", "regions", "id"),
    ]));

    let path = resolver.resolve("bills", "regions").unwrap();
    let hops: Vec<_> = path
        .steps
        .iter()
        .map(|s| (s.left_table.as_str(), s.right_table.as_str()))
        .collect();
    assert_eq!(hops, vec![("bills", "vendors"), ("vendors", "regions")]);
}

#[test]
fn unreachable_dimension_contributes_an_error_and_no_steps() {
    let resolver = JoinResolver::new(&graph(&[("bills", "vendor_id", "vendors", "id")]));

    let (steps, errors) = resolver.join_tree(
        "bills",
        &["vendors".to_string(), "warehouses".to_string()],
    );

    // The reachable dimension resolves; the unreachable one fails whole.
    assert_eq!(steps.len(), 1);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, "warehouses");
    assert!(matches!(errors[0].1, ResolveError::UnknownTable(_)));
}

#[test]
fn disconnected_component_is_no_path() {
    let resolver = JoinResolver::new(&graph(&[
        ("bills", "vendor_id", "vendors", "id"),
        ("orders", "customer_id", "customers", "id"),
    ]));
    let err = resolver.resolve("bills", "customers").unwrap_err();
    assert_eq!(
        err,
        ResolveError::NoApprovedPath {
            from: "bills".into(),
            to: "customers".into()
        }
    );
}

#[test]
fn shortest_path_beats_longer_alternatives() {
    // Direct edge plus a two-hop detour; the direct edge wins.
    let resolver = JoinResolver::new(&graph(&[
        ("bills", "vendor_id", "vendors", "id"),
        ("bills", "hub_id", "hubs", "id"),
        ("hubs", "vendor_id", "vendors", "id"),
    ]));
    let path = resolver.resolve("bills", "vendors").unwrap();
    assert_eq!(path.len(), 1);
}

#[test]
fn tie_break_prefers_smaller_edge_key() {
    // Two equal-length routes from t1 to t4: via t2 and via t3. The edge
    // (t1, a, t2, a) sorts before (t1, a, t3, a), so the t2 route wins.
    let resolver = JoinResolver::new(&graph(&[
        ("t1", "a", "t3", "a"),
        ("t3", "b", "t4", "b"),
        ("t1", "a", "t2", "a"),
        ("t2", "b", "t4", "b"),
    ]));
    let path = resolver.resolve("t1", "t4").unwrap();
    assert_eq!(path.len(), 2);
    assert_eq!(path.steps[0].right_table, "t2");

    // Insertion order does not change the choice.
    let resolver = JoinResolver::new(&graph(&[
        ("t1", "a", "t2", "a"),
        ("t2", "b", "t4", "b"),
        ("t1", "a", "t3", "a"),
        ("t3", "b", "t4", "b"),
    ]));
    let path = resolver.resolve("t1", "t4").unwrap();
    assert_eq!(path.steps[0].right_table, "t2");
}

#[test]
fn join_tree_dedups_shared_prefix_edges() {
    // vendors and regions both route through the bills->vendors edge; the
    // merged tree contains it once.
    let resolver = JoinResolver::new(&graph(&[
        ("bills", "vendor_id", "vendors", "id"),
        ("vendors", "region_id", "regions", "id"),
    ]));
    let (steps, errors) = resolver.join_tree(
        "bills",
        &["vendors".to_string(), "regions".to_string()],
    );
    assert!(errors.is_empty());
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].right_table, "vendors");
    assert_eq!(steps[1].right_table, "regions");
}

#[test]
fn same_table_resolves_to_an_empty_path() {
    let resolver = JoinResolver::new(&graph(&[("bills", "vendor_id", "vendors", "id")]));
    assert!(resolver.resolve("bills", "bills").unwrap().is_empty());
}
