//! Custom assertions for graph verification

use shapegraph_dsa::features::local_dsa::{Graph, Node};
use shapegraph_dsa::shared::models::ValueId;

/// Assert that two values resolve into the same node
pub fn assert_same_node(graph: &Graph, a: ValueId, b: ValueId) {
    assert!(
        graph.may_alias(graph.cell_of(a), graph.cell_of(b)),
        "expected {a} and {b} in one node, got {} and {}\n{graph}",
        graph.cell_of(a),
        graph.cell_of(b)
    );
}

/// Assert that two values resolve into different (non-null) nodes
pub fn assert_distinct_nodes(graph: &Graph, a: ValueId, b: ValueId) {
    let (ca, cb) = (graph.cell_of(a), graph.cell_of(b));
    assert!(!ca.is_null() && !cb.is_null(), "expected cells for {a} and {b}\n{graph}");
    assert!(
        !graph.may_alias(ca, cb),
        "expected {a} and {b} in different nodes, both in {}\n{graph}",
        ca
    );
}

/// Root node of a value's cell
pub fn node_of<'g>(graph: &'g Graph, value: ValueId) -> &'g Node {
    graph
        .node_of(graph.cell_of(value))
        .unwrap_or_else(|| panic!("{value} has no node\n{graph}"))
}
