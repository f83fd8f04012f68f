//! Property-based tests for the memory graph
//!
//! Invariants that should hold for ANY sequence of graph operations:
//! - Canonicality: resolving a resolved cell is a no-op
//! - Order independence: unification order does not change the partition,
//!   whatever the offsets, strides and collapses in between
//! - Array folding: stepping backwards on an array node never collapses it
//! - Collapse monotonicity: collapsed nodes stay collapsed, offsets stay 0
//! - Size monotonicity: a node's size never shrinks

use proptest::prelude::*;
use shapegraph_dsa::features::local_dsa::infrastructure::{GepOffset, GepOutcome, OffsetCalculator};
use shapegraph_dsa::features::local_dsa::{Cell, Graph};
use shapegraph_dsa::shared::models::Type;

const NODES: u32 = 8;

#[derive(Debug, Clone)]
enum Op {
    Unify(u32, u64, u32, u64),
    Link(u32, u64, u32, u64),
    Collapse(u32),
    Stride(u32, u64),
    Grow(u32, u64, u64),
    Type(u32, u64),
}

fn op() -> impl Strategy<Value = Op> {
    let node = 0..NODES;
    let offset = prop::sample::select(vec![0u64, 4, 8, 12, 16]);
    prop_oneof![
        4 => (node.clone(), offset.clone(), node.clone(), offset.clone())
            .prop_map(|(a, x, b, y)| Op::Unify(a, x, b, y)),
        3 => (node.clone(), offset.clone(), node.clone(), offset.clone())
            .prop_map(|(a, x, b, y)| Op::Link(a, x, b, y)),
        1 => node.clone().prop_map(Op::Collapse),
        1 => (node.clone(), prop::sample::select(vec![4u64, 8, 12]))
            .prop_map(|(n, s)| Op::Stride(n, s)),
        2 => (node.clone(), offset.clone(), 1u64..16).prop_map(|(n, o, b)| Op::Grow(n, o, b)),
        1 => (node, offset).prop_map(|(n, o)| Op::Type(n, o)),
    ]
}

/// Operations that can only merge or annotate nodes, never link them
fn partition_op() -> impl Strategy<Value = Op> {
    let node = 0..NODES;
    let offset = prop::sample::select(vec![0u64, 4, 8, 12, 16]);
    prop_oneof![
        6 => (node.clone(), offset.clone(), node.clone(), offset)
            .prop_map(|(a, x, b, y)| Op::Unify(a, x, b, y)),
        1 => node.clone().prop_map(Op::Collapse),
        1 => (node, prop::sample::select(vec![4u64, 8, 12]))
            .prop_map(|(n, s)| Op::Stride(n, s)),
    ]
}

fn swapped(op: &Op) -> Op {
    match *op {
        Op::Unify(a, x, b, y) => Op::Unify(b, y, a, x),
        ref other => other.clone(),
    }
}

fn run<'a>(ops: impl Iterator<Item = &'a Op>) -> Graph {
    let mut graph = fresh_graph();
    for op in ops {
        apply(&mut graph, op);
    }
    graph
}

fn fresh_graph() -> Graph {
    let mut graph = Graph::new("prop");
    for _ in 0..NODES {
        graph.mk_node();
    }
    graph
}

fn apply(graph: &mut Graph, op: &Op) {
    match *op {
        Op::Unify(a, x, b, y) => {
            graph.unify(Cell::new(a, x), Cell::new(b, y));
        }
        Op::Link(a, x, b, y) => graph.add_link(Cell::new(a, x), Cell::new(b, y)),
        Op::Collapse(n) => {
            graph.collapse_cell(Cell::new(n, 0));
        }
        Op::Stride(n, s) => graph.set_array_stride(Cell::new(n, 0), s),
        Op::Grow(n, o, bytes) => graph.grow_size(Cell::new(n, o), bytes),
        Op::Type(n, o) => graph.add_type(Cell::new(n, o), &Type::i32()),
    }
}

fn same_class(graph: &Graph, a: u32, b: u32) -> bool {
    graph.may_alias(Cell::new(a, 0), Cell::new(b, 0))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_resolve_is_idempotent(ops in prop::collection::vec(op(), 0..40)) {
        let mut graph = fresh_graph();
        for op in &ops {
            apply(&mut graph, op);
        }
        for id in 0..NODES {
            for offset in [0u64, 4, 8, 20] {
                let once = graph.resolve(Cell::new(id, offset));
                let twice = graph.resolve(once);
                prop_assert_eq!(once, twice);
                prop_assert_eq!(graph.resolve_readonly(Cell::new(id, offset)), once);
            }
        }
    }

    #[test]
    fn prop_unify_order_does_not_change_partition(
        (ops, shuffled) in prop::collection::vec(partition_op(), 1..24)
            .prop_flat_map(|ops| (Just(ops.clone()), Just(ops).prop_shuffle()))
    ) {
        let forward = run(ops.iter());
        let permuted = run(shuffled.iter());
        let backward = run(ops.iter().rev().map(swapped).collect::<Vec<_>>().iter());

        for a in 0..NODES {
            for b in 0..NODES {
                let expected = same_class(&forward, a, b);
                prop_assert_eq!(same_class(&permuted, a, b), expected, "{} ~ {}", a, b);
                prop_assert_eq!(same_class(&backward, a, b), expected, "{} ~ {}", a, b);
            }
        }
    }

    #[test]
    fn prop_negative_step_on_array_node_stays_in_stride(
        stride in prop::sample::select(vec![1u64, 4, 8, 12, 24]),
        start in 0u64..64,
        step in -512i64..0
    ) {
        let mut graph = fresh_graph();
        let base = graph.mk_array_node(stride);
        let before = graph.resolve(Cell::new(base, start));

        let out = OffsetCalculator::apply(&mut graph, before, GepOffset { fixed: step, stride: 0 });

        let GepOutcome::Offset(cell) = out else {
            panic!("negative step on array node gave {:?}", out);
        };
        prop_assert!(!graph.node_of(cell).map_or(true, |n| n.is_collapsed()));
        prop_assert_eq!(cell.node(), before.node());
        let expected = (before.offset() as i64 + step).rem_euclid(stride as i64) as u64;
        prop_assert_eq!(cell.offset(), expected);
    }

    #[test]
    fn prop_collapse_is_permanent(
        target in 0..NODES,
        ops in prop::collection::vec(op(), 0..30)
    ) {
        let mut graph = fresh_graph();
        graph.collapse_cell(Cell::new(target, 0));
        for op in &ops {
            apply(&mut graph, op);
            let node = graph.node_of(Cell::new(target, 0)).map(|n| n.is_collapsed());
            prop_assert_eq!(node, Some(true));
            for offset in [0u64, 4, 12] {
                prop_assert_eq!(graph.resolve(Cell::new(target, offset)).offset(), 0);
            }
        }
    }

    #[test]
    fn prop_size_never_shrinks(ops in prop::collection::vec(op(), 0..40)) {
        let mut graph = fresh_graph();
        let mut last = vec![0u64; NODES as usize];
        for op in &ops {
            apply(&mut graph, op);
            for id in 0..NODES {
                let size = graph.node_of(Cell::new(id, 0)).map_or(0, |n| n.size());
                prop_assert!(size >= last[id as usize], "node {} shrank after {:?}", id, op);
                last[id as usize] = size;
            }
        }
    }

    #[test]
    fn prop_types_are_never_lost(ops in prop::collection::vec(op(), 0..40)) {
        let mut graph = fresh_graph();
        graph.add_type(Cell::new(0, 8), &Type::i64());
        for op in &ops {
            apply(&mut graph, op);
        }
        let cell = graph.resolve(Cell::new(0, 8));
        let node = graph.node_of(cell);
        let kept = node
            .and_then(|n| n.types_at(cell.offset()))
            .map_or(false, |set| set.contains(&Type::i64()));
        prop_assert!(kept);
    }
}
