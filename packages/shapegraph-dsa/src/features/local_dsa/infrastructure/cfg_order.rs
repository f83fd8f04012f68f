//! Block ordering over the control-flow graph

use crate::shared::models::{BlockId, Procedure};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::DfsPostOrder;

/// Blocks reachable from the entry, in reverse post-order
///
/// Every block appears after all of its predecessors except along back
/// edges. Unreachable blocks are omitted.
pub fn reverse_postorder(proc: &Procedure) -> Vec<BlockId> {
    let Some(entry) = proc.entry() else {
        return Vec::new();
    };

    let mut cfg: DiGraph<BlockId, ()> = DiGraph::with_capacity(proc.blocks().len(), 0);
    let indices: Vec<NodeIndex> = proc.blocks().iter().map(|b| cfg.add_node(b.id)).collect();
    for block in proc.blocks() {
        let from = indices[block.id.index()];
        for succ in proc.successors(block.id) {
            if let Some(&to) = indices.get(succ.index()) {
                cfg.add_edge(from, to, ());
            }
        }
    }

    let mut order = Vec::with_capacity(indices.len());
    let mut dfs = DfsPostOrder::new(&cfg, indices[entry.index()]);
    while let Some(node) = dfs.next(&cfg) {
        order.push(cfg[node]);
    }
    order.reverse();
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{ProcedureBuilder, Type};

    #[test]
    fn test_diamond() {
        let mut b = ProcedureBuilder::new("f", Type::Void);
        let c = b.argument(Type::i1());
        let entry = b.block("entry");
        let left = b.block("left");
        let right = b.block("right");
        let join = b.block("join");
        b.cond_br(entry, c, left, right);
        b.br(left, join);
        b.br(right, join);
        b.ret(join, None);
        let proc = b.finish();

        let order = reverse_postorder(&proc);
        assert_eq!(order.len(), 4);
        assert_eq!(order[0], entry);
        assert_eq!(order[3], join);
    }

    #[test]
    fn test_loop_and_unreachable() {
        let mut b = ProcedureBuilder::new("f", Type::Void);
        let c = b.argument(Type::i1());
        let entry = b.block("entry");
        let header = b.block("header");
        let exit = b.block("exit");
        let dead = b.block("dead");
        b.br(entry, header);
        b.cond_br(header, c, header, exit);
        b.ret(exit, None);
        b.br(dead, exit);
        let proc = b.finish();

        let order = reverse_postorder(&proc);
        assert_eq!(order, vec![entry, header, exit]);
    }

    #[test]
    fn test_declaration_has_no_blocks() {
        let proc = ProcedureBuilder::new("decl", Type::Void).finish();
        assert!(reverse_postorder(&proc).is_empty());
    }
}
