//! Memory Graph
//!
//! Arena of [`Node`]s joined by a union-find with per-edge byte
//! displacements, plus the value → [`Cell`] map of one procedure.
//!
//! # Unification
//! `unify(a, b)` makes two cells denote the same memory location:
//! - same node, same offset: nothing to do
//! - same node, different offsets: the node collapses
//! - different nodes: one is absorbed by the other with the displacement
//!   that makes both cells coincide, and the absorbed node's links are
//!   unified into the survivor's slots
//!
//! Link unification is driven by an explicit worklist. Every step either
//! removes a root, collapses a node or shrinks an array stride, so the
//! worklist always drains.
//!
//! # References
//! - Lattner, C. "Macroscopic Data Structure Analysis and Optimization" (2005)
//! - Kuderski, J. et al. "Unification-based Pointer Analysis without
//!   Oversharing" (FMCAD 2019)

use super::cell::Cell;
use super::node::{Node, NodeFlags, NodeId};
use crate::errors::Result;
use crate::shared::models::{Type, ValueId};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::mem;

/// Greatest common divisor (`gcd(0, n) == n`)
pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Statistics for one graph construction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes_created: usize,
    pub unify_operations: usize,
    pub collapses: usize,
    pub array_nodes: usize,
    /// Values bound to a cell
    pub cells: usize,
    /// Root nodes after construction
    pub live_nodes: usize,
    pub duration_ms: f64,
}

/// Pending pair of cells to unify
type Worklist = Vec<(Cell, Cell)>;

/// Memory graph of one procedure
///
/// # Example
/// ```rust
/// use shapegraph_dsa::features::local_dsa::domain::{Cell, Graph};
///
/// let mut graph = Graph::new("f");
/// let a = graph.mk_node();
/// let b = graph.mk_node();
///
/// // *(a + 8) and *b are the same location
/// let merged = graph.unify(Cell::new(a, 8), Cell::new(b, 0));
/// assert_eq!(merged, graph.resolve(Cell::new(b, 0)));
/// assert!(graph.may_alias(Cell::new(a, 0), Cell::new(b, 0)));
/// ```
#[derive(Debug, Clone)]
pub struct Graph {
    procedure: String,
    nodes: Vec<Node>,
    cells: FxHashMap<ValueId, Cell>,
    return_cell: Option<Cell>,
    stats: GraphStats,
}

impl Graph {
    pub fn new(procedure: impl Into<String>) -> Self {
        Self {
            procedure: procedure.into(),
            nodes: Vec::new(),
            cells: FxHashMap::default(),
            return_cell: None,
            stats: GraphStats::default(),
        }
    }

    #[inline]
    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    #[inline]
    pub fn stats(&self) -> &GraphStats {
        &self.stats
    }

    /// Fill in the summary counters once construction is over
    pub fn finalize_stats(&mut self, duration_ms: f64) {
        self.stats.cells = self.cells.len();
        self.stats.live_nodes = self.live_nodes().count();
        self.stats.duration_ms = duration_ms;
    }

    // ------------------------------------------------------------------
    // Node creation
    // ------------------------------------------------------------------

    pub fn mk_node(&mut self) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(Node::new(id));
        self.stats.nodes_created += 1;
        id
    }

    /// Fresh node whose offsets are taken modulo `stride`
    ///
    /// A zero stride yields a plain node.
    pub fn mk_array_node(&mut self, stride: u64) -> NodeId {
        let id = self.mk_node();
        if stride > 0 {
            self.nodes[id as usize].array_stride = Some(stride);
            self.stats.array_nodes += 1;
        }
        id
    }

    /// Raw node by id (may be a forwarded, emptied node)
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    /// Number of nodes ever created
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Canonical nodes
    pub fn live_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_root())
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// Root of `id` and the displacement from `id` to it (path compression)
    pub fn find(&mut self, id: NodeId) -> (NodeId, u64) {
        let mut root = id;
        let mut total: u64 = 0;
        while let Some(parent) = self.nodes[root as usize].parent {
            total = total.wrapping_add(self.nodes[root as usize].parent_offset);
            root = parent;
        }

        let mut current = id;
        let mut remaining = total;
        while let Some(parent) = self.nodes[current as usize].parent {
            let node = &mut self.nodes[current as usize];
            let step = node.parent_offset;
            node.parent = Some(root);
            node.parent_offset = remaining;
            remaining = remaining.wrapping_sub(step);
            current = parent;
        }

        (root, total)
    }

    /// Find without path compression (for read-only queries)
    pub fn find_readonly(&self, id: NodeId) -> (NodeId, u64) {
        let mut root = id;
        let mut total: u64 = 0;
        while let Some(parent) = self.nodes[root as usize].parent {
            total = total.wrapping_add(self.nodes[root as usize].parent_offset);
            root = parent;
        }
        (root, total)
    }

    /// Canonical form of `cell`: root node, normalized offset
    pub fn resolve(&mut self, cell: Cell) -> Cell {
        let Some(node) = cell.node() else {
            return cell;
        };
        let (root, delta) = self.find(node);
        let offset = self.nodes[root as usize].normalize(cell.offset().wrapping_add(delta));
        Cell::new(root, offset)
    }

    pub fn resolve_readonly(&self, cell: Cell) -> Cell {
        let Some(node) = cell.node() else {
            return cell;
        };
        let (root, delta) = self.find_readonly(node);
        let offset = self.nodes[root as usize].normalize(cell.offset().wrapping_add(delta));
        Cell::new(root, offset)
    }

    /// Root node a cell lands in
    pub fn node_of(&self, cell: Cell) -> Option<&Node> {
        let node = cell.node()?;
        let (root, _) = self.find_readonly(node);
        Some(&self.nodes[root as usize])
    }

    /// Same-node test on resolved cells
    pub fn may_alias(&self, a: Cell, b: Cell) -> bool {
        match (self.resolve_readonly(a).node(), self.resolve_readonly(b).node()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Value cells
    // ------------------------------------------------------------------

    pub fn set_cell(&mut self, value: ValueId, cell: Cell) {
        self.cells.insert(value, cell);
    }

    #[inline]
    pub fn has_cell(&self, value: ValueId) -> bool {
        self.cells.contains_key(&value)
    }

    /// Resolved cell of `value`, compressing paths
    pub fn lookup_cell(&mut self, value: ValueId) -> Option<Cell> {
        let cell = *self.cells.get(&value)?;
        Some(self.resolve(cell))
    }

    /// Resolved cell of `value`; null if the value has none
    pub fn cell_of(&self, value: ValueId) -> Cell {
        self.cells
            .get(&value)
            .map(|&c| self.resolve_readonly(c))
            .unwrap_or_default()
    }

    /// Values with a cell, sorted by id, cells resolved
    pub fn cells(&self) -> Vec<(ValueId, Cell)> {
        let mut out: Vec<_> = self
            .cells
            .iter()
            .map(|(&v, &c)| (v, self.resolve_readonly(c)))
            .collect();
        out.sort_by_key(|(v, _)| *v);
        out
    }

    /// Record a returned cell; a second return unifies with the first
    pub fn set_return_cell(&mut self, cell: Cell) -> Cell {
        let merged = match self.return_cell {
            Some(existing) => self.unify(existing, cell),
            None => self.resolve(cell),
        };
        self.return_cell = Some(merged);
        merged
    }

    pub fn return_cell(&self) -> Option<Cell> {
        self.return_cell.map(|c| self.resolve_readonly(c))
    }

    // ------------------------------------------------------------------
    // Node contents
    // ------------------------------------------------------------------

    /// Record that `bytes` bytes are accessed starting at `cell`
    pub fn grow_size(&mut self, cell: Cell, bytes: u64) {
        let cell = self.resolve(cell);
        if let Some(id) = cell.node() {
            let node = &mut self.nodes[id as usize];
            node.size = node.size.max(cell.offset().saturating_add(bytes));
        }
    }

    pub fn add_type(&mut self, cell: Cell, ty: &Type) {
        let cell = self.resolve(cell);
        if let Some(id) = cell.node() {
            self.nodes[id as usize]
                .types
                .entry(cell.offset())
                .or_default()
                .insert(ty.clone());
        }
    }

    pub fn flags_mut(&mut self, cell: Cell) -> Option<&mut NodeFlags> {
        let id = self.resolve(cell).node()?;
        Some(&mut self.nodes[id as usize].flags)
    }

    pub fn add_allocation_site(&mut self, cell: Cell, site: ValueId) {
        if let Some(id) = self.resolve(cell).node() {
            self.nodes[id as usize].alloc_sites.insert(site);
        }
    }

    /// Resolved link stored at `cell`
    pub fn link(&mut self, cell: Cell) -> Option<Cell> {
        let cell = self.resolve(cell);
        let id = cell.node()?;
        let target = self.nodes[id as usize].links.get(&cell.offset()).copied()?;
        Some(self.resolve(target))
    }

    /// Link at `cell`, creating a fresh target node if there is none
    pub fn link_or_create(&mut self, cell: Cell) -> Cell {
        let cell = self.resolve(cell);
        let Some(id) = cell.node() else {
            return Cell::null();
        };
        if let Some(target) = self.nodes[id as usize].links.get(&cell.offset()).copied() {
            return self.resolve(target);
        }
        let fresh = Cell::new(self.mk_node(), 0);
        self.nodes[id as usize].links.insert(cell.offset(), fresh);
        fresh
    }

    /// Install `from → to`, unifying with an existing link at `from`
    pub fn add_link(&mut self, from: Cell, to: Cell) {
        if from.is_null() || to.is_null() {
            return;
        }
        let mut work = Worklist::new();
        self.link_or_defer(from, to, &mut work);
        self.drain(work);
    }

    /// Collapse the node of `cell`; returns the cell at offset 0
    pub fn collapse_cell(&mut self, cell: Cell) -> Cell {
        let cell = self.resolve(cell);
        let Some(id) = cell.node() else {
            return cell;
        };
        let mut work = Worklist::new();
        self.collapse_node(id, &mut work);
        self.drain(work);
        self.resolve(cell)
    }

    /// Turn the node of `cell` into an array of (a divisor of) `stride`
    pub fn set_array_stride(&mut self, cell: Cell, stride: u64) {
        if stride == 0 {
            return;
        }
        let Some(id) = self.resolve(cell).node() else {
            return;
        };
        let mut work = Worklist::new();
        self.set_stride(id, stride, &mut work);
        self.drain(work);
    }

    // ------------------------------------------------------------------
    // Unification
    // ------------------------------------------------------------------

    /// Make `a` and `b` denote the same location; returns the merged cell
    ///
    /// A null side leaves the other untouched.
    pub fn unify(&mut self, a: Cell, b: Cell) -> Cell {
        if a.is_null() {
            return self.resolve(b);
        }
        if b.is_null() {
            return self.resolve(a);
        }
        self.stats.unify_operations += 1;
        self.drain(vec![(a, b)]);
        self.resolve(a)
    }

    fn drain(&mut self, mut work: Worklist) {
        while let Some((a, b)) = work.pop() {
            self.unify_step(a, b, &mut work);
        }
    }

    fn unify_step(&mut self, a: Cell, b: Cell, work: &mut Worklist) {
        let a = self.resolve(a);
        let b = self.resolve(b);
        let (Some(na), Some(nb)) = (a.node(), b.node()) else {
            return;
        };

        if na == nb {
            if a.offset() != b.offset() {
                self.collapse_node(na, work);
            }
            return;
        }

        if self.nodes[na as usize].collapsed || self.nodes[nb as usize].collapsed {
            self.collapse_node(na, work);
            self.collapse_node(nb, work);
            let (absorbed, survivor) = self.pick_survivor(na, nb);
            self.merge(absorbed, survivor, 0, work);
            return;
        }

        // Smaller offset is absorbed so the displacement stays non-negative
        let (absorbed, survivor, delta) = if a.offset() < b.offset() {
            (na, nb, b.offset() - a.offset())
        } else if b.offset() < a.offset() {
            (nb, na, a.offset() - b.offset())
        } else {
            let (absorbed, survivor) = self.pick_survivor(na, nb);
            (absorbed, survivor, 0)
        };
        self.merge(absorbed, survivor, delta, work);
    }

    /// `(absorbed, survivor)`: more links survive, ties go to the lower id
    fn pick_survivor(&self, a: NodeId, b: NodeId) -> (NodeId, NodeId) {
        let la = self.nodes[a as usize].links.len();
        let lb = self.nodes[b as usize].links.len();
        if la > lb || (la == lb && a < b) {
            (b, a)
        } else {
            (a, b)
        }
    }

    fn merge(&mut self, absorbed: NodeId, survivor: NodeId, delta: u64, work: &mut Worklist) {
        let (links, types, size, stride, collapsed, flags, sites) = {
            let node = &mut self.nodes[absorbed as usize];
            node.parent = Some(survivor);
            node.parent_offset = delta;
            (
                mem::take(&mut node.links),
                mem::take(&mut node.types),
                node.size,
                node.array_stride.take(),
                mem::replace(&mut node.collapsed, false),
                mem::take(&mut node.flags),
                mem::take(&mut node.alloc_sites),
            )
        };

        {
            let node = &mut self.nodes[survivor as usize];
            node.flags.union(flags);
            node.alloc_sites.extend(sites);
            node.size = node.size.max(size.saturating_add(delta));
        }

        if collapsed {
            self.collapse_node(survivor, work);
        } else if !self.nodes[survivor as usize].collapsed {
            if let Some(stride) = stride {
                self.set_stride(survivor, stride, work);
            }
        }

        for (offset, set) in types {
            let slot = self.nodes[survivor as usize].normalize(offset.wrapping_add(delta));
            self.nodes[survivor as usize]
                .types
                .entry(slot)
                .or_default()
                .extend(set);
        }
        for (offset, target) in links {
            self.link_or_defer(Cell::new(survivor, offset.wrapping_add(delta)), target, work);
        }
    }

    fn collapse_node(&mut self, id: NodeId, work: &mut Worklist) {
        let node = &mut self.nodes[id as usize];
        if node.collapsed {
            return;
        }
        node.collapsed = true;
        node.array_stride = None;
        let types = mem::take(&mut node.types);
        let links = mem::take(&mut node.links);
        self.stats.collapses += 1;

        let folded: BTreeSet<Type> = types.into_values().flatten().collect();
        if !folded.is_empty() {
            self.nodes[id as usize].types.insert(0, folded);
        }
        for (_, target) in links {
            self.link_or_defer(Cell::new(id, 0), target, work);
        }
    }

    /// Fold offsets of a root node modulo `stride` (gcd with any existing one)
    fn set_stride(&mut self, id: NodeId, stride: u64, work: &mut Worklist) {
        let node = &mut self.nodes[id as usize];
        if node.collapsed {
            return;
        }
        let new_stride = match node.array_stride {
            Some(current) => gcd(current, stride),
            None => stride,
        };
        if node.array_stride == Some(new_stride) {
            return;
        }
        if node.array_stride.is_none() {
            self.stats.array_nodes += 1;
        }
        node.array_stride = Some(new_stride);
        let types = mem::take(&mut node.types);
        let links = mem::take(&mut node.links);

        for (offset, set) in types {
            self.nodes[id as usize]
                .types
                .entry(offset % new_stride)
                .or_default()
                .extend(set);
        }
        for (offset, target) in links {
            self.link_or_defer(Cell::new(id, offset), target, work);
        }
    }

    /// Install a link, or queue a unification with the one already there
    fn link_or_defer(&mut self, base: Cell, target: Cell, work: &mut Worklist) {
        if target.is_null() {
            return;
        }
        let base = self.resolve(base);
        let Some(id) = base.node() else {
            return;
        };
        let links = &mut self.nodes[id as usize].links;
        match links.get(&base.offset()) {
            Some(&existing) => work.push((existing, target)),
            None => {
                links.insert(base.offset(), target);
            }
        }
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// Serializable view of the canonical graph
    pub fn snapshot(&self) -> GraphSnapshot {
        let nodes = self
            .live_nodes()
            .map(|node| NodeSnapshot {
                id: node.id(),
                collapsed: node.is_collapsed(),
                array_stride: node.array_stride(),
                size: node.size(),
                flags: node.flags(),
                types: node
                    .types()
                    .iter()
                    .map(|(&off, set)| (off, set.iter().map(|t| t.to_string()).collect()))
                    .collect(),
                links: node
                    .links()
                    .iter()
                    .map(|(&off, &target)| (off, self.resolve_readonly(target)))
                    .collect(),
                allocation_sites: node.allocation_sites().iter().copied().collect(),
            })
            .collect();

        GraphSnapshot {
            procedure: self.procedure.clone(),
            nodes,
            cells: self
                .cells()
                .into_iter()
                .map(|(value, cell)| ValueCell { value, cell })
                .collect(),
            return_cell: self.return_cell(),
            stats: self.stats.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "graph @{} ({} live / {} nodes)",
            self.procedure,
            self.live_nodes().count(),
            self.nodes.len()
        )?;
        for node in self.live_nodes() {
            write!(f, "  n{} [{}] size={}", node.id(), node.flags(), node.size())?;
            if node.is_collapsed() {
                write!(f, " collapsed")?;
            }
            if let Some(stride) = node.array_stride() {
                write!(f, " stride={}", stride)?;
            }
            writeln!(f)?;
            for (offset, set) in node.types() {
                let names: Vec<String> = set.iter().map(|t| t.to_string()).collect();
                writeln!(f, "    @{}: {}", offset, names.join(" | "))?;
            }
            for (offset, target) in node.links() {
                writeln!(f, "    @{} -> {}", offset, self.resolve_readonly(*target))?;
            }
        }
        for (value, cell) in self.cells() {
            writeln!(f, "  {} = {}", value, cell)?;
        }
        if let Some(ret) = self.return_cell() {
            writeln!(f, "  ret = {}", ret)?;
        }
        Ok(())
    }
}

/// JSON-friendly graph export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub procedure: String,
    pub nodes: Vec<NodeSnapshot>,
    pub cells: Vec<ValueCell>,
    pub return_cell: Option<Cell>,
    pub stats: GraphStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub collapsed: bool,
    pub array_stride: Option<u64>,
    pub size: u64,
    pub flags: NodeFlags,
    pub types: BTreeMap<u64, Vec<String>>,
    pub links: BTreeMap<u64, Cell>,
    pub allocation_sites: Vec<ValueId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueCell {
    pub value: ValueId,
    pub cell: Cell,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gcd() {
        assert_eq!(gcd(12, 8), 4);
        assert_eq!(gcd(0, 5), 5);
        assert_eq!(gcd(7, 0), 7);
    }

    #[test]
    fn test_unify_with_displacement() {
        let mut g = Graph::new("f");
        let a = g.mk_node();
        let b = g.mk_node();

        let merged = g.unify(Cell::new(a, 8), Cell::new(b, 0));

        // b is absorbed 8 bytes into a
        assert_eq!(merged, Cell::new(a, 8));
        assert_eq!(g.resolve(Cell::new(b, 4)), Cell::new(a, 12));
        assert!(!g.node(a).is_collapsed());
    }

    #[test]
    fn test_unify_null_is_noop() {
        let mut g = Graph::new("f");
        let a = g.mk_node();
        assert_eq!(g.unify(Cell::null(), Cell::new(a, 4)), Cell::new(a, 4));
        assert_eq!(g.unify(Cell::new(a, 4), Cell::null()), Cell::new(a, 4));
        assert_eq!(g.stats().unify_operations, 0);
    }

    #[test]
    fn test_same_node_different_offsets_collapses() {
        let mut g = Graph::new("f");
        let a = g.mk_node();
        g.add_type(Cell::new(a, 0), &Type::i32());
        g.add_type(Cell::new(a, 4), &Type::ptr());

        g.unify(Cell::new(a, 0), Cell::new(a, 4));

        let node = g.node(a);
        assert!(node.is_collapsed());
        assert_eq!(node.types_at(12).map(|s| s.len()), Some(2));
        assert_eq!(g.resolve(Cell::new(a, 12)), Cell::new(a, 0));
        assert_eq!(g.stats().collapses, 1);
    }

    #[test]
    fn test_links_are_unified_on_merge() {
        let mut g = Graph::new("f");
        let a = g.mk_node();
        let b = g.mk_node();
        let ta = g.mk_node();
        let tb = g.mk_node();
        g.add_link(Cell::new(a, 0), Cell::new(ta, 0));
        g.add_link(Cell::new(b, 0), Cell::new(tb, 0));

        g.unify(Cell::new(a, 0), Cell::new(b, 0));

        assert!(g.may_alias(Cell::new(ta, 0), Cell::new(tb, 0)));
        assert_eq!(g.live_nodes().count(), 2);
    }

    #[test]
    fn test_displaced_links_land_at_adjusted_offset() {
        let mut g = Graph::new("f");
        let a = g.mk_node();
        let b = g.mk_node();
        let t = g.mk_node();
        g.add_link(Cell::new(b, 0), Cell::new(t, 0));

        g.unify(Cell::new(a, 16), Cell::new(b, 0));

        assert_eq!(g.link(Cell::new(a, 16)), Some(Cell::new(t, 0)));
        assert_eq!(g.link(Cell::new(a, 0)), None);
    }

    #[test]
    fn test_collapse_propagates_through_merge() {
        let mut g = Graph::new("f");
        let a = g.mk_node();
        let b = g.mk_node();
        g.collapse_cell(Cell::new(a, 0));
        g.grow_size(Cell::new(b, 8), 8);

        let merged = g.unify(Cell::new(a, 0), Cell::new(b, 8));

        let node = g.node_of(merged).map(|n| (n.is_collapsed(), n.size()));
        assert_eq!(node, Some((true, 16)));
        assert_eq!(merged.offset(), 0);
    }

    #[test]
    fn test_collapse_folds_links() {
        let mut g = Graph::new("f");
        let a = g.mk_node();
        let t0 = g.mk_node();
        let t8 = g.mk_node();
        g.add_link(Cell::new(a, 0), Cell::new(t0, 0));
        g.add_link(Cell::new(a, 8), Cell::new(t8, 0));

        g.collapse_cell(Cell::new(a, 8));

        assert!(g.may_alias(Cell::new(t0, 0), Cell::new(t8, 0)));
        assert_eq!(g.node(a).links().len(), 1);
    }

    #[test]
    fn test_array_strides_fold_to_gcd() {
        let mut g = Graph::new("f");
        let a = g.mk_array_node(8);
        let b = g.mk_array_node(12);

        let merged = g.unify(Cell::new(a, 0), Cell::new(b, 0));
        let node = g.node_of(merged).map(|n| n.array_stride());
        assert_eq!(node, Some(Some(4)));
        assert_eq!(g.resolve(Cell::new(a, 10)).offset(), 2);
    }

    #[test]
    fn test_set_array_stride_refolds_links() {
        let mut g = Graph::new("f");
        let a = g.mk_node();
        let t0 = g.mk_node();
        let t8 = g.mk_node();
        g.add_link(Cell::new(a, 0), Cell::new(t0, 0));
        g.add_link(Cell::new(a, 8), Cell::new(t8, 0));

        g.set_array_stride(Cell::new(a, 0), 8);

        assert!(g.may_alias(Cell::new(t0, 0), Cell::new(t8, 0)));
        assert_eq!(g.node(a).array_stride(), Some(8));
    }

    #[test]
    fn test_link_or_create_is_stable() {
        let mut g = Graph::new("f");
        let a = g.mk_node();
        let first = g.link_or_create(Cell::new(a, 4));
        let second = g.link_or_create(Cell::new(a, 4));
        assert_eq!(first, second);
        assert!(g.link_or_create(Cell::null()).is_null());
    }

    #[test]
    fn test_equal_offsets_prefer_node_with_more_links() {
        let mut g = Graph::new("f");
        let a = g.mk_node();
        let b = g.mk_node();
        let t = g.mk_node();
        g.add_link(Cell::new(b, 0), Cell::new(t, 0));

        let merged = g.unify(Cell::new(a, 0), Cell::new(b, 0));
        assert_eq!(merged.node(), Some(b));
    }

    #[test]
    fn test_path_compression_keeps_offsets() {
        let mut g = Graph::new("f");
        let a = g.mk_node();
        let b = g.mk_node();
        let c = g.mk_node();
        g.unify(Cell::new(b, 4), Cell::new(c, 0)); // c -> b (+4)
        g.unify(Cell::new(a, 8), Cell::new(b, 0)); // b -> a (+8)

        assert_eq!(g.find_readonly(c), (a, 12));
        assert_eq!(g.find(c), (a, 12));
        assert_eq!(g.node(c).parent, Some(a));
        assert_eq!(g.node(c).parent_offset, 12);
    }

    #[test]
    fn test_huge_offsets_do_not_overflow() {
        let mut g = Graph::new("f");
        let a = g.mk_node();
        let b = g.mk_node();
        let far = u64::MAX - 2;
        g.grow_size(Cell::new(a, far), 16);
        assert_eq!(g.node(a).size(), u64::MAX);

        g.unify(Cell::new(a, 0), Cell::new(b, far));
        assert_eq!(g.resolve(Cell::new(a, 0)), g.resolve(Cell::new(b, far)));
        assert_eq!(g.node_of(Cell::new(b, 0)).map(|n| n.size()), Some(u64::MAX));
    }

    #[test]
    fn test_return_cell_unifies() {
        let mut g = Graph::new("f");
        let a = g.mk_node();
        let b = g.mk_node();
        g.set_return_cell(Cell::new(a, 0));
        g.set_return_cell(Cell::new(b, 0));
        assert!(g.may_alias(Cell::new(a, 0), Cell::new(b, 0)));
        assert!(g.return_cell().is_some());
    }

    #[test]
    fn test_flags_and_sites_union_on_merge() {
        let mut g = Graph::new("f");
        let a = g.mk_node();
        let b = g.mk_node();
        if let Some(flags) = g.flags_mut(Cell::new(a, 0)) {
            flags.stack = true;
        }
        if let Some(flags) = g.flags_mut(Cell::new(b, 0)) {
            flags.heap = true;
        }
        g.add_allocation_site(Cell::new(a, 0), ValueId(1));
        g.add_allocation_site(Cell::new(b, 0), ValueId(2));

        let merged = g.unify(Cell::new(a, 0), Cell::new(b, 0));
        let node = g.node_of(merged).map(|n| (n.flags(), n.allocation_sites().len()));
        let (flags, sites) = node.unwrap_or_default();
        assert!(flags.stack && flags.heap);
        assert_eq!(sites, 2);
    }

    #[test]
    fn test_export() {
        let mut g = Graph::new("f");
        let a = g.mk_node();
        g.add_type(Cell::new(a, 0), &Type::i32());
        g.set_cell(ValueId(0), Cell::new(a, 0));
        g.finalize_stats(0.5);

        let text = g.to_string();
        assert!(text.contains("graph @f"));
        assert!(text.contains("%0 = n0@0"));

        let json = g.to_json().unwrap();
        let back: GraphSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, g.snapshot());
        assert_eq!(back.stats.live_nodes, 1);
    }
}
