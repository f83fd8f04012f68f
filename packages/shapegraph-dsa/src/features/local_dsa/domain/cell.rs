//! Cell: an offset into an abstract memory node

use super::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `(node, byte offset)` pair; the unit of value in the memory graph
///
/// A cell without a node is *null*: the value is deliberately not modeled
/// (null pointers, `undef`). Null cells must never be dereferenced.
///
/// A cell stored in a graph may name a node that has since been merged into
/// another one; [`Graph::resolve`](super::graph::Graph::resolve) brings it to
/// canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Cell {
    node: Option<NodeId>,
    offset: u64,
}

impl Cell {
    #[inline]
    pub fn new(node: NodeId, offset: u64) -> Self {
        Self {
            node: Some(node),
            offset,
        }
    }

    #[inline]
    pub fn null() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.node.is_none()
    }

    #[inline]
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Same node, `delta` bytes further (null stays null)
    ///
    /// Offsets are modular in `u64`, matching the graph's displacement sums.
    #[inline]
    pub fn shifted(self, delta: u64) -> Self {
        match self.node {
            Some(node) => Self::new(node, self.offset.wrapping_add(delta)),
            None => self,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node {
            Some(node) => write!(f, "n{}@{}", node, self.offset),
            None => write!(f, "null"),
        }
    }
}
