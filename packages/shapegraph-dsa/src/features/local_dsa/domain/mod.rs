//! Domain models for local DSA
//!
//! - `Cell`: (node, offset) pointer value
//! - `Node`: abstract memory object
//! - `Graph`: union-find arena of nodes with per-value cells

pub mod cell;
pub mod graph;
pub mod node;

pub use cell::Cell;
pub use graph::{gcd, Graph, GraphSnapshot, GraphStats, NodeSnapshot, ValueCell};
pub use node::{Node, NodeFlags, NodeId};
