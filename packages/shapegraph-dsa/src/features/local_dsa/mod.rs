//! # Local Data Structure Analysis
//!
//! Intraprocedural, field-sensitive, unification-based heap-shape analysis.
//! Every pointer value of a procedure is mapped to a [`Cell`], a byte offset
//! inside an abstract memory [`Node`]. Nodes that may hold the same memory
//! are merged with union-find, so the result is a may-alias partition plus
//! a points-to edge per pointer-holding field.
//!
//! ## Imprecision
//! - offsets that cannot be tracked collapse a node (every offset becomes 0)
//! - variable indexing turns a node into an array node with a stride
//! - calls to anything but a recognized allocator return a fresh node
//!
//! ## Usage
//! ```rust
//! use shapegraph_dsa::config::DsaConfig;
//! use shapegraph_dsa::features::local_dsa::LocalDsa;
//! use shapegraph_dsa::shared::models::{ProcedureBuilder, Type};
//!
//! let mut b = ProcedureBuilder::new("f", Type::ptr());
//! let p = b.argument(Type::ptr());
//! let entry = b.block("entry");
//! let q = b.bitcast(entry, p);
//! b.ret(entry, Some(q));
//!
//! let graph = LocalDsa::new(DsaConfig::default())?.build_graph(&b.finish())?;
//! assert_eq!(graph.return_cell(), Some(graph.cell_of(p)));
//! # Ok::<(), shapegraph_dsa::errors::DsaError>(())
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod ports;

// Re-exports for public API
pub use application::{GraphStore, LocalDsa};
pub use domain::{Cell, Graph, GraphSnapshot, GraphStats, Node, NodeFlags, NodeId};
pub use ports::{AllocationRecognizer, LayoutOracle, ShapeGraphProvider};
// Re-export infrastructure (internal use - prefer application layer)
#[doc(hidden)]
pub use infrastructure::{DataLayout, NamedAllocationRecognizer, OffsetCalculator};
