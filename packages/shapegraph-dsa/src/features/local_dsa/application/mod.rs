//! Application layer for local DSA
//!
//! - **CellResolver**: value → cell lookup, owns the graph under construction
//! - **IntraBlockBuilder**: per-instruction graph construction
//! - **InterBlockBuilder**: phi joins once every block has been visited
//! - **LocalDsa**: per-procedure / per-module driver
//! - **GraphStore**: published graphs, keyed by procedure

pub mod cell_resolver;
pub mod graph_store;
pub mod inter_block;
pub mod intra_block;
pub mod local_analyzer;

pub use cell_resolver::CellResolver;
pub use graph_store::GraphStore;
pub use inter_block::InterBlockBuilder;
pub use intra_block::IntraBlockBuilder;
pub use local_analyzer::LocalDsa;
