//! Infrastructure for local DSA
//!
//! - `layout`: natural-alignment [`DataLayout`]
//! - `offset_calculator`: indexed-access displacement and array folding
//! - `cfg_order`: reverse post-order over the CFG (petgraph)
//! - `allocation`: allocator recognition by callee name

pub mod allocation;
pub mod cfg_order;
pub mod layout;
pub mod offset_calculator;

pub use allocation::NamedAllocationRecognizer;
pub use cfg_order::reverse_postorder;
pub use layout::{DataLayout, StructLayout};
pub use offset_calculator::{GepOffset, GepOutcome, OffsetCalculator};
