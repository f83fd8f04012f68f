//! Ports (Interfaces) for local DSA
//!
//! Consumed:
//! - [`LayoutOracle`]: target data layout (sizes and field offsets)
//! - [`AllocationRecognizer`]: which calls return fresh heap memory
//!
//! Exposed:
//! - [`ShapeGraphProvider`]: read access to published graphs

use crate::errors::Result;
use crate::features::local_dsa::domain::Graph;
use crate::shared::models::{Procedure, StructType, Type, ValueId};
use std::sync::Arc;

// ============================================================================
// Consumed
// ============================================================================

/// Target data layout
///
/// # Example (Generic - Zero-cost)
/// ```ignore
/// fn field_bytes<L: LayoutOracle>(layout: &L, st: &StructType) -> u64 {
///     layout.field_offset(st, 1)
/// }
/// ```
pub trait LayoutOracle: Send + Sync {
    /// Byte offset of field `index` inside `st`
    fn field_offset(&self, st: &StructType, index: u32) -> u64;

    /// Bytes written by a store of `ty` (no tail padding)
    fn store_size(&self, ty: &Type) -> u64;

    /// Bytes between consecutive elements of `ty` in memory
    fn alloc_size(&self, ty: &Type) -> u64 {
        self.store_size(ty)
    }

    fn pointer_width_bits(&self) -> u32;
}

/// Recognizes calls to allocation functions
pub trait AllocationRecognizer: Send + Sync {
    /// `call` is a call instruction of `proc`
    fn is_allocation_call(&self, proc: &Procedure, call: ValueId) -> bool;
}

// ============================================================================
// Exposed
// ============================================================================

/// Read access to finished memory graphs, keyed by procedure name
pub trait ShapeGraphProvider: Send + Sync {
    fn has_graph(&self, procedure: &str) -> bool;

    /// Errors with `GraphNotFound` if nothing was published
    fn get_graph(&self, procedure: &str) -> Result<Arc<Graph>>;
}
