//! Procedure IR models
//!
//! The lowered, typed SSA form the analysis consumes.

pub mod procedure;
pub mod types;
pub mod value;

pub use procedure::{BasicBlock, Module, Procedure, ProcedureBuilder, UseMap};
pub use types::{StructType, Type};
pub use value::{
    BlockId, Callee, CastKind, Constant, InstKind, Instruction, ValueData, ValueId, ValueKind,
};
