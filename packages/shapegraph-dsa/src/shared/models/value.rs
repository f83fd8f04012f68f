//! Values and instructions of the lowered procedure IR
//!
//! Every instruction is itself a value (its result), as in SSA form. Values
//! that produce nothing have type `void`.

use super::types::Type;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a value in its procedure's value table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueId(pub u32);

impl ValueId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Index of a basic block in its procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub u32);

impl BlockId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// Cast opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CastKind {
    BitCast,
    AddrSpaceCast,
    IntToPtr,
    PtrToInt,
    Trunc,
    ZExt,
    SExt,
    Other,
}

impl CastKind {
    /// Casts whose result designates the same memory as the operand
    #[inline]
    pub fn preserves_pointer(&self) -> bool {
        matches!(self, CastKind::BitCast | CastKind::AddrSpaceCast)
    }
}

/// Call target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Callee {
    /// Direct call to a named function
    Direct(String),
    /// Call through a function pointer
    Indirect(ValueId),
    InlineAsm,
}

impl Callee {
    pub fn name(&self) -> Option<&str> {
        match self {
            Callee::Direct(name) => Some(name),
            _ => None,
        }
    }
}

/// Compile-time constants and constant expressions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constant {
    /// All-zero value of its type (null pointer, `zeroinitializer`)
    Null,
    Undef,
    Int(i64),
    /// Struct/array/vector literal
    Aggregate(Vec<ValueId>),
    /// Constant cast expression
    Cast { kind: CastKind, operand: ValueId },
    /// Constant indexed-access expression
    GetElementPtr {
        base: ValueId,
        source_type: Type,
        indices: Vec<ValueId>,
    },
}

/// Instruction opcodes with their operands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstKind {
    /// Stack allocation
    Alloca {
        allocated: Type,
        count: Option<ValueId>,
    },
    Load {
        ptr: ValueId,
    },
    Store {
        value: ValueId,
        ptr: ValueId,
    },
    /// Indexed access; the first index steps over `source_type`
    GetElementPtr {
        base: ValueId,
        source_type: Type,
        indices: Vec<ValueId>,
    },
    Cast {
        kind: CastKind,
        operand: ValueId,
    },
    Select {
        condition: ValueId,
        on_true: ValueId,
        on_false: ValueId,
    },
    Phi {
        incoming: Vec<(ValueId, BlockId)>,
    },
    Call {
        callee: Callee,
        args: Vec<ValueId>,
    },
    /// `memcpy` / `memmove`
    MemTransfer {
        dest: ValueId,
        src: ValueId,
        len: ValueId,
    },
    MemSet {
        dest: ValueId,
        value: ValueId,
        len: ValueId,
    },
    InsertValue {
        aggregate: ValueId,
        value: ValueId,
        indices: Vec<u32>,
    },
    ExtractValue {
        aggregate: ValueId,
        indices: Vec<u32>,
    },
    Cmp {
        lhs: ValueId,
        rhs: ValueId,
    },
    Binary {
        lhs: ValueId,
        rhs: ValueId,
    },
    Branch {
        condition: Option<ValueId>,
        targets: Vec<BlockId>,
    },
    Return {
        value: Option<ValueId>,
    },
    Unreachable,
    /// Anything the analysis has no dedicated handler for
    Other {
        operands: Vec<ValueId>,
    },
}

impl InstKind {
    /// Value operands in order (block references excluded)
    pub fn operands(&self) -> Vec<ValueId> {
        match self {
            InstKind::Alloca { count, .. } => count.iter().copied().collect(),
            InstKind::Load { ptr } => vec![*ptr],
            InstKind::Store { value, ptr } => vec![*value, *ptr],
            InstKind::GetElementPtr { base, indices, .. } => {
                let mut ops = Vec::with_capacity(indices.len() + 1);
                ops.push(*base);
                ops.extend(indices.iter().copied());
                ops
            }
            InstKind::Cast { operand, .. } => vec![*operand],
            InstKind::Select {
                condition,
                on_true,
                on_false,
            } => vec![*condition, *on_true, *on_false],
            InstKind::Phi { incoming } => incoming.iter().map(|(v, _)| *v).collect(),
            InstKind::Call { callee, args } => {
                let mut ops = args.clone();
                if let Callee::Indirect(target) = callee {
                    ops.push(*target);
                }
                ops
            }
            InstKind::MemTransfer { dest, src, len } => vec![*dest, *src, *len],
            InstKind::MemSet { dest, value, len } => vec![*dest, *value, *len],
            InstKind::InsertValue {
                aggregate, value, ..
            } => vec![*aggregate, *value],
            InstKind::ExtractValue { aggregate, .. } => vec![*aggregate],
            InstKind::Cmp { lhs, rhs } | InstKind::Binary { lhs, rhs } => vec![*lhs, *rhs],
            InstKind::Branch { condition, .. } => condition.iter().copied().collect(),
            InstKind::Return { value } => value.iter().copied().collect(),
            InstKind::Unreachable => Vec::new(),
            InstKind::Other { operands } => operands.clone(),
        }
    }

    /// Successor blocks of a terminator (empty for non-terminators)
    pub fn successors(&self) -> &[BlockId] {
        match self {
            InstKind::Branch { targets, .. } => targets,
            _ => &[],
        }
    }

    #[inline]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstKind::Branch { .. } | InstKind::Return { .. } | InstKind::Unreachable
        )
    }

    /// Short opcode name for diagnostics
    pub fn opcode(&self) -> &'static str {
        match self {
            InstKind::Alloca { .. } => "alloca",
            InstKind::Load { .. } => "load",
            InstKind::Store { .. } => "store",
            InstKind::GetElementPtr { .. } => "getelementptr",
            InstKind::Cast { .. } => "cast",
            InstKind::Select { .. } => "select",
            InstKind::Phi { .. } => "phi",
            InstKind::Call { .. } => "call",
            InstKind::MemTransfer { .. } => "memcpy",
            InstKind::MemSet { .. } => "memset",
            InstKind::InsertValue { .. } => "insertvalue",
            InstKind::ExtractValue { .. } => "extractvalue",
            InstKind::Cmp { .. } => "cmp",
            InstKind::Binary { .. } => "binop",
            InstKind::Branch { .. } => "br",
            InstKind::Return { .. } => "ret",
            InstKind::Unreachable => "unreachable",
            InstKind::Other { .. } => "other",
        }
    }
}

/// An instruction placed in a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub block: BlockId,
    pub kind: InstKind,
}

/// What a value is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueKind {
    /// Formal parameter
    Argument { index: u32 },
    /// Address of a global variable
    Global { name: String },
    /// Address of a function
    Function { name: String },
    /// Alias of another global value
    GlobalAlias { name: String, aliasee: ValueId },
    Constant(Constant),
    Instruction(Instruction),
}

/// Entry of a procedure's value table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueData {
    pub ty: Type,
    pub kind: ValueKind,
    pub name: Option<String>,
}

impl ValueData {
    #[inline]
    pub fn instruction(&self) -> Option<&Instruction> {
        match &self.kind {
            ValueKind::Instruction(inst) => Some(inst),
            _ => None,
        }
    }

    #[inline]
    pub fn constant(&self) -> Option<&Constant> {
        match &self.kind {
            ValueKind::Constant(c) => Some(c),
            _ => None,
        }
    }

    /// Null pointer or `zeroinitializer`
    #[inline]
    pub fn is_null_constant(&self) -> bool {
        matches!(self.kind, ValueKind::Constant(Constant::Null))
    }

    /// Integer constant value, if any
    #[inline]
    pub fn as_const_int(&self) -> Option<i64> {
        match self.kind {
            ValueKind::Constant(Constant::Int(v)) => Some(v),
            _ => None,
        }
    }
}
