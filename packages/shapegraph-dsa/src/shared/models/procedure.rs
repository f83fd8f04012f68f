//! Procedures, basic blocks and modules
//!
//! This is the shape in which procedure bodies are supplied to the analysis:
//! an ordered list of basic blocks (the first one is the entry), each an
//! ordered list of instruction values, plus the procedure's value table.

use super::types::Type;
use super::value::{
    BlockId, Callee, CastKind, Constant, InstKind, Instruction, ValueData, ValueId, ValueKind,
};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Basic block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    pub name: String,
    /// Instruction values in execution order
    pub instructions: Vec<ValueId>,
}

/// A procedure body (or a declaration when it has no blocks)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    name: String,
    return_type: Type,
    arguments: Vec<ValueId>,
    values: Vec<ValueData>,
    blocks: Vec<BasicBlock>,
}

impl Procedure {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn return_type(&self) -> &Type {
        &self.return_type
    }

    #[inline]
    pub fn arguments(&self) -> &[ValueId] {
        &self.arguments
    }

    #[inline]
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    /// Entry block (first in layout order)
    #[inline]
    pub fn entry(&self) -> Option<BlockId> {
        self.blocks.first().map(|b| b.id)
    }

    /// A declaration has no body to analyze
    #[inline]
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    #[inline]
    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.index()]
    }

    #[inline]
    pub fn ty(&self, id: ValueId) -> &Type {
        &self.values[id.index()].ty
    }

    #[inline]
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Instruction behind a value, if the value is one
    #[inline]
    pub fn instruction(&self, id: ValueId) -> Option<&Instruction> {
        self.values.get(id.index()).and_then(|v| v.instruction())
    }

    /// Successors of a block, read from its terminator
    pub fn successors(&self, id: BlockId) -> &[BlockId] {
        self.block(id)
            .instructions
            .last()
            .and_then(|&last| self.instruction(last))
            .map(|inst| inst.kind.successors())
            .unwrap_or(&[])
    }

    /// Users of every value, computed over all instructions
    pub fn use_map(&self) -> UseMap {
        let mut users: FxHashMap<ValueId, Vec<ValueId>> = FxHashMap::default();
        for block in &self.blocks {
            for &inst_id in &block.instructions {
                if let Some(inst) = self.instruction(inst_id) {
                    for op in inst.kind.operands() {
                        users.entry(op).or_default().push(inst_id);
                    }
                }
            }
        }
        UseMap { users }
    }
}

/// value → instructions using it
#[derive(Debug, Clone, Default)]
pub struct UseMap {
    users: FxHashMap<ValueId, Vec<ValueId>>,
}

impl UseMap {
    #[inline]
    pub fn users(&self, value: ValueId) -> &[ValueId] {
        self.users.get(&value).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The single user of `value`, if it has exactly one use
    #[inline]
    pub fn single_user(&self, value: ValueId) -> Option<ValueId> {
        match self.users(value) {
            [only] => Some(*only),
            _ => None,
        }
    }
}

/// A compilation unit: a set of procedures with unique names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    procedures: Vec<Procedure>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            procedures: Vec::new(),
        }
    }

    pub fn add_procedure(&mut self, procedure: Procedure) {
        self.procedures.push(procedure);
    }

    pub fn with_procedure(mut self, procedure: Procedure) -> Self {
        self.add_procedure(procedure);
        self
    }

    #[inline]
    pub fn procedures(&self) -> &[Procedure] {
        &self.procedures
    }

    pub fn procedure(&self, name: &str) -> Option<&Procedure> {
        self.procedures.iter().find(|p| p.name() == name)
    }
}

/// Incremental constructor for [`Procedure`]
///
/// # Example
/// ```
/// use shapegraph_dsa::shared::models::{ProcedureBuilder, Type};
///
/// let mut b = ProcedureBuilder::new("id", Type::ptr());
/// let p = b.argument(Type::ptr());
/// let entry = b.block("entry");
/// b.ret(entry, Some(p));
/// let proc = b.finish();
/// assert_eq!(proc.blocks().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ProcedureBuilder {
    procedure: Procedure,
}

impl ProcedureBuilder {
    pub fn new(name: impl Into<String>, return_type: Type) -> Self {
        Self {
            procedure: Procedure {
                name: name.into(),
                return_type,
                arguments: Vec::new(),
                values: Vec::new(),
                blocks: Vec::new(),
            },
        }
    }

    pub fn finish(self) -> Procedure {
        self.procedure
    }

    fn push_value(&mut self, ty: Type, kind: ValueKind) -> ValueId {
        let id = ValueId(self.procedure.values.len() as u32);
        self.procedure.values.push(ValueData {
            ty,
            kind,
            name: None,
        });
        id
    }

    /// Attach a source-level name to a value
    pub fn name_value(&mut self, value: ValueId, name: impl Into<String>) {
        self.procedure.values[value.index()].name = Some(name.into());
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Non-instruction values
    // ═══════════════════════════════════════════════════════════════════════

    pub fn argument(&mut self, ty: Type) -> ValueId {
        let index = self.procedure.arguments.len() as u32;
        let id = self.push_value(ty, ValueKind::Argument { index });
        self.procedure.arguments.push(id);
        id
    }

    pub fn global(&mut self, name: impl Into<String>) -> ValueId {
        self.push_value(Type::Ptr, ValueKind::Global { name: name.into() })
    }

    pub fn function_ref(&mut self, name: impl Into<String>) -> ValueId {
        self.push_value(Type::Ptr, ValueKind::Function { name: name.into() })
    }

    pub fn global_alias(&mut self, name: impl Into<String>, aliasee: ValueId) -> ValueId {
        self.push_value(
            Type::Ptr,
            ValueKind::GlobalAlias {
                name: name.into(),
                aliasee,
            },
        )
    }

    pub fn null(&mut self, ty: Type) -> ValueId {
        self.push_value(ty, ValueKind::Constant(Constant::Null))
    }

    pub fn undef(&mut self, ty: Type) -> ValueId {
        self.push_value(ty, ValueKind::Constant(Constant::Undef))
    }

    pub fn const_int(&mut self, bits: u32, value: i64) -> ValueId {
        self.push_value(Type::Int(bits), ValueKind::Constant(Constant::Int(value)))
    }

    pub fn const_aggregate(&mut self, ty: Type, elements: Vec<ValueId>) -> ValueId {
        self.push_value(ty, ValueKind::Constant(Constant::Aggregate(elements)))
    }

    pub fn const_cast(&mut self, kind: CastKind, ty: Type, operand: ValueId) -> ValueId {
        self.push_value(ty, ValueKind::Constant(Constant::Cast { kind, operand }))
    }

    pub fn const_gep(&mut self, base: ValueId, source_type: Type, indices: Vec<ValueId>) -> ValueId {
        self.push_value(
            Type::Ptr,
            ValueKind::Constant(Constant::GetElementPtr {
                base,
                source_type,
                indices,
            }),
        )
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Blocks and instructions
    // ═══════════════════════════════════════════════════════════════════════

    pub fn block(&mut self, name: impl Into<String>) -> BlockId {
        let id = BlockId(self.procedure.blocks.len() as u32);
        self.procedure.blocks.push(BasicBlock {
            id,
            name: name.into(),
            instructions: Vec::new(),
        });
        id
    }

    /// Append an instruction of result type `ty` to `block`
    pub fn inst(&mut self, block: BlockId, ty: Type, kind: InstKind) -> ValueId {
        let id = self.push_value(ty, ValueKind::Instruction(Instruction { block, kind }));
        self.procedure.blocks[block.index()].instructions.push(id);
        id
    }

    pub fn alloca(&mut self, block: BlockId, allocated: Type) -> ValueId {
        self.inst(
            block,
            Type::Ptr,
            InstKind::Alloca {
                allocated,
                count: None,
            },
        )
    }

    pub fn load(&mut self, block: BlockId, ty: Type, ptr: ValueId) -> ValueId {
        self.inst(block, ty, InstKind::Load { ptr })
    }

    pub fn store(&mut self, block: BlockId, value: ValueId, ptr: ValueId) -> ValueId {
        self.inst(block, Type::Void, InstKind::Store { value, ptr })
    }

    pub fn gep(
        &mut self,
        block: BlockId,
        base: ValueId,
        source_type: Type,
        indices: Vec<ValueId>,
    ) -> ValueId {
        self.inst(
            block,
            Type::Ptr,
            InstKind::GetElementPtr {
                base,
                source_type,
                indices,
            },
        )
    }

    pub fn cast(&mut self, block: BlockId, kind: CastKind, ty: Type, operand: ValueId) -> ValueId {
        self.inst(block, ty, InstKind::Cast { kind, operand })
    }

    pub fn bitcast(&mut self, block: BlockId, operand: ValueId) -> ValueId {
        self.cast(block, CastKind::BitCast, Type::Ptr, operand)
    }

    pub fn select(
        &mut self,
        block: BlockId,
        ty: Type,
        condition: ValueId,
        on_true: ValueId,
        on_false: ValueId,
    ) -> ValueId {
        self.inst(
            block,
            ty,
            InstKind::Select {
                condition,
                on_true,
                on_false,
            },
        )
    }

    pub fn phi(&mut self, block: BlockId, ty: Type, incoming: Vec<(ValueId, BlockId)>) -> ValueId {
        self.inst(block, ty, InstKind::Phi { incoming })
    }

    /// Add an incoming edge to an existing phi (for values defined later)
    pub fn add_incoming(&mut self, phi: ValueId, value: ValueId, pred: BlockId) {
        if let ValueKind::Instruction(Instruction {
            kind: InstKind::Phi { incoming },
            ..
        }) = &mut self.procedure.values[phi.index()].kind
        {
            incoming.push((value, pred));
        }
    }

    pub fn call(
        &mut self,
        block: BlockId,
        ty: Type,
        callee: impl Into<String>,
        args: Vec<ValueId>,
    ) -> ValueId {
        self.inst(
            block,
            ty,
            InstKind::Call {
                callee: Callee::Direct(callee.into()),
                args,
            },
        )
    }

    pub fn call_indirect(
        &mut self,
        block: BlockId,
        ty: Type,
        target: ValueId,
        args: Vec<ValueId>,
    ) -> ValueId {
        self.inst(
            block,
            ty,
            InstKind::Call {
                callee: Callee::Indirect(target),
                args,
            },
        )
    }

    pub fn memcpy(&mut self, block: BlockId, dest: ValueId, src: ValueId, len: ValueId) -> ValueId {
        self.inst(block, Type::Void, InstKind::MemTransfer { dest, src, len })
    }

    pub fn memset(&mut self, block: BlockId, dest: ValueId, value: ValueId, len: ValueId) -> ValueId {
        self.inst(block, Type::Void, InstKind::MemSet { dest, value, len })
    }

    /// `insertvalue`; the result has the aggregate's type
    pub fn insert_value(
        &mut self,
        block: BlockId,
        aggregate: ValueId,
        value: ValueId,
        indices: Vec<u32>,
    ) -> ValueId {
        let ty = self.procedure.ty(aggregate).clone();
        self.inst(
            block,
            ty,
            InstKind::InsertValue {
                aggregate,
                value,
                indices,
            },
        )
    }

    pub fn extract_value(
        &mut self,
        block: BlockId,
        ty: Type,
        aggregate: ValueId,
        indices: Vec<u32>,
    ) -> ValueId {
        self.inst(block, ty, InstKind::ExtractValue { aggregate, indices })
    }

    pub fn cmp(&mut self, block: BlockId, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.inst(block, Type::i1(), InstKind::Cmp { lhs, rhs })
    }

    pub fn binary(&mut self, block: BlockId, ty: Type, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.inst(block, ty, InstKind::Binary { lhs, rhs })
    }

    pub fn br(&mut self, block: BlockId, target: BlockId) -> ValueId {
        self.inst(
            block,
            Type::Void,
            InstKind::Branch {
                condition: None,
                targets: vec![target],
            },
        )
    }

    pub fn cond_br(
        &mut self,
        block: BlockId,
        condition: ValueId,
        on_true: BlockId,
        on_false: BlockId,
    ) -> ValueId {
        self.inst(
            block,
            Type::Void,
            InstKind::Branch {
                condition: Some(condition),
                targets: vec![on_true, on_false],
            },
        )
    }

    pub fn ret(&mut self, block: BlockId, value: Option<ValueId>) -> ValueId {
        self.inst(block, Type::Void, InstKind::Return { value })
    }

    pub fn unreachable(&mut self, block: BlockId) -> ValueId {
        self.inst(block, Type::Void, InstKind::Unreachable)
    }
}
