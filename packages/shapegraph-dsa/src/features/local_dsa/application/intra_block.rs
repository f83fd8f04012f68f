//! Intra-block Builder
//!
//! First pass over a procedure: visits every reachable instruction once, in
//! reverse post-order, and applies its memory effect to the graph. Phi nodes
//! only receive a placeholder node here; their incoming values are joined by
//! the inter-block pass.

use super::cell_resolver::CellResolver;
use crate::errors::Result;
use crate::features::local_dsa::domain::Cell;
use crate::features::local_dsa::infrastructure::OffsetCalculator;
use crate::features::local_dsa::ports::AllocationRecognizer;
use crate::shared::models::{BlockId, CastKind, InstKind, Type, UseMap, ValueId};
use rustc_hash::FxHashSet;
use tracing::trace;

pub struct IntraBlockBuilder<'r, 'a> {
    resolver: &'r mut CellResolver<'a>,
    allocator: &'a dyn AllocationRecognizer,
    uses: UseMap,
}

impl<'r, 'a> IntraBlockBuilder<'r, 'a> {
    pub fn new(resolver: &'r mut CellResolver<'a>, allocator: &'a dyn AllocationRecognizer) -> Self {
        let uses = resolver.procedure().use_map();
        Self {
            resolver,
            allocator,
            uses,
        }
    }

    pub fn visit_block(&mut self, block: BlockId) -> Result<()> {
        let proc = self.resolver.procedure();
        for &inst in &proc.block(block).instructions {
            self.visit(inst)?;
        }
        Ok(())
    }

    pub fn visit(&mut self, inst: ValueId) -> Result<()> {
        let proc = self.resolver.procedure();
        let Some(instruction) = proc.instruction(inst) else {
            return Err(self
                .resolver
                .invariant(format!("{} listed in a block is not an instruction", inst)));
        };
        trace!(
            procedure = %proc.name(),
            value = %inst,
            opcode = instruction.kind.opcode(),
            "intra-block visit"
        );

        match &instruction.kind {
            InstKind::Alloca { .. } => self.visit_alloca(inst),
            InstKind::Load { ptr } => self.visit_load(inst, *ptr),
            InstKind::Store { value, ptr } => self.visit_store(inst, *value, *ptr),
            InstKind::GetElementPtr {
                base,
                source_type,
                indices,
            } => self.resolver.visit_gep(inst, *base, source_type, indices).map(|_| ()),
            InstKind::Cast { kind, operand } => self.visit_cast(inst, *kind, *operand),
            InstKind::Select {
                on_true, on_false, ..
            } => self.visit_select(inst, *on_true, *on_false),
            InstKind::Phi { .. } => {
                if self.resolver.is_pointer(inst) {
                    self.resolver.fresh_cell(inst);
                }
                Ok(())
            }
            InstKind::Call { .. } => {
                self.visit_call(inst);
                Ok(())
            }
            InstKind::MemTransfer { dest, src, len } => self.visit_mem_transfer(*dest, *src, *len),
            InstKind::MemSet { dest, len, .. } => self.visit_mem_set(*dest, *len),
            InstKind::InsertValue {
                aggregate,
                value,
                indices,
            } => self.visit_insert_value(inst, *aggregate, *value, indices),
            InstKind::ExtractValue { aggregate, indices } => {
                self.visit_extract_value(inst, *aggregate, indices)
            }
            InstKind::Return { value } => match value {
                Some(v) => self.visit_return(*v),
                None => Ok(()),
            },
            InstKind::Cmp { .. } | InstKind::Branch { .. } | InstKind::Unreachable => Ok(()),
            InstKind::Binary { .. } | InstKind::Other { .. } => {
                self.visit_opaque(inst);
                Ok(())
            }
        }
    }

    /// Unmodeled result: a fresh node if it has a tracked type
    fn visit_opaque(&mut self, inst: ValueId) {
        if self.resolver.ty(inst).is_tracked() {
            self.resolver.fresh_cell(inst);
        }
    }

    fn visit_alloca(&mut self, inst: ValueId) -> Result<()> {
        let cell = self.resolver.fresh_cell(inst);
        let graph = self.resolver.graph_mut();
        if let Some(flags) = graph.flags_mut(cell) {
            flags.stack = true;
        }
        graph.add_allocation_site(cell, inst);
        Ok(())
    }

    /// Cell of a dereferenced pointer; `None` for null (access skipped)
    fn deref_cell(&mut self, inst: ValueId, ptr: ValueId) -> Result<Option<Cell>> {
        if self.resolver.is_null_constant(ptr) {
            self.resolver.precision_note(inst, "access through a null constant skipped");
            return Ok(None);
        }
        let cell = self.resolver.value_cell(ptr)?;
        if cell.is_null() {
            self.resolver.precision_note(inst, "access through an unmodeled pointer skipped");
            return Ok(None);
        }
        Ok(Some(cell))
    }

    fn visit_load(&mut self, inst: ValueId, ptr: ValueId) -> Result<()> {
        let Some(base) = self.deref_cell(inst, ptr)? else {
            if self.resolver.ty(inst).is_tracked() {
                self.resolver.graph_mut().set_cell(inst, Cell::null());
            }
            return Ok(());
        };

        let ty = self.resolver.ty(inst);
        let size = self.resolver.layout().store_size(ty);
        let graph = self.resolver.graph_mut();
        graph.add_type(base, ty);
        graph.grow_size(base, size);
        if let Some(flags) = graph.flags_mut(base) {
            flags.read = true;
        }

        if ty.is_pointer() {
            let target = graph.link_or_create(base);
            graph.set_cell(inst, target);
        } else if ty.is_aggregate() {
            // the loaded aggregate is a view of the memory it was read from
            graph.set_cell(inst, base);
        }
        Ok(())
    }

    fn visit_store(&mut self, inst: ValueId, value: ValueId, ptr: ValueId) -> Result<()> {
        let Some(base) = self.deref_cell(inst, ptr)? else {
            return Ok(());
        };

        let ty = self.resolver.ty(value);
        let size = self.resolver.layout().store_size(ty);
        {
            let graph = self.resolver.graph_mut();
            graph.grow_size(base, size);
            graph.add_type(base, ty);
            if let Some(flags) = graph.flags_mut(base) {
                flags.modified = true;
            }
        }

        if !ty.is_tracked() || self.resolver.is_null_constant(value) {
            return Ok(());
        }
        let stored = self.resolver.value_cell(value)?;
        if stored.is_null() {
            return Ok(());
        }
        let graph = self.resolver.graph_mut();
        if ty.is_pointer() {
            graph.add_link(base, stored);
        } else {
            graph.unify(base, stored);
        }
        Ok(())
    }

    fn visit_cast(&mut self, inst: ValueId, kind: CastKind, operand: ValueId) -> Result<()> {
        match kind {
            CastKind::BitCast | CastKind::AddrSpaceCast => {
                if !self.resolver.ty(inst).is_tracked() {
                    return Ok(());
                }
                let cell = self.resolver.value_cell(operand)?;
                self.resolver.graph_mut().set_cell(inst, cell);
                Ok(())
            }
            CastKind::IntToPtr => {
                if self.only_compared(inst) {
                    return Ok(());
                }
                let cell = self.resolver.fresh_cell(inst);
                if let Some(flags) = self.resolver.graph_mut().flags_mut(cell) {
                    flags.int_to_ptr = true;
                }
                self.resolver.precision_note(inst, "pointer created from an integer");
                Ok(())
            }
            CastKind::PtrToInt => self.visit_ptr_to_int(inst, operand),
            _ => {
                self.visit_opaque(inst);
                Ok(())
            }
        }
    }

    /// Sole use of `value` is a comparison
    fn only_compared(&self, value: ValueId) -> bool {
        let proc = self.resolver.procedure();
        self.uses
            .single_user(value)
            .and_then(|user| proc.instruction(user))
            .map_or(false, |user| matches!(user.kind, InstKind::Cmp { .. }))
    }

    /// Single-use chain starting at `value` ends in a branch
    ///
    /// The walk stops at loads, stores and calls.
    fn feeds_branch(&self, value: ValueId) -> bool {
        let proc = self.resolver.procedure();
        let mut seen = FxHashSet::default();
        let Some(mut current) = self.uses.single_user(value) else {
            return false;
        };
        while seen.insert(current) {
            let Some(inst) = proc.instruction(current) else {
                return false;
            };
            match inst.kind {
                InstKind::Branch { .. } => return true,
                InstKind::Load { .. } | InstKind::Store { .. } | InstKind::Call { .. } => {
                    return false
                }
                _ => {}
            }
            match self.uses.single_user(current) {
                Some(next) => current = next,
                None => return false,
            }
        }
        false
    }

    fn visit_ptr_to_int(&mut self, inst: ValueId, operand: ValueId) -> Result<()> {
        if self.only_compared(inst) || self.feeds_branch(inst) {
            return Ok(());
        }
        let cell = self.resolver.value_cell(operand)?;
        if cell.is_null() {
            return Ok(());
        }
        if let Some(flags) = self.resolver.graph_mut().flags_mut(cell) {
            flags.ptr_to_int = true;
        }
        self.resolver.precision_note(inst, "pointer escapes into an integer");
        Ok(())
    }

    fn visit_select(&mut self, inst: ValueId, on_true: ValueId, on_false: ValueId) -> Result<()> {
        if !self.resolver.ty(inst).is_tracked() {
            return Ok(());
        }
        let a = self.resolver.value_cell(on_true)?;
        let b = self.resolver.value_cell(on_false)?;
        let merged = self.resolver.graph_mut().unify(a, b);
        self.resolver.graph_mut().set_cell(inst, merged);
        Ok(())
    }

    fn visit_call(&mut self, inst: ValueId) {
        // Results that are not pointers never get a cell, even from allocators.
        if !self.resolver.ty(inst).is_tracked() {
            return;
        }

        let proc = self.resolver.procedure();
        let is_allocation = self.allocator.is_allocation_call(proc, inst);
        let cell = self.resolver.fresh_cell(inst);
        let graph = self.resolver.graph_mut();
        if let Some(flags) = graph.flags_mut(cell) {
            if is_allocation {
                flags.heap = true;
            } else {
                flags.external = true;
            }
        }
        if is_allocation {
            graph.add_allocation_site(cell, inst);
        }
    }

    fn constant_len(&self, len: ValueId) -> Option<u64> {
        self.resolver
            .procedure()
            .value(len)
            .as_const_int()
            .and_then(|n| u64::try_from(n).ok())
    }

    fn visit_mem_transfer(&mut self, dest: ValueId, src: ValueId, len: ValueId) -> Result<()> {
        let dest_cell = self.resolver.value_cell(dest)?;
        let src_cell = self.resolver.value_cell(src)?;
        let len = self.constant_len(len);

        let graph = self.resolver.graph_mut();
        if let Some(bytes) = len {
            graph.grow_size(dest_cell, bytes);
            graph.grow_size(src_cell, bytes);
        }
        if let Some(flags) = graph.flags_mut(dest_cell) {
            flags.modified = true;
        }
        if let Some(flags) = graph.flags_mut(src_cell) {
            flags.read = true;
        }
        // every byte of the source may land in the destination
        graph.unify(dest_cell, src_cell);
        Ok(())
    }

    fn visit_mem_set(&mut self, dest: ValueId, len: ValueId) -> Result<()> {
        let dest_cell = self.resolver.value_cell(dest)?;
        let len = self.constant_len(len);

        let graph = self.resolver.graph_mut();
        if let Some(bytes) = len {
            graph.grow_size(dest_cell, bytes);
        }
        if let Some(flags) = graph.flags_mut(dest_cell) {
            flags.modified = true;
        }
        Ok(())
    }

    /// Cell of an aggregate operand, creating one if it has none yet
    fn aggregate_cell(&mut self, aggregate: ValueId) -> Result<Cell> {
        let cell = self.resolver.value_cell(aggregate)?;
        if !cell.is_null() {
            return Ok(cell);
        }
        Ok(self.resolver.fresh_cell(aggregate))
    }

    fn visit_insert_value(
        &mut self,
        inst: ValueId,
        aggregate: ValueId,
        value: ValueId,
        indices: &[u32],
    ) -> Result<()> {
        let agg = self.aggregate_cell(aggregate)?;
        self.resolver.graph_mut().set_cell(inst, agg);

        let agg_ty = self.resolver.ty(aggregate);
        let offset = self.field_offset(agg_ty, indices)?;
        let out = agg.shifted(offset);

        let ty = self.resolver.ty(value);
        let size = self.resolver.layout().store_size(ty);
        {
            let graph = self.resolver.graph_mut();
            graph.grow_size(out, size);
            graph.add_type(out, ty);
        }

        if !ty.is_tracked() || self.resolver.is_null_constant(value) {
            return Ok(());
        }
        let inserted = self.resolver.value_cell(value)?;
        if inserted.is_null() {
            return Ok(());
        }
        let graph = self.resolver.graph_mut();
        if ty.is_pointer() {
            graph.add_link(out, inserted);
        } else {
            graph.unify(out, inserted);
        }
        Ok(())
    }

    fn visit_extract_value(&mut self, inst: ValueId, aggregate: ValueId, indices: &[u32]) -> Result<()> {
        let agg = self.aggregate_cell(aggregate)?;
        let agg_ty = self.resolver.ty(aggregate);
        let offset = self.field_offset(agg_ty, indices)?;
        let cell = agg.shifted(offset);

        let ty = self.resolver.ty(inst);
        let graph = self.resolver.graph_mut();
        graph.add_type(cell, ty);
        if ty.is_pointer() {
            let target = graph.link_or_create(cell);
            graph.set_cell(inst, target);
        } else if ty.is_aggregate() {
            graph.set_cell(inst, cell);
        }
        Ok(())
    }

    fn field_offset(&self, aggregate: &Type, indices: &[u32]) -> Result<u64> {
        OffsetCalculator::new(self.resolver.layout()).indexed_offset(
            self.resolver.procedure(),
            aggregate,
            indices,
        )
    }

    fn visit_return(&mut self, value: ValueId) -> Result<()> {
        let ty = self.resolver.ty(value);
        if !ty.is_tracked() {
            return Ok(());
        }
        let cell = self.resolver.value_cell(value)?;
        if cell.is_null() {
            return Ok(());
        }
        self.resolver.graph_mut().set_return_cell(cell);
        Ok(())
    }
}
