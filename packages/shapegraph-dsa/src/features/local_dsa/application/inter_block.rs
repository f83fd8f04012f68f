//! Inter-block Builder
//!
//! Second pass: joins every pointer-typed phi with its incoming values.
//! Incoming null constants, values that resolve to a null cell and edges
//! from unreachable predecessors are skipped; a phi left with no incoming
//! cell at all is an invariant violation.

use super::cell_resolver::CellResolver;
use crate::errors::Result;
use crate::shared::models::{BlockId, InstKind, ValueId};
use rustc_hash::FxHashSet;
use tracing::trace;

pub struct InterBlockBuilder<'r, 'a> {
    resolver: &'r mut CellResolver<'a>,
    reachable: FxHashSet<BlockId>,
}

impl<'r, 'a> InterBlockBuilder<'r, 'a> {
    /// `order` is the set of blocks visited by the first pass
    pub fn new(resolver: &'r mut CellResolver<'a>, order: &[BlockId]) -> Self {
        Self {
            resolver,
            reachable: order.iter().copied().collect(),
        }
    }

    pub fn visit_block(&mut self, block: BlockId) -> Result<()> {
        let proc = self.resolver.procedure();
        for &inst in &proc.block(block).instructions {
            if let Some(InstKind::Phi { incoming }) = proc.instruction(inst).map(|i| &i.kind) {
                self.visit_phi(inst, incoming)?;
            }
        }
        Ok(())
    }

    fn visit_phi(&mut self, phi: ValueId, incoming: &[(ValueId, BlockId)]) -> Result<()> {
        if !self.resolver.is_pointer(phi) {
            return Ok(());
        }
        trace!(
            procedure = %self.resolver.procedure().name(),
            value = %phi,
            incoming = incoming.len(),
            "inter-block phi"
        );

        let Some(mut joined) = self.resolver.graph_mut().lookup_cell(phi) else {
            return Err(self
                .resolver
                .invariant(format!("phi {} was not visited by the first pass", phi)));
        };

        let mut joined_any = false;
        for &(value, pred) in incoming {
            if self.resolver.is_null_constant(value) || !self.reachable.contains(&pred) {
                continue;
            }
            let cell = self.resolver.value_cell(value)?;
            if cell.is_null() {
                continue;
            }
            joined = self.resolver.graph_mut().unify(joined, cell);
            joined_any = true;
        }

        if !joined_any {
            return Err(self
                .resolver
                .invariant(format!("phi {} has no non-null incoming value", phi)));
        }
        self.resolver.graph_mut().set_cell(phi, joined);
        Ok(())
    }
}
