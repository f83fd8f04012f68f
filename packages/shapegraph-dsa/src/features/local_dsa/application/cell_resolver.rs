//! Cell Resolver
//!
//! Owns the graph while a procedure is being analyzed and answers "which
//! cell does this value denote" for operands of pointer or aggregate type.
//!
//! Resolution order:
//! 1. null constant: null cell
//! 2. value already bound: its cell, canonicalized
//! 3. `undef`: null cell
//! 4. global alias: the aliasee's cell
//! 5. global variable or function address: fresh `global` node, cached
//! 6. constant aggregate literal: invariant violation
//! 7. other aggregate value: null cell (insert/extract create them)
//! 8. constant cast of a pointer: the operand's cell
//! 9. constant indexed access: offset calculation, cached
//! 10. anything else: invariant violation

use crate::errors::{DsaError, Result};
use crate::features::local_dsa::domain::{Cell, Graph};
use crate::features::local_dsa::infrastructure::{GepOutcome, OffsetCalculator};
use crate::features::local_dsa::ports::LayoutOracle;
use crate::shared::models::{Constant, Procedure, Type, ValueId, ValueKind};
use tracing::debug;

pub struct CellResolver<'a> {
    proc: &'a Procedure,
    layout: &'a dyn LayoutOracle,
    graph: Graph,
    diagnostics: bool,
}

impl<'a> CellResolver<'a> {
    pub fn new(proc: &'a Procedure, layout: &'a dyn LayoutOracle, diagnostics: bool) -> Self {
        Self {
            proc,
            layout,
            graph: Graph::new(proc.name()),
            diagnostics,
        }
    }

    #[inline]
    pub fn procedure(&self) -> &'a Procedure {
        self.proc
    }

    #[inline]
    pub fn layout(&self) -> &'a dyn LayoutOracle {
        self.layout
    }

    #[inline]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    #[inline]
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn into_graph(self) -> Graph {
        self.graph
    }

    #[inline]
    pub fn ty(&self, value: ValueId) -> &'a Type {
        self.proc.ty(value)
    }

    /// Pointer-typed values get cells of their own
    #[inline]
    pub fn is_pointer(&self, value: ValueId) -> bool {
        self.proc.ty(value).is_pointer()
    }

    #[inline]
    pub fn is_null_constant(&self, value: ValueId) -> bool {
        self.proc.value(value).is_null_constant()
    }

    pub fn invariant(&self, message: impl Into<String>) -> DsaError {
        DsaError::invariant(self.proc.name(), message)
    }

    /// Log a precision loss when diagnostics are enabled
    pub fn precision_note(&self, value: ValueId, what: &str) {
        if self.diagnostics {
            debug!(
                procedure = %self.proc.name(),
                value = %value,
                "precision: {}",
                what
            );
        }
    }

    /// Bind `value` to a fresh node; returns its cell
    pub fn fresh_cell(&mut self, value: ValueId) -> Cell {
        let cell = Cell::new(self.graph.mk_node(), 0);
        self.graph.set_cell(value, cell);
        cell
    }

    /// Cell denoted by a pointer- or aggregate-typed value
    pub fn value_cell(&mut self, value: ValueId) -> Result<Cell> {
        let proc = self.proc;
        let data = proc.value(value);

        if data.is_null_constant() {
            return Ok(Cell::null());
        }

        if let Some(cell) = self.graph.lookup_cell(value) {
            return Ok(cell);
        }

        match &data.kind {
            ValueKind::Constant(Constant::Undef) => return Ok(Cell::null()),
            ValueKind::GlobalAlias { aliasee, .. } => return self.value_cell(*aliasee),
            ValueKind::Global { .. } | ValueKind::Function { .. } => {
                let cell = self.fresh_cell(value);
                if let Some(flags) = self.graph.flags_mut(cell) {
                    flags.global = true;
                }
                return Ok(cell);
            }
            ValueKind::Constant(Constant::Aggregate(_)) => {
                return Err(self.invariant(format!(
                    "constant aggregate {} of type {} used as a memory value",
                    value, data.ty
                )));
            }
            _ => {}
        }

        if data.ty.is_aggregate() {
            return Ok(Cell::null());
        }

        match &data.kind {
            ValueKind::Constant(Constant::Cast { operand, .. })
                if proc.ty(*operand).is_pointer() =>
            {
                self.value_cell(*operand)
            }
            ValueKind::Constant(Constant::GetElementPtr {
                base,
                source_type,
                indices,
            }) => self.visit_gep(value, *base, source_type, indices),
            _ => Err(self.invariant(format!(
                "value {} of type {} has no cell",
                value, data.ty
            ))),
        }
    }

    /// Bind the result of an indexed access off `base` and return it
    ///
    /// A null base yields a null result.
    pub fn visit_gep(
        &mut self,
        gep: ValueId,
        base: ValueId,
        source_type: &Type,
        indices: &[ValueId],
    ) -> Result<Cell> {
        let base_cell = self.value_cell(base)?;
        if base_cell.is_null() {
            self.precision_note(gep, "indexed access off a null base");
            self.graph.set_cell(gep, Cell::null());
            return Ok(Cell::null());
        }

        let collapsed = self
            .graph
            .node_of(base_cell)
            .map_or(false, |node| node.is_collapsed());
        let offset = if collapsed {
            Default::default()
        } else {
            OffsetCalculator::new(self.layout).gep_offset(self.proc, source_type, indices)?
        };
        let outcome = OffsetCalculator::apply(&mut self.graph, base_cell, offset);

        match outcome {
            GepOutcome::Offset(_) => {}
            GepOutcome::BaseCollapsed(_) => {
                self.precision_note(gep, "indexed access into a collapsed node")
            }
            GepOutcome::OutOfRange(_) => {
                self.precision_note(gep, "out-of-range offset collapsed the base node")
            }
            GepOutcome::Array { stride, .. } => {
                self.precision_note(gep, &format!("array abstraction with stride {}", stride))
            }
        }

        let cell = outcome.cell();
        self.graph.set_cell(gep, cell);
        Ok(cell)
    }
}
