//! Offset Calculator
//!
//! Turns the index list of an indexed access into a byte displacement.
//!
//! A constant struct index adds the field offset, a constant sequential
//! index adds `index * element_size`. A non-constant sequential index
//! cannot be resolved statically: its element size feeds the stride
//! divisor (gcd over all such sizes), and the accessed memory is then
//! summarized as an array of that stride.
//!
//! Positions on array nodes are taken modulo the stride, so stepping
//! backwards over elements keeps the array abstraction. Only a plain node
//! reached at a negative position is collapsed.

use crate::errors::{DsaError, Result};
use crate::features::local_dsa::domain::{gcd, Cell, Graph};
use crate::features::local_dsa::ports::LayoutOracle;
use crate::shared::models::{Procedure, Type, ValueId};

/// Displacement of an indexed access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GepOffset {
    /// Constant part, in bytes (may be negative)
    pub fixed: i64,
    /// gcd of element sizes stepped by non-constant indices (0 if none)
    pub stride: u64,
}

/// What an indexed access did to the base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GepOutcome {
    /// Plain field/element access
    Offset(Cell),
    /// Base node was already collapsed
    BaseCollapsed(Cell),
    /// Position before the start (or past the end of the offset range) of a
    /// plain node; base collapsed
    OutOfRange(Cell),
    /// Non-constant index; base folded into an array of this stride
    Array { cell: Cell, stride: u64 },
}

impl GepOutcome {
    #[inline]
    pub fn cell(self) -> Cell {
        match self {
            GepOutcome::Offset(c)
            | GepOutcome::BaseCollapsed(c)
            | GepOutcome::OutOfRange(c)
            | GepOutcome::Array { cell: c, .. } => c,
        }
    }
}

/// `position mod stride` in `0..stride`
fn fold(position: i64, stride: u64) -> u64 {
    (i128::from(position).rem_euclid(i128::from(stride))) as u64
}

pub struct OffsetCalculator<'a> {
    layout: &'a dyn LayoutOracle,
}

impl<'a> OffsetCalculator<'a> {
    pub fn new(layout: &'a dyn LayoutOracle) -> Self {
        Self { layout }
    }

    /// Displacement of `indices` over a pointer to `source_type`
    ///
    /// The first index steps over whole `source_type` objects. A constant
    /// part that does not fit in `i64` is an invariant violation.
    pub fn gep_offset(
        &self,
        proc: &Procedure,
        source_type: &Type,
        indices: &[ValueId],
    ) -> Result<GepOffset> {
        let overflow = || {
            DsaError::invariant(
                proc.name(),
                format!("constant offset of indexed access over {} overflows", source_type),
            )
        };
        let mut out = GepOffset::default();
        let mut current = source_type;

        for (pos, &index) in indices.iter().enumerate() {
            let constant = proc.value(index).as_const_int();

            let element = if pos == 0 {
                source_type
            } else {
                match current {
                    Type::Struct(st) => {
                        let field = constant.ok_or_else(|| {
                            DsaError::invariant(
                                proc.name(),
                                format!("non-constant struct index {} into {}", index, current),
                            )
                        })?;
                        let field = u32::try_from(field).map_err(|_| {
                            DsaError::invariant(
                                proc.name(),
                                format!("struct index {} out of range for {}", field, current),
                            )
                        })?;
                        let next = st.field(field).ok_or_else(|| {
                            DsaError::invariant(
                                proc.name(),
                                format!("struct index {} out of range for {}", field, current),
                            )
                        })?;
                        let field_offset = i64::try_from(self.layout.field_offset(st, field))
                            .map_err(|_| overflow())?;
                        out.fixed = out.fixed.checked_add(field_offset).ok_or_else(overflow)?;
                        current = next;
                        continue;
                    }
                    Type::Array(elem, _) | Type::Vector(elem, _) => elem.as_ref(),
                    other => {
                        return Err(DsaError::invariant(
                            proc.name(),
                            format!("indexed access steps into non-aggregate type {}", other),
                        ));
                    }
                }
            };

            let size = self.layout.store_size(element);
            match constant {
                Some(k) => {
                    let step = i64::try_from(size)
                        .ok()
                        .and_then(|size| k.checked_mul(size))
                        .ok_or_else(overflow)?;
                    out.fixed = out.fixed.checked_add(step).ok_or_else(overflow)?;
                }
                None => out.stride = gcd(out.stride, size),
            }
            current = element;
        }

        Ok(out)
    }

    /// Byte offset of a constant index path inside an aggregate value
    pub fn indexed_offset(&self, proc: &Procedure, aggregate: &Type, indices: &[u32]) -> Result<u64> {
        let overflow = || {
            DsaError::invariant(
                proc.name(),
                format!("field offset inside {} overflows", aggregate),
            )
        };
        let mut offset = 0u64;
        let mut current = aggregate;
        for &index in indices {
            let step = match current {
                Type::Struct(st) => {
                    let next = st.field(index).ok_or_else(|| {
                        DsaError::invariant(
                            proc.name(),
                            format!("field {} out of range for {}", index, current),
                        )
                    })?;
                    let step = self.layout.field_offset(st, index);
                    current = next;
                    step
                }
                Type::Array(elem, _) | Type::Vector(elem, _) => {
                    current = elem;
                    u64::from(index)
                        .checked_mul(self.layout.alloc_size(elem))
                        .ok_or_else(overflow)?
                }
                other => {
                    return Err(DsaError::invariant(
                        proc.name(),
                        format!("aggregate index into non-aggregate type {}", other),
                    ));
                }
            };
            offset = offset.checked_add(step).ok_or_else(overflow)?;
        }
        Ok(offset)
    }

    /// Cell reached by displacing the non-null `base` by `offset`
    pub fn apply(graph: &mut Graph, base: Cell, offset: GepOffset) -> GepOutcome {
        let base = graph.resolve(base);
        let Some(base_node) = base.node() else {
            return GepOutcome::Offset(base);
        };

        if graph.node(base_node).is_collapsed() {
            return GepOutcome::BaseCollapsed(Cell::new(base_node, 0));
        }

        let position = i64::try_from(base.offset())
            .ok()
            .and_then(|start| start.checked_add(offset.fixed));

        if offset.stride != 0 {
            let Some(position) = position else {
                return GepOutcome::OutOfRange(graph.collapse_cell(base));
            };
            let array = graph.mk_array_node(offset.stride);
            graph.unify(Cell::new(array, 0), Cell::new(base_node, 0));
            return GepOutcome::Array {
                cell: graph.resolve(Cell::new(array, fold(position, offset.stride))),
                stride: offset.stride,
            };
        }

        match (position, graph.node(base_node).array_stride()) {
            (Some(position), _) if position >= 0 => {
                GepOutcome::Offset(graph.resolve(Cell::new(base_node, position as u64)))
            }
            (Some(position), Some(stride)) => {
                GepOutcome::Offset(Cell::new(base_node, fold(position, stride)))
            }
            _ => GepOutcome::OutOfRange(graph.collapse_cell(base)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::local_dsa::infrastructure::layout::DataLayout;
    use crate::shared::models::{ProcedureBuilder, StructType};

    fn pair() -> Type {
        Type::struct_of(vec![Type::i32(), Type::i32()])
    }

    #[test]
    fn test_constant_field_offset() {
        let dl = DataLayout::default();
        let calc = OffsetCalculator::new(&dl);
        let mut b = ProcedureBuilder::new("f", Type::Void);
        let zero = b.const_int(64, 0);
        let one = b.const_int(32, 1);
        let proc = b.finish();

        let off = calc.gep_offset(&proc, &pair(), &[zero, one]).unwrap();
        assert_eq!(off, GepOffset { fixed: 4, stride: 0 });
    }

    #[test]
    fn test_variable_index_gives_stride() {
        let dl = DataLayout::default();
        let calc = OffsetCalculator::new(&dl);
        let mut b = ProcedureBuilder::new("f", Type::Void);
        let i = b.argument(Type::i64());
        let one = b.const_int(32, 1);
        let proc = b.finish();

        let off = calc.gep_offset(&proc, &pair(), &[i, one]).unwrap();
        assert_eq!(off, GepOffset { fixed: 4, stride: 8 });
    }

    #[test]
    fn test_nested_arrays_use_gcd() {
        let dl = DataLayout::default();
        let calc = OffsetCalculator::new(&dl);
        let mut b = ProcedureBuilder::new("f", Type::Void);
        let i = b.argument(Type::i64());
        let j = b.argument(Type::i64());
        let proc = b.finish();

        // [4 x i64] stepped by i (32 bytes), then i64 stepped by j (8 bytes)
        let ty = Type::array_of(Type::i64(), 4);
        let off = calc.gep_offset(&proc, &ty, &[i, j]).unwrap();
        assert_eq!(off, GepOffset { fixed: 0, stride: 8 });
    }

    #[test]
    fn test_negative_index() {
        let dl = DataLayout::default();
        let calc = OffsetCalculator::new(&dl);
        let mut b = ProcedureBuilder::new("f", Type::Void);
        let minus_one = b.const_int(64, -1);
        let proc = b.finish();

        let off = calc.gep_offset(&proc, &Type::i32(), &[minus_one]).unwrap();
        assert_eq!(off.fixed, -4);
    }

    #[test]
    fn test_non_constant_struct_index_is_invariant_violation() {
        let dl = DataLayout::default();
        let calc = OffsetCalculator::new(&dl);
        let mut b = ProcedureBuilder::new("f", Type::Void);
        let zero = b.const_int(64, 0);
        let i = b.argument(Type::i32());
        let proc = b.finish();

        let err = calc.gep_offset(&proc, &pair(), &[zero, i]).unwrap_err();
        assert!(matches!(err, DsaError::InvariantViolation { .. }));
    }

    #[test]
    fn test_indexed_offset_uses_alloc_size() {
        let dl = DataLayout::default();
        let calc = OffsetCalculator::new(&dl);
        let proc = ProcedureBuilder::new("f", Type::Void).finish();
        let elem = Type::Struct(StructType::new(vec![Type::ptr(), Type::i8()]));
        let agg = Type::struct_of(vec![Type::i8(), Type::array_of(elem, 2)]);

        // field 1 at 8, element 1 at +16, field 1 at +8
        assert_eq!(calc.indexed_offset(&proc, &agg, &[1, 1, 1]).unwrap(), 32);
    }

    #[test]
    fn test_apply_array_access() {
        let mut g = Graph::new("f");
        let base = g.mk_node();

        let out = OffsetCalculator::apply(&mut g, Cell::new(base, 0), GepOffset { fixed: 12, stride: 8 });

        let GepOutcome::Array { cell, stride } = out else {
            panic!("expected array outcome, got {:?}", out);
        };
        assert_eq!(stride, 8);
        assert_eq!(cell, Cell::new(base, 4));
        assert_eq!(g.node(base).array_stride(), Some(8));
    }

    #[test]
    fn test_apply_negative_collapses_plain_node() {
        let mut g = Graph::new("f");
        let base = g.mk_node();

        let out = OffsetCalculator::apply(&mut g, Cell::new(base, 0), GepOffset { fixed: -4, stride: 0 });

        assert_eq!(out, GepOutcome::OutOfRange(Cell::new(base, 0)));
        assert!(g.node(base).is_collapsed());
    }

    #[test]
    fn test_apply_negative_with_stride_stays_array() {
        let mut g = Graph::new("f");
        let base = g.mk_node();

        // p[-1][i] over [4 x i64]: fixed -32, stride 8
        let out = OffsetCalculator::apply(&mut g, Cell::new(base, 0), GepOffset { fixed: -32, stride: 8 });

        assert_eq!(out, GepOutcome::Array { cell: Cell::new(base, 0), stride: 8 });
        assert!(!g.node(base).is_collapsed());
        assert_eq!(g.node(base).array_stride(), Some(8));
    }

    #[test]
    fn test_apply_negative_step_on_array_node_folds() {
        let mut g = Graph::new("f");
        let base = g.mk_node();
        g.set_array_stride(Cell::new(base, 0), 8);

        let out = OffsetCalculator::apply(&mut g, Cell::new(base, 4), GepOffset { fixed: -12, stride: 0 });

        assert_eq!(out, GepOutcome::Offset(Cell::new(base, 0)));
        assert!(!g.node(base).is_collapsed());
        assert_eq!(g.node(base).array_stride(), Some(8));
    }

    #[test]
    fn test_apply_position_past_offset_range_collapses() {
        let mut g = Graph::new("f");
        let base = g.mk_node();

        let out = OffsetCalculator::apply(&mut g, Cell::new(base, 8), GepOffset { fixed: i64::MAX, stride: 0 });

        assert_eq!(out, GepOutcome::OutOfRange(Cell::new(base, 0)));
        assert!(g.node(base).is_collapsed());
    }

    #[test]
    fn test_overflowing_constant_index_is_invariant_violation() {
        let dl = DataLayout::default();
        let calc = OffsetCalculator::new(&dl);
        let mut b = ProcedureBuilder::new("f", Type::Void);
        let huge = b.const_int(64, i64::MAX / 2);
        let proc = b.finish();

        let err = calc.gep_offset(&proc, &Type::i64(), &[huge]).unwrap_err();
        assert!(matches!(err, DsaError::InvariantViolation { .. }));
    }

    #[test]
    fn test_overflowing_aggregate_index_is_invariant_violation() {
        let dl = DataLayout::default();
        let calc = OffsetCalculator::new(&dl);
        let proc = ProcedureBuilder::new("f", Type::Void).finish();
        let huge = Type::array_of(Type::array_of(Type::i64(), u64::MAX / 8), 4);

        let err = calc.indexed_offset(&proc, &huge, &[u32::MAX]).unwrap_err();
        assert!(matches!(err, DsaError::InvariantViolation { .. }));
    }

    #[test]
    fn test_apply_on_collapsed_base() {
        let mut g = Graph::new("f");
        let base = g.mk_node();
        g.collapse_cell(Cell::new(base, 0));

        let out = OffsetCalculator::apply(&mut g, Cell::new(base, 0), GepOffset { fixed: 16, stride: 0 });
        assert_eq!(out, GepOutcome::BaseCollapsed(Cell::new(base, 0)));
    }
}
