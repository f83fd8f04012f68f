//! Data layout with natural alignment
//!
//! Every scalar is aligned to its own size (rounded up to a power of two),
//! structs to their most aligned field, arrays to their element. Packed
//! structs have no padding at all.

use crate::config::DsaConfig;
use crate::features::local_dsa::ports::LayoutOracle;
use crate::shared::models::{StructType, Type};

/// Field offsets and total size of one struct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    pub offsets: Vec<u64>,
    pub size: u64,
    pub align: u64,
}

/// Target data layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataLayout {
    pointer_width_bits: u32,
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::new(64)
    }
}

impl DataLayout {
    pub fn new(pointer_width_bits: u32) -> Self {
        Self { pointer_width_bits }
    }

    pub fn from_config(config: &DsaConfig) -> Self {
        Self::new(config.pointer_width_bits)
    }

    #[inline]
    fn pointer_bytes(&self) -> u64 {
        u64::from(self.pointer_width_bits).div_ceil(8)
    }

    /// ABI alignment of `ty`
    pub fn align_of(&self, ty: &Type) -> u64 {
        match ty {
            Type::Void | Type::Label => 1,
            Type::Int(bits) | Type::Float(bits) => {
                u64::from(*bits).div_ceil(8).next_power_of_two().min(16)
            }
            Type::Ptr => self.pointer_bytes(),
            Type::Struct(st) => self.struct_layout(st).align,
            Type::Array(elem, _) => self.align_of(elem),
            Type::Vector(elem, len) => self
                .store_size(elem)
                .saturating_mul(*len)
                .checked_next_power_of_two()
                .unwrap_or(1 << 63)
                .max(1),
        }
    }

    pub fn struct_layout(&self, st: &StructType) -> StructLayout {
        let mut offsets = Vec::with_capacity(st.fields.len());
        let mut offset = 0u64;
        let mut align = 1u64;
        for field in &st.fields {
            if !st.packed {
                let field_align = self.align_of(field);
                align = align.max(field_align);
                offset = round_up(offset, field_align);
            }
            offsets.push(offset);
            offset = offset.saturating_add(self.alloc_size(field));
        }
        StructLayout {
            offsets,
            size: round_up(offset, align),
            align,
        }
    }
}

/// Sizes saturate at `u64::MAX` instead of wrapping
fn round_up(value: u64, align: u64) -> u64 {
    value.checked_next_multiple_of(align).unwrap_or(u64::MAX)
}

impl LayoutOracle for DataLayout {
    fn field_offset(&self, st: &StructType, index: u32) -> u64 {
        let layout = self.struct_layout(st);
        layout
            .offsets
            .get(index as usize)
            .copied()
            .unwrap_or(layout.size)
    }

    fn store_size(&self, ty: &Type) -> u64 {
        match ty {
            Type::Void | Type::Label => 0,
            Type::Int(bits) | Type::Float(bits) => u64::from(*bits).div_ceil(8),
            Type::Ptr => self.pointer_bytes(),
            Type::Struct(st) => self.struct_layout(st).size,
            Type::Array(elem, len) => self.alloc_size(elem).saturating_mul(*len),
            Type::Vector(elem, len) => self.store_size(elem).saturating_mul(*len),
        }
    }

    fn alloc_size(&self, ty: &Type) -> u64 {
        round_up(self.store_size(ty), self.align_of(ty))
    }

    fn pointer_width_bits(&self) -> u32 {
        self.pointer_width_bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_sizes() {
        let dl = DataLayout::default();
        assert_eq!(dl.store_size(&Type::i1()), 1);
        assert_eq!(dl.store_size(&Type::i32()), 4);
        assert_eq!(dl.store_size(&Type::ptr()), 8);
        assert_eq!(dl.store_size(&Type::Int(24)), 3);
        assert_eq!(dl.alloc_size(&Type::Int(24)), 4);
        assert_eq!(DataLayout::new(32).store_size(&Type::ptr()), 4);
    }

    #[test]
    fn test_struct_padding() {
        let dl = DataLayout::default();
        let st = StructType::new(vec![Type::i8(), Type::i32(), Type::ptr()]);
        assert_eq!(dl.field_offset(&st, 0), 0);
        assert_eq!(dl.field_offset(&st, 1), 4);
        assert_eq!(dl.field_offset(&st, 2), 8);
        assert_eq!(dl.store_size(&Type::Struct(st)), 16);

        let tail = StructType::new(vec![Type::ptr(), Type::i8()]);
        assert_eq!(dl.store_size(&Type::Struct(tail)), 16);
    }

    #[test]
    fn test_packed_struct() {
        let dl = DataLayout::default();
        let st = StructType::new(vec![Type::i8(), Type::i32()]).packed();
        assert_eq!(dl.field_offset(&st, 1), 1);
        assert_eq!(dl.store_size(&Type::Struct(st)), 5);
    }

    #[test]
    fn test_arrays() {
        let dl = DataLayout::default();
        let pair = Type::struct_of(vec![Type::i32(), Type::i32()]);
        assert_eq!(dl.store_size(&Type::array_of(pair, 10)), 80);
        assert_eq!(dl.store_size(&Type::array_of(Type::i8(), 3)), 3);
    }

    #[test]
    fn test_huge_aggregates_saturate() {
        let dl = DataLayout::default();
        let huge = Type::array_of(Type::i64(), u64::MAX / 4);
        assert_eq!(dl.store_size(&huge), u64::MAX);
        assert_eq!(dl.alloc_size(&huge), u64::MAX);
        let st = StructType::new(vec![huge, Type::i32()]);
        assert_eq!(dl.field_offset(&st, 1), u64::MAX);
    }
}
