//! First-class types of the lowered procedure IR
//!
//! Pointers are opaque: indexed accesses carry the element type they step
//! over, so the pointer type itself never needs a pointee.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structural (struct) type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StructType {
    /// Optional nominal name (`%struct.list`)
    pub name: Option<String>,

    /// Field types in declaration order
    pub fields: Vec<Type>,

    /// Packed structs have no inter-field padding
    pub packed: bool,
}

impl StructType {
    pub fn new(fields: Vec<Type>) -> Self {
        Self {
            name: None,
            fields,
            packed: false,
        }
    }

    pub fn named(name: impl Into<String>, fields: Vec<Type>) -> Self {
        Self {
            name: Some(name.into()),
            fields,
            packed: false,
        }
    }

    pub fn packed(mut self) -> Self {
        self.packed = true;
        self
    }

    #[inline]
    pub fn field(&self, index: u32) -> Option<&Type> {
        self.fields.get(index as usize)
    }
}

/// Value type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Type {
    Void,

    /// Integer of the given bit width
    Int(u32),

    /// Floating point of the given bit width
    Float(u32),

    /// Opaque pointer
    Ptr,

    Struct(StructType),

    /// `[N x T]`
    Array(Box<Type>, u64),

    /// `<N x T>`
    Vector(Box<Type>, u64),

    /// Code label / function type (never stored)
    Label,
}

impl Type {
    #[inline]
    pub fn i1() -> Self {
        Type::Int(1)
    }

    #[inline]
    pub fn i8() -> Self {
        Type::Int(8)
    }

    #[inline]
    pub fn i32() -> Self {
        Type::Int(32)
    }

    #[inline]
    pub fn i64() -> Self {
        Type::Int(64)
    }

    #[inline]
    pub fn ptr() -> Self {
        Type::Ptr
    }

    pub fn struct_of(fields: Vec<Type>) -> Self {
        Type::Struct(StructType::new(fields))
    }

    pub fn array_of(element: Type, len: u64) -> Self {
        Type::Array(Box::new(element), len)
    }

    pub fn vector_of(element: Type, len: u64) -> Self {
        Type::Vector(Box::new(element), len)
    }

    #[inline]
    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Ptr)
    }

    /// Struct or array (vectors are first-class values, not aggregates)
    #[inline]
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Type::Struct(_) | Type::Array(..))
    }

    /// Values of tracked types get cells in the memory graph
    #[inline]
    pub fn is_tracked(&self) -> bool {
        self.is_pointer() || self.is_aggregate()
    }

    /// Element type of arrays and vectors
    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::Array(elem, _) | Type::Vector(elem, _) => Some(elem),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int(bits) => write!(f, "i{}", bits),
            Type::Float(32) => write!(f, "float"),
            Type::Float(64) => write!(f, "double"),
            Type::Float(bits) => write!(f, "f{}", bits),
            Type::Ptr => write!(f, "ptr"),
            Type::Struct(st) => {
                if let Some(ref name) = st.name {
                    return write!(f, "%{}", name);
                }
                let open = if st.packed { "<{" } else { "{" };
                let close = if st.packed { "}>" } else { "}" };
                write!(f, "{}", open)?;
                for (i, field) in st.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, "{}", close)
            }
            Type::Array(elem, len) => write!(f, "[{} x {}]", len, elem),
            Type::Vector(elem, len) => write!(f, "<{} x {}>", len, elem),
            Type::Label => write!(f, "label"),
        }
    }
}
