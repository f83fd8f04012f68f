//! Abstract memory node

use super::cell::Cell;
use crate::shared::models::{Type, ValueId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Index of a node in its graph's arena
pub type NodeId = u32;

/// Memory-kind and access flags of a node
///
/// Flags never influence soundness. They are unioned whenever nodes merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeFlags {
    /// Stack allocation (`alloca`)
    pub stack: bool,
    /// Heap allocation (recognized allocator call)
    pub heap: bool,
    /// Global variable or function address
    pub global: bool,
    /// Returned by an unanalyzed call
    pub external: bool,
    pub read: bool,
    pub modified: bool,
    /// Created from an integer
    pub int_to_ptr: bool,
    /// Address escapes into an integer
    pub ptr_to_int: bool,
}

impl NodeFlags {
    pub fn union(&mut self, other: NodeFlags) {
        self.stack |= other.stack;
        self.heap |= other.heap;
        self.global |= other.global;
        self.external |= other.external;
        self.read |= other.read;
        self.modified |= other.modified;
        self.int_to_ptr |= other.int_to_ptr;
        self.ptr_to_int |= other.ptr_to_int;
    }
}

impl fmt::Display for NodeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letters = [
            (self.stack, 'S'),
            (self.heap, 'H'),
            (self.global, 'G'),
            (self.external, 'E'),
            (self.read, 'R'),
            (self.modified, 'M'),
            (self.int_to_ptr, 'I'),
            (self.ptr_to_int, 'P'),
        ];
        for (set, letter) in letters {
            if set {
                write!(f, "{}", letter)?;
            }
        }
        Ok(())
    }
}

/// Abstract memory object
///
/// A node is either a *root* (canonical representative) or forwards to a
/// parent with a byte displacement. Only roots carry meaningful links,
/// types, size, flags and allocation sites; forwarded nodes are emptied when
/// they are absorbed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub(super) id: NodeId,

    /// Union-find parent (`None` for roots)
    pub(super) parent: Option<NodeId>,

    /// `(self, o)` designates `(parent, o + parent_offset)`
    pub(super) parent_offset: u64,

    pub(super) collapsed: bool,

    pub(super) array_stride: Option<u64>,

    /// Lower bound on the number of bytes accessed
    pub(super) size: u64,

    /// Accessed types per offset
    pub(super) types: BTreeMap<u64, BTreeSet<Type>>,

    /// Pointer stored at offset → cell it may point to
    pub(super) links: BTreeMap<u64, Cell>,

    pub(super) flags: NodeFlags,

    /// Allocation instructions folded into this node
    pub(super) alloc_sites: BTreeSet<ValueId>,
}

impl Node {
    pub(super) fn new(id: NodeId) -> Self {
        Self {
            id,
            parent: None,
            parent_offset: 0,
            collapsed: false,
            array_stride: None,
            size: 0,
            types: BTreeMap::new(),
            links: BTreeMap::new(),
            flags: NodeFlags::default(),
            alloc_sites: BTreeSet::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// True for canonical representatives
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    #[inline]
    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    /// Stride of an array abstraction (irrelevant once collapsed)
    #[inline]
    pub fn array_stride(&self) -> Option<u64> {
        if self.collapsed {
            None
        } else {
            self.array_stride
        }
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        self.array_stride().is_some()
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    #[inline]
    pub fn allocation_sites(&self) -> &BTreeSet<ValueId> {
        &self.alloc_sites
    }

    /// Types accessed at `offset` (normalized by collapse/stride)
    pub fn types_at(&self, offset: u64) -> Option<&BTreeSet<Type>> {
        self.types.get(&self.normalize(offset))
    }

    #[inline]
    pub fn types(&self) -> &BTreeMap<u64, BTreeSet<Type>> {
        &self.types
    }

    /// Raw (unresolved) outgoing links
    #[inline]
    pub fn links(&self) -> &BTreeMap<u64, Cell> {
        &self.links
    }

    /// Raw link at `offset` (normalized by collapse/stride)
    #[inline]
    pub fn link_at(&self, offset: u64) -> Option<Cell> {
        self.links.get(&self.normalize(offset)).copied()
    }

    /// Map a byte offset onto the slot that represents it
    #[inline]
    pub fn normalize(&self, offset: u64) -> u64 {
        if self.collapsed {
            0
        } else if let Some(stride) = self.array_stride {
            offset % stride
        } else {
            offset
        }
    }
}
