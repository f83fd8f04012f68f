//! Allocation-function recognizer by callee name

use crate::config::DsaConfig;
use crate::features::local_dsa::ports::AllocationRecognizer;
use crate::shared::models::{Callee, InstKind, Procedure, ValueId, ValueKind};
use rustc_hash::FxHashSet;

/// Treats calls to a fixed set of function names as heap allocations
///
/// Calls through a pointer count when the pointer is the address of one of
/// those functions.
#[derive(Debug, Clone, Default)]
pub struct NamedAllocationRecognizer {
    names: FxHashSet<String>,
}

impl NamedAllocationRecognizer {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &DsaConfig) -> Self {
        Self::new(config.allocation_functions.iter().cloned())
    }

    pub fn is_allocator(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    fn callee_name<'p>(proc: &'p Procedure, callee: &'p Callee) -> Option<&'p str> {
        match callee {
            Callee::Direct(name) => Some(name.as_str()),
            Callee::Indirect(target) => match &proc.value(*target).kind {
                ValueKind::Function { name } => Some(name.as_str()),
                _ => None,
            },
            Callee::InlineAsm => None,
        }
    }
}

impl AllocationRecognizer for NamedAllocationRecognizer {
    fn is_allocation_call(&self, proc: &Procedure, call: ValueId) -> bool {
        match proc.instruction(call).map(|i| &i.kind) {
            Some(InstKind::Call { callee, .. }) => Self::callee_name(proc, callee)
                .map(|name| self.is_allocator(name))
                .unwrap_or(false),
            _ => false,
        }
    }
}
