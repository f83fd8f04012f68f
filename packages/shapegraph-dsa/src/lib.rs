/*
 * Shapegraph DSA - intraprocedural heap-shape analysis
 *
 * Feature-First Hexagonal Architecture:
 * - shared/   : IR model (types, values, procedures, modules)
 * - features/ : local_dsa (memory graph construction)
 * - config/   : analysis configuration (YAML)
 * - errors    : crate error type
 */

#![allow(clippy::module_inception)]
#![allow(clippy::new_without_default)]
#![allow(clippy::unnecessary_map_or)] // map_or style for compatibility

/// IR model shared by every feature
pub mod shared;

/// Feature modules
pub mod features;

/// Configuration system
pub mod config;

/// Error types
pub mod errors;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for Public API
// ═══════════════════════════════════════════════════════════════════════════

pub use config::DsaConfig;
pub use errors::{DsaError, Result};
pub use features::local_dsa::{Cell, Graph, GraphStore, LocalDsa, ShapeGraphProvider};
