//! Feature modules - each follows Hexagonal Architecture
//!
//! - domain/         - graph model (no external dependencies)
//! - ports/          - interface definitions (traits)
//! - application/    - use cases
//! - infrastructure/ - layout, CFG ordering, allocator recognition

pub mod local_dsa;
