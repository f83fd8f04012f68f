//! Shared module - Common types
//!
//! Types shared by every feature. No analysis logic lives here.

pub mod models;

pub use models::*;
