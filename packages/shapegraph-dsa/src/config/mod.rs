//! Configuration
//!
//! ```rust
//! use shapegraph_dsa::config::DsaConfig;
//!
//! let config = DsaConfig::from_yaml_str("pointer_width_bits: 32\nparallel: false\n")?;
//! assert_eq!(config.pointer_width_bits, 32);
//! # Ok::<(), shapegraph_dsa::config::ConfigError>(())
//! ```

pub mod dsa_config;
pub mod error;

pub use dsa_config::{DsaConfig, DEFAULT_ALLOCATION_FUNCTIONS};
pub use error::{ConfigError, ConfigResult};
