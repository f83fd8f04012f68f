//! Local DSA configuration

use super::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Allocator names recognized when no list is configured
pub const DEFAULT_ALLOCATION_FUNCTIONS: &[&str] = &[
    "malloc",
    "calloc",
    "realloc",
    "aligned_alloc",
    "valloc",
    "strdup",
    "strndup",
    "_Znwm",
    "_Znam",
    "_Znwj",
    "_Znaj",
];

const MAX_WORKERS: usize = 1024;

/// Local DSA configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DsaConfig {
    /// Target pointer width (32 or 64)
    pub pointer_width_bits: u32,

    /// Callees whose result is a fresh heap object
    pub allocation_functions: Vec<String>,

    /// Analyze procedures of a module on a worker pool
    pub parallel: bool,

    /// Worker count (None = number of CPUs)
    pub num_workers: Option<usize>,

    /// Log every finished graph at debug level
    pub dump_graphs: bool,

    /// Log precision losses (collapses, arrays, skipped null accesses)
    pub precision_diagnostics: bool,
}

impl Default for DsaConfig {
    fn default() -> Self {
        Self {
            pointer_width_bits: 64,
            allocation_functions: DEFAULT_ALLOCATION_FUNCTIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            parallel: true,
            num_workers: None,
            dump_graphs: false,
            precision_diagnostics: false,
        }
    }
}

impl DsaConfig {
    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.pointer_width_bits != 32 && self.pointer_width_bits != 64 {
            return Err(ConfigError::Validation(format!(
                "pointer_width_bits must be 32 or 64, got {}",
                self.pointer_width_bits
            )));
        }

        if let Some(n) = self.num_workers {
            if n == 0 || n > MAX_WORKERS {
                return Err(ConfigError::range_with_hint(
                    "num_workers",
                    n,
                    1,
                    MAX_WORKERS,
                    "Use None to size the pool by CPU count",
                ));
            }
        }

        if let Some(name) = self.allocation_functions.iter().find(|f| f.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "allocation_functions contains an empty name ({:?})",
                name
            )));
        }

        Ok(())
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Builder: Set pointer_width_bits
    pub fn pointer_width_bits(mut self, v: u32) -> Self {
        self.pointer_width_bits = v;
        self
    }

    /// Builder: Replace allocation_functions
    pub fn allocation_functions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allocation_functions = names.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: Add one allocation function
    pub fn with_allocation_function(mut self, name: impl Into<String>) -> Self {
        self.allocation_functions.push(name.into());
        self
    }

    /// Builder: Set parallel
    pub fn parallel(mut self, v: bool) -> Self {
        self.parallel = v;
        self
    }

    /// Builder: Set num_workers
    pub fn num_workers(mut self, v: Option<usize>) -> Self {
        self.num_workers = v;
        self
    }

    /// Builder: Set dump_graphs
    pub fn dump_graphs(mut self, v: bool) -> Self {
        self.dump_graphs = v;
        self
    }

    /// Builder: Set precision_diagnostics
    pub fn precision_diagnostics(mut self, v: bool) -> Self {
        self.precision_diagnostics = v;
        self
    }

    /// Worker count actually used
    pub fn effective_workers(&self) -> usize {
        self.num_workers.unwrap_or_else(num_cpus::get).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = DsaConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pointer_width_bits, 64);
        assert!(config.allocation_functions.iter().any(|f| f == "malloc"));
    }

    #[test]
    fn test_builder() {
        let config = DsaConfig::default()
            .pointer_width_bits(32)
            .parallel(false)
            .num_workers(Some(4))
            .with_allocation_function("xmalloc");
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_workers(), 4);
        assert!(config.allocation_functions.contains(&"xmalloc".to_string()));
    }

    #[test]
    fn test_invalid_pointer_width() {
        let config = DsaConfig::default().pointer_width_bits(16);
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = DsaConfig::default().num_workers(Some(0));
        assert!(matches!(config.validate(), Err(ConfigError::Range { .. })));
    }
}
