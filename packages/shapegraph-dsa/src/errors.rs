//! Error types for shapegraph-dsa
//!
//! Imprecision is never an error: collapsing a node or skipping an unmodeled
//! value is a normal outcome. Errors are reserved for broken contracts
//! between the IR supplier and the analysis, and for service failures.

use crate::config::ConfigError;
use thiserror::Error;

/// Main error type for shapegraph-dsa operations
#[derive(Debug, Error)]
pub enum DsaError {
    /// Input IR violates a contract the analysis relies on
    #[error("Invariant violation in @{procedure}: {message}")]
    InvariantViolation { procedure: String, message: String },

    /// No graph was published for the procedure
    #[error("No graph for procedure '{0}'")]
    GraphNotFound(String),

    /// A graph for the procedure was already published
    #[error("Graph for procedure '{0}' already published")]
    DuplicateGraph(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker pool could not be built
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// Graph export failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DsaError {
    /// Create an invariant violation for `procedure`
    pub fn invariant(procedure: impl Into<String>, message: impl Into<String>) -> Self {
        DsaError::InvariantViolation {
            procedure: procedure.into(),
            message: message.into(),
        }
    }

    /// Procedure the error is attributed to, if any
    pub fn procedure(&self) -> Option<&str> {
        match self {
            DsaError::InvariantViolation { procedure, .. }
            | DsaError::GraphNotFound(procedure)
            | DsaError::DuplicateGraph(procedure) => Some(procedure),
            _ => None,
        }
    }
}

/// Result type alias for shapegraph-dsa operations
pub type Result<T> = std::result::Result<T, DsaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invariant_message() {
        let err = DsaError::invariant("main", "phi %3 has no cell");
        assert_eq!(err.to_string(), "Invariant violation in @main: phi %3 has no cell");
        assert_eq!(err.procedure(), Some("main"));
    }

    #[test]
    fn test_config_conversion() {
        let err: DsaError = ConfigError::Validation("bad".to_string()).into();
        assert!(matches!(err, DsaError::Config(_)));
        assert_eq!(err.procedure(), None);
    }
}
