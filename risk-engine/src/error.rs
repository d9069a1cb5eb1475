//! Error types for risk engine

use thiserror::Error;

/// Risk engine error
#[derive(Debug, Error)]
pub enum Error {
    /// ML model error
    #[error("ML model error: {0}")]
    ModelError(String),

    /// Rule definition is unusable
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// Rule store unreachable
    #[error("Rule store error: {0}")]
    RuleStore(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
