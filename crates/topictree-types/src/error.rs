//! Error types shared across the topictree workspace.

use thiserror::Error;

/// Errors raised while building term records or loading settings.
#[derive(Debug, Error)]
pub enum TopicTreeError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
