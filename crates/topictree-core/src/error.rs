//! Tree engine error types.

use thiserror::Error;

use topictree_types::TopicTreeError;

/// Errors that can occur while building a topic tree.
#[derive(Debug, Error)]
pub enum TreeError {
    /// Taxonomy lookup failed for a term
    #[error("Taxonomy lookup failed for '{term}': {reason}")]
    Lookup { term: String, reason: String },

    /// Taxonomy lookup did not finish in time
    #[error("Taxonomy lookup for '{0}' timed out")]
    LookupTimeout(String),

    /// Hypernym walk revisited a sense
    #[error("Taxonomy cycle detected at sense '{sense}' while resolving '{term}'")]
    TaxonomyCycle { term: String, sense: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed TEI XML
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Error from the shared types crate
    #[error(transparent)]
    Types(#[from] TopicTreeError),
}
