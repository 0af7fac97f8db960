//! Error types for the DeepRelease pipeline
//!
//! This module provides comprehensive error handling using thiserror for
//! structured error definitions and anyhow for error propagation.
//!
//! Structural failures (missing artifacts, corrupted vocabulary, id-space
//! violations) propagate with `?` and abort a run. Per-item failures such as a
//! single unparseable classifier label are reported through the same enum but
//! are caught and logged by the caller.

use thiserror::Error;

/// Main error type for DeepRelease operations
#[derive(Error, Debug)]
pub enum DeepReleaseError {
    /// Configuration value rejected by validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Layered configuration (file + environment) failed to load
    #[error("Failed to load layered config: {0}")]
    ConfigLayer(#[from] config::ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Binary artifact could not be encoded or decoded
    #[error("Artifact encoding error: {0}")]
    Artifact(#[from] bincode::Error),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Hosting API returned an error payload or a non-success status
    #[error("Hosting API error: {0}")]
    HostingApi(String),

    /// Vocabulary file is missing entries or is not a bijection
    #[error("Vocabulary error: {0}")]
    Vocabulary(String),

    /// Output id resolves to neither the vocabulary nor the article OOV list
    #[error(
        "Model produced word id {id} which corresponds to article OOV {oov_index} \
         but this example only has {oov_count} article OOVs (vocabulary size {vocab_size})"
    )]
    InvalidWordId {
        id: usize,
        oov_index: usize,
        oov_count: usize,
        vocab_size: usize,
    },

    /// Network weights are missing, unreadable, or inconsistent with the parameters
    #[error("Model error: {0}")]
    Model(String),

    /// Artifact loading still failed after exhausting the retry policy
    #[error("Failed to load {what} after {attempts} attempts: {reason}")]
    ModelLoad {
        what: String,
        attempts: u32,
        reason: String,
    },

    /// Tensor shapes disagree inside the numeric pipeline
    #[error("Shape mismatch: {0}")]
    Shape(String),

    /// Classifier could not produce a usable label
    #[error("Classification error: {0}")]
    Classification(String),

    /// Entries and categories do not line up by identifier
    #[error("Entries and categories are misaligned: {0}")]
    Alignment(String),

    /// Not a pull request URL
    #[error("Invalid pull request URL: {0}")]
    InvalidUrl(String),

    /// Not a YYYYMMDDHHMM date
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for DeepRelease operations
pub type Result<T> = std::result::Result<T, DeepReleaseError>;

/// Convert anyhow::Error to DeepReleaseError
impl From<anyhow::Error> for DeepReleaseError {
    fn from(err: anyhow::Error) -> Self {
        DeepReleaseError::Other(err.to_string())
    }
}
