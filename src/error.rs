//! Crate-level error types

use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, VerificationError>;

/// Top-level error wrapping the per-module failure modes
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Invalid claim: {0}")]
    InvalidClaim(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] crate::cache::CacheError),

    #[error("LLM error: {0}")]
    Llm(#[from] crate::llm::LlmError),

    #[error("Search error: {0}")]
    Search(#[from] crate::search::SearchError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
