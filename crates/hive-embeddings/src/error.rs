//! Embedding error types.

use thiserror::Error;

/// Errors that can occur while constructing providers or embedding text.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Candle model error
    #[cfg(feature = "candle")]
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    /// Tokenizer error
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Model file not found
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    /// Download error
    #[error("Failed to download model: {0}")]
    Download(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Name is not in the provider catalog
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// Provider cannot run in this build or mode
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Provider construction panicked
    #[error("Provider construction panicked: {0}")]
    Panicked(String),

    /// Provider construction failed (possibly after its fallback also failed)
    #[error("Failed to load provider {name}: {reason}")]
    ProviderLoad { name: String, reason: String },

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}
