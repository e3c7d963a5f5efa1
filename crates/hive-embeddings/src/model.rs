//! Embedding model trait and types.
//!
//! Defines the interface every provider implements to turn text into
//! fixed-length vectors.

use crate::error::EmbeddingError;

/// Vector embedding for one input string.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    /// Create a new embedding from a vector, normalized to unit length.
    /// Zero vectors are kept as-is.
    pub fn new(values: Vec<f32>) -> Self {
        let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
        let normalized = if norm > 0.0 {
            values.iter().map(|x| x / norm).collect()
        } else {
            values
        };
        Self { values: normalized }
    }

    /// Create an embedding without normalization.
    pub fn from_raw(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Get the embedding dimension
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }
}

/// Model information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    /// Provider name (e.g., "all-MiniLM-L6-v2", "minimal")
    pub name: String,
    /// Embedding dimension
    pub dimension: usize,
    /// Longest input the provider consumes before truncating (tokens or characters)
    pub max_sequence_length: usize,
}

/// Trait for embedding providers.
///
/// Implementations must be thread-safe (Send + Sync): the service runs each
/// request on a blocking task. Every returned embedding has `info().dimension`
/// components regardless of input length; over-long inputs are truncated.
pub trait EmbeddingModel: Send + Sync {
    /// Get model information
    fn info(&self) -> &ModelInfo;

    /// Generate embedding for a single text.
    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// Generate embeddings for multiple texts, one per input, in input order.
    /// Default implementation calls embed() for each text.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// Generate embeddings for multiple owned strings.
    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        self.embed_batch(&refs)
    }
}
