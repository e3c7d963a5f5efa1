//! # hive-embeddings
//!
//! Embedding providers for the Hive model worker.
//!
//! ## Features
//! - `EmbeddingModel` trait: a batch of strings in, one fixed-length vector per string out
//! - `MinimalEmbedder`: deterministic heuristic provider with no model files
//! - `CandleEmbedder`: local BERT-family inference via Candle (`candle` feature, default on)
//! - `ProviderRegistry`: lazy, cached provider construction with fallback chains

pub mod cache;
#[cfg(feature = "candle")]
pub mod candle;
pub mod catalog;
pub mod error;
pub mod loader;
pub mod minimal;
pub mod model;
pub mod registry;

#[cfg(feature = "candle")]
pub use crate::candle::CandleEmbedder;
pub use cache::{get_or_download_model, ModelCache, ModelPaths, MODEL_FILES};
pub use catalog::{
    catalog, default_analyze_provider, default_embed_provider, lookup, BertSpec, Pooling,
    ProviderKind, ProviderSpec, CODE_PROVIDER, GENERAL_PROVIDER,
};
pub use error::EmbeddingError;
pub use loader::{full_providers_compiled, CatalogLoader, ProviderLoader};
pub use minimal::{MinimalEmbedder, MINIMAL_DIM, MINIMAL_PROVIDER};
pub use model::{Embedding, EmbeddingModel, ModelInfo};
pub use registry::{LoadedProvider, ProviderRegistry, ProviderStatus};
