//! Provider construction.
//!
//! One construction path per [`ProviderKind`]. The registry goes through the
//! [`ProviderLoader`] trait so tests can observe or fail constructions.

use std::path::PathBuf;
use std::sync::Arc;

use hive_types::Settings;

use crate::catalog::{BertSpec, ProviderKind};
use crate::error::EmbeddingError;
use crate::minimal::MinimalEmbedder;
use crate::model::EmbeddingModel;

/// Whether this build can construct real (Candle) providers.
pub fn full_providers_compiled() -> bool {
    cfg!(feature = "candle")
}

/// Constructs provider handles.
pub trait ProviderLoader: Send + Sync {
    fn load(&self, kind: &ProviderKind) -> Result<Arc<dyn EmbeddingModel>, EmbeddingError>;
}

/// Loader backed by the model file cache.
#[derive(Debug, Clone)]
pub struct CatalogLoader {
    cache_dir: PathBuf,
    allow_download: bool,
    max_input_chars: usize,
}

impl CatalogLoader {
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        allow_download: bool,
        max_input_chars: usize,
    ) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            allow_download,
            max_input_chars,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.expanded_cache_dir(),
            settings.allow_download,
            settings.limits.max_input_chars,
        )
    }

    #[cfg(feature = "candle")]
    fn load_bert(&self, spec: &BertSpec) -> Result<Arc<dyn EmbeddingModel>, EmbeddingError> {
        use crate::cache::ModelCache;
        use crate::candle::CandleEmbedder;

        let cache = ModelCache::new(&self.cache_dir, spec.repo_id);
        let embedder = CandleEmbedder::load(&cache, spec, self.allow_download)?;
        Ok(Arc::new(embedder))
    }

    #[cfg(not(feature = "candle"))]
    fn load_bert(&self, spec: &BertSpec) -> Result<Arc<dyn EmbeddingModel>, EmbeddingError> {
        Err(EmbeddingError::Unavailable(format!(
            "{} needs the candle feature",
            spec.repo_id
        )))
    }
}

impl ProviderLoader for CatalogLoader {
    fn load(&self, kind: &ProviderKind) -> Result<Arc<dyn EmbeddingModel>, EmbeddingError> {
        match kind {
            ProviderKind::Minimal => Ok(Arc::new(MinimalEmbedder::new(self.max_input_chars))),
            ProviderKind::Bert(spec) => self.load_bert(spec),
        }
    }
}
