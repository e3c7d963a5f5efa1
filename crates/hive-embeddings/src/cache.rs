//! On-disk model store.
//!
//! Each Hub repository gets one flat directory under the worker's model
//! cache (`owner/name` becomes `owner_name`). A repository counts as present
//! only when every file in [`MODEL_FILES`] exists; anything less is fetched
//! again, and only when the caller permits network access.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::catalog::GENERAL_PROVIDER;
use crate::error::EmbeddingError;

/// Files a BERT-family provider needs at construction.
pub const MODEL_FILES: &[&str] = &["config.json", "tokenizer.json", "model.safetensors"];

/// Where one repository's files live on disk.
#[derive(Debug, Clone)]
pub struct ModelCache {
    pub cache_dir: PathBuf,
    pub repo_id: String,
}

impl Default for ModelCache {
    /// The general provider under the platform cache directory.
    fn default() -> Self {
        let root = dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".cache"));
        Self::new(root.join("hive").join("models"), GENERAL_PROVIDER)
    }
}

impl ModelCache {
    pub fn new(cache_dir: impl Into<PathBuf>, repo_id: impl Into<String>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            repo_id: repo_id.into(),
        }
    }

    pub fn model_dir(&self) -> PathBuf {
        self.cache_dir.join(self.repo_id.replace('/', "_"))
    }

    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.model_dir().join(filename)
    }

    /// Required files not yet on disk, in [`MODEL_FILES`] order.
    pub fn missing_files(&self) -> Vec<&'static str> {
        let dir = self.model_dir();
        MODEL_FILES
            .iter()
            .copied()
            .filter(|name| !dir.join(name).is_file())
            .collect()
    }

    pub fn is_cached(&self) -> bool {
        self.missing_files().is_empty()
    }
}

/// Resolved locations of a repository's files.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelPaths {
    fn in_dir(dir: &Path) -> Self {
        Self {
            config: dir.join("config.json"),
            tokenizer: dir.join("tokenizer.json"),
            weights: dir.join("model.safetensors"),
        }
    }
}

/// Resolve the repository's files, fetching the missing ones when
/// `allow_download` is set.
pub fn get_or_download_model(
    cache: &ModelCache,
    allow_download: bool,
) -> Result<ModelPaths, EmbeddingError> {
    let missing = cache.missing_files();
    if missing.is_empty() {
        debug!(repo = %cache.repo_id, dir = ?cache.model_dir(), "Model files present");
    } else if allow_download {
        info!(repo = %cache.repo_id, files = ?missing, "Fetching model files");
        fetch_files(cache, &missing)?;
    } else {
        return Err(EmbeddingError::ModelNotFound(format!(
            "{} is missing {} in {} and downloads are disabled",
            cache.repo_id,
            missing.join(", "),
            cache.cache_dir.display()
        )));
    }

    Ok(ModelPaths::in_dir(&cache.model_dir()))
}

#[cfg(feature = "candle")]
fn fetch_files(cache: &ModelCache, files: &[&str]) -> Result<(), EmbeddingError> {
    use hf_hub::api::sync::Api;

    let repo = Api::new()
        .map_err(|e| EmbeddingError::Download(e.to_string()))?
        .model(cache.repo_id.clone());

    std::fs::create_dir_all(cache.model_dir())?;
    for name in files {
        let fetched = repo
            .get(name)
            .map_err(|e| EmbeddingError::Download(format!("{}/{name}: {e}", cache.repo_id)))?;
        let target = cache.file_path(name);
        std::fs::copy(&fetched, &target)?;
        debug!(file = name, target = ?target, "Stored model file");
    }
    Ok(())
}

#[cfg(not(feature = "candle"))]
fn fetch_files(cache: &ModelCache, _files: &[&str]) -> Result<(), EmbeddingError> {
    Err(EmbeddingError::Unavailable(format!(
        "cannot download {}: built without the candle feature",
        cache.repo_id
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with(files: &[&str]) -> (TempDir, ModelCache) {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::new(temp.path(), "acme/tiny-bert");
        std::fs::create_dir_all(cache.model_dir()).unwrap();
        for name in files {
            std::fs::write(cache.file_path(name), b"{}").unwrap();
        }
        (temp, cache)
    }

    #[test]
    fn test_default_store_serves_general_provider() {
        let cache = ModelCache::default();
        assert!(cache.cache_dir.ends_with("hive/models"));
        assert_eq!(cache.repo_id, GENERAL_PROVIDER);
    }

    #[test]
    fn test_repo_id_maps_to_flat_directory() {
        let cache = ModelCache::new("/var/models", "microsoft/codebert-base");
        assert_eq!(
            cache.model_dir(),
            PathBuf::from("/var/models/microsoft_codebert-base")
        );
    }

    #[test]
    fn test_partial_download_is_not_cached() {
        let (_temp, cache) = store_with(&["config.json", "tokenizer.json"]);
        assert!(!cache.is_cached());
        assert_eq!(cache.missing_files(), vec!["model.safetensors"]);
    }

    #[test]
    fn test_complete_store_resolves_without_network() {
        let (_temp, cache) = store_with(MODEL_FILES);
        assert!(cache.is_cached());

        let paths = get_or_download_model(&cache, false).unwrap();
        assert_eq!(paths.config, cache.file_path("config.json"));
        assert_eq!(paths.weights, cache.file_path("model.safetensors"));
    }

    #[test]
    fn test_missing_files_are_named_when_downloads_are_off() {
        let (_temp, cache) = store_with(&["config.json"]);

        let err = get_or_download_model(&cache, false).unwrap_err();
        assert!(matches!(err, EmbeddingError::ModelNotFound(_)));
        let message = err.to_string();
        assert!(message.contains("tokenizer.json, model.safetensors"), "{message}");
        assert!(message.contains("acme/tiny-bert"), "{message}");
    }
}
