//! Candle-based embedding implementation for BERT-family models.
//!
//! Serves MiniLM sentence embeddings as well as the CodeBERT family. Vector
//! extraction follows a fixed order, see [`extract_embeddings`].

use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use serde::Deserialize;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::cache::{get_or_download_model, ModelCache, ModelPaths};
use crate::catalog::{BertSpec, Pooling};
use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingModel, ModelInfo};

/// Inputs per forward pass. Attention memory grows with this times the
/// square of the padded window, so larger requests are split.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Fields of `config.json` read outside of candle's own config type.
#[derive(Debug, Deserialize)]
struct ArchitectureHints {
    hidden_size: usize,
    #[serde(default)]
    model_type: Option<String>,
}

/// Raw outputs of one forward pass.
struct ModelOutput {
    pooler_output: Option<Tensor>,
    last_hidden_state: Option<Tensor>,
    attention_mask: Tensor,
    batch_size: usize,
}

/// Candle-based embedder for a BERT-family model.
pub struct CandleEmbedder {
    model: BertModel,
    pooler: Option<Linear>,
    tokenizer: Tokenizer,
    device: Device,
    pooling: Pooling,
    info: ModelInfo,
}

impl CandleEmbedder {
    /// Load the model from cache, downloading it first when allowed.
    pub fn load(
        cache: &ModelCache,
        spec: &BertSpec,
        allow_download: bool,
    ) -> Result<Self, EmbeddingError> {
        let paths = get_or_download_model(cache, allow_download)?;
        Self::load_from_paths(spec, &paths)
    }

    /// Load from explicit file paths
    pub fn load_from_paths(spec: &BertSpec, paths: &ModelPaths) -> Result<Self, EmbeddingError> {
        info!(repo = spec.repo_id, "Loading embedding model...");

        // CPU only; accelerator selection is left to a later feature flag
        let device = Device::Cpu;

        let config_str = std::fs::read_to_string(&paths.config)?;
        let config: BertConfig = serde_json::from_str(&config_str)
            .map_err(|e| EmbeddingError::ModelNotFound(format!("Invalid config: {}", e)))?;
        let hints: ArchitectureHints = serde_json::from_str(&config_str)
            .map_err(|e| EmbeddingError::ModelNotFound(format!("Invalid config: {}", e)))?;

        let tokenizer = Tokenizer::from_file(&paths.tokenizer)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[paths.weights.clone()], DType::F32, &device)?
        };

        let pooler = match spec.pooling {
            Pooling::Pooler => load_pooler(&vb, hints.hidden_size, hints.model_type.as_deref()),
            Pooling::Mean => None,
        };

        let model = BertModel::load(vb, &config)?;

        info!(
            repo = spec.repo_id,
            dim = hints.hidden_size,
            max_seq = spec.max_seq_length,
            pooler = pooler.is_some(),
            "Model loaded successfully"
        );

        Ok(Self {
            model,
            pooler,
            tokenizer,
            device,
            pooling: spec.pooling,
            info: ModelInfo {
                name: spec.repo_id.to_string(),
                dimension: hints.hidden_size,
                max_sequence_length: spec.max_seq_length,
            },
        })
    }

    fn forward(&self, texts: &[&str]) -> Result<ModelOutput, EmbeddingError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        // Pad to same length, truncating anything past the model's window
        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(self.info.max_sequence_length);

        let batch_size = texts.len();
        let mut input_ids: Vec<u32> = Vec::with_capacity(batch_size * max_len);
        let mut attention_masks: Vec<u32> = Vec::with_capacity(batch_size * max_len);

        for encoding in &encodings {
            input_ids.extend(fit_window(encoding.get_ids(), max_len));
            attention_masks.extend(fit_window(encoding.get_attention_mask(), max_len));
        }

        let attention_mask =
            Tensor::from_vec(attention_masks, (batch_size, max_len), &self.device)?;

        if max_len == 0 {
            return Ok(ModelOutput {
                pooler_output: None,
                last_hidden_state: None,
                attention_mask,
                batch_size,
            });
        }

        let input_ids = Tensor::from_vec(input_ids, (batch_size, max_len), &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        let pooler_output = match (&self.pooler, self.pooling) {
            (Some(dense), Pooling::Pooler) => Some(dense.forward(&hidden.i((.., 0))?)?.tanh()?),
            _ => None,
        };

        Ok(ModelOutput {
            pooler_output,
            last_hidden_state: Some(hidden),
            attention_mask,
            batch_size,
        })
    }
}

/// Cut or zero-pad `values` to exactly `len` entries.
///
/// A cut keeps the final entry so the closing special token (`[SEP]`, `</s>`)
/// survives truncation.
fn fit_window(values: &[u32], len: usize) -> Vec<u32> {
    let mut fitted = if values.len() > len && len > 0 {
        let mut head = values[..len - 1].to_vec();
        head.push(values[values.len() - 1]);
        head
    } else {
        values[..values.len().min(len)].to_vec()
    };
    fitted.resize(len, 0);
    fitted
}

/// Run `embed_chunk` over consecutive slices of at most `batch_size` texts.
fn embed_in_chunks<F>(
    texts: &[&str],
    batch_size: usize,
    mut embed_chunk: F,
) -> Result<Vec<Embedding>, EmbeddingError>
where
    F: FnMut(&[&str]) -> Result<Vec<Embedding>, EmbeddingError>,
{
    let mut embeddings = Vec::with_capacity(texts.len());
    for chunk in texts.chunks(batch_size.max(1)) {
        let part = embed_chunk(chunk)?;
        if part.len() != chunk.len() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: chunk.len(),
                actual: part.len(),
            });
        }
        embeddings.extend(part);
    }
    Ok(embeddings)
}

/// Pooler weights live under `pooler.dense` or `<model_type>.pooler.dense`.
fn load_pooler(vb: &VarBuilder<'_>, hidden_size: usize, model_type: Option<&str>) -> Option<Linear> {
    let mut prefixes = vec!["pooler.dense".to_string()];
    if let Some(model_type) = model_type {
        prefixes.push(format!("{model_type}.pooler.dense"));
    }
    prefixes
        .into_iter()
        .find_map(|prefix| candle_nn::linear(hidden_size, hidden_size, vb.pp(prefix)).ok())
}

/// Mean pooling over token embeddings (excluding padding)
fn mean_pooling(embeddings: &Tensor, attention_mask: &Tensor) -> Result<Tensor, EmbeddingError> {
    let mask = attention_mask
        .unsqueeze(2)?
        .broadcast_as(embeddings.shape())?;
    let mask_f32 = mask.to_dtype(DType::F32)?;

    let masked = embeddings.broadcast_mul(&mask_f32)?;
    let sum = masked.sum(1)?;

    // Divide by the number of real tokens
    let mask_sum = mask_f32.sum(1)?;
    let mask_sum = mask_sum.clamp(1e-9, f64::MAX)?;

    Ok(sum.broadcast_div(&mask_sum)?)
}

/// Turn a forward pass into one vector per input.
///
/// Order:
/// 1. pooler output, when the model prefers it and the weights were present;
/// 2. attention-masked mean of the last hidden state;
/// 3. a zero vector of the model dimension.
fn extract_embeddings(
    output: &ModelOutput,
    dimension: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if let Some(pooled) = &output.pooler_output {
        return Ok(pooled.to_vec2()?);
    }
    if let Some(hidden) = &output.last_hidden_state {
        return Ok(mean_pooling(hidden, &output.attention_mask)?.to_vec2()?);
    }
    Ok(vec![vec![0.0; dimension]; output.batch_size])
}

impl EmbeddingModel for CandleEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::DimensionMismatch {
                expected: 1,
                actual: 0,
            })
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!(count = texts.len(), model = %self.info.name, "Embedding batch");

        let embeddings = embed_in_chunks(texts, DEFAULT_BATCH_SIZE, |chunk| {
            let output = self.forward(chunk)?;
            extract_embeddings(&output, self.info.dimension)?
                .into_iter()
                .map(|values| {
                    if values.len() == self.info.dimension {
                        Ok(Embedding::new(values))
                    } else {
                        Err(EmbeddingError::DimensionMismatch {
                            expected: self.info.dimension,
                            actual: values.len(),
                        })
                    }
                })
                .collect()
        })?;

        debug!(
            count = embeddings.len(),
            dim = self.info.dimension,
            "Batch complete"
        );

        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{lookup, ProviderKind, GENERAL_PROVIDER};

    fn general_spec() -> BertSpec {
        match &lookup(GENERAL_PROVIDER).unwrap().kind {
            ProviderKind::Bert(spec) => spec.clone(),
            ProviderKind::Minimal => unreachable!(),
        }
    }

    #[test]
    fn test_extract_prefers_pooler_output() {
        let device = Device::Cpu;
        let output = ModelOutput {
            pooler_output: Some(Tensor::new(&[[1f32, 2.0]], &device).unwrap()),
            last_hidden_state: Some(Tensor::new(&[[[5f32, 5.0]]], &device).unwrap()),
            attention_mask: Tensor::new(&[[1u32]], &device).unwrap(),
            batch_size: 1,
        };
        assert_eq!(extract_embeddings(&output, 2).unwrap(), vec![vec![1.0, 2.0]]);
    }

    #[test]
    fn test_extract_masked_mean_ignores_padding() {
        let device = Device::Cpu;
        let output = ModelOutput {
            pooler_output: None,
            last_hidden_state: Some(
                Tensor::new(&[[[1f32, 3.0], [3.0, 5.0], [100.0, 100.0]]], &device).unwrap(),
            ),
            attention_mask: Tensor::new(&[[1u32, 1, 0]], &device).unwrap(),
            batch_size: 1,
        };
        let vectors = extract_embeddings(&output, 2).unwrap();
        assert!((vectors[0][0] - 2.0).abs() < 1e-5);
        assert!((vectors[0][1] - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_extract_falls_back_to_zero_vectors() {
        let device = Device::Cpu;
        let output = ModelOutput {
            pooler_output: None,
            last_hidden_state: None,
            attention_mask: Tensor::zeros((2, 0), DType::U32, &device).unwrap(),
            batch_size: 2,
        };
        assert_eq!(
            extract_embeddings(&output, 3).unwrap(),
            vec![vec![0.0; 3], vec![0.0; 3]]
        );
    }

    #[test]
    fn test_fit_window_keeps_closing_token() {
        // [CLS] a b c d [SEP]
        let ids = [101, 1, 2, 3, 4, 102];
        assert_eq!(fit_window(&ids, 4), vec![101, 1, 2, 102]);
        assert_eq!(fit_window(&ids, 6), ids.to_vec());
        assert_eq!(fit_window(&ids, 8), vec![101, 1, 2, 3, 4, 102, 0, 0]);
        assert!(fit_window(&ids, 0).is_empty());
    }

    #[test]
    fn test_large_batch_is_split_in_order() {
        let texts: Vec<String> = (0..(DEFAULT_BATCH_SIZE * 2 + 5))
            .map(|i| i.to_string())
            .collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();

        let mut chunk_sizes = Vec::new();
        let embeddings = embed_in_chunks(&refs, DEFAULT_BATCH_SIZE, |chunk| {
            chunk_sizes.push(chunk.len());
            Ok(chunk
                .iter()
                .map(|t| Embedding::from_raw(vec![t.parse::<f32>().unwrap()]))
                .collect())
        })
        .unwrap();

        assert_eq!(chunk_sizes, vec![DEFAULT_BATCH_SIZE, DEFAULT_BATCH_SIZE, 5]);
        assert_eq!(embeddings.len(), refs.len());
        for (i, embedding) in embeddings.iter().enumerate() {
            assert_eq!(embedding.values, vec![i as f32]);
        }
    }

    #[test]
    fn test_short_chunk_result_is_an_error() {
        let err = embed_in_chunks(&["a", "b"], 8, |_| Ok(vec![Embedding::from_raw(vec![0.0])]))
            .unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_load_model() {
        let cache = ModelCache::default();
        let embedder = CandleEmbedder::load(&cache, &general_spec(), true).unwrap();
        assert_eq!(embedder.info().dimension, 384);
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_embed_batch() {
        let cache = ModelCache::default();
        let embedder = CandleEmbedder::load(&cache, &general_spec(), true).unwrap();
        let long = "token ".repeat(2000);
        let texts = vec!["Hello", "World", long.as_str()];
        let embeddings = embedder.embed_batch(&texts).unwrap();
        assert_eq!(embeddings.len(), 3);
        for emb in &embeddings {
            assert_eq!(emb.dimension(), 384);
        }
    }
}
