//! Dependency-free heuristic embedder.
//!
//! Always constructible. Produces a deterministic 384-dimensional vector from
//! surface features of the text: a signed feature-hashing projection of its
//! tokens, scaled so its squared norm is `HASH_ENERGY * ln(1 + unique tokens)`,
//! followed by eight surface statistics in `[0, 1]`. Component variance grows
//! slowly with vocabulary size: a one-liner and a thousand-identifier module
//! land far apart, which is what the analyzer heuristics key on.

use std::collections::HashSet;

use tracing::debug;

use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingModel, ModelInfo};

/// Registry name of the heuristic provider.
pub const MINIMAL_PROVIDER: &str = "minimal";

/// Embedding dimension of the heuristic provider.
pub const MINIMAL_DIM: usize = 384;

const STAT_DIMS: usize = 8;
const HASH_DIMS: usize = MINIMAL_DIM - STAT_DIMS;

/// Squared norm of the hashed block per unit of `ln(1 + unique tokens)`.
/// Around a thousand distinct identifiers approach the default quality ceiling.
const HASH_ENERGY: f32 = 0.35;

const BRANCH_KEYWORDS: &[&str] = &[
    "if", "else", "elif", "for", "while", "loop", "match", "case", "switch", "catch", "except",
    "when", "and", "or",
];

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn ratio(part: usize, whole: usize) -> f32 {
    if whole == 0 {
        0.0
    } else {
        part as f32 / whole as f32
    }
}

/// Heuristic embedder with no external model.
#[derive(Debug, Clone)]
pub struct MinimalEmbedder {
    info: ModelInfo,
}

impl MinimalEmbedder {
    /// Create an embedder that truncates inputs to `max_input_chars` characters.
    pub fn new(max_input_chars: usize) -> Self {
        Self {
            info: ModelInfo {
                name: MINIMAL_PROVIDER.to_string(),
                dimension: MINIMAL_DIM,
                max_sequence_length: max_input_chars.max(1),
            },
        }
    }

    fn truncate<'a>(&self, text: &'a str) -> &'a str {
        match text.char_indices().nth(self.info.max_sequence_length) {
            Some((idx, _)) => &text[..idx],
            None => text,
        }
    }

    fn features(&self, text: &str) -> Vec<f32> {
        let text = self.truncate(text);
        if text.trim().is_empty() {
            return vec![0.0; MINIMAL_DIM];
        }

        let mut hashed = vec![0.0f32; HASH_DIMS];
        let mut unique = HashSet::new();
        let mut token_count = 0usize;
        let mut token_chars = 0usize;
        let mut branches = 0usize;

        for token in tokenize(text) {
            let hash = fnv1a(token.as_bytes());
            let idx = (hash % HASH_DIMS as u64) as usize;
            hashed[idx] += if hash >> 63 == 0 { 1.0 } else { -1.0 };

            token_count += 1;
            token_chars += token.chars().count();
            if BRANCH_KEYWORDS.contains(&token.as_str()) {
                branches += 1;
            }
            unique.insert(hash);
        }

        let norm = hashed.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            let energy = HASH_ENERGY * (1.0 + unique.len() as f32).ln();
            let scale = energy.sqrt() / norm;
            hashed.iter_mut().for_each(|x| *x *= scale);
        }

        let mut chars = 0usize;
        let mut punctuation = 0usize;
        let mut uppercase = 0usize;
        let mut digits = 0usize;
        let mut whitespace = 0usize;
        let mut depth = 0usize;
        let mut max_depth = 0usize;
        for c in text.chars() {
            chars += 1;
            match c {
                '(' | '[' | '{' => {
                    depth += 1;
                    max_depth = max_depth.max(depth);
                }
                ')' | ']' | '}' => depth = depth.saturating_sub(1),
                _ => {}
            }
            if c.is_ascii_punctuation() {
                punctuation += 1;
            }
            if c.is_uppercase() {
                uppercase += 1;
            }
            if c.is_ascii_digit() {
                digits += 1;
            }
            if c.is_whitespace() {
                whitespace += 1;
            }
        }
        let lines = text.lines().count();
        let mean_token_len = if token_count == 0 {
            0.0
        } else {
            token_chars as f32 / token_count as f32
        };

        let stats = [
            ratio(branches, token_count),
            (max_depth.min(10) as f32) / 10.0,
            ((1.0 + lines as f32).ln() / 1001f32.ln()).min(1.0),
            (mean_token_len / 20.0).min(1.0),
            ratio(punctuation, chars),
            ratio(uppercase, chars),
            ratio(digits, chars),
            ratio(whitespace, chars),
        ];

        hashed.extend_from_slice(&stats);
        hashed
    }
}

impl EmbeddingModel for MinimalEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        Ok(Embedding::from_raw(self.features(text)))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        debug!(count = texts.len(), "Minimal embedding batch");
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variance(values: &[f32]) -> f32 {
        let n = values.len() as f32;
        let mean = values.iter().sum::<f32>() / n;
        values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n
    }

    #[test]
    fn test_dimension_is_fixed() {
        let embedder = MinimalEmbedder::new(1024);
        for text in ["", "x", "fn main() {}", &"word ".repeat(5000)] {
            assert_eq!(embedder.embed(text).unwrap().dimension(), MINIMAL_DIM);
        }
    }

    #[test]
    fn test_blank_input_is_zero_vector() {
        let embedder = MinimalEmbedder::new(1024);
        let emb = embedder.embed("   \n\t").unwrap();
        assert!(emb.values.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_deterministic() {
        let embedder = MinimalEmbedder::new(1024);
        let a = embedder.embed("fn add(a: i32, b: i32) -> i32 { a + b }").unwrap();
        let b = embedder.embed("fn add(a: i32, b: i32) -> i32 { a + b }").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_long_input_is_truncated() {
        let embedder = MinimalEmbedder::new(10);
        let truncated = embedder.embed("alpha beta gamma delta").unwrap();
        let prefix = embedder.embed("alpha beta").unwrap();
        assert_eq!(truncated, prefix);
    }

    #[test]
    fn test_richer_input_has_higher_variance() {
        let embedder = MinimalEmbedder::new(32_768);
        let trivial = embedder.embed("x").unwrap();
        let rich = embedder
            .embed(
                "fn parse(input: &str) -> Result<Vec<Token>, Error> {\n    \
                 let mut tokens = Vec::new();\n    for c in input.chars() {\n        \
                 if c.is_whitespace() { continue; }\n        tokens.push(Token::from(c)?);\n    }\n    \
                 Ok(tokens)\n}",
            )
            .unwrap();
        assert!(variance(&rich.values) > variance(&trivial.values));
    }

    #[test]
    fn test_variance_grows_gradually_with_vocabulary() {
        let embedder = MinimalEmbedder::new(32_768);
        let module: String = (0..40)
            .map(|i| {
                format!("fn handler_{i}(value: u32) -> u32 {{ if value > {i} {{ value - {i} }} else {{ value }} }}\n")
            })
            .collect();
        let crate_sized: String = (0..300)
            .map(|i| format!("pub fn handler_{i}(value_{i}: u32) -> u32 {{ value_{i} + {i} }}\n"))
            .collect();
        let ladder = [
            "x".to_string(),
            "fn main() { println!(\"hello\"); }".to_string(),
            "fn parse(input: &str) -> Result<Vec<Token>, Error> {\n    \
             let mut tokens = Vec::new();\n    for c in input.chars() {\n        \
             if c.is_whitespace() { continue; }\n        tokens.push(Token::from(c)?);\n    }\n    \
             Ok(tokens)\n}"
                .to_string(),
            module,
            crate_sized,
        ];

        let scaled: Vec<f32> = ladder
            .iter()
            .map(|text| variance(&embedder.embed(text).unwrap().values) * 100.0)
            .collect();
        for pair in scaled.windows(2) {
            assert!(pair[0] < pair[1], "{scaled:?}");
        }
        assert!(scaled[scaled.len() - 1] < 0.9, "{scaled:?}");
        assert!(scaled[1] > 0.1, "{scaled:?}");
    }

    #[test]
    fn test_batch_preserves_order() {
        let embedder = MinimalEmbedder::new(1024);
        let batch = embedder.embed_batch(&["one", "two words"]).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], embedder.embed("one").unwrap());
        assert_eq!(batch[1], embedder.embed("two words").unwrap());
    }

    #[test]
    fn test_fnv1a_reference_values() {
        assert_eq!(fnv1a(b""), FNV_OFFSET);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
    }
}
