//! Text embedding strategies.
//!
//! `HashEmbedder` is a deterministic placeholder: it expands seeded 32-bit
//! rolling hashes of the text bit-by-bit into a 0/1 vector. It carries no
//! semantics; it exists so the index can run without a model. Real models
//! plug in through the same `TextEmbedder` trait (see `OllamaEmbedder`).

use std::sync::Arc;

use async_trait::async_trait;
use kmindex_core::{EmbedderKind, IndexConfig, KmResult};
use tracing::info;

use crate::ollama::OllamaEmbedder;

/// Turns text into a fixed-length vector.
///
/// Implementations must be deterministic for a given text and configuration
/// and must not have side effects on the index.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Name of the model, recorded in logs.
    fn model_name(&self) -> &str;

    /// Generate the embedding for `text`.
    async fn embed(&self, text: &str) -> KmResult<Vec<f32>>;
}

/// Seeds for successive 32-bit hash rounds.
const ROUND_SEEDS: [u32; 4] = [0x0000_0000, 0x9E37_79B9, 0x85EB_CA6B, 0xC2B2_AE35];

/// Deterministic hash-based placeholder embedder.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(kmindex_core::config::DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl TextEmbedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }

    async fn embed(&self, text: &str) -> KmResult<Vec<f32>> {
        Ok(generate_embedding(text, self.dimensions))
    }
}

/// Expand the rolling hashes of `text` into a `dimensions`-long 0/1 vector.
///
/// Dimension `i` holds bit `i % 32` of hash round `i / 32`.
pub fn generate_embedding(text: &str, dimensions: usize) -> Vec<f32> {
    let rounds = dimensions.div_ceil(32);
    let hashes: Vec<u32> = (0..rounds).map(|round| rolling_hash(text, round)).collect();

    (0..dimensions)
        .map(|i| {
            let bit = (hashes[i / 32] >> (i % 32)) & 1;
            bit as f32
        })
        .collect()
}

fn rolling_hash(text: &str, round: usize) -> u32 {
    let seed = ROUND_SEEDS[round % ROUND_SEEDS.len()] ^ (round as u32).wrapping_mul(0x27D4_EB2F);
    let hash = text.chars().fold(seed, |hash, ch| {
        (hash << 5).wrapping_sub(hash).wrapping_add(ch as u32)
    });
    fmix32(hash)
}

// murmur3 finalizer: spreads low-entropy rolling hash bits across the word.
fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85EB_CA6B);
    h ^= h >> 13;
    h = h.wrapping_mul(0xC2B2_AE35);
    h ^= h >> 16;
    h
}

/// Build the embedder selected by configuration.
pub fn build_embedder(config: &IndexConfig) -> Arc<dyn TextEmbedder> {
    info!(embedder = config.embedder.as_str(), "Using embedder");
    match config.embedder {
        EmbedderKind::Hash => Arc::new(HashEmbedder::new(config.dimensions)),
        EmbedderKind::Ollama => Arc::new(OllamaEmbedder::new(&config.ollama_url, &config.ollama_model)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = generate_embedding("How to renew a passport", 128);
        let b = generate_embedding("How to renew a passport", 128);
        assert_eq!(a, b);
        assert_eq!(a.len(), 128);
    }

    #[test]
    fn test_distinct_texts_differ() {
        let texts = [
            "How to renew a passport",
            "How to renew a passporT",
            "Birth certificate registration",
            "",
            "የልደት ምስክር ወረቀት",
        ];
        for (i, a) in texts.iter().enumerate() {
            for b in texts.iter().skip(i + 1) {
                assert_ne!(generate_embedding(a, 128), generate_embedding(b, 128), "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn test_binary_values_and_odd_dimensions() {
        let v = generate_embedding("trade licence", 50);
        assert_eq!(v.len(), 50);
        assert!(v.iter().all(|x| *x == 0.0 || *x == 1.0));
    }

    #[tokio::test]
    async fn test_embedder_trait() {
        let embedder = HashEmbedder::default();
        let v = embedder.embed("residence id").await.unwrap();
        assert_eq!(v.len(), embedder.dimensions());
        assert_eq!(embedder.model_name(), "hash");
    }

    #[test]
    fn test_build_embedder_from_config() {
        let config = IndexConfig::default();
        assert_eq!(build_embedder(&config).model_name(), "hash");

        let config = IndexConfig {
            embedder: EmbedderKind::Ollama,
            ..IndexConfig::default()
        };
        assert_eq!(build_embedder(&config).model_name(), "nomic-embed-text");
    }
}
