//! Query embeddings
//!
//! Document chunks are embedded at ingestion time by the ingestion
//! pipeline; this module only needs to produce query-side vectors that
//! live in the same 384-dimensional space.

use crate::RagError;

/// Embedding configuration
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Embedding dimension, must match the collection's vector size
    pub embedding_dim: usize,
    /// Normalize embeddings to unit length
    pub normalize: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 384,
            normalize: true,
        }
    }
}

/// Query-side embedder
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;

    fn dim(&self) -> usize;
}

/// Deterministic hash-projection embedder.
///
/// Projects characters into a fixed-dimension vector and L2-normalizes.
/// Not semantically meaningful, but stable and model-free; the embedder
/// seam lets a model-backed implementation drop in without touching the
/// retrieval path.
pub struct HashEmbedder {
    config: EmbeddingConfig,
}

impl HashEmbedder {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self { config }
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let mut embedding = vec![0.0f32; self.config.embedding_dim];

        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % self.config.embedding_dim;
            embedding[idx] += 1.0;
        }

        if self.config.normalize {
            let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for v in &mut embedding {
                    *v /= norm;
                }
            }
        }

        Ok(embedding)
    }

    fn dim(&self) -> usize {
        self.config.embedding_dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_embedder_is_normalized() {
        let embedder = HashEmbedder::new(EmbeddingConfig::default());
        let embedding = embedder.embed("what did I do last week?").unwrap();

        assert_eq!(embedding.len(), 384);

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_hash_embedder_is_deterministic() {
        let embedder = HashEmbedder::new(EmbeddingConfig::default());
        assert_eq!(
            embedder.embed("same input").unwrap(),
            embedder.embed("same input").unwrap()
        );
    }

    #[test]
    fn test_config_default() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.embedding_dim, 384);
        assert!(config.normalize);
    }
}
