//! Embedding abstraction
//!
//! Vector-search plan steps need a query embedding. Callers either pass one in
//! the query context or attach an [`Embedder`] to the reasoning engine.

use crate::errors::{GraphError, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// Deterministic bag-of-words embedder using feature hashing.
///
/// Each lowercase token is hashed with SHA-256 into a bucket and a sign, so
/// the same text always yields the same unit vector across processes. Useful
/// for tests and for stores whose entities were embedded the same way.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&digest[..8]);
        let value = u64::from_le_bytes(raw);

        let index = (value % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }

    /// Embed synchronously; the async trait method delegates here
    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        if self.dimension == 0 {
            return Err(GraphError::Embedding {
                message: "Embedding dimension must be positive".to_string(),
            });
        }

        let mut vector = vec![0.0f32; self.dimension];
        let tokens = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase());

        for token in tokens {
            let (index, sign) = self.bucket(&token);
            vector[index] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }

        Ok(vector)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_text(text)
    }

    fn model_name(&self) -> &str {
        "feature-hashing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hashing_embedder_is_deterministic() {
        let embedder = HashingEmbedder::new(64);
        let first = embedder.embed("Graph reasoning engine").await.unwrap();
        let second = embedder.embed("graph REASONING engine").await.unwrap();

        assert_eq!(first.len(), 64);
        assert_eq!(first, second);

        let norm: f32 = first.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(8);
        let embedding = embedder.embed("  ?! ").await.unwrap();
        assert!(embedding.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let embedder = HashingEmbedder::new(0);
        assert!(matches!(embedder.embed_text("x"), Err(GraphError::Embedding { .. })));
    }
}
