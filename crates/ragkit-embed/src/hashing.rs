//! Feature-hashing embedder.
//!
//! Maps each lowercased word to a bucket by its blake3 hash and
//! L2-normalizes the counts. Texts sharing words land close together,
//! which is enough for deterministic tests and offline indexing.

use async_trait::async_trait;
use tracing::debug;

use ragkit_core::{Embedder, Result};

const DEFAULT_DIMENSION: usize = 256;

/// Deterministic bag-of-words embedder.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new() -> Self {
        Self::with_dimension(DEFAULT_DIMENSION)
    }

    /// Create an embedder with a custom dimension (at least 1).
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Embed a single text.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            embedding[self.bucket(&word)] += 1.0;
        }
        l2_normalize(embedding)
    }

    fn bucket(&self, word: &str) -> usize {
        let hash = blake3::hash(word.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&hash.as_bytes()[..8]);
        (u64::from_le_bytes(prefix) % self.dimension as u64) as usize
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn batch_embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        debug!("Embedding batch: size={}, dim={}", texts.len(), self.dimension);
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
