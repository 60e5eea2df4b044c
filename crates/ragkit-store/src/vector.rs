//! Embedding helpers shared by the vector stores.

use ragkit_core::{Embedder, RagError, Result};

/// Embed texts, checking that the model returned one vector per input.
pub(crate) async fn embed_batch(embedder: &dyn Embedder, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let embeddings = embedder.batch_embed(texts).await?;
    if embeddings.len() != texts.len() {
        return Err(RagError::embedding(format!(
            "embedder returned {} vectors for {} texts",
            embeddings.len(),
            texts.len()
        )));
    }
    Ok(embeddings)
}

/// Embed a single query.
pub(crate) async fn embed_query(embedder: &dyn Embedder, query: &str) -> Result<Vec<f32>> {
    embed_batch(embedder, &[query])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| RagError::embedding("No embedding returned"))
}

/// Euclidean distance. Vectors of different length are infinitely far apart.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Convert f32 vector to bytes (little-endian).
pub(crate) fn vec_to_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert little-endian bytes back to an f32 vector.
pub(crate) fn bytes_to_vec(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Keep the `top_k` closest entries, ties in input order.
pub(crate) fn nearest<T>(mut scored: Vec<(f32, T)>, top_k: usize) -> Vec<(f32, T)> {
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored.truncate(top_k);
    scored
}
