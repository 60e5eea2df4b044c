//! Hybrid retrieval: sparse candidate generation, dense re-ranking.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use ragkit_core::record::fingerprint;
use ragkit_core::{
    Condition, RagError, Record, Result, RetrievalConfig, Retriever, Storage, VectorStore,
};

/// Two-stage retriever over a keyword [`Storage`] and a [`VectorStore`]
/// holding the same records.
///
/// The sparse stage over-fetches `top_k * sparse_multiplier` candidates.
/// The dense stage searches for `top_k` hits within the distance threshold
/// and, when `restrict_to_candidates` is set, keeps only hits that were
/// also sparse candidates. The result is always a subset of the dense
/// stage's top `top_k`.
pub struct HybridRetriever<T> {
    storage: Arc<dyn Storage<T>>,
    vector_store: Arc<dyn VectorStore<T>>,
    threshold: f32,
    sparse_multiplier: usize,
    restrict_to_candidates: bool,
}

impl<T: Record> HybridRetriever<T> {
    pub fn new(storage: Arc<dyn Storage<T>>, vector_store: Arc<dyn VectorStore<T>>) -> Self {
        Self::from_config(storage, vector_store, &RetrievalConfig::default())
    }

    pub fn from_config(
        storage: Arc<dyn Storage<T>>,
        vector_store: Arc<dyn VectorStore<T>>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            storage,
            vector_store,
            threshold: config.threshold,
            sparse_multiplier: config.sparse_multiplier.max(1),
            restrict_to_candidates: config.restrict_to_candidates,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the sparse over-fetch factor. Must be at least 1.
    pub fn with_sparse_multiplier(mut self, sparse_multiplier: usize) -> Result<Self> {
        if sparse_multiplier == 0 {
            return Err(RagError::config("sparse_multiplier must be at least 1"));
        }
        self.sparse_multiplier = sparse_multiplier;
        Ok(self)
    }

    /// Whether dense hits must also be sparse candidates.
    pub fn restrict_to_candidates(mut self, restrict: bool) -> Self {
        self.restrict_to_candidates = restrict;
        self
    }

    /// Fingerprints of the sparse candidates.
    async fn candidates(&self, query: &str, top_k: usize) -> Result<HashSet<String>> {
        let hits = self
            .storage
            .search(query, top_k.saturating_mul(self.sparse_multiplier))
            .await?;

        let mut candidates = HashSet::with_capacity(hits.len());
        for hit in &hits {
            candidates.insert(fingerprint(&hit.record)?);
        }
        Ok(candidates)
    }
}

#[async_trait]
impl<T: Record> Retriever<T> for HybridRetriever<T> {
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        condition: Option<&Condition>,
    ) -> Result<Vec<T>> {
        let candidates = self.candidates(query, top_k).await?;
        if candidates.is_empty() {
            debug!("Hybrid retrieval: no sparse candidates for {:?}", query);
            return Ok(Vec::new());
        }

        let hits = self.vector_store.search(query, top_k, condition).await?;

        let mut records = Vec::with_capacity(top_k);
        for hit in hits {
            if hit.score > self.threshold {
                continue;
            }
            if self.restrict_to_candidates && !candidates.contains(&fingerprint(&hit.record)?) {
                continue;
            }
            records.push(hit.record);
        }
        records.truncate(top_k);

        debug!(
            "Hybrid retrieval: {} sparse candidates, {} results",
            candidates.len(),
            records.len()
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{doc, ids, Doc, FixedStore};

    fn corpus() -> Vec<(Doc, f32)> {
        vec![(doc("d1"), 4.0), (doc("d2"), 3.0), (doc("d3"), 2.0), (doc("d4"), 1.0)]
    }

    #[tokio::test]
    async fn test_output_is_subset_of_dense_top_k() {
        let storage = Arc::new(FixedStore::new(corpus()));
        let dense = Arc::new(FixedStore::new(vec![
            (doc("d3"), 0.1),
            (doc("d1"), 0.2),
            (doc("d2"), 0.3),
            (doc("d4"), 0.4),
        ]));
        let retriever: HybridRetriever<Doc> =
            HybridRetriever::<Doc>::new(storage.clone(), dense.clone())
                .with_sparse_multiplier(4)
                .unwrap();

        let records = retriever.retrieve("q", 2, None).await.unwrap();
        assert_eq!(ids(&records), vec!["d3", "d1"]);
        assert_eq!(storage.requested_top_k(), vec![8]);
        assert_eq!(dense.requested_top_k(), vec![2]);
    }

    #[tokio::test]
    async fn test_restricts_to_sparse_candidates() {
        let storage = Arc::new(FixedStore::new(vec![(doc("d1"), 1.0), (doc("d4"), 0.5)]));
        let dense = Arc::new(FixedStore::new(vec![(doc("d3"), 0.1), (doc("d1"), 0.2)]));

        let retriever: HybridRetriever<Doc> =
            HybridRetriever::<Doc>::new(storage.clone(), dense.clone());
        let records = retriever.retrieve("q", 2, None).await.unwrap();
        assert_eq!(ids(&records), vec!["d1"]);

        let baseline: HybridRetriever<Doc> =
            HybridRetriever::<Doc>::new(storage, dense).restrict_to_candidates(false);
        let records = baseline.retrieve("q", 2, None).await.unwrap();
        assert_eq!(ids(&records), vec!["d3", "d1"]);
    }

    #[tokio::test]
    async fn test_no_sparse_candidates() {
        let storage = Arc::new(FixedStore::<Doc>::new(Vec::new()));
        let dense = Arc::new(FixedStore::new(vec![(doc("d1"), 0.1)]));
        let retriever: HybridRetriever<Doc> = HybridRetriever::<Doc>::new(storage, dense.clone());

        assert!(retriever.retrieve("q", 2, None).await.unwrap().is_empty());
        assert!(dense.requested_top_k().is_empty());
    }

    #[tokio::test]
    async fn test_threshold_and_condition() {
        let storage = Arc::new(FixedStore::new(corpus()));
        let dense = Arc::new(FixedStore::new(vec![(doc("d1"), 0.2), (doc("d2"), 5.0)]));
        let retriever: HybridRetriever<Doc> =
            HybridRetriever::<Doc>::new(storage, dense.clone()).with_threshold(1.0);

        let cond = Condition::ne("id", "d4");
        let records = retriever.retrieve("q", 2, Some(&cond)).await.unwrap();
        assert_eq!(ids(&records), vec!["d1"]);
        assert_eq!(dense.requests.lock().unwrap()[0].1, Some(cond));
    }

    #[test]
    fn test_zero_multiplier_rejected() {
        let storage = Arc::new(FixedStore::<Doc>::new(Vec::new()));
        let dense = Arc::new(FixedStore::<Doc>::new(Vec::new()));
        let retriever: HybridRetriever<Doc> = HybridRetriever::<Doc>::new(storage, dense);
        assert!(retriever.with_sparse_multiplier(0).is_err());
    }
}
