//! Multi-source retrieval fused with weighted RRF.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use ragkit_core::record::fingerprint;
use ragkit_core::{Condition, RagError, Record, Result, Retriever, VectorStore};

use crate::fusion::{reciprocal_rank_fusion, RRF_K};

/// Minimum number of hits fetched from each store.
const MIN_FETCH: usize = 8;

/// Fuses the rankings of several independently configured vector stores.
pub struct MultiRetriever<T> {
    stores: Vec<Arc<dyn VectorStore<T>>>,
    weights: Vec<f32>,
    threshold: f32,
    rrf_k: u32,
}

impl<T: Record> MultiRetriever<T> {
    /// Create a retriever. Weights default to 1.0 per store and must match
    /// the number of stores.
    pub fn new(
        stores: Vec<Arc<dyn VectorStore<T>>>,
        weights: Option<Vec<f32>>,
        threshold: f32,
    ) -> Result<Self> {
        if stores.is_empty() {
            return Err(RagError::config("at least one vector store is required"));
        }

        let weights = weights.unwrap_or_else(|| vec![1.0; stores.len()]);
        if weights.len() != stores.len() {
            return Err(RagError::config(format!(
                "{} weights given for {} vector stores",
                weights.len(),
                stores.len()
            )));
        }

        Ok(Self {
            stores,
            weights,
            threshold,
            rrf_k: RRF_K,
        })
    }

    /// Override the RRF damping constant.
    pub fn with_rrf_k(mut self, rrf_k: u32) -> Self {
        self.rrf_k = rrf_k;
        self
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }
}

#[async_trait]
impl<T: Record> Retriever<T> for MultiRetriever<T> {
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        condition: Option<&Condition>,
    ) -> Result<Vec<T>> {
        let fetch = MIN_FETCH.max(top_k.saturating_mul(2));

        // Fingerprint -> process-local id, shared across stores
        let mut ids: HashMap<String, usize> = HashMap::new();
        let mut records: Vec<Option<T>> = Vec::new();
        let mut lists: Vec<Vec<usize>> = Vec::with_capacity(self.stores.len());

        for store in &self.stores {
            let hits = store.search(query, fetch, condition).await?;

            let mut seen = HashSet::new();
            let mut ranked = Vec::with_capacity(hits.len());
            for hit in hits {
                if hit.score > self.threshold {
                    continue;
                }
                let key = fingerprint(&hit.record)?;
                let id = match ids.get(&key) {
                    Some(id) => *id,
                    None => {
                        let id = records.len();
                        ids.insert(key, id);
                        records.push(Some(hit.record));
                        id
                    }
                };
                if seen.insert(id) {
                    ranked.push(id);
                }
            }

            debug!("Store {} ranked {} records", store.name(), ranked.len());
            lists.push(ranked);
        }

        let fused = reciprocal_rank_fusion(&lists, &self.weights, self.rrf_k)?;

        Ok(fused
            .into_iter()
            .take(top_k)
            .filter_map(|(id, score)| {
                debug!("Fused id {} scored {}", id, score);
                records[id].take()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{doc, ids, Doc, FixedStore};

    fn stores(
        rankings: Vec<Vec<&str>>,
    ) -> (Vec<Arc<FixedStore<Doc>>>, Vec<Arc<dyn VectorStore<Doc>>>) {
        let fixed: Vec<Arc<FixedStore<Doc>>> = rankings
            .into_iter()
            .map(|ranking| {
                Arc::new(FixedStore::new(
                    ranking.into_iter().enumerate().map(|(i, id)| (doc(id), i as f32)).collect(),
                ))
            })
            .collect();
        let dyns = fixed
            .iter()
            .map(|store| store.clone() as Arc<dyn VectorStore<Doc>>)
            .collect();
        (fixed, dyns)
    }

    #[tokio::test]
    async fn test_tie_is_stable() {
        let (_, dyns) = stores(vec![vec!["x", "y"], vec!["y", "x"]]);
        let retriever = MultiRetriever::new(dyns, None, 1e5).unwrap();

        let first = retriever.retrieve("q", 2, None).await.unwrap();
        assert_eq!(ids(&first), vec!["x", "y"]);
        for _ in 0..5 {
            assert_eq!(retriever.retrieve("q", 2, None).await.unwrap(), first);
        }
    }

    #[tokio::test]
    async fn test_weights_decide() {
        let (_, dyns) = stores(vec![vec!["x", "y"], vec!["y", "x"]]);
        let retriever = MultiRetriever::new(dyns, Some(vec![1.0, 3.0]), 1e5).unwrap();
        assert_eq!(retriever.weights(), &[1.0, 3.0]);

        let records = retriever.retrieve("q", 1, None).await.unwrap();
        assert_eq!(ids(&records), vec!["y"]);
    }

    #[tokio::test]
    async fn test_records_missing_from_a_store_take_its_tail() {
        let (_, dyns) = stores(vec![vec!["a", "b", "c"], vec!["d", "c", "e"]]);
        let retriever = MultiRetriever::new(dyns, None, 1e5).unwrap();

        // c is ranked by both stores but never first; the leaders still win
        let records = retriever.retrieve("q", 3, None).await.unwrap();
        assert_eq!(ids(&records), vec!["a", "d", "c"]);
    }

    #[tokio::test]
    async fn test_rrf_k_override() {
        let (_, dyns) = stores(vec![vec!["a", "b"], vec!["b", "c"]]);
        let retriever = MultiRetriever::new(dyns, None, 1e5).unwrap().with_rrf_k(0);

        let records = retriever.retrieve("q", 1, None).await.unwrap();
        assert_eq!(ids(&records), vec!["b"]);
    }

    #[tokio::test]
    async fn test_fetch_size_and_condition() {
        let (fixed, dyns) = stores(vec![vec!["a"], vec!["b"]]);
        let retriever = MultiRetriever::new(dyns, None, 1e5).unwrap();

        let cond = Condition::eq("id", "a");
        retriever.retrieve("q", 2, Some(&cond)).await.unwrap();
        retriever.retrieve("q", 10, None).await.unwrap();

        assert_eq!(fixed[0].requested_top_k(), vec![8, 20]);
        assert_eq!(fixed[1].requests.lock().unwrap()[0].1, Some(cond));
    }

    #[tokio::test]
    async fn test_threshold_and_duplicates() {
        let store = Arc::new(FixedStore::new(vec![
            (doc("a"), 0.1),
            (doc("a"), 0.2),
            (doc("b"), 0.3),
            (doc("far"), 9.0),
        ]));
        let retriever =
            MultiRetriever::new(vec![store as Arc<dyn VectorStore<Doc>>], None, 1.0).unwrap();

        let records = retriever.retrieve("q", 5, None).await.unwrap();
        assert_eq!(ids(&records), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_record_shared_by_stores_fused_once() {
        let (_, dyns) = stores(vec![vec!["a", "b", "a"], vec!["b", "a"]]);
        let retriever = MultiRetriever::new(dyns, None, 1e5).unwrap();

        let records = retriever.retrieve("q", 5, None).await.unwrap();
        assert_eq!(ids(&records), vec!["a", "b"]);
    }

    #[test]
    fn test_weight_mismatch_rejected() {
        let (_, dyns) = stores(vec![vec!["x"], vec!["y"]]);
        let err = MultiRetriever::new(dyns, Some(vec![1.0]), 1e5).err().unwrap();
        assert_eq!(err.error_code(), "CONFIG_ERROR");

        let err = MultiRetriever::<Doc>::new(Vec::new(), None, 1e5).err().unwrap();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }
}
