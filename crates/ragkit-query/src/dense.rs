//! Dense (embedding similarity) retrieval.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use ragkit_core::{Condition, Record, Result, RetrievalConfig, Retriever, VectorStore};

/// Vector similarity search with a distance cutoff.
pub struct DenseRetriever<T> {
    store: Arc<dyn VectorStore<T>>,

    /// Hits farther than this are dropped.
    threshold: f32,
}

impl<T: Record> DenseRetriever<T> {
    pub fn new(store: Arc<dyn VectorStore<T>>, threshold: f32) -> Self {
        Self { store, threshold }
    }

    pub fn from_config(store: Arc<dyn VectorStore<T>>, config: &RetrievalConfig) -> Self {
        Self::new(store, config.threshold)
    }
}

#[async_trait]
impl<T: Record> Retriever<T> for DenseRetriever<T> {
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        condition: Option<&Condition>,
    ) -> Result<Vec<T>> {
        let hits = self.store.search(query, top_k, condition).await?;
        let total = hits.len();

        let records: Vec<T> = hits
            .into_iter()
            .filter(|hit| hit.score <= self.threshold)
            .map(|hit| hit.record)
            .collect();

        debug!(
            "Dense retrieval from {}: {} hits, {} within threshold {}",
            self.store.name(),
            total,
            records.len(),
            self.threshold
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{doc, ids, Doc, FixedStore};

    #[tokio::test]
    async fn test_threshold_filters_without_resorting() {
        let store = Arc::new(FixedStore::new(vec![
            (doc("a"), 0.2),
            (doc("b"), 0.9),
            (doc("c"), 0.5),
            (doc("d"), 0.4),
        ]));
        let retriever: DenseRetriever<Doc> = DenseRetriever::new(store.clone(), 0.5);

        let records = retriever.retrieve("q", 4, None).await.unwrap();
        assert_eq!(ids(&records), vec!["a", "c", "d"]);
        assert_eq!(store.requested_top_k(), vec![4]);
    }

    #[tokio::test]
    async fn test_condition_passed_through() {
        let store = Arc::new(FixedStore::new(vec![(doc("a"), 0.1)]));
        let retriever: DenseRetriever<Doc> =
            DenseRetriever::from_config(store.clone(), &RetrievalConfig::default());

        let cond = Condition::eq("id", "a");
        retriever.retrieve("q", 2, Some(&cond)).await.unwrap();
        assert_eq!(store.requests.lock().unwrap()[0].1, Some(cond));
    }
}
