//! Sparse (keyword) retrieval.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use ragkit_core::{Condition, RagError, Record, Result, Retriever, Storage};

/// Keyword search through a searchable [`Storage`].
pub struct SparseRetriever<T> {
    storage: Arc<dyn Storage<T>>,
}

impl<T: Record> SparseRetriever<T> {
    pub fn new(storage: Arc<dyn Storage<T>>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl<T: Record> Retriever<T> for SparseRetriever<T> {
    /// Fails with `UnsupportedCondition` when a condition is given.
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        condition: Option<&Condition>,
    ) -> Result<Vec<T>> {
        if condition.is_some() {
            return Err(RagError::unsupported_condition(
                "sparse retrieval does not support filter conditions",
            ));
        }

        let hits = self.storage.search(query, top_k).await?;
        debug!("Sparse retrieval from {}: {} hits", self.storage.name(), hits.len());
        Ok(hits.into_iter().map(|hit| hit.record).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{doc, ids, Doc, FixedStore};

    #[tokio::test]
    async fn test_backend_order() {
        let storage = Arc::new(FixedStore::new(vec![
            (doc("b"), 3.0),
            (doc("a"), 1.0),
            (doc("c"), 0.5),
        ]));
        let retriever: SparseRetriever<Doc> = SparseRetriever::new(storage);

        let records = retriever.retrieve("q", 2, None).await.unwrap();
        assert_eq!(ids(&records), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_rejects_condition() {
        let storage = Arc::new(FixedStore::new(vec![(doc("a"), 1.0)]));
        let retriever: SparseRetriever<Doc> = SparseRetriever::new(storage.clone());

        let err = retriever
            .retrieve("q", 2, Some(&Condition::eq("id", "a")))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_CONDITION");
        assert!(storage.requested_top_k().is_empty());
    }
}
