//! Fixed-ranking stores for retriever tests.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ragkit_core::{Condition, RagError, RankedHit, Record, Result, Storage, VectorStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doc {
    pub id: String,
}

pub fn doc(id: &str) -> Doc {
    Doc { id: id.to_string() }
}

pub fn ids(records: &[Doc]) -> Vec<&str> {
    records.iter().map(|d| d.id.as_str()).collect()
}

/// Returns its hits in order, truncated to `top_k`, and records requests.
pub struct FixedStore<T> {
    hits: Vec<RankedHit<T>>,
    pub requests: Mutex<Vec<(usize, Option<Condition>)>>,
}

impl<T: Record> FixedStore<T> {
    pub fn new(hits: Vec<(T, f32)>) -> Self {
        Self {
            hits: hits.into_iter().map(|(t, s)| RankedHit::new(t, s)).collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requested_top_k(&self) -> Vec<usize> {
        self.requests.lock().unwrap().iter().map(|(k, _)| *k).collect()
    }

    fn ranked(&self, top_k: usize, condition: Option<&Condition>) -> Vec<RankedHit<T>> {
        self.requests.lock().unwrap().push((top_k, condition.cloned()));
        self.hits.iter().take(top_k).cloned().collect()
    }
}

#[async_trait]
impl<T: Record> VectorStore<T> for FixedStore<T> {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn insert(&self, _texts: &[&str], _records: &[T]) -> Result<()> {
        Err(RagError::internal("read-only"))
    }

    async fn delete(&self, _condition: &Condition) -> Result<()> {
        Err(RagError::internal("read-only"))
    }

    async fn search(
        &self,
        _query: &str,
        top_k: usize,
        condition: Option<&Condition>,
    ) -> Result<Vec<RankedHit<T>>> {
        Ok(self.ranked(top_k, condition))
    }

    async fn exists(&self) -> Result<bool> {
        Ok(true)
    }

    async fn destroy(&self) -> Result<()> {
        Err(RagError::internal("read-only"))
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<T: Record> Storage<T> for FixedStore<T> {
    fn name(&self) -> &str {
        "fixed"
    }

    fn searchable(&self) -> bool {
        true
    }

    async fn insert(&self, _keys: &[String], _values: &[T]) -> Result<()> {
        Err(RagError::internal("read-only"))
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Err(RagError::internal("read-only"))
    }

    async fn query(&self, _key: &str) -> Result<Option<T>> {
        Ok(None)
    }

    async fn search(&self, _query: &str, top_k: usize) -> Result<Vec<RankedHit<T>>> {
        Ok(self.ranked(top_k, None))
    }

    async fn exists(&self) -> Result<bool> {
        Ok(true)
    }

    async fn destroy(&self) -> Result<()> {
        Err(RagError::internal("read-only"))
    }

    async fn unique_get(&self) -> Result<u64> {
        Ok(0)
    }

    async fn unique_incr(&self) -> Result<()> {
        Err(RagError::internal("read-only"))
    }

    async fn unique_reset(&self) -> Result<()> {
        Err(RagError::internal("read-only"))
    }
}
