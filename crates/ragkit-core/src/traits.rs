//! Core traits defining the interfaces between components.

use async_trait::async_trait;

use crate::condition::Condition;
use crate::error::Result;
use crate::record::Record;
use crate::types::RankedHit;

/// Embedding model capability.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts. The output has one vector per input, in order.
    async fn batch_embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;
}

/// Token counting capability, used by splitters for budget decisions.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

impl<F> TokenCounter for F
where
    F: Fn(&str) -> usize + Send + Sync,
{
    fn count(&self, text: &str) -> usize {
        self(text)
    }
}

/// Text splitting strategy.
pub trait Splitter: Send + Sync {
    /// Split text into chunks. Empty input yields no chunks.
    fn split(&self, text: &str) -> Vec<String>;
}

/// Key-value storage with optional keyword search and a unique counter.
#[async_trait]
pub trait Storage<T: Record>: Send + Sync {
    /// Logical collection name.
    fn name(&self) -> &str;

    /// Whether [`Storage::search`] is supported.
    fn searchable(&self) -> bool;

    /// Upsert values under the given keys.
    async fn insert(&self, keys: &[String], values: &[T]) -> Result<()>;

    /// Delete the value stored under a key.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Get the value stored under a key.
    async fn query(&self, key: &str) -> Result<Option<T>>;

    /// Keyword search; scores are relevance (larger is better).
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RankedHit<T>>>;

    /// Whether the backing collection exists.
    async fn exists(&self) -> Result<bool>;

    /// Drop the backing collection and its counter.
    async fn destroy(&self) -> Result<()>;

    /// Current counter value (0 before the first increment).
    async fn unique_get(&self) -> Result<u64>;

    /// Increment the counter by one.
    async fn unique_incr(&self) -> Result<()>;

    /// Reset the counter to zero.
    async fn unique_reset(&self) -> Result<()>;
}

/// Embedding-backed similarity store.
#[async_trait]
pub trait VectorStore<T: Record>: Send + Sync {
    /// Logical collection name.
    fn name(&self) -> &str;

    /// Embed `texts` and store them with their records.
    ///
    /// Scalar fields of each record become filterable metadata; the full
    /// record is kept as an opaque payload.
    async fn insert(&self, texts: &[&str], records: &[T]) -> Result<()>;

    /// Delete all entries matching the condition.
    async fn delete(&self, condition: &Condition) -> Result<()>;

    /// Similarity search; scores are distances (smaller is better).
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        condition: Option<&Condition>,
    ) -> Result<Vec<RankedHit<T>>>;

    /// Whether the backing collection exists.
    async fn exists(&self) -> Result<bool>;

    /// Drop the backing collection.
    async fn destroy(&self) -> Result<()>;

    /// Make pending writes visible to search.
    async fn flush(&self) -> Result<()>;

    /// Populate the store, optionally dropping what was there before.
    async fn create(&self, texts: &[&str], records: &[T], drop_old: bool) -> Result<()> {
        if drop_old && self.exists().await? {
            self.destroy().await?;
        }
        self.insert(texts, records).await
    }
}

/// Retrieval strategy.
#[async_trait]
pub trait Retriever<T: Record>: Send + Sync {
    /// Retrieve up to `top_k` records relevant to the query.
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        condition: Option<&Condition>,
    ) -> Result<Vec<T>>;
}
