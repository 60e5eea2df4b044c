//! Process-local in-memory backend.
//!
//! A [`MemoryBackend`] owns named collections; every handle opened on the
//! same backend (or a clone of it) sees the same data.

use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{debug, info};

use ragkit_core::record::{decode_payload, encode_payload, scalar_fields, text_field};
use ragkit_core::{
    Condition, Embedder, FilterAdapter, Metadata, RagError, RankedHit, Record, Result, Storage,
    VectorStore,
};

use crate::filter::PredicateFilter;
use crate::schema::validate_name;
use crate::vector::{embed_batch, embed_query, l2_distance, nearest};

struct KvEntry {
    payload: Vec<u8>,
    search_text: Option<String>,
}

struct VectorRow {
    metadata: Metadata,
    payload: Vec<u8>,
    embedding: Vec<f32>,
}

#[derive(Default)]
struct MemoryState {
    storages: HashMap<String, BTreeMap<String, KvEntry>>,
    vectors: HashMap<String, Vec<VectorRow>>,
    counters: HashMap<String, u64>,
}

/// Shared in-memory engine.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend").finish_non_exhaustive()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a storage handle on this backend.
    pub fn storage<T: Record>(
        &self,
        name: &str,
        search_target: Option<String>,
    ) -> Result<MemoryStorage<T>> {
        validate_name(name)?;
        info!("Memory storage {} opened", name);
        Ok(MemoryStorage {
            backend: self.clone(),
            name: name.to_string(),
            search_target,
            _record: PhantomData,
        })
    }

    /// Open a vector store handle on this backend.
    pub fn vector_store<T: Record>(
        &self,
        name: &str,
        embedder: Arc<dyn Embedder>,
        batch_size: usize,
    ) -> Result<MemoryVectorStore<T>> {
        validate_name(name)?;
        info!("Memory vector store {} opened", name);
        Ok(MemoryVectorStore {
            backend: self.clone(),
            name: name.to_string(),
            embedder,
            batch_size: batch_size.max(1),
            _record: PhantomData,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| RagError::internal(format!("memory backend poisoned: {}", e)))
    }
}

/// Lowercased alphanumeric terms.
fn terms(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// Number of occurrences of any query term in the text.
fn term_frequency(query_terms: &[String], text: &str) -> usize {
    terms(text).filter(|t| query_terms.contains(t)).count()
}

/// Storage handle on a [`MemoryBackend`], scored by term frequency.
pub struct MemoryStorage<T> {
    backend: MemoryBackend,
    name: String,
    search_target: Option<String>,
    _record: PhantomData<fn() -> T>,
}

#[async_trait]
impl<T: Record> Storage<T> for MemoryStorage<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn searchable(&self) -> bool {
        self.search_target.is_some()
    }

    async fn insert(&self, keys: &[String], values: &[T]) -> Result<()> {
        if keys.len() != values.len() {
            return Err(RagError::invalid_argument(
                "keys and values must have same length",
            ));
        }

        let mut entries = Vec::with_capacity(values.len());
        for (key, value) in keys.iter().zip(values) {
            let search_text = match &self.search_target {
                Some(field) => text_field(value, field)?,
                None => None,
            };
            entries.push((
                key.clone(),
                KvEntry {
                    payload: encode_payload(value)?,
                    search_text,
                },
            ));
        }

        let mut state = self.backend.lock()?;
        let collection = state.storages.entry(self.name.clone()).or_default();
        collection.extend(entries);
        debug!("Inserted {} values into {}", keys.len(), self.name);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.backend.lock()?;
        let collection = state
            .storages
            .get_mut(&self.name)
            .ok_or_else(|| RagError::index_not_found(&self.name))?;
        collection.remove(key);
        Ok(())
    }

    async fn query(&self, key: &str) -> Result<Option<T>> {
        let state = self.backend.lock()?;
        state
            .storages
            .get(&self.name)
            .and_then(|collection| collection.get(key))
            .map(|entry| decode_payload(&entry.payload))
            .transpose()
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RankedHit<T>>> {
        if !self.searchable() {
            return Err(RagError::NotSearchable {
                name: self.name.clone(),
            });
        }

        let query_terms: Vec<String> = terms(query).collect();
        let state = self.backend.lock()?;
        let collection = state
            .storages
            .get(&self.name)
            .ok_or_else(|| RagError::index_not_found(&self.name))?;

        // BTreeMap iteration is key-ordered, so equal scores keep key order.
        let mut scored: Vec<(usize, &KvEntry)> = collection
            .values()
            .filter_map(|entry| {
                let text = entry.search_text.as_deref()?;
                let score = term_frequency(&query_terms, text);
                (score > 0).then_some((score, entry))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(score, entry)| Ok(RankedHit::new(decode_payload(&entry.payload)?, score as f32)))
            .collect()
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.backend.lock()?.storages.contains_key(&self.name))
    }

    async fn destroy(&self) -> Result<()> {
        let mut state = self.backend.lock()?;
        if state.storages.remove(&self.name).is_none() {
            return Err(RagError::index_not_found(&self.name));
        }
        state.counters.remove(&self.name);
        info!("Destroyed storage {}", self.name);
        Ok(())
    }

    async fn unique_get(&self) -> Result<u64> {
        Ok(self.backend.lock()?.counters.get(&self.name).copied().unwrap_or(0))
    }

    async fn unique_incr(&self) -> Result<()> {
        *self.backend.lock()?.counters.entry(self.name.clone()).or_insert(0) += 1;
        Ok(())
    }

    async fn unique_reset(&self) -> Result<()> {
        self.backend.lock()?.counters.insert(self.name.clone(), 0);
        Ok(())
    }
}

/// Vector store handle on a [`MemoryBackend`], searched by exact L2 scan.
pub struct MemoryVectorStore<T> {
    backend: MemoryBackend,
    name: String,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    _record: PhantomData<fn() -> T>,
}

#[async_trait]
impl<T: Record> VectorStore<T> for MemoryVectorStore<T> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert(&self, texts: &[&str], records: &[T]) -> Result<()> {
        if texts.len() != records.len() {
            return Err(RagError::invalid_argument(
                "texts and records must have same length",
            ));
        }

        let mut prepared = Vec::with_capacity(records.len());
        for record in records {
            prepared.push((scalar_fields(record)?, encode_payload(record)?));
        }

        self.backend.lock()?.vectors.entry(self.name.clone()).or_default();

        for (texts, prepared) in texts
            .chunks(self.batch_size)
            .zip(prepared.chunks(self.batch_size))
        {
            let embeddings = embed_batch(self.embedder.as_ref(), texts).await?;

            let mut state = self.backend.lock()?;
            let rows = state.vectors.entry(self.name.clone()).or_default();
            for ((metadata, payload), embedding) in prepared.iter().zip(embeddings) {
                rows.push(VectorRow {
                    metadata: metadata.clone(),
                    payload: payload.clone(),
                    embedding,
                });
            }
            debug!("Inserted {} rows into {}", texts.len(), self.name);
        }

        Ok(())
    }

    async fn delete(&self, condition: &Condition) -> Result<()> {
        let predicate = PredicateFilter.to_filter(condition)?;
        let mut state = self.backend.lock()?;
        let rows = state
            .vectors
            .get_mut(&self.name)
            .ok_or_else(|| RagError::index_not_found(&self.name))?;

        let before = rows.len();
        rows.retain(|row| !predicate.matches(&row.metadata));
        debug!("Deleted {} vectors from {}", before - rows.len(), self.name);
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
        condition: Option<&Condition>,
    ) -> Result<Vec<RankedHit<T>>> {
        let predicate = condition.map(|c| PredicateFilter.to_filter(c)).transpose()?;
        if !self.exists().await? {
            return Err(RagError::index_not_found(&self.name));
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = embed_query(self.embedder.as_ref(), query).await?;

        let state = self.backend.lock()?;
        let rows = state
            .vectors
            .get(&self.name)
            .ok_or_else(|| RagError::index_not_found(&self.name))?;

        let scored: Vec<(f32, &VectorRow)> = rows
            .iter()
            .filter(|row| predicate.as_ref().map_or(true, |p| p.matches(&row.metadata)))
            .map(|row| (l2_distance(&query_vec, &row.embedding), row))
            .collect();

        nearest(scored, top_k)
            .into_iter()
            .map(|(distance, row)| Ok(RankedHit::new(decode_payload(&row.payload)?, distance)))
            .collect()
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.backend.lock()?.vectors.contains_key(&self.name))
    }

    async fn destroy(&self) -> Result<()> {
        if self.backend.lock()?.vectors.remove(&self.name).is_none() {
            return Err(RagError::index_not_found(&self.name));
        }
        info!("Destroyed vector store {}", self.name);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        if self.exists().await? {
            Ok(())
        } else {
            Err(RagError::index_not_found(&self.name))
        }
    }
}
