//! Backend selection by configuration string.

use std::sync::Arc;

use tracing::info;

use ragkit_core::{Embedder, RagConfig, RagError, Record, Result, Storage, VectorStore};

use crate::memory::MemoryBackend;
use crate::sqlite::{SqliteStorage, SqliteVectorStore};

/// Backend implementations known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Sqlite,
    Memory,
}

/// Lookup table from configuration name to backend.
const BACKENDS: &[(&str, BackendKind)] = &[
    ("sqlite", BackendKind::Sqlite),
    ("memory", BackendKind::Memory),
];

impl BackendKind {
    /// Resolve a backend by its configuration name.
    pub fn from_name(name: &str) -> Result<Self> {
        BACKENDS
            .iter()
            .find(|(known, _)| *known == name)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| {
                let known: Vec<&str> = BACKENDS.iter().map(|(known, _)| *known).collect();
                RagError::config(format!(
                    "unknown backend {:?} (expected one of: {})",
                    name,
                    known.join(", ")
                ))
            })
    }
}

/// Factory for the storages and vector stores named in a [`RagConfig`].
pub struct Backends {
    config: RagConfig,
    storage_kind: BackendKind,
    vector_kind: BackendKind,
    embedder: Arc<dyn Embedder>,
    memory: MemoryBackend,
}

impl Backends {
    /// Resolve the configured backends. Unknown names fail here.
    pub fn new(config: RagConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        config.validate()?;
        let storage_kind = BackendKind::from_name(&config.storage.backend)?;
        let vector_kind = BackendKind::from_name(&config.vectorstore.backend)?;

        info!(
            "Backends: storage={:?}, vectorstore={:?}",
            storage_kind, vector_kind
        );

        Ok(Self {
            config,
            storage_kind,
            vector_kind,
            embedder,
            memory: MemoryBackend::new(),
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        Arc::clone(&self.embedder)
    }

    /// The in-memory engine shared by every memory-backed handle.
    pub fn memory(&self) -> &MemoryBackend {
        &self.memory
    }

    /// Open the named storage on the configured backend.
    pub fn storage<T: Record>(&self, name: &str) -> Result<Box<dyn Storage<T>>> {
        let storage = &self.config.storage;
        let search_target = storage.search_target.clone();

        let opened: Box<dyn Storage<T>> = match self.storage_kind {
            BackendKind::Sqlite => {
                Box::new(SqliteStorage::<T>::open(&storage.path, name, search_target)?)
            }
            BackendKind::Memory => Box::new(self.memory.storage::<T>(name, search_target)?),
        };
        Ok(opened)
    }

    /// Open the named vector store on the configured backend.
    pub fn vector_store<T: Record>(&self, name: &str) -> Result<Box<dyn VectorStore<T>>> {
        let vectorstore = &self.config.vectorstore;
        let embedder = self.embedder();

        let opened: Box<dyn VectorStore<T>> = match self.vector_kind {
            BackendKind::Sqlite => Box::new(SqliteVectorStore::<T>::open(
                &vectorstore.path,
                name,
                embedder,
                vectorstore.batch_size,
            )?),
            BackendKind::Memory => Box::new(self.memory.vector_store::<T>(
                name,
                embedder,
                vectorstore.batch_size,
            )?),
        };
        Ok(opened)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragkit_core::{ChunkIndex, DocumentChunk};
    use ragkit_embed::HashingEmbedder;

    fn config(storage: &str, vectorstore: &str, dir: &std::path::Path) -> RagConfig {
        let mut config = RagConfig::default();
        config.storage.backend = storage.to_string();
        config.storage.path = dir.join("storage.db");
        config.vectorstore.backend = vectorstore.to_string();
        config.vectorstore.path = dir.join("vectors.db");
        config
    }

    #[test]
    fn test_from_name() {
        assert_eq!(BackendKind::from_name("sqlite").unwrap(), BackendKind::Sqlite);
        assert_eq!(BackendKind::from_name("memory").unwrap(), BackendKind::Memory);

        let err = BackendKind::from_name("redis").unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
        assert!(err.to_string().contains("sqlite, memory"));
    }

    #[test]
    fn test_unknown_backend_fails_at_construction() {
        let dir = tempfile::tempdir().unwrap();
        let result = Backends::new(
            config("sqlite", "milvus", dir.path()),
            Arc::new(HashingEmbedder::new()),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_memory_backends_share_engine() {
        let dir = tempfile::tempdir().unwrap();
        let backends = Backends::new(
            config("memory", "memory", dir.path()),
            Arc::new(HashingEmbedder::new()),
        )
        .unwrap();

        let chunk = DocumentChunk::new("a.txt", "hello world");
        let writer = backends.storage::<DocumentChunk>("chunks").unwrap();
        writer.insert(&[chunk.key()], &[chunk.clone()]).await.unwrap();

        let reader = backends.storage::<DocumentChunk>("chunks").unwrap();
        assert_eq!(reader.query(&chunk.key()).await.unwrap(), Some(chunk));
        assert!(reader.searchable());
    }

    #[tokio::test]
    async fn test_sqlite_backends() {
        let dir = tempfile::tempdir().unwrap();
        let backends = Backends::new(
            config("sqlite", "sqlite", dir.path()),
            Arc::new(HashingEmbedder::new()),
        )
        .unwrap();

        let chunk = DocumentChunk::new("a.txt", "hello world");
        let store = backends.vector_store::<ChunkIndex>("chunks").unwrap();
        store.insert(&[chunk.content.as_str()], &[chunk.index()]).await.unwrap();

        let hits = store.search("hello", 1, None).await.unwrap();
        assert_eq!(hits[0].record, chunk.index());
        assert!(dir.path().join("vectors.db").exists());
    }
}
