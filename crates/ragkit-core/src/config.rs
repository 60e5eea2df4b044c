//! Configuration types for ragkit.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{RagError, Result};

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    /// Text splitting configuration.
    #[serde(default)]
    pub splitter: SplitterConfig,

    /// Key-value storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Vector store configuration.
    #[serde(default)]
    pub vectorstore: VectorStoreConfig,

    /// Retrieval configuration.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Ingestion configuration.
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Text splitter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitterConfig {
    /// Maximum tokens per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Tokens shared between adjacent chunks. Must be below `chunk_size`.
    #[serde(default)]
    pub chunk_overlap: usize,

    /// Insert breaks after CJK sentence punctuation before splitting.
    #[serde(default)]
    pub cjk: bool,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            chunk_overlap: 0,
            cjk: false,
        }
    }
}

impl SplitterConfig {
    /// Check the chunk budget invariants.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::config("chunk_size must be positive"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Key-value storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend name ("sqlite" or "memory").
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Database path for file-backed backends.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,

    /// Record field indexed for keyword search. Search is disabled when unset.
    #[serde(default = "default_search_target")]
    pub search_target: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_storage_path(),
            search_target: default_search_target(),
        }
    }
}

/// Vector store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    /// Backend name ("sqlite" or "memory").
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Database path for file-backed backends.
    #[serde(default = "default_vectorstore_path")]
    pub path: PathBuf,

    /// Rows written per insert batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_vectorstore_path(),
            batch_size: 1000,
        }
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Default number of results.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Maximum distance a dense hit may have.
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Sparse over-fetch factor for hybrid retrieval.
    #[serde(default = "default_sparse_multiplier")]
    pub sparse_multiplier: usize,

    /// Restrict hybrid dense hits to the sparse candidate set.
    #[serde(default = "default_true")]
    pub restrict_to_candidates: bool,

    /// RRF damping constant.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            threshold: 1e5,
            sparse_multiplier: 4,
            restrict_to_candidates: true,
            rrf_k: 60,
        }
    }
}

/// Ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Chunks written per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Concurrent splitting workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// File extensions picked up when walking a folder.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            workers: 4,
            extensions: default_extensions(),
        }
    }
}

// Default value functions

fn default_true() -> bool {
    true
}

fn default_chunk_size() -> usize {
    100
}

fn default_backend() -> String {
    "sqlite".to_string()
}

fn default_search_target() -> Option<String> {
    Some("content".to_string())
}

fn default_batch_size() -> usize {
    1000
}

fn default_top_k() -> usize {
    4
}

fn default_threshold() -> f32 {
    1e5
}

fn default_sparse_multiplier() -> usize {
    4
}

fn default_rrf_k() -> u32 {
    60
}

fn default_workers() -> usize {
    4
}

fn default_extensions() -> Vec<String> {
    vec!["txt".to_string()]
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ragkit")
}

fn default_storage_path() -> PathBuf {
    data_dir().join("storage.db")
}

fn default_vectorstore_path() -> PathBuf {
    data_dir().join("vectors.db")
}

impl RagConfig {
    /// Load configuration from file.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| RagError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default paths.
    pub fn load_default() -> Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("ragkit").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("ragkit.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        Ok(Self::default())
    }

    /// Check startup invariants.
    pub fn validate(&self) -> Result<()> {
        self.splitter.validate()?;
        if self.vectorstore.batch_size == 0 || self.ingest.batch_size == 0 {
            return Err(RagError::config("batch_size must be positive"));
        }
        if self.ingest.workers == 0 {
            return Err(RagError::config("ingest.workers must be positive"));
        }
        if self.retrieval.sparse_multiplier == 0 {
            return Err(RagError::config("retrieval.sparse_multiplier must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RagConfig::default();
        assert_eq!(config.splitter.chunk_size, 100);
        assert_eq!(config.splitter.chunk_overlap, 0);
        assert_eq!(config.storage.backend, "sqlite");
        assert_eq!(config.storage.search_target.as_deref(), Some("content"));
        assert_eq!(config.retrieval.sparse_multiplier, 4);
        assert_eq!(config.retrieval.rrf_k, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_below_size() {
        let config = SplitterConfig {
            chunk_size: 10,
            chunk_overlap: 10,
            cjk: false,
        };
        assert_eq!(config.validate().unwrap_err().error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragkit.toml");
        std::fs::write(
            &path,
            r#"
[splitter]
chunk_size = 30
chunk_overlap = 10

[storage]
backend = "memory"
"#,
        )
        .unwrap();

        let config = RagConfig::load(&path).unwrap();
        assert_eq!(config.splitter.chunk_size, 30);
        assert_eq!(config.splitter.chunk_overlap, 10);
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.vectorstore.backend, "sqlite");
        assert_eq!(config.ingest.extensions, vec!["txt".to_string()]);
    }

    #[test]
    fn test_load_rejects_invalid_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragkit.toml");
        std::fs::write(&path, "[splitter]\nchunk_size = 5\nchunk_overlap = 8\n").unwrap();

        assert!(RagConfig::load(&path).is_err());
    }
}
