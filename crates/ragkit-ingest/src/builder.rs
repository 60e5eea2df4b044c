//! Bulk ingestion: walk, split, embed and write chunks in batches.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};
use ulid::Ulid;
use walkdir::WalkDir;

use ragkit_core::{
    ChunkIndex, DocumentChunk, IngestConfig, RagError, Result, Splitter, Storage, VectorStore,
};

/// Summary of a completed build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Documents read and split.
    pub files: usize,
    /// Chunks written to both stores.
    pub chunks: usize,
    /// Write batches issued.
    pub batches: usize,
}

/// A unit of work for the splitting pool.
enum Document {
    File(PathBuf),
    Text { source: String, text: String },
}

impl Document {
    fn load(self) -> Result<(String, String)> {
        match self {
            Document::File(path) => {
                let text = std::fs::read_to_string(&path)?;
                Ok((path.to_string_lossy().to_string(), text))
            }
            Document::Text { source, text } => Ok((source, text)),
        }
    }
}

/// Loads documents into a [`Storage`] of [`DocumentChunk`]s and a
/// [`VectorStore`] of [`ChunkIndex`]es sharing the same chunk ids.
pub struct IndexBuilder {
    splitter: Arc<dyn Splitter>,
    storage: Arc<dyn Storage<DocumentChunk>>,
    vector_store: Arc<dyn VectorStore<ChunkIndex>>,
    config: IngestConfig,
}

impl IndexBuilder {
    pub fn new(
        splitter: Arc<dyn Splitter>,
        storage: Arc<dyn Storage<DocumentChunk>>,
        vector_store: Arc<dyn VectorStore<ChunkIndex>>,
        config: IngestConfig,
    ) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(RagError::config("ingest.batch_size must be positive"));
        }
        if config.workers == 0 {
            return Err(RagError::config("ingest.workers must be positive"));
        }

        Ok(Self {
            splitter,
            storage,
            vector_store,
            config,
        })
    }

    /// Index every matching file under `folder`.
    pub async fn build(&self, folder: &Path) -> Result<BuildReport> {
        let files = collect_files(folder, &self.config.extensions)?;
        info!("Building index from {} files in {}", files.len(), folder.display());

        self.run(files.into_iter().map(Document::File).collect()).await
    }

    /// Index in-memory documents given as `(source, text)` pairs.
    pub async fn build_texts(&self, texts: Vec<(String, String)>) -> Result<BuildReport> {
        let documents = texts
            .into_iter()
            .map(|(source, text)| Document::Text { source, text })
            .collect();

        self.run(documents).await
    }

    async fn run(&self, documents: Vec<Document>) -> Result<BuildReport> {
        let start = Instant::now();
        let files = documents.len();

        let split = self.split_all(documents).await?;
        let (chunks, batches) = self.write_chunks(split).await?;

        info!(
            "Indexed {} documents into {} chunks ({} batches) in {:?}",
            files,
            chunks,
            batches,
            start.elapsed()
        );

        Ok(BuildReport {
            files,
            chunks,
            batches,
        })
    }

    /// Load and split documents on a bounded pool of blocking workers.
    ///
    /// Results come back in completion order; each document's chunks stay
    /// in order.
    async fn split_all(&self, documents: Vec<Document>) -> Result<Vec<(String, Vec<String>)>> {
        let permits = Arc::new(Semaphore::new(self.config.workers));
        let mut tasks = JoinSet::new();

        for document in documents {
            let permits = Arc::clone(&permits);
            let splitter = Arc::clone(&self.splitter);

            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| RagError::internal(e.to_string()))?;

                tokio::task::spawn_blocking(move || {
                    let (source, text) = document.load()?;
                    let chunks = splitter.split(&text);
                    Ok::<_, RagError>((source, chunks))
                })
                .await
                .map_err(|e| RagError::internal(format!("split worker failed: {}", e)))?
            });
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let (source, chunks) =
                joined.map_err(|e| RagError::internal(format!("split worker failed: {}", e)))??;
            debug!("Split {} into {} chunks", source, chunks.len());
            results.push((source, chunks));
        }

        Ok(results)
    }

    /// Write chunks to both stores in batches. Returns (chunks, batches).
    async fn write_chunks(&self, split: Vec<(String, Vec<String>)>) -> Result<(usize, usize)> {
        let chunks: Vec<DocumentChunk> = split
            .into_iter()
            .flat_map(|(source, contents)| {
                contents.into_iter().map(move |content| DocumentChunk {
                    chunk_id: Ulid::new(),
                    source: source.clone(),
                    content,
                })
            })
            .collect();

        let mut batches = 0;
        for batch in chunks.chunks(self.config.batch_size) {
            let keys: Vec<String> = batch.iter().map(DocumentChunk::key).collect();
            let texts: Vec<&str> = batch.iter().map(|c| c.content.as_str()).collect();
            let indexes: Vec<ChunkIndex> = batch.iter().map(DocumentChunk::index).collect();

            self.storage.insert(&keys, batch).await?;
            self.vector_store.insert(&texts, &indexes).await?;

            batches += 1;
            debug!("Wrote batch {} ({} chunks)", batches, batch.len());
        }

        if batches > 0 {
            self.vector_store.flush().await?;
        }

        Ok((chunks.len(), batches))
    }
}

/// Regular files under `folder` whose extension is in `extensions`, sorted.
pub fn collect_files(folder: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Err(RagError::invalid_argument(format!(
            "{} is not a directory",
            folder.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(folder) {
        let entry = entry.map_err(|e| RagError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let matches = entry
            .path()
            .extension()
            .map(|ext| ext.to_string_lossy())
            .is_some_and(|ext| extensions.iter().any(|wanted| *wanted == ext));
        if matches {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}
