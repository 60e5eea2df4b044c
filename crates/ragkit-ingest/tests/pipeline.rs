//! End-to-end: configure backends, build an index from a folder, retrieve.

use std::path::Path;
use std::sync::Arc;

use ragkit_chunk::splitter_from_config;
use ragkit_core::{
    ChunkIndex, Condition, DocumentChunk, RagConfig, Retriever, Storage, VectorStore,
};
use ragkit_embed::{HashingEmbedder, WordTokenCounter};
use ragkit_ingest::{BuildReport, IndexBuilder};
use ragkit_query::{DenseRetriever, HybridRetriever, MultiRetriever, SparseRetriever};
use ragkit_store::Backends;

const DOCS: &[(&str, &str)] = &[
    (
        "animals/cats.txt",
        "Cats are small carnivorous mammals. Cats sleep most of the day.",
    ),
    (
        "animals/dogs.txt",
        "Dogs are loyal companions. Dogs enjoy long walks in the park.",
    ),
    (
        "plants/ferns.txt",
        "Ferns reproduce with spores. Ferns grow in shady forests.",
    ),
    ("notes.json", "{\"ignored\": true}"),
];

fn write_corpus(dir: &Path) {
    for (path, text) in DOCS {
        let path = dir.join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }
}

fn config(backend: &str, dir: &Path) -> RagConfig {
    let mut config = RagConfig::default();
    config.splitter.chunk_size = 6;
    config.storage.backend = backend.to_string();
    config.storage.path = dir.join("storage.db");
    config.vectorstore.backend = backend.to_string();
    config.vectorstore.path = dir.join("vectors.db");
    config.ingest.batch_size = 2;
    config
}

struct Index {
    backends: Backends,
    storage: Arc<dyn Storage<DocumentChunk>>,
    vector_store: Arc<dyn VectorStore<ChunkIndex>>,
    report: BuildReport,
}

async fn build(backend: &str, dir: &Path) -> Index {
    let corpus = dir.join("corpus");
    write_corpus(&corpus);

    let config = config(backend, dir);
    let backends = Backends::new(config.clone(), Arc::new(HashingEmbedder::new())).unwrap();
    let splitter = splitter_from_config(&config.splitter, Arc::new(WordTokenCounter)).unwrap();

    let storage: Arc<dyn Storage<DocumentChunk>> =
        Arc::from(backends.storage::<DocumentChunk>("chunks").unwrap());
    let vector_store: Arc<dyn VectorStore<ChunkIndex>> =
        Arc::from(backends.vector_store::<ChunkIndex>("chunks").unwrap());

    let builder = IndexBuilder::new(
        splitter,
        Arc::clone(&storage),
        Arc::clone(&vector_store),
        config.ingest.clone(),
    )
    .unwrap();
    let report = builder.build(&corpus).await.unwrap();

    Index {
        backends,
        storage,
        vector_store,
        report,
    }
}

async fn check_pipeline(backend: &str) {
    let dir = tempfile::tempdir().unwrap();
    let index = build(backend, dir.path()).await;

    assert_eq!(index.report.files, 3);
    assert!(index.report.chunks >= 3);
    assert_eq!(index.report.batches, index.report.chunks.div_ceil(2));

    // Dense: the vector store's indexes join back to stored chunks
    let dense = DenseRetriever::new(Arc::clone(&index.vector_store), 1e5);
    let hits = dense.retrieve("ferns spores", 2, None).await.unwrap();
    assert_eq!(hits.len(), 2);
    for hit in &hits {
        let chunk = index.storage.query(&hit.key()).await.unwrap().unwrap();
        assert_eq!(chunk.source, hit.source);
    }

    // Conditions narrow the dense stage
    let cats = Condition::is_in("source", [source_of(dir.path(), "animals/cats.txt")]);
    let hits = dense.retrieve("dogs", 4, Some(&cats)).await.unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.source.ends_with("cats.txt")));

    // Sparse: keyword search over chunk content
    let sparse = SparseRetriever::new(Arc::clone(&index.storage));
    let chunks = sparse.retrieve("loyal", 3, None).await.unwrap();
    assert!(!chunks.is_empty());
    assert!(chunks[0].content.contains("loyal"));
    assert!(sparse.retrieve("loyal", 3, Some(&cats)).await.is_err());
}

fn source_of(dir: &Path, relative: &str) -> String {
    dir.join("corpus").join(relative).to_string_lossy().to_string()
}

#[tokio::test]
async fn test_pipeline_memory() {
    check_pipeline("memory").await;
}

#[tokio::test]
async fn test_pipeline_sqlite() {
    check_pipeline("sqlite").await;
}

#[tokio::test]
async fn test_hybrid_and_multi_over_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let index = build("memory", dir.path()).await;

    // Mirror every stored chunk into a vector store of full chunks
    let mut chunks = Vec::new();
    for hit in index.vector_store.search("cats dogs ferns", 100, None).await.unwrap() {
        chunks.push(index.storage.query(&hit.record.key()).await.unwrap().unwrap());
    }
    assert_eq!(chunks.len(), index.report.chunks);

    let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
    let full: Arc<dyn VectorStore<DocumentChunk>> =
        Arc::from(index.backends.vector_store::<DocumentChunk>("full").unwrap());
    full.create(&texts, &chunks, true).await.unwrap();

    let hybrid = HybridRetriever::new(Arc::clone(&index.storage), Arc::clone(&full));
    let results = hybrid.retrieve("dogs park walks", 2, None).await.unwrap();
    assert!(!results.is_empty());
    assert!(results.len() <= 2);
    assert!(results.iter().all(|c| c.source.ends_with("dogs.txt")));

    // Unknown keywords yield no sparse candidates
    assert!(hybrid.retrieve("zebra", 2, None).await.unwrap().is_empty());

    let not_ferns = Condition::ne("source", source_of(dir.path(), "plants/ferns.txt"));
    let multi = MultiRetriever::new(
        vec![Arc::clone(&full), Arc::clone(&full)],
        Some(vec![1.0, 2.0]),
        1e5,
    )
    .unwrap();
    let fused = multi.retrieve("ferns forests", 3, Some(&not_ferns)).await.unwrap();
    assert_eq!(fused.len(), 3);
    assert!(fused.iter().all(|c| !c.source.ends_with("ferns.txt")));

    // Identical stores fuse to the single-store ranking
    let dense = DenseRetriever::new(Arc::clone(&full), 1e5);
    let expected = dense.retrieve("ferns forests", 3, Some(&not_ferns)).await.unwrap();
    assert_eq!(fused, expected);
}
