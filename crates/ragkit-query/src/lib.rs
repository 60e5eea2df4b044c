//! ragkit-query - Retrieval strategies
//!
//! This crate turns storages and vector stores into [`Retriever`]s.
//!
//! # Features
//!
//! - Dense retrieval with a distance threshold
//! - Sparse (keyword) retrieval over a searchable storage
//! - Hybrid retrieval: sparse candidates, dense re-ranking
//! - Multi-store retrieval fused with weighted Reciprocal Rank Fusion
//!
//! # Example
//!
//! ```rust,ignore
//! use ragkit_query::{HybridRetriever, Retriever};
//! use std::sync::Arc;
//!
//! let retriever = HybridRetriever::new(Arc::new(storage), Arc::new(vector_store));
//! let chunks = retriever.retrieve("error handling", 4, None).await?;
//! ```

mod dense;
mod fusion;
mod hybrid;
mod multi;
mod sparse;

#[cfg(test)]
mod testing;

pub use dense::DenseRetriever;
pub use fusion::{reciprocal_rank_fusion, RRF_K};
pub use hybrid::HybridRetriever;
pub use multi::MultiRetriever;
pub use sparse::SparseRetriever;

// Re-export for convenience
pub use ragkit_core::{Condition, Retriever};
