//! ragkit-ingest - Getting documents into the stores
//!
//! - [`IndexBuilder`] walks a folder (or takes in-memory texts), splits on a
//!   bounded worker pool and writes aligned batches to a [`Storage`] of
//!   chunks and a [`VectorStore`] of chunk indexes.
//! - [`Collector`] appends items to a storage under sequential keys.
//!
//! # Example
//!
//! ```rust,ignore
//! use ragkit_ingest::IndexBuilder;
//!
//! let builder = IndexBuilder::new(splitter, storage, vector_store, config.ingest.clone())?;
//! let report = builder.build(Path::new("docs")).await?;
//! println!("{} chunks", report.chunks);
//! ```
//!
//! [`Storage`]: ragkit_core::Storage
//! [`VectorStore`]: ragkit_core::VectorStore

mod builder;
mod collector;

pub use builder::{collect_files, BuildReport, IndexBuilder};
pub use collector::{retry, Collector, DEFAULT_PREFIX};
