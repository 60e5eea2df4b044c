//! ragkit-store - Storage and vector store backends
//!
//! Reference implementations of the [`Storage`] and [`VectorStore`]
//! contracts:
//!
//! - [`SqliteStorage`] / [`SqliteVectorStore`]: one SQLite table per
//!   collection, FTS5 (BM25) keyword search, exact L2 vector scan.
//! - [`MemoryBackend`]: a process-local engine handing out
//!   [`MemoryStorage`] and [`MemoryVectorStore`] handles.
//!
//! [`Backends`] picks the implementation named in the configuration.

pub mod filter;
mod memory;
mod registry;
mod schema;
mod sqlite;
mod vector;

pub use filter::{Predicate, PredicateFilter, SqlFilter, SqlWhere};
pub use memory::{MemoryBackend, MemoryStorage, MemoryVectorStore};
pub use registry::{BackendKind, Backends};
pub use schema::validate_name;
pub use sqlite::{SqliteStorage, SqliteVectorStore};
pub use vector::l2_distance;

// Re-export the contracts for convenience
pub use ragkit_core::{Storage, VectorStore};
