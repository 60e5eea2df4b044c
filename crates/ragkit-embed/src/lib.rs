//! ragkit-embed - Token counting and embeddings
//!
//! - [`HfTokenCounter`]: counts tokens with a HuggingFace `tokenizer.json`,
//!   so chunk budgets match the embedding model.
//! - [`WordTokenCounter`]: whitespace word count.
//! - [`HashingEmbedder`]: deterministic feature-hashing embedder for
//!   offline indexing and tests.

mod hashing;
mod tokenizer;

pub use hashing::HashingEmbedder;
pub use tokenizer::{HfTokenCounter, WordTokenCounter};

// Re-export traits for convenience
pub use ragkit_core::{Embedder, TokenCounter};
