//! ragkit-chunk - Text splitting
//!
//! This crate splits documents into token-budgeted chunks for embedding.
//!
//! # Splitters
//!
//! - [`TextSplitter`]: Recursively splits text using progressively smaller
//!   separators (paragraphs, lines, sentences, clauses, words, characters)
//!   and merges the pieces back with a sliding overlap.
//!
//! - [`CjkTextSplitter`]: Breaks CJK prose on full-width sentence stops,
//!   then splits like [`TextSplitter`].
//!
//! # Example
//!
//! ```rust
//! use ragkit_chunk::{Splitter, TextSplitter};
//!
//! let count = |s: &str| s.split_whitespace().count();
//! let splitter = TextSplitter::with_token_counter(30, 10, count).unwrap();
//! let chunks = splitter.split("Hello world. This is a test.");
//! assert_eq!(chunks.len(), 1);
//! ```

mod cjk;
mod recursive;

pub use cjk::{normalize_cjk, splitter_from_config, CjkTextSplitter};
pub use recursive::{TextSplitter, DEFAULT_SEPARATORS};

// Re-export types for convenience
pub use ragkit_core::{SplitterConfig, Splitter, TokenCounter};
