//! Recursive text splitter.
//!
//! Splits text by trying progressively finer separators until every piece
//! fits the token budget, then greedily merges neighbouring pieces back
//! into chunks with a sliding overlap.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::warn;

use ragkit_core::{RagError, Result, SplitterConfig, Splitter, TokenCounter};

/// Default separators, coarsest first. The empty separator splits into
/// single characters.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", ", ", " ", ""];

/// Token-budget recursive splitter.
///
/// Tries each separator in order:
/// 1. Double newline (paragraph breaks)
/// 2. Single newline
/// 3. Sentence boundaries
/// 4. Clause boundaries
/// 5. Word boundaries
/// 6. Character (last resort)
#[derive(Clone)]
pub struct TextSplitter {
    separators: Vec<String>,
    chunk_size: usize,
    chunk_overlap: usize,
    counter: Arc<dyn TokenCounter>,
}

impl std::fmt::Debug for TextSplitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextSplitter")
            .field("separators", &self.separators)
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .finish()
    }
}

impl TextSplitter {
    /// Create a splitter. Fails unless `chunk_overlap < chunk_size`.
    pub fn new(
        chunk_size: usize,
        chunk_overlap: usize,
        counter: Arc<dyn TokenCounter>,
    ) -> Result<Self> {
        SplitterConfig {
            chunk_size,
            chunk_overlap,
            cjk: false,
        }
        .validate()?;

        Ok(Self {
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
            chunk_size,
            chunk_overlap,
            counter,
        })
    }

    /// Create a splitter with a closure as token counter.
    pub fn with_token_counter<F>(
        chunk_size: usize,
        chunk_overlap: usize,
        counter: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> usize + Send + Sync + 'static,
    {
        Self::new(chunk_size, chunk_overlap, Arc::new(counter))
    }

    /// Create a splitter from configuration.
    pub fn from_config(config: &SplitterConfig, counter: Arc<dyn TokenCounter>) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap, counter)
    }

    /// Replace the separator list.
    pub fn with_separators<S: Into<String>>(
        mut self,
        separators: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        let separators: Vec<String> = separators.into_iter().map(Into::into).collect();
        if separators.is_empty() {
            return Err(RagError::config("at least one separator is required"));
        }
        self.separators = separators;
        Ok(self)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Count tokens in text.
    pub fn count_tokens(&self, text: &str) -> usize {
        self.counter.count(text)
    }

    /// Split text into chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// Split text by a separator, dropping empty pieces.
    fn split_by_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
        if separator.is_empty() {
            return text
                .char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect();
        }

        text.split(separator).filter(|s| !s.is_empty()).collect()
    }

    fn join(pieces: &VecDeque<&str>, separator: &str) -> String {
        let mut joined = String::new();
        for (i, piece) in pieces.iter().enumerate() {
            if i > 0 {
                joined.push_str(separator);
            }
            joined.push_str(piece);
        }
        joined.trim().to_string()
    }

    /// Greedily merge pieces that each fit the budget into chunks.
    fn merge(&self, splits: &[&str], separator: &str) -> Vec<String> {
        let mut merged = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();

        for &split in splits {
            if !current.is_empty() {
                let text = Self::join(&current, separator);
                let extends_past_budget = |text: &str| {
                    self.count_tokens(&format!("{}{}{}", text, separator, split)) > self.chunk_size
                };

                if extends_past_budget(&text) {
                    let tokens = self.count_tokens(&text);
                    if tokens > self.chunk_size + self.chunk_overlap {
                        warn!("Created a chunk of size {} > {}", tokens, self.chunk_size);
                    }
                    if !text.is_empty() {
                        merged.push(text);
                    }

                    if self.chunk_overlap == 0 {
                        current.clear();
                    } else {
                        // Keep a tail no larger than the overlap that leaves room for `split`
                        while !current.is_empty() {
                            let tail = Self::join(&current, separator);
                            if self.count_tokens(&tail) <= self.chunk_overlap
                                && !extends_past_budget(&tail)
                            {
                                break;
                            }
                            current.pop_front();
                        }
                    }
                }
            }
            current.push_back(split);
        }

        if !current.is_empty() {
            let text = Self::join(&current, separator);
            if !text.is_empty() {
                merged.push(text);
            }
        }

        merged
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let Some((separator, finer)) = separators.split_first() else {
            let text = text.trim();
            return if text.is_empty() { Vec::new() } else { vec![text.to_string()] };
        };

        let mut final_chunks = Vec::new();
        let mut good_splits: Vec<&str> = Vec::new();

        for split in Self::split_by_separator(text, separator) {
            if self.count_tokens(split) < self.chunk_size {
                good_splits.push(split);
                continue;
            }

            if !good_splits.is_empty() {
                final_chunks.extend(self.merge(&good_splits, separator));
                good_splits.clear();
            }

            if finer.is_empty() {
                warn!(
                    "Irreducible chunk of {} tokens exceeds chunk size {}",
                    self.count_tokens(split),
                    self.chunk_size
                );
                final_chunks.push(split.to_string());
            } else {
                final_chunks.extend(self.split_recursive(split, finer));
            }
        }

        if !good_splits.is_empty() {
            final_chunks.extend(self.merge(&good_splits, separator));
        }

        final_chunks
    }
}

impl Splitter for TextSplitter {
    fn split(&self, text: &str) -> Vec<String> {
        self.split_text(text)
    }
}
