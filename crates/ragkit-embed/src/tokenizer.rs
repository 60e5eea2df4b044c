//! Token counters used by the splitters.

use std::path::Path;
use std::sync::Arc;

use tokenizers::Tokenizer;
use tracing::{info, warn};

use ragkit_core::{RagError, Result, TokenCounter};

/// Encoded by [`HfTokenCounter::from_file`] to check a tokenizer is usable.
const SAMPLE_TEXT: &str = "ragkit tokenizer check";

/// Counts whitespace-separated words.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenCounter;

impl TokenCounter for WordTokenCounter {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

/// Counts tokens with a HuggingFace `tokenizer.json`.
///
/// [`TokenCounter::count`] cannot fail: if encoding a text fails, it logs a
/// warning and returns the whitespace word count for that text instead, so
/// chunk budgets for such texts are measured in words. Use
/// [`HfTokenCounter::try_count`] to surface the error. [`HfTokenCounter::from_file`]
/// rejects tokenizers that cannot encode a sample text.
#[derive(Clone)]
pub struct HfTokenCounter {
    tokenizer: Arc<Tokenizer>,
}

impl HfTokenCounter {
    /// Load a tokenizer from a `tokenizer.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading tokenizer from {:?}", path);

        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| RagError::tokenizer(format!("Failed to load tokenizer: {}", e)))?;

        let counter = Self::from_tokenizer(tokenizer);
        counter.try_count(SAMPLE_TEXT)?;
        Ok(counter)
    }

    pub fn from_tokenizer(tokenizer: Tokenizer) -> Self {
        Self {
            tokenizer: Arc::new(tokenizer),
        }
    }

    /// Count tokens, surfacing tokenizer failures.
    pub fn try_count(&self, text: &str) -> Result<usize> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| RagError::tokenizer(format!("Tokenization failed: {}", e)))?;
        Ok(encoding.get_ids().len())
    }
}

impl std::fmt::Debug for HfTokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HfTokenCounter").finish_non_exhaustive()
    }
}

impl TokenCounter for HfTokenCounter {
    fn count(&self, text: &str) -> usize {
        match self.try_count(text) {
            Ok(n) => n,
            Err(e) => {
                warn!("{}; falling back to word count", e);
                WordTokenCounter.count(text)
            }
        }
    }
}
