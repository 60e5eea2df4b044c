//! CJK-aware splitter.
//!
//! CJK prose rarely contains ASCII spaces, so sentences are broken on
//! full-width punctuation before the recursive algorithm runs.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use ragkit_core::{Result, SplitterConfig, Splitter, TokenCounter};

use crate::TextSplitter;

lazy_static! {
    static ref BLANK_LINES_RE: Regex = Regex::new(r"\n{3,}").unwrap();
    static ref SPACE_RUN_RE: Regex = Regex::new(r" {3,}").unwrap();
    static ref STOP_RE: Regex = Regex::new(r"([。！？；])([^’”])").unwrap();
    static ref ELLIPSIS_RE: Regex = Regex::new(r"(……)([^’”])").unwrap();
    static ref QUOTED_STOP_RE: Regex = Regex::new(r"([。！？；][’”]{0,2})([^，。！？；])").unwrap();
}

/// Insert line breaks after CJK sentence stops.
pub fn normalize_cjk(text: &str) -> String {
    let text = BLANK_LINES_RE.replace_all(text, "\n");
    let text = SPACE_RUN_RE.replace_all(&text, " ");
    let text = STOP_RE.replace_all(&text, "${1}\n${2}");
    let text = ELLIPSIS_RE.replace_all(&text, "${1}\n${2}");
    let text = QUOTED_STOP_RE.replace_all(&text, "${1}\n${2}");
    text.trim_end().to_string()
}

/// [`TextSplitter`] that normalizes CJK punctuation first.
#[derive(Debug, Clone)]
pub struct CjkTextSplitter {
    inner: TextSplitter,
}

impl CjkTextSplitter {
    pub fn new(
        chunk_size: usize,
        chunk_overlap: usize,
        counter: Arc<dyn TokenCounter>,
    ) -> Result<Self> {
        Ok(Self {
            inner: TextSplitter::new(chunk_size, chunk_overlap, counter)?,
        })
    }

    pub fn from_config(config: &SplitterConfig, counter: Arc<dyn TokenCounter>) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap, counter)
    }

    /// Wrap an already configured splitter.
    pub fn from_splitter(inner: TextSplitter) -> Self {
        Self { inner }
    }
}

impl Splitter for CjkTextSplitter {
    fn split(&self, text: &str) -> Vec<String> {
        self.inner.split_text(&normalize_cjk(text))
    }
}

/// Build the splitter selected by configuration.
pub fn splitter_from_config(
    config: &SplitterConfig,
    counter: Arc<dyn TokenCounter>,
) -> Result<Arc<dyn Splitter>> {
    if config.cjk {
        Ok(Arc::new(CjkTextSplitter::from_config(config, counter)?))
    } else {
        Ok(Arc::new(TextSplitter::from_config(config, counter)?))
    }
}
