use serde::{Deserialize, Serialize};

/// Result-count limit applied when the caller does not pick one.
pub const DEFAULT_TOP_K: usize = 5;

/// One semantically meaningful unit of page text, produced by the extractor
/// at ingest time and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TextBlock {
    pub document_id: String,
    /// 1-based page the block was extracted from.
    pub page_number: u32,
    /// 1-based position of the block within its page.
    pub ordinal: u32,
    /// The fragment as extracted, before cleanup.
    pub raw_text: String,
    /// List markers stripped, whitespace collapsed. This is what gets embedded.
    pub cleaned_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SearchQuery {
    pub text: String,
    /// Restrict the search to these document ids. Empty means all documents.
    pub document_ids: Vec<String>,
    pub top_k: usize,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            document_ids: Vec::new(),
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Lowercased query tokens worth anchoring a snippet on.
    pub fn terms(&self) -> Vec<String> {
        self.text
            .split_whitespace()
            .map(|token| token.to_lowercase())
            .filter(|token| token.len() > 2)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub document_id: String,
    pub page_number: u32,
    pub snippet: String,
    /// Cosine similarity against the query embedding; higher is closer.
    pub score: f32,
}
