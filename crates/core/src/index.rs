use crate::embeddings::Embedder;
use crate::error::{EmbedError, IngestError, SearchError};
use crate::models::TextBlock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Signal for abandoning an in-progress index build. Clones share state;
/// tripping any clone trips them all.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedBlock {
    pub block: TextBlock,
    pub embedding: Vec<f32>,
}

/// One document's blocks plus their embeddings, in extraction order. Built
/// in one shot and never mutated afterwards; a replacement is a whole new
/// value swapped in by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentIndex {
    document_id: String,
    dimensions: usize,
    built_at: DateTime<Utc>,
    source_checksum: Option<String>,
    blocks: Vec<EmbeddedBlock>,
}

impl DocumentIndex {
    /// Embeds every block's cleaned text and assembles the index. Any
    /// provider failure aborts the whole build; partial state is dropped,
    /// never returned.
    pub fn build(
        document_id: impl Into<String>,
        blocks: Vec<TextBlock>,
        embedder: &dyn Embedder,
    ) -> Result<Self, IngestError> {
        Self::build_inner(document_id.into(), blocks, embedder, None)
    }

    /// Same as [`build`](Self::build), checking the token between provider
    /// calls so a long build can be abandoned.
    pub fn build_with_cancel(
        document_id: impl Into<String>,
        blocks: Vec<TextBlock>,
        embedder: &dyn Embedder,
        cancel: &CancelToken,
    ) -> Result<Self, IngestError> {
        Self::build_inner(document_id.into(), blocks, embedder, Some(cancel))
    }

    fn build_inner(
        document_id: String,
        blocks: Vec<TextBlock>,
        embedder: &dyn Embedder,
        cancel: Option<&CancelToken>,
    ) -> Result<Self, IngestError> {
        if blocks.is_empty() {
            return Err(IngestError::InvalidArgument(
                "cannot build an index without text blocks".to_string(),
            ));
        }

        let dimensions = embedder.dimensions();
        let mut embedded = Vec::with_capacity(blocks.len());

        for block in blocks {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(IngestError::Cancelled(document_id));
            }

            let embedding = embedder.embed(&block.cleaned_text)?;
            if embedding.len() != dimensions {
                return Err(EmbedError::DimensionMismatch {
                    expected: dimensions,
                    actual: embedding.len(),
                }
                .into());
            }

            embedded.push(EmbeddedBlock { block, embedding });
        }

        Ok(Self {
            document_id,
            dimensions,
            built_at: Utc::now(),
            source_checksum: None,
            blocks: embedded,
        })
    }

    /// Tags the index with a digest of the source bytes so a later ingest of
    /// identical content can be skipped.
    pub fn with_source_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.source_checksum = Some(checksum.into());
        self
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn source_checksum(&self) -> Option<&str> {
        self.source_checksum.as_deref()
    }

    pub fn blocks(&self) -> &[EmbeddedBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Exact linear scan: scores every block against the query vector and
    /// returns up to `top_k` by descending cosine similarity, ties resolved
    /// by block order.
    pub fn query(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<(&EmbeddedBlock, f32)>, SearchError> {
        if top_k == 0 {
            return Err(SearchError::InvalidArgument(
                "top_k must be at least 1".to_string(),
            ));
        }
        if query_vector.len() != self.dimensions {
            return Err(SearchError::InvalidArgument(format!(
                "query vector has dimension {}, index {} was built with {}",
                query_vector.len(),
                self.document_id,
                self.dimensions
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .blocks
            .iter()
            .enumerate()
            .map(|(position, embedded)| {
                (
                    position,
                    cosine_similarity(query_vector, &embedded.embedding),
                )
            })
            .collect();

        scored.sort_by(|left, right| right.1.total_cmp(&left.1).then(left.0.cmp(&right.0)));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| (&self.blocks[position], score))
            .collect())
    }
}

/// Cosine similarity between two equal-length vectors. A zero-magnitude
/// vector on either side scores 0.0 rather than dividing by zero.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    debug_assert_eq!(left.len(), right.len());

    let mut dot = 0f32;
    let mut left_norm = 0f32;
    let mut right_norm = 0f32;
    for (a, b) in left.iter().zip(right) {
        dot += a * b;
        left_norm += a * a;
        right_norm += b * b;
    }

    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    dot / (left_norm.sqrt() * right_norm.sqrt())
}
