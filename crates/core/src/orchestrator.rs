use crate::embeddings::Embedder;
use crate::error::SearchError;
use crate::models::{SearchHit, SearchQuery};
use crate::registry::IndexRegistry;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

const SNIPPET_MAX_CHARS: usize = 280;

/// Runs one search end to end: embed the query once, snapshot the selected
/// documents, rank across them, and project the hits.
pub struct SearchCoordinator<E: Embedder> {
    registry: Arc<IndexRegistry>,
    embedder: E,
}

impl<E: Embedder> SearchCoordinator<E> {
    pub fn new(registry: Arc<IndexRegistry>, embedder: E) -> Self {
        Self { registry, embedder }
    }

    pub fn registry(&self) -> &IndexRegistry {
        &self.registry
    }

    pub fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, SearchError> {
        if query.top_k == 0 {
            return Err(SearchError::InvalidArgument(
                "top_k must be at least 1".to_string(),
            ));
        }
        let text = query.text.trim();
        if text.is_empty() {
            return Err(SearchError::InvalidArgument(
                "query text is empty".to_string(),
            ));
        }

        // One provider call per search, before any index work.
        let query_vector = self.embedder.embed(text)?;

        let view = self.registry.combined_view(&query.document_ids);
        if !query.document_ids.is_empty() {
            if view.is_empty() {
                return Err(SearchError::NoMatchingDocuments(
                    query.document_ids.join(", "),
                ));
            }

            let requested: HashSet<&str> = query.document_ids.iter().map(String::as_str).collect();
            let dropped = requested.len().saturating_sub(view.member_count());
            if dropped > 0 {
                debug!(dropped, "dropped stale document ids from search selection");
            }
        }

        let terms = query.terms();
        let hits = view.query(&query_vector, query.top_k)?;

        Ok(hits
            .into_iter()
            .map(|(embedded, score)| SearchHit {
                document_id: embedded.block.document_id.clone(),
                page_number: embedded.block.page_number,
                snippet: build_snippet(&embedded.block.cleaned_text, &terms),
                score,
            })
            .collect())
    }
}

/// Cuts the display snippet out of a block's cleaned text: short blocks pass
/// through whole, long ones get a window around the first query term that
/// occurs literally, or the head of the block when none does.
fn build_snippet(text: &str, terms: &[String]) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= SNIPPET_MAX_CHARS {
        return text.to_string();
    }

    // Case folding can grow a char, so term offsets found in the folded
    // text are mapped back to the original char they fall in.
    let mut lowered = String::with_capacity(text.len());
    let mut starts = Vec::with_capacity(chars.len());
    for ch in &chars {
        starts.push(lowered.len());
        lowered.extend(ch.to_lowercase());
    }

    let anchor = terms
        .iter()
        .filter_map(|term| lowered.find(term.as_str()))
        .min()
        .map(|byte| starts.partition_point(|&start| start <= byte) - 1)
        .unwrap_or(0);

    let half = SNIPPET_MAX_CHARS / 2;
    let end = (anchor.saturating_sub(half) + SNIPPET_MAX_CHARS).min(chars.len());
    let start = end.saturating_sub(SNIPPET_MAX_CHARS);

    let mut snippet: String = chars[start..end].iter().collect();
    if start > 0 {
        snippet = format!("...{}", snippet.trim_start());
    }
    if end < chars.len() {
        snippet = format!("{}...", snippet.trim_end());
    }
    snippet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{list_marker_regex, page_blocks};
    use crate::embeddings::HashingEmbedder;
    use crate::error::EmbedError;
    use crate::extractor::PageText;
    use crate::index::DocumentIndex;
    use crate::models::TextBlock;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Wraps the hashing embedder and counts provider calls.
    struct CountingEmbedder {
        inner: HashingEmbedder,
        calls: Rc<Cell<usize>>,
    }

    impl Embedder for CountingEmbedder {
        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
            self.calls.set(self.calls.get() + 1);
            self.inner.embed(text)
        }
    }

    fn block(document_id: &str, page: u32, ordinal: u32, text: &str) -> TextBlock {
        TextBlock {
            document_id: document_id.to_string(),
            page_number: page,
            ordinal,
            raw_text: text.to_string(),
            cleaned_text: text.to_string(),
        }
    }

    fn registry_with_notes() -> Arc<IndexRegistry> {
        let registry = Arc::new(IndexRegistry::in_memory());
        let embedder = HashingEmbedder::default();
        registry
            .put(
                DocumentIndex::build(
                    "notes.pdf",
                    vec![
                        block("notes.pdf", 1, 1, "Apples and pears"),
                        block("notes.pdf", 1, 2, "Call the plumber"),
                        block("notes.pdf", 2, 1, "Water the plants"),
                    ],
                    &embedder,
                )
                .unwrap(),
            )
            .unwrap();
        registry
            .put(
                DocumentIndex::build(
                    "work.pdf",
                    vec![block("work.pdf", 1, 1, "Quarterly budget review")],
                    &embedder,
                )
                .unwrap(),
            )
            .unwrap();
        registry
    }

    fn coordinator(registry: Arc<IndexRegistry>) -> SearchCoordinator<HashingEmbedder> {
        SearchCoordinator::new(registry, HashingEmbedder::default())
    }

    #[test]
    fn a_block_text_query_retrieves_its_block() {
        let coordinator = coordinator(registry_with_notes());
        let hits = coordinator
            .search(&SearchQuery::new("Call the plumber"))
            .unwrap();

        assert_eq!(hits[0].document_id, "notes.pdf");
        assert_eq!(hits[0].page_number, 1);
        assert_eq!(hits[0].snippet, "Call the plumber");
        assert!((hits[0].score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn blank_queries_are_rejected_before_the_provider_is_called() {
        let calls = Rc::new(Cell::new(0));
        let coordinator = SearchCoordinator::new(
            registry_with_notes(),
            CountingEmbedder {
                inner: HashingEmbedder::default(),
                calls: Rc::clone(&calls),
            },
        );

        let result = coordinator.search(&SearchQuery::new("   "));
        assert!(matches!(result, Err(SearchError::InvalidArgument(_))));

        let mut query = SearchQuery::new("apples");
        query.top_k = 0;
        let result = coordinator.search(&query);
        assert!(matches!(result, Err(SearchError::InvalidArgument(_))));

        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn the_query_is_embedded_exactly_once() {
        let calls = Rc::new(Cell::new(0));
        let coordinator = SearchCoordinator::new(
            registry_with_notes(),
            CountingEmbedder {
                inner: HashingEmbedder::default(),
                calls: Rc::clone(&calls),
            },
        );

        coordinator.search(&SearchQuery::new("apples")).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn an_entirely_unknown_selection_is_an_error() {
        let coordinator = coordinator(registry_with_notes());
        let mut query = SearchQuery::new("apples");
        query.document_ids = vec!["ghost.pdf".to_string(), "gone.pdf".to_string()];

        let result = coordinator.search(&query);
        assert!(matches!(result, Err(SearchError::NoMatchingDocuments(_))));
    }

    #[test]
    fn stale_ids_are_dropped_and_the_rest_searched() {
        let coordinator = coordinator(registry_with_notes());
        let mut query = SearchQuery::new("Apples and pears");
        query.document_ids = vec!["notes.pdf".to_string(), "ghost.pdf".to_string()];

        let hits = coordinator.search(&query).unwrap();
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|hit| hit.document_id == "notes.pdf"));
    }

    #[test]
    fn an_empty_registry_returns_no_hits_without_error() {
        let coordinator = coordinator(Arc::new(IndexRegistry::in_memory()));
        let hits = coordinator.search(&SearchQuery::new("anything")).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn identical_queries_return_identical_results() {
        let coordinator = coordinator(registry_with_notes());
        let query = SearchQuery::new("water plants");

        let first = coordinator.search(&query).unwrap();
        let second = coordinator.search(&query).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn results_never_exceed_top_k_or_the_corpus() {
        let coordinator = coordinator(registry_with_notes());

        let mut query = SearchQuery::new("apples");
        query.top_k = 50;
        let hits = coordinator.search(&query).unwrap();
        assert!(hits.len() <= 4);

        query.top_k = 2;
        let hits = coordinator.search(&query).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn bulleted_pages_rank_by_their_blocks() {
        let marker = list_marker_regex().unwrap();
        let mut blocks = page_blocks(
            "notes.pdf",
            &PageText {
                number: 1,
                text: "• Apples\n• Bananas".to_string(),
            },
            &marker,
        );
        blocks.extend(page_blocks(
            "notes.pdf",
            &PageText {
                number: 2,
                text: "Grocery run complete".to_string(),
            },
            &marker,
        ));

        let embedder = HashingEmbedder::default();
        let registry = Arc::new(IndexRegistry::in_memory());
        registry
            .put(DocumentIndex::build("notes.pdf", blocks, &embedder).unwrap())
            .unwrap();

        let coordinator = SearchCoordinator::new(Arc::clone(&registry), embedder);
        let mut query = SearchQuery::new("Apples");
        query.document_ids = vec!["notes.pdf".to_string()];

        let hits = coordinator.search(&query).unwrap();
        assert_eq!(hits[0].page_number, 1);
        assert_eq!(hits[0].snippet, "Apples");
    }

    #[test]
    fn short_blocks_pass_through_as_their_own_snippet() {
        let terms = vec!["apples".to_string()];
        assert_eq!(
            build_snippet("Apples and pears", &terms),
            "Apples and pears"
        );
    }

    #[test]
    fn long_blocks_window_around_the_first_term() {
        let filler = "lorem ipsum dolor sit amet ".repeat(30);
        let text = format!("{filler}ripe apples in the orchard {filler}");
        let snippet = build_snippet(&text, &["apples".to_string()]);

        assert!(snippet.contains("apples"));
        assert!(snippet.starts_with("..."));
        assert!(snippet.ends_with("..."));
        assert!(snippet.chars().count() <= SNIPPET_MAX_CHARS + 6);
    }

    #[test]
    fn multi_char_case_folds_do_not_drift_the_window() {
        // Each dotted capital I folds to two chars; the window must still
        // land on the term as the reader sees it.
        let text = format!("{} roadmap {}", "İ".repeat(200), "x".repeat(300));
        let snippet = build_snippet(&text, &["roadmap".to_string()]);

        assert!(snippet.contains("roadmap"));
        assert!(snippet.chars().count() <= SNIPPET_MAX_CHARS + 6);
    }

    #[test]
    fn long_blocks_without_a_term_keep_their_head() {
        let text = "word ".repeat(200);
        let snippet = build_snippet(&text, &["missing".to_string()]);

        assert!(snippet.starts_with("word"));
        assert!(snippet.ends_with("..."));
    }
}
