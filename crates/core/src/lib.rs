pub mod blocks;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod registry;
pub mod remote;
pub mod storage;

pub use blocks::{clean_block_text, list_marker_regex, normalize_whitespace, page_blocks};
pub use embeddings::{Embedder, HashingEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{EmbedError, IngestError, SearchError};
pub use extractor::{extract_blocks, extract_page_texts, LopdfExtractor, PageText, PdfExtractor};
pub use index::{cosine_similarity, CancelToken, DocumentIndex, EmbeddedBlock};
pub use ingest::{
    digest_bytes, discover_pdf_files, document_id_for_path, ingest_file, ingest_folder,
    IngestOptions, IngestOutcome, IngestionReport, SkippedDocument,
};
pub use models::{SearchHit, SearchQuery, TextBlock, DEFAULT_TOP_K};
pub use orchestrator::SearchCoordinator;
pub use registry::{CombinedView, IndexRegistry};
pub use remote::RemoteEmbedder;
pub use storage::{DocumentStore, IndexStore, DOCUMENT_SUBDIR, INDEX_SUBDIR};
