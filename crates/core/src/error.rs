use thiserror::Error;

/// Failures raised by the embedding provider, convertible into both the
/// ingest and search pipelines.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("embedding endpoint returned {status}: {details}")]
    Endpoint { status: String, details: String },

    #[error("invalid response from embedding endpoint: {0}")]
    InvalidResponse(String),

    #[error("embedding dimension {actual} does not match expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid embedder config: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("no extractable text layer: {0}")]
    UnsupportedDocument(String),

    #[error("embedding provider failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("index build cancelled for document: {0}")]
    Cancelled(String),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("embedding provider failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("none of the requested documents are indexed: {0}")]
    NoMatchingDocuments(String),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
