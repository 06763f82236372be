use crate::embeddings::Embedder;
use crate::error::EmbedError;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variables `from_env` reads to reach a hosted provider.
pub const ENDPOINT_VAR: &str = "SEMSEARCH_EMBED_ENDPOINT";
pub const MODEL_VAR: &str = "SEMSEARCH_EMBED_MODEL";
pub const API_KEY_VAR: &str = "SEMSEARCH_EMBED_API_KEY";
pub const DIMENSIONS_VAR: &str = "SEMSEARCH_EMBED_DIMENSIONS";

#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible embeddings endpoint. One text per call so
/// ingest stays cancellable between blocks; calls carry a hard timeout and
/// are never retried, since a provider failure must stay visible to the
/// caller.
pub struct RemoteEmbedder {
    client: Client,
    endpoint: Url,
    model: String,
    api_key: Option<String>,
    dimensions: usize,
}

impl RemoteEmbedder {
    /// `endpoint` is the full URL of the embeddings route, not a base URL.
    /// `dimensions` must state what the configured model produces; every
    /// response is checked against it.
    pub fn new(
        endpoint: &str,
        model: impl Into<String>,
        api_key: Option<String>,
        dimensions: usize,
    ) -> Result<Self, EmbedError> {
        let endpoint = Url::parse(endpoint.trim())?;
        let model = model.into();
        if model.trim().is_empty() {
            return Err(EmbedError::Config("model name is empty".to_string()));
        }
        if dimensions == 0 {
            return Err(EmbedError::Config(
                "dimensions must be at least 1".to_string(),
            ));
        }

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            endpoint,
            model,
            api_key,
            dimensions,
        })
    }

    /// Builds an embedder from the `SEMSEARCH_EMBED_*` variables. `Ok(None)`
    /// when no endpoint is configured, so callers can fall back to the local
    /// hashing embedder.
    pub fn from_env() -> Result<Option<Self>, EmbedError> {
        let endpoint = match read_env(ENDPOINT_VAR) {
            Some(endpoint) => endpoint,
            None => return Ok(None),
        };
        let model = read_env(MODEL_VAR).ok_or_else(|| {
            EmbedError::Config(format!("{MODEL_VAR} must be set alongside {ENDPOINT_VAR}"))
        })?;
        let dimensions = read_env(DIMENSIONS_VAR).ok_or_else(|| {
            EmbedError::Config(format!(
                "{DIMENSIONS_VAR} must be set alongside {ENDPOINT_VAR}"
            ))
        })?;
        let dimensions = dimensions.parse::<usize>().map_err(|_| {
            EmbedError::Config(format!("{DIMENSIONS_VAR} is not a number: {dimensions}"))
        })?;

        Self::new(&endpoint, model, read_env(API_KEY_VAR), dimensions).map(Some)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let trimmed = value.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

impl Embedder for RemoteEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let payload = EmbeddingRequest {
            model: &self.model,
            input: [text],
        };

        let mut request = self.client.post(self.endpoint.clone()).json(&payload);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let details = response.text().unwrap_or_default();
            return Err(EmbedError::Endpoint {
                status: status.to_string(),
                details,
            });
        }

        let parsed: EmbeddingResponse = response.json()?;
        let item = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::InvalidResponse("data array is empty".to_string()))?;

        if item.embedding.len() != self.dimensions {
            return Err(EmbedError::DimensionMismatch {
                expected: self.dimensions,
                actual: item.embedding.len(),
            });
        }

        Ok(item.embedding)
    }
}
