//! Embedding provider trait and implementations.
//!
//! - `HttpEmbeddingProvider` calls a remote `/embeddings` endpoint with a
//!   bearer token. This is the production backend.
//! - `HashEmbeddingProvider` produces deterministic hash-based vectors for
//!   development mode and tests.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use mentor_core::config::RetrievalConfig;
use mentor_core::error::MentorError;

use crate::http;

/// Turns text into fixed-dimension vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one piece of text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MentorError>;

    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;

    /// Short label for logs and health output.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// HttpEmbeddingProvider - remote embedding API
// ---------------------------------------------------------------------------

const SERVICE: &str = "embedding provider";

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
    encoding_format: &'static str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Remote embedding API client.
///
/// Sends `{model, input: [text], encoding_format: "float"}` to
/// `{base_url}/embeddings` and reads `data[0].embedding`.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    token: String,
    model: String,
    dimension: usize,
}

impl std::fmt::Debug for HttpEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbeddingProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl HttpEmbeddingProvider {
    pub fn new(
        base_url: &str,
        token: &str,
        model: &str,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self, MentorError> {
        if dimension == 0 {
            return Err(MentorError::Config(
                "embedding dimension must be positive".to_string(),
            ));
        }
        Ok(Self {
            client: http::build_client(timeout)?,
            base_url: http::trim_base(base_url),
            token: token.to_string(),
            model: model.to_string(),
            dimension,
        })
    }

    pub fn from_config(config: &RetrievalConfig) -> Result<Self, MentorError> {
        Self::new(
            &config.embedding_url,
            &config.embedding_token,
            &config.embedding_model,
            config.embedding_dimension,
            Duration::from_secs(config.request_timeout_secs),
        )
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MentorError> {
        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: [text],
                encoding_format: "float",
            })
            .send()
            .await
            .map_err(|e| http::transport_error(SERVICE, e))?;

        let response = http::check_status(SERVICE, response).await?;
        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| http::malformed(SERVICE, e))?;

        let embedding = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| http::malformed(SERVICE, "no embedding in data"))?;

        if embedding.len() != self.dimension {
            return Err(MentorError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        debug!(chars = text.len(), dimension = embedding.len(), "Embedded text");
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "http"
    }
}

// ---------------------------------------------------------------------------
// HashEmbeddingProvider - deterministic local vectors
// ---------------------------------------------------------------------------

/// Deterministic embeddings derived from hashing the input.
///
/// Identical inputs always produce identical unit vectors. Texts sharing
/// words land closer together than unrelated texts, which is enough for
/// development-mode retrieval over a small in-memory corpus.
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dimension: usize,
}

impl HashEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn hash_to_vector(&self, text: &str) -> Vec<f32> {
        let mut result = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();
        for word in lowered.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            for i in 0..4u64 {
                let mut hasher = DefaultHasher::new();
                word.hash(&mut hasher);
                i.hash(&mut hasher);
                let h = hasher.finish();
                let slot = (h % self.dimension as u64) as usize;
                let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
                result[slot] += sign;
            }
        }

        let norm: f32 = result.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut result {
                *val /= norm;
            }
        }
        result
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MentorError> {
        if text.trim().is_empty() {
            return Err(MentorError::Validation("Cannot embed empty text".to_string()));
        }
        Ok(self.hash_to_vector(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hash"
    }
}
