//! Vector index trait and implementations.
//!
//! - `HttpVectorIndex` queries a remote vector-search service.
//! - `InMemoryVectorIndex` is a brute-force cosine index used in development
//!   mode and tests. All searches are O(n), which is fine for a small corpus.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use mentor_core::config::RetrievalConfig;
use mentor_core::error::MentorError;
use mentor_core::types::{Metadata, ScoredChunk};

use crate::http;

/// Nearest-neighbour search over document chunks.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `top_k` chunks ordered by descending similarity.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>, MentorError>;

    /// Short label for logs and health output.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// HttpVectorIndex - remote vector-search service
// ---------------------------------------------------------------------------

const SERVICE: &str = "vector index";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    result: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: Value,
    score: f32,
    #[serde(default)]
    metadata: Option<Metadata>,
}

impl QueryMatch {
    fn into_chunk(self) -> ScoredChunk {
        let id = match self.id {
            Value::String(s) => s,
            other => other.to_string(),
        };
        let mut metadata = self.metadata.unwrap_or_default();
        let mut take = |key: &str| match metadata.remove(key) {
            Some(Value::String(s)) => Some(s),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
        let content = take("content").unwrap_or_default();
        let document_id = take("document_id");
        let title = take("title");
        ScoredChunk {
            id,
            score: self.score,
            content,
            document_id,
            title,
            metadata,
        }
    }
}

/// Remote vector-search client.
///
/// Posts `{vector, topK, includeMetadata: true}` to `{base_url}/query` and
/// reads `result[].{id, score, metadata}`.
pub struct HttpVectorIndex {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for HttpVectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpVectorIndex")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl HttpVectorIndex {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, MentorError> {
        Ok(Self {
            client: http::build_client(timeout)?,
            base_url: http::trim_base(base_url),
            token: token.to_string(),
        })
    }

    pub fn from_config(config: &RetrievalConfig) -> Result<Self, MentorError> {
        Self::new(
            &config.vector_url,
            &config.vector_token,
            Duration::from_secs(config.request_timeout_secs),
        )
    }
}

#[async_trait]
impl VectorIndex for HttpVectorIndex {
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>, MentorError> {
        let url = format!("{}/query", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&QueryRequest {
                vector,
                top_k,
                include_metadata: true,
            })
            .send()
            .await
            .map_err(|e| http::transport_error(SERVICE, e))?;

        let response = http::check_status(SERVICE, response).await?;
        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| http::malformed(SERVICE, e))?;

        let chunks: Vec<ScoredChunk> = body.result.into_iter().map(QueryMatch::into_chunk).collect();
        debug!(hits = chunks.len(), top_k, "Vector query complete");
        Ok(chunks)
    }

    fn name(&self) -> &str {
        "http"
    }
}

// ---------------------------------------------------------------------------
// InMemoryVectorIndex - brute-force cosine similarity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct IndexEntry {
    embedding: Vec<f32>,
    chunk: ScoredChunk,
}

/// In-memory vector index using brute-force cosine similarity.
///
/// Thread-safe via interior RwLock; clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct InMemoryVectorIndex {
    entries: Arc<RwLock<HashMap<String, IndexEntry>>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a chunk with its embedding. Overwrites any entry with the same id.
    pub fn insert(
        &self,
        id: impl Into<String>,
        embedding: Vec<f32>,
        content: impl Into<String>,
        title: Option<String>,
        document_id: Option<String>,
    ) -> Result<(), MentorError> {
        let id = id.into();
        let chunk = ScoredChunk {
            id: id.clone(),
            score: 0.0,
            content: content.into(),
            document_id,
            title,
            metadata: Metadata::new(),
        };
        let mut entries = self
            .entries
            .write()
            .map_err(|e| MentorError::Storage(format!("Lock poisoned: {}", e)))?;
        entries.insert(id, IndexEntry { embedding, chunk });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>, MentorError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| MentorError::Storage(format!("Lock poisoned: {}", e)))?;

        let mut scored: Vec<ScoredChunk> = entries
            .values()
            .map(|entry| ScoredChunk {
                score: cosine_similarity(vector, &entry.embedding),
                ..entry.chunk.clone()
            })
            .collect();

        sort_by_score(&mut scored);
        scored.truncate(top_k);
        Ok(scored)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Sort chunks by descending score. Ties keep id order for stable output.
pub(crate) fn sort_by_score(chunks: &mut [ScoredChunk]) {
    chunks.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Cosine similarity between two vectors; 0.0 on length mismatch or zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();
    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    (dot / (mag_a * mag_b)) as f32
}
