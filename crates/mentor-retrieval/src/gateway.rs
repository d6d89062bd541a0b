//! Retrieval gateway: embedding plus nearest-neighbour search behind one handle.

use std::sync::Arc;

use tracing::{debug, info, warn};

use mentor_core::config::{Environment, RetrievalConfig};
use mentor_core::error::MentorError;
use mentor_core::types::ScoredChunk;

use crate::embedding::{EmbeddingProvider, HashEmbeddingProvider, HttpEmbeddingProvider};
use crate::index::{sort_by_score, HttpVectorIndex, InMemoryVectorIndex, VectorIndex};

const HEALTH_PROBE: &str = "health check probe";

/// Embeds text and searches the document corpus.
#[derive(Clone)]
pub struct RetrievalGateway {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl std::fmt::Debug for RetrievalGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalGateway")
            .field("embedder", &self.embedder.name())
            .field("index", &self.index.name())
            .field("dimension", &self.embedder.dimension())
            .finish()
    }
}

impl RetrievalGateway {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Build the gateway for the configured environment.
    ///
    /// With remote credentials present the HTTP clients are used. Production
    /// refuses to start without them; development falls back to local hash
    /// embeddings over an empty in-memory index.
    pub fn from_config(
        config: &RetrievalConfig,
        environment: Environment,
    ) -> Result<Self, MentorError> {
        if config.is_remote() {
            info!(
                vector_url = %config.vector_url,
                embedding_url = %config.embedding_url,
                model = %config.embedding_model,
                "Using remote retrieval services"
            );
            return Ok(Self::new(
                Arc::new(HttpEmbeddingProvider::from_config(config)?),
                Arc::new(HttpVectorIndex::from_config(config)?),
            ));
        }

        if environment == Environment::Production {
            return Err(MentorError::Config(
                "retrieval vector/embedding urls and tokens are required in production".to_string(),
            ));
        }

        warn!("Retrieval credentials missing; using local hash embeddings and an in-memory index");
        Ok(Self::local(config.embedding_dimension, InMemoryVectorIndex::new()))
    }

    /// Local gateway over the given in-memory index.
    pub fn local(dimension: usize, index: InMemoryVectorIndex) -> Self {
        Self::new(
            Arc::new(HashEmbeddingProvider::new(dimension)),
            Arc::new(index),
        )
    }

    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    /// Embed text. The result always has the configured dimension.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, MentorError> {
        let vector = self.embedder.embed(text).await?;
        let expected = self.embedder.dimension();
        if vector.len() != expected {
            return Err(MentorError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    /// Up to `top_k` chunks most similar to `query`, best first.
    ///
    /// When either remote is unreachable the result is empty rather than an
    /// error. Contract violations (bad status, malformed body, wrong
    /// dimension) still propagate.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>, MentorError> {
        if top_k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let vector = match self.embed(query).await {
            Ok(v) => v,
            Err(e) if e.is_transient() => {
                warn!(error = %e, "Embedding service unreachable; returning no results");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut chunks = match self.index.query(&vector, top_k).await {
            Ok(chunks) => chunks,
            Err(e) if e.is_transient() => {
                warn!(error = %e, "Vector index unreachable; returning no results");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        sort_by_score(&mut chunks);
        chunks.truncate(top_k);
        debug!(hits = chunks.len(), top_k, "Search complete");
        Ok(chunks)
    }

    /// True when a probe embedding comes back with the configured dimension.
    /// Never fails.
    pub async fn health_check(&self) -> bool {
        match self.embedder.embed(HEALTH_PROBE).await {
            Ok(v) => v.len() == self.embedder.dimension(),
            Err(e) => {
                warn!(error = %e, "Retrieval health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    struct FixedEmbedder {
        output: Vec<f32>,
        claimed: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, MentorError> {
            Ok(self.output.clone())
        }
        fn dimension(&self) -> usize {
            self.claimed
        }
        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct FailingEmbedder(fn() -> MentorError);

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, MentorError> {
            Err((self.0)())
        }
        fn dimension(&self) -> usize {
            2
        }
        fn name(&self) -> &str {
            "failing"
        }
    }

    /// Returns hits in the order given, ignoring top_k.
    struct UnsortedIndex;

    #[async_trait]
    impl VectorIndex for UnsortedIndex {
        async fn query(&self, _v: &[f32], _k: usize) -> Result<Vec<ScoredChunk>, MentorError> {
            Ok([0.2f32, 0.9, 0.5]
                .iter()
                .enumerate()
                .map(|(i, s)| ScoredChunk {
                    id: format!("c{}", i),
                    score: *s,
                    content: String::new(),
                    document_id: None,
                    title: None,
                    metadata: Default::default(),
                })
                .collect())
        }
        fn name(&self) -> &str {
            "unsorted"
        }
    }

    async fn seeded_index(dimension: usize) -> InMemoryVectorIndex {
        let index = InMemoryVectorIndex::new();
        let embedder = HashEmbeddingProvider::new(dimension);
        for (id, text) in [
            ("syllabus", "The course curriculum covers Rust, web services and databases"),
            ("pricing", "Tuition is paid monthly with scholarships available"),
            ("schedule", "Classes run weekday evenings from six to nine"),
        ] {
            let v = embedder.embed(text).await.unwrap();
            index.insert(id, v, text, Some(id.to_string()), None).unwrap();
        }
        index
    }

    #[tokio::test]
    async fn test_embed_rejects_wrong_length() {
        let gateway = RetrievalGateway::new(
            Arc::new(FixedEmbedder {
                output: vec![0.1, 0.2, 0.3],
                claimed: 4,
            }),
            Arc::new(InMemoryVectorIndex::new()),
        );
        let err = gateway.embed("hello").await.unwrap_err();
        assert!(matches!(
            err,
            MentorError::DimensionMismatch {
                expected: 4,
                actual: 3
            }
        ));
        assert!(!gateway.health_check().await);
    }

    #[tokio::test]
    async fn test_search_sorts_and_truncates() {
        let gateway = RetrievalGateway::new(
            Arc::new(FixedEmbedder {
                output: vec![1.0, 0.0],
                claimed: 2,
            }),
            Arc::new(UnsortedIndex),
        );
        let hits = gateway.search("anything", 2).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
    }

    #[tokio::test]
    async fn test_search_zero_k_or_blank_query_is_empty() {
        let gateway = RetrievalGateway::local(32, seeded_index(32).await);
        assert!(gateway.search("course", 0).await.unwrap().is_empty());
        assert!(gateway.search("   ", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_local_search_finds_related_chunk() {
        let gateway = RetrievalGateway::local(256, seeded_index(256).await);
        let hits = gateway.search("what does the curriculum cover", 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].id, "syllabus");
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_search_unreachable_index_is_empty() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let index =
            HttpVectorIndex::new(&format!("http://{}", addr), "t", Duration::from_secs(1)).unwrap();
        let gateway = RetrievalGateway::new(Arc::new(HashEmbeddingProvider::new(8)), Arc::new(index));

        let hits = gateway.search("tell me about the course", 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_search_unreachable_embedder_is_empty() {
        let gateway = RetrievalGateway::new(
            Arc::new(FailingEmbedder(|| MentorError::Connectivity("refused".into()))),
            Arc::new(InMemoryVectorIndex::new()),
        );
        assert!(gateway.search("course", 5).await.unwrap().is_empty());
        assert!(!gateway.health_check().await);
    }

    #[tokio::test]
    async fn test_search_upstream_error_propagates() {
        let app = Router::new().route(
            "/query",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "boom"}))) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let index =
            HttpVectorIndex::new(&format!("http://{}", addr), "t", Duration::from_secs(2)).unwrap();
        let gateway = RetrievalGateway::new(Arc::new(HashEmbeddingProvider::new(8)), Arc::new(index));

        let err = gateway.search("course", 5).await.unwrap_err();
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn test_health_check_local() {
        let gateway = RetrievalGateway::local(16, InMemoryVectorIndex::new());
        assert!(gateway.health_check().await);
        assert_eq!(gateway.dimension(), 16);
    }

    #[test]
    fn test_from_config_production_requires_remote() {
        let config = RetrievalConfig::default();
        let err = RetrievalGateway::from_config(&config, Environment::Production).unwrap_err();
        assert!(matches!(err, MentorError::Config(_)));

        let dev = RetrievalGateway::from_config(&config, Environment::Development).unwrap();
        assert_eq!(dev.dimension(), config.embedding_dimension);
    }
}
