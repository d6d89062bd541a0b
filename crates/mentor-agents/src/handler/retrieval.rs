//! Knowledge retrieval handler.
//!
//! Answers course and general questions from the document corpus: the top
//! chunks are quoted back as sources and the best score becomes the
//! envelope's confidence.

use async_trait::async_trait;

use mentor_core::types::{AgentType, ResponseEnvelope, ScoredChunk, SourceRef};
use mentor_retrieval::RetrievalGateway;

use crate::error::AgentError;
use crate::handler::{snippet, AgentHandler, HandlerRequest};

const NO_RESULTS: &str = "I couldn't find anything in the course materials about that. \
Could you rephrase, or ask about the curriculum, schedule or enrollment?";

/// Handler backed by the retrieval gateway.
pub struct RetrievalHandler {
    gateway: RetrievalGateway,
    top_k: usize,
    snippet_chars: usize,
}

impl RetrievalHandler {
    pub fn new(gateway: RetrievalGateway, top_k: usize, snippet_chars: usize) -> Self {
        Self {
            gateway,
            top_k,
            snippet_chars: snippet_chars.max(1),
        }
    }

    fn compose(&self, chunks: &[ScoredChunk]) -> String {
        let mut answer = String::from("Here's what I found in the course materials:\n");
        for chunk in chunks {
            let text = snippet(&chunk.content, self.snippet_chars);
            match chunk.title.as_deref() {
                Some(title) if !title.is_empty() => {
                    answer.push_str(&format!("\n- {}: {}", title, text))
                }
                _ => answer.push_str(&format!("\n- {}", text)),
            }
        }
        answer
    }
}

#[async_trait]
impl AgentHandler for RetrievalHandler {
    fn agent_type(&self) -> AgentType {
        AgentType::Retrieval
    }

    async fn handle(&self, request: &HandlerRequest) -> Result<ResponseEnvelope, AgentError> {
        let chunks = self.gateway.search(&request.message, self.top_k).await?;

        if chunks.is_empty() {
            tracing::debug!(session_id = %request.session_id, "No chunks retrieved");
            return Ok(ResponseEnvelope::ok(NO_RESULTS)
                .with_confidence(0.0)
                .with_metadata("chunks", 0));
        }

        let confidence = chunks[0].score.clamp(0.0, 1.0);
        let sources = chunks
            .iter()
            .map(|c| SourceRef {
                id: c.id.clone(),
                snippet: snippet(&c.content, self.snippet_chars),
            })
            .collect();
        let documents: Vec<String> = chunks
            .iter()
            .filter_map(|c| c.document_id.clone())
            .collect();

        tracing::debug!(
            session_id = %request.session_id,
            chunks = chunks.len(),
            confidence,
            "Retrieved answer"
        );

        Ok(ResponseEnvelope::ok(self.compose(&chunks))
            .with_confidence(confidence)
            .with_sources(sources)
            .with_metadata("chunks", chunks.len())
            .with_metadata("document_ids", documents))
    }
}
