//! Feedback handler: validates and stores ratings, reports trends.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use mentor_core::types::{AgentType, Feedback, FeedbackSummary, ResponseEnvelope};
use mentor_storage::FeedbackRepository;

use crate::error::AgentError;
use crate::handler::{AgentHandler, HandlerRequest};

pub struct FeedbackHandler {
    feedback: Arc<FeedbackRepository>,
}

impl FeedbackHandler {
    pub fn new(feedback: Arc<FeedbackRepository>) -> Self {
        Self { feedback }
    }

    /// Store a rating for a conversation turn.
    ///
    /// Ratings outside {-1, 0, 1} and unknown conversations are rejected as
    /// validation errors before anything is written.
    pub async fn submit(
        &self,
        conversation_id: Uuid,
        rating: i64,
        comment: Option<String>,
    ) -> Result<Feedback, AgentError> {
        let comment = comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let stored = self.feedback.record(conversation_id, rating, comment).await?;
        tracing::info!(
            feedback_id = %stored.id,
            conversation_id = %conversation_id,
            rating,
            "Feedback recorded"
        );
        Ok(stored)
    }

    pub async fn trends(&self) -> Result<FeedbackSummary, AgentError> {
        Ok(self.feedback.summary().await?)
    }
}

#[async_trait]
impl AgentHandler for FeedbackHandler {
    fn agent_type(&self) -> AgentType {
        AgentType::Feedback
    }

    /// Reads `conversation_id`, `rating` and optional `comment` from the
    /// request metadata.
    async fn handle(&self, request: &HandlerRequest) -> Result<ResponseEnvelope, AgentError> {
        let conversation_id = request
            .meta_str("conversation_id")
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| {
                AgentError::InvalidRequest("conversation_id is missing or invalid".to_string())
            })?;
        let rating = request
            .metadata
            .get("rating")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| AgentError::InvalidRequest("rating is missing".to_string()))?;
        let comment = request.meta_str("comment").map(str::to_string);

        let stored = self.submit(conversation_id, rating, comment).await?;
        Ok(ResponseEnvelope::ok("Thanks for your feedback!")
            .with_metadata("feedback_id", stored.id.to_string()))
    }
}
