//! Agent handler capability and its variants.
//!
//! Every handler turns a `HandlerRequest` into a `ResponseEnvelope`. The
//! router owns the mapping from intent to handler; handlers never see each
//! other.

pub mod feedback;
pub mod retrieval;
pub mod scheduler;
pub mod telephony;
pub mod voice;

use async_trait::async_trait;
use uuid::Uuid;

use mentor_core::types::{AgentType, IntentLabel, Metadata, ResponseEnvelope};

use crate::error::AgentError;

pub use feedback::FeedbackHandler;
pub use retrieval::RetrievalHandler;
pub use scheduler::{AppointmentRequest, SchedulerHandler};
pub use telephony::{CallRecord, CallService, LoggingCallService, TelephonyHandler};
pub use voice::{SpeechService, UnavailableSpeechService, VoiceHandler};

/// Everything a handler may need to answer one message.
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    pub message: String,
    /// `None` when the user could not be resolved.
    pub user_id: Option<Uuid>,
    pub session_id: String,
    pub intent: IntentLabel,
    pub metadata: Metadata,
}

impl HandlerRequest {
    pub fn new(message: impl Into<String>, session_id: impl Into<String>, intent: IntentLabel) -> Self {
        Self {
            message: message.into(),
            user_id: None,
            session_id: session_id.into(),
            intent,
            metadata: Metadata::new(),
        }
    }

    pub fn with_user(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// A string value from the request metadata.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

/// Trait implemented by every agent.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    /// The label persisted with turns this handler answers.
    fn agent_type(&self) -> AgentType;

    /// Produce an envelope for the request.
    async fn handle(&self, request: &HandlerRequest) -> Result<ResponseEnvelope, AgentError>;
}

/// Truncate to at most `max_chars` characters, appending an ellipsis when cut.
pub(crate) fn snippet(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", trimmed[..idx].trim_end()),
        None => trimmed.to_string(),
    }
}
