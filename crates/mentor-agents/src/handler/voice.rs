//! Voice handler: speech-to-text and text-to-speech.
//!
//! Audio is an opaque byte stream. The conversion itself belongs to a
//! `SpeechService`; without one configured every call fails with
//! `AgentError::Unsupported`.

use std::sync::Arc;

use async_trait::async_trait;

use mentor_core::types::{AgentType, ResponseEnvelope};

use crate::error::AgentError;
use crate::handler::{AgentHandler, HandlerRequest};

/// Converts between audio bytes and text.
#[async_trait]
pub trait SpeechService: Send + Sync {
    async fn speech_to_text(&self, audio: &[u8]) -> Result<String, AgentError>;
    async fn text_to_speech(&self, text: &str) -> Result<Vec<u8>, AgentError>;
}

/// Speech service used when no provider is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableSpeechService;

#[async_trait]
impl SpeechService for UnavailableSpeechService {
    async fn speech_to_text(&self, _audio: &[u8]) -> Result<String, AgentError> {
        Err(AgentError::Unsupported("speech-to-text is not configured".to_string()))
    }

    async fn text_to_speech(&self, _text: &str) -> Result<Vec<u8>, AgentError> {
        Err(AgentError::Unsupported("text-to-speech is not configured".to_string()))
    }
}

pub struct VoiceHandler {
    speech: Arc<dyn SpeechService>,
}

impl VoiceHandler {
    pub fn new(speech: Arc<dyn SpeechService>) -> Self {
        Self { speech }
    }

    pub async fn transcribe(&self, audio: &[u8]) -> Result<String, AgentError> {
        if audio.is_empty() {
            return Err(AgentError::InvalidRequest("audio payload is empty".to_string()));
        }
        let text = self.speech.speech_to_text(audio).await?;
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(AgentError::InvalidRequest(
                "no speech detected in audio".to_string(),
            ));
        }
        tracing::debug!(bytes = audio.len(), chars = text.len(), "Transcribed audio");
        Ok(text)
    }

    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, AgentError> {
        if text.trim().is_empty() {
            return Err(AgentError::InvalidRequest("text is empty".to_string()));
        }
        self.speech.text_to_speech(text).await
    }
}

#[async_trait]
impl AgentHandler for VoiceHandler {
    fn agent_type(&self) -> AgentType {
        AgentType::Voice
    }

    /// Synthesizes the message and reports the audio size.
    async fn handle(&self, request: &HandlerRequest) -> Result<ResponseEnvelope, AgentError> {
        let audio = self.synthesize(&request.message).await?;
        Ok(ResponseEnvelope::ok(request.message.clone())
            .with_metadata("audio_bytes", audio.len()))
    }
}
