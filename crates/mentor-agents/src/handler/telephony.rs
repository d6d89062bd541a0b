//! Telephony handler: inbound call markup and outbound call dispatch.
//!
//! Calls arrive through the voice webhook rather than the chat router. The
//! actual carrier is a `CallService` collaborator; the default one only logs
//! and queues.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mentor_core::types::{AgentType, Metadata, ResponseEnvelope};

use crate::error::AgentError;
use crate::handler::{AgentHandler, HandlerRequest};

const GREETING: &str = "Hello from the bootcamp chatbot!";

/// Record of a call handed to the carrier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub call_id: String,
    pub to_number: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Places outbound calls.
#[async_trait]
pub trait CallService: Send + Sync {
    async fn place_call(&self, to_number: &str, payload: &Metadata) -> Result<CallRecord, AgentError>;
}

/// Call service that logs the request and reports it as queued.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingCallService;

#[async_trait]
impl CallService for LoggingCallService {
    async fn place_call(&self, to_number: &str, payload: &Metadata) -> Result<CallRecord, AgentError> {
        let record = CallRecord {
            call_id: Uuid::new_v4().to_string(),
            to_number: to_number.to_string(),
            status: "queued".to_string(),
            created_at: Utc::now(),
        };
        tracing::info!(
            call_id = %record.call_id,
            to = %to_number,
            fields = payload.len(),
            "Outbound call queued"
        );
        Ok(record)
    }
}

/// Handler for phone interactions.
pub struct TelephonyHandler {
    calls: Arc<dyn CallService>,
}

impl TelephonyHandler {
    pub fn new(calls: Arc<dyn CallService>) -> Self {
        Self { calls }
    }

    /// Voice-response markup answering an inbound call.
    pub fn inbound_call(&self, call_sid: &str, from_number: &str) -> String {
        tracing::info!(call_sid = %call_sid, from = %from_number, "Inbound call");
        say(GREETING)
    }

    /// Validate the destination and hand the call to the carrier.
    pub async fn outbound_call(
        &self,
        to_number: &str,
        appointment: &Metadata,
    ) -> Result<CallRecord, AgentError> {
        validate_phone_number(to_number)?;
        self.calls.place_call(to_number, appointment).await
    }
}

#[async_trait]
impl AgentHandler for TelephonyHandler {
    fn agent_type(&self) -> AgentType {
        AgentType::Telephony
    }

    /// Renders the message as markup to be spoken on a call.
    async fn handle(&self, request: &HandlerRequest) -> Result<ResponseEnvelope, AgentError> {
        Ok(ResponseEnvelope::ok(say(&request.message))
            .with_metadata("content_type", "application/xml"))
    }
}

fn say(text: &str) -> String {
    format!("<Response><Say>{}</Say></Response>", xml_escape(text))
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// Accept E.164 numbers: `+`, a non-zero leading digit, 8 to 15 digits total.
pub fn validate_phone_number(number: &str) -> Result<(), AgentError> {
    let digits = number.strip_prefix('+').ok_or_else(|| {
        AgentError::InvalidRequest(format!("phone number must start with '+': {}", number))
    })?;
    let valid = (8..=15).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
        && !digits.starts_with('0');
    if valid {
        Ok(())
    } else {
        Err(AgentError::InvalidRequest(format!(
            "not an E.164 phone number: {}",
            number
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use mentor_core::types::IntentLabel;

    #[derive(Default)]
    struct RecordingCalls {
        placed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CallService for RecordingCalls {
        async fn place_call(&self, to: &str, payload: &Metadata) -> Result<CallRecord, AgentError> {
            self.placed.lock().unwrap().push(to.to_string());
            LoggingCallService.place_call(to, payload).await
        }
    }

    #[test]
    fn test_inbound_call_markup() {
        let handler = TelephonyHandler::new(Arc::new(LoggingCallService));
        assert_eq!(
            handler.inbound_call("CA123", "+15551234567"),
            "<Response><Say>Hello from the bootcamp chatbot!</Say></Response>"
        );
    }

    #[tokio::test]
    async fn test_handle_escapes_markup() {
        let handler = TelephonyHandler::new(Arc::new(LoggingCallService));
        let req = HandlerRequest::new("Q&A <today>", "s1", IntentLabel::General);
        let env = handler.handle(&req).await.unwrap();
        assert_eq!(
            env.message,
            "<Response><Say>Q&amp;A &lt;today&gt;</Say></Response>"
        );
        assert_eq!(env.metadata["content_type"], "application/xml");
    }

    #[tokio::test]
    async fn test_outbound_call_dispatches_valid_number() {
        let calls = Arc::new(RecordingCalls::default());
        let handler = TelephonyHandler::new(calls.clone());
        let record = handler
            .outbound_call("+14155550100", &Metadata::new())
            .await
            .unwrap();
        assert_eq!(record.status, "queued");
        assert_eq!(record.to_number, "+14155550100");
        assert_eq!(calls.placed.lock().unwrap().as_slice(), ["+14155550100"]);
    }

    #[tokio::test]
    async fn test_outbound_call_rejects_invalid_number() {
        let calls = Arc::new(RecordingCalls::default());
        let handler = TelephonyHandler::new(calls.clone());
        let err = handler
            .outbound_call("555-0100", &Metadata::new())
            .await
            .unwrap_err();
        assert!(err.is_client_error());
        assert!(calls.placed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_validate_phone_number() {
        assert!(validate_phone_number("+15551234567").is_ok());
        assert!(validate_phone_number("+442071838750").is_ok());
        assert!(validate_phone_number("15551234567").is_err());
        assert!(validate_phone_number("+0123456789").is_err());
        assert!(validate_phone_number("+1555").is_err());
        assert!(validate_phone_number("+1555123456789012").is_err());
        assert!(validate_phone_number("+1555abc4567").is_err());
    }
}
