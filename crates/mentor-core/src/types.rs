use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MentorError;

/// Free-form JSON object attached to users, turns and envelopes.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Metadata key carrying the reason a handler failed.
pub const FAILURE_REASON_KEY: &str = "failure_reason";

// =============================================================================
// Enums
// =============================================================================

/// Coarse category describing what the user wants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentLabel {
    Scheduling,
    CourseInfo,
    Enrollment,
    General,
}

impl IntentLabel {
    /// Every label, in classification priority order.
    pub const ALL: [IntentLabel; 4] = [
        IntentLabel::Scheduling,
        IntentLabel::CourseInfo,
        IntentLabel::Enrollment,
        IntentLabel::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentLabel::Scheduling => "scheduling",
            IntentLabel::CourseInfo => "course_info",
            IntentLabel::Enrollment => "enrollment",
            IntentLabel::General => "general",
        }
    }
}

impl fmt::Display for IntentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntentLabel {
    type Err = MentorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IntentLabel::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| MentorError::Validation(format!("unknown intent: {}", s)))
    }
}

/// The kind of agent that produced a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Retrieval,
    Scheduler,
    Feedback,
    Telephony,
    Voice,
    /// No handler produced the envelope (router fallback).
    Router,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Retrieval => "retrieval",
            AgentType::Scheduler => "scheduler",
            AgentType::Feedback => "feedback",
            AgentType::Telephony => "telephony",
            AgentType::Voice => "voice",
            AgentType::Router => "router",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentType {
    type Err = MentorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "retrieval" => Ok(AgentType::Retrieval),
            "scheduler" => Ok(AgentType::Scheduler),
            "feedback" => Ok(AgentType::Feedback),
            "telephony" => Ok(AgentType::Telephony),
            "voice" => Ok(AgentType::Voice),
            "router" => Ok(AgentType::Router),
            other => Err(MentorError::Validation(format!("unknown agent type: {}", other))),
        }
    }
}

/// Lifecycle of a booked appointment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Booked,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Booked => "booked",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = MentorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "booked" => Ok(AppointmentStatus::Booked),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "completed" => Ok(AppointmentStatus::Completed),
            other => Err(MentorError::Storage(format!(
                "unknown appointment status: {}",
                other
            ))),
        }
    }
}

// =============================================================================
// Validated scalars
// =============================================================================

/// Feedback rating. Only -1, 0 and 1 are representable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Rating(i8);

impl Rating {
    pub fn value(&self) -> i8 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = MentorError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1..=1 => Ok(Rating(value as i8)),
            other => Err(MentorError::Validation(format!(
                "rating must be -1, 0 or 1, got {}",
                other
            ))),
        }
    }
}

impl From<Rating> for i64 {
    fn from(rating: Rating) -> Self {
        rating.0 as i64
    }
}

/// Check a confidence score before it is persisted.
pub fn validate_confidence(value: f32) -> Result<f32, MentorError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(MentorError::Validation(format!(
            "confidence must be within 0.0..=1.0, got {}",
            value
        )))
    }
}

// =============================================================================
// Entities
// =============================================================================

/// Optional profile fields supplied with the first message of a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    /// Anything else the client sent; merged into the user's metadata.
    #[serde(flatten)]
    pub extra: Metadata,
}

impl UserProfile {
    /// Build a profile from a free-form metadata object, lifting the known
    /// `phone`, `email` and `name` keys.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let field = |key: &str| {
            metadata
                .get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        };
        Self {
            phone: field("phone"),
            email: field("email"),
            name: field("name"),
            extra: metadata.clone(),
        }
    }

    /// The full profile as a metadata object, known fields included.
    pub fn to_metadata(&self) -> Metadata {
        let mut map = self.extra.clone();
        for (key, value) in [
            ("phone", &self.phone),
            ("email", &self.email),
            ("name", &self.name),
        ] {
            if let Some(v) = value {
                map.insert(key.to_string(), serde_json::Value::String(v.clone()));
            }
        }
        map
    }
}

/// Identity record for one session key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub session_id: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub metadata: Metadata,
    pub preferences: Metadata,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Input for appending one turn to the conversation log.
#[derive(Debug, Clone)]
pub struct NewConversation {
    pub user_id: Uuid,
    pub session_id: String,
    pub message: String,
    pub response: String,
    pub agent_type: AgentType,
    pub intent: Option<IntentLabel>,
    pub confidence: Option<f32>,
    pub response_time_ms: Option<u64>,
    pub metadata: Metadata,
}

/// One persisted message/response exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_id: String,
    pub message: String,
    pub response: String,
    pub agent_type: AgentType,
    pub intent: Option<IntentLabel>,
    pub confidence: Option<f32>,
    pub response_time_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub metadata: Metadata,
}

/// A stored feedback entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub rating: Rating,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate view over all feedback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSummary {
    pub total_feedback: u64,
    pub average_rating: f64,
    pub positive: u64,
    pub neutral: u64,
    pub negative: u64,
}

/// A booked appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub scheduled_for: DateTime<Utc>,
    pub appointment_type: String,
    pub phone_number: Option<String>,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Retrieval and response types
// =============================================================================

/// A retrieved unit of text with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub id: String,
    pub score: f32,
    pub content: String,
    pub document_id: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A source quoted back to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: String,
    pub snippet: String,
}

/// Normalized output of every handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub message: String,
    pub confidence: Option<f32>,
    pub sources: Vec<SourceRef>,
    pub success: bool,
    pub metadata: Metadata,
}

impl ResponseEnvelope {
    /// A successful envelope with no sources.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            confidence: None,
            sources: Vec::new(),
            success: true,
            metadata: Metadata::new(),
        }
    }

    /// An unsuccessful envelope, e.g. a clarifying prompt.
    pub fn unsuccessful(message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::ok(message)
        }
    }

    /// The generic apology returned when a handler fails.
    pub fn apology(reason: impl Into<String>) -> Self {
        Self::unsuccessful(
            "Sorry, something went wrong while handling your message. Please try again.",
        )
        .with_metadata(FAILURE_REASON_KEY, reason.into())
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_sources(mut self, sources: Vec<SourceRef>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The failure reason recorded by the router, if any.
    pub fn failure_reason(&self) -> Option<&str> {
        self.metadata.get(FAILURE_REASON_KEY).and_then(|v| v.as_str())
    }
}

/// What the transport layer hands back for one chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
    pub session_id: String,
    pub intent: Option<IntentLabel>,
    pub confidence: Option<f32>,
    pub timestamp: DateTime<Utc>,
    pub sources: Vec<SourceRef>,
    pub metadata: Metadata,
}

// =============================================================================
// Tests
// =============================================================================
