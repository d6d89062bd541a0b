//! Appointment scheduling handler.
//!
//! Looks for a time expression in the message and books an appointment for
//! it. Anything it cannot act on (no time, a time in the past, an unknown
//! user) comes back as an unsuccessful envelope with a clarifying prompt.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use mentor_core::types::{AgentType, Appointment, AppointmentStatus, ResponseEnvelope};
use mentor_storage::AppointmentRepository;

use crate::error::AgentError;
use crate::handler::telephony::validate_phone_number;
use crate::handler::{AgentHandler, HandlerRequest};
use crate::intent::time_parser::parse_time_expression;

const DEFAULT_APPOINTMENT_TYPE: &str = "consultation";

const ASK_FOR_TIME: &str = "I'd be happy to book a consultation. What day and time work \
best for you? For example: \"tomorrow at 3pm\" or \"next monday morning\".";

const TIME_IN_PAST: &str = "That time has already passed. Could you suggest a time later \
than now?";

const NEED_SESSION: &str = "I couldn't find your session details, so I can't book that \
yet. Please try again in a moment.";

/// A direct booking request.
#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentRequest {
    pub user_id: Uuid,
    /// RFC 3339 timestamp or a natural expression such as "tomorrow at 3pm".
    pub preferred_time: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default = "default_appointment_type")]
    pub appointment_type: String,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_appointment_type() -> String {
    DEFAULT_APPOINTMENT_TYPE.to_string()
}

/// Handler for scheduling intents.
pub struct SchedulerHandler {
    appointments: Arc<AppointmentRepository>,
}

impl SchedulerHandler {
    pub fn new(appointments: Arc<AppointmentRepository>) -> Self {
        Self { appointments }
    }

    /// Book an appointment from an explicit request.
    pub async fn book_appointment(
        &self,
        request: AppointmentRequest,
    ) -> Result<Appointment, AgentError> {
        let now = Utc::now();
        let scheduled_for = resolve_preferred_time(&request.preferred_time, now)?;
        if scheduled_for <= now {
            return Err(AgentError::InvalidRequest(format!(
                "preferred_time {} is in the past",
                scheduled_for.to_rfc3339()
            )));
        }
        if let Some(phone) = request.phone_number.as_deref() {
            validate_phone_number(phone)?;
        }
        let appointment_type = match request.appointment_type.trim() {
            "" => default_appointment_type(),
            other => other.to_string(),
        };

        self.store(
            request.user_id,
            scheduled_for,
            appointment_type,
            request.phone_number,
            request.notes,
        )
        .await
    }

    pub async fn appointments_for(&self, user_id: Uuid) -> Result<Vec<Appointment>, AgentError> {
        Ok(self.appointments.list_for_user(user_id).await?)
    }

    async fn store(
        &self,
        user_id: Uuid,
        scheduled_for: DateTime<Utc>,
        appointment_type: String,
        phone_number: Option<String>,
        notes: Option<String>,
    ) -> Result<Appointment, AgentError> {
        let appointment = Appointment {
            id: Uuid::new_v4(),
            user_id,
            scheduled_for,
            appointment_type,
            phone_number,
            notes,
            status: AppointmentStatus::Booked,
            created_at: Utc::now(),
        };
        self.appointments.create(&appointment).await?;
        tracing::info!(
            appointment_id = %appointment.id,
            user_id = %user_id,
            scheduled_for = %appointment.scheduled_for,
            "Appointment booked"
        );
        Ok(appointment)
    }
}

#[async_trait]
impl AgentHandler for SchedulerHandler {
    fn agent_type(&self) -> AgentType {
        AgentType::Scheduler
    }

    async fn handle(&self, request: &HandlerRequest) -> Result<ResponseEnvelope, AgentError> {
        let now = Utc::now();
        let Some(scheduled_for) = parse_time_expression(&request.message, now) else {
            return Ok(ResponseEnvelope::unsuccessful(ASK_FOR_TIME).with_metadata("action", "clarify"));
        };
        if scheduled_for <= now {
            return Ok(ResponseEnvelope::unsuccessful(TIME_IN_PAST)
                .with_metadata("action", "clarify")
                .with_metadata("requested_time", scheduled_for.to_rfc3339()));
        }
        let Some(user_id) = request.user_id else {
            return Ok(ResponseEnvelope::unsuccessful(NEED_SESSION).with_metadata("action", "clarify"));
        };

        let phone = request
            .meta_str("phone")
            .filter(|p| validate_phone_number(p).is_ok())
            .map(str::to_string);
        let appointment = self
            .store(
                user_id,
                scheduled_for,
                default_appointment_type(),
                phone,
                Some(request.message.clone()),
            )
            .await?;

        let when = appointment.scheduled_for.format("%A, %B %-d at %-I:%M %p UTC");
        Ok(ResponseEnvelope::ok(format!(
            "You're booked for a {} on {}. We'll reach out beforehand to confirm.",
            appointment.appointment_type, when
        ))
        .with_confidence(1.0)
        .with_metadata("action", "booked")
        .with_metadata("appointment_id", appointment.id.to_string())
        .with_metadata("scheduled_for", appointment.scheduled_for.to_rfc3339()))
    }
}

fn resolve_preferred_time(raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, AgentError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw.trim()) {
        return Ok(parsed.with_timezone(&Utc));
    }
    parse_time_expression(raw, now).ok_or_else(|| {
        AgentError::InvalidRequest(format!("could not understand preferred_time: {}", raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use mentor_core::types::IntentLabel;
    use mentor_storage::{Database, PoolSettings, UserRepository};

    async fn setup() -> (SchedulerHandler, Uuid, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let settings = PoolSettings {
            min_connections: 1,
            max_connections: 2,
            acquire_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(5),
        };
        let db = Arc::new(
            Database::open(&dir.path().join("mentor.db"), settings)
                .await
                .unwrap(),
        );
        let user = UserRepository::new(db.clone())
            .get_or_create("s1", None)
            .await
            .unwrap();
        let handler = SchedulerHandler::new(Arc::new(AppointmentRepository::new(db)));
        (handler, user.id, dir)
    }

    fn request(text: &str, user_id: Option<Uuid>) -> HandlerRequest {
        HandlerRequest::new(text, "s1", IntentLabel::Scheduling).with_user(user_id)
    }

    #[tokio::test]
    async fn test_books_when_time_given() {
        let (handler, user_id, _dir) = setup().await;
        let env = handler
            .handle(&request("Can I book a call tomorrow at 3pm?", Some(user_id)))
            .await
            .unwrap();

        assert!(env.success);
        assert_eq!(env.metadata["action"], "booked");
        assert!(env.metadata.contains_key("appointment_id"));
        assert!(env.metadata.contains_key("scheduled_for"));

        let booked = handler.appointments_for(user_id).await.unwrap();
        assert_eq!(booked.len(), 1);
        assert_eq!(booked[0].appointment_type, "consultation");
        assert_eq!(booked[0].status, AppointmentStatus::Booked);
    }

    #[tokio::test]
    async fn test_asks_for_time_when_missing() {
        let (handler, user_id, _dir) = setup().await;
        let env = handler
            .handle(&request("I want to book an appointment", Some(user_id)))
            .await
            .unwrap();
        assert!(!env.success);
        assert_eq!(env.message, ASK_FOR_TIME);
        assert!(env.failure_reason().is_none());
        assert!(handler.appointments_for(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_past_time_is_rejected() {
        let (handler, user_id, _dir) = setup().await;
        let env = handler
            .handle(&request("schedule me for 2020-01-01 10:00", Some(user_id)))
            .await
            .unwrap();
        assert!(!env.success);
        assert_eq!(env.message, TIME_IN_PAST);
    }

    #[tokio::test]
    async fn test_unknown_user_gets_prompt() {
        let (handler, _user_id, _dir) = setup().await;
        let env = handler
            .handle(&request("book me in 2 days", None))
            .await
            .unwrap();
        assert!(!env.success);
        assert_eq!(env.message, NEED_SESSION);
    }

    #[tokio::test]
    async fn test_book_appointment_direct() {
        let (handler, user_id, _dir) = setup().await;
        let when = (Utc::now() + chrono::Duration::days(3)).to_rfc3339();
        let appt = handler
            .book_appointment(AppointmentRequest {
                user_id,
                preferred_time: when,
                phone_number: Some("+15551234567".into()),
                appointment_type: String::new(),
                notes: Some("career change".into()),
            })
            .await
            .unwrap();
        assert_eq!(appt.appointment_type, "consultation");
        assert_eq!(appt.notes.as_deref(), Some("career change"));
    }

    #[tokio::test]
    async fn test_book_appointment_rejects_bad_input() {
        let (handler, user_id, _dir) = setup().await;
        let base = AppointmentRequest {
            user_id,
            preferred_time: "in 2 hours".into(),
            phone_number: None,
            appointment_type: "consultation".into(),
            notes: None,
        };

        let past = AppointmentRequest {
            preferred_time: "2020-05-01T10:00:00Z".into(),
            ..base.clone()
        };
        assert!(handler.book_appointment(past).await.unwrap_err().is_client_error());

        let gibberish = AppointmentRequest {
            preferred_time: "whenever".into(),
            ..base.clone()
        };
        assert!(handler.book_appointment(gibberish).await.unwrap_err().is_client_error());

        let bad_phone = AppointmentRequest {
            phone_number: Some("call me maybe".into()),
            ..base.clone()
        };
        assert!(handler.book_appointment(bad_phone).await.unwrap_err().is_client_error());

        let unknown_user = AppointmentRequest {
            user_id: Uuid::new_v4(),
            ..base.clone()
        };
        assert!(handler.book_appointment(unknown_user).await.unwrap_err().is_client_error());

        assert!(handler.book_appointment(base).await.is_ok());
    }

    #[test]
    fn test_request_defaults_from_json() {
        let req: AppointmentRequest = serde_json::from_value(serde_json::json!({
            "user_id": Uuid::nil(),
            "preferred_time": "tomorrow at 10am"
        }))
        .unwrap();
        assert_eq!(req.appointment_type, "consultation");
        assert!(req.phone_number.is_none());
    }
}
