//! Repository implementations for SQLite-backed persistence.
//!
//! Provides UserRepository, ConversationRepository, FeedbackRepository and
//! AppointmentRepository. Each operation runs inside one scoped interaction
//! on the shared pool.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::OptionalExtension;
use uuid::Uuid;

use mentor_core::error::MentorError;
use mentor_core::types::{
    validate_confidence, AgentType, Appointment, AppointmentStatus, Conversation, Feedback,
    FeedbackSummary, IntentLabel, Metadata, NewConversation, Rating, User, UserProfile,
};

use crate::db::Database;

// =============================================================================
// Users
// =============================================================================

/// Repository for user identity records.
pub struct UserRepository {
    db: Arc<Database>,
}

impl UserRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Return the user owning `session_id`, creating it on first sight.
    ///
    /// Idempotent: an existing user is returned unchanged and the profile is
    /// ignored. Concurrent first calls for one session key converge on a
    /// single row. A soft-deleted user whose session returns is reactivated.
    pub async fn get_or_create(
        &self,
        session_id: &str,
        profile: Option<UserProfile>,
    ) -> Result<User, MentorError> {
        let session_id = session_id.to_string();
        let profile = profile.unwrap_or_default();
        self.db
            .with_conn(move |conn| {
                let now = Utc::now().timestamp_millis();
                let metadata = serde_json::to_string(&profile.to_metadata())?;
                conn.execute(
                    "INSERT INTO users (id, session_id, phone, email, name, metadata, preferences, created_at, last_active)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, '{}', ?7, ?7)
                     ON CONFLICT (session_id) DO NOTHING",
                    rusqlite::params![
                        Uuid::new_v4().to_string(),
                        session_id,
                        profile.phone,
                        profile.email,
                        profile.name,
                        metadata,
                        now,
                    ],
                )
                .map_err(|e| MentorError::Storage(format!("Failed to create user: {}", e)))?;

                let reactivated = conn
                    .execute(
                        "UPDATE users SET deleted_at = NULL, last_active = ?1
                         WHERE session_id = ?2 AND deleted_at IS NOT NULL",
                        rusqlite::params![now, session_id],
                    )
                    .map_err(|e| MentorError::Storage(format!("Failed to reactivate user: {}", e)))?;
                if reactivated > 0 {
                    tracing::info!(session_id = %session_id, "Reactivated deleted user");
                }

                let user = conn
                    .query_row(
                        &format!("{} WHERE session_id = ?1", USER_COLUMNS),
                        rusqlite::params![session_id],
                        |row| Ok(row_to_user(row)),
                    )
                    .map_err(|e| MentorError::Storage(e.to_string()))??;
                Ok(user)
            })
            .await
    }

    /// Find a user by session key.
    pub async fn find_by_session(&self, session_id: &str) -> Result<Option<User>, MentorError> {
        let session_id = session_id.to_string();
        self.db
            .with_conn(move |conn| {
                let result = conn
                    .query_row(
                        &format!("{} WHERE session_id = ?1", USER_COLUMNS),
                        rusqlite::params![session_id],
                        |row| Ok(row_to_user(row)),
                    )
                    .optional()
                    .map_err(|e| MentorError::Storage(e.to_string()))?;
                result.transpose()
            })
            .await
    }

    /// Find a user by identifier.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, MentorError> {
        self.db
            .with_conn(move |conn| {
                let result = conn
                    .query_row(
                        &format!("{} WHERE id = ?1", USER_COLUMNS),
                        rusqlite::params![id.to_string()],
                        |row| Ok(row_to_user(row)),
                    )
                    .optional()
                    .map_err(|e| MentorError::Storage(e.to_string()))?;
                result.transpose()
            })
            .await
    }

    /// Bump `last_active` and merge `patch` into the user's metadata.
    pub async fn touch(&self, id: Uuid, patch: Metadata) -> Result<(), MentorError> {
        self.db
            .with_conn(move |conn| {
                let tx = conn
                    .transaction()
                    .map_err(|e| MentorError::Storage(e.to_string()))?;
                let current: Option<String> = tx
                    .query_row(
                        "SELECT metadata FROM users WHERE id = ?1",
                        rusqlite::params![id.to_string()],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(|e| MentorError::Storage(e.to_string()))?;
                let Some(current) = current else {
                    return Err(MentorError::NotFound(format!("user {}", id)));
                };

                let mut metadata: Metadata = serde_json::from_str(&current)?;
                metadata.extend(patch);
                tx.execute(
                    "UPDATE users SET metadata = ?1, last_active = ?2 WHERE id = ?3",
                    rusqlite::params![
                        serde_json::to_string(&metadata)?,
                        Utc::now().timestamp_millis(),
                        id.to_string(),
                    ],
                )
                .map_err(|e| MentorError::Storage(format!("Failed to touch user: {}", e)))?;
                tx.commit()
                    .map_err(|e| MentorError::Storage(e.to_string()))?;
                Ok(())
            })
            .await
    }

    /// Mark a user as deleted without removing any rows.
    pub async fn soft_delete(&self, id: Uuid) -> Result<(), MentorError> {
        self.db
            .with_conn(move |conn| {
                let changed = conn
                    .execute(
                        "UPDATE users SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
                        rusqlite::params![Utc::now().timestamp_millis(), id.to_string()],
                    )
                    .map_err(|e| MentorError::Storage(format!("Failed to delete user: {}", e)))?;
                if changed == 0 {
                    return Err(MentorError::NotFound(format!("user {}", id)));
                }
                Ok(())
            })
            .await
    }
}

const USER_COLUMNS: &str = "SELECT id, session_id, phone, email, name, metadata, preferences, created_at, last_active, deleted_at FROM users";

fn row_to_user(row: &rusqlite::Row) -> Result<User, MentorError> {
    let id_str: String = row.get(0).map_err(|e| MentorError::Storage(e.to_string()))?;
    let metadata: String = row.get(5).map_err(|e| MentorError::Storage(e.to_string()))?;
    let preferences: String = row.get(6).map_err(|e| MentorError::Storage(e.to_string()))?;
    let created_at: i64 = row.get(7).map_err(|e| MentorError::Storage(e.to_string()))?;
    let last_active: i64 = row.get(8).map_err(|e| MentorError::Storage(e.to_string()))?;
    let deleted_at: Option<i64> = row.get(9).map_err(|e| MentorError::Storage(e.to_string()))?;

    Ok(User {
        id: parse_uuid(&id_str)?,
        session_id: row.get(1).map_err(|e| MentorError::Storage(e.to_string()))?,
        phone: row.get(2).map_err(|e| MentorError::Storage(e.to_string()))?,
        email: row.get(3).map_err(|e| MentorError::Storage(e.to_string()))?,
        name: row.get(4).map_err(|e| MentorError::Storage(e.to_string()))?,
        metadata: serde_json::from_str(&metadata)?,
        preferences: serde_json::from_str(&preferences)?,
        created_at: millis_to_datetime(created_at)?,
        last_active: millis_to_datetime(last_active)?,
        deleted_at: deleted_at.map(millis_to_datetime).transpose()?,
    })
}

// =============================================================================
// Conversations
// =============================================================================

/// Append-only log of message/response exchanges.
pub struct ConversationRepository {
    db: Arc<Database>,
}

impl ConversationRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append one turn. Confidence is range-checked before the insert.
    pub async fn record(&self, turn: NewConversation) -> Result<Uuid, MentorError> {
        let confidence = turn.confidence.map(validate_confidence).transpose()?;
        let id = Uuid::new_v4();
        self.db
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO conversations (id, user_id, session_id, message, response, agent_type, intent, confidence, response_time_ms, created_at, metadata)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    rusqlite::params![
                        id.to_string(),
                        turn.user_id.to_string(),
                        turn.session_id,
                        turn.message,
                        turn.response,
                        turn.agent_type.as_str(),
                        turn.intent.map(|i| i.as_str()),
                        confidence.map(f64::from),
                        turn.response_time_ms.map(|ms| ms as i64),
                        Utc::now().timestamp_millis(),
                        serde_json::to_string(&turn.metadata)?,
                    ],
                )
                .map_err(|e| MentorError::Storage(format!("Failed to record conversation: {}", e)))?;
                Ok(id)
            })
            .await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Conversation>, MentorError> {
        self.db
            .with_conn(move |conn| {
                let result = conn
                    .query_row(
                        &format!("{} WHERE id = ?1", CONVERSATION_COLUMNS),
                        rusqlite::params![id.to_string()],
                        |row| Ok(row_to_conversation(row)),
                    )
                    .optional()
                    .map_err(|e| MentorError::Storage(e.to_string()))?;
                result.transpose()
            })
            .await
    }

    /// Most recent turns for a session, newest first.
    pub async fn recent_for_session(
        &self,
        session_id: &str,
        limit: u64,
    ) -> Result<Vec<Conversation>, MentorError> {
        let session_id = session_id.to_string();
        self.db
            .with_conn(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "{} WHERE session_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                        CONVERSATION_COLUMNS
                    ))
                    .map_err(|e| MentorError::Storage(e.to_string()))?;

                let rows = stmt
                    .query_map(rusqlite::params![session_id, limit as i64], |row| {
                        Ok(row_to_conversation(row))
                    })
                    .map_err(|e| MentorError::Storage(e.to_string()))?;

                let mut turns = Vec::new();
                for row in rows {
                    turns.push(row.map_err(|e| MentorError::Storage(e.to_string()))??);
                }
                Ok(turns)
            })
            .await
    }

    pub async fn count_for_user(&self, user_id: Uuid) -> Result<u64, MentorError> {
        self.db
            .with_conn(move |conn| {
                let count: i64 = conn
                    .query_row(
                        "SELECT COUNT(*) FROM conversations WHERE user_id = ?1",
                        rusqlite::params![user_id.to_string()],
                        |row| row.get(0),
                    )
                    .map_err(|e| MentorError::Storage(e.to_string()))?;
                Ok(count as u64)
            })
            .await
    }
}

const CONVERSATION_COLUMNS: &str = "SELECT id, user_id, session_id, message, response, agent_type, intent, confidence, response_time_ms, created_at, metadata FROM conversations";

fn row_to_conversation(row: &rusqlite::Row) -> Result<Conversation, MentorError> {
    let id_str: String = row.get(0).map_err(|e| MentorError::Storage(e.to_string()))?;
    let user_str: String = row.get(1).map_err(|e| MentorError::Storage(e.to_string()))?;
    let agent_str: String = row.get(5).map_err(|e| MentorError::Storage(e.to_string()))?;
    let intent_str: Option<String> = row.get(6).map_err(|e| MentorError::Storage(e.to_string()))?;
    let confidence: Option<f64> = row.get(7).map_err(|e| MentorError::Storage(e.to_string()))?;
    let latency: Option<i64> = row.get(8).map_err(|e| MentorError::Storage(e.to_string()))?;
    let created_at: i64 = row.get(9).map_err(|e| MentorError::Storage(e.to_string()))?;
    let metadata: String = row.get(10).map_err(|e| MentorError::Storage(e.to_string()))?;

    let agent_type = agent_str
        .parse::<AgentType>()
        .map_err(|e| MentorError::Storage(e.to_string()))?;
    let intent = intent_str
        .map(|s| s.parse::<IntentLabel>())
        .transpose()
        .map_err(|e| MentorError::Storage(e.to_string()))?;

    Ok(Conversation {
        id: parse_uuid(&id_str)?,
        user_id: parse_uuid(&user_str)?,
        session_id: row.get(2).map_err(|e| MentorError::Storage(e.to_string()))?,
        message: row.get(3).map_err(|e| MentorError::Storage(e.to_string()))?,
        response: row.get(4).map_err(|e| MentorError::Storage(e.to_string()))?,
        agent_type,
        intent,
        confidence: confidence.map(|c| c as f32),
        response_time_ms: latency.map(|ms| ms.max(0) as u64),
        created_at: millis_to_datetime(created_at)?,
        metadata: serde_json::from_str(&metadata)?,
    })
}

// =============================================================================
// Feedback
// =============================================================================

/// Append-only feedback entries.
pub struct FeedbackRepository {
    db: Arc<Database>,
}

impl FeedbackRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Record a rating for a conversation.
    ///
    /// Fails with `Validation` when the rating is outside {-1, 0, 1} or the
    /// conversation does not exist.
    pub async fn record(
        &self,
        conversation_id: Uuid,
        rating: i64,
        comment: Option<String>,
    ) -> Result<Feedback, MentorError> {
        let rating = Rating::try_from(rating)?;
        self.db
            .with_conn(move |conn| {
                let tx = conn
                    .transaction()
                    .map_err(|e| MentorError::Storage(e.to_string()))?;
                let known: i64 = tx
                    .query_row(
                        "SELECT COUNT(*) FROM conversations WHERE id = ?1",
                        rusqlite::params![conversation_id.to_string()],
                        |row| row.get(0),
                    )
                    .map_err(|e| MentorError::Storage(e.to_string()))?;
                if known == 0 {
                    return Err(MentorError::Validation(format!(
                        "unknown conversation: {}",
                        conversation_id
                    )));
                }

                let feedback = Feedback {
                    id: Uuid::new_v4(),
                    conversation_id,
                    rating,
                    comment,
                    created_at: millis_to_datetime(Utc::now().timestamp_millis())?,
                };
                tx.execute(
                    "INSERT INTO feedback (id, conversation_id, rating, comment, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![
                        feedback.id.to_string(),
                        conversation_id.to_string(),
                        i64::from(rating),
                        feedback.comment,
                        feedback.created_at.timestamp_millis(),
                    ],
                )
                .map_err(|e| MentorError::Storage(format!("Failed to record feedback: {}", e)))?;
                tx.commit()
                    .map_err(|e| MentorError::Storage(e.to_string()))?;
                Ok(feedback)
            })
            .await
    }

    /// Aggregate counts and mean rating across all feedback.
    pub async fn summary(&self) -> Result<FeedbackSummary, MentorError> {
        self.db
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT COUNT(*),
                            COALESCE(AVG(rating), 0.0),
                            COALESCE(SUM(rating = 1), 0),
                            COALESCE(SUM(rating = 0), 0),
                            COALESCE(SUM(rating = -1), 0)
                     FROM feedback",
                    [],
                    |row| {
                        Ok(FeedbackSummary {
                            total_feedback: row.get::<_, i64>(0)? as u64,
                            average_rating: row.get(1)?,
                            positive: row.get::<_, i64>(2)? as u64,
                            neutral: row.get::<_, i64>(3)? as u64,
                            negative: row.get::<_, i64>(4)? as u64,
                        })
                    },
                )
                .map_err(|e| MentorError::Storage(e.to_string()))
            })
            .await
    }
}

// =============================================================================
// Appointments
// =============================================================================

/// Booked appointments.
pub struct AppointmentRepository {
    db: Arc<Database>,
}

impl AppointmentRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store a new appointment. The owning user must exist.
    pub async fn create(&self, appointment: &Appointment) -> Result<(), MentorError> {
        let appointment = appointment.clone();
        self.db
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO appointments (id, user_id, scheduled_for, appointment_type, phone_number, notes, status, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    rusqlite::params![
                        appointment.id.to_string(),
                        appointment.user_id.to_string(),
                        appointment.scheduled_for.timestamp_millis(),
                        appointment.appointment_type,
                        appointment.phone_number,
                        appointment.notes,
                        appointment.status.as_str(),
                        appointment.created_at.timestamp_millis(),
                    ],
                )
                .map_err(|e| match e {
                    rusqlite::Error::SqliteFailure(err, _)
                        if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                    {
                        MentorError::Validation(format!(
                            "unknown user: {}",
                            appointment.user_id
                        ))
                    }
                    other => MentorError::Storage(format!("Failed to create appointment: {}", other)),
                })?;
                Ok(())
            })
            .await
    }

    /// Appointments for a user, soonest first.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Appointment>, MentorError> {
        self.db
            .with_conn(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, user_id, scheduled_for, appointment_type, phone_number, notes, status, created_at
                         FROM appointments
                         WHERE user_id = ?1
                         ORDER BY scheduled_for ASC",
                    )
                    .map_err(|e| MentorError::Storage(e.to_string()))?;

                let rows = stmt
                    .query_map(rusqlite::params![user_id.to_string()], |row| {
                        Ok(row_to_appointment(row))
                    })
                    .map_err(|e| MentorError::Storage(e.to_string()))?;

                let mut appointments = Vec::new();
                for row in rows {
                    appointments.push(row.map_err(|e| MentorError::Storage(e.to_string()))??);
                }
                Ok(appointments)
            })
            .await
    }
}

fn row_to_appointment(row: &rusqlite::Row) -> Result<Appointment, MentorError> {
    let id_str: String = row.get(0).map_err(|e| MentorError::Storage(e.to_string()))?;
    let user_str: String = row.get(1).map_err(|e| MentorError::Storage(e.to_string()))?;
    let scheduled_for: i64 = row.get(2).map_err(|e| MentorError::Storage(e.to_string()))?;
    let status: String = row.get(6).map_err(|e| MentorError::Storage(e.to_string()))?;
    let created_at: i64 = row.get(7).map_err(|e| MentorError::Storage(e.to_string()))?;

    Ok(Appointment {
        id: parse_uuid(&id_str)?,
        user_id: parse_uuid(&user_str)?,
        scheduled_for: millis_to_datetime(scheduled_for)?,
        appointment_type: row.get(3).map_err(|e| MentorError::Storage(e.to_string()))?,
        phone_number: row.get(4).map_err(|e| MentorError::Storage(e.to_string()))?,
        notes: row.get(5).map_err(|e| MentorError::Storage(e.to_string()))?,
        status: status.parse::<AppointmentStatus>()?,
        created_at: millis_to_datetime(created_at)?,
    })
}

// =============================================================================
// Helpers
// =============================================================================

fn parse_uuid(s: &str) -> Result<Uuid, MentorError> {
    Uuid::parse_str(s).map_err(|e| MentorError::Storage(format!("Invalid UUID: {}", e)))
}

fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>, MentorError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| MentorError::Storage(format!("Invalid timestamp: {}", millis)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::PoolSettings;
    use std::collections::HashSet;
    use std::time::Duration;

    async fn setup_db() -> (Arc<Database>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let settings = PoolSettings {
            min_connections: 1,
            max_connections: 4,
            acquire_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(5),
        };
        let db = Database::open(&dir.path().join("mentor.db"), settings)
            .await
            .unwrap();
        (Arc::new(db), dir)
    }

    fn new_turn(user: &User, message: &str) -> NewConversation {
        NewConversation {
            user_id: user.id,
            session_id: user.session_id.clone(),
            message: message.to_string(),
            response: "response".to_string(),
            agent_type: AgentType::Retrieval,
            intent: Some(IntentLabel::General),
            confidence: Some(0.5),
            response_time_ms: Some(12),
            metadata: Metadata::new(),
        }
    }

    // -- Users --

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let (db, _dir) = setup_db().await;
        let repo = UserRepository::new(db);

        let first = repo.get_or_create("session-a", None).await.unwrap();
        let second = repo.get_or_create("session-a", None).await.unwrap();
        assert_eq!(first.id, second.id);

        let other = repo.get_or_create("session-b", None).await.unwrap();
        assert_ne!(first.id, other.id);
    }

    #[tokio::test]
    async fn test_get_or_create_ignores_profile_for_existing_user() {
        let (db, _dir) = setup_db().await;
        let repo = UserRepository::new(db);

        let profile = UserProfile {
            name: Some("Ada".into()),
            ..Default::default()
        };
        let created = repo.get_or_create("s1", Some(profile)).await.unwrap();
        assert_eq!(created.name.as_deref(), Some("Ada"));
        assert_eq!(created.metadata["name"], "Ada");

        let later = UserProfile {
            name: Some("Grace".into()),
            ..Default::default()
        };
        let existing = repo.get_or_create("s1", Some(later)).await.unwrap();
        assert_eq!(existing.name.as_deref(), Some("Ada"));
        assert_eq!(existing, created);
    }

    #[tokio::test]
    async fn test_concurrent_get_or_create_converges() {
        let (db, _dir) = setup_db().await;
        let repo = Arc::new(UserRepository::new(db));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let repo = repo.clone();
            tasks.push(tokio::spawn(async move {
                repo.get_or_create("shared", None).await.unwrap().id
            }));
        }
        let mut ids = HashSet::new();
        for task in tasks {
            ids.insert(task.await.unwrap());
        }
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn test_touch_merges_metadata() {
        let (db, _dir) = setup_db().await;
        let repo = UserRepository::new(db);
        let user = repo.get_or_create("s1", None).await.unwrap();

        let mut patch = Metadata::new();
        patch.insert("last_intent".into(), "scheduling".into());
        repo.touch(user.id, patch).await.unwrap();

        let reloaded = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.metadata["last_intent"], "scheduling");
        assert!(reloaded.last_active >= user.last_active);
    }

    #[tokio::test]
    async fn test_touch_unknown_user_is_not_found() {
        let (db, _dir) = setup_db().await;
        let repo = UserRepository::new(db);
        let err = repo.touch(Uuid::new_v4(), Metadata::new()).await.unwrap_err();
        assert!(matches!(err, MentorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_soft_delete_keeps_row() {
        let (db, _dir) = setup_db().await;
        let repo = UserRepository::new(db);
        let user = repo.get_or_create("s1", None).await.unwrap();

        repo.soft_delete(user.id).await.unwrap();
        let reloaded = repo.find_by_session("s1").await.unwrap().unwrap();
        assert!(reloaded.deleted_at.is_some());

        let again = repo.soft_delete(user.id).await.unwrap_err();
        assert!(matches!(again, MentorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_returning_session_reactivates_deleted_user() {
        let (db, _dir) = setup_db().await;
        let repo = UserRepository::new(db);
        let user = repo.get_or_create("s1", None).await.unwrap();
        repo.soft_delete(user.id).await.unwrap();

        let back = repo.get_or_create("s1", None).await.unwrap();
        assert_eq!(back.id, user.id);
        assert!(back.deleted_at.is_none());
        assert!(back.last_active >= user.last_active);

        // Deletable again once reactivated.
        repo.soft_delete(back.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_out_of_range_timestamp_is_storage_error() {
        let (db, _dir) = setup_db().await;
        let repo = UserRepository::new(db.clone());
        let user = repo.get_or_create("s1", None).await.unwrap();
        db.with_conn(move |conn| {
            conn.execute(
                "UPDATE users SET created_at = ?1 WHERE id = ?2",
                rusqlite::params![i64::MAX, user.id.to_string()],
            )
            .map_err(|e| MentorError::Storage(e.to_string()))
        })
        .await
        .unwrap();

        let err = repo.find_by_session("s1").await.unwrap_err();
        assert!(matches!(err, MentorError::Storage(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_find_by_session_missing() {
        let (db, _dir) = setup_db().await;
        let repo = UserRepository::new(db);
        assert!(repo.find_by_session("nobody").await.unwrap().is_none());
    }

    // -- Conversations --

    #[tokio::test]
    async fn test_record_and_fetch_conversation() {
        let (db, _dir) = setup_db().await;
        let users = UserRepository::new(db.clone());
        let convs = ConversationRepository::new(db);
        let user = users.get_or_create("s1", None).await.unwrap();

        let id = convs.record(new_turn(&user, "hello")).await.unwrap();
        let turn = convs.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(turn.user_id, user.id);
        assert_eq!(turn.message, "hello");
        assert_eq!(turn.agent_type, AgentType::Retrieval);
        assert_eq!(turn.intent, Some(IntentLabel::General));
        assert_eq!(turn.response_time_ms, Some(12));
        assert!(convs.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_same_message_twice_creates_two_rows() {
        let (db, _dir) = setup_db().await;
        let users = UserRepository::new(db.clone());
        let convs = ConversationRepository::new(db);
        let user = users.get_or_create("s1", None).await.unwrap();

        let a = convs.record(new_turn(&user, "same")).await.unwrap();
        let b = convs.record(new_turn(&user, "same")).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(convs.count_for_user(user.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_confidence_out_of_range_rejected() {
        let (db, _dir) = setup_db().await;
        let users = UserRepository::new(db.clone());
        let convs = ConversationRepository::new(db);
        let user = users.get_or_create("s1", None).await.unwrap();

        let mut turn = new_turn(&user, "hi");
        turn.confidence = Some(1.7);
        let err = convs.record(turn).await.unwrap_err();
        assert!(matches!(err, MentorError::Validation(_)));
        assert_eq!(convs.count_for_user(user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_conversation_for_unknown_user_fails() {
        let (db, _dir) = setup_db().await;
        let convs = ConversationRepository::new(db);
        let turn = NewConversation {
            user_id: Uuid::new_v4(),
            session_id: "ghost".into(),
            message: "hi".into(),
            response: "hello".into(),
            agent_type: AgentType::Router,
            intent: None,
            confidence: None,
            response_time_ms: None,
            metadata: Metadata::new(),
        };
        assert!(convs.record(turn).await.is_err());
    }

    #[tokio::test]
    async fn test_recent_for_session_newest_first() {
        let (db, _dir) = setup_db().await;
        let users = UserRepository::new(db.clone());
        let convs = ConversationRepository::new(db);
        let user = users.get_or_create("s1", None).await.unwrap();

        for msg in ["one", "two", "three"] {
            convs.record(new_turn(&user, msg)).await.unwrap();
        }
        let recent = convs.recent_for_session("s1", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "three");
        assert_eq!(recent[1].message, "two");
    }

    // -- Feedback --

    #[tokio::test]
    async fn test_feedback_accepts_only_valid_ratings() {
        let (db, _dir) = setup_db().await;
        let users = UserRepository::new(db.clone());
        let convs = ConversationRepository::new(db.clone());
        let feedback = FeedbackRepository::new(db);
        let user = users.get_or_create("s1", None).await.unwrap();
        let conv = convs.record(new_turn(&user, "hi")).await.unwrap();

        for rating in [-1, 0, 1] {
            assert!(feedback.record(conv, rating, None).await.is_ok());
        }
        for rating in [-2, 2, 10, -100] {
            let err = feedback.record(conv, rating, None).await.unwrap_err();
            assert!(matches!(err, MentorError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_feedback_unknown_conversation_is_validation_error() {
        let (db, _dir) = setup_db().await;
        let feedback = FeedbackRepository::new(db);
        let err = feedback
            .record(Uuid::new_v4(), 1, Some("great".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, MentorError::Validation(_)));
    }

    #[tokio::test]
    async fn test_feedback_summary() {
        let (db, _dir) = setup_db().await;
        let users = UserRepository::new(db.clone());
        let convs = ConversationRepository::new(db.clone());
        let feedback = FeedbackRepository::new(db);

        assert_eq!(feedback.summary().await.unwrap(), FeedbackSummary::default());

        let user = users.get_or_create("s1", None).await.unwrap();
        let conv = convs.record(new_turn(&user, "hi")).await.unwrap();
        feedback.record(conv, 1, None).await.unwrap();
        feedback.record(conv, 1, None).await.unwrap();
        feedback.record(conv, -1, None).await.unwrap();
        feedback.record(conv, 0, None).await.unwrap();

        let summary = feedback.summary().await.unwrap();
        assert_eq!(summary.total_feedback, 4);
        assert_eq!(summary.positive, 2);
        assert_eq!(summary.neutral, 1);
        assert_eq!(summary.negative, 1);
        assert!((summary.average_rating - 0.25).abs() < 1e-9);
    }

    // -- Appointments --

    #[tokio::test]
    async fn test_create_and_list_appointments() {
        let (db, _dir) = setup_db().await;
        let users = UserRepository::new(db.clone());
        let appts = AppointmentRepository::new(db);
        let user = users.get_or_create("s1", None).await.unwrap();

        let now = Utc::now();
        let later = Appointment {
            id: Uuid::new_v4(),
            user_id: user.id,
            scheduled_for: now + chrono::Duration::days(2),
            appointment_type: "consultation".into(),
            phone_number: Some("+15551234567".into()),
            notes: None,
            status: AppointmentStatus::Booked,
            created_at: now,
        };
        let sooner = Appointment {
            id: Uuid::new_v4(),
            scheduled_for: now + chrono::Duration::days(1),
            ..later.clone()
        };
        appts.create(&later).await.unwrap();
        appts.create(&sooner).await.unwrap();

        let listed = appts.list_for_user(user.id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, sooner.id);
        assert_eq!(listed[1].phone_number.as_deref(), Some("+15551234567"));
        assert_eq!(listed[1].status, AppointmentStatus::Booked);
    }

    #[tokio::test]
    async fn test_appointment_for_unknown_user_rejected() {
        let (db, _dir) = setup_db().await;
        let appts = AppointmentRepository::new(db);
        let appointment = Appointment {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            scheduled_for: Utc::now(),
            appointment_type: "consultation".into(),
            phone_number: None,
            notes: None,
            status: AppointmentStatus::Booked,
            created_at: Utc::now(),
        };
        let err = appts.create(&appointment).await.unwrap_err();
        assert!(matches!(err, MentorError::Validation(_)));
    }
}
