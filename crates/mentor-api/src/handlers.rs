//! Route handler functions for all API endpoints.
//!
//! Each handler extracts its inputs with axum extractors, delegates to the
//! orchestrator or an agent handler held in `AppState`, and returns JSON.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{Form, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mentor_agents::{AppointmentRequest, CallRecord};
use mentor_chat::MetricsSnapshot;
use mentor_core::error::MentorError;
use mentor_core::types::{
    Appointment, ChatResponse, Conversation, FeedbackSummary, Metadata, UserProfile,
};

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;

// =============================================================================
// Request and response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceBanner {
    pub message: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub database: String,
    pub vector_store: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` when every subsystem is, `degraded` otherwise.
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_secs: u64,
    pub services: ServiceStatus,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub turns: Vec<Conversation>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub conversation_id: Uuid,
    /// Any JSON number; only -1, 0 and 1 are accepted.
    pub rating: serde_json::Number,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub success: bool,
    pub feedback_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AppointmentsResponse {
    pub user_id: Uuid,
    pub appointments: Vec<Appointment>,
}

/// Form fields posted by the carrier's inbound call webhook.
#[derive(Debug, Deserialize)]
pub struct InboundCall {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "From")]
    pub from: String,
}

#[derive(Debug, Deserialize)]
pub struct OutboundCallRequest {
    pub to_number: String,
    #[serde(default)]
    pub appointment: Metadata,
}

#[derive(Debug, Deserialize)]
pub struct TranscribeParams {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    pub text: String,
}

// =============================================================================
// Service endpoints
// =============================================================================

/// GET / - service banner.
pub async fn root() -> Json<ServiceBanner> {
    Json(ServiceBanner {
        message: "Mentor chatbot is live".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        status: "operational".to_string(),
    })
}

/// GET /health - per-subsystem status.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.database.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            false
        }
    };
    let vector_store = state.retrieval.health_check().await;

    let label = |ok: bool| {
        let text = if ok { "healthy" } else { "unhealthy" };
        text.to_string()
    };
    let overall = if database && vector_store {
        "healthy"
    } else {
        "degraded"
    };
    Json(HealthResponse {
        status: overall.to_string(),
        timestamp: Utc::now(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        services: ServiceStatus {
            database: label(database),
            vector_store: label(vector_store),
        },
    })
}

/// GET /stats - interaction metrics.
pub async fn stats(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.orchestrator.metrics())
}

// =============================================================================
// Chat
// =============================================================================

/// POST /chat - handle one message.
pub async fn chat(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let mut metadata = req.metadata.unwrap_or_default();
    if let Some(user_id) = req.user_id.filter(|u| !u.trim().is_empty()) {
        metadata.insert("client_user_id".to_string(), user_id.into());
    }
    let profile = (!metadata.is_empty()).then(|| UserProfile::from_metadata(&metadata));

    let response = state
        .orchestrator
        .handle_message(&req.session_id, &req.message, profile)
        .await?;
    Ok(Json(response))
}

/// GET /sessions/{session_id}/history - recent turns, newest first.
pub async fn history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    ApiQuery(params): ApiQuery<HistoryParams>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let turns = state.orchestrator.history(&session_id, params.limit).await?;
    Ok(Json(HistoryResponse { session_id, turns }))
}

// =============================================================================
// Feedback
// =============================================================================

/// POST /feedback - rate a conversation turn.
pub async fn submit_feedback(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let rating = req.rating.as_i64().ok_or_else(|| {
        MentorError::Validation(format!("rating must be -1, 0 or 1, got {}", req.rating))
    })?;
    let stored = state
        .feedback
        .submit(req.conversation_id, rating, req.comment)
        .await?;
    Ok(Json(FeedbackResponse {
        success: true,
        feedback_id: stored.id,
    }))
}

/// GET /feedback/summary - rating trends.
pub async fn feedback_summary(
    State(state): State<AppState>,
) -> Result<Json<FeedbackSummary>, ApiError> {
    Ok(Json(state.feedback.trends().await?))
}

// =============================================================================
// Appointments
// =============================================================================

/// POST /appointments - book directly.
pub async fn book_appointment(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<AppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    let appointment = state.scheduler.book_appointment(req).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

/// GET /users/{user_id}/appointments - a user's bookings, soonest first.
pub async fn list_appointments(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<AppointmentsResponse>, ApiError> {
    let appointments = state.scheduler.appointments_for(user_id).await?;
    Ok(Json(AppointmentsResponse {
        user_id,
        appointments,
    }))
}

// =============================================================================
// Telephony and voice
// =============================================================================

/// POST /voice/inbound - answer an inbound call with voice markup.
pub async fn inbound_call(
    State(state): State<AppState>,
    Form(call): Form<InboundCall>,
) -> impl IntoResponse {
    let markup = state.telephony.inbound_call(&call.call_sid, &call.from);
    ([(header::CONTENT_TYPE, "application/xml")], markup)
}

/// POST /calls/outbound - place a call to a number.
pub async fn outbound_call(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<OutboundCallRequest>,
) -> Result<(StatusCode, Json<CallRecord>), ApiError> {
    let record = state
        .telephony
        .outbound_call(&req.to_number, &req.appointment)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(record)))
}

/// POST /voice/transcribe?session_id= - transcribe audio, then chat with it.
pub async fn transcribe(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<TranscribeParams>,
    body: Bytes,
) -> Result<Json<ChatResponse>, ApiError> {
    let transcript = state.voice.transcribe(&body).await?;
    let mut response = state
        .orchestrator
        .handle_message(&params.session_id, &transcript, None)
        .await?;
    response
        .metadata
        .insert("transcript".to_string(), transcript.into());
    Ok(Json(response))
}

/// POST /voice/synthesize - render text as audio.
pub async fn synthesize(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SynthesizeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::BadRequest("text cannot be empty".to_string()));
    }
    let audio = state.voice.synthesize(&req.text).await?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], audio))
}
