//! Router setup with all API routes and middleware.

use std::future::Future;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use mentor_core::error::MentorError;

use crate::handlers;
use crate::state::AppState;

/// Global request body ceiling.
const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.general.allowed_origins);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/stats", get(handlers::stats))
        .route("/chat", post(handlers::chat))
        .route("/sessions/{session_id}/history", get(handlers::history))
        .route("/feedback", post(handlers::submit_feedback))
        .route("/feedback/summary", get(handlers::feedback_summary))
        .route("/appointments", post(handlers::book_appointment))
        .route(
            "/users/{user_id}/appointments",
            get(handlers::list_appointments),
        )
        .route("/voice/inbound", post(handlers::inbound_call))
        .route("/voice/transcribe", post(handlers::transcribe))
        .route("/voice/synthesize", post(handlers::synthesize))
        .route("/calls/outbound", post(handlers::outbound_call))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS from the configured origin list; `*` allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o.trim() == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match o.trim().parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
}

/// Bind `addr` and serve until `shutdown` resolves, then drain in-flight
/// requests.
pub async fn start_server<F>(addr: &str, state: AppState, shutdown: F) -> Result<(), MentorError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| MentorError::Connectivity(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!(addr = %addr, "API server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(MentorError::Io)?;

    tracing::info!("API server stopped");
    Ok(())
}
