//! Mentor API crate - axum HTTP transport.
//!
//! Exposes chat, feedback, appointment, telephony, voice, stats and health
//! endpoints over the conversation orchestrator and the agent handlers.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
