//! Error types for the agent layer.

use mentor_core::error::MentorError;

/// Errors raised by agent handlers.
///
/// The router turns any of these into an unsuccessful envelope; direct
/// callers (feedback, booking, telephony endpoints) see them as-is.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Capability unavailable: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Core(#[from] MentorError),
}

impl AgentError {
    /// True when the caller sent something unacceptable.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AgentError::InvalidRequest(_) | AgentError::Core(MentorError::Validation(_))
        )
    }
}
