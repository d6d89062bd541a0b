//! Error types for the conversation layer.

use mentor_core::error::MentorError;

/// Errors surfaced by the orchestrator to the transport layer.
///
/// Handler failures never appear here; the router turns them into
/// unsuccessful envelopes. Everything except `Denied` and `Core` is a
/// validation failure.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("session id cannot be empty")]
    EmptySessionId,
    #[error("session id exceeds maximum length of {0} characters")]
    SessionIdTooLong(usize),
    #[error("access denied: {0}")]
    Denied(String),
    #[error(transparent)]
    Core(#[from] MentorError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::EmptyMessage.to_string(), "message cannot be empty");
        assert_eq!(
            ChatError::MessageTooLong(2000).to_string(),
            "message exceeds maximum length of 2000 characters"
        );
        assert_eq!(ChatError::EmptySessionId.to_string(), "session id cannot be empty");
        assert_eq!(
            ChatError::SessionIdTooLong(255).to_string(),
            "session id exceeds maximum length of 255 characters"
        );
        assert_eq!(
            ChatError::Denied("session s1 is blocked".into()).to_string(),
            "access denied: session s1 is blocked"
        );
    }

    #[test]
    fn test_core_error_is_transparent() {
        let err: ChatError = MentorError::Storage("disk full".into()).into();
        assert!(matches!(err, ChatError::Core(_)));
        assert_eq!(err.to_string(), MentorError::Storage("disk full".into()).to_string());
    }
}
