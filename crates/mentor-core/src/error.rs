use thiserror::Error;

/// Top-level error type for the mentor service.
///
/// Variants follow the failure taxonomy the service reasons about: startup
/// failures (`Config`, `Connectivity`), boundary failures (`Validation`),
/// remote contract failures (`Upstream`, `DimensionMismatch`) and local
/// persistence failures. Crate-local error types wrap this one with
/// `#[from]` so `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MentorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upstream error{}: {message}", status.map(|s| format!(" (status {})", s)).unwrap_or_default())]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MentorError {
    /// True for failures that may clear up on their own (remote or store
    /// unreachable, pool saturated past its wait budget).
    pub fn is_transient(&self) -> bool {
        matches!(self, MentorError::Connectivity(_) | MentorError::Timeout(_))
    }

    /// True for remote contract violations. A dimension mismatch is an
    /// upstream failure as far as callers are concerned.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            MentorError::Upstream { .. } | MentorError::DimensionMismatch { .. }
        )
    }
}

impl From<toml::de::Error> for MentorError {
    fn from(err: toml::de::Error) -> Self {
        MentorError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for MentorError {
    fn from(err: toml::ser::Error) -> Self {
        MentorError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for MentorError {
    fn from(err: serde_json::Error) -> Self {
        MentorError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for mentor operations.
pub type Result<T> = std::result::Result<T, MentorError>;
