//! Shared foundation for the mentor workspace: configuration, the error
//! taxonomy, domain types, and the access policy consulted before dispatch.

pub mod access;
pub mod config;
pub mod error;
pub mod types;

pub use access::{AccessDecision, AccessPolicy};
pub use config::MentorConfig;
pub use error::{MentorError, Result};
pub use types::*;
