//! Mentor storage crate - pooled SQLite persistence.
//!
//! Provides a bounded connection pool with scoped acquisition, idempotent
//! schema migrations, and repositories for users, conversation turns,
//! feedback and appointments.

pub mod db;
pub mod migrations;
pub mod repository;

pub use db::{parse_database_url, Database, PoolSettings, PoolStatus};
pub use repository::{
    AppointmentRepository, ConversationRepository, FeedbackRepository, UserRepository,
};
