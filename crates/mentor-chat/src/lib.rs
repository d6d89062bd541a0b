//! Conversation orchestration for Mentor.
//!
//! Ties user resolution, intent classification, agent routing and turn
//! persistence together behind a single `handle_message` entry point.

pub mod error;
pub mod metrics;
pub mod orchestrator;

pub use error::ChatError;
pub use metrics::{InteractionMetrics, MetricsSnapshot};
pub use orchestrator::ConversationOrchestrator;
