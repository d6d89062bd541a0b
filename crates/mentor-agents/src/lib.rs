//! Agent layer for Mentor.
//!
//! Classifies messages into intents, and routes them to the handler for
//! that intent: retrieval, scheduling, feedback, telephony or voice.

pub mod error;
pub mod handler;
pub mod intent;
pub mod router;

pub use error::AgentError;
pub use handler::{
    AgentHandler, AppointmentRequest, CallRecord, CallService, FeedbackHandler, HandlerRequest,
    LoggingCallService, RetrievalHandler, SchedulerHandler, SpeechService, TelephonyHandler,
    UnavailableSpeechService, VoiceHandler,
};
pub use intent::{Classification, IntentClassifier};
pub use router::{AgentRouter, RoutedResponse};
