//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use mentor_agents::{
    AgentRouter, CallService, FeedbackHandler, RetrievalHandler, SchedulerHandler, SpeechService,
    TelephonyHandler, VoiceHandler,
};
use mentor_chat::ConversationOrchestrator;
use mentor_core::access::AccessPolicy;
use mentor_core::config::MentorConfig;
use mentor_retrieval::RetrievalGateway;
use mentor_storage::{
    AppointmentRepository, ConversationRepository, Database, FeedbackRepository, UserRepository,
};

/// Shared application state. Every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<MentorConfig>,
    pub database: Arc<Database>,
    pub retrieval: RetrievalGateway,
    pub orchestrator: Arc<ConversationOrchestrator>,
    pub feedback: Arc<FeedbackHandler>,
    pub scheduler: Arc<SchedulerHandler>,
    pub telephony: Arc<TelephonyHandler>,
    pub voice: Arc<VoiceHandler>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire repositories, handlers, router and orchestrator over an open
    /// database and a retrieval gateway.
    pub fn new(
        config: MentorConfig,
        database: Arc<Database>,
        retrieval: RetrievalGateway,
        calls: Arc<dyn CallService>,
        speech: Arc<dyn SpeechService>,
    ) -> Self {
        let users = Arc::new(UserRepository::new(database.clone()));
        let conversations = Arc::new(ConversationRepository::new(database.clone()));
        let feedback = Arc::new(FeedbackRepository::new(database.clone()));
        let appointments = Arc::new(AppointmentRepository::new(database.clone()));

        let scheduler = Arc::new(SchedulerHandler::new(appointments));
        let retrieval_handler = Arc::new(RetrievalHandler::new(
            retrieval.clone(),
            config.retrieval.top_k,
            config.retrieval.snippet_chars,
        ));
        let router = AgentRouter::new(retrieval_handler, scheduler.clone());

        let orchestrator = ConversationOrchestrator::new(
            users,
            conversations,
            router,
            AccessPolicy::new(&config.access),
            config.chat.clone(),
        );

        Self {
            config: Arc::new(config),
            database,
            retrieval,
            orchestrator: Arc::new(orchestrator),
            feedback: Arc::new(FeedbackHandler::new(feedback)),
            scheduler,
            telephony: Arc::new(TelephonyHandler::new(calls)),
            voice: Arc::new(VoiceHandler::new(speech)),
            start_time: Instant::now(),
        }
    }
}
