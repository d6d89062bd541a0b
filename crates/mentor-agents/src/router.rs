//! Agent router.
//!
//! Maps each intent label to a handler and normalizes whatever the handler
//! does into a `ResponseEnvelope`. Handlers run on their own task, so a
//! handler that errors or panics yields an apology envelope carrying the
//! failure reason instead of an error. Failing handlers are not retried.

use std::collections::HashMap;
use std::sync::Arc;

use mentor_core::types::{AgentType, IntentLabel, ResponseEnvelope};

use crate::handler::{AgentHandler, HandlerRequest};

/// Result of routing one message.
#[derive(Debug, Clone)]
pub struct RoutedResponse {
    /// The agent that produced the envelope, `Router` when none ran.
    pub agent_type: AgentType,
    pub envelope: ResponseEnvelope,
}

/// Intent-to-handler dispatch table.
#[derive(Clone)]
pub struct AgentRouter {
    routes: HashMap<IntentLabel, Arc<dyn AgentHandler>>,
}

impl AgentRouter {
    /// Standard table: scheduling goes to the scheduler, everything else to
    /// retrieval.
    pub fn new(retrieval: Arc<dyn AgentHandler>, scheduler: Arc<dyn AgentHandler>) -> Self {
        let mut routes: HashMap<IntentLabel, Arc<dyn AgentHandler>> = HashMap::new();
        routes.insert(IntentLabel::Scheduling, scheduler);
        routes.insert(IntentLabel::CourseInfo, retrieval.clone());
        routes.insert(IntentLabel::Enrollment, retrieval.clone());
        routes.insert(IntentLabel::General, retrieval);
        Self { routes }
    }

    /// A router with no routes.
    pub fn empty() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Replace the handler for one intent.
    pub fn with_route(mut self, intent: IntentLabel, handler: Arc<dyn AgentHandler>) -> Self {
        self.routes.insert(intent, handler);
        self
    }

    /// The agent type that `intent` is routed to, if any.
    pub fn agent_for(&self, intent: IntentLabel) -> Option<AgentType> {
        self.routes.get(&intent).map(|h| h.agent_type())
    }

    /// Dispatch a request to the handler for its intent.
    ///
    /// Always returns an envelope.
    pub async fn route(&self, request: HandlerRequest) -> RoutedResponse {
        let intent = request.intent;
        let Some(handler) = self.routes.get(&intent).cloned() else {
            tracing::warn!(intent = %intent, "No handler registered for intent");
            return RoutedResponse {
                agent_type: AgentType::Router,
                envelope: ResponseEnvelope::apology(format!(
                    "no handler registered for intent {}",
                    intent
                )),
            };
        };

        let agent_type = handler.agent_type();
        let session_id = request.session_id.clone();
        let outcome = tokio::spawn(async move { handler.handle(&request).await }).await;

        let envelope = match outcome {
            Ok(Ok(envelope)) => envelope,
            Ok(Err(e)) => {
                tracing::warn!(
                    agent = %agent_type,
                    session_id = %session_id,
                    error = %e,
                    "Handler failed"
                );
                ResponseEnvelope::apology(e.to_string())
            }
            Err(join_err) => {
                let reason = if join_err.is_panic() {
                    format!("{} handler panicked", agent_type)
                } else {
                    format!("{} handler was cancelled", agent_type)
                };
                tracing::error!(
                    agent = %agent_type,
                    session_id = %session_id,
                    "{}",
                    reason
                );
                ResponseEnvelope::apology(reason)
            }
        };

        RoutedResponse {
            agent_type,
            envelope,
        }
    }
}
