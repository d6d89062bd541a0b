//! Conversation orchestrator: the entry point the transport layer calls.
//!
//! One turn runs as: validate, check access, resolve the user, classify,
//! route (timed), persist, respond. Only validation and access failures are
//! returned as errors. Once a message is accepted the caller always gets a
//! response, even when the store is unreachable or the handler fails.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use mentor_agents::{AgentRouter, HandlerRequest, IntentClassifier};
use mentor_core::access::{AccessDecision, AccessPolicy};
use mentor_core::config::ChatConfig;
use mentor_core::types::{ChatResponse, Conversation, Metadata, NewConversation, User, UserProfile};
use mentor_storage::{ConversationRepository, UserRepository};

use crate::error::ChatError;
use crate::metrics::{InteractionMetrics, MetricsSnapshot};

/// Coordinates the classifier, router and persistence for each chat turn.
pub struct ConversationOrchestrator {
    users: Arc<UserRepository>,
    conversations: Arc<ConversationRepository>,
    classifier: IntentClassifier,
    router: AgentRouter,
    access: AccessPolicy,
    config: ChatConfig,
    metrics: InteractionMetrics,
}

impl ConversationOrchestrator {
    pub fn new(
        users: Arc<UserRepository>,
        conversations: Arc<ConversationRepository>,
        router: AgentRouter,
        access: AccessPolicy,
        config: ChatConfig,
    ) -> Self {
        Self {
            users,
            conversations,
            classifier: IntentClassifier::new(),
            router,
            access,
            config,
            metrics: InteractionMetrics::new(),
        }
    }

    /// Handle one inbound message for `session_key`.
    ///
    /// Every accepted call records a new turn; repeated messages are not
    /// deduplicated.
    pub async fn handle_message(
        &self,
        session_key: &str,
        message: &str,
        profile: Option<UserProfile>,
    ) -> Result<ChatResponse, ChatError> {
        self.validate(session_key, message)?;

        if let AccessDecision::Deny { reason } = self.access.check(session_key) {
            tracing::warn!(session_id = %session_key, reason = %reason, "Message rejected");
            return Err(ChatError::Denied(reason));
        }

        let profile_metadata = profile
            .as_ref()
            .map(UserProfile::to_metadata)
            .unwrap_or_default();
        let user = self.resolve_user(session_key, profile, &profile_metadata).await;

        let classification = self.classifier.explain(message);
        tracing::debug!(
            session_id = %session_key,
            intent = %classification.label,
            keyword = classification.keyword.unwrap_or("-"),
            "Message classified"
        );

        let mut request_metadata = user
            .as_ref()
            .map(|u| u.metadata.clone())
            .unwrap_or_default();
        request_metadata.extend(profile_metadata);
        let request = HandlerRequest::new(message, session_key, classification.label)
            .with_user(user.as_ref().map(|u| u.id))
            .with_metadata(request_metadata);

        let started = Instant::now();
        let routed = self.router.route(request).await;
        let response_time_ms = started.elapsed().as_millis() as u64;
        let envelope = routed.envelope;

        let mut metadata = envelope.metadata.clone();
        metadata.insert("agent_type".into(), routed.agent_type.as_str().into());
        metadata.insert("response_time_ms".into(), response_time_ms.into());

        let conversation_id = match &user {
            Some(user) => {
                let turn = NewConversation {
                    user_id: user.id,
                    session_id: session_key.to_string(),
                    message: message.to_string(),
                    response: envelope.message.clone(),
                    agent_type: routed.agent_type,
                    intent: Some(classification.label),
                    confidence: envelope.confidence,
                    response_time_ms: Some(response_time_ms),
                    metadata: envelope.metadata.clone(),
                };
                match self.conversations.record(turn).await {
                    Ok(id) => Some(id),
                    Err(e) => {
                        tracing::error!(
                            session_id = %session_key,
                            error = %e,
                            "Failed to persist conversation turn"
                        );
                        None
                    }
                }
            }
            None => None,
        };
        metadata.insert("persisted".into(), conversation_id.is_some().into());
        if let Some(id) = conversation_id {
            metadata.insert("conversation_id".into(), id.to_string().into());
        }

        tracing::info!(
            user_id = %user.as_ref().map(|u| u.id.to_string()).unwrap_or_else(|| "-".into()),
            agent_type = %routed.agent_type,
            response_time_ms,
            success = envelope.success,
            "Interaction"
        );
        self.metrics
            .record(routed.agent_type, response_time_ms, envelope.success);

        Ok(ChatResponse {
            message: envelope.message,
            session_id: session_key.to_string(),
            intent: Some(classification.label),
            confidence: envelope.confidence,
            timestamp: Utc::now(),
            sources: envelope.sources,
            metadata,
        })
    }

    /// Recent turns for a session, newest first. `None` uses the configured
    /// history limit.
    pub async fn history(
        &self,
        session_key: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Conversation>, ChatError> {
        self.validate_session(session_key)?;
        let limit = limit.unwrap_or(self.config.history_limit).max(1);
        Ok(self
            .conversations
            .recent_for_session(session_key, limit as u64)
            .await?)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Resolve the session's user. Failures are logged and yield `None`.
    async fn resolve_user(
        &self,
        session_key: &str,
        profile: Option<UserProfile>,
        patch: &Metadata,
    ) -> Option<User> {
        let user = match self.users.get_or_create(session_key, profile).await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(
                    session_id = %session_key,
                    error = %e,
                    "Could not resolve user, continuing without persistence"
                );
                return None;
            }
        };
        if let Err(e) = self.users.touch(user.id, patch.clone()).await {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to update user activity");
        }
        Some(user)
    }

    fn validate(&self, session_key: &str, message: &str) -> Result<(), ChatError> {
        self.validate_session(session_key)?;
        if message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if message.chars().count() > self.config.max_message_length {
            return Err(ChatError::MessageTooLong(self.config.max_message_length));
        }
        Ok(())
    }

    fn validate_session(&self, session_key: &str) -> Result<(), ChatError> {
        if session_key.trim().is_empty() {
            return Err(ChatError::EmptySessionId);
        }
        if session_key.chars().count() > self.config.max_session_key_length {
            return Err(ChatError::SessionIdTooLong(
                self.config.max_session_key_length,
            ));
        }
        Ok(())
    }
}
