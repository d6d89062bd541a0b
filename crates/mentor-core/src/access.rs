//! Access policy consulted before a message is dispatched.

use std::collections::HashSet;

use crate::config::AccessConfig;

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny { reason: String },
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

/// Session-level allow/deny policy.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    blocked_sessions: HashSet<String>,
}

impl AccessPolicy {
    pub fn new(config: &AccessConfig) -> Self {
        Self {
            blocked_sessions: config.blocked_sessions.iter().cloned().collect(),
        }
    }

    /// A policy that allows every session.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn check(&self, session_key: &str) -> AccessDecision {
        if self.blocked_sessions.contains(session_key) {
            return AccessDecision::Deny {
                reason: format!("session {} is blocked", session_key),
            };
        }
        AccessDecision::Allow
    }
}
