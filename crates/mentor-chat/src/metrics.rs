//! Process-wide interaction counters.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;

use mentor_core::types::AgentType;

#[derive(Debug, Default)]
struct Counters {
    total: u64,
    failed: u64,
    latency_ms_sum: u64,
    per_agent: BTreeMap<String, u64>,
}

/// Running totals over every handled turn.
#[derive(Debug, Default)]
pub struct InteractionMetrics {
    inner: Mutex<Counters>,
}

/// Point-in-time copy of the counters, as served by `/stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_interactions: u64,
    pub failed_interactions: u64,
    pub avg_response_time_ms: f64,
    pub per_agent: BTreeMap<String, u64>,
}

impl InteractionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, agent_type: AgentType, latency_ms: u64, success: bool) {
        let mut counters = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        counters.total += 1;
        if !success {
            counters.failed += 1;
        }
        counters.latency_ms_sum = counters.latency_ms_sum.saturating_add(latency_ms);
        *counters
            .per_agent
            .entry(agent_type.as_str().to_string())
            .or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let avg = if counters.total == 0 {
            0.0
        } else {
            counters.latency_ms_sum as f64 / counters.total as f64
        };
        MetricsSnapshot {
            total_interactions: counters.total,
            failed_interactions: counters.failed,
            avg_response_time_ms: avg,
            per_agent: counters.per_agent.clone(),
        }
    }
}
