//! Process-wide routing and latency metrics.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;

use crate::provider::Tier;

#[derive(Debug, Default)]
struct MetricsInner {
    total_requests: u64,
    routing_decisions: BTreeMap<Tier, u64>,
    avg_response_time_ms: f64,
}

/// Monotonically accumulating in-memory counters. Reset only on restart.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    inner: Mutex<MetricsInner>,
}

/// Read-only copy of the metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub routing_decisions: BTreeMap<Tier, u64>,
    pub avg_response_time_ms: f64,
    pub active_session_count: usize,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed request routed to `tier`.
    ///
    /// Updates the running mean as `(avg * (n - 1) + duration) / n` with `n`
    /// the post-increment request count.
    pub fn record_completion(&self, tier: Tier, duration_ms: f64) {
        let mut inner = self.inner.lock().unwrap();
        inner.total_requests += 1;
        *inner.routing_decisions.entry(tier).or_insert(0) += 1;

        let n = inner.total_requests as f64;
        inner.avg_response_time_ms = (inner.avg_response_time_ms * (n - 1.0) + duration_ms) / n;
    }

    /// Copy the counters, attaching the caller-supplied live session count.
    pub fn snapshot(&self, active_session_count: usize) -> MetricsSnapshot {
        let inner = self.inner.lock().unwrap();
        MetricsSnapshot {
            total_requests: inner.total_requests,
            routing_decisions: inner.routing_decisions.clone(),
            avg_response_time_ms: inner.avg_response_time_ms,
            active_session_count,
        }
    }
}
