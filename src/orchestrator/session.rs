//! Per-session conversation history.
//!
//! Sessions are created lazily on first append and only ever grow, unless the
//! injected [`RetentionPolicy`] evicts them. Backed by [`DashMap`] so concurrent
//! requests on different sessions never contend on a global lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

use crate::router::Intent;

/// One prior prompt. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    pub prompt: String,
    pub intent: Intent,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl Exchange {
    pub fn new(prompt: impl Into<String>, intent: Intent) -> Self {
        Self {
            prompt: prompt.into(),
            intent,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Retention limits. Both unset means sessions live for the process lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Evict the least-recently-touched session beyond this count.
    pub max_sessions: Option<usize>,
    /// Drop sessions idle for longer than this.
    pub max_age: Option<Duration>,
}

impl RetentionPolicy {
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Reject zero limits, which would drop every session as soon as it is written.
    pub fn check(&self) -> Result<(), String> {
        if self.max_sessions == Some(0) {
            return Err("sessions.max_sessions must be at least 1".to_string());
        }
        if self.max_age.is_some_and(|age| age.is_zero()) {
            return Err("sessions.max_age_secs must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Position of a request in arrival order, taken when the request enters.
///
/// Exchanges are kept sorted by arrival, so a slow request is recorded ahead
/// of a faster one that arrived after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Arrival(u64);

#[derive(Debug)]
struct Session {
    exchanges: Vec<(Arrival, Exchange)>,
    last_touched: Instant,
    touch_seq: u64,
}

/// Keyed, isolated session histories.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    policy: RetentionPolicy,
    arrivals: AtomicU64,
    touches: AtomicU64,
}

impl SessionStore {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            sessions: DashMap::new(),
            policy,
            arrivals: AtomicU64::new(0),
            touches: AtomicU64::new(0),
        }
    }

    /// Reserve the next arrival position.
    pub fn arrive(&self) -> Arrival {
        Arrival(self.arrivals.fetch_add(1, Ordering::SeqCst))
    }

    /// Append an exchange that arrives now, creating the session if needed.
    pub fn append(&self, session_id: &str, exchange: Exchange) {
        let arrival = self.arrive();
        self.insert(session_id, arrival, exchange);
    }

    /// Record an exchange at its reserved arrival position.
    pub fn insert(&self, session_id: &str, arrival: Arrival, exchange: Exchange) {
        let seq = self.touches.fetch_add(1, Ordering::Relaxed);
        {
            let mut session = self
                .sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Session {
                    exchanges: Vec::new(),
                    last_touched: Instant::now(),
                    touch_seq: seq,
                });
            let at = session.exchanges.partition_point(|(a, _)| *a < arrival);
            session.exchanges.insert(at, (arrival, exchange));
            session.last_touched = Instant::now();
            session.touch_seq = seq;
        }
        // entry guard dropped before touching other shards
        self.enforce_policy();
    }

    /// Ordered history for `session_id`; empty when unknown.
    pub fn get(&self, session_id: &str) -> Vec<Exchange> {
        self.sessions
            .get(session_id)
            .map(|s| s.exchanges.iter().map(|(_, e)| e.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Drop sessions idle past `max_age`. Returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let Some(max_age) = self.policy.max_age else {
            return 0;
        };
        let before = self.sessions.len();
        let now = Instant::now();
        self.sessions
            .retain(|_, s| now.duration_since(s.last_touched) <= max_age);
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            tracing::debug!(removed, "Pruned expired sessions");
        }
        removed
    }

    fn enforce_policy(&self) {
        self.prune_expired();

        let Some(max_sessions) = self.policy.max_sessions else {
            return;
        };
        while self.sessions.len() > max_sessions {
            let oldest = self
                .sessions
                .iter()
                .min_by_key(|entry| entry.value().touch_seq)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    self.sessions.remove(&key);
                    tracing::debug!(session = %key, "Evicted least-recently-used session");
                }
                None => break,
            }
        }
    }
}
