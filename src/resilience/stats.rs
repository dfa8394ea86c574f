//! Per-key attempt counters.
//!
//! # Responsibilities
//! - Count attempts, successes and failures per operation key
//! - Remember the most recent failure and attempt time
//! - Hand out detached snapshots for the admin API
//!
//! # Design Decisions
//! - DashMap entry guards make every update atomic per key
//! - Counters only grow; nothing decays
//! - `attempts == successes + failures` whenever no attempt is in flight

use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::resilience::clock::Clock;

/// Counters for one operation key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub last_error: Option<String>,
    /// Epoch milliseconds.
    pub last_attempt_at: Option<u64>,
}

/// Thread-safe collection of [`RetryStats`].
#[derive(Debug)]
pub struct StatsCollector {
    entries: DashMap<String, RetryStats>,
    clock: Arc<dyn Clock>,
}

impl StatsCollector {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// An attempt is about to run.
    pub fn record_attempt(&self, key: &str) {
        let now = self.clock.now_ms();
        let mut entry = self.entries.entry(key.to_string()).or_default();
        entry.attempts += 1;
        entry.last_attempt_at = Some(now);
    }

    pub fn record_success(&self, key: &str) {
        self.entries.entry(key.to_string()).or_default().successes += 1;
    }

    pub fn record_failure(&self, key: &str, error: impl Display) {
        let mut entry = self.entries.entry(key.to_string()).or_default();
        entry.failures += 1;
        entry.last_error = Some(error.to_string());
    }

    /// Stats for a single key.
    pub fn get(&self, key: &str) -> Option<RetryStats> {
        self.entries.get(key).map(|r| r.value().clone())
    }

    /// Detached copy of every entry, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, RetryStats> {
        self.entries
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }
}
