//! Per-host action rate limiting over a sliding window.
//!
//! Each host has a ledger of action timestamps (milliseconds since the Unix
//! epoch) stored as a JSON array under `loop_ledger:<host>`. The ledger lives
//! in the session store, so it survives navigation between pages of the same
//! session.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::error::EngineResult;
use crate::store::{read_flag, KeyValueStore, LOOP_PREVENTION_KEY};

/// Sliding-window guard against pages that keep re-presenting a gate.
pub struct LoopGuard {
    store: Arc<dyn KeyValueStore>,
    limit: u32,
    window: Duration,
    enabled: bool,
}

impl LoopGuard {
    pub fn new(store: Arc<dyn KeyValueStore>, limit: u32, window: Duration) -> Self {
        Self {
            store,
            limit,
            window,
            enabled: true,
        }
    }

    pub fn from_config(store: Arc<dyn KeyValueStore>, config: &unlatch_config::LoopGuardConfig) -> Self {
        let window = i64::try_from(config.window_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or_else(|| Duration::days(1));
        Self {
            enabled: config.enabled,
            ..Self::new(store, config.limit, window)
        }
    }

    pub fn ledger_key(host: &str) -> String {
        format!("loop_ledger:{}", host)
    }

    /// Whether another action on `host` is allowed at `now`.
    ///
    /// Allowed iff fewer than `limit` actions fall inside the trailing window.
    /// Storage faults and the loop-prevention toggle both allow.
    pub fn check_loop(&self, host: &str, now: DateTime<Utc>) -> bool {
        if !self.enabled || !read_flag(self.store.as_ref(), LOOP_PREVENTION_KEY, true) {
            return true;
        }

        let ledger = match self.read_ledger(host) {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!(host = %host, "Loop ledger unreadable, allowing: {}", e);
                return true;
            }
        };

        let since = (now - self.window).timestamp_millis();
        let recent = ledger.iter().filter(|ts| **ts > since).count();
        let allowed = recent < self.limit as usize;
        if !allowed {
            debug!(host = %host, recent, limit = self.limit, "Loop guard tripped");
        }
        allowed
    }

    /// Append an action timestamp, pruning entries older than twice the window.
    pub fn record_action(&self, host: &str, now: DateTime<Utc>) {
        let mut ledger = self.read_ledger(host).unwrap_or_else(|e| {
            warn!(host = %host, "Loop ledger unreadable, starting fresh: {}", e);
            Vec::new()
        });

        let horizon = (now - self.window * 2).timestamp_millis();
        ledger.retain(|ts| *ts > horizon);
        ledger.push(now.timestamp_millis());

        if let Err(e) = self.write_ledger(host, &ledger) {
            warn!(host = %host, "Failed to persist loop ledger: {}", e);
        }
    }

    /// Stored timestamps for `host`, oldest first.
    pub fn ledger(&self, host: &str) -> Vec<i64> {
        self.read_ledger(host).unwrap_or_default()
    }

    fn read_ledger(&self, host: &str) -> EngineResult<Vec<i64>> {
        match self.store.get(&Self::ledger_key(host))? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    fn write_ledger(&self, host: &str, ledger: &[i64]) -> EngineResult<()> {
        self.store
            .set(&Self::ledger_key(host), &serde_json::to_string(ledger)?)
    }
}

#[cfg(test)]
#[path = "loop_guard_tests.rs"]
mod tests;
