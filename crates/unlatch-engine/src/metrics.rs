//! Engine metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Scheduler metrics.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Ticks started, including ticks skipped because the engine was stopped
    /// or disabled.
    pub ticks: AtomicU64,

    /// Detector passes.
    pub evaluations: AtomicU64,

    /// Detector passes that reported a gate.
    pub gated_evaluations: AtomicU64,

    /// Counted actions (submits and clicks).
    pub actions: AtomicU64,

    /// Cleanup passes that changed the page.
    pub cleanups: AtomicU64,

    /// Mutation notifications folded into an already pending tick.
    pub coalesced_triggers: AtomicU64,

    /// Deferred clicks dropped because the engine stopped or was disabled.
    pub deferred_cancelled: AtomicU64,

    start_time: parking_lot::RwLock<Option<Instant>>,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_start(&self) {
        *self.start_time.write() = Some(Instant::now());
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time
            .read()
            .map(|t| t.elapsed().as_secs())
            .unwrap_or(0)
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a detector pass.
    pub fn record_evaluation(&self, gated: bool) {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        if gated {
            self.gated_evaluations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_action(&self) {
        self.actions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cleanup(&self) {
        self.cleanups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self, count: u64) {
        self.coalesced_triggers.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_deferred_cancelled(&self) {
        self.deferred_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of the metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            uptime_secs: self.uptime_secs(),
            ticks: self.ticks.load(Ordering::Relaxed),
            evaluations: self.evaluations.load(Ordering::Relaxed),
            gated_evaluations: self.gated_evaluations.load(Ordering::Relaxed),
            actions: self.actions.load(Ordering::Relaxed),
            cleanups: self.cleanups.load(Ordering::Relaxed),
            coalesced_triggers: self.coalesced_triggers.load(Ordering::Relaxed),
            deferred_cancelled: self.deferred_cancelled.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub uptime_secs: u64,
    pub ticks: u64,
    pub evaluations: u64,
    pub gated_evaluations: u64,
    pub actions: u64,
    pub cleanups: u64,
    pub coalesced_triggers: u64,
    pub deferred_cancelled: u64,
}

impl MetricsSnapshot {
    /// Share of detector passes that found a gate.
    pub fn gated_ratio(&self) -> f64 {
        if self.evaluations == 0 {
            return 0.0;
        }
        self.gated_evaluations as f64 / self.evaluations as f64
    }

    /// Average actions per gated evaluation.
    pub fn actions_per_gate(&self) -> f64 {
        if self.gated_evaluations == 0 {
            return 0.0;
        }
        self.actions as f64 / self.gated_evaluations as f64
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
