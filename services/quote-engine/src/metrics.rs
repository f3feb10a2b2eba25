//! Observability counters for the quote engine
//!
//! Plain atomic counters, cheap enough to bump from inside the
//! per-instrument critical sections. Exported as a point-in-time snapshot
//! for whatever scraping layer sits above the service.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Core metrics for the quote engine service.
#[derive(Debug, Default)]
pub struct ServiceMetrics {
    // Reconciliation
    pub events_applied: AtomicU64,
    pub events_ignored: AtomicU64,

    // Matching
    pub quotes_matched: AtomicU64,
    pub quotes_no_match: AtomicU64,

    // Reservations
    pub holds_placed: AtomicU64,
    pub holds_expired: AtomicU64,
    pub sweeps_run: AtomicU64,
}

/// Point-in-time view of all counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub events_applied: u64,
    pub events_ignored: u64,
    pub quotes_matched: u64,
    pub quotes_no_match: u64,
    pub holds_placed: u64,
    pub holds_expired: u64,
    pub sweeps_run: u64,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Capture all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_applied: self.events_applied.load(Ordering::Relaxed),
            events_ignored: self.events_ignored.load(Ordering::Relaxed),
            quotes_matched: self.quotes_matched.load(Ordering::Relaxed),
            quotes_no_match: self.quotes_no_match.load(Ordering::Relaxed),
            holds_placed: self.holds_placed.load(Ordering::Relaxed),
            holds_expired: self.holds_expired.load(Ordering::Relaxed),
            sweeps_run: self.sweeps_run.load(Ordering::Relaxed),
        }
    }
}
