//! Lock-free atomic metrics collection.
//!
//! Uses `AtomicU64` counters so the request path and backend completions can
//! record events without taking locks.

use super::MetricsSnapshot;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters for the orchestrator.
///
/// All operations use `Relaxed` ordering; the counters are independent
/// measurements and are only read together through [`snapshot`](Self::snapshot).
pub struct OrchestratorMetrics {
    /// When metrics collection started
    start_time: Instant,

    // === Request path ===
    requests: AtomicU64,
    cache_hits: AtomicU64,
    stale_served: AtomicU64,
    backoff_deferred: AtomicU64,
    coalesced: AtomicU64,

    // === Chain walk ===
    dispatches: AtomicU64,
    successes: AtomicU64,
    backend_failures: AtomicU64,
    expired_served: AtomicU64,

    // === Terminal failures ===
    chains_exhausted: AtomicU64,
    queue_overflows: AtomicU64,
    walks_retired: AtomicU64,

    /// Completions dropped because their request was no longer tracked
    completions_ignored: AtomicU64,
}

impl OrchestratorMetrics {
    /// Creates a zeroed metrics instance.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            requests: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            stale_served: AtomicU64::new(0),
            backoff_deferred: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            dispatches: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            backend_failures: AtomicU64::new(0),
            expired_served: AtomicU64::new(0),
            chains_exhausted: AtomicU64::new(0),
            queue_overflows: AtomicU64::new(0),
            walks_retired: AtomicU64::new(0),
            completions_ignored: AtomicU64::new(0),
        }
    }

    /// Record a call to `request`.
    pub fn request_received(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an up-to-date cache hit.
    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stale hit accepted in degraded mode.
    pub fn stale_served(&self) {
        self.stale_served.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request deferred by backoff.
    pub fn backoff_deferred(&self) {
        self.backoff_deferred.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request that found its tile already in flight.
    pub fn coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cursor handed to a backend.
    pub fn dispatched(&self) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful fetch.
    pub fn succeeded(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a single backend failing a request.
    pub fn backend_failed(&self) {
        self.backend_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stale image delivered by a backend.
    pub fn expired_served(&self) {
        self.expired_served.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a walk that ran out of backends.
    pub fn chain_exhausted(&self) {
        self.chains_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a walk aborted by queue overflow.
    pub fn queue_overflow(&self) {
        self.queue_overflows.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a walk retired by a source switch.
    pub fn walk_retired(&self) {
        self.walks_retired.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completion for a request that is no longer tracked.
    pub fn completion_ignored(&self) {
        self.completions_ignored.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime: self.start_time.elapsed(),
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            stale_served: self.stale_served.load(Ordering::Relaxed),
            backoff_deferred: self.backoff_deferred.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            dispatches: self.dispatches.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            backend_failures: self.backend_failures.load(Ordering::Relaxed),
            expired_served: self.expired_served.load(Ordering::Relaxed),
            chains_exhausted: self.chains_exhausted.load(Ordering::Relaxed),
            queue_overflows: self.queue_overflows.load(Ordering::Relaxed),
            walks_retired: self.walks_retired.load(Ordering::Relaxed),
            completions_ignored: self.completions_ignored.load(Ordering::Relaxed),
        }
    }
}

impl Default for OrchestratorMetrics {
    fn default() -> Self {
        Self::new()
    }
}
