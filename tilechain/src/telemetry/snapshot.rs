//! Point-in-time view of orchestrator metrics.

use std::fmt;
use std::time::Duration;

/// Copy of the orchestrator counters at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Time since metrics collection started.
    pub uptime: Duration,
    /// Calls to `request`.
    pub requests: u64,
    /// Up-to-date cache hits.
    pub cache_hits: u64,
    /// Stale hits accepted in degraded mode.
    pub stale_served: u64,
    /// Requests short-circuited by backoff.
    pub backoff_deferred: u64,
    /// Requests whose tile was already in flight.
    pub coalesced: u64,
    /// Cursors handed to backends.
    pub dispatches: u64,
    /// Successful fetches.
    pub successes: u64,
    /// Individual backend failures (the walk may have continued).
    pub backend_failures: u64,
    /// Stale images delivered by backends.
    pub expired_served: u64,
    /// Walks that ran out of backends.
    pub chains_exhausted: u64,
    /// Walks aborted by queue overflow.
    pub queue_overflows: u64,
    /// Walks retired by a source switch.
    pub walks_retired: u64,
    /// Completions discarded after teardown or a source switch.
    pub completions_ignored: u64,
}

impl MetricsSnapshot {
    /// Fraction of requests answered from cache without dispatch (0.0 - 1.0).
    pub fn cache_hit_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            (self.cache_hits + self.stale_served) as f64 / self.requests as f64
        }
    }

    /// Fraction of requests deduplicated against an in-flight fetch.
    pub fn coalescing_ratio(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.coalesced as f64 / self.requests as f64
        }
    }

    /// Total walks that ended without a fresh image.
    pub fn failures(&self) -> u64 {
        self.chains_exhausted + self.queue_overflows
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requests ({:.1}% cached, {} coalesced, {} backed off), \
             {} dispatches, {} loaded, {} stale, {} failed ({} overflow)",
            self.requests,
            self.cache_hit_rate() * 100.0,
            self.coalesced,
            self.backoff_deferred,
            self.dispatches,
            self.successes,
            self.expired_served,
            self.failures(),
            self.queue_overflows
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratios_with_no_requests() {
        let snapshot = MetricsSnapshot::default();
        assert_eq!(snapshot.cache_hit_rate(), 0.0);
        assert_eq!(snapshot.coalescing_ratio(), 0.0);
    }

    #[test]
    fn test_ratios() {
        let snapshot = MetricsSnapshot {
            requests: 10,
            cache_hits: 4,
            stale_served: 1,
            coalesced: 2,
            ..Default::default()
        };
        assert!((snapshot.cache_hit_rate() - 0.5).abs() < f64::EPSILON);
        assert!((snapshot.coalescing_ratio() - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_display() {
        let snapshot = MetricsSnapshot {
            requests: 3,
            chains_exhausted: 1,
            queue_overflows: 1,
            ..Default::default()
        };
        let text = snapshot.to_string();
        assert!(text.contains("3 requests"));
        assert!(text.contains("2 failed (1 overflow)"));
    }
}
