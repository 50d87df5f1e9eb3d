//! Orchestrator telemetry.
//!
//! # Architecture
//!
//! ```text
//! request / completions ─────► OrchestratorMetrics ─────► MetricsSnapshot ─────► CLI, logs
//!                              (atomic counters)          (point-in-time copy)
//! ```
//!
//! # Example
//!
//! ```
//! use tilechain::telemetry::OrchestratorMetrics;
//!
//! let metrics = OrchestratorMetrics::new();
//! metrics.request_received();
//! metrics.cache_hit();
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.cache_hit_rate(), 1.0);
//! ```

mod metrics;
mod snapshot;

pub use metrics::OrchestratorMetrics;
pub use snapshot::MetricsSnapshot;
