//! Orchestrator events and errors.

use std::fmt;

use thiserror::Error;

use crate::cache::Freshness;
use crate::coord::TileKey;

/// Errors returned by orchestrator configuration calls.
///
/// Fetch outcomes are never errors: they surface as [`TileEvent`]s.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    /// A backoff schedule needs at least one duration.
    #[error("Backoff schedule must contain at least one duration")]
    EmptyBackoffSchedule,
}

/// Why a chain walk ended without a fresh image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// Every eligible backend was tried (or none was eligible).
    ChainExhausted,
    /// A backend's work queue was saturated; the rest of the chain was skipped.
    QueueOverflow,
    /// The tile source was switched while the walk was running.
    SourceChanged,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::ChainExhausted => write!(f, "chain exhausted"),
            FailureReason::QueueOverflow => write!(f, "queue overflow"),
            FailureReason::SourceChanged => write!(f, "source changed"),
        }
    }
}

/// Asynchronous result of a tile request, broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileEvent {
    /// An image was stored in the cache.
    ///
    /// A `Stale` image may be followed by a fresher one for the same key.
    Loaded { key: TileKey, freshness: Freshness },

    /// No fresh image is available now.
    ///
    /// The tile is backed off unless the walk was retired by a source switch.
    Failed { key: TileKey, reason: FailureReason },
}

impl TileEvent {
    /// The tile the event refers to.
    pub fn key(&self) -> TileKey {
        match self {
            TileEvent::Loaded { key, .. } | TileEvent::Failed { key, .. } => *key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OrchestratorError::EmptyBackoffSchedule;
        assert!(err.to_string().contains("at least one"));
    }

    #[test]
    fn test_event_key() {
        let key = TileKey::new(3, 1, 2).unwrap();
        let event = TileEvent::Failed {
            key,
            reason: FailureReason::QueueOverflow,
        };
        assert_eq!(event.key(), key);
        assert_eq!(FailureReason::QueueOverflow.to_string(), "queue overflow");
    }
}
