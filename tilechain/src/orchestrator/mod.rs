//! Tile request orchestration.
//!
//! Answers tile requests from the image cache when it can, and otherwise
//! walks an ordered chain of backends until one produces the tile.
//!
//! # Architecture
//!
//! ```text
//! request(key) ──► ImageCache ──► up to date ──► return image
//!                      │
//!                      ▼ miss / stale
//!              BackoffRegistry ──► waiting ──► return what we have
//!                      │
//!                      ▼
//!              InFlightRegistry ──► already running ──► return what we have
//!                      │
//!                      ▼ new ticket
//!              RequestCursor ──► chain walk ──► backend.fetch(cursor)
//!                                                      │
//!                     ┌────────────────────────────────┘ (backend worker)
//!                     ▼
//!   Success ──────────► cache put, clear backoff, Loaded event
//!   Failure ──────────► next eligible backend, or exhausted
//!   QueueOverflow ────► exhausted (rest of chain skipped)
//!   ExpiredButUsable ─► stale cache put, backoff, Loaded(stale), next backend
//!   exhausted ────────► backoff, Failed event
//! ```

mod backoff;
mod chain;
mod config;
mod core;
mod cursor;
mod in_flight;
mod types;

pub use self::core::TileOrchestrator;
pub use backoff::{
    BackoffEntry, BackoffRegistry, BackoffSchedule, DEFAULT_BACKOFF_SCHEDULE_MS,
    MIN_RETENTION,
};
pub use chain::BackendId;
pub use config::{DegradedMode, OrchestratorConfig, DEFAULT_EVENT_CAPACITY};
pub use cursor::{Outcome, RequestCursor};
pub use in_flight::{InFlightRegistry, Ticket};
pub use types::{FailureReason, OrchestratorError, TileEvent};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{StaticNetworkStatus, TileBackend};
    use crate::cache::{Freshness, ImageCache, MemoryTileCache};
    use crate::coord::TileKey;
    use crate::tile::{TileImage, TileSource};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Backend that parks cursors until the test completes them.
    #[derive(Default)]
    struct ParkingBackend {
        parked: Mutex<Vec<RequestCursor>>,
    }

    impl ParkingBackend {
        fn take(&self) -> RequestCursor {
            self.parked.lock().remove(0)
        }

        fn parked(&self) -> usize {
            self.parked.lock().len()
        }
    }

    impl TileBackend for ParkingBackend {
        fn name(&self) -> &str {
            "parking"
        }
        fn min_zoom(&self) -> u8 {
            0
        }
        fn max_zoom(&self) -> u8 {
            20
        }
        fn requires_network(&self) -> bool {
            false
        }
        fn fetch(&self, cursor: RequestCursor) {
            self.parked.lock().push(cursor);
        }
        fn detach(&self) {}
        fn set_source(&self, _source: &TileSource) {}
    }

    fn setup() -> (TileOrchestrator, Arc<MemoryTileCache>, Arc<ParkingBackend>) {
        let cache = Arc::new(MemoryTileCache::new(64));
        let orchestrator =
            TileOrchestrator::new(cache.clone(), Arc::new(StaticNetworkStatus::online()));
        let backend = Arc::new(ParkingBackend::default());
        orchestrator.add_backend(backend.clone());
        (orchestrator, cache, backend)
    }

    fn key() -> TileKey {
        TileKey::new(10, 1, 2).unwrap()
    }

    #[test]
    fn test_cursor_position_tracks_walk() {
        let (orchestrator, _, backend) = setup();
        orchestrator.request(key());

        let cursor = backend.take();
        assert_eq!(cursor.key(), key());
        assert_eq!(cursor.position(), Some(0));
        assert!(cursor.current_backend().is_some());
        cursor.failed();
    }

    #[test]
    fn test_dropped_cursor_counts_as_failure() {
        let (orchestrator, _, backend) = setup();
        orchestrator.request(key());
        drop(backend.take());

        assert_eq!(orchestrator.pending_count(), 0);
        assert_eq!(orchestrator.backoff().entry(key()).unwrap().attempts(), 1);
        assert_eq!(orchestrator.metrics().chains_exhausted, 1);
    }

    #[test]
    fn test_stale_hit_refreshes_by_default() {
        let (orchestrator, cache, backend) = setup();
        cache.put(key(), TileImage::new(vec![9]), Freshness::Stale);

        let image = orchestrator.request(key());

        assert_eq!(image.unwrap().data().as_ref(), &[9]);
        assert_eq!(backend.parked(), 1);
    }

    #[test]
    fn test_stale_hit_accepted_when_degraded() {
        let (orchestrator, cache, backend) = setup();
        orchestrator.set_degraded_mode(DegradedMode::Always);
        cache.put(key(), TileImage::new(vec![9]), Freshness::Stale);

        assert!(orchestrator.request(key()).is_some());
        assert_eq!(backend.parked(), 0);
        assert_eq!(orchestrator.metrics().stale_served, 1);
    }

    #[test]
    fn test_completion_after_orchestrator_dropped() {
        let (orchestrator, cache, backend) = setup();
        orchestrator.request(key());
        let cursor = backend.take();
        drop(orchestrator);

        cursor.succeeded(TileImage::new(vec![1]));
        assert!(cache.lookup(key()).is_none());
    }
}
