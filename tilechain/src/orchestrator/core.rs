//! The tile orchestrator: cache check, dedup, backoff and chain walk.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::backoff::{BackoffRegistry, BackoffSchedule};
use super::chain::{next_eligible, BackendChain, BackendId};
use super::config::{DegradedMode, OrchestratorConfig};
use super::cursor::{Outcome, RequestCursor};
use super::in_flight::InFlightRegistry;
use super::types::{FailureReason, OrchestratorError, TileEvent};
use crate::backend::{NetworkStatus, TileBackend};
use crate::cache::{Freshness, ImageCache};
use crate::coord::TileKey;
use crate::telemetry::{MetricsSnapshot, OrchestratorMetrics};
use crate::tile::{TileImage, TileSource};

/// Serves tile requests from cache or through an ordered backend chain.
///
/// [`request`](Self::request) answers synchronously with whatever the cache
/// holds. When a fetch is warranted it registers the tile as in flight and
/// hands a [`RequestCursor`] to the first eligible backend; the backend
/// completes the cursor later, on its own execution context, and the
/// orchestrator either moves on to the next backend or finalizes the request.
///
/// Results reach consumers through the image cache and through
/// [`TileEvent`]s on a broadcast channel (see [`subscribe`](Self::subscribe)).
///
/// # Guarantees
///
/// - At most one chain walk per tile at any time.
/// - A walk is strictly sequential: the next backend is only dispatched from
///   the previous backend's completion.
/// - A tile whose walk failed is not dispatched again until its backoff
///   deadline passes.
/// - Completions for requests dropped by [`detach`](Self::detach) or retired
///   by [`set_source`](Self::set_source) are ignored.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use tilechain::backend::StaticNetworkStatus;
/// use tilechain::cache::MemoryTileCache;
/// use tilechain::orchestrator::TileOrchestrator;
///
/// let orchestrator = TileOrchestrator::new(
///     Arc::new(MemoryTileCache::default()),
///     Arc::new(StaticNetworkStatus::online()),
/// );
/// orchestrator.add_backend(disk_backend);
/// orchestrator.add_backend(http_backend);
///
/// let mut events = orchestrator.subscribe().unwrap();
/// if orchestrator.request(key).is_none() {
///     let event = events.recv().await?;
/// }
/// ```
#[derive(Clone)]
pub struct TileOrchestrator {
    inner: Arc<OrchestratorInner>,
}

/// Shared state behind [`TileOrchestrator`], referenced weakly by cursors.
pub(crate) struct OrchestratorInner {
    chain: BackendChain,
    cache: Arc<dyn ImageCache>,
    network: Arc<dyn NetworkStatus>,
    in_flight: InFlightRegistry,
    backoff: BackoffRegistry,
    degraded_mode: RwLock<DegradedMode>,
    source: RwLock<Option<TileSource>>,
    events: Mutex<Option<broadcast::Sender<TileEvent>>>,
    metrics: OrchestratorMetrics,
}

impl TileOrchestrator {
    /// Creates an orchestrator with an empty chain and default config.
    pub fn new(cache: Arc<dyn ImageCache>, network: Arc<dyn NetworkStatus>) -> Self {
        Self::with_config(cache, network, OrchestratorConfig::default())
    }

    /// Creates an orchestrator with an empty chain.
    pub fn with_config(
        cache: Arc<dyn ImageCache>,
        network: Arc<dyn NetworkStatus>,
        config: OrchestratorConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(OrchestratorInner {
                chain: BackendChain::new(),
                cache,
                network,
                in_flight: InFlightRegistry::new(),
                backoff: BackoffRegistry::new(config.backoff_schedule),
                degraded_mode: RwLock::new(config.degraded_mode),
                source: RwLock::new(None),
                events: Mutex::new(Some(events)),
                metrics: OrchestratorMetrics::new(),
            }),
        }
    }

    /// Requests a tile.
    ///
    /// Returns the cached image, if any, right away. A fetch is started only
    /// when the cached image is missing or stale (and stale data is not
    /// acceptable in the current mode), the tile is not backed off, and no
    /// fetch for it is already running. The fetch result is delivered later
    /// through the cache and the event channel, never through this return
    /// value.
    pub fn request(&self, key: TileKey) -> Option<TileImage> {
        let inner = &self.inner;
        inner.metrics.request_received();

        let cached = inner.cache.lookup(key);
        if let Some(hit) = &cached {
            if hit.is_up_to_date() {
                inner.metrics.cache_hit();
                return Some(hit.image.clone());
            }
            if inner.is_degraded() {
                inner.metrics.stale_served();
                return Some(hit.image.clone());
            }
        }
        let available = cached.map(|hit| hit.image);

        if inner.backoff.should_wait(key) {
            inner.metrics.backoff_deferred();
            return available;
        }

        // Fast path: skip the shard write lock when a walk is already running.
        if inner.in_flight.contains(key) {
            inner.metrics.coalesced();
            return available;
        }
        let Some(ticket) = inner.in_flight.try_insert(key) else {
            inner.metrics.coalesced();
            return available;
        };

        debug!(tile = %key, "Cache miss, walking backend chain");
        let cursor = RequestCursor::new(
            key,
            ticket,
            inner.chain.snapshot(),
            Arc::downgrade(&self.inner),
        );
        inner.walk_and_dispatch(cursor);

        available
    }

    /// Tears down the chain.
    ///
    /// Drops every in-flight registration (late completions become no-ops),
    /// detaches every backend and closes the event channel.
    pub fn detach(&self) {
        let cleared = self.inner.in_flight.clear();
        for backend in self.inner.chain.backends() {
            backend.detach();
        }
        self.inner.events.lock().take();
        info!(cleared, "Orchestrator detached");
    }

    /// Appends a backend to the end of the chain.
    ///
    /// If a source has been set, the backend is switched to it first.
    pub fn add_backend(&self, backend: Arc<dyn TileBackend>) -> BackendId {
        // Held until the push so a concurrent set_source either sees the
        // backend in the chain or has already stored the new source.
        let source = self.inner.source.read();
        if let Some(source) = source.as_ref() {
            backend.set_source(source);
        }
        let name = backend.name().to_string();
        let id = self.inner.chain.push(backend);
        drop(source);
        debug!(backend = %name, %id, "Backend added to chain");
        id
    }

    /// Removes a backend from the chain.
    ///
    /// Running walks skip it from now on. The backend is returned, not
    /// detached; the caller decides its fate.
    pub fn remove_backend(&self, id: BackendId) -> Option<Arc<dyn TileBackend>> {
        let removed = self.inner.chain.remove(id);
        if let Some(backend) = &removed {
            debug!(backend = backend.name(), %id, "Backend removed from chain");
        }
        removed
    }

    /// Number of backends in the chain.
    pub fn backend_count(&self) -> usize {
        self.inner.chain.len()
    }

    /// Lowest zoom served by any backend.
    pub fn min_zoom(&self) -> u8 {
        self.inner.chain.min_zoom()
    }

    /// Highest zoom served by any backend.
    pub fn max_zoom(&self) -> u8 {
        self.inner.chain.max_zoom()
    }

    /// Switches every backend to `source` and clears the image cache.
    ///
    /// Walks running at the time of the switch are retired: their late
    /// completions are ignored and subscribers get a
    /// [`FailureReason::SourceChanged`] failure for each of them. Retired
    /// tiles are not backed off.
    pub fn set_source(&self, source: TileSource) {
        let inner = &self.inner;
        let mut current = inner.source.write();
        for backend in inner.chain.backends() {
            backend.set_source(&source);
        }
        let retired = inner.in_flight.retire_all();
        inner.cache.clear();
        info!(
            source = %source.name,
            retired = retired.len(),
            "Tile source switched"
        );
        *current = Some(source);
        drop(current);

        for key in retired {
            inner.metrics.walk_retired();
            inner.publish(TileEvent::Failed {
                key,
                reason: FailureReason::SourceChanged,
            });
        }
    }

    /// The source last set with [`set_source`](Self::set_source).
    pub fn source(&self) -> Option<TileSource> {
        self.inner.source.read().clone()
    }

    /// Replaces the backoff schedule.
    pub fn set_backoff_schedule(&self, durations: Vec<Duration>) -> Result<(), OrchestratorError> {
        let schedule = BackoffSchedule::new(durations)?;
        self.inner.backoff.set_schedule(schedule);
        Ok(())
    }

    /// Changes the stale-hit policy.
    pub fn set_degraded_mode(&self, mode: DegradedMode) {
        *self.inner.degraded_mode.write() = mode;
    }

    /// Number of tiles with a running chain walk.
    pub fn pending_count(&self) -> i64 {
        self.inner.in_flight.len() as i64
    }

    /// Whether a chain walk is running for `key`.
    pub fn is_in_flight(&self, key: TileKey) -> bool {
        self.inner.in_flight.contains(key)
    }

    /// Per-tile backoff state.
    pub fn backoff(&self) -> &BackoffRegistry {
        &self.inner.backoff
    }

    /// Subscribes to tile events. `None` after [`detach`](Self::detach).
    pub fn subscribe(&self) -> Option<broadcast::Receiver<TileEvent>> {
        self.inner.events.lock().as_ref().map(|tx| tx.subscribe())
    }

    /// Current metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }
}

impl OrchestratorInner {
    fn is_degraded(&self) -> bool {
        let mode = *self.degraded_mode.read();
        mode.accepts_stale(self.network.is_available())
    }

    /// Handles a completion delivered through a cursor.
    pub(crate) fn on_result(&self, cursor: RequestCursor, outcome: Outcome) {
        // Serializes completions against set_source. Recursive because a
        // backend may complete the next dispatch synchronously.
        let _source = self.source.read_recursive();
        let key = cursor.key();
        if !self.in_flight.is_current(key, cursor.ticket()) {
            self.metrics.completion_ignored();
            debug!(tile = %key, "Ignoring completion for request no longer in flight");
            return;
        }

        match outcome {
            Outcome::Success(image) => self.complete(cursor, image),
            Outcome::Failure => {
                self.metrics.backend_failed();
                self.walk_and_dispatch(cursor);
            }
            Outcome::QueueOverflow => {
                warn!(tile = %key, "Backend queue overflow, abandoning chain");
                self.exhaust(cursor, FailureReason::QueueOverflow);
            }
            Outcome::ExpiredButUsable(image) => self.serve_expired(cursor, image),
        }
    }

    /// Dispatches to the next eligible backend, or finalizes as exhausted.
    fn walk_and_dispatch(&self, mut cursor: RequestCursor) {
        match self.next_backend(&mut cursor) {
            Some(backend) => {
                self.metrics.dispatched();
                debug!(
                    tile = %cursor.key(),
                    backend = backend.name(),
                    position = ?cursor.position(),
                    "Dispatching to backend"
                );
                cursor.arm();
                backend.fetch(cursor);
            }
            None => self.exhaust(cursor, FailureReason::ChainExhausted),
        }
    }

    fn next_backend(&self, cursor: &mut RequestCursor) -> Option<Arc<dyn TileBackend>> {
        let key = cursor.key();
        let (snapshot, position) = cursor.walk_state();
        next_eligible(
            snapshot,
            position,
            key,
            |id| self.chain.contains(id),
            || self.network.is_available(),
        )
        .map(|entry| entry.backend)
    }

    fn complete(&self, cursor: RequestCursor, image: TileImage) {
        let key = cursor.key();
        let freshness = if image.is_expired() {
            Freshness::Stale
        } else {
            Freshness::UpToDate
        };

        self.backoff.clear(key);
        self.cache.put(key, image, freshness);
        self.in_flight.remove(key, cursor.ticket());
        self.metrics.succeeded();
        debug!(tile = %key, backend = ?cursor.current_backend(), "Tile loaded");
        self.publish(TileEvent::Loaded { key, freshness });
    }

    fn serve_expired(&self, mut cursor: RequestCursor, image: TileImage) {
        let key = cursor.key();
        let entry = self.backoff.record_failure(key);
        self.cache.put(key, image, Freshness::Stale);
        self.metrics.expired_served();
        debug!(
            tile = %key,
            attempts = entry.attempts(),
            "Serving expired tile, looking for a fresher one"
        );
        let stale = TileEvent::Loaded {
            key,
            freshness: Freshness::Stale,
        };

        // Subscribers seeing a stale event for a tile no longer in flight
        // know no fresher copy is coming.
        match self.next_backend(&mut cursor) {
            Some(backend) => {
                self.publish(stale);
                self.metrics.dispatched();
                cursor.arm();
                backend.fetch(cursor);
            }
            None => {
                self.in_flight.remove(key, cursor.ticket());
                self.publish(stale);
            }
        }
    }

    fn exhaust(&self, cursor: RequestCursor, reason: FailureReason) {
        let key = cursor.key();
        let entry = self.backoff.record_failure(key);
        self.in_flight.remove(key, cursor.ticket());
        match reason {
            FailureReason::ChainExhausted => self.metrics.chain_exhausted(),
            FailureReason::QueueOverflow => self.metrics.queue_overflow(),
            FailureReason::SourceChanged => self.metrics.walk_retired(),
        }
        debug!(
            tile = %key,
            %reason,
            attempts = entry.attempts(),
            retry_in_ms = entry.delay().as_millis() as u64,
            "No fresh tile available, backing off"
        );
        self.publish(TileEvent::Failed { key, reason });
    }

    fn publish(&self, event: TileEvent) {
        if let Some(tx) = self.events.lock().as_ref() {
            // No subscribers is fine.
            let _ = tx.send(event);
        }
    }
}
