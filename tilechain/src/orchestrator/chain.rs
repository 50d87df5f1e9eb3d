//! The ordered backend chain and the eligibility walk over it.
//!
//! The chain is copy-on-write: mutations swap in a new `Arc<[ChainEntry]>`,
//! and each request walks the snapshot it was created with. Because members
//! can be removed while a walk is in progress, every candidate is re-checked
//! against the live chain before it is used.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::backend::TileBackend;
use crate::coord::{TileKey, MAX_ZOOM, MIN_ZOOM};

/// Identity of a backend within a chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendId(u64);

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A registered backend.
#[derive(Clone)]
pub(crate) struct ChainEntry {
    pub(crate) id: BackendId,
    pub(crate) backend: Arc<dyn TileBackend>,
}

/// Why a backend was skipped for a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ineligible {
    /// Removed from the chain after the request started.
    Unregistered,
    /// Needs a data connection and none is available.
    NoConnectivity,
    /// Does not serve the tile's zoom level.
    ZoomOutOfRange,
}

impl fmt::Display for Ineligible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ineligible::Unregistered => write!(f, "backend no longer registered"),
            Ineligible::NoConnectivity => write!(f, "no network connectivity"),
            Ineligible::ZoomOutOfRange => write!(f, "zoom out of range"),
        }
    }
}

/// Checks a single chain member against a tile.
pub(crate) fn check_eligibility(
    entry: &ChainEntry,
    key: TileKey,
    is_registered: impl Fn(BackendId) -> bool,
    network_available: impl Fn() -> bool,
) -> Result<(), Ineligible> {
    if !is_registered(entry.id) {
        return Err(Ineligible::Unregistered);
    }
    if entry.backend.requires_network() && !network_available() {
        return Err(Ineligible::NoConnectivity);
    }
    let zoom = key.zoom();
    if zoom < entry.backend.min_zoom() || zoom > entry.backend.max_zoom() {
        return Err(Ineligible::ZoomOutOfRange);
    }
    Ok(())
}

/// Advances `position` to the first eligible member strictly after it.
///
/// `position` of `None` means "before the first member". On exhaustion the
/// position is left past the end and `None` is returned.
pub(crate) fn next_eligible(
    snapshot: &[ChainEntry],
    position: &mut Option<usize>,
    key: TileKey,
    is_registered: impl Fn(BackendId) -> bool,
    network_available: impl Fn() -> bool,
) -> Option<ChainEntry> {
    loop {
        let next = position.map_or(0, |p| p + 1);
        *position = Some(next);
        let entry = snapshot.get(next)?;
        match check_eligibility(entry, key, &is_registered, &network_available) {
            Ok(()) => return Some(entry.clone()),
            Err(reason) => {
                trace!(
                    tile = %key,
                    backend = entry.backend.name(),
                    %reason,
                    "Skipping backend"
                );
            }
        }
    }
}

/// Live, ordered list of backends.
pub(crate) struct BackendChain {
    entries: RwLock<Arc<[ChainEntry]>>,
    next_id: AtomicU64,
}

impl BackendChain {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(Arc::from(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Appends a backend to the end of the chain.
    pub(crate) fn push(&self, backend: Arc<dyn TileBackend>) -> BackendId {
        let id = BackendId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut entries = self.entries.write();
        let mut updated: Vec<ChainEntry> = entries.iter().cloned().collect();
        updated.push(ChainEntry { id, backend });
        *entries = Arc::from(updated);
        id
    }

    /// Removes a backend, returning it if it was registered.
    pub(crate) fn remove(&self, id: BackendId) -> Option<Arc<dyn TileBackend>> {
        let mut entries = self.entries.write();
        let index = entries.iter().position(|entry| entry.id == id)?;
        let mut updated: Vec<ChainEntry> = entries.iter().cloned().collect();
        let removed = updated.remove(index);
        *entries = Arc::from(updated);
        Some(removed.backend)
    }

    pub(crate) fn snapshot(&self) -> Arc<[ChainEntry]> {
        Arc::clone(&self.entries.read())
    }

    pub(crate) fn contains(&self, id: BackendId) -> bool {
        self.entries.read().iter().any(|entry| entry.id == id)
    }

    pub(crate) fn backends(&self) -> Vec<Arc<dyn TileBackend>> {
        self.entries
            .read()
            .iter()
            .map(|entry| Arc::clone(&entry.backend))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Lowest minimum zoom across members; `MAX_ZOOM` when empty.
    pub(crate) fn min_zoom(&self) -> u8 {
        self.entries
            .read()
            .iter()
            .map(|entry| entry.backend.min_zoom())
            .min()
            .unwrap_or(MAX_ZOOM)
    }

    /// Highest maximum zoom across members; `MIN_ZOOM` when empty.
    pub(crate) fn max_zoom(&self) -> u8 {
        self.entries
            .read()
            .iter()
            .map(|entry| entry.backend.max_zoom())
            .max()
            .unwrap_or(MIN_ZOOM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::RequestCursor;
    use crate::tile::TileSource;

    struct StubBackend {
        name: &'static str,
        min_zoom: u8,
        max_zoom: u8,
        requires_network: bool,
    }

    impl TileBackend for StubBackend {
        fn name(&self) -> &str {
            self.name
        }
        fn min_zoom(&self) -> u8 {
            self.min_zoom
        }
        fn max_zoom(&self) -> u8 {
            self.max_zoom
        }
        fn requires_network(&self) -> bool {
            self.requires_network
        }
        fn fetch(&self, cursor: RequestCursor) {
            cursor.failed();
        }
        fn detach(&self) {}
        fn set_source(&self, _source: &TileSource) {}
    }

    fn stub(name: &'static str, min_zoom: u8, max_zoom: u8, net: bool) -> Arc<dyn TileBackend> {
        Arc::new(StubBackend {
            name,
            min_zoom,
            max_zoom,
            requires_network: net,
        })
    }

    fn key(zoom: u8) -> TileKey {
        TileKey::new(zoom, 0, 0).unwrap()
    }

    fn names(
        chain: &BackendChain,
        key: TileKey,
        network: bool,
    ) -> Vec<String> {
        let snapshot = chain.snapshot();
        let mut position = None;
        let mut found = Vec::new();
        while let Some(entry) =
            next_eligible(&snapshot, &mut position, key, |id| chain.contains(id), || network)
        {
            found.push(entry.backend.name().to_string());
        }
        found
    }

    #[test]
    fn test_walk_in_order() {
        let chain = BackendChain::new();
        chain.push(stub("a", 0, 20, false));
        chain.push(stub("b", 0, 20, false));
        assert_eq!(names(&chain, key(5), true), vec!["a", "b"]);
    }

    #[test]
    fn test_network_backend_skipped_offline() {
        let chain = BackendChain::new();
        chain.push(stub("net", 0, 20, true));
        chain.push(stub("disk", 0, 20, false));
        assert_eq!(names(&chain, key(5), false), vec!["disk"]);
        assert_eq!(names(&chain, key(5), true), vec!["net", "disk"]);
    }

    #[test]
    fn test_zoom_range_inclusive() {
        let chain = BackendChain::new();
        chain.push(stub("low", 0, 10, false));
        chain.push(stub("high", 11, 20, false));
        assert_eq!(names(&chain, key(10), true), vec!["low"]);
        assert_eq!(names(&chain, key(11), true), vec!["high"]);
        assert!(names(&chain, key(21), true).is_empty());
    }

    #[test]
    fn test_removed_member_skipped_in_old_snapshot() {
        let chain = BackendChain::new();
        let a = chain.push(stub("a", 0, 20, false));
        chain.push(stub("b", 0, 20, false));
        let snapshot = chain.snapshot();

        assert!(chain.remove(a).is_some());

        let mut position = None;
        let entry = next_eligible(
            &snapshot,
            &mut position,
            key(5),
            |id| chain.contains(id),
            || true,
        )
        .unwrap();
        assert_eq!(entry.backend.name(), "b");
        assert_eq!(position, Some(1));
    }

    #[test]
    fn test_exhaustion_leaves_position_past_end() {
        let chain = BackendChain::new();
        chain.push(stub("a", 0, 20, false));
        let snapshot = chain.snapshot();
        let mut position = Some(0);
        assert!(next_eligible(&snapshot, &mut position, key(5), |_| true, || true).is_none());
        assert_eq!(position, Some(1));
    }

    #[test]
    fn test_check_eligibility_reasons() {
        let entry = ChainEntry {
            id: BackendId(1),
            backend: stub("net", 3, 5, true),
        };
        assert_eq!(
            check_eligibility(&entry, key(4), |_| false, || true),
            Err(Ineligible::Unregistered)
        );
        assert_eq!(
            check_eligibility(&entry, key(4), |_| true, || false),
            Err(Ineligible::NoConnectivity)
        );
        assert_eq!(
            check_eligibility(&entry, key(6), |_| true, || true),
            Err(Ineligible::ZoomOutOfRange)
        );
        assert_eq!(check_eligibility(&entry, key(4), |_| true, || true), Ok(()));
    }

    #[test]
    fn test_zoom_aggregates() {
        let chain = BackendChain::new();
        assert_eq!(chain.min_zoom(), MAX_ZOOM);
        assert_eq!(chain.max_zoom(), MIN_ZOOM);

        let a = chain.push(stub("a", 4, 12, false));
        chain.push(stub("b", 8, 18, false));
        assert_eq!(chain.min_zoom(), 4);
        assert_eq!(chain.max_zoom(), 18);

        chain.remove(a);
        assert_eq!(chain.min_zoom(), 8);
        assert_eq!(chain.len(), 1);
    }
}
