//! In-memory tile cache using moka.
//!
//! Wraps `moka::sync::Cache` so lookups on the request path are lock-free
//! and eviction (LRU-ish, bounded by tile count) happens automatically.

use moka::sync::Cache as MokaCache;

use crate::cache::traits::{CachedTile, Freshness, ImageCache};
use crate::coord::TileKey;
use crate::tile::TileImage;

/// Default number of tiles held in memory.
pub const DEFAULT_MAX_TILES: u64 = 1024;

/// In-memory [`ImageCache`] bounded by tile count.
///
/// Freshness is downgraded to [`Freshness::Stale`] at lookup time once the
/// image's own expiry has passed, so an image stored as up to date does not
/// stay that way forever.
pub struct MemoryTileCache {
    cache: MokaCache<TileKey, CachedTile>,
    max_tiles: u64,
}

impl MemoryTileCache {
    /// Creates a cache holding at most `max_tiles` images.
    pub fn new(max_tiles: u64) -> Self {
        let cache = MokaCache::builder().max_capacity(max_tiles).build();
        Self { cache, max_tiles }
    }

    /// Configured capacity in tiles.
    pub fn max_tiles(&self) -> u64 {
        self.max_tiles
    }
}

impl Default for MemoryTileCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TILES)
    }
}

impl ImageCache for MemoryTileCache {
    fn lookup(&self, key: TileKey) -> Option<CachedTile> {
        let mut hit = self.cache.get(&key)?;
        if hit.freshness == Freshness::UpToDate && hit.image.is_expired() {
            hit.freshness = Freshness::Stale;
        }
        Some(hit)
    }

    fn put(&self, key: TileKey, image: TileImage, freshness: Freshness) {
        self.cache.insert(key, CachedTile { image, freshness });
    }

    fn clear(&self) {
        self.cache.invalidate_all();
    }

    fn len(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}
