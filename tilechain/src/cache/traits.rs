//! Image cache interface consumed by the orchestrator.
//!
//! The orchestrator only needs a synchronous lookup on the request path and a
//! `put` when a backend delivers an image. Storage and eviction are entirely
//! up to the implementation.

use std::fmt;

use crate::coord::TileKey;
use crate::tile::TileImage;

/// Freshness of a cached image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Freshness {
    /// The image can be shown as is.
    UpToDate,
    /// The image can be shown but should be revalidated.
    Stale,
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Freshness::UpToDate => write!(f, "up-to-date"),
            Freshness::Stale => write!(f, "stale"),
        }
    }
}

/// A cache hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedTile {
    /// The cached image.
    pub image: TileImage,
    /// Whether the image still counts as fresh.
    pub freshness: Freshness,
}

impl CachedTile {
    /// Returns true if the image is up to date.
    pub fn is_up_to_date(&self) -> bool {
        self.freshness == Freshness::UpToDate
    }
}

/// Synchronous tile image cache.
///
/// `lookup` runs on the caller's thread for every tile request, so
/// implementations must not block on I/O.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync`; completions from backend
/// workers call `put` concurrently with caller threads calling `lookup`.
pub trait ImageCache: Send + Sync {
    /// Looks up a tile. `None` means absent.
    fn lookup(&self, key: TileKey) -> Option<CachedTile>;

    /// Stores (or replaces) a tile image.
    fn put(&self, key: TileKey, image: TileImage, freshness: Freshness);

    /// Drops every cached image.
    fn clear(&self);

    /// Number of cached images.
    fn len(&self) -> u64;

    /// Whether the cache holds no images.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freshness_display() {
        assert_eq!(Freshness::UpToDate.to_string(), "up-to-date");
        assert_eq!(Freshness::Stale.to_string(), "stale");
    }

    #[test]
    fn test_cached_tile_is_up_to_date() {
        let tile = CachedTile {
            image: TileImage::new(vec![1]),
            freshness: Freshness::Stale,
        };
        assert!(!tile.is_up_to_date());
    }
}
