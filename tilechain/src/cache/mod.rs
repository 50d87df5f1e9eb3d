//! Tile image caching.
//!
//! The orchestrator consults an [`ImageCache`] synchronously on every
//! request and stores images delivered by backends. [`MemoryTileCache`] is
//! the bundled moka-backed implementation.

mod memory;
mod traits;

pub use memory::{MemoryTileCache, DEFAULT_MAX_TILES};
pub use traits::{CachedTile, Freshness, ImageCache};
