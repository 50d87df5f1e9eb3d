//! Tile payload and source types.

mod image;
mod source;

pub use image::TileImage;
pub use source::{TileSource, DEFAULT_MAX_AGE_SECS};
