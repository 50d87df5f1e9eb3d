//! Tile key types and errors.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Minimum zoom level addressable by a [`TileKey`].
pub const MIN_ZOOM: u8 = 0;

/// Maximum zoom level addressable by a [`TileKey`].
///
/// Each spatial coordinate gets 29 bits, so zoom 29 is the deepest level
/// where every column and row still fits.
pub const MAX_ZOOM: u8 = 29;

const COORD_BITS: u32 = 29;
const COORD_MASK: u64 = (1 << COORD_BITS) - 1;
const ZOOM_SHIFT: u32 = COORD_BITS * 2;

/// Errors that can occur when building a [`TileKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordError {
    /// Zoom level is above [`MAX_ZOOM`].
    #[error("Invalid zoom level: {0} (max: {MAX_ZOOM})")]
    InvalidZoom(u8),

    /// Column or row does not exist at the given zoom.
    #[error("Coordinate {x}/{y} out of range for zoom {zoom}")]
    OutOfRange { zoom: u8, x: u32, y: u32 },

    /// Text could not be parsed as `z/x/y`.
    #[error("Invalid tile key '{0}': expected z/x/y")]
    Parse(String),
}

/// Identifier of a single map tile.
///
/// Packs zoom, column (`x`) and row (`y`) into one `u64`: the zoom sits in
/// the top bits, followed by 29 bits of `x` and 29 bits of `y`. Keys are
/// cheap to copy and hash, which matters because every registry in the
/// orchestrator is keyed by them.
///
/// # Example
///
/// ```
/// use tilechain::coord::TileKey;
///
/// let key = TileKey::new(16, 19295, 24640).unwrap();
/// assert_eq!(key.zoom(), 16);
/// assert_eq!(key.x(), 19295);
/// assert_eq!(key.y(), 24640);
/// assert_eq!(key.to_string(), "16/19295/24640");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey(u64);

impl TileKey {
    /// Creates a key, validating the coordinates against the zoom level.
    pub fn new(zoom: u8, x: u32, y: u32) -> Result<Self, CoordError> {
        if zoom > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(zoom));
        }
        let limit = 1u64 << zoom;
        if u64::from(x) >= limit || u64::from(y) >= limit {
            return Err(CoordError::OutOfRange { zoom, x, y });
        }
        Ok(Self(
            (u64::from(zoom) << ZOOM_SHIFT) | (u64::from(x) << COORD_BITS) | u64::from(y),
        ))
    }

    /// Zoom level of the tile.
    #[inline]
    pub fn zoom(&self) -> u8 {
        (self.0 >> ZOOM_SHIFT) as u8
    }

    /// Tile column.
    #[inline]
    pub fn x(&self) -> u32 {
        ((self.0 >> COORD_BITS) & COORD_MASK) as u32
    }

    /// Tile row.
    #[inline]
    pub fn y(&self) -> u32 {
        (self.0 & COORD_MASK) as u32
    }

    /// The packed representation.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom(), self.x(), self.y())
    }
}

impl fmt::Debug for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TileKey({})", self)
    }
}

impl FromStr for TileKey {
    type Err = CoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_err = || CoordError::Parse(s.to_string());
        let mut parts = s.trim().split('/');
        let zoom = parts
            .next()
            .and_then(|p| p.parse::<u8>().ok())
            .ok_or_else(parse_err)?;
        let x = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(parse_err)?;
        let y = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(parse_err)?;
        if parts.next().is_some() {
            return Err(parse_err());
        }
        Self::new(zoom, x, y)
    }
}
