//! Tile addressing.
//!
//! Provides [`TileKey`], the compact identifier every registry in the crate
//! is keyed by. Projection math (lat/lon to tile) lives with callers.

mod types;

pub use types::{CoordError, TileKey, MAX_ZOOM, MIN_ZOOM};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_new_extracts_components() {
        let key = TileKey::new(18, 138240, 83776).unwrap();
        assert_eq!(key.zoom(), 18);
        assert_eq!(key.x(), 138240);
        assert_eq!(key.y(), 83776);
    }

    #[test]
    fn test_zoom_zero_single_tile() {
        assert!(TileKey::new(0, 0, 0).is_ok());
        assert!(matches!(
            TileKey::new(0, 1, 0),
            Err(CoordError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_invalid_zoom() {
        assert_eq!(TileKey::new(30, 0, 0), Err(CoordError::InvalidZoom(30)));
    }

    #[test]
    fn test_max_zoom_max_coords() {
        let max = (1u32 << MAX_ZOOM) - 1;
        let key = TileKey::new(MAX_ZOOM, max, max).unwrap();
        assert_eq!(key.zoom(), MAX_ZOOM);
        assert_eq!(key.x(), max);
        assert_eq!(key.y(), max);
    }

    #[test]
    fn test_hash_and_equality() {
        let mut set = HashSet::new();
        set.insert(TileKey::new(12, 100, 200).unwrap());
        set.insert(TileKey::new(12, 100, 200).unwrap());
        set.insert(TileKey::new(12, 100, 201).unwrap());
        set.insert(TileKey::new(13, 100, 200).unwrap());
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_display_and_parse() {
        let key: TileKey = "14/8185/5449".parse().unwrap();
        assert_eq!(key, TileKey::new(14, 8185, 5449).unwrap());
        assert_eq!(key.to_string(), "14/8185/5449");
        assert!(format!("{:?}", key).contains("14/8185/5449"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!("14/8185".parse::<TileKey>(), Err(CoordError::Parse(_))));
        assert!(matches!("a/b/c".parse::<TileKey>(), Err(CoordError::Parse(_))));
        assert!(matches!(
            "1/1/1/1".parse::<TileKey>(),
            Err(CoordError::Parse(_))
        ));
        assert!(matches!(
            "2/4/0".parse::<TileKey>(),
            Err(CoordError::OutOfRange { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_components_survive_packing(zoom in 0u8..=MAX_ZOOM, fx in 0.0f64..1.0, fy in 0.0f64..1.0) {
            let side = 1u64 << zoom;
            let x = ((side as f64) * fx) as u32;
            let y = ((side as f64) * fy) as u32;
            let key = TileKey::new(zoom, x, y).unwrap();
            prop_assert_eq!(key.zoom(), zoom);
            prop_assert_eq!(key.x(), x);
            prop_assert_eq!(key.y(), y);
        }
    }
}
