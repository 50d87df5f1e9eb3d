//! Tile source descriptor shared by every backend in a chain.

use std::time::Duration;

use crate::coord::{TileKey, MAX_ZOOM, MIN_ZOOM};

/// Default max-age applied to freshly fetched tiles (7 days).
pub const DEFAULT_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;

/// Describes the imagery set a chain serves.
///
/// Swapping the source (see `TileOrchestrator::set_source`) is how a client
/// switches map styles: every backend is told about the new source and the
/// image cache is cleared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileSource {
    /// Short name, also used as the on-disk directory for the source.
    pub name: String,
    /// Lowest zoom the source serves.
    pub min_zoom: u8,
    /// Highest zoom the source serves.
    pub max_zoom: u8,
    /// URL template with `{z}`, `{x}` and `{y}` placeholders.
    pub url_template: String,
    /// File extension for stored tiles (without the dot).
    pub extension: String,
    /// How long a fetched tile stays up to date.
    pub max_age: Duration,
}

impl TileSource {
    /// Creates a source covering the full zoom range.
    pub fn new(name: impl Into<String>, url_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
            url_template: url_template.into(),
            extension: "png".to_string(),
            max_age: Duration::from_secs(DEFAULT_MAX_AGE_SECS),
        }
    }

    /// Restricts the zoom range.
    pub fn with_zoom_range(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    /// Sets the stored file extension.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Sets the max-age of fetched tiles.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Expands the URL template for a tile.
    pub fn url_for(&self, key: TileKey) -> String {
        self.url_template
            .replace("{z}", &key.zoom().to_string())
            .replace("{x}", &key.x().to_string())
            .replace("{y}", &key.y().to_string())
    }
}

impl Default for TileSource {
    fn default() -> Self {
        Self::new("osm", "https://tile.openstreetmap.org/{z}/{x}/{y}.png").with_zoom_range(0, 19)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_expands_placeholders() {
        let source = TileSource::new("test", "https://tiles.example/{z}/{x}/{y}.png");
        let key = TileKey::new(3, 4, 5).unwrap();
        assert_eq!(source.url_for(key), "https://tiles.example/3/4/5.png");
    }

    #[test]
    fn test_default_source() {
        let source = TileSource::default();
        assert_eq!(source.name, "osm");
        assert_eq!(source.min_zoom, 0);
        assert_eq!(source.max_zoom, 19);
        assert_eq!(source.extension, "png");
    }

    #[test]
    fn test_builders() {
        let source = TileSource::new("a", "u")
            .with_zoom_range(5, 12)
            .with_extension("jpg")
            .with_max_age(Duration::from_secs(60));
        assert_eq!((source.min_zoom, source.max_zoom), (5, 12));
        assert_eq!(source.extension, "jpg");
        assert_eq!(source.max_age, Duration::from_secs(60));
    }
}
