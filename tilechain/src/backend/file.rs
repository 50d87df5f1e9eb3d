//! Loader for tiles stored on local disk.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::loader::{BoxFuture, LoadOutcome, LoaderError, TileLoader};
use crate::coord::TileKey;
use crate::tile::{TileImage, TileSource};

/// Reads tiles laid out as `{root}/{source}/{z}/{x}/{y}.{ext}`.
///
/// A tile older than the source's max-age (by modification time) is reported
/// as expired rather than missing, so it can still be shown while a
/// network backend looks for a fresh copy.
#[derive(Debug, Clone)]
pub struct FileLoader {
    root: PathBuf,
}

impl FileLoader {
    /// Creates a loader rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a tile of `source` is stored at.
    pub fn tile_path(&self, key: TileKey, source: &TileSource) -> PathBuf {
        self.root
            .join(&source.name)
            .join(key.zoom().to_string())
            .join(key.x().to_string())
            .join(format!("{}.{}", key.y(), source.extension))
    }

    async fn read(&self, key: TileKey, source: &TileSource) -> Result<LoadOutcome, LoaderError> {
        let path = self.tile_path(key, source);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LoadOutcome::Missing),
            Err(e) => return Err(e.into()),
        };

        let modified = tokio::fs::metadata(&path).await?.modified()?;
        let image = TileImage::new(data).with_expiry(modified + source.max_age);
        if image.is_expired() {
            Ok(LoadOutcome::Expired(image))
        } else {
            Ok(LoadOutcome::Loaded(image))
        }
    }
}

impl TileLoader for FileLoader {
    fn name(&self) -> &str {
        "file"
    }

    fn requires_network(&self) -> bool {
        false
    }

    fn load<'a>(&'a self, key: TileKey, source: &'a TileSource) -> BoxFuture<'a, LoadOutcome> {
        Box::pin(async move {
            self.read(key, source)
                .await
                .unwrap_or_else(LoadOutcome::Failed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn source() -> TileSource {
        TileSource::new("test", "unused").with_extension("png")
    }

    fn write_tile(loader: &FileLoader, key: TileKey, source: &TileSource, data: &[u8]) {
        let path = loader.tile_path(key, source);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    #[test]
    fn test_tile_path_layout() {
        let loader = FileLoader::new("/tiles");
        let key = TileKey::new(5, 10, 20).unwrap();
        assert_eq!(
            loader.tile_path(key, &source()),
            PathBuf::from("/tiles/test/5/10/20.png")
        );
    }

    #[tokio::test]
    async fn test_missing_tile() {
        let dir = TempDir::new().unwrap();
        let loader = FileLoader::new(dir.path());
        let key = TileKey::new(5, 10, 20).unwrap();

        let outcome = loader.load(key, &source()).await;
        assert!(matches!(outcome, LoadOutcome::Missing));
    }

    #[tokio::test]
    async fn test_fresh_tile_loaded() {
        let dir = TempDir::new().unwrap();
        let loader = FileLoader::new(dir.path());
        let key = TileKey::new(5, 10, 20).unwrap();
        write_tile(&loader, key, &source(), b"png-bytes");

        match loader.load(key, &source()).await {
            LoadOutcome::Loaded(image) => assert_eq!(image.data().as_ref(), b"png-bytes"),
            other => panic!("expected Loaded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_old_tile_expired() {
        let dir = TempDir::new().unwrap();
        let loader = FileLoader::new(dir.path());
        let key = TileKey::new(5, 10, 20).unwrap();
        let source = source().with_max_age(Duration::from_secs(3600));
        write_tile(&loader, key, &source, b"old");

        let two_hours_ago = SystemTime::now() - Duration::from_secs(7200);
        filetime::set_file_mtime(
            loader.tile_path(key, &source),
            FileTime::from_system_time(two_hours_ago),
        )
        .unwrap();

        match loader.load(key, &source).await {
            LoadOutcome::Expired(image) => {
                assert_eq!(image.data().as_ref(), b"old");
                assert!(image.is_expired());
            }
            other => panic!("expected Expired, got {:?}", other),
        }
    }
}
