//! Loader trait: the fetch mechanics plugged into a [`WorkerBackend`].
//!
//! [`WorkerBackend`]: super::WorkerBackend

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::coord::TileKey;
use crate::tile::{TileImage, TileSource};

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors a loader can report.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// I/O error reading a stored tile.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
}

/// What a loader found for a tile.
#[derive(Debug)]
pub enum LoadOutcome {
    /// A fresh image.
    Loaded(TileImage),
    /// An image past its max-age; usable until something fresher arrives.
    Expired(TileImage),
    /// The loader has no such tile.
    Missing,
    /// The load failed.
    Failed(LoaderError),
}

/// Fetches single tiles for a [`WorkerBackend`](super::WorkerBackend).
///
/// The worker backend owns queueing, concurrency and cursor completion;
/// a loader only turns a key into an outcome.
///
/// # Dyn Compatibility
///
/// `load` returns a [`BoxFuture`] so loaders can be used as trait objects.
pub trait TileLoader: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Whether loading needs a data connection.
    fn requires_network(&self) -> bool;

    /// Loads one tile of `source`.
    fn load<'a>(&'a self, key: TileKey, source: &'a TileSource) -> BoxFuture<'a, LoadOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LoaderError::Status {
            status: 503,
            url: "https://tiles.example/1/0/0.png".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503 from https://tiles.example/1/0/0.png");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: LoaderError = io_err.into();
        assert!(matches!(err, LoaderError::Io(_)));
    }
}
