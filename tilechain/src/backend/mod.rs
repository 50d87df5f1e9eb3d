//! Tile backends: the interchangeable members of a fetch chain.
//!
//! A backend advertises the zoom range it can serve and whether it needs a
//! data connection, and accepts [`RequestCursor`]s fire-and-forget. Whatever
//! execution context it owns must eventually complete each cursor exactly
//! once (`succeeded`, `failed`, `queue_overflow` or `expired`); the cursor's
//! ownership makes double completion impossible, and dropping a cursor
//! without completing it counts as a failure.
//!
//! # Bundled Backends
//!
//! [`WorkerBackend`] runs any [`TileLoader`] on a pool of tokio tasks behind
//! a bounded queue. Two loaders are provided:
//!
//! - [`FileLoader`]: tiles stored on disk as `{root}/{source}/{z}/{x}/{y}.{ext}`
//! - [`HttpLoader`]: tiles fetched from the source URL template
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tilechain::backend::{FileLoader, HttpLoader, WorkerBackend, WorkerConfig};
//! use tilechain::tile::TileSource;
//!
//! let source = TileSource::default();
//! let disk = WorkerBackend::spawn(FileLoader::new("/var/cache/tiles"), source.clone(), WorkerConfig::default())?;
//! let http = WorkerBackend::spawn(HttpLoader::new()?, source, WorkerConfig::default())?;
//! orchestrator.add_backend(Arc::new(disk));
//! orchestrator.add_backend(Arc::new(http));
//! ```

mod file;
mod http;
mod loader;
mod network;
mod worker;

pub use file::FileLoader;
pub use http::{HttpLoader, DEFAULT_HTTP_TIMEOUT_SECS};
pub use loader::{BoxFuture, LoadOutcome, LoaderError, TileLoader};
pub use network::{NetworkStatus, StaticNetworkStatus};
pub use worker::{
    WorkerBackend, WorkerConfig, WorkerError, DEFAULT_QUEUE_SIZE, DEFAULT_WORKER_THREADS,
};

use crate::orchestrator::RequestCursor;
use crate::tile::TileSource;

/// A member of the backend chain.
///
/// # Thread Safety
///
/// Backends are shared as `Arc<dyn TileBackend>` and called from caller
/// threads and from other backends' completion contexts, so implementations
/// must be `Send + Sync` and `fetch` must never block.
pub trait TileBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Lowest zoom this backend serves.
    fn min_zoom(&self) -> u8;

    /// Highest zoom this backend serves.
    fn max_zoom(&self) -> u8;

    /// Whether this backend needs a data connection.
    fn requires_network(&self) -> bool;

    /// Starts fetching the cursor's tile. Must not block the caller.
    fn fetch(&self, cursor: RequestCursor);

    /// Stops accepting work and releases resources.
    fn detach(&self);

    /// Switches the imagery source.
    fn set_source(&self, source: &TileSource);
}
