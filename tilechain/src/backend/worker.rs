//! Queue-fronted worker pool backend.
//!
//! # Architecture
//!
//! ```text
//!  fetch(cursor) ──try_send──► bounded queue ──► worker 1 ──┐
//!        │                                   ──► worker 2 ──┼──► loader.load()
//!        │ full                              ──► worker N ──┘         │
//!        ▼                                                           ▼
//!  cursor.queue_overflow()                      cursor.succeeded / expired / failed
//! ```
//!
//! `fetch` never waits: a saturated queue rejects the cursor immediately so
//! the orchestrator can back the tile off instead of piling up work.

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::loader::{LoadOutcome, TileLoader};
use super::TileBackend;
use crate::orchestrator::RequestCursor;
use crate::tile::TileSource;

/// Default number of worker tasks per backend.
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// Default capacity of the pending-request queue.
pub const DEFAULT_QUEUE_SIZE: usize = 40;

/// Errors creating a worker backend.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// No tokio runtime to spawn workers on.
    #[error("No tokio runtime available to spawn workers")]
    NoRuntime,
}

/// Configuration for a [`WorkerBackend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Number of concurrent worker tasks.
    pub threads: usize,
    /// Pending requests accepted before overflowing.
    pub queue_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_WORKER_THREADS,
            queue_size: DEFAULT_QUEUE_SIZE,
        }
    }
}

impl WorkerConfig {
    /// Sets the worker count (minimum 1).
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Sets the queue capacity (minimum 1).
    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size.max(1);
        self
    }
}

struct Job {
    cursor: RequestCursor,
    source: Arc<TileSource>,
}

/// Backend that runs a [`TileLoader`] on a pool of tokio tasks.
///
/// The zoom range comes from the current [`TileSource`]; switching the
/// source takes effect for requests queued afterwards.
pub struct WorkerBackend {
    name: String,
    requires_network: bool,
    source: RwLock<Arc<TileSource>>,
    queue: mpsc::Sender<Job>,
    shutdown: CancellationToken,
}

impl WorkerBackend {
    /// Spawns the workers on the current tokio runtime.
    pub fn spawn<L: TileLoader>(
        loader: L,
        source: TileSource,
        config: WorkerConfig,
    ) -> Result<Self, WorkerError> {
        let handle = Handle::try_current().map_err(|_| WorkerError::NoRuntime)?;
        Ok(Self::spawn_on(&handle, loader, source, config))
    }

    /// Spawns the workers on `handle`.
    pub fn spawn_on<L: TileLoader>(
        handle: &Handle,
        loader: L,
        source: TileSource,
        config: WorkerConfig,
    ) -> Self {
        let threads = config.threads.max(1);
        let (queue, rx) = mpsc::channel(config.queue_size.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let shutdown = CancellationToken::new();
        let name = loader.name().to_string();
        let requires_network = loader.requires_network();
        let loader = Arc::new(loader);

        for worker_id in 0..threads {
            handle.spawn(run_worker(
                worker_id,
                Arc::clone(&loader),
                Arc::clone(&rx),
                shutdown.clone(),
            ));
        }
        debug!(backend = %name, threads, queue_size = config.queue_size, "Worker backend started");

        Self {
            name,
            requires_network,
            source: RwLock::new(Arc::new(source)),
            queue,
            shutdown,
        }
    }

    /// Whether [`detach`](TileBackend::detach) has been called.
    pub fn is_detached(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl TileBackend for WorkerBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_zoom(&self) -> u8 {
        self.source.read().min_zoom
    }

    fn max_zoom(&self) -> u8 {
        self.source.read().max_zoom
    }

    fn requires_network(&self) -> bool {
        self.requires_network
    }

    fn fetch(&self, cursor: RequestCursor) {
        let source = Arc::clone(&self.source.read());
        match self.queue.try_send(Job { cursor, source }) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) => {
                warn!(backend = %self.name, tile = %job.cursor.key(), "Work queue full");
                job.cursor.queue_overflow();
            }
            Err(TrySendError::Closed(job)) => {
                debug!(backend = %self.name, tile = %job.cursor.key(), "Workers stopped");
                job.cursor.failed();
            }
        }
    }

    fn detach(&self) {
        self.shutdown.cancel();
    }

    fn set_source(&self, source: &TileSource) {
        *self.source.write() = Arc::new(source.clone());
    }
}

impl Drop for WorkerBackend {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_worker<L: TileLoader>(
    worker_id: usize,
    loader: Arc<L>,
    rx: Arc<Mutex<mpsc::Receiver<Job>>>,
    shutdown: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            _ = shutdown.cancelled() => break,
            job = async { rx.lock().await.recv().await } => match job {
                Some(job) => job,
                None => break,
            },
        };

        let key = job.cursor.key();
        let source = Arc::clone(&job.source);
        let outcome = tokio::select! {
            // Dropping the job reports the cursor as failed.
            _ = shutdown.cancelled() => break,
            outcome = loader.load(key, &source) => outcome,
        };

        match outcome {
            LoadOutcome::Loaded(image) => job.cursor.succeeded(image),
            LoadOutcome::Expired(image) => job.cursor.expired(image),
            LoadOutcome::Missing => {
                debug!(backend = loader.name(), tile = %key, "Tile not found");
                job.cursor.failed();
            }
            LoadOutcome::Failed(e) => {
                debug!(backend = loader.name(), tile = %key, error = %e, "Tile load failed");
                job.cursor.failed();
            }
        }
    }
    debug!(backend = loader.name(), worker_id, "Worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::loader::BoxFuture;
    use crate::coord::TileKey;
    use crate::tile::TileImage;

    struct EchoLoader;

    impl TileLoader for EchoLoader {
        fn name(&self) -> &str {
            "echo"
        }
        fn requires_network(&self) -> bool {
            true
        }
        fn load<'a>(&'a self, key: TileKey, _source: &'a TileSource) -> BoxFuture<'a, LoadOutcome> {
            Box::pin(async move { LoadOutcome::Loaded(TileImage::new(key.to_string().into_bytes())) })
        }
    }

    #[test]
    fn test_config_minimums() {
        let config = WorkerConfig::default().with_threads(0).with_queue_size(0);
        assert_eq!(config.threads, 1);
        assert_eq!(config.queue_size, 1);
    }

    #[test]
    fn test_spawn_without_runtime_fails() {
        let result = WorkerBackend::spawn(EchoLoader, TileSource::default(), WorkerConfig::default());
        assert!(matches!(result, Err(WorkerError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_zoom_follows_source() {
        let backend =
            WorkerBackend::spawn(EchoLoader, TileSource::default(), WorkerConfig::default())
                .unwrap();
        assert_eq!(backend.name(), "echo");
        assert!(backend.requires_network());
        assert_eq!((backend.min_zoom(), backend.max_zoom()), (0, 19));

        backend.set_source(&TileSource::new("x", "u").with_zoom_range(3, 9));
        assert_eq!((backend.min_zoom(), backend.max_zoom()), (3, 9));
    }

    #[tokio::test]
    async fn test_detach_cancels() {
        let backend =
            WorkerBackend::spawn(EchoLoader, TileSource::default(), WorkerConfig::default())
                .unwrap();
        assert!(!backend.is_detached());
        backend.detach();
        assert!(backend.is_detached());
    }
}
