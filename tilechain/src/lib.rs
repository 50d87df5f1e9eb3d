//! tilechain - Map tile request orchestration
//!
//! Answers tile requests from an image cache and, on a miss, walks an
//! ordered chain of interchangeable backends (disk, network, ...) until one
//! produces the tile. Concurrent requests for the same tile share one fetch,
//! and tiles that every backend failed to produce are backed off.
//!
//! # High-Level API
//!
//! ```ignore
//! use std::sync::Arc;
//! use tilechain::backend::{FileLoader, HttpLoader, StaticNetworkStatus, WorkerBackend, WorkerConfig};
//! use tilechain::cache::MemoryTileCache;
//! use tilechain::coord::TileKey;
//! use tilechain::orchestrator::TileOrchestrator;
//! use tilechain::tile::TileSource;
//!
//! let orchestrator = TileOrchestrator::new(
//!     Arc::new(MemoryTileCache::default()),
//!     Arc::new(StaticNetworkStatus::online()),
//! );
//! let source = TileSource::default();
//! orchestrator.add_backend(Arc::new(WorkerBackend::spawn(FileLoader::new("tiles"), source.clone(), WorkerConfig::default())?));
//! orchestrator.add_backend(Arc::new(WorkerBackend::spawn(HttpLoader::new()?, source, WorkerConfig::default())?));
//!
//! let mut events = orchestrator.subscribe().expect("orchestrator is attached");
//! if orchestrator.request(TileKey::new(12, 2200, 1343)?).is_none() {
//!     let event = events.recv().await?; // Loaded or Failed
//! }
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod coord;
pub mod logging;
pub mod orchestrator;
pub mod telemetry;
pub mod tile;
