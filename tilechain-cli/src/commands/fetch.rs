//! `tilechain fetch`: request tiles through the configured chain.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::{info, warn};

use tilechain::backend::{FileLoader, HttpLoader, StaticNetworkStatus, WorkerBackend};
use tilechain::cache::{Freshness, ImageCache, MemoryTileCache};
use tilechain::config::ConfigFile;
use tilechain::coord::TileKey;
use tilechain::logging::{default_log_dir, default_log_file, init_logging};
use tilechain::orchestrator::{DegradedMode, TileEvent, TileOrchestrator};
use tilechain::telemetry::MetricsSnapshot;

use super::load_config;
use crate::error::CliError;

/// Arguments for `tilechain fetch`.
#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Tiles to fetch, as z/x/y
    #[arg(required = true, value_name = "Z/X/Y")]
    pub tiles: Vec<TileKey>,

    /// Seconds to wait for outstanding tiles
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// Treat the network as unavailable
    #[arg(long)]
    pub offline: bool,

    /// Override the configured degraded mode (never, when_offline, always)
    #[arg(long)]
    pub degraded_mode: Option<DegradedMode>,
}

/// How a requested tile ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TileReport {
    Cached { bytes: usize },
    Loaded { bytes: usize, freshness: Freshness },
    Failed(String),
    TimedOut,
}

/// Run the fetch command.
pub fn run(args: FetchArgs, config_path: Option<&Path>, verbose: bool) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let _logging = init_logging(&default_log_dir(), default_log_file(), verbose)
        .map_err(CliError::LoggingInit)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let tiles = dedup(args.tiles.clone());
    let (reports, metrics) = runtime.block_on(fetch(&config, &args, &tiles))?;

    let failed = reports
        .iter()
        .filter(|(_, report)| matches!(report, TileReport::Failed(_) | TileReport::TimedOut))
        .count();
    for (key, report) in &reports {
        println!("{:<16} {}", key.to_string(), describe(report));
    }
    println!();
    println!("{}", metrics);

    if failed > 0 {
        return Err(CliError::Incomplete {
            failed,
            total: reports.len(),
        });
    }
    Ok(())
}

async fn fetch(
    config: &ConfigFile,
    args: &FetchArgs,
    tiles: &[TileKey],
) -> Result<(Vec<(TileKey, TileReport)>, MetricsSnapshot), CliError> {
    let (orchestrator, cache) = build_orchestrator(config, args)?;
    let Some(mut events) = orchestrator.subscribe() else {
        return Ok((Vec::new(), orchestrator.metrics()));
    };

    let mut reports: Vec<(TileKey, Option<TileReport>)> = Vec::with_capacity(tiles.len());
    let mut outstanding = HashSet::new();

    for &key in tiles {
        match orchestrator.request(key) {
            Some(image) if !orchestrator.is_in_flight(key) => {
                reports.push((key, Some(TileReport::Cached { bytes: image.len() })));
            }
            _ => {
                outstanding.insert(key);
                reports.push((key, None));
            }
        }
    }

    let deadline = Instant::now() + Duration::from_secs(args.timeout);
    while !outstanding.is_empty() {
        let event = match tokio::time::timeout_at(deadline, events.recv()).await {
            Ok(Ok(event)) => event,
            Ok(Err(RecvError::Lagged(skipped))) => {
                warn!(skipped, "Tile events dropped");
                continue;
            }
            Ok(Err(RecvError::Closed)) | Err(_) => break,
        };

        let key = event.key();
        if !outstanding.contains(&key) {
            continue;
        }
        let report = match event {
            TileEvent::Loaded { freshness, .. } => {
                if freshness == Freshness::Stale && orchestrator.is_in_flight(key) {
                    info!(tile = %key, "Expired copy found, still looking for a fresh one");
                    continue;
                }
                // The cache holds the newest copy if a later fetch already landed.
                match cache.lookup(key) {
                    Some(hit) => TileReport::Loaded {
                        bytes: hit.image.len(),
                        freshness: hit.freshness,
                    },
                    None => TileReport::Loaded {
                        bytes: 0,
                        freshness,
                    },
                }
            }
            TileEvent::Failed { reason, .. } => TileReport::Failed(reason.to_string()),
        };
        outstanding.remove(&key);
        if let Some(slot) = reports.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = Some(report);
        }
    }

    let metrics = orchestrator.metrics();
    orchestrator.detach();
    info!(
        requests = metrics.requests,
        failures = metrics.failures(),
        "Fetch finished"
    );

    let reports = reports
        .into_iter()
        .map(|(key, report)| (key, report.unwrap_or(TileReport::TimedOut)))
        .collect();
    Ok((reports, metrics))
}

fn build_orchestrator(
    config: &ConfigFile,
    args: &FetchArgs,
) -> Result<(TileOrchestrator, Arc<MemoryTileCache>), CliError> {
    let mut orchestrator_config = config.orchestrator_config()?;
    if let Some(mode) = args.degraded_mode {
        orchestrator_config = orchestrator_config.with_degraded_mode(mode);
    }

    let cache = Arc::new(MemoryTileCache::new(config.cache.max_tiles));
    let network = Arc::new(StaticNetworkStatus::new(config.network.enabled && !args.offline));
    let orchestrator = TileOrchestrator::with_config(cache.clone(), network, orchestrator_config);

    let source = config.tile_source();
    let worker = config.worker_config();
    if config.disk.enabled {
        let loader = FileLoader::new(&config.disk.directory);
        let backend = WorkerBackend::spawn(loader, source.clone(), worker.clone())?;
        orchestrator.add_backend(Arc::new(backend));
    }
    if config.network.enabled {
        let loader = HttpLoader::with_timeout(config.network.timeout_secs)?;
        let backend = WorkerBackend::spawn(loader, source.clone(), worker)?;
        orchestrator.add_backend(Arc::new(backend));
    }
    orchestrator.set_source(source);

    info!(
        backends = orchestrator.backend_count(),
        min_zoom = orchestrator.min_zoom(),
        max_zoom = orchestrator.max_zoom(),
        "Backend chain ready"
    );
    Ok((orchestrator, cache))
}

fn dedup(tiles: Vec<TileKey>) -> Vec<TileKey> {
    let mut seen = HashSet::new();
    tiles.into_iter().filter(|key| seen.insert(*key)).collect()
}

fn describe(report: &TileReport) -> String {
    match report {
        TileReport::Cached { bytes } => format!("cached ({} bytes)", bytes),
        TileReport::Loaded {
            bytes,
            freshness: Freshness::UpToDate,
        } => format!("loaded ({} bytes)", bytes),
        TileReport::Loaded {
            bytes,
            freshness: Freshness::Stale,
        } => format!("expired copy only ({} bytes)", bytes),
        TileReport::Failed(reason) => format!("failed: {}", reason),
        TileReport::TimedOut => "timed out".to_string(),
    }
}
