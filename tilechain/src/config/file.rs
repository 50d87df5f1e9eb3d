//! Configuration file handling for ~/.tilechain/config.ini.
//!
//! Settings structs live here; INI key mapping lives in [`super::parser`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::backend::{WorkerConfig, DEFAULT_HTTP_TIMEOUT_SECS};
use crate::cache::DEFAULT_MAX_TILES;
use crate::orchestrator::{
    BackoffSchedule, DegradedMode, OrchestratorConfig, DEFAULT_BACKOFF_SCHEDULE_MS,
    DEFAULT_EVENT_CAPACITY,
};
use crate::tile::TileSource;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to parse config text
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] ini::ParseError),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// `[orchestrator]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    pub backoff_schedule_ms: Vec<u64>,
    pub degraded_mode: DegradedMode,
    pub event_capacity: usize,
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub max_tiles: u64,
}

/// `[source]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    pub name: String,
    pub url: String,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub extension: String,
    pub max_age_secs: u64,
}

/// `[disk]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskSettings {
    pub enabled: bool,
    pub directory: PathBuf,
}

/// `[network]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSettings {
    pub enabled: bool,
    pub timeout_secs: u64,
}

/// `[worker]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    pub threads: usize,
    pub queue_size: usize,
}

/// Parsed configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub orchestrator: OrchestratorSettings,
    pub cache: CacheSettings,
    pub source: SourceSettings,
    pub disk: DiskSettings,
    pub network: NetworkSettings,
    pub worker: WorkerSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        let source = TileSource::default();
        let worker = WorkerConfig::default();
        Self {
            orchestrator: OrchestratorSettings {
                backoff_schedule_ms: DEFAULT_BACKOFF_SCHEDULE_MS.to_vec(),
                degraded_mode: DegradedMode::default(),
                event_capacity: DEFAULT_EVENT_CAPACITY,
            },
            cache: CacheSettings {
                max_tiles: DEFAULT_MAX_TILES,
            },
            source: SourceSettings {
                name: source.name,
                url: source.url_template,
                min_zoom: source.min_zoom,
                max_zoom: source.max_zoom,
                extension: source.extension,
                max_age_secs: source.max_age.as_secs(),
            },
            disk: DiskSettings {
                enabled: true,
                directory: default_tile_dir(),
            },
            network: NetworkSettings {
                enabled: true,
                timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            },
            worker: WorkerSettings {
                threads: worker.threads,
                queue_size: worker.queue_size,
            },
        }
    }
}

impl ConfigFile {
    /// Load configuration from the default path (~/.tilechain/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Parse configuration from INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_str(text)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }
        std::fs::write(path, self.to_config_string())
            .map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Render as a commented INI file.
    pub fn to_config_string(&self) -> String {
        super::writer::to_config_string(self)
    }

    /// Orchestrator configuration.
    pub fn orchestrator_config(&self) -> Result<OrchestratorConfig, ConfigFileError> {
        let schedule = BackoffSchedule::from_millis(&self.orchestrator.backoff_schedule_ms)
            .map_err(|e| ConfigFileError::InvalidValue {
                section: "orchestrator".to_string(),
                key: "backoff_schedule_ms".to_string(),
                value: String::new(),
                reason: e.to_string(),
            })?;
        Ok(OrchestratorConfig::default()
            .with_backoff_schedule(schedule)
            .with_degraded_mode(self.orchestrator.degraded_mode)
            .with_event_capacity(self.orchestrator.event_capacity))
    }

    /// Tile source.
    pub fn tile_source(&self) -> TileSource {
        TileSource::new(self.source.name.clone(), self.source.url.clone())
            .with_zoom_range(self.source.min_zoom, self.source.max_zoom)
            .with_extension(self.source.extension.clone())
            .with_max_age(Duration::from_secs(self.source.max_age_secs))
    }

    /// Worker pool configuration shared by the bundled backends.
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig::default()
            .with_threads(self.worker.threads)
            .with_queue_size(self.worker.queue_size)
    }
}

/// Default configuration directory (~/.tilechain).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tilechain")
}

/// Default configuration file path (~/.tilechain/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

/// Default on-disk tile directory (~/.cache/tilechain/tiles).
pub fn default_tile_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(config_directory)
        .join("tilechain")
        .join("tiles")
}
