//! Configuration file support.
//!
//! Settings are read from `~/.tilechain/config.ini`; missing sections and
//! keys fall back to the built-in defaults.
//!
//! # Example
//!
//! ```ignore
//! use tilechain::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! let orchestrator = TileOrchestrator::with_config(cache, network, config.orchestrator_config()?);
//! ```

mod file;
mod parser;
mod writer;

pub use file::{
    config_directory, config_file_path, default_tile_dir, CacheSettings, ConfigFile,
    ConfigFileError, DiskSettings, NetworkSettings, OrchestratorSettings, SourceSettings,
    WorkerSettings,
};
