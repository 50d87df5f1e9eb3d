//! Configuration management CLI commands.

use std::path::Path;

use clap::Subcommand;
use tilechain::config::{config_file_path, ConfigFile};

use super::load_config;
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration (file values over defaults)
    Show,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, path: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => run_show(path),
        ConfigCommands::Init { force } => run_init(path, force),
        ConfigCommands::Path => {
            println!("{}", resolve(path).display());
            Ok(())
        }
    }
}

fn run_show(path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(path)?;
    print!("{}", config.to_config_string());
    Ok(())
}

fn run_init(path: Option<&Path>, force: bool) -> Result<(), CliError> {
    let target = resolve(path);
    if target.exists() && !force {
        println!(
            "Config file already exists: {} (use --force to overwrite)",
            target.display()
        );
        return Ok(());
    }
    ConfigFile::default().save_to(&target)?;
    println!("Wrote {}", target.display());
    Ok(())
}

fn resolve(path: Option<&Path>) -> std::path::PathBuf {
    path.map(Path::to_path_buf).unwrap_or_else(config_file_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_defaults_once() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");

        run(ConfigCommands::Init { force: false }, Some(&path)).unwrap();
        assert_eq!(ConfigFile::load_from(&path).unwrap(), ConfigFile::default());

        std::fs::write(&path, "[worker]\nthreads = 9\n").unwrap();
        run(ConfigCommands::Init { force: false }, Some(&path)).unwrap();
        assert_eq!(ConfigFile::load_from(&path).unwrap().worker.threads, 9);

        run(ConfigCommands::Init { force: true }, Some(&path)).unwrap();
        assert_eq!(ConfigFile::load_from(&path).unwrap(), ConfigFile::default());
    }
}
