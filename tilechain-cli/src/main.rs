//! tilechain CLI - Command-line interface
//!
//! Fetches map tiles through the configured backend chain and manages the
//! configuration file.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::fetch::FetchArgs;

#[derive(Parser)]
#[command(name = "tilechain")]
#[command(version, about = "Fetch map tiles through an ordered chain of backends", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.tilechain/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch tiles and report where each one came from
    Fetch(FetchArgs),

    /// Inspect or create the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Fetch(args) => commands::fetch::run(args, cli.config.as_deref(), cli.verbose),
        Commands::Config(command) => commands::config::run(command, cli.config.as_deref()),
    };

    if let Err(e) = result {
        e.exit();
    }
}
