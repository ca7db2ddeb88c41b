//! PointQuery CLI - Command-line interface
//!
//! Thin plumbing over the `pointquery` library: argument parsing, logging
//! setup, a terminal rendering surface and the Tokio runtime.

mod commands;
mod error;
mod terminal;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pointquery::config::{config_file_path, ConfigFile};
use pointquery::logging::init_logging;

use commands::common::{DatasetArgs, PointArgs};
use commands::config::ConfigCommands;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "pointquery", version, about = "Elevation lookups for a single point")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a confirmed lookup and show each dataset's status
    Query {
        #[command(flatten)]
        point: PointArgs,

        #[command(flatten)]
        datasets: DatasetArgs,

        /// Record requests instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Issue cache-warming lookups for a point
    Prefetch {
        #[command(flatten)]
        point: PointArgs,

        #[command(flatten)]
        datasets: DatasetArgs,

        /// Record requests instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Interactive point form on stdin
    Session {
        #[command(flatten)]
        datasets: DatasetArgs,

        /// Record requests instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// List datasets served by the remote service
    Datasets,

    /// Check the remote service's health endpoint
    Health,

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.clone().unwrap_or_else(config_file_path);

    // Config commands must work even when the file does not parse.
    match cli.command {
        Commands::Config { command } => commands::config::run(command, &config_path),
        command => run_with_config(command, &config_path, cli.verbose),
    }
}

fn run_with_config(command: Commands, config_path: &Path, verbose: u8) -> Result<(), CliError> {
    let config = ConfigFile::load_from(config_path)?;

    let mut logging = config.to_logging_config();
    match verbose {
        0 => {}
        1 => logging.level = "debug".to_string(),
        _ => logging.level = "trace".to_string(),
    }
    let _guard = init_logging(&logging)?;

    tracing::debug!(config = %config_path.display(), version = pointquery::VERSION, "Starting");

    match command {
        Commands::Query {
            point,
            datasets,
            dry_run,
        } => commands::query::run_query(&config, &point, &datasets, dry_run),
        Commands::Prefetch {
            point,
            datasets,
            dry_run,
        } => commands::query::run_prefetch(&config, &point, &datasets, dry_run),
        Commands::Session { datasets, dry_run } => {
            commands::session::run(&config, &datasets, dry_run)
        }
        Commands::Datasets => commands::catalog::run_datasets(&config),
        Commands::Health => commands::catalog::run_health(&config),
        Commands::Config { command } => commands::config::run(command, config_path),
    }
}
