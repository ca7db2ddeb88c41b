//! Interactive point form.
//!
//! Reads one command per line from stdin and drives the coordinator the way
//! a web form would: editing the longitude fires the debounced prefetch,
//! `submit` runs a confirmed lookup.

use std::str::FromStr;
use std::sync::Arc;

use pointquery::config::ConfigFile;
use pointquery::coordinator::{FetchOutcome, QueryCoordinator};
use pointquery::point::PointForm;
use pointquery::scheduler::TokioScheduler;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;

use super::common::{build_runtime, resolve_datasets, Backend, DatasetArgs};
use crate::error::CliError;
use crate::terminal::TerminalSurface;

const HELP: &str = "\
Commands:
  lat <value>   set the latitude field
  lon <value>   set the longitude field (prefetches after a pause)
  submit        run the lookup for the current point
  status        show every dataset's status
  help          show this message
  quit          leave the session";

/// One line of session input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Lat(String),
    Lon(String),
    Submit,
    Status,
    Help,
    Quit,
}

impl FromStr for SessionCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_start();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest),
            None => (line.trim_end(), ""),
        };

        match word.to_lowercase().as_str() {
            "lat" => Ok(SessionCommand::Lat(rest.to_string())),
            "lon" => Ok(SessionCommand::Lon(rest.to_string())),
            "submit" | "s" => Ok(SessionCommand::Submit),
            "status" => Ok(SessionCommand::Status),
            "help" | "?" => Ok(SessionCommand::Help),
            "quit" | "exit" | "q" => Ok(SessionCommand::Quit),
            other => Err(format!("Unknown command '{}'. Type 'help'.", other)),
        }
    }
}

/// Run the interactive session until `quit` or end of input.
pub fn run(config: &ConfigFile, datasets: &DatasetArgs, dry_run: bool) -> Result<(), CliError> {
    let runtime = build_runtime()?;

    runtime.block_on(async {
        let ids = resolve_datasets(datasets, config).await?;
        let backend = Backend::new(config, Handle::current(), dry_run)?;
        let form = Arc::new(PointForm::new());
        let surface = Arc::new(TerminalSurface::new(ids));

        let coordinator = QueryCoordinator::new(
            config.to_coordinator_config(),
            form.clone(),
            surface.clone(),
            backend.service(),
            Arc::new(TokioScheduler::new(Handle::current())),
        );
        let prefetch = coordinator.prefetch_trigger();

        println!("{}", HELP);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            match line.parse::<SessionCommand>() {
                Ok(SessionCommand::Lat(value)) => form.set_latitude(value),
                Ok(SessionCommand::Lon(value)) => {
                    form.set_longitude(value);
                    prefetch.fire();
                }
                Ok(SessionCommand::Submit) => {
                    if let FetchOutcome::Dispatched { cycle, datasets } = coordinator.fetch() {
                        tracing::debug!(cycle, datasets, "Submitted");
                    }
                }
                Ok(SessionCommand::Status) => surface.print_summary(),
                Ok(SessionCommand::Help) => println!("{}", HELP),
                Ok(SessionCommand::Quit) => break,
                Err(message) => println!("{}", message),
            }
        }

        prefetch.cancel();
        backend.print_recorded();
        Ok::<(), CliError>(())
    })
}
