//! One-shot `query` and `prefetch` commands.

use std::sync::Arc;
use std::time::Duration;

use pointquery::config::ConfigFile;
use pointquery::coordinator::{FetchOutcome, QueryCoordinator};
use pointquery::point::PointForm;
use pointquery::scheduler::TokioScheduler;
use tokio::runtime::Handle;

use super::common::{build_runtime, resolve_datasets, Backend, DatasetArgs, PointArgs};
use crate::error::CliError;
use crate::terminal::TerminalSurface;

/// Grace period after the deadline so the last guards get to render.
const RENDER_GRACE: Duration = Duration::from_millis(50);

/// Run a confirmed lookup and wait for every dataset's deadline.
pub fn run_query(
    config: &ConfigFile,
    point: &PointArgs,
    datasets: &DatasetArgs,
    dry_run: bool,
) -> Result<(), CliError> {
    let runtime = build_runtime()?;

    runtime.block_on(async {
        let ids = resolve_datasets(datasets, config).await?;
        let backend = Backend::new(config, Handle::current(), dry_run)?;
        let surface = Arc::new(TerminalSurface::new(ids));
        let coordinator_config = config.to_coordinator_config();
        let deadline = coordinator_config.request_deadline;

        let coordinator = QueryCoordinator::new(
            coordinator_config,
            Arc::new(PointForm::with_values(point.lat.as_str(), point.lon.as_str())),
            surface.clone(),
            backend.service(),
            Arc::new(TokioScheduler::new(Handle::current())),
        );

        println!("Querying {},{}", point.lat.trim(), point.lon.trim());
        let outcome = coordinator.fetch();

        if let FetchOutcome::Dispatched { .. } = outcome {
            tokio::time::sleep(deadline + RENDER_GRACE).await;
        }

        surface.print_summary();
        backend.print_recorded();
        Ok::<(), CliError>(())
    })
}

/// Issue prefetch lookups once, without debouncing, and wait for them to
/// be sent.
pub fn run_prefetch(
    config: &ConfigFile,
    point: &PointArgs,
    datasets: &DatasetArgs,
    dry_run: bool,
) -> Result<(), CliError> {
    let runtime = build_runtime()?;

    runtime.block_on(async {
        let ids = resolve_datasets(datasets, config).await?;
        let backend = Backend::new(config, Handle::current(), dry_run)?;

        let coordinator = QueryCoordinator::new(
            config.to_coordinator_config(),
            Arc::new(PointForm::with_values(point.lat.as_str(), point.lon.as_str())),
            Arc::new(TerminalSurface::new(ids)),
            backend.service(),
            Arc::new(TokioScheduler::new(Handle::current())),
        );

        let issued = coordinator.prefetch();
        if issued == 0 {
            println!("Nothing to prefetch: invalid point");
            return Ok::<(), CliError>(());
        }

        backend.wait_idle().await;
        println!("Prefetched {} dataset(s)", issued);
        backend.print_recorded();
        Ok::<(), CliError>(())
    })
}
