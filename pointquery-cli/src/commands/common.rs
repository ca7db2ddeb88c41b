//! Common types and utilities shared across CLI commands.

use std::sync::Arc;

use clap::Args;
use pointquery::catalog::{fetch_catalog, CatalogEntry};
use pointquery::config::ConfigFile;
use pointquery::dataset::DatasetId;
use pointquery::service::{build_client, ElevationService, HttpElevationService, RecordingService};
use tokio::runtime::{Handle, Runtime};

use crate::error::CliError;

/// Point given on the command line.
#[derive(Debug, Args)]
pub struct PointArgs {
    /// Latitude, as entered (e.g. 46.5)
    #[arg(long, allow_hyphen_values = true)]
    pub lat: String,

    /// Longitude, as entered (e.g. -8.3)
    #[arg(long, allow_hyphen_values = true)]
    pub lon: String,
}

/// Dataset selection for CLI arguments.
#[derive(Debug, Args, Default)]
pub struct DatasetArgs {
    /// Dataset to query; repeat for several (default: from config)
    #[arg(short, long)]
    pub dataset: Vec<String>,

    /// Query every dataset the server advertises
    #[arg(long, conflicts_with = "dataset")]
    pub remote_datasets: bool,
}

/// Create the multi-threaded runtime commands run on.
pub fn build_runtime() -> Result<Runtime, CliError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("pointquery")
        .build()
        .map_err(|e| CliError::Runtime(e.to_string()))
}

/// Resolve the datasets to display: the server catalog when requested,
/// otherwise `--dataset` ids, falling back to config.
pub async fn resolve_datasets(
    args: &DatasetArgs,
    config: &ConfigFile,
) -> Result<Vec<DatasetId>, CliError> {
    let ids: Vec<DatasetId> = if args.remote_datasets {
        let service_config = config.to_service_config();
        let client = build_client(&service_config)?;
        fetch_catalog(&client, &service_config)
            .await?
            .iter()
            .map(CatalogEntry::id)
            .collect()
    } else if !args.dataset.is_empty() {
        args.dataset.iter().map(|id| DatasetId::new(id.as_str())).collect()
    } else {
        config.dataset_ids()
    };

    if ids.is_empty() {
        return Err(CliError::Config(
            "No datasets to query. Set datasets.ids in config.ini or use --dataset".to_string(),
        ));
    }
    Ok(ids)
}

/// Where lookups go: the real service, or a recorder for dry runs.
pub enum Backend {
    Http(Arc<HttpElevationService>),
    DryRun(Arc<RecordingService>),
}

impl Backend {
    /// Create the backend for `config`, spawning HTTP work onto `runtime`.
    pub fn new(config: &ConfigFile, runtime: Handle, dry_run: bool) -> Result<Self, CliError> {
        let service_config = config.to_service_config();
        if dry_run {
            return Ok(Backend::DryRun(Arc::new(RecordingService::with_config(
                service_config,
            ))));
        }
        Ok(Backend::Http(Arc::new(HttpElevationService::new(
            service_config,
            runtime,
        )?)))
    }

    /// The backend as a coordinator collaborator.
    pub fn service(&self) -> Arc<dyn ElevationService> {
        match self {
            Backend::Http(service) => Arc::clone(service) as Arc<dyn ElevationService>,
            Backend::DryRun(service) => Arc::clone(service) as Arc<dyn ElevationService>,
        }
    }

    /// Wait for in-flight HTTP lookups; nothing to wait for in a dry run.
    pub async fn wait_idle(&self) {
        if let Backend::Http(service) = self {
            service.wait_idle().await;
        }
    }

    /// Print the URLs a dry run would have requested.
    pub fn print_recorded(&self) {
        if let Backend::DryRun(service) = self {
            println!();
            println!("Dry run - requests not sent:");
            for url in service.urls() {
                println!("  {}", url);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cli_datasets_take_precedence() {
        let args = DatasetArgs {
            dataset: vec!["etopo1".to_string()],
            remote_datasets: false,
        };
        let ids = resolve_datasets(&args, &ConfigFile::default()).await.unwrap();
        assert_eq!(ids, vec![DatasetId::from("etopo1")]);
    }

    #[tokio::test]
    async fn test_config_datasets_by_default() {
        let ids = resolve_datasets(&DatasetArgs::default(), &ConfigFile::default())
            .await
            .unwrap();
        assert_eq!(ids, vec![DatasetId::from("srtm30m"), DatasetId::from("aster30m")]);
    }

    #[tokio::test]
    async fn test_empty_dataset_list_is_an_error() {
        let mut config = ConfigFile::default();
        config.datasets.ids.clear();
        let err = resolve_datasets(&DatasetArgs::default(), &config).await.unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_dry_run_backend_records() {
        let runtime = build_runtime().unwrap();
        let backend = Backend::new(&ConfigFile::default(), runtime.handle().clone(), true).unwrap();
        assert!(matches!(backend, Backend::DryRun(_)));
    }
}
