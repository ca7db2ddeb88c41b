//! `datasets` and `health` commands.

use pointquery::catalog::{check_health, fetch_catalog, HealthStatus};
use pointquery::config::ConfigFile;
use pointquery::service::build_client;

use super::common::build_runtime;
use crate::error::CliError;

/// List the datasets served by the configured endpoint.
pub fn run_datasets(config: &ConfigFile) -> Result<(), CliError> {
    let service_config = config.to_service_config();
    let client = build_client(&service_config)?;
    let runtime = build_runtime()?;

    let entries = runtime.block_on(fetch_catalog(&client, &service_config))?;

    println!("Datasets at {}", service_config.server_root());
    println!();
    for entry in &entries {
        if entry.is_multi() {
            println!("  {} ({})", entry.name, entry.child_datasets.join(", "));
        } else {
            println!("  {}", entry.name);
        }
    }
    if entries.is_empty() {
        println!("  (none)");
    }

    Ok(())
}

/// Probe the health endpoint.
pub fn run_health(config: &ConfigFile) -> Result<(), CliError> {
    let service_config = config.to_service_config();
    let client = build_client(&service_config)?;
    let runtime = build_runtime()?;

    match runtime.block_on(check_health(&client, &service_config))? {
        HealthStatus::Ok => println!("{}: OK", service_config.server_root()),
        HealthStatus::ServerError => println!("{}: SERVER_ERROR", service_config.server_root()),
    }

    Ok(())
}
