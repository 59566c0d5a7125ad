use anyhow::{bail, Context, Result};
use camcommander::cli;
use camcommander::common::logging_setup;
use camcommander::config_loader::{self, CONFIG_FILE_ENV};
use camcommander::core::orchestrator::Orchestrator;
use camcommander::core::transfer_agent::RsyncAgent;
use camcommander::operations::{check_op, relay_poke_op};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

fn resolve_config_path(matches: &clap::ArgMatches) -> Result<PathBuf> {
    if let Some(path) = matches.get_one::<String>("config") {
        return Ok(PathBuf::from(path));
    }
    let path = std::env::var(CONFIG_FILE_ENV)
        .with_context(|| format!("No --config given and {} is not set", CONFIG_FILE_ENV))?;
    Ok(PathBuf::from(path))
}

// One-shot modes don't wait for a missing config; the next scheduled run will.
async fn run_one_shot(operation_name: &str, config_path: &Path, debug: bool) -> Result<()> {
    let master_config = config_loader::load_config(config_path)
        .with_context(|| format!("Failed to load configuration from '{}'", config_path.display()))?;
    logging_setup::apply_config_level(&master_config.app_settings, debug);
    match operation_name {
        "check" => check_op::handle_check_cli(&master_config, Arc::new(RsyncAgent::new())).await,
        _ => relay_poke_op::handle_poke_relays_cli(&master_config).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let main_start_time = Instant::now();
    let matches = cli::build_cli().get_matches();
    let debug = matches.get_flag("debug");
    logging_setup::initialize_logging(debug);

    let config_path = match resolve_config_path(&matches) {
        Ok(path) => path,
        Err(e) => {
            error!("❌ {:#}", e);
            return Err(e);
        }
    };

    let operation_name = matches.subcommand_name().unwrap_or("run");
    let op_result: Result<()> = match operation_name {
        "run" => {
            let orchestrator = Orchestrator::new(config_path, debug);
            let shutdown = orchestrator.shutdown_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("🛑 Interrupt received, shutting down.");
                    shutdown.cancel();
                }
            });
            orchestrator.run().await
        }
        "check" | "poke-relays" => run_one_shot(operation_name, &config_path, debug).await,
        other => bail!("Subcommand '{}' not implemented.", other),
    };

    if let Err(e) = op_result {
        error!("❌ '{}' failed after {:?}: {:#}", operation_name, main_start_time.elapsed(), e);
        return Err(e);
    }
    info!("🏁 '{}' finished in {:?}.", operation_name, main_start_time.elapsed());
    Ok(())
}
