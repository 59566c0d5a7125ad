use crate::broker::LogSink;
use crate::config_loader::MasterConfig;
use crate::core::fanout::run_to_barrier;
use crate::core::transfer_agent::TransferAgent;
use crate::errors::AppError;
use crate::fetcher::{Fetcher, RsyncFetcher};
use anyhow::Result;
use log::{info, warn};
use std::sync::Arc;
use std::time::Instant;

/// Checks every source once, concurrently: pull, prune, ship to each
/// destination. Returns when every source (and every delivery under it) has
/// finished, along with the number of new images per source.
pub async fn check_all_sources(master_config: &MasterConfig, agent: Arc<dyn TransferAgent>) -> Vec<(String, usize)> {
    let scratch_base = &master_config.app_settings.scratch_dir;
    let tasks = master_config
        .sources
        .iter()
        .map(|source| {
            let scratch_dir = source.resolved_scratch_dir(scratch_base);
            let mut fetcher = RsyncFetcher::with_sink(source.clone(), scratch_dir, Box::new(LogSink), Arc::clone(&agent));
            let task = async move { Ok::<usize, AppError>(fetcher.check_source().await) };
            (source.name.clone(), task)
        })
        .collect();

    let report = run_to_barrier("source check", tasks).await;
    for name in &report.failed {
        warn!("Source [{}]: check did not complete.", name);
    }
    report.succeeded
}

pub async fn handle_check_cli(master_config: &MasterConfig, agent: Arc<dyn TransferAgent>) -> Result<()> {
    let op_start_time = Instant::now();
    if master_config.sources.is_empty() {
        warn!("⚠️ No sources configured, nothing to check.");
        return Ok(());
    }
    info!("🔍 Checking {} source(s) once.", master_config.sources.len());

    let results = check_all_sources(master_config, agent).await;
    let total: usize = results.iter().map(|(_, found)| found).sum();
    for (name, found) in &results {
        info!("  Source [{}]: {} new image(s)", name, found);
    }
    info!(
        "🏁 Checked {} source(s), {} new image(s) in {:?}.",
        results.len(),
        total,
        op_start_time.elapsed()
    );
    Ok(())
}
