pub mod rsync_fetcher;

use crate::broker::Endpoint;
use crate::core::transfer_agent::TransferAgent;
use crate::errors::AppError;
use crate::source_config::{FetcherKind, SourceConfig};
use async_trait::async_trait;
use log::{debug, info};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

pub use rsync_fetcher::RsyncFetcher;

/// A worker bound to one source that polls it for new images.
#[async_trait]
pub trait Fetcher: Send {
    fn name(&self) -> &str;

    fn interval(&self) -> Duration;

    /// Pulls the source once and publishes one notification per new image.
    /// Returns how many were found; a failed pull counts as zero.
    async fn retrieve_cycle(&mut self) -> usize;

    /// A full cycle: retrieve, then prune and ship to destinations if
    /// anything new arrived. Returns once every delivery has finished.
    async fn check_source(&mut self) -> usize;

    /// Runs cycles separated by the configured interval until `shutdown`.
    async fn start(&mut self, shutdown: CancellationToken) {
        info!("🏃 Fetcher [{}]: polling every {:?}", self.name(), self.interval());
        loop {
            let cycle_start = Instant::now();
            let found = tokio::select! {
                _ = shutdown.cancelled() => break,
                found = self.check_source() => found,
            };
            debug!("Fetcher [{}]: cycle found {} new image(s) in {:?}", self.name(), found, cycle_start.elapsed());
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval()) => {}
            }
        }
        info!("👋 Fetcher [{}]: stopped.", self.name());
    }
}

/// Builds the fetcher variant named by the source's `type`.
pub async fn fetcher_factory(
    config: &SourceConfig,
    scratch_base: &Path,
    backend: &Endpoint,
    agent: Arc<dyn TransferAgent>,
) -> Result<Box<dyn Fetcher>, AppError> {
    let kind = FetcherKind::parse_for(config)?;
    debug!("Fetcher [{}]: building {} fetcher", config.name, kind);
    match kind {
        FetcherKind::Rsync => {
            let fetcher = RsyncFetcher::new(config.clone(), scratch_base, backend, agent).await?;
            Ok(Box::new(fetcher))
        }
    }
}
