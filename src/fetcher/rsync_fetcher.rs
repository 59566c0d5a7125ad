use crate::broker::{BrokerPublisher, Endpoint, Notification, NotificationSink};
use crate::common::file_utils;
use crate::core::fanout::deliver_to_destinations;
use crate::core::transfer_agent::TransferAgent;
use crate::errors::AppError;
use crate::fetcher::Fetcher;
use crate::source_config::SourceConfig;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct RsyncFetcher {
    config: SourceConfig,
    scratch_dir: PathBuf,
    sink: Box<dyn NotificationSink>,
    agent: Arc<dyn TransferAgent>,
}

impl RsyncFetcher {
    /// Connects a publisher to the broker's back-end endpoint. The broker
    /// owns the bound side; failing to reach it is fatal for this fetcher.
    pub async fn new(
        config: SourceConfig,
        scratch_base: &Path,
        backend: &Endpoint,
        agent: Arc<dyn TransferAgent>,
    ) -> Result<Self, AppError> {
        debug!("Fetcher [{}]: connecting to broker on {}", config.name, backend);
        let publisher = BrokerPublisher::connect(backend).await?;
        let scratch_dir = config.resolved_scratch_dir(scratch_base);
        Ok(Self::with_sink(config, scratch_dir, Box::new(publisher), agent))
    }

    pub fn with_sink(
        config: SourceConfig,
        scratch_dir: PathBuf,
        sink: Box<dyn NotificationSink>,
        agent: Arc<dyn TransferAgent>,
    ) -> Self {
        RsyncFetcher {
            config,
            scratch_dir,
            sink,
            agent,
        }
    }

    async fn flush_old_images(&self, retention_days: u32) {
        match self.agent.prune(&self.config, retention_days).await {
            Ok(deleted) => {
                for line in &deleted {
                    info!("Fetcher [{}]: flushed {}", self.config.name, line);
                }
            }
            Err(e) => warn!("Fetcher [{}]: retention prune failed: {}", self.config.name, e),
        }
    }
}

#[async_trait]
impl Fetcher for RsyncFetcher {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.interval)
    }

    async fn retrieve_cycle(&mut self) -> usize {
        let cycle_start = Instant::now();
        if let Err(e) = file_utils::ensure_scratch_directory(&self.scratch_dir) {
            error!("Fetcher [{}]: {}", self.config.name, e);
            return 0;
        }

        let reported = match self.agent.fetch(&self.config, &self.scratch_dir).await {
            Ok(lines) => lines,
            Err(e) => {
                error!("Fetcher [{}]: retrieval failed, will retry next cycle: {}", self.config.name, e);
                return 0;
            }
        };

        let mut seen = HashSet::new();
        let mut new_images = 0;
        for line in reported {
            if !file_utils::is_image(&line) {
                debug!("Fetcher [{}]: skipping {}", self.config.name, line);
                continue;
            }
            if !seen.insert(line.clone()) {
                continue;
            }
            info!("📸 Fetcher [{}]: new image {}", self.config.name, line);
            let notification = Notification::new(self.config.name.clone(), line);
            if let Err(e) = self.sink.publish(&notification).await {
                error!(
                    "Fetcher [{}]: failed to publish {}: {}",
                    self.config.name, notification.artifact, e
                );
            }
            new_images += 1;
        }
        debug!(
            "Fetcher [{}]: all done, new images: {} in {:?}",
            self.config.name,
            new_images,
            cycle_start.elapsed()
        );
        new_images
    }

    async fn check_source(&mut self) -> usize {
        let new_images = self.retrieve_cycle().await;
        if new_images == 0 {
            return 0;
        }
        if let Some(retention_days) = self.config.retention {
            self.flush_old_images(retention_days).await;
        }
        deliver_to_destinations(
            Arc::clone(&self.agent),
            &self.config.name,
            &self.scratch_dir,
            &self.config.destinations,
        )
        .await;
        new_images
    }
}
