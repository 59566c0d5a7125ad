pub mod console_watcher;
pub mod rsync_pusher;

use crate::broker::{BrokerSubscriber, Endpoint, Notification};
use crate::core::transfer_agent::TransferAgent;
use crate::errors::AppError;
use crate::source_config::{WatcherConfig, WatcherKind};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use console_watcher::ConsoleWatcher;
pub use rsync_pusher::RsyncPusher;

/// Reacts to notifications coming out of the broker.
#[async_trait]
pub trait Watcher: Send {
    fn name(&self) -> &str;

    async fn react(&mut self, notification: &Notification);
}

/// A [`Watcher`] wired to its own broker subscription.
pub struct WatcherWorker {
    subscriber: BrokerSubscriber,
    watcher: Box<dyn Watcher>,
}

impl WatcherWorker {
    /// Subscribes to the broker's front-end endpoint. Fails if the broker
    /// can't be reached or doesn't confirm the subscription.
    pub async fn new(frontend: &Endpoint, topic: &str, watcher: Box<dyn Watcher>) -> Result<Self, AppError> {
        debug!("Watcher [{}]: connecting to broker on {}", watcher.name(), frontend);
        let subscriber = BrokerSubscriber::connect(frontend, topic).await?;
        Ok(WatcherWorker { subscriber, watcher })
    }

    pub fn name(&self) -> &str {
        self.watcher.name()
    }

    /// Receive, react, repeat. Ends on shutdown or when the broker goes away.
    pub async fn start(&mut self, shutdown: CancellationToken) {
        info!("👀 Watcher [{}]: waiting for images.", self.watcher.name());
        loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = self.subscriber.recv() => received,
            };
            match received {
                Ok(Some(notification)) => self.watcher.react(&notification).await,
                Ok(None) => {
                    warn!("Watcher [{}]: broker closed the connection.", self.watcher.name());
                    break;
                }
                Err(AppError::Wire(details)) => {
                    warn!("Watcher [{}]: ignoring malformed frame: {}", self.watcher.name(), details);
                }
                Err(e) => {
                    error!("Watcher [{}]: receive failed: {}", self.watcher.name(), e);
                    break;
                }
            }
        }
        info!("👋 Watcher [{}]: stopped.", self.watcher.name());
    }
}

/// Builds the watcher variant named by the config's `type` and subscribes it.
///
/// `scratch_dirs` maps source names to their scratch directories; pushers use
/// it to find what to ship for a notification.
pub async fn watcher_factory(
    config: &WatcherConfig,
    frontend: &Endpoint,
    scratch_dirs: Arc<HashMap<String, PathBuf>>,
    agent: Arc<dyn TransferAgent>,
) -> Result<WatcherWorker, AppError> {
    let kind = WatcherKind::parse_for(config)?;
    debug!("Watcher [{}]: building {} watcher", config.name, kind);
    let watcher: Box<dyn Watcher> = match kind {
        WatcherKind::Console => Box::new(ConsoleWatcher::new(config.name.clone())),
        WatcherKind::RsyncPusher => {
            let destination = config.destination.clone().ok_or_else(|| {
                AppError::Config(format!("Pusher '{}' needs a destination.", config.name))
            })?;
            Box::new(RsyncPusher::new(config.name.clone(), destination, scratch_dirs, agent))
        }
    };
    WatcherWorker::new(frontend, &config.topic, watcher).await
}
