use crate::broker::Notification;
use crate::core::fanout::deliver_to_destinations;
use crate::core::transfer_agent::TransferAgent;
use crate::source_config::DestinationConfig;
use crate::watcher::Watcher;
use async_trait::async_trait;
use log::{debug, warn};
use std::collections::HashMap;
use std::path::PathBuf;
use std::slice;
use std::sync::Arc;

/// Ships a source's scratch directory to one further destination whenever a
/// notification for that source arrives.
pub struct RsyncPusher {
    name: String,
    destination: DestinationConfig,
    scratch_dirs: Arc<HashMap<String, PathBuf>>,
    agent: Arc<dyn TransferAgent>,
}

impl RsyncPusher {
    pub fn new(
        name: String,
        destination: DestinationConfig,
        scratch_dirs: Arc<HashMap<String, PathBuf>>,
        agent: Arc<dyn TransferAgent>,
    ) -> Self {
        RsyncPusher {
            name,
            destination,
            scratch_dirs,
            agent,
        }
    }
}

#[async_trait]
impl Watcher for RsyncPusher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn react(&mut self, notification: &Notification) {
        let Some(scratch_dir) = self.scratch_dirs.get(&notification.source) else {
            warn!(
                "Pusher [{}]: no scratch directory known for source '{}', skipping {}",
                self.name, notification.source, notification.artifact
            );
            return;
        };
        debug!(
            "Pusher [{}]: {} from {} triggers a push to {}",
            self.name, notification.artifact, notification.source, self.destination.name
        );
        deliver_to_destinations(
            Arc::clone(&self.agent),
            &notification.source,
            scratch_dir,
            slice::from_ref(&self.destination),
        )
        .await;
    }
}
