use crate::broker::Notification;
use crate::watcher::Watcher;
use async_trait::async_trait;
use log::info;

#[derive(Debug)]
pub struct ConsoleWatcher {
    name: String,
    seen: u64,
}

impl ConsoleWatcher {
    pub fn new(name: String) -> Self {
        ConsoleWatcher { name, seen: 0 }
    }

    pub fn seen(&self) -> u64 {
        self.seen
    }
}

#[async_trait]
impl Watcher for ConsoleWatcher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn react(&mut self, notification: &Notification) {
        self.seen += 1;
        info!(
            "🖼️ Watcher [{}]: new image from {}: {} (observed {})",
            self.name,
            notification.source,
            notification.artifact,
            notification.observed_at.to_rfc3339()
        );
    }
}
