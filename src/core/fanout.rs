use crate::core::transfer_agent::TransferAgent;
use crate::errors::AppError;
use crate::source_config::DestinationConfig;
use futures::future::join_all;
use log::{debug, error, info, warn};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

/// Outcome of one join barrier: who finished cleanly and who did not.
#[derive(Debug)]
pub struct BarrierReport<T> {
    pub succeeded: Vec<(String, T)>,
    pub failed: Vec<String>,
}

impl<T> BarrierReport<T> {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Spawns every named task as its own tokio task and waits for all of them.
///
/// This is a full join barrier: it returns only once every task has finished.
/// A task that errors or panics is logged under its name and recorded in
/// [`BarrierReport::failed`]; it never cancels its siblings and never makes
/// the barrier itself fail.
pub async fn run_to_barrier<T, Fut>(operation_display_name: &str, tasks: Vec<(String, Fut)>) -> BarrierReport<T>
where
    T: Send + 'static,
    Fut: Future<Output = Result<T, AppError>> + Send + 'static,
{
    let barrier_start_time = Instant::now();
    let mut handles: Vec<(String, JoinHandle<Result<T, AppError>>)> = Vec::with_capacity(tasks.len());
    for (name, task) in tasks {
        debug!("  Spawning '{}' task for '{}'", operation_display_name, name);
        handles.push((name, tokio::spawn(task)));
    }

    debug!("🔄 Waiting for all {} '{}' tasks...", handles.len(), operation_display_name);
    let (names, joins): (Vec<String>, Vec<_>) = handles.into_iter().unzip();
    let results = join_all(joins).await;

    let mut report = BarrierReport {
        succeeded: Vec::new(),
        failed: Vec::new(),
    };
    for (name, task_result) in names.into_iter().zip(results) {
        match task_result {
            Ok(Ok(value)) => {
                debug!("  '{}' task for '{}' completed successfully.", operation_display_name, name);
                report.succeeded.push((name, value));
            }
            Ok(Err(op_err)) => {
                error!("❌ '{}' failed for '{}': {}", operation_display_name, name, op_err);
                report.failed.push(name);
            }
            Err(join_err) => {
                error!("💀 '{}' task for '{}' panicked or was cancelled: {}", operation_display_name, name, join_err);
                report.failed.push(name);
            }
        }
    }

    if report.all_succeeded() {
        debug!(
            "✅ All {} '{}' tasks finished in {:?}.",
            report.total(),
            operation_display_name,
            barrier_start_time.elapsed()
        );
    } else {
        warn!(
            "⚠️ '{}' finished with {} error(s) out of {} task(s) in {:?}.",
            operation_display_name,
            report.failed.len(),
            report.total(),
            barrier_start_time.elapsed()
        );
    }
    report
}

/// Delivers one source's scratch directory to each of its destinations
/// concurrently and returns once every delivery has finished.
pub async fn deliver_to_destinations(
    agent: Arc<dyn TransferAgent>,
    source_name: &str,
    scratch_dir: &Path,
    destinations: &[DestinationConfig],
) -> BarrierReport<usize> {
    if destinations.is_empty() {
        debug!("Source [{}]: no destinations configured, nothing to ship.", source_name);
        return BarrierReport {
            succeeded: Vec::new(),
            failed: Vec::new(),
        };
    }
    info!("🚚 Source [{}]: shipping images to {} destination(s).", source_name, destinations.len());

    let tasks = destinations
        .iter()
        .map(|destination| {
            let agent = Arc::clone(&agent);
            let destination = destination.clone();
            let scratch_dir: PathBuf = scratch_dir.to_path_buf();
            let name = destination.name.clone();
            let task = async move {
                let delivery_start = Instant::now();
                let reported = agent.deliver(&destination, &scratch_dir).await?;
                let sent = reported.iter().filter(|line| crate::common::file_utils::is_image(line)).count();
                info!(
                    "📦 Destination [{}]: images delivered ({} new) in {:?}",
                    destination.name,
                    sent,
                    delivery_start.elapsed()
                );
                Ok(sent)
            };
            (name, task)
        })
        .collect();

    run_to_barrier(&format!("delivery from {}", source_name), tasks).await
}
