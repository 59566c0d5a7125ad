use crate::errors::AppError;
use crate::source_config::{DestinationConfig, RemoteLocation, SourceConfig};
use async_trait::async_trait;
use log::{debug, info};
use std::path::Path;
use std::process::Output;
use std::time::Instant;
use tokio::process::Command;

// --- The TransferAgent Trait ---

/// The external tools that move files around. Fetchers pull with it,
/// delivery tasks push with it, and retention pruning runs through it.
#[async_trait]
pub trait TransferAgent: Send + Sync {
    // Pulls the source's remote path into `scratch_dir`, deleting local files
    // that vanished upstream. Returns every path the tool reported.
    async fn fetch(&self, source: &SourceConfig, scratch_dir: &Path) -> Result<Vec<String>, AppError>;

    // Pushes the contents of `scratch_dir` to the destination.
    async fn deliver(&self, destination: &DestinationConfig, scratch_dir: &Path) -> Result<Vec<String>, AppError>;

    // Deletes images older than `retention_days` on the source host.
    async fn prune(&self, source: &SourceConfig, retention_days: u32) -> Result<Vec<String>, AppError>;
}

/// rsync over ssh for transfers, ssh + find for pruning.
#[derive(Debug, Clone)]
pub struct RsyncAgent {
    rsync_program: String,
    ssh_program: String,
}

impl Default for RsyncAgent {
    fn default() -> Self {
        RsyncAgent::with_programs("rsync", "ssh")
    }
}

impl RsyncAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_programs(rsync_program: impl Into<String>, ssh_program: impl Into<String>) -> Self {
        RsyncAgent {
            rsync_program: rsync_program.into(),
            ssh_program: ssh_program.into(),
        }
    }

    fn rsh_arg(&self, location: &dyn RemoteLocation) -> String {
        let mut rsh = vec![self.ssh_program.clone()];
        rsh.extend(location.ssh_args());
        rsh.join(" ")
    }

    fn common_rsync_args(&self, location: &dyn RemoteLocation) -> Vec<String> {
        vec![
            "--verbose".to_string(),
            "--prune-empty-dirs".to_string(),
            "--compress".to_string(),
            "--archive".to_string(),
            "--rsh".to_string(),
            self.rsh_arg(location),
        ]
    }

    pub fn fetch_args(&self, source: &SourceConfig, scratch_dir: &Path) -> Vec<String> {
        let mut args = self.common_rsync_args(source);
        args.push("--delete".to_string());
        args.push(source.rsync_spec());
        args.push(scratch_dir.display().to_string());
        args
    }

    pub fn deliver_args(&self, destination: &DestinationConfig, scratch_dir: &Path) -> Vec<String> {
        let mut args = self.common_rsync_args(destination);
        // Trailing slash: ship the directory's contents, not the directory itself.
        args.push(format!("{}/", scratch_dir.display().to_string().trim_end_matches('/')));
        args.push(destination.rsync_spec());
        args
    }

    pub fn prune_args(&self, source: &SourceConfig, retention_days: u32) -> Vec<String> {
        let mut args = source.ssh_args();
        args.push(source.ssh_target());
        args.push(format!(
            "find {} -name '*.jpg' -ctime +{} -print -delete",
            source.path, retention_days
        ));
        args
    }

    async fn run(&self, target: &str, program: &str, args: &[String]) -> Result<Vec<String>, AppError> {
        debug!("{} [{}]: {} {}", program, target, program, args.join(" "));
        let start_time = Instant::now();
        let output: Output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AppError::Transfer {
                target: target.to_string(),
                details: format!("could not run {}: {}", program, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Transfer {
                target: target.to_string(),
                details: format!("{} exited with {}: {}", program, output.status, stderr.trim()),
            });
        }

        let lines: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        debug!(
            "{} [{}]: finished in {:?} with {} output lines",
            program,
            target,
            start_time.elapsed(),
            lines.len()
        );
        Ok(lines)
    }
}

#[async_trait]
impl TransferAgent for RsyncAgent {
    async fn fetch(&self, source: &SourceConfig, scratch_dir: &Path) -> Result<Vec<String>, AppError> {
        let args = self.fetch_args(source, scratch_dir);
        self.run(&source.name, &self.rsync_program, &args).await
    }

    async fn deliver(&self, destination: &DestinationConfig, scratch_dir: &Path) -> Result<Vec<String>, AppError> {
        let args = self.deliver_args(destination, scratch_dir);
        self.run(&destination.name, &self.rsync_program, &args).await
    }

    async fn prune(&self, source: &SourceConfig, retention_days: u32) -> Result<Vec<String>, AppError> {
        let args = self.prune_args(source, retention_days);
        info!("🧹 Flushing images older than {} days on '{}'", retention_days, source.name);
        self.run(&source.name, &self.ssh_program, &args).await
    }
}
