use crate::app_config::ApplicationConfig;
use crate::errors::AppError;
use crate::source_config::{FetcherKind, RelayConfig, SourceConfig, WatcherConfig, WatcherKind};
use log::{debug, info, warn};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::{Duration, Instant};

pub const CONFIG_FILE_ENV: &str = "CP_CONFIG_FILE";

#[derive(Debug, Deserialize, Clone)]
pub struct MasterConfig {
    #[serde(rename = "application", default)]
    pub app_settings: ApplicationConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub watchers: Vec<WatcherConfig>,
    #[serde(default)]
    pub relays: Vec<RelayConfig>,
}

/// Reads, parses and validates the config at `path`.
///
/// A missing file is reported as [`AppError::ConfigNotFound`] so callers can
/// tell it apart from a file that exists but is broken.
pub fn load_config(path: &Path) -> Result<MasterConfig, AppError> {
    debug!("📄 Attempting to load config from: {}", path.display());
    let start_time = Instant::now();

    let config_str = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => AppError::ConfigNotFound(path.to_path_buf()),
        _ => AppError::Config(format!("Failed to read '{}': {}", path.display(), e)),
    })?;
    debug!("Read config file in {:?}", start_time.elapsed());

    let config: MasterConfig = serde_yaml::from_str(&config_str).map_err(|e| {
        AppError::Config(format!("Failed to parse YAML configuration from '{}': {}", path.display(), e))
    })?;

    validate_master_config(&config)?;

    info!(
        "✅ Loaded configuration from '{}' ({} sources, {} watchers, {} relays) in {:?}",
        path.display(),
        config.sources.len(),
        config.watchers.len(),
        config.relays.len(),
        start_time.elapsed()
    );
    Ok(config)
}

/// Keeps trying to load the config while the file is absent, sleeping
/// `backoff` between attempts. Any other failure is returned immediately.
pub async fn wait_for_config(path: &Path, backoff: Duration) -> Result<MasterConfig, AppError> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match load_config(path) {
            Err(AppError::ConfigNotFound(missing)) => {
                warn!(
                    "⏳ Config {} doesn't exist (attempt {}), will try again in {:?}.",
                    missing.display(),
                    attempt,
                    backoff
                );
                tokio::time::sleep(backoff).await;
            }
            other => return other,
        }
    }
}

fn check_worker_name(worker: &str, name: &str, seen: &mut HashSet<String>) -> Result<(), AppError> {
    if name.is_empty() {
        return Err(AppError::Config(format!("❌ A {} has an empty name.", worker)));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(AppError::Config(format!("❌ {} name '{}' must not contain whitespace.", worker, name)));
    }
    // Source names become scratch directory names under the scratch base.
    if name.contains(['/', '\\']) || name.contains("..") {
        return Err(AppError::Config(format!(
            "❌ {} name '{}' must not contain path separators or '..'.",
            worker, name
        )));
    }
    if !seen.insert(name.to_string()) {
        return Err(AppError::Config(format!("❌ Duplicate {} name found: {}", worker, name)));
    }
    Ok(())
}

pub fn validate_master_config(config: &MasterConfig) -> Result<(), AppError> {
    debug!("🕵️ Validating master configuration...");
    let validation_start_time = Instant::now();

    if config.app_settings.broker_capacity == 0 {
        return Err(AppError::Config("❌ application.broker_capacity must be positive.".to_string()));
    }

    let mut source_names = HashSet::new();
    let mut scratch_dirs = HashSet::new();
    for source in &config.sources {
        check_worker_name("source", &source.name, &mut source_names)?;
        // Each fetch runs rsync --delete into this directory, so no two sources may share it.
        let scratch_dir = source.resolved_scratch_dir(&config.app_settings.scratch_dir);
        if !scratch_dirs.insert(scratch_dir.clone()) {
            return Err(AppError::Config(format!(
                "❌ Source '{}' shares scratch directory '{}' with another source.",
                source.name,
                scratch_dir.display()
            )));
        }
        FetcherKind::parse_for(source)?;
        if source.path.is_empty() {
            return Err(AppError::Config(format!("❌ Remote path for source '{}' cannot be empty.", source.name)));
        }
        if source.interval == 0 {
            return Err(AppError::Config(format!("❌ Interval for source '{}' must be positive.", source.name)));
        }
        let mut destination_names = HashSet::new();
        for destination in &source.destinations {
            check_worker_name("destination", &destination.name, &mut destination_names)?;
            if destination.path.is_empty() {
                return Err(AppError::Config(format!(
                    "❌ Remote path for destination '{}' of source '{}' cannot be empty.",
                    destination.name, source.name
                )));
            }
        }
        debug!("Source '{}' validated successfully.", source.name);
    }

    let mut watcher_names = HashSet::new();
    for watcher in &config.watchers {
        check_worker_name("watcher", &watcher.name, &mut watcher_names)?;
        if WatcherKind::parse_for(watcher)? == WatcherKind::RsyncPusher && watcher.destination.is_none() {
            return Err(AppError::Config(format!(
                "❌ Pusher '{}' needs a destination.",
                watcher.name
            )));
        }
    }

    let mut relay_names = HashSet::new();
    for relay in &config.relays {
        check_worker_name("relay", &relay.name, &mut relay_names)?;
        if relay.interval == 0 {
            return Err(AppError::Config(format!("❌ Interval for relay '{}' must be positive.", relay.name)));
        }
    }

    debug!("👍 Master configuration validated in {:?}.", validation_start_time.elapsed());
    Ok(())
}
