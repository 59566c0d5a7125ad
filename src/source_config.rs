use crate::errors::AppError;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

fn default_interval() -> u64 {
    60
}

fn default_relay_port() -> u16 {
    80
}

fn default_relay_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub address: Option<String>, // ssh host; falls back to `name` like an ~/.ssh/config alias
    pub user: Option<String>,
    pub ssh_key: Option<PathBuf>,
    pub path: String,
    pub scratch_dir: Option<PathBuf>,
    pub retention: Option<u32>, // days
    #[serde(default = "default_interval")]
    pub interval: u64, // seconds between retrieval cycles
    #[serde(default)]
    pub destinations: Vec<DestinationConfig>,
}

impl SourceConfig {
    pub fn resolved_scratch_dir(&self, scratch_base: &Path) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| scratch_base.join(&self.name))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DestinationConfig {
    pub name: String,
    pub address: Option<String>,
    pub user: Option<String>,
    pub ssh_key: Option<PathBuf>,
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatcherConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub topic: String, // subscription prefix, empty receives everything
    pub destination: Option<DestinationConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    pub name: String,
    pub address: String,
    #[serde(default = "default_relay_port")]
    pub port: u16,
    pub relayidx: u32,
    pub pulse_duration: f32,
    pub interval: u64,      // minutes
    pub minute_offset: u64, // must be < interval
    #[serde(default = "default_relay_timeout")]
    pub timeout: u64, // seconds
    #[serde(default)]
    pub disabled: bool,
}

/// Anything rsync/ssh can reach: a source camera host or a destination mirror.
pub trait RemoteLocation {
    fn name(&self) -> &str;
    fn address(&self) -> Option<&str>;
    fn user(&self) -> Option<&str>;
    fn ssh_key(&self) -> Option<&Path>;
    fn remote_path(&self) -> &str;

    /// `[user@]host`
    fn ssh_target(&self) -> String {
        let host = self.address().unwrap_or_else(|| self.name());
        match self.user() {
            Some(user) => format!("{}@{}", user, host),
            None => host.to_string(),
        }
    }

    /// `[user@]host:path`, the form rsync expects for a remote side.
    fn rsync_spec(&self) -> String {
        format!("{}:{}", self.ssh_target(), self.remote_path())
    }

    fn ssh_args(&self) -> Vec<String> {
        match self.ssh_key() {
            Some(key) => vec!["-i".to_string(), key.display().to_string()],
            None => Vec::new(),
        }
    }
}

impl RemoteLocation for SourceConfig {
    fn name(&self) -> &str {
        &self.name
    }
    fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }
    fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }
    fn ssh_key(&self) -> Option<&Path> {
        self.ssh_key.as_deref()
    }
    fn remote_path(&self) -> &str {
        &self.path
    }
}

impl RemoteLocation for DestinationConfig {
    fn name(&self) -> &str {
        &self.name
    }
    fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }
    fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }
    fn ssh_key(&self) -> Option<&Path> {
        self.ssh_key.as_deref()
    }
    fn remote_path(&self) -> &str {
        &self.path
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetcherKind {
    Rsync,
}

impl FetcherKind {
    pub fn parse_for(config: &SourceConfig) -> Result<Self, AppError> {
        config.kind.parse().map_err(|_| AppError::UnknownWorkerType {
            worker: "fetcher",
            kind: config.kind.clone(),
            name: config.name.clone(),
        })
    }
}

impl FromStr for FetcherKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rsync" => Ok(FetcherKind::Rsync),
            _ => Err(()),
        }
    }
}

impl fmt::Display for FetcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetcherKind::Rsync => write!(f, "rsync"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherKind {
    Console,
    RsyncPusher,
}

impl WatcherKind {
    pub fn parse_for(config: &WatcherConfig) -> Result<Self, AppError> {
        config.kind.parse().map_err(|_| AppError::UnknownWorkerType {
            worker: "watcher",
            kind: config.kind.clone(),
            name: config.name.clone(),
        })
    }
}

impl FromStr for WatcherKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "console" => Ok(WatcherKind::Console),
            "rsync" => Ok(WatcherKind::RsyncPusher),
            _ => Err(()),
        }
    }
}

impl fmt::Display for WatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatcherKind::Console => write!(f, "console"),
            WatcherKind::RsyncPusher => write!(f, "rsync"),
        }
    }
}
