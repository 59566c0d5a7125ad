use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApplicationConfig {
    pub backend_endpoint: String,  // producers (fetchers) connect here
    pub frontend_endpoint: String, // consumers (watchers, pushers) connect here
    pub scratch_dir: PathBuf,      // base for per-source scratch directories
    pub log_level: Option<String>,
    pub broker_capacity: usize, // frames buffered per subscriber before the oldest are dropped
    pub shutdown_grace_secs: u64,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        ApplicationConfig {
            backend_endpoint: "tcp://127.0.0.1:5559".to_string(),
            frontend_endpoint: "tcp://127.0.0.1:5560".to_string(),
            scratch_dir: PathBuf::from("./scratch"),
            log_level: Some("info".to_string()),
            broker_capacity: 1024,
            shutdown_grace_secs: 5,
        }
    }
}
