use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Unknown {worker} type '{kind}' for '{name}'")]
    UnknownWorkerType { worker: &'static str, kind: String, name: String },

    #[error("Invalid endpoint '{0}'")]
    Endpoint(String),

    #[error("Failed to bind {side} endpoint {endpoint}: {details}")]
    Bind { side: &'static str, endpoint: String, details: String },

    #[error("Failed to connect to {endpoint}: {details}")]
    Connect { endpoint: String, details: String },

    #[error("Transfer Error [{target}]: {details}")]
    Transfer { target: String, details: String },

    #[error("Wire Format Error: {0}")]
    Wire(String),

    #[error("File I/O Error: {0}")]
    Io(String),
}

// Allow conversion from std::io::Error to AppError::Io
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Wire(err.to_string())
    }
}
