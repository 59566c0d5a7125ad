use crate::errors::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SUBSCRIBE_VERB: &str = "SUB";
pub const SUBSCRIBE_ACK: &str = "ACK";

/// One new artifact seen on one source. Only identity crosses the broker,
/// never image bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub source: String,
    pub artifact: String,
    pub observed_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(source: impl Into<String>, artifact: impl Into<String>) -> Self {
        Notification {
            source: source.into(),
            artifact: artifact.into(),
            observed_at: Utc::now(),
        }
    }

    /// `<source> <json>`. The leading source name is what subscription
    /// prefixes match against. Never contains a newline.
    pub fn to_frame(&self) -> Result<String, AppError> {
        Ok(format!("{} {}", self.source, serde_json::to_string(self)?))
    }

    pub fn from_frame(frame: &str) -> Result<Self, AppError> {
        let (topic, body) = frame
            .split_once(' ')
            .ok_or_else(|| AppError::Wire(format!("frame without topic: '{}'", frame)))?;
        let notification: Notification = serde_json::from_str(body)?;
        if notification.source != topic {
            return Err(AppError::Wire(format!(
                "topic '{}' does not match source '{}'",
                topic, notification.source
            )));
        }
        Ok(notification)
    }
}

pub fn subscribe_line(prefix: &str) -> String {
    format!("{} {}", SUBSCRIBE_VERB, prefix)
}

/// Returns the subscription prefix carried by a handshake line.
pub fn parse_subscribe_line(line: &str) -> Option<&str> {
    if line == SUBSCRIBE_VERB {
        return Some("");
    }
    line.strip_prefix(SUBSCRIBE_VERB)?.strip_prefix(' ')
}
