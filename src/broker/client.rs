use crate::broker::endpoint::Endpoint;
use crate::broker::wire::{subscribe_line, Notification, SUBSCRIBE_ACK};
use crate::errors::AppError;
use async_trait::async_trait;
use log::{debug, warn};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

const ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a fetcher sends its notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&mut self, notification: &Notification) -> Result<(), AppError>;
}

async fn connect(endpoint: &Endpoint) -> Result<TcpStream, AppError> {
    TcpStream::connect(endpoint.socket_addr())
        .await
        .map_err(|e| AppError::Connect {
            endpoint: endpoint.to_string(),
            details: e.to_string(),
        })
}

/// Publishing side of the broker: connects to the back-end endpoint.
#[derive(Debug)]
pub struct BrokerPublisher {
    endpoint: Endpoint,
    stream: TcpStream,
}

impl BrokerPublisher {
    pub async fn connect(endpoint: &Endpoint) -> Result<Self, AppError> {
        let stream = connect(endpoint).await?;
        debug!("Publisher connected to broker at {}", endpoint);
        Ok(BrokerPublisher {
            endpoint: endpoint.clone(),
            stream,
        })
    }

    async fn write_frame(&mut self, line: &str) -> std::io::Result<()> {
        self.stream.write_all(line.as_bytes()).await
    }
}

#[async_trait]
impl NotificationSink for BrokerPublisher {
    async fn publish(&mut self, notification: &Notification) -> Result<(), AppError> {
        let line = format!("{}\n", notification.to_frame()?);
        if let Err(first) = self.write_frame(&line).await {
            // One reconnect attempt covers a broker that restarted underneath us.
            warn!("Publisher lost broker at {} ({}), reconnecting once.", self.endpoint, first);
            self.stream = connect(&self.endpoint).await?;
            self.write_frame(&line).await?;
        }
        Ok(())
    }
}

/// Subscribing side of the broker: connects to the front-end endpoint.
#[derive(Debug)]
pub struct BrokerSubscriber {
    reader: BufReader<OwnedReadHalf>,
    _write_half: OwnedWriteHalf,
}

impl BrokerSubscriber {
    /// Connects and waits until the broker confirms the subscription, so
    /// everything published after this returns is delivered.
    pub async fn connect(endpoint: &Endpoint, prefix: &str) -> Result<Self, AppError> {
        let stream = connect(endpoint).await?;
        let (read_half, mut write_half) = stream.into_split();
        let handshake_err = |details: String| AppError::Connect {
            endpoint: endpoint.to_string(),
            details,
        };

        write_half
            .write_all(format!("{}\n", subscribe_line(prefix)).as_bytes())
            .await
            .map_err(|e| handshake_err(e.to_string()))?;

        let mut reader = BufReader::new(read_half);
        let mut ack = String::new();
        match tokio::time::timeout(ACK_TIMEOUT, reader.read_line(&mut ack)).await {
            Ok(Ok(0)) => return Err(handshake_err("broker closed during handshake".to_string())),
            Ok(Ok(_)) if ack.trim_end() == SUBSCRIBE_ACK => {}
            Ok(Ok(_)) => return Err(handshake_err(format!("unexpected handshake reply '{}'", ack.trim_end()))),
            Ok(Err(e)) => return Err(handshake_err(e.to_string())),
            Err(_) => return Err(handshake_err(format!("no subscription ack within {:?}", ACK_TIMEOUT))),
        }
        debug!("Subscribed to broker at {} with prefix '{}'", endpoint, prefix);

        Ok(BrokerSubscriber {
            reader,
            _write_half: write_half,
        })
    }

    /// Next notification, or `None` once the broker closed the connection.
    /// A frame that isn't a valid notification is an [`AppError::Wire`]; the
    /// connection stays usable after it.
    pub async fn recv(&mut self) -> Result<Option<Notification>, AppError> {
        let mut frame = Vec::new();
        if self.reader.read_until(b'\n', &mut frame).await? == 0 {
            return Ok(None);
        }
        if frame.last() == Some(&b'\n') {
            frame.pop();
        }
        let frame = std::str::from_utf8(&frame).map_err(|e| AppError::Wire(format!("frame is not UTF-8: {}", e)))?;
        Notification::from_frame(frame).map(Some)
    }
}

/// A sink that only logs, for one-shot runs without a broker.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn publish(&mut self, notification: &Notification) -> Result<(), AppError> {
        debug!("Would publish {} from {}", notification.artifact, notification.source);
        Ok(())
    }
}
