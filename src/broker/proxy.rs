use crate::broker::endpoint::Endpoint;
use crate::broker::wire::{parse_subscribe_line, SUBSCRIBE_ACK};
use crate::errors::AppError;
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const ACCEPT_RETRY_PAUSE: Duration = Duration::from_millis(100);

// One frame as it goes back on the wire, trailing newline included. Never
// decoded here: producers may send any bytes.
type Frame = Arc<[u8]>;

/// Binds the two broker endpoints and forwards frames from every producer to
/// every matching subscriber.
pub struct TransportProxy;

impl TransportProxy {
    /// Binds both endpoints and starts forwarding. A bind failure is returned
    /// straight away; it is a configuration problem, not something to retry.
    pub async fn start(
        backend: &Endpoint,
        frontend: &Endpoint,
        capacity: usize,
        shutdown: CancellationToken,
    ) -> Result<ProxyHandle, AppError> {
        let start_time = Instant::now();
        let backend_listener = bind("backend", backend).await?;
        let frontend_listener = bind("frontend", frontend).await?;
        let backend_addr = backend_listener.local_addr()?;
        let frontend_addr = frontend_listener.local_addr()?;

        let (frames_tx, _) = broadcast::channel::<Frame>(capacity.max(1));
        let proxy_token = shutdown.child_token();

        let backend_task = tokio::spawn(accept_producers(
            backend_listener,
            frames_tx.clone(),
            proxy_token.clone(),
        ));
        let frontend_task = tokio::spawn(accept_subscribers(
            frontend_listener,
            frames_tx,
            proxy_token.clone(),
        ));

        info!(
            "📡 Broker up: producers -> {}, subscribers -> {} (started in {:?})",
            backend_addr,
            frontend_addr,
            start_time.elapsed()
        );
        Ok(ProxyHandle {
            backend_addr,
            frontend_addr,
            token: proxy_token,
            backend_task,
            frontend_task,
        })
    }
}

async fn bind(side: &'static str, endpoint: &Endpoint) -> Result<TcpListener, AppError> {
    TcpListener::bind(endpoint.socket_addr())
        .await
        .map_err(|e| AppError::Bind {
            side,
            endpoint: endpoint.to_string(),
            details: e.to_string(),
        })
}

#[derive(Debug)]
pub struct ProxyHandle {
    backend_addr: SocketAddr,
    frontend_addr: SocketAddr,
    token: CancellationToken,
    backend_task: JoinHandle<()>,
    frontend_task: JoinHandle<()>,
}

impl ProxyHandle {
    /// The address producers should connect to (useful when bound to port 0).
    pub fn backend_endpoint(&self) -> Endpoint {
        Endpoint::new(self.backend_addr.ip().to_string(), self.backend_addr.port())
    }

    pub fn frontend_endpoint(&self) -> Endpoint {
        Endpoint::new(self.frontend_addr.ip().to_string(), self.frontend_addr.port())
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Resolves once the proxy has stopped and every producer and subscriber
    /// session has closed its socket. A panicked listener counts as a
    /// failure; its sibling is stopped too.
    pub async fn await_termination(self) -> Result<(), AppError> {
        let ProxyHandle { token, backend_task, frontend_task, .. } = self;
        let watch = |task: JoinHandle<()>, side: &'static str, token: CancellationToken| async move {
            let result = task.await;
            token.cancel();
            result.map_err(|e| AppError::Io(format!("broker {} listener died: {}", side, e)))
        };
        let (backend, frontend) = tokio::join!(
            watch(backend_task, "backend", token.clone()),
            watch(frontend_task, "frontend", token),
        );
        backend.and(frontend)?;
        info!("📴 Broker stopped.");
        Ok(())
    }
}

async fn accept_producers(listener: TcpListener, frames_tx: broadcast::Sender<Frame>, token: CancellationToken) {
    let mut sessions = JoinSet::new();
    loop {
        let accepted = tokio::select! {
            _ = token.cancelled() => break,
            Some(_) = sessions.join_next(), if !sessions.is_empty() => continue,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => {
                debug!("Broker: producer connected from {}", peer);
                sessions.spawn(forward_producer(stream, peer, frames_tx.clone(), token.clone()));
            }
            Err(e) => {
                warn!("Broker: failed to accept producer: {}", e);
                tokio::time::sleep(ACCEPT_RETRY_PAUSE).await;
            }
        }
    }
    drop(listener);
    while sessions.join_next().await.is_some() {}
    debug!("Broker: producer listener closed.");
}

async fn forward_producer(
    stream: TcpStream,
    peer: SocketAddr,
    frames_tx: broadcast::Sender<Frame>,
    token: CancellationToken,
) {
    let mut reader = BufReader::new(stream);
    let mut buf: Vec<u8> = Vec::new();
    let mut forwarded: u64 = 0;
    loop {
        buf.clear();
        let read = tokio::select! {
            _ = token.cancelled() => break,
            read = reader.read_until(b'\n', &mut buf) => read,
        };
        match read {
            Ok(0) => break,
            Ok(_) => {
                if buf.last() != Some(&b'\n') {
                    buf.push(b'\n');
                }
                if buf.len() == 1 {
                    continue;
                }
                // No subscribers means nobody to forward to; the frame is dropped.
                if frames_tx.send(Frame::from(buf.as_slice())).is_err() {
                    debug!("Broker: no subscribers, dropped frame from {}", peer);
                }
                forwarded += 1;
            }
            Err(e) => {
                warn!("Broker: producer {} read error: {}", peer, e);
                break;
            }
        }
    }
    debug!("Broker: producer {} disconnected after {} frames.", peer, forwarded);
}

async fn accept_subscribers(listener: TcpListener, frames_tx: broadcast::Sender<Frame>, token: CancellationToken) {
    let mut sessions = JoinSet::new();
    loop {
        let accepted = tokio::select! {
            _ = token.cancelled() => break,
            Some(_) = sessions.join_next(), if !sessions.is_empty() => continue,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => {
                debug!("Broker: subscriber connected from {}", peer);
                sessions.spawn(serve_subscriber(stream, peer, frames_tx.clone(), token.clone()));
            }
            Err(e) => {
                warn!("Broker: failed to accept subscriber: {}", e);
                tokio::time::sleep(ACCEPT_RETRY_PAUSE).await;
            }
        }
    }
    drop(listener);
    while sessions.join_next().await.is_some() {}
    debug!("Broker: subscriber listener closed.");
}

async fn serve_subscriber(
    stream: TcpStream,
    peer: SocketAddr,
    frames_tx: broadcast::Sender<Frame>,
    token: CancellationToken,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let handshake = tokio::select! {
        _ = token.cancelled() => return,
        read = tokio::time::timeout(HANDSHAKE_TIMEOUT, lines.next_line()) => read,
    };
    let handshake = match handshake {
        Ok(Ok(Some(line))) => line,
        Ok(Ok(None)) => return,
        Ok(Err(e)) => {
            warn!("Broker: subscriber {} handshake read failed: {}", peer, e);
            return;
        }
        Err(_) => {
            warn!("Broker: subscriber {} sent no subscription within {:?}", peer, HANDSHAKE_TIMEOUT);
            return;
        }
    };
    let prefix = match parse_subscribe_line(&handshake) {
        Some(prefix) => prefix.to_string(),
        None => {
            warn!("Broker: subscriber {} sent a bad handshake: '{}'", peer, handshake);
            return;
        }
    };

    // Subscribe before acknowledging so nothing published after the ACK is missed.
    let mut frames_rx = frames_tx.subscribe();
    drop(frames_tx);
    if let Err(e) = write_half.write_all(format!("{}\n", SUBSCRIBE_ACK).as_bytes()).await {
        warn!("Broker: subscriber {} went away during handshake: {}", peer, e);
        return;
    }
    info!("🔔 Broker: subscriber {} listening for '{}'", peer, prefix);

    loop {
        let received = tokio::select! {
            _ = token.cancelled() => break,
            received = frames_rx.recv() => received,
        };
        match received {
            Ok(frame) => {
                if !frame.starts_with(prefix.as_bytes()) {
                    continue;
                }
                // A subscriber that stopped reading must not hold up shutdown.
                let written = tokio::select! {
                    _ = token.cancelled() => break,
                    written = write_half.write_all(&frame) => written,
                };
                if let Err(e) = written {
                    debug!("Broker: subscriber {} disconnected: {}", peer, e);
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Broker: subscriber {} fell behind, {} frames dropped", peer, skipped);
            }
            Err(broadcast::error::RecvError::Closed) => {
                error!("Broker: frame channel closed under subscriber {}", peer);
                break;
            }
        }
    }
    debug!("Broker: subscriber {} session ended.", peer);
}
