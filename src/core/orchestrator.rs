use crate::broker::{Endpoint, ProxyHandle, TransportProxy};
use crate::common::logging_setup;
use crate::config_loader::{self, MasterConfig};
use crate::core::transfer_agent::{RsyncAgent, TransferAgent};
use crate::fetcher::fetcher_factory;
use crate::watcher::watcher_factory;
use anyhow::{Context, Result};
use futures::future::join_all;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const CONFIG_RETRY_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    LoadingConfig,
    StartingBroker,
    StartingWorkers,
    Running,
    ShuttingDown,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OrchestratorState::LoadingConfig => "LOADING_CONFIG",
            OrchestratorState::StartingBroker => "STARTING_BROKER",
            OrchestratorState::StartingWorkers => "STARTING_WORKERS",
            OrchestratorState::Running => "RUNNING",
            OrchestratorState::ShuttingDown => "SHUTTING_DOWN",
        };
        f.write_str(label)
    }
}

/// A long-lived worker task and the name it logs under.
struct SupervisedWorker {
    name: String,
    handle: JoinHandle<()>,
}

/// Owns the daemon's lifecycle: config, broker, watchers, fetchers, shutdown.
pub struct Orchestrator {
    config_path: PathBuf,
    debug: bool,
    state: OrchestratorState,
    config_backoff: Duration,
    agent: Arc<dyn TransferAgent>,
    shutdown: CancellationToken,
}

impl Orchestrator {
    pub fn new(config_path: PathBuf, debug: bool) -> Self {
        Orchestrator {
            config_path,
            debug,
            state: OrchestratorState::LoadingConfig,
            config_backoff: CONFIG_RETRY_BACKOFF,
            agent: Arc::new(RsyncAgent::new()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_agent(mut self, agent: Arc<dyn TransferAgent>) -> Self {
        self.agent = agent;
        self
    }

    pub fn with_config_backoff(mut self, backoff: Duration) -> Self {
        self.config_backoff = backoff;
        self
    }

    /// Cancelling this token moves a running orchestrator to SHUTTING_DOWN.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn transition(&mut self, next: OrchestratorState) {
        info!("🔀 Orchestrator: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Runs until the shutdown token is cancelled or the broker dies. Errors
    /// returned from here are startup failures or a broker failure.
    pub async fn run(mut self) -> Result<()> {
        let shutdown = self.shutdown.clone();
        let config_path = self.config_path.clone();
        let loaded = tokio::select! {
            _ = shutdown.cancelled() => None,
            loaded = config_loader::wait_for_config(&config_path, self.config_backoff) => Some(loaded),
        };
        let Some(loaded) = loaded else {
            self.transition(OrchestratorState::ShuttingDown);
            return Ok(());
        };
        let config = loaded
            .with_context(|| format!("Failed to load configuration from '{}'", self.config_path.display()))?;
        logging_setup::apply_config_level(&config.app_settings, self.debug);

        self.transition(OrchestratorState::StartingBroker);
        let proxy = self.start_broker(&config).await?;

        self.transition(OrchestratorState::StartingWorkers);
        let workers = match self.start_workers(&config, &proxy).await {
            Ok(workers) => workers,
            Err(e) => {
                // Stops the broker and any worker already started.
                self.shutdown.cancel();
                return Err(e);
            }
        };

        self.transition(OrchestratorState::Running);
        let broker_stopped = proxy.await_termination();
        tokio::pin!(broker_stopped);
        let broker_result = tokio::select! {
            _ = self.shutdown.cancelled() => None,
            result = &mut broker_stopped => Some(result),
        };

        self.transition(OrchestratorState::ShuttingDown);
        self.shutdown.cancel();
        let grace = Duration::from_secs(config.app_settings.shutdown_grace_secs);
        self.join_workers(workers, grace).await;

        match broker_result {
            Some(result) => {
                result.context("Broker terminated")?;
                warn!("Broker stopped on its own; shutting down.");
                Ok(())
            }
            None => {
                broker_stopped.await.context("Broker failed during shutdown")?;
                info!("🏁 Orchestrator: shutdown complete.");
                Ok(())
            }
        }
    }

    async fn start_broker(&self, config: &MasterConfig) -> Result<ProxyHandle> {
        let backend: Endpoint = config.app_settings.backend_endpoint.parse()?;
        let frontend: Endpoint = config.app_settings.frontend_endpoint.parse()?;
        let proxy = TransportProxy::start(
            &backend,
            &frontend,
            config.app_settings.broker_capacity,
            self.shutdown.clone(),
        )
        .await
        .context("Failed to start broker")?;
        Ok(proxy)
    }

    async fn start_workers(&self, config: &MasterConfig, proxy: &ProxyHandle) -> Result<Vec<SupervisedWorker>> {
        let start_time = Instant::now();
        let backend = proxy.backend_endpoint();
        let frontend = proxy.frontend_endpoint();
        let scratch_base = &config.app_settings.scratch_dir;
        let scratch_dirs: Arc<HashMap<String, PathBuf>> = Arc::new(
            config
                .sources
                .iter()
                .map(|source| (source.name.clone(), source.resolved_scratch_dir(scratch_base)))
                .collect(),
        );
        let mut workers = Vec::with_capacity(config.watchers.len() + config.sources.len());

        // Watchers first so nothing the first fetch cycles publish is missed.
        for watcher_config in &config.watchers {
            let mut worker = watcher_factory(
                watcher_config,
                &frontend,
                Arc::clone(&scratch_dirs),
                Arc::clone(&self.agent),
            )
            .await
            .with_context(|| format!("Failed to start watcher '{}'", watcher_config.name))?;
            let token = self.shutdown.child_token();
            workers.push(SupervisedWorker {
                name: watcher_config.name.clone(),
                handle: tokio::spawn(async move { worker.start(token).await }),
            });
        }

        for source in &config.sources {
            let mut fetcher = fetcher_factory(source, scratch_base, &backend, Arc::clone(&self.agent))
                .await
                .with_context(|| format!("Failed to start fetcher for source '{}'", source.name))?;
            let token = self.shutdown.child_token();
            workers.push(SupervisedWorker {
                name: source.name.clone(),
                handle: tokio::spawn(async move { fetcher.start(token).await }),
            });
        }

        info!(
            "🚀 Started {} watcher(s) and {} fetcher(s) in {:?}.",
            config.watchers.len(),
            config.sources.len(),
            start_time.elapsed()
        );
        Ok(workers)
    }

    async fn join_workers(&self, workers: Vec<SupervisedWorker>, grace: Duration) {
        debug!("Waiting up to {:?} for {} worker(s) to stop.", grace, workers.len());
        let (names, handles): (Vec<String>, Vec<JoinHandle<()>>) =
            workers.into_iter().map(|w| (w.name, w.handle)).unzip();
        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

        match tokio::time::timeout(grace, join_all(handles)).await {
            Ok(results) => {
                for (name, result) in names.iter().zip(results) {
                    if let Err(e) = result {
                        error!("💀 Worker '{}' ended abnormally: {}", name, e);
                    }
                }
            }
            Err(_) => {
                warn!("⚠️ Workers did not stop within {:?}; aborting them.", grace);
                for abort in aborts {
                    abort.abort();
                }
            }
        }
    }
}
