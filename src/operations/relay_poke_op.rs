use crate::common::timestamp_utils;
use crate::config_loader::MasterConfig;
use crate::source_config::RelayConfig;
use anyhow::{Context, Result};
use futures::future::join_all;
use log::{debug, error, info};
use reqwest::Client;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PokeOutcome {
    Poked,
    // These relays answer state.xml with something that isn't valid HTTP, so
    // a connection-level error is what a successful poke usually looks like.
    ConnectionError,
    TimedOut,
    Failed(String),
}

pub fn validate_relay(relay: &RelayConfig) -> bool {
    if relay.minute_offset >= relay.interval {
        error!(
            "Relay [{}]: minute_offset must be smaller than interval ({} >= {})",
            relay.name, relay.minute_offset, relay.interval
        );
        return false;
    }
    if relay.disabled {
        debug!("Relay [{}]: skipping, it's disabled.", relay.name);
        return false;
    }
    true
}

pub fn relay_due(relay: &RelayConfig, minute: u64) -> bool {
    let minute_offset = minute % relay.interval;
    if minute_offset == relay.minute_offset {
        return true;
    }
    debug!(
        "Relay [{}]: skipping, {} % {} == {} not {}",
        relay.name, minute, relay.interval, minute_offset, relay.minute_offset
    );
    false
}

pub fn relay_url(relay: &RelayConfig) -> String {
    format!(
        "http://{}:{}/state.xml?relay{idx}State=2&pulseTime{idx}={}",
        relay.address,
        relay.port,
        relay.pulse_duration,
        idx = relay.relayidx
    )
}

pub async fn poke_relay(client: &Client, relay: &RelayConfig) -> PokeOutcome {
    let url = relay_url(relay);
    debug!("Relay [{}]: poking {}", relay.name, url);
    let response = client
        .get(&url)
        .timeout(Duration::from_secs(relay.timeout))
        .send()
        .await
        .and_then(|r| r.error_for_status());

    match response {
        Ok(_) => {
            info!("⚡ Relay [{}]: poked.", relay.name);
            PokeOutcome::Poked
        }
        Err(e) if e.is_timeout() => {
            info!("Relay [{}]: time-out poking.", relay.name);
            PokeOutcome::TimedOut
        }
        Err(e) if e.is_status() => {
            error!("Relay [{}]: resisted: {}", relay.name, e);
            PokeOutcome::Failed(e.to_string())
        }
        Err(e) if e.is_connect() || e.is_request() => {
            info!(
                "Relay [{}]: connection error. This is normal for state.xml requests, but may hide other problems: {}",
                relay.name, e
            );
            PokeOutcome::ConnectionError
        }
        Err(e) => {
            error!("Relay [{}]: resisted: {}", relay.name, e);
            PokeOutcome::Failed(e.to_string())
        }
    }
}

/// Pokes, concurrently, every valid relay scheduled for `minute` and waits
/// for all of them.
pub async fn poke_due_relays(client: &Client, relays: &[RelayConfig], minute: u64) -> Vec<(String, PokeOutcome)> {
    let due: Vec<&RelayConfig> = relays
        .iter()
        .filter(|relay| validate_relay(relay) && relay_due(relay, minute))
        .collect();

    let pokes = due.iter().map(|relay| {
        let client = client.clone();
        let relay = (*relay).clone();
        tokio::spawn(async move {
            let outcome = poke_relay(&client, &relay).await;
            (relay.name, outcome)
        })
    });

    let mut outcomes = Vec::with_capacity(due.len());
    for (relay, joined) in due.iter().zip(join_all(pokes).await) {
        match joined {
            Ok(result) => outcomes.push(result),
            Err(join_err) => {
                error!("💀 Relay [{}]: poke task failed: {}", relay.name, join_err);
                outcomes.push((relay.name.clone(), PokeOutcome::Failed(join_err.to_string())));
            }
        }
    }
    outcomes
}

pub async fn handle_poke_relays_cli(master_config: &MasterConfig) -> Result<()> {
    let op_start_time = Instant::now();
    let client = Client::builder().build().context("Failed to build HTTP client")?;
    let minute = timestamp_utils::current_epoch_minute();

    let outcomes = poke_due_relays(&client, &master_config.relays, minute).await;
    info!(
        "🏁 Poked {} of {} relay(s) for minute {} in {:?}.",
        outcomes.len(),
        master_config.relays.len(),
        minute,
        op_start_time.elapsed()
    );
    Ok(())
}
