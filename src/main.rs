//! Marble Arena Lockstep Harness - headless demonstration run
//!
//! Spins up one authority and two replicas over an in-memory store,
//! ticks them at the simulation rate, and reports hash agreement at the
//! end. One replica goes deaf to broadcasts for a stretch in the middle
//! of the run to exercise snapshot recovery.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use marble_core::arena::{standard_catalog, BASIN, GAUNTLET};
use marble_core::config::Config;
use marble_core::core::Entrant;
use marble_core::sync::{Authority, ClientSync, ClientTick, MemStore, RoundDirector};
use marble_core::util::time::{TICKS_PER_SECOND, TICK_DURATION_MICROS};

/// End-of-run report, printed as one JSON line.
#[derive(Serialize)]
struct RunSummary {
    ticks: u64,
    authority_seq: u16,
    replica_seqs: Vec<u16>,
    replica_hashes: Vec<String>,
    resyncs: u32,
    scores: BTreeMap<String, u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    info!("Starting marble arena lockstep harness");

    tokio::select! {
        result = run(config) => result?,
        _ = shutdown_signal() => {
            info!("Shutdown requested, stopping early");
        }
    }

    info!("Harness shutdown complete");
    Ok(())
}

async fn run(config: Config) -> anyhow::Result<()> {
    let catalog = Arc::new(standard_catalog());
    let mut director = RoundDirector::new(config.director(), catalog.len() as u16);
    let players = vec![
        Entrant {
            user: Uuid::new_v4(),
            display_name: "ada".to_string(),
        },
        Entrant {
            user: Uuid::new_v4(),
            display_name: "lin".to_string(),
        },
        Entrant {
            user: Uuid::new_v4(),
            display_name: "mo".to_string(),
        },
    ];
    director.set_roster(0, players.clone());
    director.set_roster(1, players);

    let sync = config.sync();
    let mut authority = Authority::new(
        catalog.clone(),
        [BASIN, GAUNTLET],
        MemStore::new(),
        sync,
        director,
    )?;
    let boot = authority
        .latest_snapshot()?
        .ok_or_else(|| anyhow::anyhow!("authority wrote no bootstrap snapshot"))?;
    let mut clients = vec![
        ClientSync::new(&boot, catalog.clone(), sync)?,
        ClientSync::new(&boot, catalog, sync)?,
    ];

    let total_ticks = config.run_seconds * TICKS_PER_SECOND as u64;
    // replica 1 ignores broadcasts for this window
    let lag_start = total_ticks / 3;
    let lag_end = lag_start + config.lag_ticks as u64;
    info!(
        total_ticks,
        lag_start, lag_end, "running two replicas against the authority"
    );

    let mut ticker = interval(Duration::from_micros(TICK_DURATION_MICROS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut resyncs = 0u32;
    for tick in 0..total_ticks {
        ticker.tick().await;

        if let Some(bundle) = authority.on_tick()? {
            for (i, client) in clients.iter_mut().enumerate() {
                if i == 1 && (lag_start..lag_end).contains(&tick) {
                    continue;
                }
                client.on_auth_frame(&bundle);
            }
        }

        for (i, client) in clients.iter_mut().enumerate() {
            match client.on_tick() {
                ClientTick::SnapshotRequested => {
                    let snap = authority
                        .latest_snapshot()?
                        .ok_or_else(|| anyhow::anyhow!("no snapshot to serve"))?;
                    client.install_snapshot(&snap)?;
                    resyncs += 1;
                    info!(client = i, seq = %client.seq(), "replica resynced from snapshot");
                }
                ClientTick::Stepped { outputs, .. } => {
                    for event in outputs {
                        debug!(client = i, event = ?event, "presentation event");
                    }
                }
                ClientTick::Idle | ClientTick::WaitingForSnapshot => {}
            }
        }

        if tick % 600 == 0 && tick > 0 {
            info!(
                tick,
                authority = %authority.seq(),
                replica_0 = %clients[0].seq(),
                replica_1 = %clients[1].seq(),
                "progress"
            );
        }
    }

    // let the replicas drain their buffers before comparing state
    for _ in 0..64 {
        let mut all_idle = true;
        for client in clients.iter_mut() {
            match client.on_tick() {
                ClientTick::Idle => {}
                ClientTick::SnapshotRequested => {
                    let snap = authority
                        .latest_snapshot()?
                        .ok_or_else(|| anyhow::anyhow!("no snapshot to serve"))?;
                    client.install_snapshot(&snap)?;
                    resyncs += 1;
                    all_idle = false;
                }
                _ => all_idle = false,
            }
        }
        if all_idle {
            break;
        }
    }

    if clients[0].seq() == clients[1].seq() {
        if clients[0].core().state_hash() == clients[1].core().state_hash() {
            info!(
                seq = %clients[0].seq(),
                hash = %clients[0].core().hash_hex(),
                "replicas agree bit for bit"
            );
        } else {
            warn!(seq = %clients[0].seq(), "replica hashes diverged at equal sequence");
        }
    } else {
        warn!(
            replica_0 = %clients[0].seq(),
            replica_1 = %clients[1].seq(),
            "replicas ended on different sequences"
        );
    }

    let summary = RunSummary {
        ticks: total_ticks,
        authority_seq: authority.seq().0,
        replica_seqs: clients.iter().map(|c| c.seq().0).collect(),
        replica_hashes: clients.iter().map(|c| c.core().hash_hex()).collect(),
        resyncs,
        scores: authority
            .director()
            .scores()
            .iter()
            .map(|(user, points)| (user.to_string(), *points))
            .collect(),
    };
    info!(summary = %serde_json::to_string(&summary)?, "run complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
