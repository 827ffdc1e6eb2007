//! Authority/replica lockstep over sequence-addressed frames

pub mod client;
pub mod director;
pub mod server;
pub mod store;

use crate::core::CoreError;

pub use client::{ClientSync, ClientTick};
pub use director::{DirectorConfig, RoundDirector};
pub use server::Authority;
pub use store::{AuthFrame, CoreSnapshot, InputFrame, MemStore, StoreError, SyncStore};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Cadence and drift thresholds shared by both ends of the protocol.
#[derive(Clone, Copy, Debug)]
pub struct SyncConfig {
    /// Ticks between authority snapshot re-derivations.
    pub batch_interval: u32,
    /// Ticks between auth-frame broadcasts.
    pub broadcast_interval: u32,
    /// Wall-clock slack before the broadcast cadence warns, in milliseconds.
    pub broadcast_slack_ms: u64,
    /// A replica further behind than this requests a snapshot.
    pub max_behind: u16,
    /// Catch-up smoothing: replay `1 + backlog / divisor` frames per tick.
    pub catchup_divisor: u16,
    /// Hard cap on frames replayed in one replica tick.
    pub max_replay_per_tick: u16,
}

impl Default for SyncConfig {
    fn default() -> SyncConfig {
        SyncConfig {
            batch_interval: 32,
            broadcast_interval: 4,
            broadcast_slack_ms: 250,
            max_behind: 240,
            catchup_divisor: 8,
            max_replay_per_tick: 32,
        }
    }
}
