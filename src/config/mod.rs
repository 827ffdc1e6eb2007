//! Configuration module - environment variable parsing

use std::env;
use std::str::FromStr;

use crate::sync::{DirectorConfig, SyncConfig};

/// Harness configuration loaded from environment variables. Every value
/// has a default, so a bare run works.
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// How long the harness runs, in seconds
    pub run_seconds: u64,
    /// Seed for the director's template roulette
    pub seed: u64,

    /// Ticks between authority snapshot re-derivations
    pub batch_interval: u32,
    /// Ticks between auth-frame broadcasts
    pub broadcast_interval: u32,
    /// Wall-clock slack before the broadcast cadence warns, in ms
    pub broadcast_slack_ms: u64,
    /// Replica drift threshold in ticks
    pub max_behind: u16,
    /// Replica catch-up smoothing divisor
    pub catchup_divisor: u16,
    /// Hard cap on frames a replica replays per tick
    pub max_replay_per_tick: u16,

    /// Ticks after a spin settles before doors arm
    pub door_delay: u32,
    /// Ticks after doors arm before gameplay opens
    pub gameplay_delay: u32,
    /// Ticks after a round ends before the next spin
    pub respin_delay: u32,

    /// Ticks the laggy harness client ignores broadcasts for
    pub lag_ticks: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            run_seconds: parse_var("RUN_SECONDS", 10)?,
            seed: parse_var("DIRECTOR_SEED", 0)?,

            batch_interval: parse_var("BATCH_INTERVAL", 32)?,
            broadcast_interval: parse_var("BROADCAST_INTERVAL", 4)?,
            broadcast_slack_ms: parse_var("BROADCAST_SLACK_MS", 250)?,
            max_behind: parse_var("MAX_BEHIND", 240)?,
            catchup_divisor: parse_var("CATCHUP_DIVISOR", 8)?,
            max_replay_per_tick: parse_var("MAX_REPLAY_PER_TICK", 32)?,

            door_delay: parse_var("DOOR_DELAY", 30)?,
            gameplay_delay: parse_var("GAMEPLAY_DELAY", 300)?,
            respin_delay: parse_var("RESPIN_DELAY", 420)?,

            lag_ticks: parse_var("LAG_TICKS", 240)?,
        })
    }

    pub fn sync(&self) -> SyncConfig {
        SyncConfig {
            batch_interval: self.batch_interval,
            broadcast_interval: self.broadcast_interval,
            broadcast_slack_ms: self.broadcast_slack_ms,
            max_behind: self.max_behind,
            catchup_divisor: self.catchup_divisor,
            max_replay_per_tick: self.max_replay_per_tick,
        }
    }

    pub fn director(&self) -> DirectorConfig {
        DirectorConfig {
            door_delay: self.door_delay,
            gameplay_delay: self.gameplay_delay,
            respin_delay: self.respin_delay,
            seed: self.seed,
        }
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}
