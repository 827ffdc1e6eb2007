//! Tick cadence constants for the simulation loop

use crate::math::Fp;

/// Simulation tick rate. Every participant must step at this cadence for
/// sequence numbers to mean the same wall-clock instant everywhere.
pub const TICKS_PER_SECOND: u32 = 60;
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / TICKS_PER_SECOND as u64;

/// Fixed timestep fed to the physics world, exactly 1/60 s in Q48.16.
pub const FIXED_DT: Fp = Fp::from_ratio(1, TICKS_PER_SECOND as i64);
