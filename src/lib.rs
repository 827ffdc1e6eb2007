//! Deterministic marble-arena simulation core with lockstep sync.
//!
//! The crate splits into a deterministic half and a protocol half. The
//! deterministic half is fixed-point math (`math`), a component scene
//! tree (`scene`), an impulse physics solver (`physics`), the tile
//! pipeline and round flow (`tile`), and the two-slot aggregate
//! (`core`); given the same snapshot and the same ordered inputs, every
//! replica of it is bit-identical, which SHA-256 state hashes verify.
//! The protocol half (`wire`, `sync`) moves that state between an
//! authority and replicas as sequence-addressed frames with snapshot
//! recovery. `arena` ships the authored demo tiles the harness and
//! tests run on.

pub mod arena;
pub mod config;
pub mod core;
pub mod math;
pub mod physics;
pub mod scene;
pub mod sync;
pub mod tile;
pub mod util;
pub mod wire;
