//! Fixed-point 2D physics behind a narrow deterministic contract
//!
//! The simulation only ever talks to [`World`] through add/remove/get and
//! [`World::step`]; everything else in here is implementation detail. That
//! keeps the solver swappable without touching tile logic.

pub mod body;
mod collide;
pub mod world;

pub use body::{Body, BodyHandle, BodyKind, Shape};
pub use world::{StepContext, World};
