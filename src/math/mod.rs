//! Deterministic fixed-point math shared by simulation and physics

pub mod fp;
pub mod quat;
pub mod transform;
pub mod vec;

pub use fp::Fp;
pub use quat::FpQuat;
pub use transform::FpTransform;
pub use vec::{FpVec2, FpVec3};
