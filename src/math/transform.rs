//! Local transform and parent/child composition

use super::fp::Fp;
use super::quat::FpQuat;
use super::vec::FpVec3;

/// Position, rotation and per-axis scale of one simulation object,
/// expressed relative to its parent.
///
/// Composition assumes no shear: scale applies in the object's own axes,
/// which holds for everything the arena templates author.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct FpTransform {
    pub position: FpVec3,
    pub rotation: FpQuat,
    pub scale: FpVec3,
}

impl Default for FpTransform {
    fn default() -> Self {
        FpTransform::IDENTITY
    }
}

impl FpTransform {
    pub const IDENTITY: FpTransform = FpTransform {
        position: FpVec3::ZERO,
        rotation: FpQuat::IDENTITY,
        scale: FpVec3::ONE,
    };

    pub const fn from_position(position: FpVec3) -> FpTransform {
        FpTransform {
            position,
            rotation: FpQuat::IDENTITY,
            scale: FpVec3::ONE,
        }
    }

    pub const fn new(position: FpVec3, rotation: FpQuat, scale: FpVec3) -> FpTransform {
        FpTransform {
            position,
            rotation,
            scale,
        }
    }

    /// Map a point from this transform's space into its parent's space.
    pub fn transform_point(&self, p: FpVec3) -> FpVec3 {
        self.position + self.rotation.rotate(self.scale.mul_each(p))
    }

    /// Map a point from the parent's space back into this transform's space.
    ///
    /// Zero scale components pass through unchanged rather than divide.
    pub fn inverse_transform_point(&self, p: FpVec3) -> FpVec3 {
        let local = self.rotation.conjugate().rotate(p - self.position);
        FpVec3::new(
            div_axis(local.x, self.scale.x),
            div_axis(local.y, self.scale.y),
            div_axis(local.z, self.scale.z),
        )
    }

    /// Compose `parent * child`: the result maps child-local points all the
    /// way into the parent's space.
    pub fn combine(parent: &FpTransform, child: &FpTransform) -> FpTransform {
        FpTransform {
            position: parent.transform_point(child.position),
            rotation: parent.rotation * child.rotation,
            scale: parent.scale.mul_each(child.scale),
        }
    }
}

fn div_axis(v: Fp, s: Fp) -> Fp {
    if s == Fp::ZERO {
        v
    } else {
        v / s
    }
}
