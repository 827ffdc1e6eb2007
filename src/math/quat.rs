//! Fixed-point unit quaternion for object rotations

use super::fp::Fp;
use super::vec::FpVec3;

/// Rotation quaternion over [`Fp`].
///
/// Composition follows the usual convention: `a * b` applies `b` first,
/// then `a`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct FpQuat {
    pub x: Fp,
    pub y: Fp,
    pub z: Fp,
    pub w: Fp,
}

impl Default for FpQuat {
    fn default() -> Self {
        FpQuat::IDENTITY
    }
}

impl FpQuat {
    pub const IDENTITY: FpQuat = FpQuat {
        x: Fp::ZERO,
        y: Fp::ZERO,
        z: Fp::ZERO,
        w: Fp::ONE,
    };

    pub const fn new(x: Fp, y: Fp, z: Fp, w: Fp) -> FpQuat {
        FpQuat { x, y, z, w }
    }

    /// Rotation of `angle` radians about a unit axis.
    pub fn from_axis_angle(axis: FpVec3, angle: Fp) -> FpQuat {
        let half = angle * Fp::HALF;
        let s = half.sin();
        FpQuat::new(axis.x * s, axis.y * s, axis.z * s, half.cos())
    }

    /// Rotation of `angle` radians about the world Z axis, the physics
    /// plane normal.
    pub fn about_z(angle: Fp) -> FpQuat {
        let half = angle * Fp::HALF;
        FpQuat::new(Fp::ZERO, Fp::ZERO, half.sin(), half.cos())
    }

    pub fn conjugate(self) -> FpQuat {
        FpQuat::new(-self.x, -self.y, -self.z, self.w)
    }

    pub fn dot(self, other: FpQuat) -> Fp {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    /// Renormalize after long mul chains. Degenerate input collapses to
    /// identity.
    pub fn normalize(self) -> FpQuat {
        let len = self.dot(self).sqrt();
        if len == Fp::ZERO {
            return FpQuat::IDENTITY;
        }
        FpQuat::new(self.x / len, self.y / len, self.z / len, self.w / len)
    }

    /// Rotate a vector: `q * (0, v) * q^-1` in the optimized two-cross form.
    pub fn rotate(self, v: FpVec3) -> FpVec3 {
        let u = FpVec3::new(self.x, self.y, self.z);
        let t = u.cross(v).scale(Fp::TWO);
        v + t.scale(self.w) + u.cross(t)
    }

    /// Shortest-arc spherical interpolation; `t` is clamped to [0, 1].
    pub fn slerp(self, to: FpQuat, t: Fp) -> FpQuat {
        let t = t.clamp(Fp::ZERO, Fp::ONE);
        let mut cos = self.dot(to);
        let mut to = to;
        if cos < Fp::ZERO {
            // the double cover: negating one end takes the short way round
            cos = -cos;
            to = FpQuat::new(-to.x, -to.y, -to.z, -to.w);
        }
        if cos > Fp::ONE - Fp::from_ratio(1, 256) {
            // nearly parallel: the sine below would vanish, lerp instead
            return FpQuat::new(
                self.x.lerp(to.x, t),
                self.y.lerp(to.y, t),
                self.z.lerp(to.z, t),
                self.w.lerp(to.w, t),
            )
            .normalize();
        }
        let angle = cos.acos();
        let sin = angle.sin();
        let wa = ((Fp::ONE - t) * angle).sin() / sin;
        let wb = (t * angle).sin() / sin;
        FpQuat::new(
            self.x * wa + to.x * wb,
            self.y * wa + to.y * wb,
            self.z * wa + to.z * wb,
            self.w * wa + to.w * wb,
        )
        .normalize()
    }

    /// Rotation turning `+Z` into `forward` with `up` steering the roll.
    /// Degenerate input (zero forward, collinear up) falls back to a
    /// deterministic substitute axis, or identity when nothing works.
    pub fn look_rotation(forward: FpVec3, up: FpVec3) -> FpQuat {
        let f = forward.normalize_or_zero();
        if f == FpVec3::ZERO {
            return FpQuat::IDENTITY;
        }
        let mut r = up.cross(f);
        if r.length_sq() == Fp::ZERO {
            r = FpVec3::UNIT_Y.cross(f);
        }
        if r.length_sq() == Fp::ZERO {
            r = FpVec3::UNIT_X.cross(f);
        }
        let r = r.normalize_or_zero();
        let u = f.cross(r);

        // orthonormal basis (r, u, f) as columns, standard trace dispatch
        let quarter = Fp::from_ratio(1, 4);
        let trace = r.x + u.y + f.z;
        let q = if trace > Fp::ZERO {
            let s = (trace + Fp::ONE).sqrt() * Fp::TWO;
            FpQuat::new((u.z - f.y) / s, (f.x - r.z) / s, (r.y - u.x) / s, s * quarter)
        } else if r.x > u.y && r.x > f.z {
            let s = (Fp::ONE + r.x - u.y - f.z).sqrt() * Fp::TWO;
            FpQuat::new(s * quarter, (u.x + r.y) / s, (f.x + r.z) / s, (u.z - f.y) / s)
        } else if u.y > f.z {
            let s = (Fp::ONE + u.y - r.x - f.z).sqrt() * Fp::TWO;
            FpQuat::new((u.x + r.y) / s, s * quarter, (f.y + u.z) / s, (f.x - r.z) / s)
        } else {
            let s = (Fp::ONE + f.z - r.x - u.y).sqrt() * Fp::TWO;
            FpQuat::new((f.x + r.z) / s, (f.y + u.z) / s, s * quarter, (r.y - u.x) / s)
        };
        q.normalize()
    }

    /// Split into `swing * twist` where the twist is a pure rotation about
    /// the world Z axis. Returns the swing and the twist angle in radians.
    ///
    /// Recombining with [`FpQuat::about_z`] reproduces the original
    /// rotation, which is what lets the physics step own the in-plane angle
    /// while authored out-of-plane tilt survives untouched.
    pub fn swing_twist_z(self) -> (FpQuat, Fp) {
        let proj = FpQuat::new(Fp::ZERO, Fp::ZERO, self.z, self.w);
        if proj.z == Fp::ZERO && proj.w == Fp::ZERO {
            // Axis lies entirely in the plane; no twist component.
            return (self, Fp::ZERO);
        }
        let twist = proj.normalize();
        let angle = Fp::TWO * Fp::atan2(twist.z, twist.w);
        (self * twist.conjugate(), angle)
    }
}

impl std::ops::Mul for FpQuat {
    type Output = FpQuat;
    fn mul(self, rhs: FpQuat) -> FpQuat {
        FpQuat::new(
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        )
    }
}
