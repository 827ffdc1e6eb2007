//! Fixed-point 2D and 3D vectors

use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use super::fp::Fp;

/// 2D vector over [`Fp`], used by the physics plane.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct FpVec2 {
    pub x: Fp,
    pub y: Fp,
}

impl FpVec2 {
    pub const ZERO: FpVec2 = FpVec2 {
        x: Fp::ZERO,
        y: Fp::ZERO,
    };

    pub const fn new(x: Fp, y: Fp) -> FpVec2 {
        FpVec2 { x, y }
    }

    pub fn dot(self, other: FpVec2) -> Fp {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3D cross product of two in-plane vectors.
    pub fn perp_dot(self, other: FpVec2) -> Fp {
        self.x * other.y - self.y * other.x
    }

    /// Counter-clockwise perpendicular.
    pub fn perp(self) -> FpVec2 {
        FpVec2::new(-self.y, self.x)
    }

    pub fn length_sq(self) -> Fp {
        self.dot(self)
    }

    pub fn length(self) -> Fp {
        self.length_sq().sqrt()
    }

    /// Unit vector, or zero when the input is too short to normalize.
    pub fn normalize_or_zero(self) -> FpVec2 {
        let len = self.length();
        if len == Fp::ZERO {
            FpVec2::ZERO
        } else {
            FpVec2::new(self.x / len, self.y / len)
        }
    }

    pub fn scale(self, s: Fp) -> FpVec2 {
        FpVec2::new(self.x * s, self.y * s)
    }

    pub fn lerp(self, other: FpVec2, t: Fp) -> FpVec2 {
        self + (other - self).scale(t)
    }

    /// Rotate counter-clockwise by `angle` radians.
    pub fn rotate(self, angle: Fp) -> FpVec2 {
        let c = angle.cos();
        let s = angle.sin();
        FpVec2::new(self.x * c - self.y * s, self.x * s + self.y * c)
    }
}

impl Add for FpVec2 {
    type Output = FpVec2;
    fn add(self, rhs: FpVec2) -> FpVec2 {
        FpVec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for FpVec2 {
    type Output = FpVec2;
    fn sub(self, rhs: FpVec2) -> FpVec2 {
        FpVec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for FpVec2 {
    type Output = FpVec2;
    fn neg(self) -> FpVec2 {
        FpVec2::new(-self.x, -self.y)
    }
}

impl AddAssign for FpVec2 {
    fn add_assign(&mut self, rhs: FpVec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl SubAssign for FpVec2 {
    fn sub_assign(&mut self, rhs: FpVec2) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<Fp> for FpVec2 {
    type Output = FpVec2;
    fn mul(self, rhs: Fp) -> FpVec2 {
        self.scale(rhs)
    }
}

/// 3D vector over [`Fp`], used by the object transform hierarchy.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct FpVec3 {
    pub x: Fp,
    pub y: Fp,
    pub z: Fp,
}

impl FpVec3 {
    pub const ZERO: FpVec3 = FpVec3 {
        x: Fp::ZERO,
        y: Fp::ZERO,
        z: Fp::ZERO,
    };
    pub const ONE: FpVec3 = FpVec3 {
        x: Fp::ONE,
        y: Fp::ONE,
        z: Fp::ONE,
    };
    pub const UNIT_X: FpVec3 = FpVec3 {
        x: Fp::ONE,
        y: Fp::ZERO,
        z: Fp::ZERO,
    };
    pub const UNIT_Y: FpVec3 = FpVec3 {
        x: Fp::ZERO,
        y: Fp::ONE,
        z: Fp::ZERO,
    };
    pub const UNIT_Z: FpVec3 = FpVec3 {
        x: Fp::ZERO,
        y: Fp::ZERO,
        z: Fp::ONE,
    };

    pub const fn new(x: Fp, y: Fp, z: Fp) -> FpVec3 {
        FpVec3 { x, y, z }
    }

    /// Lift a physics-plane point into object space at z = 0.
    pub const fn from_plane(v: FpVec2) -> FpVec3 {
        FpVec3 {
            x: v.x,
            y: v.y,
            z: Fp::ZERO,
        }
    }

    /// Project onto the physics plane, dropping z.
    pub const fn to_plane(self) -> FpVec2 {
        FpVec2 {
            x: self.x,
            y: self.y,
        }
    }

    pub fn dot(self, other: FpVec3) -> Fp {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: FpVec3) -> FpVec3 {
        FpVec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length_sq(self) -> Fp {
        self.dot(self)
    }

    pub fn length(self) -> Fp {
        self.length_sq().sqrt()
    }

    pub fn normalize_or_zero(self) -> FpVec3 {
        let len = self.length();
        if len == Fp::ZERO {
            FpVec3::ZERO
        } else {
            FpVec3::new(self.x / len, self.y / len, self.z / len)
        }
    }

    pub fn scale(self, s: Fp) -> FpVec3 {
        FpVec3::new(self.x * s, self.y * s, self.z * s)
    }

    /// Component-wise product, used for transform scale.
    pub fn mul_each(self, other: FpVec3) -> FpVec3 {
        FpVec3::new(self.x * other.x, self.y * other.y, self.z * other.z)
    }

    pub fn lerp(self, other: FpVec3, t: Fp) -> FpVec3 {
        self + (other - self).scale(t)
    }
}

impl Add for FpVec3 {
    type Output = FpVec3;
    fn add(self, rhs: FpVec3) -> FpVec3 {
        FpVec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for FpVec3 {
    type Output = FpVec3;
    fn sub(self, rhs: FpVec3) -> FpVec3 {
        FpVec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for FpVec3 {
    type Output = FpVec3;
    fn neg(self) -> FpVec3 {
        FpVec3::new(-self.x, -self.y, -self.z)
    }
}

impl AddAssign for FpVec3 {
    fn add_assign(&mut self, rhs: FpVec3) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl SubAssign for FpVec3 {
    fn sub_assign(&mut self, rhs: FpVec3) {
        self.x -= rhs.x;
        self.y -= rhs.y;
        self.z -= rhs.z;
    }
}

impl Mul<Fp> for FpVec3 {
    type Output = FpVec3;
    fn mul(self, rhs: Fp) -> FpVec3 {
        self.scale(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_and_cross() {
        let x = FpVec3::UNIT_X;
        let y = FpVec3::UNIT_Y;
        assert_eq!(x.dot(y), Fp::ZERO);
        assert_eq!(x.cross(y), FpVec3::UNIT_Z);
        assert_eq!(y.cross(x), -FpVec3::UNIT_Z);
    }

    #[test]
    fn length_of_3_4_triangle() {
        let v = FpVec2::new(Fp::from_int(3), Fp::from_int(4));
        assert_eq!(v.length(), Fp::from_int(5));
    }

    #[test]
    fn normalize_zero_is_zero() {
        assert_eq!(FpVec2::ZERO.normalize_or_zero(), FpVec2::ZERO);
        assert_eq!(FpVec3::ZERO.normalize_or_zero(), FpVec3::ZERO);
    }

    #[test]
    fn rotate_quarter_turn() {
        let v = FpVec2::new(Fp::ONE, Fp::ZERO);
        let r = v.rotate(Fp::HALF_PI);
        assert!((r.x.raw()).abs() <= 4);
        assert!((r.y - Fp::ONE).raw().abs() <= 4);
    }

    #[test]
    fn plane_round_trip() {
        let v = FpVec2::new(Fp::from_int(2), Fp::from_int(-7));
        assert_eq!(FpVec3::from_plane(v).to_plane(), v);
    }
}
