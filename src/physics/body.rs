//! Rigid body state and construction

use std::fmt;

use crate::math::{Fp, FpVec2};

/// Opaque slot reference into a [`super::World`].
///
/// Handles stay valid until the body is removed. They are runtime-only:
/// rebuilding a world from serialized state assigns fresh handles, so they
/// must never be persisted.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct BodyHandle(pub(crate) u32);

impl BodyHandle {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body#{}", self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BodyKind {
    /// Immovable; infinite mass. Game logic may still reposition it.
    Static,
    /// Integrated and solved every step.
    Dynamic,
}

/// Collision silhouette in the body's local frame.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Shape {
    Circle { radius: Fp },
    /// Axis-aligned in local space, oriented by the body angle.
    Box { half: FpVec2 },
}

/// One rigid body in the 2D plane.
#[derive(Clone, Debug)]
pub struct Body {
    pub kind: BodyKind,
    pub shape: Shape,
    pub position: FpVec2,
    /// Orientation about the plane normal, radians.
    pub angle: Fp,
    pub velocity: FpVec2,
    pub angular_velocity: Fp,
    pub friction: Fp,
    pub restitution: Fp,
    pub gravity_scale: Fp,
    /// Trigger bodies overlap without resolving; they only report events.
    pub is_trigger: bool,
    mass: Fp,
    inv_mass: Fp,
    inv_inertia: Fp,
}

impl Body {
    pub fn new(kind: BodyKind, shape: Shape) -> Body {
        let mut body = Body {
            kind,
            shape,
            position: FpVec2::ZERO,
            angle: Fp::ZERO,
            velocity: FpVec2::ZERO,
            angular_velocity: Fp::ZERO,
            friction: Fp::from_ratio(1, 2),
            restitution: Fp::ZERO,
            gravity_scale: Fp::ONE,
            is_trigger: false,
            mass: Fp::ONE,
            inv_mass: Fp::ZERO,
            inv_inertia: Fp::ZERO,
        };
        body.set_mass(Fp::ONE);
        body
    }

    /// Set the body mass and derive rotational inertia from the shape.
    /// Static bodies always keep infinite effective mass.
    pub fn set_mass(&mut self, mass: Fp) {
        self.mass = mass;
        if self.kind == BodyKind::Static || mass <= Fp::ZERO {
            self.inv_mass = Fp::ZERO;
            self.inv_inertia = Fp::ZERO;
            return;
        }
        self.inv_mass = Fp::ONE / mass;
        let inertia = match self.shape {
            Shape::Circle { radius } => mass * radius * radius * Fp::HALF,
            Shape::Box { half } => {
                mass * (half.x * half.x + half.y * half.y) / Fp::from_int(3)
            }
        };
        if inertia > Fp::ZERO {
            self.inv_inertia = Fp::ONE / inertia;
        } else {
            self.inv_inertia = Fp::ZERO;
        }
    }

    pub fn mass(&self) -> Fp {
        self.mass
    }

    pub fn inv_mass(&self) -> Fp {
        self.inv_mass
    }

    pub fn inv_inertia(&self) -> Fp {
        self.inv_inertia
    }

    pub fn is_dynamic(&self) -> bool {
        self.kind == BodyKind::Dynamic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_bodies_have_no_inverse_mass() {
        let mut b = Body::new(BodyKind::Static, Shape::Circle { radius: Fp::ONE });
        b.set_mass(Fp::from_int(10));
        assert_eq!(b.inv_mass(), Fp::ZERO);
        assert_eq!(b.inv_inertia(), Fp::ZERO);
    }

    #[test]
    fn circle_inertia_scales_with_radius() {
        let mut small = Body::new(BodyKind::Dynamic, Shape::Circle { radius: Fp::ONE });
        small.set_mass(Fp::from_int(2));
        let mut large = Body::new(
            BodyKind::Dynamic,
            Shape::Circle {
                radius: Fp::from_int(2),
            },
        );
        large.set_mass(Fp::from_int(2));
        assert!(large.inv_inertia() < small.inv_inertia());
        assert_eq!(small.inv_mass(), Fp::HALF);
    }
}
