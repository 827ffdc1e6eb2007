//! Narrowphase overlap tests for the supported shape pairs

use crate::math::{Fp, FpVec2};

use super::body::{Body, Shape};

/// Result of a positive overlap test. The normal points from the first
/// body toward the second.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Overlap {
    pub normal: FpVec2,
    pub penetration: Fp,
    pub point: FpVec2,
}

impl Overlap {
    fn flip(self) -> Overlap {
        Overlap {
            normal: -self.normal,
            penetration: self.penetration,
            point: self.point,
        }
    }
}

/// Test two bodies for strict overlap. Exact touching does not count.
pub(crate) fn overlap(a: &Body, b: &Body) -> Option<Overlap> {
    match (a.shape, b.shape) {
        (Shape::Circle { radius: ra }, Shape::Circle { radius: rb }) => {
            circle_circle(a.position, ra, b.position, rb)
        }
        (Shape::Box { half }, Shape::Circle { radius }) => {
            box_circle(a.position, a.angle, half, b.position, radius)
        }
        (Shape::Circle { radius }, Shape::Box { half }) => {
            box_circle(b.position, b.angle, half, a.position, radius).map(Overlap::flip)
        }
        (Shape::Box { half: ha }, Shape::Box { half: hb }) => {
            box_box(a.position, a.angle, ha, b.position, b.angle, hb)
        }
    }
}

/// Local box axes for a given orientation.
fn axes(angle: Fp) -> (FpVec2, FpVec2) {
    let c = angle.cos();
    let s = angle.sin();
    (FpVec2::new(c, s), FpVec2::new(-s, c))
}

fn circle_circle(pa: FpVec2, ra: Fp, pb: FpVec2, rb: Fp) -> Option<Overlap> {
    let d = pb - pa;
    let r = ra + rb;
    let dist_sq = d.length_sq();
    if dist_sq >= r * r {
        return None;
    }
    let dist = dist_sq.sqrt();
    let normal = if dist == Fp::ZERO {
        // Coincident centers: pick a fixed direction so both sides agree.
        FpVec2::new(Fp::ONE, Fp::ZERO)
    } else {
        d.scale(Fp::ONE / dist)
    };
    let penetration = r - dist;
    let point = pa + normal.scale(ra - penetration * Fp::HALF);
    Some(Overlap {
        normal,
        penetration,
        point,
    })
}

/// Box versus circle; the returned normal points from the box toward the
/// circle.
fn box_circle(
    box_pos: FpVec2,
    box_angle: Fp,
    half: FpVec2,
    circle_pos: FpVec2,
    radius: Fp,
) -> Option<Overlap> {
    let (u1, u2) = axes(box_angle);
    let d = circle_pos - box_pos;
    let local = FpVec2::new(d.dot(u1), d.dot(u2));
    let clamped = FpVec2::new(local.x.clamp(-half.x, half.x), local.y.clamp(-half.y, half.y));

    if local == clamped {
        // Center inside the box: push out through the nearest face.
        let dx = half.x - local.x.abs();
        let dy = half.y - local.y.abs();
        let local_normal = if dx < dy {
            FpVec2::new(local.x.signum(), Fp::ZERO)
        } else {
            FpVec2::new(Fp::ZERO, local.y.signum())
        };
        // signum is zero at exact center; fall back to +x.
        let local_normal = if local_normal == FpVec2::ZERO {
            FpVec2::new(Fp::ONE, Fp::ZERO)
        } else {
            local_normal
        };
        let penetration = if dx < dy { dx + radius } else { dy + radius };
        return Some(Overlap {
            normal: u1.scale(local_normal.x) + u2.scale(local_normal.y),
            penetration,
            point: circle_pos,
        });
    }

    let diff = local - clamped;
    let dist_sq = diff.length_sq();
    if dist_sq >= radius * radius {
        return None;
    }
    let dist = dist_sq.sqrt();
    let local_normal = if dist == Fp::ZERO {
        FpVec2::new(Fp::ONE, Fp::ZERO)
    } else {
        diff.scale(Fp::ONE / dist)
    };
    Some(Overlap {
        normal: u1.scale(local_normal.x) + u2.scale(local_normal.y),
        penetration: radius - dist,
        point: box_pos + u1.scale(clamped.x) + u2.scale(clamped.y),
    })
}

/// Oriented box pair via separating axes. Single deepest-point manifold.
fn box_box(
    pa: FpVec2,
    angle_a: Fp,
    ha: FpVec2,
    pb: FpVec2,
    angle_b: Fp,
    hb: FpVec2,
) -> Option<Overlap> {
    let (a1, a2) = axes(angle_a);
    let (b1, b2) = axes(angle_b);
    let d = pb - pa;

    let mut best_pen = Fp::MAX;
    let mut best_axis = FpVec2::ZERO;
    for axis in [a1, a2, b1, b2] {
        let ext_a = a1.dot(axis).abs() * ha.x + a2.dot(axis).abs() * ha.y;
        let ext_b = b1.dot(axis).abs() * hb.x + b2.dot(axis).abs() * hb.y;
        let sep = d.dot(axis);
        let pen = ext_a + ext_b - sep.abs();
        if pen <= Fp::ZERO {
            return None;
        }
        if pen < best_pen {
            best_pen = pen;
            best_axis = if sep >= Fp::ZERO { axis } else { -axis };
        }
    }

    // Deepest vertex of b against the push direction.
    let sx = if b1.dot(best_axis) >= Fp::ZERO {
        -hb.x
    } else {
        hb.x
    };
    let sy = if b2.dot(best_axis) >= Fp::ZERO {
        -hb.y
    } else {
        hb.y
    };
    let point = pb + b1.scale(sx) + b2.scale(sy);

    Some(Overlap {
        normal: best_axis,
        penetration: best_pen,
        point,
    })
}
