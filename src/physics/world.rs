//! Deterministic 2D impulse world and its step event context

use std::collections::BTreeSet;

use crate::math::{Fp, FpVec2};

use super::body::{Body, BodyHandle, BodyKind};
use super::collide::overlap;

/// Penetration allowance before positional correction engages.
const SLOP: Fp = Fp::from_ratio(1, 200);
/// Fraction of remaining penetration resolved per correction pass.
const CORRECTION: Fp = Fp::from_ratio(4, 5);
/// Approach speeds below this are resting contact, no bounce.
const RESTITUTION_FLOOR: Fp = Fp::from_ratio(1, 2);

/// Reusable per-step event output plus the previous-step contact memory
/// that enter/stay classification needs.
///
/// All four event lists are ordered by ascending handle pair, so two
/// replicas stepping identical worlds read identical sequences.
#[derive(Debug, Default)]
pub struct StepContext {
    pub collision_enter: Vec<(BodyHandle, BodyHandle)>,
    pub collision_stay: Vec<(BodyHandle, BodyHandle)>,
    pub trigger_enter: Vec<(BodyHandle, BodyHandle)>,
    pub trigger_stay: Vec<(BodyHandle, BodyHandle)>,
    prev_solid: BTreeSet<(u32, u32)>,
    prev_trigger: BTreeSet<(u32, u32)>,
}

impl StepContext {
    pub fn new() -> StepContext {
        StepContext::default()
    }

    /// Drop every remembered pair involving a removed body; the memory
    /// must only ever name live bodies.
    pub fn forget(&mut self, handle: BodyHandle) {
        self.prev_solid
            .retain(|&(a, b)| a != handle.0 && b != handle.0);
        self.prev_trigger
            .retain(|&(a, b)| a != handle.0 && b != handle.0);
    }

    /// Remembered solid pairs from the last published step, ascending.
    pub fn remembered_solid(&self) -> impl Iterator<Item = (BodyHandle, BodyHandle)> + '_ {
        self.prev_solid
            .iter()
            .map(|&(a, b)| (BodyHandle(a), BodyHandle(b)))
    }

    /// Remembered trigger pairs from the last published step, ascending.
    pub fn remembered_trigger(&self) -> impl Iterator<Item = (BodyHandle, BodyHandle)> + '_ {
        self.prev_trigger
            .iter()
            .map(|&(a, b)| (BodyHandle(a), BodyHandle(b)))
    }

    /// Replace the whole memory. Pairs are stored low handle first.
    pub fn remember<I, J>(&mut self, solid: I, trigger: J)
    where
        I: IntoIterator<Item = (BodyHandle, BodyHandle)>,
        J: IntoIterator<Item = (BodyHandle, BodyHandle)>,
    {
        let ordered = |(a, b): (BodyHandle, BodyHandle)| {
            if a.0 <= b.0 {
                (a.0, b.0)
            } else {
                (b.0, a.0)
            }
        };
        self.reset();
        self.prev_solid = solid.into_iter().map(ordered).collect();
        self.prev_trigger = trigger.into_iter().map(ordered).collect();
    }

    pub fn reset(&mut self) {
        self.collision_enter.clear();
        self.collision_stay.clear();
        self.trigger_enter.clear();
        self.trigger_stay.clear();
        self.prev_solid.clear();
        self.prev_trigger.clear();
    }

    fn publish(&mut self, solid: BTreeSet<(u32, u32)>, trigger: BTreeSet<(u32, u32)>) {
        self.collision_enter.clear();
        self.collision_stay.clear();
        self.trigger_enter.clear();
        self.trigger_stay.clear();
        for &(a, b) in &solid {
            let pair = (BodyHandle(a), BodyHandle(b));
            if self.prev_solid.contains(&(a, b)) {
                self.collision_stay.push(pair);
            } else {
                self.collision_enter.push(pair);
            }
        }
        for &(a, b) in &trigger {
            let pair = (BodyHandle(a), BodyHandle(b));
            if self.prev_trigger.contains(&(a, b)) {
                self.trigger_stay.push(pair);
            } else {
                self.trigger_enter.push(pair);
            }
        }
        self.prev_solid = solid;
        self.prev_trigger = trigger;
    }
}

/// Solid contact captured for the solver, slot indices with `a < b`.
#[derive(Clone, Copy, Debug)]
struct Contact {
    a: usize,
    b: usize,
    normal: FpVec2,
    penetration: Fp,
    point: FpVec2,
}

/// Fixed-point rigid body world.
///
/// Bodies live in slots addressed by [`BodyHandle`]; a removed slot stays
/// empty forever, so relative handle order always equals creation order.
/// Every loop runs in ascending slot order and all arithmetic is [`Fp`],
/// so identical op sequences give identical worlds on every platform.
#[derive(Debug)]
pub struct World {
    pub gravity: FpVec2,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
    slots: Vec<Option<Body>>,
}

impl World {
    pub fn new(gravity: FpVec2) -> World {
        World {
            gravity,
            velocity_iterations: 8,
            position_iterations: 3,
            slots: Vec::new(),
        }
    }

    /// Handles are append-only and never reused.
    pub fn add_body(&mut self, body: Body) -> BodyHandle {
        self.slots.push(Some(body));
        BodyHandle((self.slots.len() - 1) as u32)
    }

    pub fn remove_body(&mut self, handle: BodyHandle) -> bool {
        match self.slots.get_mut(handle.index()) {
            Some(slot @ Some(_)) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.slots.get(handle.index()).and_then(|s| s.as_ref())
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.slots.get_mut(handle.index()).and_then(|s| s.as_mut())
    }

    pub fn body_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Occupied bodies in ascending handle order.
    pub fn iter(&self) -> impl Iterator<Item = (BodyHandle, &Body)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|b| (BodyHandle(i as u32), b)))
    }

    /// Advance one fixed timestep and publish contact events into `ctx`.
    pub fn step(&mut self, dt: Fp, ctx: &mut StepContext) {
        for slot in &mut self.slots {
            if let Some(body) = slot {
                if body.is_dynamic() {
                    let g = self.gravity.scale(body.gravity_scale * dt);
                    body.velocity += g;
                }
            }
        }

        let (contacts, cur_solid, cur_trigger) = self.gather();

        for _ in 0..self.velocity_iterations {
            for c in &contacts {
                self.solve_velocity(c);
            }
        }

        for slot in &mut self.slots {
            if let Some(body) = slot {
                if body.is_dynamic() {
                    body.position += body.velocity.scale(dt);
                    body.angle += body.angular_velocity * dt;
                }
            }
        }

        for _ in 0..self.position_iterations {
            let (contacts, _, _) = self.gather();
            for c in &contacts {
                self.correct_position(c);
            }
        }

        ctx.publish(cur_solid, cur_trigger);
    }

    /// Narrowphase over ordered pairs: solver contacts plus the solid and
    /// trigger overlap sets.
    fn gather(&self) -> (Vec<Contact>, BTreeSet<(u32, u32)>, BTreeSet<(u32, u32)>) {
        let mut contacts = Vec::new();
        let mut solid = BTreeSet::new();
        let mut trigger = BTreeSet::new();
        let n = self.slots.len();
        for i in 0..n {
            let Some(a) = self.slots[i].as_ref() else {
                continue;
            };
            for j in (i + 1)..n {
                let Some(b) = self.slots[j].as_ref() else {
                    continue;
                };
                if a.kind == BodyKind::Static && b.kind == BodyKind::Static {
                    continue;
                }
                let Some(o) = overlap(a, b) else {
                    continue;
                };
                if a.is_trigger || b.is_trigger {
                    trigger.insert((i as u32, j as u32));
                } else {
                    solid.insert((i as u32, j as u32));
                    contacts.push(Contact {
                        a: i,
                        b: j,
                        normal: o.normal,
                        penetration: o.penetration,
                        point: o.point,
                    });
                }
            }
        }
        (contacts, solid, trigger)
    }

    fn pair_mut(&mut self, i: usize, j: usize) -> Option<(&mut Body, &mut Body)> {
        let (left, right) = self.slots.split_at_mut(j);
        match (left[i].as_mut(), right[0].as_mut()) {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        }
    }

    fn solve_velocity(&mut self, c: &Contact) {
        let Some((a, b)) = self.pair_mut(c.a, c.b) else {
            return;
        };
        let n = c.normal;
        let ra = c.point - a.position;
        let rb = c.point - b.position;

        let rel = (b.velocity + rb.perp().scale(b.angular_velocity))
            - (a.velocity + ra.perp().scale(a.angular_velocity));
        let vn = rel.dot(n);
        if vn >= Fp::ZERO {
            return;
        }

        let ran = ra.perp_dot(n);
        let rbn = rb.perp_dot(n);
        let k = a.inv_mass()
            + b.inv_mass()
            + a.inv_inertia() * ran * ran
            + b.inv_inertia() * rbn * rbn;
        if k == Fp::ZERO {
            return;
        }

        let e = if vn < -RESTITUTION_FLOOR {
            a.restitution.max(b.restitution)
        } else {
            Fp::ZERO
        };
        let j = -(Fp::ONE + e) * vn / k;
        let impulse = n.scale(j);
        a.velocity -= impulse.scale(a.inv_mass());
        a.angular_velocity -= a.inv_inertia() * ra.perp_dot(impulse);
        b.velocity += impulse.scale(b.inv_mass());
        b.angular_velocity += b.inv_inertia() * rb.perp_dot(impulse);

        // Coulomb friction against the updated relative velocity.
        let rel = (b.velocity + rb.perp().scale(b.angular_velocity))
            - (a.velocity + ra.perp().scale(a.angular_velocity));
        let tangent = rel - n.scale(rel.dot(n));
        let tl = tangent.length();
        if tl == Fp::ZERO {
            return;
        }
        let t = tangent.scale(Fp::ONE / tl);
        let rat = ra.perp_dot(t);
        let rbt = rb.perp_dot(t);
        let kt = a.inv_mass()
            + b.inv_mass()
            + a.inv_inertia() * rat * rat
            + b.inv_inertia() * rbt * rbt;
        if kt == Fp::ZERO {
            return;
        }
        let mu = (a.friction * b.friction).sqrt();
        let jt = (-rel.dot(t) / kt).clamp(-mu * j, mu * j);
        let f = t.scale(jt);
        a.velocity -= f.scale(a.inv_mass());
        a.angular_velocity -= a.inv_inertia() * ra.perp_dot(f);
        b.velocity += f.scale(b.inv_mass());
        b.angular_velocity += b.inv_inertia() * rb.perp_dot(f);
    }

    fn correct_position(&mut self, c: &Contact) {
        let Some((a, b)) = self.pair_mut(c.a, c.b) else {
            return;
        };
        let push = (c.penetration - SLOP).max(Fp::ZERO) * CORRECTION;
        if push == Fp::ZERO {
            return;
        }
        let total = a.inv_mass() + b.inv_mass();
        if total == Fp::ZERO {
            return;
        }
        let corr = c.normal.scale(push / total);
        a.position -= corr.scale(a.inv_mass());
        b.position += corr.scale(b.inv_mass());
    }
}
