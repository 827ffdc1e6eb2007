//! Tile simulation: scene tree over deterministic physics
//!
//! A tile owns one instantiated scene and its physics world and advances
//! both through a fixed stage order every tick. Replicas that feed a tile
//! the same ordered inputs walk through bit-identical states, which is
//! what makes snapshot-and-replay resynchronization possible at all.

use std::collections::BTreeMap;

use tracing::warn;
use uuid::Uuid;

use crate::core::event::{OutputEvent, ParamKey};
use crate::math::{Fp, FpQuat, FpTransform, FpVec2, FpVec3};
use crate::physics::{Body, BodyHandle, Shape, StepContext, World};
use crate::scene::{
    instantiate, ColliderShape, ComponentData, ComponentId, DetectorDef, DetectorResponse,
    DoorState, IdAlloc, RuntimeId, SimObject,
};
use crate::util::time::FIXED_DT;
use crate::wire::{Decode, Encode, Reader, WireError, Writer};

pub mod round;

/// Authored description of one tile kind: the scene to instantiate, the
/// marble to spawn into it, and the physics tuning it runs under.
///
/// Template object ids live in world 0 and are never stepped directly;
/// every round gets a fresh copy with live ids.
#[derive(Clone, Debug)]
pub struct TileTemplate {
    pub name: String,
    pub root: SimObject,
    /// Subtree cloned once per spawned marble. `None` makes the tile a
    /// pure showpiece that cannot host a round.
    pub marble: Option<SimObject>,
    pub gravity: FpVec2,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
}

/// Shared, immutable set of tile templates. Both sides of a session must
/// load the same catalog; snapshots reference templates by index only.
#[derive(Clone, Debug, Default)]
pub struct TemplateCatalog {
    templates: Vec<TileTemplate>,
}

impl TemplateCatalog {
    pub fn new(templates: Vec<TileTemplate>) -> TemplateCatalog {
        TemplateCatalog { templates }
    }

    pub fn get(&self, index: u16) -> Option<&TileTemplate> {
        self.templates.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TileError {
    #[error("object {object} has a body but no collider")]
    MissingCollider { object: RuntimeId },

    #[error("template index {index} is not in the catalog")]
    UnknownTemplate { index: u16 },

    #[error("snapshot carries {serialized} body states for {bound} bound bodies")]
    StateMismatch { serialized: usize, bound: usize },

    #[error("snapshot body state for {object} has no bound body")]
    UnboundState { object: RuntimeId },

    #[error("snapshot contact memory names {object} with no bound body")]
    UnboundContact { object: RuntimeId },

    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Physics presence of one object: its body slot plus the part of the
/// object's rotation the 2D solver cannot represent. The solver only turns
/// bodies about the plane normal; the swing keeps any authored tilt intact
/// when the solved angle is written back.
#[derive(Clone, Copy, Debug)]
struct Binding {
    handle: BodyHandle,
    swing: FpQuat,
}

/// Which contact list a detector is being matched against.
#[derive(Clone, Copy, Debug)]
enum Sense {
    TriggerEnter,
    TriggerStay,
    CollisionEnter,
    CollisionStay,
}

fn wants(def: &DetectorDef, sense: Sense) -> bool {
    match sense {
        Sense::TriggerEnter => def.on_trigger_enter,
        Sense::TriggerStay => def.on_trigger_stay,
        Sense::CollisionEnter => def.on_collision_enter,
        Sense::CollisionStay => def.on_collision_stay,
    }
}

/// A detector/marble pairing pulled out of one contact event.
#[derive(Clone, Copy, Debug)]
struct Hit {
    detector: ComponentId,
    marble: RuntimeId,
    response: DetectorResponse,
}

/// One live tile: an instantiated scene tree, the physics world built from
/// it, and the side tables linking the two.
///
/// Every tick runs six stages in a fixed order: component updates, the
/// physics step, trigger resolution, collision resolution, deferred
/// destruction, and transform write-back. Events produced by a stage are
/// appended in stage order, so replicas observe identical streams.
#[derive(Debug)]
pub struct Tile {
    template_index: u16,
    template: TileTemplate,
    alloc: IdAlloc,
    root: SimObject,
    world: World,
    bindings: BTreeMap<RuntimeId, Binding>,
    by_handle: BTreeMap<BodyHandle, RuntimeId>,
    ctx: StepContext,
    destroy_queue: Vec<RuntimeId>,
}

impl Tile {
    /// Instantiate `template` into a fresh world. `world_id` must be unique
    /// across the core's lifetime so ids from torn-down tiles never recur.
    pub fn new(template_index: u16, template: TileTemplate, world_id: u32) -> Result<Tile, TileError> {
        let mut alloc = IdAlloc::new(world_id);
        let root = instantiate(&template.root, &mut alloc);
        let world = world_for(&template);
        let mut tile = Tile {
            template_index,
            template,
            alloc,
            root,
            world,
            bindings: BTreeMap::new(),
            by_handle: BTreeMap::new(),
            ctx: StepContext::new(),
            destroy_queue: Vec::new(),
        };
        bind_subtree(
            &tile.root,
            &FpTransform::IDENTITY,
            &mut tile.world,
            &mut tile.bindings,
            &mut tile.by_handle,
        )?;
        Ok(tile)
    }

    pub fn world_id(&self) -> u32 {
        self.alloc.world()
    }

    pub fn template_index(&self) -> u16 {
        self.template_index
    }

    pub fn template(&self) -> &TileTemplate {
        &self.template
    }

    pub fn root(&self) -> &SimObject {
        &self.root
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Live marbles still attached to the tree.
    pub fn marble_count(&self) -> usize {
        let mut count = 0;
        self.root.visit(&mut |obj| {
            if obj.marble().is_some() {
                count += 1;
            }
        });
        count
    }

    /// World positions of the tile's spawn anchors, in tree order. Spawn
    /// anchors are anchor components on objects named `spawn*`.
    pub fn spawn_points(&self) -> Vec<FpVec3> {
        let mut points = Vec::new();
        self.root.visit_world(&FpTransform::IDENTITY, &mut |obj, wt| {
            let anchored = obj
                .components
                .iter()
                .any(|c| c.enabled && matches!(c.data, ComponentData::Anchor));
            if anchored && obj.name.starts_with("spawn") {
                points.push(wt.position);
            }
        });
        points
    }

    /// Rotate the tile root about the plane normal. Used for the spin-in
    /// animation; static colliders follow the tree on the next step.
    pub fn rotate_root(&mut self, angle: Fp) {
        self.root.local.rotation = (self.root.local.rotation * FpQuat::about_z(angle)).normalize();
    }

    /// Advance one fixed tick, appending anything that happened to `out`.
    pub fn step(&mut self, slot: u8, out: &mut Vec<OutputEvent>) {
        self.update_components(slot, out);
        self.world.step(FIXED_DT, &mut self.ctx);
        self.resolve_triggers(slot, out);
        self.resolve_collisions(slot, out);
        self.flush_destroyed(slot, out);
        self.write_back();
    }

    /// Stage one: run component behaviors, then push the resulting object
    /// transforms into their static bodies and apply screen wrap.
    fn update_components(&mut self, slot: u8, out: &mut Vec<OutputEvent>) {
        let mut wraps: Vec<(Fp, Fp)> = Vec::new();
        let mut doors_finished = 0u32;
        let mut doors_moving = 0u32;
        self.root.visit_mut(&mut |obj| {
            for c in &mut obj.components {
                if !c.enabled {
                    continue;
                }
                match &mut c.data {
                    ComponentData::Spinner(def) => {
                        obj.local.rotation = (obj.local.rotation
                            * FpQuat::about_z(def.speed * FIXED_DT))
                        .normalize();
                    }
                    ComponentData::Door(def) if def.state == DoorState::Opening => {
                        def.elapsed += 1;
                        let step = def
                            .travel
                            .scale(Fp::from_ratio(1, def.duration_ticks.max(1) as i64));
                        obj.local.position = obj.local.position + step;
                        if def.elapsed >= def.duration_ticks {
                            def.state = DoorState::Open;
                            doors_finished += 1;
                        } else {
                            doors_moving += 1;
                        }
                    }
                    ComponentData::Wrap(def) => wraps.push((def.min_x, def.max_x)),
                    _ => {}
                }
            }
        });
        if doors_finished > 0 && doors_moving == 0 {
            out.push(OutputEvent::DoorOpened { slot });
        }

        // Game logic owns static bodies: their pose always mirrors the tree.
        self.root.visit_world(&FpTransform::IDENTITY, &mut |obj, wt| {
            let Some(binding) = self.bindings.get_mut(&obj.id) else {
                return;
            };
            let Some(body) = self.world.body_mut(binding.handle) else {
                return;
            };
            if body.is_dynamic() {
                return;
            }
            body.position = wt.position.to_plane();
            let (swing, angle) = wt.rotation.swing_twist_z();
            body.angle = angle;
            binding.swing = swing;
        });

        for &(min_x, max_x) in &wraps {
            if max_x <= min_x {
                continue;
            }
            let width = max_x - min_x;
            for (&id, binding) in &self.bindings {
                if self.root.find(id).and_then(|o| o.marble()).is_none() {
                    continue;
                }
                let Some(body) = self.world.body_mut(binding.handle) else {
                    continue;
                };
                if !body.is_dynamic() {
                    continue;
                }
                if body.position.x < min_x {
                    body.position.x += width;
                } else if body.position.x > max_x {
                    body.position.x -= width;
                }
            }
        }
    }

    /// Stage three: detectors against trigger contacts.
    fn resolve_triggers(&mut self, slot: u8, out: &mut Vec<OutputEvent>) {
        let enter = self.ctx.trigger_enter.clone();
        let stay = self.ctx.trigger_stay.clone();
        for (a, b) in enter {
            if let Some(hit) = self.classify(a, b, Sense::TriggerEnter) {
                self.respond(slot, hit, out);
            }
        }
        for (a, b) in stay {
            if let Some(hit) = self.classify(a, b, Sense::TriggerStay) {
                self.respond(slot, hit, out);
            }
        }
    }

    /// Stage four: detectors against solid contacts.
    fn resolve_collisions(&mut self, slot: u8, out: &mut Vec<OutputEvent>) {
        let enter = self.ctx.collision_enter.clone();
        let stay = self.ctx.collision_stay.clone();
        for (a, b) in enter {
            if let Some(hit) = self.classify(a, b, Sense::CollisionEnter) {
                self.respond(slot, hit, out);
            }
        }
        for (a, b) in stay {
            if let Some(hit) = self.classify(a, b, Sense::CollisionStay) {
                self.respond(slot, hit, out);
            }
        }
    }

    /// Match one contact pair against detector filters, either way around.
    fn classify(&self, a: BodyHandle, b: BodyHandle, sense: Sense) -> Option<Hit> {
        let (Some(&ia), Some(&ib)) = (self.by_handle.get(&a), self.by_handle.get(&b)) else {
            warn!(%a, %b, "contact pair references an unbound body");
            return None;
        };
        for (det, other) in [(ia, ib), (ib, ia)] {
            let Some(det_obj) = self.root.find(det) else {
                continue;
            };
            let Some((detector, def)) = det_obj.detector() else {
                continue;
            };
            if !wants(def, sense) {
                continue;
            }
            let Some(other_obj) = self.root.find(other) else {
                continue;
            };
            if other_obj.marble().is_none() {
                continue;
            }
            return Some(Hit {
                detector,
                marble: other,
                response: def.response,
            });
        }
        None
    }

    fn respond(&mut self, slot: u8, hit: Hit, out: &mut Vec<OutputEvent>) {
        match hit.response {
            DetectorResponse::Announce => {
                out.push(OutputEvent::DetectorFired {
                    slot,
                    detector: hit.detector,
                    marble: hit.marble,
                });
            }
            DetectorResponse::Destroy => self.queue_destroy(hit.marble),
            DetectorResponse::Teleport { target } => {
                let anchor = self.root.find_component(target).map(|(owner, _)| owner.id);
                let Some(dest) =
                    anchor.and_then(|oid| self.root.world_of(oid, &FpTransform::IDENTITY))
                else {
                    warn!(target = %target, "teleport target missing, skipping");
                    return;
                };
                // Position jumps, velocity carries over.
                if let Some(binding) = self.bindings.get(&hit.marble) {
                    if let Some(body) = self.world.body_mut(binding.handle) {
                        body.position = dest.position.to_plane();
                    }
                }
            }
            DetectorResponse::Score { points } => {
                let Some(def) = self.root.find(hit.marble).and_then(|o| o.marble()) else {
                    warn!(marble = %hit.marble, "scoring marble has no owner, skipping");
                    return;
                };
                out.push(OutputEvent::ScoreAwarded {
                    slot,
                    owner: def.owner,
                    points,
                });
                self.queue_destroy(hit.marble);
            }
        }
    }

    fn queue_destroy(&mut self, id: RuntimeId) {
        if !self.destroy_queue.contains(&id) {
            self.destroy_queue.push(id);
        }
    }

    /// Stage five: detach queued subtrees and release their bodies.
    fn flush_destroyed(&mut self, slot: u8, out: &mut Vec<OutputEvent>) {
        if self.destroy_queue.is_empty() {
            return;
        }
        let queue = std::mem::take(&mut self.destroy_queue);
        for id in queue {
            let Some(subtree) = self.root.detach(id) else {
                warn!(object = %id, "destroy target already gone, skipping");
                continue;
            };
            subtree.visit(&mut |obj| {
                if let Some(binding) = self.bindings.remove(&obj.id) {
                    self.world.remove_body(binding.handle);
                    self.ctx.forget(binding.handle);
                    self.by_handle.remove(&binding.handle);
                }
            });
            match subtree.marble() {
                Some(def) => out.push(OutputEvent::MarbleDestroyed {
                    slot,
                    marble: id,
                    owner: def.owner,
                }),
                None => warn!(object = %id, "destroyed object was not a marble"),
            }
        }
    }

    /// Stage six: copy solved body poses back onto their objects, parents
    /// before children so each local conversion sees a settled parent.
    fn write_back(&mut self) {
        let ids: Vec<RuntimeId> = self.bindings.keys().copied().collect();
        for id in ids {
            let Some(binding) = self.bindings.get(&id) else {
                continue;
            };
            let (handle, swing) = (binding.handle, binding.swing);
            let Some(body) = self.world.body(handle) else {
                warn!(object = %id, "bound body vanished from the world");
                continue;
            };
            if !body.is_dynamic() {
                // Statics were pushed from the tree in stage one.
                continue;
            }
            let (position, angle) = (body.position, body.angle);
            let Some(parent) = self.root.parent_world_of(id, &FpTransform::IDENTITY) else {
                warn!(object = %id, "bound object missing from the tree");
                continue;
            };
            let Some(obj) = self.root.find_mut(id) else {
                continue;
            };
            let depth = FpTransform::combine(&parent, &obj.local).position.z;
            let target = FpVec3::new(position.x, position.y, depth);
            obj.local.position = parent.inverse_transform_point(target);
            obj.local.rotation = (parent.rotation.conjugate()
                * (swing * FpQuat::about_z(angle)))
            .normalize();
        }
    }

    /// Radial shove: push every marble inside `radius` away from `origin`,
    /// scaled down linearly with distance.
    pub fn apply_attack(&mut self, origin: FpVec2, radius: Fp, impulse: Fp) {
        if radius <= Fp::ZERO {
            return;
        }
        for (&id, binding) in &self.bindings {
            if self.root.find(id).and_then(|o| o.marble()).is_none() {
                continue;
            }
            let Some(body) = self.world.body_mut(binding.handle) else {
                continue;
            };
            if !body.is_dynamic() {
                continue;
            }
            let delta = body.position - origin;
            let dist = delta.length();
            if dist >= radius {
                continue;
            }
            let dir = if dist == Fp::ZERO {
                FpVec2::new(Fp::ONE, Fp::ZERO)
            } else {
                delta.scale(Fp::ONE / dist)
            };
            let falloff = Fp::ONE - dist / radius;
            body.velocity += dir.scale(impulse * falloff * body.inv_mass());
        }
    }

    /// Clone the template marble into the tile at a world position. Returns
    /// the new object's id, or `None` when the template has no marble.
    pub fn spawn_marble(&mut self, owner: Uuid, position: FpVec3) -> Option<RuntimeId> {
        let Some(marble_template) = self.template.marble.as_ref() else {
            warn!(template = %self.template.name, "template has no marble, skipping spawn");
            return None;
        };
        let mut fresh = instantiate(marble_template, &mut self.alloc);
        fresh.visit_mut(&mut |obj| {
            for c in &mut obj.components {
                if let ComponentData::Marble(def) = &mut c.data {
                    def.owner = owner;
                }
            }
        });
        let root_world = FpTransform::combine(&FpTransform::IDENTITY, &self.root.local);
        fresh.local.position = root_world.inverse_transform_point(position);
        let id = fresh.id;
        if let Err(err) = bind_subtree(
            &fresh,
            &root_world,
            &mut self.world,
            &mut self.bindings,
            &mut self.by_handle,
        ) {
            warn!(error = %err, "marble template failed to bind, skipping spawn");
            fresh.visit(&mut |obj| {
                if let Some(binding) = self.bindings.remove(&obj.id) {
                    self.world.remove_body(binding.handle);
                    self.by_handle.remove(&binding.handle);
                }
            });
            return None;
        }
        self.root.children.push(fresh);
        Some(id)
    }

    /// Point one component parameter at a new value. Unknown targets and
    /// mismatched kinds are logged and skipped, never fatal.
    pub fn set_param(&mut self, target: ComponentId, param: ParamKey, value: Fp) {
        let Some(component) = self.root.find_component_mut(target) else {
            warn!(target = %target, "parameter target missing, skipping");
            return;
        };
        match param {
            ParamKey::SpinnerSpeed => {
                if let ComponentData::Spinner(def) = &mut component.data {
                    def.speed = value;
                } else {
                    warn!(target = %target, "parameter target is not a spinner, skipping");
                }
            }
            ParamKey::DoorDuration => {
                if let ComponentData::Door(def) = &mut component.data {
                    def.duration_ticks = value.floor_int().max(1) as u32;
                } else {
                    warn!(target = %target, "parameter target is not a door, skipping");
                }
            }
            ParamKey::Enabled => {
                // Colliders and bodies are baked into the physics world at
                // build time; toggling them live would desync restores.
                if matches!(
                    component.data,
                    ComponentData::Collider(_) | ComponentData::Body(_)
                ) {
                    warn!(target = %target, "physics components cannot be toggled, skipping");
                    return;
                }
                component.enabled = value != Fp::ZERO;
            }
        }
    }

    /// Arm every closed door. Returns how many started moving.
    pub fn arm_doors(&mut self) -> usize {
        let mut armed = 0;
        self.root.visit_mut(&mut |obj| {
            for c in &mut obj.components {
                if !c.enabled {
                    continue;
                }
                if let ComponentData::Door(def) = &mut c.data {
                    if def.state == DoorState::Closed {
                        def.state = DoorState::Opening;
                        def.elapsed = 0;
                        armed += 1;
                    }
                }
            }
        });
        armed
    }

    /// Serialize everything a replica needs to rebuild this tile given the
    /// same catalog: id counters, the live tree, per-body dynamics keyed by
    /// object id, and the contact memory as object-id pairs. Handles never
    /// hit the wire.
    pub fn encode(&self, w: &mut Writer) {
        w.put_u16(self.template_index);
        self.alloc.encode(w);
        self.root.encode(w);
        let mut states = Vec::with_capacity(self.bindings.len());
        for (&id, binding) in &self.bindings {
            if let Some(body) = self.world.body(binding.handle) {
                states.push((id, binding.swing, body));
            }
        }
        w.put_u32(states.len() as u32);
        for (id, swing, body) in states {
            id.encode(w);
            body.position.encode(w);
            body.angle.encode(w);
            body.velocity.encode(w);
            body.angular_velocity.encode(w);
            swing.encode(w);
        }
        encode_pairs(w, self.remembered_pairs(self.ctx.remembered_solid()));
        encode_pairs(w, self.remembered_pairs(self.ctx.remembered_trigger()));
    }

    /// Contact-memory pairs as object ids, low id first, ascending. The
    /// same logical memory serializes identically whatever the live
    /// handle numbering was.
    fn remembered_pairs(
        &self,
        pairs: impl Iterator<Item = (BodyHandle, BodyHandle)>,
    ) -> Vec<(RuntimeId, RuntimeId)> {
        let mut out = Vec::new();
        for (a, b) in pairs {
            let (Some(&ia), Some(&ib)) = (self.by_handle.get(&a), self.by_handle.get(&b)) else {
                warn!(%a, %b, "remembered pair references an unbound body");
                continue;
            };
            out.push(if ia <= ib { (ia, ib) } else { (ib, ia) });
        }
        out.sort();
        out
    }

    /// Rebuild a tile from [`Tile::encode`] output. Bodies are rebound from
    /// the decoded tree in traversal order, then overwritten with the
    /// serialized dynamics and contact memory, so the next step classifies
    /// enter/stay exactly as an uninterrupted run would.
    pub fn decode(r: &mut Reader<'_>, catalog: &TemplateCatalog) -> Result<Tile, TileError> {
        let template_index = r.get_u16()?;
        let template = catalog
            .get(template_index)
            .ok_or(TileError::UnknownTemplate {
                index: template_index,
            })?
            .clone();
        let alloc = IdAlloc::decode(r)?;
        let root = SimObject::decode(r)?;
        let world = world_for(&template);
        let mut tile = Tile {
            template_index,
            template,
            alloc,
            root,
            world,
            bindings: BTreeMap::new(),
            by_handle: BTreeMap::new(),
            ctx: StepContext::new(),
            destroy_queue: Vec::new(),
        };
        bind_subtree(
            &tile.root,
            &FpTransform::IDENTITY,
            &mut tile.world,
            &mut tile.bindings,
            &mut tile.by_handle,
        )?;
        let count = r.get_u32()? as usize;
        if count != tile.bindings.len() {
            return Err(TileError::StateMismatch {
                serialized: count,
                bound: tile.bindings.len(),
            });
        }
        for _ in 0..count {
            let id = RuntimeId::decode(r)?;
            let position = FpVec2::decode(r)?;
            let angle = Fp::decode(r)?;
            let velocity = FpVec2::decode(r)?;
            let angular_velocity = Fp::decode(r)?;
            let swing = FpQuat::decode(r)?;
            let Some(binding) = tile.bindings.get_mut(&id) else {
                return Err(TileError::UnboundState { object: id });
            };
            binding.swing = swing;
            let handle = binding.handle;
            let Some(body) = tile.world.body_mut(handle) else {
                return Err(TileError::UnboundState { object: id });
            };
            body.position = position;
            body.angle = angle;
            body.velocity = velocity;
            body.angular_velocity = angular_velocity;
        }
        let solid = decode_pairs(r, &tile.bindings)?;
        let trigger = decode_pairs(r, &tile.bindings)?;
        tile.ctx.remember(solid, trigger);
        Ok(tile)
    }
}

fn world_for(template: &TileTemplate) -> World {
    let mut world = World::new(template.gravity);
    world.velocity_iterations = template.velocity_iterations;
    world.position_iterations = template.position_iterations;
    world
}

fn encode_pairs(w: &mut Writer, pairs: Vec<(RuntimeId, RuntimeId)>) {
    w.put_u32(pairs.len() as u32);
    for (a, b) in pairs {
        a.encode(w);
        b.encode(w);
    }
}

fn decode_pairs(
    r: &mut Reader<'_>,
    bindings: &BTreeMap<RuntimeId, Binding>,
) -> Result<Vec<(BodyHandle, BodyHandle)>, TileError> {
    let count = r.get_u32()? as usize;
    let mut out = Vec::new();
    for _ in 0..count {
        let a = RuntimeId::decode(r)?;
        let b = RuntimeId::decode(r)?;
        let handle = |id: RuntimeId| {
            bindings
                .get(&id)
                .map(|binding| binding.handle)
                .ok_or(TileError::UnboundContact { object: id })
        };
        out.push((handle(a)?, handle(b)?));
    }
    Ok(out)
}

/// Walk a subtree building a body for every object that carries both a
/// collider and a body component. A body without a collider is an
/// authoring error; a collider without a body is inert decoration.
///
/// Traversal order is pre-order, so rebuilding the same tree always hands
/// out the same handles.
fn bind_subtree(
    node: &SimObject,
    parent: &FpTransform,
    world: &mut World,
    bindings: &mut BTreeMap<RuntimeId, Binding>,
    by_handle: &mut BTreeMap<BodyHandle, RuntimeId>,
) -> Result<(), TileError> {
    let wt = FpTransform::combine(parent, &node.local);
    match (node.collider(), node.body_def()) {
        (Some(collider), Some(def)) => {
            let shape = match collider.shape {
                ColliderShape::Circle { radius } => Shape::Circle {
                    radius: radius * wt.scale.x.abs().max(wt.scale.y.abs()),
                },
                ColliderShape::Box { half } => Shape::Box {
                    half: FpVec2::new(half.x * wt.scale.x.abs(), half.y * wt.scale.y.abs()),
                },
            };
            let mut body = Body::new(def.kind, shape);
            body.position = wt.position.to_plane();
            let (swing, angle) = wt.rotation.swing_twist_z();
            body.angle = angle;
            body.friction = def.friction;
            body.restitution = def.restitution;
            body.gravity_scale = def.gravity_scale;
            body.is_trigger = collider.is_trigger;
            body.set_mass(def.mass);
            let handle = world.add_body(body);
            bindings.insert(node.id, Binding { handle, swing });
            by_handle.insert(handle, node.id);
        }
        (None, Some(_)) => {
            return Err(TileError::MissingCollider { object: node.id });
        }
        _ => {}
    }
    for child in &node.children {
        bind_subtree(child, &wt, world, bindings, by_handle)?;
    }
    Ok(())
}
