//! Owned object tree making up one tile's simulated scene

use crate::math::{FpQuat, FpTransform, FpVec3};
use crate::wire::{Decode, Encode, Reader, WireError, Writer};

use super::component::{
    BodyDef, ColliderDef, Component, ComponentData, DetectorDef, DoorDef, MarbleDef, SpinnerDef,
    WrapDef,
};
use super::id::{ComponentId, RuntimeId};

/// One node of the simulation tree. Owns its children outright, so a
/// subtree detach hands the whole branch back by value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimObject {
    pub id: RuntimeId,
    pub name: String,
    /// Transform relative to the parent object.
    pub local: FpTransform,
    /// Index into the presentation layer's prefab table. The simulation
    /// never reads it; it only rides along in snapshots.
    pub prefab: Option<u16>,
    pub components: Vec<Component>,
    pub children: Vec<SimObject>,
}

impl SimObject {
    pub fn new(id: RuntimeId, name: impl Into<String>) -> SimObject {
        SimObject {
            id,
            name: name.into(),
            local: FpTransform::IDENTITY,
            prefab: None,
            components: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn at(mut self, position: FpVec3) -> SimObject {
        self.local.position = position;
        self
    }

    pub fn rotated(mut self, rotation: FpQuat) -> SimObject {
        self.local.rotation = rotation;
        self
    }

    pub fn scaled(mut self, scale: FpVec3) -> SimObject {
        self.local.scale = scale;
        self
    }

    pub fn prefab(mut self, index: u16) -> SimObject {
        self.prefab = Some(index);
        self
    }

    pub fn with(mut self, component: Component) -> SimObject {
        self.components.push(component);
        self
    }

    pub fn child(mut self, child: SimObject) -> SimObject {
        self.children.push(child);
        self
    }

    pub fn find(&self, id: RuntimeId) -> Option<&SimObject> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    pub fn find_mut(&mut self, id: RuntimeId) -> Option<&mut SimObject> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    /// Remove the object with `id` from wherever it sits below this node
    /// and return it with its whole subtree. Cannot detach the node itself.
    pub fn detach(&mut self, id: RuntimeId) -> Option<SimObject> {
        if let Some(pos) = self.children.iter().position(|c| c.id == id) {
            return Some(self.children.remove(pos));
        }
        self.children.iter_mut().find_map(|c| c.detach(id))
    }

    /// Pre-order traversal.
    pub fn visit(&self, f: &mut impl FnMut(&SimObject)) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }

    /// Pre-order traversal with mutable access.
    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut SimObject)) {
        f(self);
        for child in &mut self.children {
            child.visit_mut(f);
        }
    }

    /// Pre-order traversal carrying each node's composed world transform.
    /// `parent` is the transform of the space this node's `local` lives in.
    pub fn visit_world(&self, parent: &FpTransform, f: &mut impl FnMut(&SimObject, &FpTransform)) {
        let world = FpTransform::combine(parent, &self.local);
        f(self, &world);
        for child in &self.children {
            child.visit_world(&world, f);
        }
    }

    /// World transform of a single descendant, composed along its path.
    pub fn world_of(&self, id: RuntimeId, parent: &FpTransform) -> Option<FpTransform> {
        let world = FpTransform::combine(parent, &self.local);
        if self.id == id {
            return Some(world);
        }
        self.children
            .iter()
            .find_map(|c| c.world_of(id, &world))
    }

    /// World transform of the space a descendant's `local` lives in, so a
    /// caller can convert a world-space result back into that local frame.
    pub fn parent_world_of(&self, id: RuntimeId, parent: &FpTransform) -> Option<FpTransform> {
        if self.id == id {
            return Some(*parent);
        }
        let world = FpTransform::combine(parent, &self.local);
        self.children
            .iter()
            .find_map(|c| c.parent_world_of(id, &world))
    }

    /// Locate a component anywhere in the subtree along with its owner.
    pub fn find_component(&self, id: ComponentId) -> Option<(&SimObject, &Component)> {
        for c in &self.components {
            if c.id == id {
                return Some((self, c));
            }
        }
        self.children.iter().find_map(|c| c.find_component(id))
    }

    pub fn find_component_mut(&mut self, id: ComponentId) -> Option<&mut Component> {
        if let Some(pos) = self.components.iter().position(|c| c.id == id) {
            return Some(&mut self.components[pos]);
        }
        self.children
            .iter_mut()
            .find_map(|c| c.find_component_mut(id))
    }

    pub fn collider(&self) -> Option<&ColliderDef> {
        self.components.iter().find_map(|c| match &c.data {
            ComponentData::Collider(def) if c.enabled => Some(def),
            _ => None,
        })
    }

    pub fn body_def(&self) -> Option<&BodyDef> {
        self.components.iter().find_map(|c| match &c.data {
            ComponentData::Body(def) if c.enabled => Some(def),
            _ => None,
        })
    }

    /// Marble identity is never behavior-gated: a disabled marble is still
    /// that player's marble.
    pub fn marble(&self) -> Option<&MarbleDef> {
        self.components.iter().find_map(|c| match &c.data {
            ComponentData::Marble(def) => Some(def),
            _ => None,
        })
    }

    /// Enabled detector on this object, with the component id events carry.
    pub fn detector(&self) -> Option<(ComponentId, &DetectorDef)> {
        self.components.iter().find_map(|c| match &c.data {
            ComponentData::Detector(def) if c.enabled => Some((c.id, def)),
            _ => None,
        })
    }

    pub fn wrap(&self) -> Option<&WrapDef> {
        self.components.iter().find_map(|c| match &c.data {
            ComponentData::Wrap(def) if c.enabled => Some(def),
            _ => None,
        })
    }

    pub fn spinner(&self) -> Option<&SpinnerDef> {
        self.components.iter().find_map(|c| match &c.data {
            ComponentData::Spinner(def) if c.enabled => Some(def),
            _ => None,
        })
    }

    pub fn door_mut(&mut self) -> Option<&mut DoorDef> {
        self.components.iter_mut().find_map(|c| match &mut c.data {
            ComponentData::Door(def) if c.enabled => Some(def),
            _ => None,
        })
    }
}

impl Encode for SimObject {
    fn encode(&self, w: &mut Writer) {
        self.id.encode(w);
        w.put_str(&self.name);
        self.local.encode(w);
        self.prefab.encode(w);
        self.components.encode(w);
        self.children.encode(w);
    }
}

impl Decode for SimObject {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(SimObject {
            id: RuntimeId::decode(r)?,
            name: r.get_str()?,
            local: FpTransform::decode(r)?,
            prefab: Option::<u16>::decode(r)?,
            components: Vec::<Component>::decode(r)?,
            children: Vec::<SimObject>::decode(r)?,
        })
    }
}
