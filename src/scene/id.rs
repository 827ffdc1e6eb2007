//! Serialization-stable identifiers for objects and components

use std::fmt;

use crate::wire::{Decode, Encode, Reader, WireError, Writer};

/// Identity of one simulation object, stable across serialize/deserialize.
///
/// The high 32 bits are the world id of the tile instance that created the
/// object, the low 32 bits a per-tile monotonic serial. A fresh tile world
/// id on every re-initialize means ids from a previous round can never
/// collide with live ones.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct RuntimeId(u64);

impl RuntimeId {
    /// Reserved null id; world 0 belongs to authored templates, never to a
    /// live tile.
    pub const NONE: RuntimeId = RuntimeId(0);

    pub const fn new(world: u32, serial: u32) -> RuntimeId {
        RuntimeId(((world as u64) << 32) | serial as u64)
    }

    pub const fn world(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub const fn serial(self) -> u32 {
        self.0 as u32
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn from_raw(raw: u64) -> RuntimeId {
        RuntimeId(raw)
    }
}

impl fmt::Display for RuntimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.world(), self.serial())
    }
}

/// Identity of one component, same world/serial split as [`RuntimeId`].
/// Object and component serials advance independently.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct ComponentId(u64);

impl ComponentId {
    pub const NONE: ComponentId = ComponentId(0);

    pub const fn new(world: u32, serial: u32) -> ComponentId {
        ComponentId(((world as u64) << 32) | serial as u64)
    }

    pub const fn world(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub const fn serial(self) -> u32 {
        self.0 as u32
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn from_raw(raw: u64) -> ComponentId {
        ComponentId(raw)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.world(), self.serial())
    }
}

/// Monotonic id source for one tile instance.
///
/// Serials start at 1 so the zero id stays a reliable "none". The counters
/// serialize with the tile, which keeps allocation deterministic across a
/// snapshot restore.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdAlloc {
    world: u32,
    next_object: u32,
    next_component: u32,
}

impl IdAlloc {
    pub fn new(world: u32) -> IdAlloc {
        IdAlloc {
            world,
            next_object: 1,
            next_component: 1,
        }
    }

    pub fn world(&self) -> u32 {
        self.world
    }

    pub fn next_object_id(&mut self) -> RuntimeId {
        let id = RuntimeId::new(self.world, self.next_object);
        self.next_object += 1;
        id
    }

    pub fn next_component_id(&mut self) -> ComponentId {
        let id = ComponentId::new(self.world, self.next_component);
        self.next_component += 1;
        id
    }
}

impl Encode for RuntimeId {
    fn encode(&self, w: &mut Writer) {
        w.put_u64(self.0);
    }
}

impl Decode for RuntimeId {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(RuntimeId(r.get_u64()?))
    }
}

impl Encode for ComponentId {
    fn encode(&self, w: &mut Writer) {
        w.put_u64(self.0);
    }
}

impl Decode for ComponentId {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(ComponentId(r.get_u64()?))
    }
}

impl Encode for IdAlloc {
    fn encode(&self, w: &mut Writer) {
        w.put_u32(self.world);
        w.put_u32(self.next_object);
        w.put_u32(self.next_component);
    }
}

impl Decode for IdAlloc {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(IdAlloc {
            world: r.get_u32()?,
            next_object: r.get_u32()?,
            next_component: r.get_u32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_packs_world_and_serial() {
        let id = RuntimeId::new(7, 42);
        assert_eq!(id.world(), 7);
        assert_eq!(id.serial(), 42);
        assert_eq!(format!("{}", id), "7:42");
    }

    #[test]
    fn alloc_is_monotonic_and_starts_at_one() {
        let mut alloc = IdAlloc::new(3);
        assert_eq!(alloc.next_object_id(), RuntimeId::new(3, 1));
        assert_eq!(alloc.next_object_id(), RuntimeId::new(3, 2));
        assert_eq!(alloc.next_component_id(), ComponentId::new(3, 1));
        assert_ne!(RuntimeId::new(3, 1).raw(), RuntimeId::NONE.raw());
    }

    #[test]
    fn ids_from_different_worlds_never_collide() {
        let a = RuntimeId::new(1, 5);
        let b = RuntimeId::new(2, 5);
        assert_ne!(a, b);
        assert!(a < b);
    }
}
