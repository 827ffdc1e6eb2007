//! Simulation object model: tree, components, identity

pub mod component;
pub mod id;
pub mod object;
pub mod spawn;

pub use component::{
    BodyDef, ColliderDef, ColliderShape, Component, ComponentData, DetectorDef, DetectorResponse,
    DoorDef, DoorState, MarbleDef, SpinnerDef, WrapDef,
};
pub use id::{ComponentId, IdAlloc, RuntimeId};
pub use object::SimObject;
pub use spawn::instantiate;
