//! Attachable behaviors carried by simulation objects

use uuid::Uuid;

use crate::math::{Fp, FpVec2, FpVec3};
use crate::physics::BodyKind;
use crate::wire::{Decode, Encode, Reader, WireError, Writer};

use super::id::ComponentId;

/// One component instance on a simulation object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Component {
    pub id: ComponentId,
    /// Disabled components keep their state but are skipped by every
    /// pipeline stage.
    pub enabled: bool,
    pub data: ComponentData,
}

impl Component {
    pub fn new(id: ComponentId, data: ComponentData) -> Component {
        Component {
            id,
            enabled: true,
            data,
        }
    }
}

/// Closed set of component behaviors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ComponentData {
    Collider(ColliderDef),
    Body(BodyDef),
    Marble(MarbleDef),
    Detector(DetectorDef),
    Wrap(WrapDef),
    Spinner(SpinnerDef),
    Door(DoorDef),
    /// Named world-space location, referenced by teleport detectors.
    Anchor,
}

/// Collision silhouette in the object's local frame. World scale is
/// applied when the physics body is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColliderShape {
    Circle { radius: Fp },
    Box { half: FpVec2 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColliderDef {
    pub shape: ColliderShape,
    /// Trigger colliders overlap without resolving and report through the
    /// trigger event channel.
    pub is_trigger: bool,
}

/// Physical properties for objects that participate in the solver.
/// An object needs both a collider and a body to get a physics presence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BodyDef {
    pub kind: BodyKind,
    pub mass: Fp,
    pub friction: Fp,
    pub restitution: Fp,
    pub gravity_scale: Fp,
}

impl BodyDef {
    pub fn fixed() -> BodyDef {
        BodyDef {
            kind: BodyKind::Static,
            mass: Fp::ZERO,
            friction: Fp::from_ratio(1, 2),
            restitution: Fp::ZERO,
            gravity_scale: Fp::ONE,
        }
    }

    pub fn dynamic(mass: Fp) -> BodyDef {
        BodyDef {
            kind: BodyKind::Dynamic,
            mass,
            friction: Fp::from_ratio(1, 2),
            restitution: Fp::ZERO,
            gravity_scale: Fp::ONE,
        }
    }
}

/// Marks an object subtree as one player's marble.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarbleDef {
    pub owner: Uuid,
}

/// What a detector does when a matching contact involves a marble.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectorResponse {
    /// Report the hit and nothing else.
    Announce,
    /// Queue the marble for end-of-step destruction.
    Destroy,
    /// Move the marble to the anchor component's world position.
    Teleport { target: ComponentId },
    /// Award points to the marble's owner, then destroy it.
    Score { points: u32 },
}

/// Contact filter plus response for one sensing object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetectorDef {
    pub on_trigger_enter: bool,
    pub on_trigger_stay: bool,
    pub on_collision_enter: bool,
    pub on_collision_stay: bool,
    pub response: DetectorResponse,
}

impl DetectorDef {
    /// Typical goal/hazard shape: react once when a marble arrives.
    pub fn on_enter(response: DetectorResponse) -> DetectorDef {
        DetectorDef {
            on_trigger_enter: true,
            on_trigger_stay: false,
            on_collision_enter: true,
            on_collision_stay: false,
            response,
        }
    }
}

/// Horizontal screen wrap: marbles leaving one edge teleport to the other,
/// keeping their velocity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WrapDef {
    pub min_x: Fp,
    pub max_x: Fp,
}

/// Continuous rotation about the object's local Z axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpinnerDef {
    /// Radians per second, applied each fixed step.
    pub speed: Fp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DoorState {
    Closed,
    Opening,
    Open,
}

/// Sliding gate. Game logic arms it; it then travels over a fixed number
/// of ticks and reports completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DoorDef {
    /// Total local-space displacement once fully open.
    pub travel: FpVec3,
    pub duration_ticks: u32,
    pub state: DoorState,
    pub elapsed: u32,
}

impl DoorDef {
    pub fn closed(travel: FpVec3, duration_ticks: u32) -> DoorDef {
        DoorDef {
            travel,
            duration_ticks,
            state: DoorState::Closed,
            elapsed: 0,
        }
    }
}

impl Encode for Component {
    fn encode(&self, w: &mut Writer) {
        self.id.encode(w);
        w.put_bool(self.enabled);
        self.data.encode(w);
    }
}

impl Decode for Component {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(Component {
            id: ComponentId::decode(r)?,
            enabled: r.get_bool()?,
            data: ComponentData::decode(r)?,
        })
    }
}

impl Encode for ComponentData {
    fn encode(&self, w: &mut Writer) {
        match self {
            ComponentData::Collider(def) => {
                w.put_u8(0);
                match def.shape {
                    ColliderShape::Circle { radius } => {
                        w.put_u8(0);
                        radius.encode(w);
                    }
                    ColliderShape::Box { half } => {
                        w.put_u8(1);
                        half.encode(w);
                    }
                }
                w.put_bool(def.is_trigger);
            }
            ComponentData::Body(def) => {
                w.put_u8(1);
                w.put_u8(match def.kind {
                    BodyKind::Static => 0,
                    BodyKind::Dynamic => 1,
                });
                def.mass.encode(w);
                def.friction.encode(w);
                def.restitution.encode(w);
                def.gravity_scale.encode(w);
            }
            ComponentData::Marble(def) => {
                w.put_u8(2);
                def.owner.encode(w);
            }
            ComponentData::Detector(def) => {
                w.put_u8(3);
                w.put_bool(def.on_trigger_enter);
                w.put_bool(def.on_trigger_stay);
                w.put_bool(def.on_collision_enter);
                w.put_bool(def.on_collision_stay);
                match def.response {
                    DetectorResponse::Announce => w.put_u8(0),
                    DetectorResponse::Destroy => w.put_u8(1),
                    DetectorResponse::Teleport { target } => {
                        w.put_u8(2);
                        target.encode(w);
                    }
                    DetectorResponse::Score { points } => {
                        w.put_u8(3);
                        w.put_u32(points);
                    }
                }
            }
            ComponentData::Wrap(def) => {
                w.put_u8(4);
                def.min_x.encode(w);
                def.max_x.encode(w);
            }
            ComponentData::Spinner(def) => {
                w.put_u8(5);
                def.speed.encode(w);
            }
            ComponentData::Door(def) => {
                w.put_u8(6);
                def.travel.encode(w);
                w.put_u32(def.duration_ticks);
                w.put_u8(match def.state {
                    DoorState::Closed => 0,
                    DoorState::Opening => 1,
                    DoorState::Open => 2,
                });
                w.put_u32(def.elapsed);
            }
            ComponentData::Anchor => w.put_u8(7),
        }
    }
}

impl Decode for ComponentData {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let tag = r.get_u8()?;
        match tag {
            0 => {
                let shape = match r.get_u8()? {
                    0 => ColliderShape::Circle {
                        radius: Fp::decode(r)?,
                    },
                    1 => ColliderShape::Box {
                        half: FpVec2::decode(r)?,
                    },
                    bad => {
                        return Err(WireError::InvalidTag {
                            kind: "ColliderShape",
                            tag: bad as u32,
                        })
                    }
                };
                Ok(ComponentData::Collider(ColliderDef {
                    shape,
                    is_trigger: r.get_bool()?,
                }))
            }
            1 => {
                let kind = match r.get_u8()? {
                    0 => BodyKind::Static,
                    1 => BodyKind::Dynamic,
                    bad => {
                        return Err(WireError::InvalidTag {
                            kind: "BodyKind",
                            tag: bad as u32,
                        })
                    }
                };
                Ok(ComponentData::Body(BodyDef {
                    kind,
                    mass: Fp::decode(r)?,
                    friction: Fp::decode(r)?,
                    restitution: Fp::decode(r)?,
                    gravity_scale: Fp::decode(r)?,
                }))
            }
            2 => Ok(ComponentData::Marble(MarbleDef {
                owner: Uuid::decode(r)?,
            })),
            3 => {
                let on_trigger_enter = r.get_bool()?;
                let on_trigger_stay = r.get_bool()?;
                let on_collision_enter = r.get_bool()?;
                let on_collision_stay = r.get_bool()?;
                let response = match r.get_u8()? {
                    0 => DetectorResponse::Announce,
                    1 => DetectorResponse::Destroy,
                    2 => DetectorResponse::Teleport {
                        target: ComponentId::decode(r)?,
                    },
                    3 => DetectorResponse::Score {
                        points: r.get_u32()?,
                    },
                    bad => {
                        return Err(WireError::InvalidTag {
                            kind: "DetectorResponse",
                            tag: bad as u32,
                        })
                    }
                };
                Ok(ComponentData::Detector(DetectorDef {
                    on_trigger_enter,
                    on_trigger_stay,
                    on_collision_enter,
                    on_collision_stay,
                    response,
                }))
            }
            4 => Ok(ComponentData::Wrap(WrapDef {
                min_x: Fp::decode(r)?,
                max_x: Fp::decode(r)?,
            })),
            5 => Ok(ComponentData::Spinner(SpinnerDef {
                speed: Fp::decode(r)?,
            })),
            6 => {
                let travel = FpVec3::decode(r)?;
                let duration_ticks = r.get_u32()?;
                let state = match r.get_u8()? {
                    0 => DoorState::Closed,
                    1 => DoorState::Opening,
                    2 => DoorState::Open,
                    bad => {
                        return Err(WireError::InvalidTag {
                            kind: "DoorState",
                            tag: bad as u32,
                        })
                    }
                };
                Ok(ComponentData::Door(DoorDef {
                    travel,
                    duration_ticks,
                    state,
                    elapsed: r.get_u32()?,
                }))
            }
            7 => Ok(ComponentData::Anchor),
            bad => Err(WireError::InvalidTag {
                kind: "ComponentData",
                tag: bad as u32,
            }),
        }
    }
}
