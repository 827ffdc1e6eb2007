//! Input and output event unions crossing the simulation boundary

use uuid::Uuid;

use crate::math::{Fp, FpVec2};
use crate::scene::{ComponentId, RuntimeId};
use crate::tile::round::TilePhase;
use crate::wire::{Decode, Encode, Reader, WireError, Writer};

/// One player entering a round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entrant {
    pub user: Uuid,
    pub display_name: String,
}

impl Encode for Entrant {
    fn encode(&self, w: &mut Writer) {
        self.user.encode(w);
        w.put_str(&self.display_name);
    }
}

impl Decode for Entrant {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(Entrant {
            user: Uuid::decode(r)?,
            display_name: r.get_str()?,
        })
    }
}

/// Component parameter addressed by [`InputEvent::SetParam`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKey {
    SpinnerSpeed,
    DoorDuration,
    /// Toggle the component's enabled flag; nonzero value enables.
    Enabled,
}

/// Everything that can change simulation state from outside.
///
/// Input events are the only nondeterministic inputs the core accepts;
/// once they are ordered into a tick, every participant derives the same
/// next state. `slot` selects which of the two tiles the event addresses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    /// Radial shove: every marble inside the radius is pushed away from
    /// the origin, strongest at the center.
    Attack {
        slot: u8,
        attacker: Uuid,
        origin: FpVec2,
        radius: Fp,
        impulse: Fp,
    },
    SpawnMarble {
        slot: u8,
        owner: Uuid,
        position: FpVec2,
    },
    SetParam {
        slot: u8,
        target: ComponentId,
        param: ParamKey,
        value: Fp,
    },
    /// Arm every closed door on the tile.
    StartDoor { slot: u8 },
    /// Tear the tile down and rebuild it from the catalog template.
    SpinToTile { slot: u8, template: u16 },
    /// Open the round: spawn one marble per entrant at the tile's spawn
    /// anchors and switch to gameplay.
    GameplayStart { slot: u8, entrants: Vec<Entrant> },
}

impl InputEvent {
    pub fn slot(&self) -> u8 {
        match self {
            InputEvent::Attack { slot, .. }
            | InputEvent::SpawnMarble { slot, .. }
            | InputEvent::SetParam { slot, .. }
            | InputEvent::StartDoor { slot }
            | InputEvent::SpinToTile { slot, .. }
            | InputEvent::GameplayStart { slot, .. } => *slot,
        }
    }
}

impl Encode for InputEvent {
    fn encode(&self, w: &mut Writer) {
        match self {
            InputEvent::Attack {
                slot,
                attacker,
                origin,
                radius,
                impulse,
            } => {
                w.put_u8(0);
                w.put_u8(*slot);
                attacker.encode(w);
                origin.encode(w);
                radius.encode(w);
                impulse.encode(w);
            }
            InputEvent::SpawnMarble {
                slot,
                owner,
                position,
            } => {
                w.put_u8(1);
                w.put_u8(*slot);
                owner.encode(w);
                position.encode(w);
            }
            InputEvent::SetParam {
                slot,
                target,
                param,
                value,
            } => {
                w.put_u8(2);
                w.put_u8(*slot);
                target.encode(w);
                w.put_u8(match param {
                    ParamKey::SpinnerSpeed => 0,
                    ParamKey::DoorDuration => 1,
                    ParamKey::Enabled => 2,
                });
                value.encode(w);
            }
            InputEvent::StartDoor { slot } => {
                w.put_u8(3);
                w.put_u8(*slot);
            }
            InputEvent::SpinToTile { slot, template } => {
                w.put_u8(4);
                w.put_u8(*slot);
                w.put_u16(*template);
            }
            InputEvent::GameplayStart { slot, entrants } => {
                w.put_u8(5);
                w.put_u8(*slot);
                entrants.encode(w);
            }
        }
    }
}

impl Decode for InputEvent {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let tag = r.get_u8()?;
        match tag {
            0 => Ok(InputEvent::Attack {
                slot: r.get_u8()?,
                attacker: Uuid::decode(r)?,
                origin: FpVec2::decode(r)?,
                radius: Fp::decode(r)?,
                impulse: Fp::decode(r)?,
            }),
            1 => Ok(InputEvent::SpawnMarble {
                slot: r.get_u8()?,
                owner: Uuid::decode(r)?,
                position: FpVec2::decode(r)?,
            }),
            2 => {
                let slot = r.get_u8()?;
                let target = ComponentId::decode(r)?;
                let param = match r.get_u8()? {
                    0 => ParamKey::SpinnerSpeed,
                    1 => ParamKey::DoorDuration,
                    2 => ParamKey::Enabled,
                    bad => {
                        return Err(WireError::InvalidTag {
                            kind: "ParamKey",
                            tag: bad as u32,
                        })
                    }
                };
                Ok(InputEvent::SetParam {
                    slot,
                    target,
                    param,
                    value: Fp::decode(r)?,
                })
            }
            3 => Ok(InputEvent::StartDoor { slot: r.get_u8()? }),
            4 => Ok(InputEvent::SpinToTile {
                slot: r.get_u8()?,
                template: r.get_u16()?,
            }),
            5 => Ok(InputEvent::GameplayStart {
                slot: r.get_u8()?,
                entrants: Vec::<Entrant>::decode(r)?,
            }),
            bad => Err(WireError::InvalidTag {
                kind: "InputEvent",
                tag: bad as u32,
            }),
        }
    }
}

/// Which side of the sync boundary consumes an output event.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EventDest(u8);

impl EventDest {
    pub const CLIENT: EventDest = EventDest(0b01);
    pub const SERVER: EventDest = EventDest(0b10);
    pub const BOTH: EventDest = EventDest(0b11);

    pub fn includes_client(self) -> bool {
        self.0 & Self::CLIENT.0 != 0
    }

    pub fn includes_server(self) -> bool {
        self.0 & Self::SERVER.0 != 0
    }
}

/// Facts the simulation reports back while stepping.
///
/// Outputs never feed back into state; they exist so the hosting side can
/// react (presentation on clients, round flow on the authority). Each
/// variant has a fixed destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputEvent {
    MarbleSpawned {
        slot: u8,
        marble: RuntimeId,
        owner: Uuid,
    },
    MarbleDestroyed {
        slot: u8,
        marble: RuntimeId,
        owner: Uuid,
    },
    DetectorFired {
        slot: u8,
        detector: ComponentId,
        marble: RuntimeId,
    },
    ScoreAwarded {
        slot: u8,
        owner: Uuid,
        points: u32,
    },
    DoorOpened {
        slot: u8,
    },
    SpinFinished {
        slot: u8,
    },
    RoundFinished {
        slot: u8,
        /// Owners ordered by elimination, survivors last.
        rankings: Vec<Uuid>,
    },
    PhaseChanged {
        slot: u8,
        phase: TilePhase,
    },
}

impl OutputEvent {
    pub fn dest(&self) -> EventDest {
        match self {
            OutputEvent::MarbleSpawned { .. } => EventDest::CLIENT,
            OutputEvent::MarbleDestroyed { .. } => EventDest::BOTH,
            OutputEvent::DetectorFired { .. } => EventDest::SERVER,
            OutputEvent::ScoreAwarded { .. } => EventDest::BOTH,
            OutputEvent::DoorOpened { .. } => EventDest::CLIENT,
            OutputEvent::SpinFinished { .. } => EventDest::BOTH,
            OutputEvent::RoundFinished { .. } => EventDest::SERVER,
            OutputEvent::PhaseChanged { .. } => EventDest::CLIENT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{decode_from_slice, encode_to_vec};

    #[test]
    fn input_events_round_trip() {
        let events = vec![
            InputEvent::Attack {
                slot: 0,
                attacker: Uuid::from_u128(1),
                origin: FpVec2::new(Fp::from_int(2), Fp::from_int(-3)),
                radius: Fp::from_int(4),
                impulse: Fp::from_ratio(5, 2),
            },
            InputEvent::SpawnMarble {
                slot: 1,
                owner: Uuid::from_u128(2),
                position: FpVec2::ZERO,
            },
            InputEvent::SetParam {
                slot: 0,
                target: ComponentId::new(3, 7),
                param: ParamKey::DoorDuration,
                value: Fp::from_int(90),
            },
            InputEvent::StartDoor { slot: 1 },
            InputEvent::SpinToTile {
                slot: 0,
                template: 2,
            },
            InputEvent::GameplayStart {
                slot: 1,
                entrants: vec![Entrant {
                    user: Uuid::from_u128(9),
                    display_name: "ada".to_string(),
                }],
            },
        ];
        let bytes = encode_to_vec(&events);
        let back: Vec<InputEvent> = decode_from_slice(&bytes).expect("decode");
        assert_eq!(back, events);
    }

    #[test]
    fn slot_accessor_matches_variant() {
        assert_eq!(InputEvent::StartDoor { slot: 1 }.slot(), 1);
        assert_eq!(
            InputEvent::SpinToTile {
                slot: 0,
                template: 5
            }
            .slot(),
            0
        );
    }

    #[test]
    fn destinations_are_fixed_per_kind() {
        let spawned = OutputEvent::MarbleSpawned {
            slot: 0,
            marble: RuntimeId::new(1, 1),
            owner: Uuid::from_u128(1),
        };
        assert!(spawned.dest().includes_client());
        assert!(!spawned.dest().includes_server());

        let fired = OutputEvent::DetectorFired {
            slot: 0,
            detector: ComponentId::new(1, 1),
            marble: RuntimeId::new(1, 2),
        };
        assert!(fired.dest().includes_server());
        assert!(!fired.dest().includes_client());

        let destroyed = OutputEvent::MarbleDestroyed {
            slot: 0,
            marble: RuntimeId::new(1, 2),
            owner: Uuid::from_u128(1),
        };
        assert!(destroyed.dest().includes_client() && destroyed.dest().includes_server());
    }
}
