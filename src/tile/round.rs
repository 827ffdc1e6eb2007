//! Round flow layered on top of one simulated tile

use std::fmt;

use tracing::warn;
use uuid::Uuid;

use crate::core::event::{Entrant, InputEvent, OutputEvent};
use crate::math::{Fp, FpVec3};
use crate::util::time::FIXED_DT;
use crate::wire::{Decode, Encode, Reader, WireError, Writer};

use super::{TemplateCatalog, Tile, TileError, TileTemplate};

/// Ticks the spin-in presentation runs before the round can open.
const SPIN_TICKS: u32 = 180;
/// Ticks the scoreboard lingers before the tile reads as finished.
const SCORING_TICKS: u32 = 300;
/// Spin-in starting rate in radians per second, decaying linearly to zero.
const SPIN_RATE_MAX: Fp = Fp::TAU;

/// Where a tile is in its round lifecycle.
///
/// The cycle runs spinning, door opening, bidding, gameplay, scoring,
/// finished; a spin event tears the tile down and starts it over.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TilePhase {
    Spinning,
    DoorOpening,
    Bidding,
    Gameplay,
    Scoring,
    Finished,
}

impl fmt::Display for TilePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TilePhase::Spinning => "spinning",
            TilePhase::DoorOpening => "door_opening",
            TilePhase::Bidding => "bidding",
            TilePhase::Gameplay => "gameplay",
            TilePhase::Scoring => "scoring",
            TilePhase::Finished => "finished",
        };
        write!(f, "{name}")
    }
}

impl Encode for TilePhase {
    fn encode(&self, w: &mut Writer) {
        w.put_u8(match self {
            TilePhase::Spinning => 0,
            TilePhase::DoorOpening => 1,
            TilePhase::Bidding => 2,
            TilePhase::Gameplay => 3,
            TilePhase::Scoring => 4,
            TilePhase::Finished => 5,
        });
    }
}

impl Decode for TilePhase {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        match r.get_u8()? {
            0 => Ok(TilePhase::Spinning),
            1 => Ok(TilePhase::DoorOpening),
            2 => Ok(TilePhase::Bidding),
            3 => Ok(TilePhase::Gameplay),
            4 => Ok(TilePhase::Scoring),
            5 => Ok(TilePhase::Finished),
            bad => Err(WireError::InvalidTag {
                kind: "TilePhase",
                tag: bad as u32,
            }),
        }
    }
}

/// Round bookkeeping for one tile slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Round {
    pub phase: TilePhase,
    /// Countdown inside timed phases, zero elsewhere.
    pub ticks_left: u32,
    /// Entrant owners for the running round, in registration order.
    pub entrants: Vec<Uuid>,
    /// Owners in the order their marble was lost.
    pub eliminated: Vec<Uuid>,
}

impl Round {
    fn spinning() -> Round {
        Round {
            phase: TilePhase::Spinning,
            ticks_left: SPIN_TICKS,
            entrants: Vec::new(),
            eliminated: Vec::new(),
        }
    }
}

impl Encode for Round {
    fn encode(&self, w: &mut Writer) {
        self.phase.encode(w);
        w.put_u32(self.ticks_left);
        self.entrants.encode(w);
        self.eliminated.encode(w);
    }
}

impl Decode for Round {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(Round {
            phase: TilePhase::decode(r)?,
            ticks_left: r.get_u32()?,
            entrants: Vec::<Uuid>::decode(r)?,
            eliminated: Vec::<Uuid>::decode(r)?,
        })
    }
}

/// One tile slot with its round flow: the simulation plus the phase
/// machine driving it between rounds.
///
/// Input events mutate state here and in the tile; everything a phase
/// decision reads comes from simulation outputs of the same tick, so the
/// flow stays deterministic under replay.
#[derive(Debug)]
pub struct GameTile {
    pub sim: Tile,
    pub round: Round,
}

impl GameTile {
    /// Build a fresh tile spinning in. Emits nothing; new state reaches
    /// replicas by snapshot, not by event.
    pub fn new(
        template_index: u16,
        template: TileTemplate,
        world_id: u32,
    ) -> Result<GameTile, TileError> {
        Ok(GameTile {
            sim: Tile::new(template_index, template, world_id)?,
            round: Round::spinning(),
        })
    }

    /// Tear the slot down and rebuild it from another template. The old
    /// tile stays untouched when the rebuild fails.
    pub fn respin(
        &mut self,
        template_index: u16,
        template: TileTemplate,
        world_id: u32,
        slot: u8,
        out: &mut Vec<OutputEvent>,
    ) -> Result<(), TileError> {
        let sim = Tile::new(template_index, template, world_id)?;
        self.sim = sim;
        self.round = Round::spinning();
        out.push(OutputEvent::PhaseChanged {
            slot,
            phase: TilePhase::Spinning,
        });
        Ok(())
    }

    /// Apply one routed input event.
    pub fn apply(&mut self, event: &InputEvent, slot: u8, out: &mut Vec<OutputEvent>) {
        match event {
            InputEvent::Attack {
                origin,
                radius,
                impulse,
                ..
            } => self.sim.apply_attack(*origin, *radius, *impulse),
            InputEvent::SpawnMarble {
                owner, position, ..
            } => {
                if let Some(id) = self.sim.spawn_marble(*owner, FpVec3::from_plane(*position)) {
                    out.push(OutputEvent::MarbleSpawned {
                        slot,
                        marble: id,
                        owner: *owner,
                    });
                }
            }
            InputEvent::SetParam {
                target,
                param,
                value,
                ..
            } => self.sim.set_param(*target, *param, *value),
            InputEvent::StartDoor { .. } => {
                if self.sim.arm_doors() > 0 {
                    self.set_phase(TilePhase::DoorOpening, slot, out);
                } else {
                    // doorless tiles open straight into bidding
                    self.set_phase(TilePhase::Bidding, slot, out);
                }
            }
            InputEvent::GameplayStart { entrants, .. } => {
                self.begin_gameplay(entrants, slot, out)
            }
            InputEvent::SpinToTile { .. } => {
                warn!(slot, "spin events must be routed through the core");
            }
        }
    }

    fn begin_gameplay(&mut self, entrants: &[Entrant], slot: u8, out: &mut Vec<OutputEvent>) {
        if self.round.phase == TilePhase::Gameplay {
            warn!(slot, "gameplay already running, skipping start");
            return;
        }
        self.round.entrants = entrants.iter().map(|e| e.user).collect();
        self.round.eliminated.clear();
        let points = self.sim.spawn_points();
        if points.is_empty() {
            warn!(slot, "tile has no spawn anchors, spawning at origin");
        }
        for (i, entrant) in entrants.iter().enumerate() {
            let position = if points.is_empty() {
                FpVec3::ZERO
            } else {
                points[i % points.len()]
            };
            if let Some(id) = self.sim.spawn_marble(entrant.user, position) {
                out.push(OutputEvent::MarbleSpawned {
                    slot,
                    marble: id,
                    owner: entrant.user,
                });
            }
        }
        self.set_phase(TilePhase::Gameplay, slot, out);
    }

    /// Advance one tick: phase timers, then the simulation, then phase
    /// decisions driven by what the simulation reported.
    pub fn step(&mut self, slot: u8, out: &mut Vec<OutputEvent>) {
        self.advance_timers(slot, out);
        let before = out.len();
        self.sim.step(slot, out);
        self.observe_outputs(slot, before, out);
    }

    fn advance_timers(&mut self, slot: u8, out: &mut Vec<OutputEvent>) {
        match self.round.phase {
            TilePhase::Spinning => {
                if self.round.ticks_left > 0 {
                    let rate = SPIN_RATE_MAX
                        * Fp::from_ratio(self.round.ticks_left as i64, SPIN_TICKS as i64);
                    self.sim.rotate_root(rate * FIXED_DT);
                    self.round.ticks_left -= 1;
                    if self.round.ticks_left == 0 {
                        out.push(OutputEvent::SpinFinished { slot });
                    }
                }
            }
            TilePhase::Scoring => {
                if self.round.ticks_left > 0 {
                    self.round.ticks_left -= 1;
                    if self.round.ticks_left == 0 {
                        self.set_phase(TilePhase::Finished, slot, out);
                    }
                }
            }
            _ => {}
        }
    }

    fn observe_outputs(&mut self, slot: u8, before: usize, out: &mut Vec<OutputEvent>) {
        let mut door_opened = false;
        let mut destroyed = Vec::new();
        for ev in &out[before..] {
            match ev {
                OutputEvent::DoorOpened { slot: s } if *s == slot => door_opened = true,
                OutputEvent::MarbleDestroyed { slot: s, owner, .. } if *s == slot => {
                    destroyed.push(*owner)
                }
                _ => {}
            }
        }
        if self.round.phase == TilePhase::Gameplay {
            for owner in destroyed {
                if !self.round.eliminated.contains(&owner) {
                    self.round.eliminated.push(owner);
                }
            }
        }
        if door_opened && self.round.phase == TilePhase::DoorOpening {
            self.set_phase(TilePhase::Bidding, slot, out);
        }
        if self.round.phase == TilePhase::Gameplay
            && !self.round.entrants.is_empty()
            && self.sim.marble_count() == 0
        {
            let mut rankings = self.round.eliminated.clone();
            for user in &self.round.entrants {
                if !rankings.contains(user) {
                    rankings.push(*user);
                }
            }
            out.push(OutputEvent::RoundFinished { slot, rankings });
            self.set_phase(TilePhase::Scoring, slot, out);
        }
    }

    fn set_phase(&mut self, phase: TilePhase, slot: u8, out: &mut Vec<OutputEvent>) {
        if self.round.phase == phase {
            return;
        }
        self.round.phase = phase;
        self.round.ticks_left = match phase {
            TilePhase::Spinning => SPIN_TICKS,
            TilePhase::Scoring => SCORING_TICKS,
            _ => 0,
        };
        out.push(OutputEvent::PhaseChanged { slot, phase });
    }

    pub fn encode(&self, w: &mut Writer) {
        self.sim.encode(w);
        self.round.encode(w);
    }

    pub fn decode(r: &mut Reader<'_>, catalog: &TemplateCatalog) -> Result<GameTile, TileError> {
        Ok(GameTile {
            sim: Tile::decode(r, catalog)?,
            round: Round::decode(r)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::standard_catalog;
    use crate::wire::{decode_from_slice, encode_to_vec};

    fn entrants(n: u128) -> Vec<Entrant> {
        (0..n)
            .map(|i| Entrant {
                user: Uuid::from_u128(0x100 + i),
                display_name: format!("player{i}"),
            })
            .collect()
    }

    fn tile_bytes(gt: &GameTile) -> Vec<u8> {
        let mut w = Writer::new();
        gt.encode(&mut w);
        w.into_vec()
    }

    #[test]
    fn phases_round_trip_on_the_wire() {
        for phase in [
            TilePhase::Spinning,
            TilePhase::DoorOpening,
            TilePhase::Bidding,
            TilePhase::Gameplay,
            TilePhase::Scoring,
            TilePhase::Finished,
        ] {
            let back: TilePhase = decode_from_slice(&encode_to_vec(&phase)).expect("decode");
            assert_eq!(back, phase);
        }
    }

    #[test]
    fn round_runs_the_whole_phase_script() {
        let catalog = standard_catalog();
        let template = catalog.get(0).expect("template").clone();
        let mut gt = GameTile::new(0, template, 1).expect("tile builds");
        assert_eq!(gt.round.phase, TilePhase::Spinning);

        // spin-in runs its timer down and announces completion once
        let mut out = Vec::new();
        for _ in 0..SPIN_TICKS {
            gt.step(0, &mut out);
        }
        assert_eq!(
            out.iter()
                .filter(|e| matches!(e, OutputEvent::SpinFinished { .. }))
                .count(),
            1
        );
        assert_eq!(gt.round.phase, TilePhase::Spinning);

        // doors open, then bidding
        let mut out = Vec::new();
        gt.apply(&InputEvent::StartDoor { slot: 0 }, 0, &mut out);
        assert_eq!(gt.round.phase, TilePhase::DoorOpening);
        let mut out = Vec::new();
        for _ in 0..600 {
            gt.step(0, &mut out);
            if gt.round.phase != TilePhase::DoorOpening {
                break;
            }
        }
        assert!(out.iter().any(|e| matches!(e, OutputEvent::DoorOpened { .. })));
        assert_eq!(gt.round.phase, TilePhase::Bidding);

        // gameplay spawns one marble per entrant
        let players = entrants(2);
        let mut out = Vec::new();
        gt.apply(
            &InputEvent::GameplayStart {
                slot: 0,
                entrants: players.clone(),
            },
            0,
            &mut out,
        );
        assert_eq!(gt.round.phase, TilePhase::Gameplay);
        assert_eq!(
            out.iter()
                .filter(|e| matches!(e, OutputEvent::MarbleSpawned { .. }))
                .count(),
            2
        );
        assert_eq!(gt.sim.marble_count(), 2);

        // the sink tile swallows every marble, finishing the round
        let mut out = Vec::new();
        for _ in 0..600 {
            gt.step(0, &mut out);
            if gt.round.phase != TilePhase::Gameplay {
                break;
            }
        }
        let rankings = out.iter().find_map(|e| match e {
            OutputEvent::RoundFinished { rankings, .. } => Some(rankings.clone()),
            _ => None,
        });
        let rankings = rankings.expect("round finished");
        assert_eq!(rankings.len(), 2);
        for p in &players {
            assert!(rankings.contains(&p.user));
        }
        assert_eq!(gt.round.phase, TilePhase::Scoring);

        // scoring lingers, then the tile reads as finished
        let mut out = Vec::new();
        for _ in 0..SCORING_TICKS {
            gt.step(0, &mut out);
        }
        assert_eq!(gt.round.phase, TilePhase::Finished);

        // a respin hands the slot a fresh world
        let old_world = gt.sim.world_id();
        let mut out = Vec::new();
        gt.respin(
            1,
            catalog.get(1).expect("template").clone(),
            9,
            0,
            &mut out,
        )
        .expect("respin");
        assert_eq!(gt.round.phase, TilePhase::Spinning);
        assert_ne!(gt.sim.world_id(), old_world);
        assert!(out.iter().any(|e| matches!(
            e,
            OutputEvent::PhaseChanged {
                phase: TilePhase::Spinning,
                ..
            }
        )));
    }

    #[test]
    fn doorless_tiles_open_straight_into_bidding() {
        let catalog = standard_catalog();
        let mut template = catalog.get(0).expect("template").clone();
        // strip the door so arming finds nothing
        template.root.visit_mut(&mut |obj| {
            obj.components
                .retain(|c| !matches!(c.data, crate::scene::ComponentData::Door(_)));
        });
        let mut gt = GameTile::new(0, template, 1).expect("tile builds");
        let mut out = Vec::new();
        gt.apply(&InputEvent::StartDoor { slot: 0 }, 0, &mut out);
        assert_eq!(gt.round.phase, TilePhase::Bidding);
    }

    #[test]
    fn mid_round_snapshot_restores_the_same_flow() {
        let catalog = standard_catalog();
        let template = catalog.get(0).expect("template").clone();
        let mut live = GameTile::new(0, template, 4).expect("tile builds");
        let mut out = Vec::new();
        for _ in 0..SPIN_TICKS {
            live.step(0, &mut out);
        }
        live.apply(&InputEvent::StartDoor { slot: 0 }, 0, &mut out);
        for _ in 0..240 {
            live.step(0, &mut out);
        }
        live.apply(
            &InputEvent::GameplayStart {
                slot: 0,
                entrants: entrants(3),
            },
            0,
            &mut out,
        );
        for _ in 0..20 {
            live.step(0, &mut out);
        }

        let bytes = tile_bytes(&live);
        let mut r = Reader::new(&bytes);
        let mut restored = GameTile::decode(&mut r, &catalog).expect("decode");
        assert_eq!(tile_bytes(&restored), bytes);
        assert_eq!(restored.round, live.round);

        for _ in 0..120 {
            let mut live_out = Vec::new();
            let mut restored_out = Vec::new();
            live.step(0, &mut live_out);
            restored.step(0, &mut restored_out);
            assert_eq!(live_out, restored_out);
        }
        assert_eq!(tile_bytes(&live), tile_bytes(&restored));
    }
}
