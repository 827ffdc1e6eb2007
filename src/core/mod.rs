//! Deterministic game core: two tile slots behind one tick sequence

pub mod event;
pub mod seq;

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{error, warn};

use crate::tile::round::GameTile;
use crate::tile::{TemplateCatalog, TileError};
use crate::wire::{Reader, WireError, Writer};

pub use event::{Entrant, EventDest, InputEvent, OutputEvent, ParamKey};
pub use seq::Seq;

/// Tile slots a core runs side by side.
pub const TILE_COUNT: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Tile(#[from] TileError),
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// The whole simulation state of one arena.
///
/// A core never talks to a clock or a network; callers feed it one
/// ordered input batch per tick and it hands back the tick's outputs.
/// Two cores given the same catalog, snapshot and inputs stay
/// bit-identical, which [`state_hash`](GameCore::state_hash) checks.
#[derive(Debug)]
pub struct GameCore {
    seq: Seq,
    next_world_id: u32,
    tiles: [GameTile; TILE_COUNT],
    catalog: Arc<TemplateCatalog>,
}

impl GameCore {
    /// Build a fresh core with both slots spun to the given templates.
    pub fn new(
        catalog: Arc<TemplateCatalog>,
        initial: [u16; TILE_COUNT],
    ) -> Result<GameCore, CoreError> {
        let build = |slot: usize, world_id: u32| -> Result<GameTile, CoreError> {
            let index = initial[slot];
            let template = catalog
                .get(index)
                .ok_or(TileError::UnknownTemplate { index })?
                .clone();
            Ok(GameTile::new(index, template, world_id)?)
        };
        let tiles = [build(0, 1)?, build(1, 2)?];
        Ok(GameCore {
            seq: Seq::ZERO,
            next_world_id: 3,
            tiles,
            catalog,
        })
    }

    /// Sequence of the next tick to run.
    pub fn seq(&self) -> Seq {
        self.seq
    }

    pub fn tile(&self, slot: usize) -> Option<&GameTile> {
        self.tiles.get(slot)
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    /// Run one tick: apply the ordered inputs, then step both tiles.
    pub fn step(&mut self, inputs: &[InputEvent]) -> Vec<OutputEvent> {
        let mut out = Vec::new();
        for event in inputs {
            self.apply(event, &mut out);
        }
        for slot in 0..TILE_COUNT {
            self.tiles[slot].step(slot as u8, &mut out);
        }
        self.seq.advance();
        out
    }

    fn apply(&mut self, event: &InputEvent, out: &mut Vec<OutputEvent>) {
        let slot = event.slot() as usize;
        if slot >= TILE_COUNT {
            warn!(slot, "input addresses a slot that does not exist, skipping");
            return;
        }
        if let InputEvent::SpinToTile { template, .. } = event {
            self.respin(slot, *template, out);
            return;
        }
        self.tiles[slot].apply(event, slot as u8, out);
    }

    fn respin(&mut self, slot: usize, index: u16, out: &mut Vec<OutputEvent>) {
        // the world id burns even when the spin fails, so every replica
        // keeps allocating identically
        let world_id = self.next_world_id;
        self.next_world_id += 1;
        let Some(template) = self.catalog.get(index) else {
            warn!(slot, index, "spin names an unknown template, keeping the old tile");
            return;
        };
        let template = template.clone();
        if let Err(err) = self.tiles[slot].respin(index, template, world_id, slot as u8, out) {
            error!(slot, error = %err, "tile rebuild failed, keeping the old tile");
        }
    }

    /// Serialize the full core state.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u16(self.seq.0);
        w.put_u32(self.next_world_id);
        for tile in &self.tiles {
            tile.encode(&mut w);
        }
        w.into_vec()
    }

    /// Rebuild a core from [`encode`](GameCore::encode) bytes. The catalog
    /// must match the one the bytes were produced against.
    pub fn decode(bytes: &[u8], catalog: Arc<TemplateCatalog>) -> Result<GameCore, CoreError> {
        let mut r = Reader::new(bytes);
        let seq = Seq(r.get_u16()?);
        let next_world_id = r.get_u32()?;
        let tiles = [
            GameTile::decode(&mut r, &catalog)?,
            GameTile::decode(&mut r, &catalog)?,
        ];
        r.expect_end()?;
        Ok(GameCore {
            seq,
            next_world_id,
            tiles,
            catalog,
        })
    }

    /// SHA-256 over the serialized state. Two replicas agreeing here hold
    /// bit-identical worlds.
    pub fn state_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.encode());
        hasher.finalize().into()
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.state_hash())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{standard_catalog, BASIN, GAUNTLET};
    use uuid::Uuid;

    fn demo_core() -> GameCore {
        GameCore::new(Arc::new(standard_catalog()), [BASIN, GAUNTLET]).expect("core builds")
    }

    fn entrants(n: u128) -> Vec<Entrant> {
        (0..n)
            .map(|i| Entrant {
                user: Uuid::from_u128(0x9000 + i),
                display_name: format!("p{i}"),
            })
            .collect()
    }

    /// A scripted stretch of play touching both slots.
    fn script(tick: u16) -> Vec<InputEvent> {
        match tick {
            180 => vec![InputEvent::StartDoor { slot: 0 }, InputEvent::StartDoor { slot: 1 }],
            300 => vec![
                InputEvent::GameplayStart {
                    slot: 0,
                    entrants: entrants(2),
                },
                InputEvent::GameplayStart {
                    slot: 1,
                    entrants: entrants(3),
                },
            ],
            330 => vec![InputEvent::Attack {
                slot: 1,
                attacker: Uuid::from_u128(0x9000),
                origin: crate::math::FpVec2::ZERO,
                radius: crate::math::Fp::from_int(8),
                impulse: crate::math::Fp::from_int(6),
            }],
            _ => Vec::new(),
        }
    }

    #[test]
    fn twin_cores_stay_bit_identical() {
        let mut a = demo_core();
        let mut b = demo_core();
        for tick in 0..420u16 {
            let inputs = script(tick);
            let out_a = a.step(&inputs);
            let out_b = b.step(&inputs);
            assert_eq!(out_a, out_b, "outputs diverged at tick {tick}");
            assert_eq!(a.state_hash(), b.state_hash(), "state diverged at tick {tick}");
        }
        assert_eq!(a.seq(), Seq(420));
    }

    #[test]
    fn snapshots_restore_and_re_encode_byte_identically() {
        let mut core = demo_core();
        for tick in 0..340u16 {
            core.step(&script(tick));
        }
        let bytes = core.encode();
        let restored =
            GameCore::decode(&bytes, Arc::new(standard_catalog())).expect("snapshot decodes");
        assert_eq!(restored.encode(), bytes);
        assert_eq!(restored.seq(), core.seq());
        assert_eq!(restored.state_hash(), core.state_hash());

        // and the restored replica keeps pace with the live one
        let mut live = core;
        let mut twin = restored;
        for tick in 340..420u16 {
            let inputs = script(tick);
            assert_eq!(live.step(&inputs), twin.step(&inputs));
        }
        assert_eq!(live.state_hash(), twin.state_hash());
    }

    #[test]
    fn sequence_wraps_through_zero() {
        let core = demo_core();
        let mut bytes = core.encode();
        // seq is the leading little-endian u16
        bytes[0] = 0xFE;
        bytes[1] = 0xFF;
        let mut core =
            GameCore::decode(&bytes, Arc::new(standard_catalog())).expect("snapshot decodes");
        assert_eq!(core.seq(), Seq(65_534));
        let mut seen = Vec::new();
        for _ in 0..4 {
            core.step(&[]);
            seen.push(core.seq());
        }
        assert_eq!(seen, vec![Seq(65_535), Seq(0), Seq(1), Seq(2)]);
        assert!(Seq(65_535).is_behind(Seq(1)));
    }

    #[test]
    fn out_of_range_slots_are_skipped_without_side_effects() {
        let mut touched = demo_core();
        let mut untouched = demo_core();
        let stray = InputEvent::StartDoor { slot: 7 };
        touched.step(&[stray]);
        untouched.step(&[]);
        assert_eq!(touched.state_hash(), untouched.state_hash());
    }

    #[test]
    fn failed_spins_still_burn_a_world_id() {
        let mut core = demo_core();
        core.step(&[InputEvent::SpinToTile {
            slot: 0,
            template: 99,
        }]);
        // the unknown template consumed world 3; the next spin gets 4
        core.step(&[InputEvent::SpinToTile {
            slot: 0,
            template: GAUNTLET,
        }]);
        let tile = core.tile(0).expect("slot");
        assert_eq!(tile.sim.world_id(), 4);
        assert_eq!(tile.sim.template_index(), GAUNTLET);
    }

    #[test]
    fn respin_emits_a_fresh_spinning_phase() {
        let mut core = demo_core();
        let out = core.step(&[InputEvent::SpinToTile {
            slot: 1,
            template: BASIN,
        }]);
        assert!(out.iter().any(|e| matches!(
            e,
            OutputEvent::PhaseChanged {
                slot: 1,
                phase: crate::tile::round::TilePhase::Spinning,
            }
        )));
    }
}
