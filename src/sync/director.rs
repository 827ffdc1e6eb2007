//! Server-side round flow reacting to replayed outputs

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::{Entrant, InputEvent, OutputEvent, TILE_COUNT};

/// Round flow delays, in authority ticks.
#[derive(Clone, Copy, Debug)]
pub struct DirectorConfig {
    /// Ticks after a spin settles before the doors arm.
    pub door_delay: u32,
    /// Ticks after the doors arm before gameplay opens; covers door
    /// travel plus the bidding window.
    pub gameplay_delay: u32,
    /// Ticks after a round finishes before the slot spins again.
    pub respin_delay: u32,
    /// Seed for the template roulette.
    pub seed: u64,
}

impl Default for DirectorConfig {
    fn default() -> DirectorConfig {
        DirectorConfig {
            door_delay: 30,
            gameplay_delay: 300,
            respin_delay: 420,
            seed: 0,
        }
    }
}

/// Drives rounds from the authority side.
///
/// Consumes the server-destined outputs of batch replay and answers with
/// delayed follow-up commands for the pending queue. Given the same seed
/// and the same outputs it always schedules the same commands.
pub struct RoundDirector {
    config: DirectorConfig,
    template_count: u16,
    rng: ChaCha8Rng,
    rosters: [Vec<Entrant>; TILE_COUNT],
    scores: BTreeMap<Uuid, u64>,
}

impl RoundDirector {
    pub fn new(config: DirectorConfig, template_count: u16) -> RoundDirector {
        RoundDirector {
            config,
            template_count: template_count.max(1),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            rosters: std::array::from_fn(|_| Vec::new()),
            scores: BTreeMap::new(),
        }
    }

    /// Set the entrants a slot's next round opens with.
    pub fn set_roster(&mut self, slot: usize, entrants: Vec<Entrant>) {
        if let Some(roster) = self.rosters.get_mut(slot) {
            *roster = entrants;
        }
    }

    /// Accumulated points per owner, over every round so far.
    pub fn scores(&self) -> &BTreeMap<Uuid, u64> {
        &self.scores
    }

    /// Turn one replay's server-destined outputs into `(delay, command)`
    /// pairs for the pending queue.
    pub fn react(&mut self, outputs: &[OutputEvent]) -> Vec<(u32, InputEvent)> {
        let mut commands = Vec::new();
        for event in outputs {
            match event {
                OutputEvent::SpinFinished { slot } => {
                    let slot = *slot;
                    commands.push((self.config.door_delay, InputEvent::StartDoor { slot }));
                    let entrants = self
                        .rosters
                        .get(slot as usize)
                        .cloned()
                        .unwrap_or_default();
                    commands.push((
                        self.config.door_delay + self.config.gameplay_delay,
                        InputEvent::GameplayStart { slot, entrants },
                    ));
                }
                OutputEvent::RoundFinished { slot, rankings } => {
                    info!(slot = *slot, placed = rankings.len(), "round complete");
                    let template = self.rng.gen_range(0..self.template_count);
                    commands.push((
                        self.config.respin_delay,
                        InputEvent::SpinToTile {
                            slot: *slot,
                            template,
                        },
                    ));
                }
                OutputEvent::ScoreAwarded { owner, points, .. } => {
                    *self.scores.entry(*owner).or_insert(0) += u64::from(*points);
                }
                OutputEvent::DetectorFired {
                    detector, marble, ..
                } => {
                    debug!(detector = %detector, marble = %marble, "detector fired");
                }
                _ => {}
            }
        }
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entrant(n: u128) -> Entrant {
        Entrant {
            user: Uuid::from_u128(n),
            display_name: format!("p{n}"),
        }
    }

    #[test]
    fn a_settled_spin_schedules_doors_then_gameplay() {
        let mut director = RoundDirector::new(DirectorConfig::default(), 2);
        director.set_roster(0, vec![entrant(1), entrant(2)]);
        let commands = director.react(&[OutputEvent::SpinFinished { slot: 0 }]);
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].0, DirectorConfig::default().door_delay);
        assert!(matches!(commands[0].1, InputEvent::StartDoor { slot: 0 }));
        match &commands[1].1 {
            InputEvent::GameplayStart { slot: 0, entrants } => assert_eq!(entrants.len(), 2),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn a_finished_round_schedules_the_next_spin() {
        let mut director = RoundDirector::new(DirectorConfig::default(), 2);
        let commands = director.react(&[OutputEvent::RoundFinished {
            slot: 1,
            rankings: vec![Uuid::from_u128(1)],
        }]);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].0, DirectorConfig::default().respin_delay);
        match &commands[0].1 {
            InputEvent::SpinToTile { slot: 1, template } => assert!(*template < 2),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn equal_seeds_pick_equal_templates() {
        let finish = OutputEvent::RoundFinished {
            slot: 0,
            rankings: Vec::new(),
        };
        let mut a = RoundDirector::new(DirectorConfig::default(), 7);
        let mut b = RoundDirector::new(DirectorConfig::default(), 7);
        for _ in 0..20 {
            assert_eq!(a.react(&[finish.clone()]), b.react(&[finish.clone()]));
        }
    }

    #[test]
    fn scores_accumulate_per_owner() {
        let mut director = RoundDirector::new(DirectorConfig::default(), 2);
        let owner = Uuid::from_u128(5);
        director.react(&[
            OutputEvent::ScoreAwarded {
                slot: 0,
                owner,
                points: 100,
            },
            OutputEvent::ScoreAwarded {
                slot: 1,
                owner,
                points: 250,
            },
        ]);
        assert_eq!(director.scores().get(&owner), Some(&350));
    }
}
