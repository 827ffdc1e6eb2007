//! End-to-end lockstep runs over the public crate surface.
//!
//! These drive the authority, the wire format and live replicas together
//! on the shipped tile catalog, covering whole-round flows that the
//! per-module unit tests slice thinner.

use std::collections::BTreeSet;
use std::sync::Arc;

use uuid::Uuid;

use marble_core::arena::{standard_catalog, BASIN, GAUNTLET};
use marble_core::core::{Entrant, GameCore, OutputEvent};
use marble_core::math::{Fp, FpVec2, FpVec3};
use marble_core::scene::{
    BodyDef, ColliderDef, ColliderShape, Component, ComponentData, ComponentId, DetectorDef,
    DetectorResponse, MarbleDef, RuntimeId, SimObject,
};
use marble_core::sync::{
    Authority, ClientSync, ClientTick, DirectorConfig, MemStore, RoundDirector, SyncConfig,
};
use marble_core::tile::round::TilePhase;
use marble_core::tile::{TemplateCatalog, Tile, TileTemplate};

fn entrants_from(start: u128, count: u128) -> Vec<Entrant> {
    (start..start + count)
        .map(|i| Entrant {
            user: Uuid::from_u128(i),
            display_name: format!("player-{i}"),
        })
        .collect()
}

/// Authority plus replicas on the standard catalog, with disjoint rosters
/// so the basin and gauntlet payouts cannot be confused.
fn pipeline(
    seed: u64,
    config: SyncConfig,
    replicas: usize,
) -> (Authority<MemStore>, Vec<ClientSync>, Arc<TemplateCatalog>) {
    let catalog = Arc::new(standard_catalog());
    let mut director = RoundDirector::new(
        DirectorConfig {
            seed,
            ..DirectorConfig::default()
        },
        catalog.len() as u16,
    );
    director.set_roster(0, entrants_from(1, 3));
    director.set_roster(1, entrants_from(11, 2));
    let mut authority = Authority::new(
        catalog.clone(),
        [BASIN, GAUNTLET],
        MemStore::new(),
        config,
        director,
    )
    .expect("authority boots");
    let boot = authority
        .latest_snapshot()
        .expect("store readable")
        .expect("bootstrap snapshot");
    let clients = (0..replicas)
        .map(|_| ClientSync::new(&boot, catalog.clone(), config).expect("replica boots"))
        .collect();
    (authority, clients, catalog)
}

fn drain(client: &mut ClientSync) {
    for _ in 0..512 {
        match client.on_tick() {
            ClientTick::Idle => return,
            ClientTick::Stepped { .. } => {}
            other => panic!("replica stalled while draining: {other:?}"),
        }
    }
    panic!("replica never went idle");
}

#[test]
fn twin_replicas_track_a_full_round_bit_for_bit() {
    let (mut authority, mut clients, _catalog) = pipeline(7, SyncConfig::default(), 2);

    let mut observed = Vec::new();
    for _ in 0..1_400u32 {
        if let Some(bundle) = authority.on_tick().expect("authority tick") {
            for client in clients.iter_mut() {
                client.on_auth_frame(&bundle);
            }
        }
        for (i, client) in clients.iter_mut().enumerate() {
            if let ClientTick::Stepped { outputs, .. } = client.on_tick() {
                if i == 0 {
                    observed.extend(outputs);
                }
            }
        }
    }
    for client in clients.iter_mut() {
        drain(client);
    }

    assert_eq!(clients[0].seq(), clients[1].seq());
    assert_eq!(
        clients[0].core().state_hash(),
        clients[1].core().state_hash()
    );

    // both slots finished a round and respun into fresh worlds
    let worlds: BTreeSet<u32> = (0..2)
        .map(|slot| clients[0].core().tile(slot).expect("slot").sim.world_id())
        .collect();
    assert_eq!(worlds, BTreeSet::from([3, 4]));

    // the basin trough paid every entrant; the gauntlet goal paid one
    // and its pit swallowed the other without paying
    let scores = authority.director().scores();
    for user in 1..=3u128 {
        assert_eq!(scores.get(&Uuid::from_u128(user)), Some(&100));
    }
    assert_eq!(scores.get(&Uuid::from_u128(12)), Some(&250));
    assert!(!scores.contains_key(&Uuid::from_u128(11)));

    // replicas get the presentation stream, never the flow-control stream
    assert!(observed
        .iter()
        .any(|e| matches!(e, OutputEvent::MarbleSpawned { .. })));
    assert!(observed
        .iter()
        .any(|e| matches!(e, OutputEvent::PhaseChanged { .. })));
    assert!(!observed
        .iter()
        .any(|e| matches!(e, OutputEvent::RoundFinished { .. })));
}

#[test]
fn a_stranded_replica_recovers_through_snapshot_restore() {
    // long batch window: the store holds at most ~100 frames at a time
    let config = SyncConfig {
        batch_interval: 100,
        ..SyncConfig::default()
    };
    let (mut authority, mut clients, _catalog) = pipeline(1, config, 2);

    let mut requested_at = None;
    for tick in 1..=500u32 {
        let bundle = authority.on_tick().expect("authority tick");
        if let Some(bundle) = &bundle {
            clients[0].on_auth_frame(bundle);
            // replica 1 hears nothing for two hundred ticks
            if !(101..=300).contains(&tick) {
                clients[1].on_auth_frame(bundle);
            }
        }

        match clients[0].on_tick() {
            ClientTick::Idle | ClientTick::Stepped { .. } => {}
            other => panic!("the connected replica drifted: {other:?}"),
        }
        if let ClientTick::SnapshotRequested = clients[1].on_tick() {
            assert!(requested_at.is_none(), "one restore should be enough");
            // stepping stays suspended until the snapshot lands
            assert!(matches!(
                clients[1].on_tick(),
                ClientTick::WaitingForSnapshot
            ));
            let snap = authority
                .latest_snapshot()
                .expect("store readable")
                .expect("snapshot on file");
            clients[1].install_snapshot(&snap).expect("snapshot installs");
            // resumes exactly at the snapshot sequence, no gaps
            assert_eq!(clients[1].seq(), snap.seq);
            requested_at = Some(tick);
        }
    }

    let requested_at = requested_at.expect("the deaf replica had to resync");
    assert!(requested_at > 300, "drift surfaces with the first live bundle");

    for client in clients.iter_mut() {
        drain(client);
    }
    assert_eq!(clients[0].seq(), clients[1].seq());
    assert_eq!(
        clients[0].core().state_hash(),
        clients[1].core().state_hash()
    );
}

#[test]
fn mid_round_snapshots_re_encode_byte_identically() {
    let (mut authority, _clients, catalog) = pipeline(3, SyncConfig::default(), 0);
    // deep enough that the latest batch lands mid-gameplay on the basin
    for _ in 0..560 {
        authority.on_tick().expect("authority tick");
    }

    let snap = authority
        .latest_snapshot()
        .expect("store readable")
        .expect("snapshot on file");
    let core = GameCore::decode(&snap.payload, catalog).expect("snapshot decodes");
    assert_eq!(core.seq(), snap.seq);

    let basin = core.tile(0).expect("slot 0");
    assert_eq!(basin.round.phase, TilePhase::Gameplay);
    assert_eq!(basin.sim.marble_count(), 3);

    assert_eq!(core.encode(), snap.payload);
}

/// A solid pedestal that announces marble contacts without consuming them.
fn announce_rig() -> Tile {
    let root = SimObject::new(RuntimeId::new(0, 1), "rig").child(
        SimObject::new(RuntimeId::new(0, 2), "pedestal")
            .with(Component::new(
                ComponentId::new(0, 1),
                ComponentData::Collider(ColliderDef {
                    shape: ColliderShape::Box {
                        half: FpVec2::new(Fp::from_int(2), Fp::ONE),
                    },
                    is_trigger: false,
                }),
            ))
            .with(Component::new(
                ComponentId::new(0, 2),
                ComponentData::Body(BodyDef::fixed()),
            ))
            .with(Component::new(
                ComponentId::new(0, 3),
                ComponentData::Detector(DetectorDef::on_enter(DetectorResponse::Announce)),
            )),
    );
    let marble = SimObject::new(RuntimeId::new(0, 10), "marble")
        .with(Component::new(
            ComponentId::new(0, 11),
            ComponentData::Collider(ColliderDef {
                shape: ColliderShape::Circle { radius: Fp::HALF },
                is_trigger: false,
            }),
        ))
        .with(Component::new(
            ComponentId::new(0, 12),
            ComponentData::Body(BodyDef::dynamic(Fp::ONE)),
        ))
        .with(Component::new(
            ComponentId::new(0, 13),
            ComponentData::Marble(MarbleDef { owner: Uuid::nil() }),
        ));
    let template = TileTemplate {
        name: "announce-rig".to_string(),
        root,
        marble: Some(marble),
        gravity: FpVec2::new(Fp::ZERO, Fp::from_int(-10)),
        velocity_iterations: 8,
        position_iterations: 3,
    };
    Tile::new(0, template, 1).expect("tile builds")
}

#[test]
fn a_marble_resting_on_a_detector_fires_exactly_once() {
    let mut tile = announce_rig();
    let owner = Uuid::from_u128(42);
    let marble = tile
        .spawn_marble(owner, FpVec3::new(Fp::ZERO, Fp::from_int(4), Fp::ZERO))
        .expect("marble spawns");

    // two seconds: enough to fall, land and sit on the pedestal
    let mut fired = 0usize;
    for _ in 0..120 {
        let mut out = Vec::new();
        tile.step(0, &mut out);
        fired += out
            .iter()
            .filter(|e| matches!(e, OutputEvent::DetectorFired { marble: m, .. } if *m == marble))
            .count();
    }

    assert_eq!(fired, 1, "enter fires once, the resting contact stays quiet");
    assert_eq!(tile.marble_count(), 1);
}
