//! Replica-side replay, drift detection and snapshot recovery

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::core::{GameCore, OutputEvent, Seq};
use crate::tile::TemplateCatalog;

use super::store::{AuthFrame, CoreSnapshot, InputFrame};
use super::{SyncConfig, SyncError};

/// What one replica tick did.
#[derive(Debug)]
pub enum ClientTick {
    /// Caught up; nothing to replay.
    Idle,
    /// Replayed `ticks` frames; `outputs` holds the client-destined
    /// events they produced.
    Stepped {
        ticks: u32,
        outputs: Vec<OutputEvent>,
    },
    /// Drift detected; a snapshot was requested this tick.
    SnapshotRequested,
    /// Stepping stays suspended until the snapshot arrives.
    WaitingForSnapshot,
}

/// The replica end of the protocol.
///
/// Buffers frames from auth bundles, replays toward the safe edge with
/// bounded catch-up, and falls back to snapshot restore when any of the
/// three drift checks trips. Replaying the authority's frames over the
/// same snapshot keeps the replica bit-identical to the authority at
/// every shared sequence.
pub struct ClientSync {
    core: GameCore,
    catalog: Arc<TemplateCatalog>,
    config: SyncConfig,
    frames: BTreeMap<u16, InputFrame>,
    /// Highest sequence reachable through contiguous buffered frames.
    safe_edge: Seq,
    latest_known: Seq,
    oldest_retained: Seq,
    awaiting_snapshot: bool,
}

impl ClientSync {
    /// Bootstrap from a snapshot, the way every replica joins.
    pub fn new(
        snapshot: &CoreSnapshot,
        catalog: Arc<TemplateCatalog>,
        config: SyncConfig,
    ) -> Result<ClientSync, SyncError> {
        let core = GameCore::decode(&snapshot.payload, catalog.clone())?;
        let seq = core.seq();
        Ok(ClientSync {
            core,
            catalog,
            config,
            frames: BTreeMap::new(),
            safe_edge: seq,
            latest_known: seq,
            oldest_retained: seq.next(),
            awaiting_snapshot: false,
        })
    }

    pub fn core(&self) -> &GameCore {
        &self.core
    }

    pub fn seq(&self) -> Seq {
        self.core.seq()
    }

    pub fn safe_edge(&self) -> Seq {
        self.safe_edge
    }

    pub fn needs_snapshot(&self) -> bool {
        self.awaiting_snapshot
    }

    /// Ingest one broadcast bundle.
    pub fn on_auth_frame(&mut self, bundle: &AuthFrame) {
        self.latest_known = bundle.latest;
        self.oldest_retained = bundle.oldest_retained;
        for frame in &bundle.frames {
            if frame.seq.is_ahead_of(self.core.seq()) {
                self.frames.insert(frame.seq.0, frame.clone());
            }
        }
        self.extend_safe_edge();
    }

    /// Run one replica tick: drift checks first, then bounded replay
    /// toward the safe edge.
    pub fn on_tick(&mut self) -> ClientTick {
        if self.awaiting_snapshot {
            return ClientTick::WaitingForSnapshot;
        }
        if let Some(reason) = self.drift() {
            warn!(
                seq = %self.core.seq(),
                latest = %self.latest_known,
                oldest = %self.oldest_retained,
                reason,
                "out of the frame window, requesting a snapshot"
            );
            self.awaiting_snapshot = true;
            return ClientTick::SnapshotRequested;
        }

        let backlog = self.safe_edge.closest_diff(self.core.seq());
        if backlog <= 0 {
            return ClientTick::Idle;
        }
        let backlog = backlog as u16;
        let steps = (1 + backlog / self.config.catchup_divisor.max(1))
            .min(backlog)
            .min(self.config.max_replay_per_tick);

        let mut outputs = Vec::new();
        let mut ticks = 0u32;
        for _ in 0..steps {
            let next = self.core.seq().next();
            let Some(frame) = self.frames.remove(&next.0) else {
                warn!(seq = %next, "frame missing below the safe edge, stalling");
                break;
            };
            let step_out = self.core.step(&frame.inputs);
            outputs.extend(step_out.into_iter().filter(|e| e.dest().includes_client()));
            ticks += 1;
        }
        self.discard_stale();
        if ticks == 0 {
            ClientTick::Idle
        } else {
            ClientTick::Stepped { ticks, outputs }
        }
    }

    /// Replace the core wholesale and resume from the snapshot sequence.
    pub fn install_snapshot(&mut self, snapshot: &CoreSnapshot) -> Result<(), SyncError> {
        let core = GameCore::decode(&snapshot.payload, self.catalog.clone())?;
        if core.seq() != snapshot.seq {
            error!(
                row = %snapshot.seq,
                payload = %core.seq(),
                "snapshot row sequence disagrees with its payload, trusting the payload"
            );
        }
        info!(from = %self.core.seq(), to = %core.seq(), "snapshot installed");
        self.core = core;
        self.awaiting_snapshot = false;
        self.safe_edge = self.core.seq();
        if self.latest_known.is_behind(self.safe_edge) {
            self.latest_known = self.safe_edge;
        }
        self.discard_stale();
        self.extend_safe_edge();
        Ok(())
    }

    /// The three fall-behind conditions, in check order.
    fn drift(&self) -> Option<&'static str> {
        let behind = i32::from(self.latest_known.closest_diff(self.core.seq()));
        if behind > i32::from(self.config.max_behind) {
            return Some("too far behind the authority");
        }
        let next = self.core.seq().next();
        // a buffered copy of a pruned frame can still advance us
        if next.is_behind(self.oldest_retained) && !self.frames.contains_key(&next.0) {
            return Some("behind the retention window");
        }
        if self.core.seq().is_ahead_of(self.latest_known) {
            return Some("ahead of the authority");
        }
        None
    }

    fn extend_safe_edge(&mut self) {
        if self.safe_edge.is_behind(self.core.seq()) {
            self.safe_edge = self.core.seq();
        }
        while self.frames.contains_key(&self.safe_edge.next().0) {
            self.safe_edge = self.safe_edge.next();
        }
    }

    fn discard_stale(&mut self) {
        let seq = self.core.seq();
        self.frames.retain(|&k, _| Seq(k).is_ahead_of(seq));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{standard_catalog, BASIN, GAUNTLET};
    use crate::sync::director::{DirectorConfig, RoundDirector};
    use crate::sync::server::Authority;
    use crate::sync::store::MemStore;

    fn rig(config: SyncConfig) -> (Authority<MemStore>, ClientSync) {
        let catalog = Arc::new(standard_catalog());
        let director = RoundDirector::new(DirectorConfig::default(), catalog.len() as u16);
        let mut auth = Authority::new(
            catalog.clone(),
            [BASIN, GAUNTLET],
            MemStore::new(),
            config,
            director,
        )
        .expect("authority builds");
        let snap = auth.latest_snapshot().expect("store").expect("snapshot");
        let client = ClientSync::new(&snap, catalog, config).expect("client builds");
        (auth, client)
    }

    #[test]
    fn replaying_bundles_reproduces_the_authority_stream() {
        let config = SyncConfig {
            broadcast_interval: 4,
            batch_interval: 1000,
            ..SyncConfig::default()
        };
        let (mut auth, mut client) = rig(config);
        for _ in 0..12 {
            if let Some(bundle) = auth.on_tick().expect("tick") {
                client.on_auth_frame(&bundle);
            }
        }
        for _ in 0..24 {
            client.on_tick();
        }
        assert_eq!(client.seq(), Seq(12));
        assert_eq!(client.safe_edge(), Seq(12));

        // identical inputs, identical state: a reference core stepped
        // through twelve empty ticks must hash the same
        let mut reference = GameCore::new(Arc::new(standard_catalog()), [BASIN, GAUNTLET])
            .expect("core builds");
        for _ in 0..12 {
            reference.step(&[]);
        }
        assert_eq!(client.core().state_hash(), reference.state_hash());
    }

    #[test]
    fn catch_up_is_smoothed_and_bounded() {
        let config = SyncConfig {
            broadcast_interval: 12,
            batch_interval: 1000,
            catchup_divisor: 8,
            max_replay_per_tick: 4,
            ..SyncConfig::default()
        };
        let (mut auth, mut client) = rig(config);
        for _ in 0..12 {
            if let Some(bundle) = auth.on_tick().expect("tick") {
                client.on_auth_frame(&bundle);
            }
        }
        // backlog 12: 1 + 12/8 = 2 frames this tick
        assert!(matches!(client.on_tick(), ClientTick::Stepped { ticks: 2, .. }));
        // backlog 10: 1 + 10/8 = 2
        assert!(matches!(client.on_tick(), ClientTick::Stepped { ticks: 2, .. }));
        // backlog 8: capped smoothing keeps shrinking the gap
        let mut guard = 0;
        while client.seq() != Seq(12) {
            match client.on_tick() {
                ClientTick::Stepped { ticks, .. } => assert!(ticks <= 4),
                other => panic!("unexpected tick result {other:?}"),
            }
            guard += 1;
            assert!(guard < 20, "catch-up never converged");
        }
        assert!(matches!(client.on_tick(), ClientTick::Idle));
    }

    #[test]
    fn a_replica_ahead_of_the_authority_requests_a_snapshot() {
        let (mut auth, mut client) = rig(SyncConfig::default());
        // a stale bundle claims the authority never advanced
        client.on_auth_frame(&AuthFrame {
            seq: Seq(65_000),
            first: Seq(65_000),
            frames: Vec::new(),
            oldest_retained: Seq(64_900),
            latest: Seq(65_000),
        });
        assert!(matches!(client.on_tick(), ClientTick::SnapshotRequested));
        assert!(client.needs_snapshot());
        assert!(matches!(client.on_tick(), ClientTick::WaitingForSnapshot));

        let snap = auth.latest_snapshot().expect("store").expect("snapshot");
        client.install_snapshot(&snap).expect("install");
        assert!(!client.needs_snapshot());
        assert_eq!(client.seq(), snap.seq);
        assert!(matches!(client.on_tick(), ClientTick::Idle));
    }

    #[test]
    fn falling_behind_the_retention_window_requests_a_snapshot() {
        let (_auth, mut client) = rig(SyncConfig::default());
        client.on_auth_frame(&AuthFrame {
            seq: Seq(60),
            first: Seq(57),
            frames: Vec::new(),
            oldest_retained: Seq(50),
            latest: Seq(60),
        });
        assert!(matches!(client.on_tick(), ClientTick::SnapshotRequested));
    }

    #[test]
    fn falling_too_far_behind_requests_a_snapshot() {
        let config = SyncConfig {
            max_behind: 100,
            ..SyncConfig::default()
        };
        let (_auth, mut client) = rig(config);
        client.on_auth_frame(&AuthFrame {
            seq: Seq(500),
            first: Seq(497),
            frames: Vec::new(),
            oldest_retained: Seq(1),
            latest: Seq(500),
        });
        assert!(matches!(client.on_tick(), ClientTick::SnapshotRequested));
    }
}
