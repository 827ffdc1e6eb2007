//! Sequence-addressed sync records and the storage they live in

use std::collections::BTreeMap;

use crate::core::seq::Seq;
use crate::core::InputEvent;
use crate::wire::{Decode, Encode, Reader, WireError, Writer};

/// One tick's ordered inputs. `seq` is the sequence the tick produced:
/// a core at `seq - 1` that applies `inputs` lands exactly on `seq`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputFrame {
    pub seq: Seq,
    pub inputs: Vec<InputEvent>,
}

impl Encode for InputFrame {
    fn encode(&self, w: &mut Writer) {
        self.seq.encode(w);
        self.inputs.encode(w);
    }
}

impl Decode for InputFrame {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(InputFrame {
            seq: Seq::decode(r)?,
            inputs: Vec::<InputEvent>::decode(r)?,
        })
    }
}

/// A broadcast bundle of consecutive input frames plus the authority's
/// retention window, so receivers can judge their own drift.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthFrame {
    /// Sequence of the last bundled frame, which keys the row.
    pub seq: Seq,
    /// Sequence of the first bundled frame.
    pub first: Seq,
    pub frames: Vec<InputFrame>,
    /// Oldest input frame the authority still retains.
    pub oldest_retained: Seq,
    /// The authority's current sequence.
    pub latest: Seq,
}

impl Encode for AuthFrame {
    fn encode(&self, w: &mut Writer) {
        self.seq.encode(w);
        self.first.encode(w);
        self.frames.encode(w);
        self.oldest_retained.encode(w);
        self.latest.encode(w);
    }
}

impl Decode for AuthFrame {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(AuthFrame {
            seq: Seq::decode(r)?,
            first: Seq::decode(r)?,
            frames: Vec::<InputFrame>::decode(r)?,
            oldest_retained: Seq::decode(r)?,
            latest: Seq::decode(r)?,
        })
    }
}

/// Singleton snapshot row: a serialized [`GameCore`](crate::core::GameCore)
/// with the sequence it was captured at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoreSnapshot {
    pub seq: Seq,
    pub payload: Vec<u8>,
}

impl Encode for CoreSnapshot {
    fn encode(&self, w: &mut Writer) {
        self.seq.encode(w);
        w.put_byte_blob(&self.payload);
    }
}

impl Decode for CoreSnapshot {
    fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(CoreSnapshot {
            seq: Seq::decode(r)?,
            payload: r.get_byte_blob()?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend: {0}")]
    Backend(String),
}

/// Storage the authority owns and replicas read.
///
/// Input and auth frames are rows keyed by sequence; the snapshot is a
/// singleton. Every call takes `&mut` so a backend can model one
/// serializable transaction per call.
pub trait SyncStore {
    fn put_input_frame(&mut self, frame: InputFrame) -> Result<(), StoreError>;
    fn input_frame(&mut self, seq: Seq) -> Result<Option<InputFrame>, StoreError>;
    /// Frames strictly ahead of `seq`, ascending by ring distance.
    fn input_frames_after(&mut self, seq: Seq) -> Result<Vec<InputFrame>, StoreError>;
    /// Delete frames strictly behind `seq`. Returns how many went.
    fn delete_input_frames_before(&mut self, seq: Seq) -> Result<usize, StoreError>;

    fn put_auth_frame(&mut self, frame: AuthFrame) -> Result<(), StoreError>;
    fn delete_auth_frames_before(&mut self, seq: Seq) -> Result<usize, StoreError>;

    fn put_snapshot(&mut self, snapshot: CoreSnapshot) -> Result<(), StoreError>;
    fn snapshot(&mut self) -> Result<Option<CoreSnapshot>, StoreError>;
}

/// In-memory store for tests and the harness.
#[derive(Debug, Default)]
pub struct MemStore {
    inputs: BTreeMap<u16, InputFrame>,
    auths: BTreeMap<u16, AuthFrame>,
    snapshot: Option<CoreSnapshot>,
}

impl MemStore {
    pub fn new() -> MemStore {
        MemStore::default()
    }

    pub fn input_frame_count(&self) -> usize {
        self.inputs.len()
    }
}

impl SyncStore for MemStore {
    fn put_input_frame(&mut self, frame: InputFrame) -> Result<(), StoreError> {
        self.inputs.insert(frame.seq.0, frame);
        Ok(())
    }

    fn input_frame(&mut self, seq: Seq) -> Result<Option<InputFrame>, StoreError> {
        Ok(self.inputs.get(&seq.0).cloned())
    }

    fn input_frames_after(&mut self, seq: Seq) -> Result<Vec<InputFrame>, StoreError> {
        let mut frames: Vec<InputFrame> = self
            .inputs
            .values()
            .filter(|f| f.seq.is_ahead_of(seq))
            .cloned()
            .collect();
        frames.sort_by_key(|f| f.seq.closest_diff(seq));
        Ok(frames)
    }

    fn delete_input_frames_before(&mut self, seq: Seq) -> Result<usize, StoreError> {
        let before = self.inputs.len();
        self.inputs.retain(|&k, _| !Seq(k).is_behind(seq));
        Ok(before - self.inputs.len())
    }

    fn put_auth_frame(&mut self, frame: AuthFrame) -> Result<(), StoreError> {
        self.auths.insert(frame.seq.0, frame);
        Ok(())
    }

    fn delete_auth_frames_before(&mut self, seq: Seq) -> Result<usize, StoreError> {
        let before = self.auths.len();
        self.auths.retain(|&k, _| !Seq(k).is_behind(seq));
        Ok(before - self.auths.len())
    }

    fn put_snapshot(&mut self, snapshot: CoreSnapshot) -> Result<(), StoreError> {
        self.snapshot = Some(snapshot);
        Ok(())
    }

    fn snapshot(&mut self) -> Result<Option<CoreSnapshot>, StoreError> {
        Ok(self.snapshot.clone())
    }
}
