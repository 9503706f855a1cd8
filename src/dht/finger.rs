#![warn(missing_docs)]
//! Finger table of a Chord node.
//!
//! Slots are indexed `1..=W`. Slot `i` points at the peer believed
//! responsible for `(local + 2^(i-1)) mod 2^W`, so slot 1 *is* the node's
//! immediate successor: successor and first finger are the same field, not
//! two fields kept in sync.

use super::id::RingId;
use super::id::RingSpace;
use super::PeerAddress;

/// Per-node table of up to W shortcut pointers onto the ring.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FingerTable<A> {
    local: A,
    local_id: RingId,
    space: RingSpace,
    finger: Vec<Option<A>>,
    pub(super) fix_finger_index: usize,
}

impl<A: PeerAddress> FingerTable<A> {
    /// Create an empty table for `local` with one slot per bit of `space`.
    pub fn new(local: A, space: RingSpace) -> Self {
        let local_id = space.hash(&local.to_bytes());
        Self {
            local,
            local_id,
            space,
            finger: vec![None; space.bits() as usize],
            fix_finger_index: 0,
        }
    }

    /// Number of slots W.
    pub fn size(&self) -> usize {
        self.finger.len()
    }

    /// Slot `i` for `i` in `1..=W`; `None` for empty or out-of-range slots.
    pub fn get(&self, i: usize) -> Option<&A> {
        if i == 0 || i > self.finger.len() {
            return None;
        }
        self.finger[i - 1].as_ref()
    }

    /// The immediate successor, alias of `get(1)`.
    pub fn successor(&self) -> Option<&A> {
        self.get(1)
    }

    /// Set slot `i` to `value`.
    ///
    /// Returns `true` when the caller must notify `value` that it has become
    /// our new successor: the slot is 1, the value is set, and it differs
    /// from the previous successor. This is the only trigger for
    /// new-successor notification.
    pub fn update(&mut self, i: usize, value: Option<A>) -> bool {
        if i == 0 || i > self.finger.len() {
            return false;
        }
        let changed = self.finger[i - 1] != value;
        self.finger[i - 1] = value;
        changed && i == 1 && self.finger[0].is_some()
    }

    /// Clear every slot currently pointing at `peer`. Used when a peer is
    /// confirmed dead, so lookups stop routing through stale pointers.
    pub fn remove(&mut self, peer: &A) {
        for slot in self.finger.iter_mut() {
            if slot.as_ref() == Some(peer) {
                *slot = None;
            }
        }
    }

    /// The target point slot `i` should resolve to,
    /// `(local + 2^(i-1)) mod 2^W`.
    pub fn start_of(&self, i: usize) -> RingId {
        self.space.finger_start(self.local_id, i)
    }

    /// Whether some slot points at `peer`.
    pub fn contains(&self, peer: &A) -> bool {
        self.finger.iter().any(|slot| slot.as_ref() == Some(peer))
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.finger.iter().flatten().count()
    }

    /// Whether every slot is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All slots in order, for inspection.
    pub fn list(&self) -> &[Option<A>] {
        &self.finger
    }
}
