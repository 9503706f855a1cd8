#![warn(missing_docs)]
//! Serializable snapshots of a node's routing state, for diagnostics.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::dht::LocalNode;
use crate::dht::PeerAddress;
use crate::dht::RemoteRing;
use crate::dht::RingId;
use crate::error::Result;

/// Point-in-time view of one node's ring state. Addresses are rendered to
/// strings so the snapshot serializes independently of the transport's
/// address type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingInspect {
    /// The node's own address.
    pub address: String,
    /// The node's point on the ring.
    pub id: RingId,
    /// Ring position as a percentage.
    pub position: u8,
    /// Current predecessor, if any.
    pub predecessor: Option<String>,
    /// Current successor, if any.
    pub successor: Option<String>,
    /// Whether predecessor and successor are consistently paired.
    pub stable: bool,
    /// Finger slots compressed into runs of identical values,
    /// as `(value, first_slot, last_slot)` with 1-based slots.
    pub finger: Vec<(Option<String>, usize, usize)>,
}

impl RingInspect {
    /// Snapshot `node`.
    pub fn inspect<A, C>(node: &LocalNode<A, C>) -> Result<Self>
    where
        A: PeerAddress,
        C: RemoteRing<A>,
    {
        let space = node.space();
        let finger = compress_iter(
            node.fingers()?
                .into_iter()
                .map(|slot| slot.map(|peer| peer.to_string())),
        );
        Ok(Self {
            address: node.address().to_string(),
            id: node.id(),
            position: space.position(node.id()),
            predecessor: node.predecessor()?.map(|p| p.to_string()),
            successor: node.successor()?.map(|s| s.to_string()),
            stable: node.is_stable()?,
            finger,
        })
    }
}

impl fmt::Display for RingInspect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "node `{}` at {} ({}%), stable: {}",
            self.address, self.id, self.position, self.stable
        )?;
        writeln!(
            f,
            "predecessor: {}",
            self.predecessor.as_deref().unwrap_or("-")
        )?;
        writeln!(
            f,
            "successor:   {}",
            self.successor.as_deref().unwrap_or("-")
        )?;
        for (value, first, last) in &self.finger {
            let value = value.as_deref().unwrap_or("-");
            if first == last {
                writeln!(f, "finger {:>2}     -> {}", first, value)?;
            } else {
                writeln!(f, "finger {:>2}..{:<2} -> {}", first, last, value)?;
            }
        }
        Ok(())
    }
}

/// Compress consecutive equal values into `(value, first_index, last_index)`
/// runs, indices 1-based.
fn compress_iter<T>(iter: impl Iterator<Item = T>) -> Vec<(T, usize, usize)>
where T: PartialEq
{
    let mut result: Vec<(T, usize, usize)> = vec![];
    for (i, value) in iter.enumerate() {
        let slot = i + 1;
        match result.last_mut() {
            Some((last, _, end)) if *last == value => *end = slot,
            _ => result.push((value, slot, slot)),
        }
    }
    result
}
