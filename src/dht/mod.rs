#![warn(missing_docs)]
//! Implementation of the Chord distributed hash table,
//! ref: <https://pdos.csail.mit.edu/papers/ton:chord/paper-ton.pdf>.
//! With high probability, the number of nodes that must be contacted to find
//! a successor in an N-node ring is O(log N).

use std::fmt;
use std::hash::Hash;

mod chord;
pub mod finger;
pub mod id;
mod stabilization;

pub use chord::LocalNode;
pub use chord::RemoteRing;
pub use finger::FingerTable;
pub use id::RingId;
pub use id::RingSpace;
pub use stabilization::Stabilizer;

/// Opaque peer address, owned by the transport layer.
///
/// The engine never connects to an address itself; it only derives a stable
/// ring identifier from its bytes and hands it back to the [RemoteRing]
/// client as a call destination.
pub trait PeerAddress:
    Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Stable byte representation the ring identifier is derived from.
    fn to_bytes(&self) -> Vec<u8>;
}

impl PeerAddress for String {
    fn to_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}
