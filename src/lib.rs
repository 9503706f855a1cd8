//! Chord protocol engine for structured peer-to-peer overlay nodes.
//! --------------
//! This crate implements the core of a [Chord](https://pdos.csail.mit.edu/papers/ton:chord/paper-ton.pdf)
//! distributed hash table: a self-organizing ring of nodes that resolves
//! "who is responsible for key K" in O(log N) hops without central
//! coordination.
//!
//! - [RingSpace](crate::dht::RingSpace) maps peer addresses onto a circular
//!   identifier space and provides the relative-distance arithmetic all ring
//!   ordering decisions are expressed in.
//! - [FingerTable](crate::dht::FingerTable) holds a node's O(W) shortcut
//!   pointers; slot 1 is the node's immediate successor.
//! - [LocalNode](crate::dht::LocalNode) is one node's engine: it owns the
//!   finger table and predecessor pointer, answers peer queries, and runs
//!   the lookup and repair algorithms.
//! - [Stabilizer](crate::dht::Stabilizer) drives the periodic maintenance
//!   duties: stabilize, fix-fingers and check-predecessor each run in their
//!   own loop.
//!
//! The crate deliberately does not speak any wire format. The environment
//! supplies a [RemoteRing](crate::dht::RemoteRing) implementation -- an
//! asynchronous, per-destination call facility -- and an opaque
//! [PeerAddress](crate::dht::PeerAddress) type owned by the transport layer.
//! Every remote call issued by the engine is bounded by a fixed timeout and
//! a failed or expired call is treated as "peer unreachable": the algorithms
//! degrade to fallback routing, pruning, or retry on the next maintenance
//! tick, never to a process-fatal error.

pub mod config;
pub mod consts;
pub mod dht;
pub mod error;
pub mod inspect;
mod utils;

#[cfg(test)]
mod tests;

pub use crate::config::ChordConfig;
pub use crate::dht::FingerTable;
pub use crate::dht::LocalNode;
pub use crate::dht::PeerAddress;
pub use crate::dht::RemoteRing;
pub use crate::dht::RingId;
pub use crate::dht::RingSpace;
pub use crate::dht::Stabilizer;
pub use crate::error::Error;
pub use crate::error::Result;
