#![warn(missing_docs)]
//! Identifier arithmetic on the circular Chord id space.
//!
//! Every peer address is hashed onto a point in `[0, 2^W)`. The space wraps
//! at `2^W`, so two points can never be ordered absolutely: all "is A between
//! B and C on the ring" decisions are expressed as comparisons of *relative*
//! clockwise distance from a chosen base point. For that reason [RingId]
//! deliberately implements neither `Ord` nor `PartialOrd`.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

use crate::error::Error;
use crate::error::Result;

/// Largest supported bit width of the identifier space.
pub const MAX_RING_BITS: u32 = 32;

/// A point on the ring, always in `[0, 2^W)` for the [RingSpace] that
/// produced it.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RingId(u64);

impl RingId {
    /// Raw value of this point.
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RingId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Debug for RingId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RingId({:#x})", self.0)
    }
}

/// The circular identifier space of size `2^W`.
///
/// A cheap value object: carries only the bit width and provides id
/// derivation and the distance arithmetic shared by the finger table and the
/// engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingSpace {
    bits: u32,
}

impl RingSpace {
    /// Create a space of `2^bits` points. `bits` must be in `1..=32`.
    pub fn new(bits: u32) -> Result<Self> {
        if bits == 0 || bits > MAX_RING_BITS {
            return Err(Error::InvalidRingBits(bits));
        }
        Ok(Self { bits })
    }

    /// Bit width W of this space.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Number of points on the ring, `2^W`.
    pub fn modulus(&self) -> u64 {
        1u64 << self.bits
    }

    /// Wrap a raw integer onto the ring.
    pub fn id(&self, raw: u64) -> RingId {
        RingId(raw % self.modulus())
    }

    /// Derive the ring point of a peer address: SHA-256 over its byte
    /// representation, folded to the first 8 bytes and reduced mod `2^W`.
    pub fn hash(&self, bytes: &[u8]) -> RingId {
        let digest = Sha256::digest(bytes);
        let folded = u64::from_be_bytes(
            digest[..8].try_into().expect("digest is at least 8 bytes"),
        );
        self.id(folded)
    }

    /// Clockwise distance from `base` to `x`, `(x - base) mod 2^W`.
    /// Zero if and only if `x` and `base` are the same point.
    pub fn relative(&self, x: RingId, base: RingId) -> u64 {
        (x.0 + self.modulus() - base.0) % self.modulus()
    }

    /// Whether `x` lies in the open-to-closed interval `(lo, hi]` walking
    /// clockwise from `lo`.
    pub fn in_open_closed(&self, x: RingId, lo: RingId, hi: RingId) -> bool {
        let d = self.relative(x, lo);
        d > 0 && d <= self.relative(hi, lo)
    }

    /// Start point the `i`th finger of `local` should resolve to,
    /// `(local + 2^(i-1)) mod 2^W` for `i` in `1..=W`.
    pub fn finger_start(&self, local: RingId, i: usize) -> RingId {
        self.id(local.0 + (1u64 << (i - 1)))
    }

    /// Position of `x` on the ring as a percentage, for log lines.
    pub fn position(&self, x: RingId) -> u8 {
        (x.0 * 100 / self.modulus()) as u8
    }
}
