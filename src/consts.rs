//! Constant variables.

/// Default bit width W of the ring identifier space, ids live in [0, 2^W).
pub const DEFAULT_RING_BITS: u32 = 32;
/// Default per-call timeout for remote calls in ms.
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 5000;
/// Default duration a successful liveness probe stays cached in ms.
pub const DEFAULT_ALIVE_CACHE_MS: u64 = 5000;
/// Default period of the stabilize task in ms.
pub const DEFAULT_STABILIZE_INTERVAL_MS: u64 = 500;
/// Default period of the fix-fingers task in ms.
pub const DEFAULT_FIX_FINGER_INTERVAL_MS: u64 = 500;
/// Default period of the check-predecessor task in ms.
pub const DEFAULT_CHECK_PREDECESSOR_INTERVAL_MS: u64 = 500;
