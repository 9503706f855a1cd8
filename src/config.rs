//! Configuration of the Chord engine and its maintenance tasks.
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::consts::DEFAULT_ALIVE_CACHE_MS;
use crate::consts::DEFAULT_CHECK_PREDECESSOR_INTERVAL_MS;
use crate::consts::DEFAULT_FIX_FINGER_INTERVAL_MS;
use crate::consts::DEFAULT_RING_BITS;
use crate::consts::DEFAULT_RPC_TIMEOUT_MS;
use crate::consts::DEFAULT_STABILIZE_INTERVAL_MS;

/// Everything the engine needs from its environment. No state is persisted:
/// finger table and predecessor are in-memory only and rebuilt by rejoining
/// and stabilizing after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChordConfig {
    /// Bit width W of the ring identifier space, must be in 1..=32.
    pub ring_bits: u32,
    /// Per-call timeout for remote calls. Expiry is indistinguishable from
    /// failure to the algorithms.
    pub rpc_timeout_ms: u64,
    /// How long a successful liveness probe stays valid. Bounds the probe
    /// rate during bursty finger-table scans.
    pub alive_cache_ms: u64,
    /// Period of the stabilize task.
    pub stabilize_interval_ms: u64,
    /// Period of the fix-fingers task.
    pub fix_finger_interval_ms: u64,
    /// Period of the check-predecessor task.
    pub check_predecessor_interval_ms: u64,
}

impl Default for ChordConfig {
    fn default() -> Self {
        Self {
            ring_bits: DEFAULT_RING_BITS,
            rpc_timeout_ms: DEFAULT_RPC_TIMEOUT_MS,
            alive_cache_ms: DEFAULT_ALIVE_CACHE_MS,
            stabilize_interval_ms: DEFAULT_STABILIZE_INTERVAL_MS,
            fix_finger_interval_ms: DEFAULT_FIX_FINGER_INTERVAL_MS,
            check_predecessor_interval_ms: DEFAULT_CHECK_PREDECESSOR_INTERVAL_MS,
        }
    }
}

impl ChordConfig {
    /// Per-call timeout as a [Duration].
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// Stabilize period as a [Duration].
    pub fn stabilize_interval(&self) -> Duration {
        Duration::from_millis(self.stabilize_interval_ms)
    }

    /// Fix-fingers period as a [Duration].
    pub fn fix_finger_interval(&self) -> Duration {
        Duration::from_millis(self.fix_finger_interval_ms)
    }

    /// Check-predecessor period as a [Duration].
    pub fn check_predecessor_interval(&self) -> Duration {
        Duration::from_millis(self.check_predecessor_interval_ms)
    }
}
