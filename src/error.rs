//! Error of chord-overlay.

/// A wrap `Result` contains custom errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors collections in chord-overlay.
///
/// Remote failures are always recoverable: the engine handles them with
/// fallback routing, pruning of dead finger entries, or by deferring to the
/// next maintenance tick. Nothing here is fatal to the process.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Ring bits must be in 1..=32, got {0}")]
    InvalidRingBits(u32),

    #[error("Remote call timed out")]
    RpcTimeout,

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Failed to join DHT ring: {0}")]
    JoinFailed(String),

    #[error("DHT sync lock error")]
    SyncLockError,
}
