#![warn(missing_docs)]
//! Periodic maintenance driver for a [LocalNode].
//!
//! Chord stays correct under churn only because every node keeps running
//! three small duties forever: verifying the successor, refreshing one
//! finger, and probing the predecessor. The [Stabilizer] runs one loop per
//! duty so a slow or failing round of one never delays the others. A failed
//! round is logged and the loop keeps its cadence.

use std::sync::Arc;

use futures::join;
use futures_timer::Delay;

use super::chord::LocalNode;
use super::chord::RemoteRing;
use super::PeerAddress;

/// Drives the periodic maintenance of one node.
pub struct Stabilizer<A, C> {
    node: Arc<LocalNode<A, C>>,
}

impl<A, C> Stabilizer<A, C>
where
    A: PeerAddress,
    C: RemoteRing<A>,
{
    /// Create a driver for `node`. Nothing runs until [Stabilizer::run] is
    /// awaited.
    pub fn new(node: Arc<LocalNode<A, C>>) -> Self {
        Self { node }
    }

    /// The node being maintained.
    pub fn node(&self) -> &Arc<LocalNode<A, C>> {
        &self.node
    }

    async fn stabilize_loop(&self) {
        let interval = self.node.config().stabilize_interval();
        loop {
            Delay::new(interval).await;
            tracing::debug!("STABILIZATION");
            if let Err(e) = self.node.stabilize().await {
                tracing::error!("failed to stabilize: {}", e);
            }
        }
    }

    async fn fix_fingers_loop(&self) {
        let interval = self.node.config().fix_finger_interval();
        loop {
            Delay::new(interval).await;
            tracing::debug!("FIX FINGERS");
            if let Err(e) = self.node.fix_next_finger().await {
                tracing::error!("failed to fix finger: {}", e);
            }
        }
    }

    async fn check_predecessor_loop(&self) {
        let interval = self.node.config().check_predecessor_interval();
        loop {
            Delay::new(interval).await;
            tracing::debug!("CHECK PREDECESSOR");
            if let Err(e) = self.node.check_predecessor().await {
                tracing::error!("failed to check predecessor: {}", e);
            }
        }
    }

    /// Run all three maintenance loops until the future is dropped.
    pub async fn run(&self) {
        join!(
            self.stabilize_loop(),
            self.fix_fingers_loop(),
            self.check_predecessor_loop(),
        );
    }
}
