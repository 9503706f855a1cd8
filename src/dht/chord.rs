#![warn(missing_docs)]
//! Chord engine: one node's view of the ring and the algorithms that keep
//! it correct.
//!
//! [LocalNode] owns the node's predecessor pointer and [FingerTable] and
//! implements both sides of the protocol: the immediately-answered handlers
//! a peer invokes over the wire, and the multi-hop lookup and repair
//! algorithms that consume the [RemoteRing] client. All state mutation goes
//! through this struct; locks are short-lived and never held across an
//! `.await`, so maintenance ticks and inbound handlers may interleave and
//! the algorithms re-read state instead of assuming it held.

use std::fmt;
use std::future::Future;
use std::sync::Mutex;
use std::sync::MutexGuard;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::FutureExt;
use futures::pin_mut;
use futures::select;
use futures_timer::Delay;

use super::finger::FingerTable;
use super::id::RingId;
use super::id::RingSpace;
use super::PeerAddress;
use crate::config::ChordConfig;
use crate::error::Error;
use crate::error::Result;
use crate::utils::get_epoch_ms;

/// The call surface every ring node exposes to its peers.
///
/// Implemented by the transport layer as a client stub parameterized by the
/// destination address, and by the engine itself for serving. Every method
/// is asynchronous and completes with either a value or a failure meaning
/// "peer unreachable or error"; the engine additionally bounds each call it
/// issues with a fixed timeout. No call is retried by the engine: failure
/// handling is the algorithms' job, not the transport's.
#[async_trait]
pub trait RemoteRing<A>: Send + Sync
where A: PeerAddress
{
    /// Liveness probe. Answered by the callee without further network hops.
    async fn check_alive(&self, dst: &A) -> Result<()>;

    /// The callee's current predecessor, answered immediately.
    async fn predecessor_of(&self, dst: &A) -> Result<Option<A>>;

    /// The callee's current successor, answered immediately.
    async fn successor_of(&self, dst: &A) -> Result<Option<A>>;

    /// Offer `caller` to `dst` as a candidate predecessor.
    async fn notify(&self, dst: &A, caller: &A) -> Result<()>;

    /// The callee's local finger-table scan for the closest finger
    /// preceding `id`. Answered without further network hops.
    async fn closest_preceding_finger(&self, dst: &A, id: RingId) -> Result<A>;

    /// Full distributed lookup on the callee; may itself issue further
    /// remote calls.
    async fn find_successor_via(&self, dst: &A, id: RingId) -> Result<A>;

    /// Whether the callee currently has a consistent predecessor/successor
    /// pairing. Used as a convergence signal during bootstrap.
    async fn is_stable(&self, dst: &A) -> Result<bool>;
}

/// One node's Chord engine.
pub struct LocalNode<A, C> {
    address: A,
    id: RingId,
    space: RingSpace,
    config: ChordConfig,
    client: C,
    finger: Mutex<FingerTable<A>>,
    predecessor: Mutex<Option<A>>,
    /// Epoch-ms of the last successful liveness probe per peer.
    alive_at: DashMap<A, u128>,
}

impl<A, C> LocalNode<A, C>
where
    A: PeerAddress,
    C: RemoteRing<A>,
{
    /// Create an engine for `address` with an empty finger table and no
    /// predecessor.
    pub fn new(address: A, config: ChordConfig, client: C) -> Result<Self> {
        let space = RingSpace::new(config.ring_bits)?;
        let id = space.hash(&address.to_bytes());
        Ok(Self {
            finger: Mutex::new(FingerTable::new(address.clone(), space)),
            predecessor: Mutex::new(None),
            alive_at: DashMap::new(),
            address,
            id,
            space,
            config,
            client,
        })
    }

    /// This node's peer address.
    pub fn address(&self) -> &A {
        &self.address
    }

    /// This node's point on the ring.
    pub fn id(&self) -> RingId {
        self.id
    }

    /// The identifier space this node lives in.
    pub fn space(&self) -> RingSpace {
        self.space
    }

    /// The engine configuration.
    pub fn config(&self) -> &ChordConfig {
        &self.config
    }

    fn lock_finger(&self) -> Result<MutexGuard<FingerTable<A>>> {
        self.finger.lock().map_err(|_| Error::SyncLockError)
    }

    fn lock_predecessor(&self) -> Result<MutexGuard<Option<A>>> {
        self.predecessor.lock().map_err(|_| Error::SyncLockError)
    }

    fn id_of(&self, peer: &A) -> RingId {
        self.space.hash(&peer.to_bytes())
    }

    /// Bound `fut` by the configured per-call timeout. Expiry is reported
    /// as [Error::RpcTimeout] and treated like any other unreachable peer.
    async fn with_timeout<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let fut = fut.fuse();
        let timeout = Delay::new(self.config.rpc_timeout()).fuse();
        pin_mut!(fut, timeout);
        select! {
            res = fut => res,
            _ = timeout => Err(Error::RpcTimeout),
        }
    }

    // ---- served handlers, answered immediately ----

    /// Liveness probe handler. Nothing to do: being able to answer is the
    /// whole answer.
    pub fn check_alive(&self) {}

    /// Current successor, the first finger.
    pub fn successor(&self) -> Result<Option<A>> {
        Ok(self.lock_finger()?.successor().cloned())
    }

    /// Current predecessor.
    pub fn predecessor(&self) -> Result<Option<A>> {
        Ok(self.lock_predecessor()?.clone())
    }

    /// Snapshot of all finger slots, for inspection.
    pub fn fingers(&self) -> Result<Vec<Option<A>>> {
        Ok(self.lock_finger()?.list().to_vec())
    }

    /// Whether predecessor and successor are consistently both empty or
    /// both present. A freshly started, unjoined node counts as stable, the
    /// same as a converged single-node ring.
    pub fn is_stable(&self) -> Result<bool> {
        let has_predecessor = self.lock_predecessor()?.is_some();
        let has_successor = self.lock_finger()?.successor().is_some();
        Ok(has_predecessor == has_successor)
    }

    /// Handle a peer offering itself as our predecessor.
    ///
    /// Accept unconditionally when we have none (or recorded ourselves);
    /// otherwise accept only a caller lying strictly between the current
    /// predecessor and us, so the pointer never regresses to a farther node.
    pub fn notify(&self, caller: A) -> Result<()> {
        let mut predecessor = self.lock_predecessor()?;
        match predecessor.as_ref() {
            None => {
                tracing::info!("set predecessor to `{}`", caller);
                *predecessor = Some(caller);
            }
            Some(pre) if *pre == self.address => {
                tracing::info!("set predecessor to `{}`", caller);
                *predecessor = Some(caller);
            }
            Some(pre) => {
                let pre_id = self.id_of(pre);
                let local_relative = self.space.relative(self.id, pre_id);
                let caller_relative = self.space.relative(self.id_of(&caller), pre_id);
                if caller_relative > 0 && caller_relative < local_relative {
                    tracing::info!("set predecessor to `{}`", caller);
                    *predecessor = Some(caller);
                }
            }
        }
        Ok(())
    }

    /// Scan the finger table from slot W down to 1 for the closest live
    /// finger strictly between us and `id`. Dead candidates are pruned from
    /// the table and the scan continues; with no candidate left we are the
    /// answer ourselves. Served both locally and over the wire.
    pub async fn closest_preceding_finger(&self, id: RingId) -> Result<A> {
        let find_relative = self.space.relative(id, self.id);
        let size = { self.lock_finger()?.size() };
        for i in (1..=size).rev() {
            let Some(finger) = ({ self.lock_finger()?.get(i).cloned() }) else {
                continue;
            };
            let finger_relative = self.space.relative(self.id_of(&finger), self.id);
            if finger_relative == 0 || finger_relative >= find_relative {
                continue;
            }
            if self.peer_is_alive(&finger).await {
                tracing::debug!(
                    "finger {} `{}` ({}%) precedes {} ({}%) closest",
                    i,
                    finger,
                    self.space.position(self.id_of(&finger)),
                    id,
                    self.space.position(id),
                );
                return Ok(finger);
            }
            tracing::debug!("finger {} `{}` is no longer alive, clearing it", i, finger);
            self.remove_peer(&finger)?;
        }
        Ok(self.address.clone())
    }

    /// Whether `peer` answers a liveness probe. We are always alive without
    /// a call; successful probes of others stay valid for `alive_cache_ms`,
    /// bounding probe bursts during finger scans.
    async fn peer_is_alive(&self, peer: &A) -> bool {
        if *peer == self.address {
            return true;
        }
        let now = get_epoch_ms();
        if let Some(at) = self.alive_at.get(peer) {
            if now.saturating_sub(*at) < self.config.alive_cache_ms as u128 {
                return true;
            }
        }
        match self.with_timeout(self.client.check_alive(peer)).await {
            Ok(()) => {
                self.alive_at.insert(peer.clone(), now);
                true
            }
            Err(e) => {
                tracing::debug!("liveness probe of `{}` failed: {}", peer, e);
                false
            }
        }
    }

    /// Clear every finger slot pointing at a peer confirmed dead and forget
    /// its cached liveness.
    fn remove_peer(&self, peer: &A) -> Result<()> {
        self.lock_finger()?.remove(peer);
        self.alive_at.remove(peer);
        Ok(())
    }

    /// Set finger slot `i`; when the successor slot changed to a new peer,
    /// offer ourselves to it as predecessor. Notification failures are
    /// logged and absorbed: the next stabilize round repairs the pointer.
    pub(crate) async fn update_finger(&self, i: usize, value: Option<A>) -> Result<()> {
        let must_notify = { self.lock_finger()?.update(i, value.clone()) };
        if must_notify {
            if let Some(new_successor) = value {
                if new_successor != self.address {
                    tracing::info!("set successor to `{}`", new_successor);
                    if let Err(e) = self
                        .with_timeout(self.client.notify(&new_successor, &self.address))
                        .await
                    {
                        tracing::debug!(
                            "failed to notify new successor `{}`: {}",
                            new_successor,
                            e
                        );
                    }
                }
            }
        }
        Ok(())
    }

    // ---- distributed lookups ----

    /// Find the node responsible for `id`: the successor of `id`'s
    /// predecessor. Falls back to this node when the lookup chain cannot be
    /// completed, which is always correct to retry against.
    pub async fn find_successor(&self, id: RingId) -> Result<A> {
        tracing::debug!(
            "find successor of {} ({}%)",
            id,
            self.space.position(id)
        );
        // our own point is always ours: the hop loop cannot express it
        // because "precedes id" requires a strictly positive distance
        if self.space.relative(id, self.id) == 0 {
            return Ok(self.address.clone());
        }
        let fallback = self.successor()?;
        let answer = match self.find_predecessor(id).await? {
            Some(pre) if pre != self.address => {
                tracing::debug!(
                    "predecessor of {} is `{}` ({}%), asking it for its successor",
                    id,
                    pre,
                    self.space.position(self.id_of(&pre)),
                );
                self.with_timeout(self.client.successor_of(&pre))
                    .await
                    .ok()
                    .flatten()
            }
            Some(_) => fallback,
            None => None,
        };
        let answer = answer.unwrap_or_else(|| self.address.clone());
        tracing::debug!("successor of {} is `{}`", id, answer);
        Ok(answer)
    }

    /// Find the node whose open-to-closed interval `(node, successor]`
    /// contains `id`, hopping across the ring via closest-preceding-finger
    /// queries.
    ///
    /// When a remote hop fails, the search falls back to the most recently
    /// alive node and asks it for *its* successor instead of aborting, so
    /// transient unreachability costs extra hops rather than the lookup.
    /// `None` means the chain could not be completed at all; callers treat
    /// that as "answer with the local node".
    pub async fn find_predecessor(&self, id: RingId) -> Result<Option<A>> {
        let mut current = self.address.clone();
        let mut most_recently_alive = self.address.clone();
        let mut find_relative = self.space.relative(id, self.id);
        let mut successor_relative = match self.successor()? {
            Some(succ) => self.space.relative(self.id_of(&succ), self.id),
            None => 0,
        };

        loop {
            // id in (current, successor-of-current]: current is the answer
            if find_relative > 0 && find_relative <= successor_relative {
                return Ok(Some(current));
            }

            if current == self.address {
                // local hop: consult our own finger table
                let finger = self.closest_preceding_finger(id).await?;
                if finger == current {
                    return Ok(Some(finger));
                }
                current = finger;
                continue;
            }

            // remote hop: ask current for its closest preceding finger
            let closest = self
                .with_timeout(self.client.closest_preceding_finger(&current, id))
                .await
                .ok();
            let Some(closest) = closest else {
                // current went dark; retry from the most recently alive node
                tracing::debug!(
                    "no response from `{}`, falling back to `{}`",
                    current,
                    most_recently_alive
                );
                let fallback_successor = self
                    .with_timeout(self.client.successor_of(&most_recently_alive))
                    .await
                    .ok()
                    .flatten();
                if fallback_successor.is_none() {
                    tracing::debug!(
                        "no response from `{}` either, answering with ourselves",
                        most_recently_alive
                    );
                    return Ok(Some(self.address.clone()));
                }
                current = most_recently_alive.clone();
                continue;
            };

            if closest == current {
                return Ok(Some(closest));
            }

            // current answered and named another node; current is now the
            // most recently alive. Ask the named node for its successor to
            // recompute the interval check against it.
            let closest_successor = self
                .with_timeout(self.client.successor_of(&closest))
                .await
                .ok()
                .flatten();
            match closest_successor {
                Some(closest_successor) => {
                    let closest_id = self.id_of(&closest);
                    successor_relative =
                        self.space.relative(self.id_of(&closest_successor), closest_id);
                    find_relative = self.space.relative(id, closest_id);
                    most_recently_alive = current;
                    current = closest;
                }
                None => {
                    // the named node is unusable; current's own successor is
                    // the best remaining answer for this chain
                    return Ok(self
                        .with_timeout(self.client.successor_of(&current))
                        .await
                        .ok()
                        .flatten());
                }
            }
        }
    }

    // ---- membership and repair ----

    /// Join the ring a `contact` belongs to with a single remote lookup of
    /// our own id. Success installs the result as our successor (notifying
    /// it); failure is reported to the caller, who owns the retry policy.
    pub async fn join(&self, contact: &A) -> Result<()> {
        if *contact == self.address {
            return Ok(());
        }
        tracing::debug!("joining ring via `{}`", contact);
        match self
            .with_timeout(self.client.find_successor_via(contact, self.id))
            .await
        {
            Ok(successor) => {
                tracing::info!(
                    "successor for our id {} is `{}`",
                    self.id,
                    successor
                );
                self.update_finger(1, Some(successor)).await
            }
            Err(e) => {
                tracing::error!("failed to join ring via `{}`: {}", contact, e);
                Err(Error::JoinFailed(e.to_string()))
            }
        }
    }

    /// Verify our immediate successor and let it verify us.
    ///
    /// With no usable successor, try to refill it from finger candidates or
    /// the predecessor. Otherwise ask the successor for its predecessor `x`:
    /// an unreachable or unknowing successor is treated as dead and
    /// repaired; `x == successor` means we should claim the spot; an `x`
    /// strictly between us and the successor is the better successor and is
    /// adopted.
    pub async fn stabilize(&self) -> Result<()> {
        let successor = self.successor()?;
        if successor.is_none() || successor.as_ref() == Some(&self.address) {
            self.fill_successor().await?;
        }

        let Some(successor) = successor else {
            return Ok(());
        };
        if successor == self.address {
            return Ok(());
        }

        tracing::debug!(
            "check if successor `{}` ({}%) still has us as predecessor",
            successor,
            self.space.position(self.id_of(&successor)),
        );
        let x = self
            .with_timeout(self.client.predecessor_of(&successor))
            .await
            .ok()
            .flatten();
        match x {
            None => {
                tracing::debug!(
                    "bad connection with successor `{}`, deleting successor",
                    successor
                );
                self.delete_successor().await?;
            }
            Some(x) if x == successor => {
                // successor knows no predecessor better than itself; claim it
                tracing::debug!("notify successor `{}` to set us as predecessor", successor);
                if let Err(e) = self
                    .with_timeout(self.client.notify(&successor, &self.address))
                    .await
                {
                    tracing::debug!("failed to notify successor `{}`: {}", successor, e);
                }
            }
            Some(x) => {
                if x == self.address {
                    tracing::debug!("successor still has us as predecessor, all fine");
                } else {
                    tracing::debug!("successor's predecessor is `{}`", x);
                }
                let successor_relative =
                    self.space.relative(self.id_of(&successor), self.id);
                let x_relative = self.space.relative(self.id_of(&x), self.id);
                if x_relative > 0 && x_relative < successor_relative {
                    tracing::debug!(
                        "successor's predecessor `{}` is closer, adopting it as successor",
                        x
                    );
                    self.update_finger(1, Some(x)).await?;
                }
            }
        }
        Ok(())
    }

    /// Try to fill an empty or self-pointing successor slot: propagate the
    /// first usable finger from slot 2 upward down to slot 1, else fall
    /// back to the predecessor.
    async fn fill_successor(&self) -> Result<()> {
        tracing::debug!("try to fill successor from finger candidates or predecessor");
        let successor = self.successor()?;
        if successor.is_none() || successor.as_ref() == Some(&self.address) {
            let size = { self.lock_finger()?.size() };
            for i in 2..=size {
                let candidate = { self.lock_finger()?.get(i).cloned() };
                if let Some(candidate) = candidate {
                    if candidate != self.address {
                        for j in (1..i).rev() {
                            self.update_finger(j, Some(candidate.clone())).await?;
                        }
                        break;
                    }
                }
            }
        }

        let successor = self.successor()?;
        if successor.is_none() || successor.as_ref() == Some(&self.address) {
            let predecessor = self.predecessor()?;
            if let Some(predecessor) = predecessor {
                if predecessor != self.address {
                    self.update_finger(1, Some(predecessor)).await?;
                }
            }
        }
        Ok(())
    }

    /// Remove a dead successor from the routing state and find a
    /// replacement: clear its finger slots from the last occurrence down to
    /// slot 1, drop a predecessor pointer that equalled it, refill from the
    /// remaining candidates, and as a last resort walk the (possibly stale)
    /// predecessor chain for a live node to adopt.
    async fn delete_successor(&self) -> Result<()> {
        let Some(dead) = self.successor()? else {
            return Ok(());
        };

        let last = {
            let finger = self.lock_finger()?;
            (1..=finger.size())
                .rev()
                .find(|&i| finger.get(i) == Some(&dead))
                .unwrap_or(0)
        };
        for j in (1..=last).rev() {
            self.update_finger(j, None).await?;
        }

        {
            let mut predecessor = self.lock_predecessor()?;
            if predecessor.as_ref() == Some(&dead) {
                *predecessor = None;
            }
        }

        self.fill_successor().await?;

        let successor = self.successor()?;
        if successor.is_none() || successor.as_ref() == Some(&self.address) {
            let predecessor = self.predecessor()?;
            if let Some(predecessor) = predecessor {
                if predecessor != self.address {
                    let found = self
                        .find_new_successor(&predecessor, Some(&dead))
                        .await?;
                    tracing::debug!("adopting `{}` as successor after repair", found);
                    self.update_finger(1, Some(found)).await?;
                }
            }
        }
        Ok(())
    }

    /// Walk remote predecessor pointers counter-clockwise starting at
    /// `peer` until a node sticks: one whose predecessor is unreachable,
    /// itself, us, or the `deleted` node. Every node that answered along
    /// the walk is alive, so the last one is safe to adopt.
    async fn find_new_successor(&self, peer: &A, deleted: Option<&A>) -> Result<A> {
        let mut peer = peer.clone();
        loop {
            let predecessor = self
                .with_timeout(self.client.predecessor_of(&peer))
                .await
                .ok()
                .flatten();
            match predecessor {
                None => return Ok(peer),
                Some(p) if p == peer || p == self.address || Some(&p) == deleted => {
                    return Ok(peer);
                }
                Some(p) => peer = p,
            }
        }
    }

    /// Refresh one finger slot, round-robining the index `1..=W` across
    /// calls. Lookup failures leave the slot untouched: the refresh is best
    /// effort and never blocks other maintenance.
    pub async fn fix_next_finger(&self) -> Result<()> {
        let (i, start) = {
            let mut finger = self.lock_finger()?;
            let i = finger.fix_finger_index % finger.size() + 1;
            finger.fix_finger_index = i;
            (i, finger.start_of(i))
        };
        tracing::debug!(
            "refresh finger {}: find successor for {} ({}%)",
            i,
            start,
            self.space.position(start)
        );
        match self.find_successor(start).await {
            Ok(node) => self.update_finger(i, Some(node)).await,
            Err(e) => {
                tracing::debug!("finger {} refresh skipped: {}", i, e);
                Ok(())
            }
        }
    }

    /// Probe the predecessor and clear the pointer if it stopped answering.
    pub async fn check_predecessor(&self) -> Result<()> {
        let Some(pre) = self.predecessor()? else {
            return Ok(());
        };
        if pre == self.address {
            return Ok(());
        }
        if self.with_timeout(self.client.check_alive(&pre)).await.is_err() {
            tracing::debug!("predecessor `{}` is no longer alive, clearing it", pre);
            let mut predecessor = self.lock_predecessor()?;
            if predecessor.as_ref() == Some(&pre) {
                *predecessor = None;
            }
            self.alive_at.remove(&pre);
        }
        Ok(())
    }
}

impl<A, C> fmt::Debug for LocalNode<A, C>
where A: PeerAddress
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LocalNode")
            .field("address", &self.address)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
