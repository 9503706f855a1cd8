//! In-process test harness: a registry-backed mock transport so rings of
//! [LocalNode]s can be wired together without any networking.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::config::ChordConfig;
use crate::dht::LocalNode;
use crate::dht::RemoteRing;
use crate::dht::RingId;
use crate::dht::RingSpace;
use crate::error::Error;
use crate::error::Result;

mod test_stabilization;

pub type TestNode = Arc<LocalNode<String, MockClient>>;

#[derive(Default)]
struct Registry {
    nodes: Mutex<HashMap<String, TestNode>>,
}

impl Registry {
    fn get(&self, dst: &str) -> Result<TestNode> {
        self.nodes
            .lock()
            .expect("registry lock")
            .get(dst)
            .cloned()
            .ok_or_else(|| Error::Transport(format!("peer `{dst}` unreachable")))
    }
}

/// Client stub that dispatches calls to the destination node's own engine
/// through a shared registry. A node absent from the registry behaves like
/// an unreachable peer.
#[derive(Clone)]
pub struct MockClient {
    registry: Arc<Registry>,
}

#[async_trait]
impl RemoteRing<String> for MockClient {
    async fn check_alive(&self, dst: &String) -> Result<()> {
        self.registry.get(dst)?.check_alive();
        Ok(())
    }

    async fn predecessor_of(&self, dst: &String) -> Result<Option<String>> {
        self.registry.get(dst)?.predecessor()
    }

    async fn successor_of(&self, dst: &String) -> Result<Option<String>> {
        self.registry.get(dst)?.successor()
    }

    async fn notify(&self, dst: &String, caller: &String) -> Result<()> {
        self.registry.get(dst)?.notify(caller.clone())
    }

    async fn closest_preceding_finger(&self, dst: &String, id: RingId) -> Result<String> {
        self.registry.get(dst)?.closest_preceding_finger(id).await
    }

    async fn find_successor_via(&self, dst: &String, id: RingId) -> Result<String> {
        self.registry.get(dst)?.find_successor(id).await
    }

    async fn is_stable(&self, dst: &String) -> Result<bool> {
        self.registry.get(dst)?.is_stable()
    }
}

/// A set of nodes reachable through each other's [MockClient]s.
pub struct MockNet {
    registry: Arc<Registry>,
}

impl MockNet {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry::default()),
        }
    }

    /// Create a node and make it reachable under its address.
    pub fn add_node(&self, address: String, config: ChordConfig) -> TestNode {
        let client = MockClient {
            registry: self.registry.clone(),
        };
        let node =
            Arc::new(LocalNode::new(address.clone(), config, client).expect("valid config"));
        self.registry
            .nodes
            .lock()
            .expect("registry lock")
            .insert(address, node.clone());
        node
    }

    /// Make a node unreachable, as if its process died. Its engine object
    /// stays alive on the caller's side but no call reaches it anymore.
    pub fn kill(&self, address: &str) {
        self.registry
            .nodes
            .lock()
            .expect("registry lock")
            .remove(address);
    }
}

/// Config for a 32-point ring with short timeouts, so failure paths resolve
/// quickly. The liveness cache is disabled to keep death visible immediately.
pub fn small_ring_config() -> ChordConfig {
    ChordConfig {
        ring_bits: 5,
        rpc_timeout_ms: 200,
        alive_cache_ms: 0,
        stabilize_interval_ms: 20,
        fix_finger_interval_ms: 20,
        check_predecessor_interval_ms: 20,
    }
}

/// Find a `peer-{n}` address hashing to exactly `target` in `space`. Cheap
/// for small spaces and makes ring layouts in tests explicit.
pub fn addr_with_id(space: RingSpace, target: u64) -> String {
    let target = space.id(target);
    (0u64..)
        .map(|n| format!("peer-{n}"))
        .find(|addr| space.hash(addr.as_bytes()) == target)
        .expect("some address hashes to the target id")
}

/// Run every maintenance duty once on each node: predecessor probes first,
/// then stabilization, then a full cycle of finger refreshes. Grouping by
/// duty keeps multi-node rounds deterministic in tests.
pub async fn maintenance_round(nodes: &[TestNode]) {
    for node in nodes {
        node.check_predecessor().await.expect("check predecessor");
    }
    for node in nodes {
        node.stabilize().await.expect("stabilize");
    }
    for node in nodes {
        for _ in 0..node.space().bits() {
            node.fix_next_finger().await.expect("fix finger");
        }
    }
}

pub fn setup_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
