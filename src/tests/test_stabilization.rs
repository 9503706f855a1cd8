//! Maintenance behavior: convergence from joins, integration of late
//! joiners, repair after node death, and the periodic driver.

use std::sync::Arc;
use std::time::Duration;

use super::addr_with_id;
use super::maintenance_round;
use super::setup_tracing;
use super::small_ring_config;
use super::MockNet;
use super::TestNode;
use crate::dht::RingSpace;
use crate::dht::Stabilizer;
use crate::inspect::RingInspect;

fn pointers(node: &TestNode) -> (Option<String>, Option<String>) {
    (node.predecessor().unwrap(), node.successor().unwrap())
}

#[tokio::test]
async fn test_three_node_ring_converges() {
    setup_tracing();
    let net = MockNet::new();
    let config = small_ring_config();
    let space = RingSpace::new(config.ring_bits).unwrap();
    let a0 = addr_with_id(space, 0);
    let a10 = addr_with_id(space, 10);
    let a20 = addr_with_id(space, 20);
    let n0 = net.add_node(a0.clone(), config.clone());
    let n10 = net.add_node(a10.clone(), config.clone());
    let n20 = net.add_node(a20.clone(), config);

    n10.join(&a0).await.unwrap();
    n20.join(&a0).await.unwrap();

    let nodes = [n0.clone(), n10.clone(), n20.clone()];
    for _ in 0..5 {
        maintenance_round(&nodes).await;
    }

    assert_eq!(pointers(&n0), (Some(a20.clone()), Some(a10.clone())));
    assert_eq!(pointers(&n10), (Some(a0.clone()), Some(a20.clone())));
    assert_eq!(pointers(&n20), (Some(a10.clone()), Some(a0.clone())));
    for node in &nodes {
        assert!(node.is_stable().unwrap(), "`{}` unstable", node.address());
    }

    // finger slots resolve to the owners of their start points
    let expect = |slots: [&String; 5]| slots.map(|s| Some(s.clone())).to_vec();
    assert_eq!(n0.fingers().unwrap(), expect([&a10, &a10, &a10, &a10, &a20]));
    assert_eq!(n10.fingers().unwrap(), expect([&a20, &a20, &a20, &a20, &a0]));
    assert_eq!(n20.fingers().unwrap(), expect([&a0, &a0, &a0, &a0, &a10]));

    let inspect = RingInspect::inspect(&n0).unwrap();
    assert!(inspect.stable);
    assert_eq!(inspect.finger.len(), 2);
}

#[tokio::test]
async fn test_successor_filled_from_predecessor() {
    setup_tracing();
    let net = MockNet::new();
    let config = small_ring_config();
    let space = RingSpace::new(config.ring_bits).unwrap();
    let a0 = addr_with_id(space, 0);
    let a20 = addr_with_id(space, 20);
    let n0 = net.add_node(a0.clone(), config.clone());
    let n20 = net.add_node(a20.clone(), config);

    // a predecessor appears without any successor being known
    n0.notify(a20.clone()).unwrap();
    assert_eq!(pointers(&n0), (Some(a20.clone()), None));

    // stabilize falls back to the predecessor and notifies it
    n0.stabilize().await.unwrap();
    assert_eq!(pointers(&n0), (Some(a20.clone()), Some(a20)));
    assert_eq!(n20.predecessor().unwrap(), Some(a0));
}

#[tokio::test]
async fn test_late_joiner_is_integrated() {
    setup_tracing();
    let net = MockNet::new();
    let config = small_ring_config();
    let space = RingSpace::new(config.ring_bits).unwrap();
    let a0 = addr_with_id(space, 0);
    let a5 = addr_with_id(space, 5);
    let a10 = addr_with_id(space, 10);
    let a20 = addr_with_id(space, 20);
    let n0 = net.add_node(a0.clone(), config.clone());
    let n5 = net.add_node(a5.clone(), config.clone());
    let n10 = net.add_node(a10.clone(), config.clone());
    let n20 = net.add_node(a20.clone(), config);

    n10.join(&a0).await.unwrap();
    n20.join(&a0).await.unwrap();
    let nodes = [n0.clone(), n10.clone(), n20.clone()];
    for _ in 0..5 {
        maintenance_round(&nodes).await;
    }

    // a fourth node joins the converged ring between 0 and 10
    n5.join(&a0).await.unwrap();
    assert_eq!(n5.successor().unwrap(), Some(a10.clone()));

    let nodes = [n0.clone(), n5.clone(), n10.clone(), n20.clone()];
    for _ in 0..5 {
        maintenance_round(&nodes).await;
    }

    assert_eq!(pointers(&n0), (Some(a20.clone()), Some(a5.clone())));
    assert_eq!(pointers(&n5), (Some(a0.clone()), Some(a10.clone())));
    assert_eq!(pointers(&n10), (Some(a5.clone()), Some(a20.clone())));
    assert_eq!(pointers(&n20), (Some(a10.clone()), Some(a0)));

    // lookups route to the new owner
    assert_eq!(n20.find_successor(space.id(3)).await.unwrap(), a5);
    assert_eq!(n20.find_successor(space.id(5)).await.unwrap(), a5);
    assert_eq!(n20.find_successor(space.id(6)).await.unwrap(), a10);
}

#[tokio::test]
async fn test_ring_heals_after_node_death() {
    setup_tracing();
    let net = MockNet::new();
    let config = small_ring_config();
    let space = RingSpace::new(config.ring_bits).unwrap();
    let a0 = addr_with_id(space, 0);
    let a10 = addr_with_id(space, 10);
    let a20 = addr_with_id(space, 20);
    let n0 = net.add_node(a0.clone(), config.clone());
    let n10 = net.add_node(a10.clone(), config.clone());
    let n20 = net.add_node(a20.clone(), config);

    n10.join(&a0).await.unwrap();
    n20.join(&a0).await.unwrap();
    let nodes = [n0.clone(), n10.clone(), n20.clone()];
    for _ in 0..5 {
        maintenance_round(&nodes).await;
    }

    net.kill(&a10);

    let survivors = [n0.clone(), n20.clone()];
    let mut healed = false;
    for _ in 0..10 {
        maintenance_round(&survivors).await;
        if pointers(&n0) == (Some(a20.clone()), Some(a20.clone()))
            && pointers(&n20) == (Some(a0.clone()), Some(a0.clone()))
        {
            healed = true;
            break;
        }
    }
    assert!(healed, "survivors did not re-form a two-node ring");

    // no stale routing state is left behind
    for node in &survivors {
        assert!(!node.fingers().unwrap().contains(&Some(a10.clone())));
    }
    assert_eq!(n0.find_successor(space.id(5)).await.unwrap(), a20);
    assert_eq!(n20.find_successor(space.id(25)).await.unwrap(), a0);
}

#[tokio::test]
async fn test_stabilizer_drives_ring_to_convergence() {
    setup_tracing();
    let net = MockNet::new();
    let config = small_ring_config();
    let space = RingSpace::new(config.ring_bits).unwrap();
    let a0 = addr_with_id(space, 0);
    let a10 = addr_with_id(space, 10);
    let a20 = addr_with_id(space, 20);
    let n0 = net.add_node(a0.clone(), config.clone());
    let n10 = net.add_node(a10.clone(), config.clone());
    let n20 = net.add_node(a20.clone(), config);

    n10.join(&a0).await.unwrap();
    n20.join(&a0).await.unwrap();

    let nodes = [n0.clone(), n10.clone(), n20.clone()];
    let handles: Vec<_> = nodes
        .iter()
        .map(|node| {
            let stabilizer = Stabilizer::new(Arc::clone(node));
            tokio::spawn(async move { stabilizer.run().await })
        })
        .collect();

    let mut converged = false;
    for _ in 0..200 {
        tokio::time::sleep(Duration::from_millis(25)).await;
        if pointers(&n0) == (Some(a20.clone()), Some(a10.clone()))
            && pointers(&n10) == (Some(a0.clone()), Some(a20.clone()))
            && pointers(&n20) == (Some(a10.clone()), Some(a0.clone()))
        {
            converged = true;
            break;
        }
    }
    for handle in handles {
        handle.abort();
    }
    assert!(converged, "maintenance loops did not converge the ring");
}
