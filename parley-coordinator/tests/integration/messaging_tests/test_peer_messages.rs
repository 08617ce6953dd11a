use std::sync::Arc;

use bytes::Bytes;
use parley_coordinator::error::Target;
use parley_coordinator::signaling::MemoryRelay;
use parley_coordinator::CoordinatorEvent;
use parley_core::{PeerId, RolePreference};

use crate::integration::{TestPeer, init_tracing, start_peer, test_config};
use crate::utils::{EVENT_TIMEOUT_MS, MockNetwork, QUIET_PERIOD_MS, collect_events, wait_for_event};

async fn wait_for_open(peer: &mut TestPeer, remote: &PeerId) {
    wait_for_event(&mut peer.events, EVENT_TIMEOUT_MS, |event| match event {
        CoordinatorEvent::ChannelOpen { peer_id } if peer_id == remote => Some(()),
        _ => None,
    })
    .await
    .expect("Channel never opened");
}

async fn next_message(peer: &mut TestPeer) -> (PeerId, Bytes) {
    wait_for_event(&mut peer.events, EVENT_TIMEOUT_MS, |event| match event {
        CoordinatorEvent::Message { peer_id, data } => Some((peer_id.clone(), data.clone())),
        _ => None,
    })
    .await
    .expect("Message not received")
}

#[tokio::test]
async fn test_peer_messages() {
    init_tracing();

    let relay = MemoryRelay::new();
    let network = MockNetwork::new();
    let mut alice = start_peer(test_config(RolePreference::Auto), Arc::new(relay.clone()), Arc::new(network.clone())).await;
    let mut bob = start_peer(test_config(RolePreference::Auto), Arc::new(relay.clone()), Arc::new(network)).await;
    let alice_id = alice.coordinator.local_id().clone();
    let bob_id = bob.coordinator.local_id().clone();

    wait_for_open(&mut alice, &bob_id).await;
    wait_for_open(&mut bob, &alice_id).await;
    assert_eq!(alice.coordinator.connected_peers(), vec![bob_id.clone()]);
    assert_eq!(bob.coordinator.connected_peers(), vec![alice_id.clone()]);

    alice
        .coordinator
        .send(Target::Peer(bob_id.clone()), Bytes::from_static(b"hi bob"))
        .await
        .expect("Send failed");
    assert_eq!(next_message(&mut bob).await, (alice_id.clone(), Bytes::from_static(b"hi bob")));

    // Payloads are opaque bytes.
    let binary = Bytes::from(vec![0u8, 159, 146, 150, 255]);
    bob.coordinator
        .send(Target::Broadcast, binary.clone())
        .await
        .expect("Broadcast failed");
    assert_eq!(next_message(&mut alice).await, (bob_id.clone(), binary));

    // The sender never hears its own message.
    let echoes = collect_events(&mut alice.events, QUIET_PERIOD_MS, |event| match event {
        CoordinatorEvent::Message { .. } => Some(()),
        _ => None,
    })
    .await;
    assert!(echoes.is_empty());

    alice.coordinator.stop().await;
    bob.coordinator.stop().await;
}
