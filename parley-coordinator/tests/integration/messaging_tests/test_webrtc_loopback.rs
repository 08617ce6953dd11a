use std::sync::Arc;

use bytes::Bytes;
use parley_coordinator::engine::RtcEngineFactory;
use parley_coordinator::error::Target;
use parley_coordinator::signaling::MemoryRelay;
use parley_coordinator::CoordinatorEvent;
use parley_core::RolePreference;

use crate::integration::{init_tracing, start_peer, test_config};
use crate::utils::wait_for_event;

/// Host candidates only; generous timeout for real ICE.
const LOOPBACK_TIMEOUT_MS: u64 = 30_000;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_webrtc_loopback() {
    init_tracing();

    let relay = MemoryRelay::new();
    let mut alice = start_peer(
        test_config(RolePreference::Initiator),
        Arc::new(relay.clone()),
        Arc::new(RtcEngineFactory::new()),
    )
    .await;
    let mut bob = start_peer(
        test_config(RolePreference::Responder),
        Arc::new(relay.clone()),
        Arc::new(RtcEngineFactory::new()),
    )
    .await;
    let alice_id = alice.coordinator.local_id().clone();
    let bob_id = bob.coordinator.local_id().clone();

    for peer in [&mut alice, &mut bob] {
        wait_for_event(&mut peer.events, LOOPBACK_TIMEOUT_MS, |event| {
            matches!(event, CoordinatorEvent::ChannelOpen { .. }).then_some(())
        })
        .await
        .expect("WebRTC channel never opened");
    }

    alice
        .coordinator
        .send(Target::Peer(bob_id.clone()), Bytes::from_static(b"over real webrtc"))
        .await
        .expect("Send failed");
    let (from, data) = wait_for_event(&mut bob.events, LOOPBACK_TIMEOUT_MS, |event| match event {
        CoordinatorEvent::Message { peer_id, data } => Some((peer_id.clone(), data.clone())),
        _ => None,
    })
    .await
    .expect("Message not received");
    assert_eq!(from, alice_id);
    assert_eq!(data, Bytes::from_static(b"over real webrtc"));

    let snapshot = alice.coordinator.peers().await.expect("Snapshot failed");
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].peer_id, bob_id);
    assert!(!snapshot[0].state.is_terminal());

    alice.coordinator.stop().await;
    bob.coordinator.stop().await;
}
