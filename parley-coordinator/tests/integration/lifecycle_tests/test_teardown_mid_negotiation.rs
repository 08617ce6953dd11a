use std::sync::Arc;
use std::time::Duration;

use parley_coordinator::signaling::MemoryRelay;
use parley_coordinator::{CoordinatorEvent, Diagnostic, NegotiationState};
use parley_core::{PeerId, RolePreference};

use crate::integration::{TestPeer, init_tracing, start_peer, test_config, test_room};
use crate::utils::{EVENT_TIMEOUT_MS, LinkMode, MockNetwork, collect_events, wait_for_event};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

async fn stalled_pair(relay: &MemoryRelay, network: &MockNetwork) -> (TestPeer, TestPeer) {
    let config = test_config(RolePreference::Auto).with_connect_timeout(CONNECT_TIMEOUT);
    let alice = start_peer(config.clone(), Arc::new(relay.clone()), Arc::new(network.clone())).await;
    let bob = start_peer(config, Arc::new(relay.clone()), Arc::new(network.clone())).await;
    (alice, bob)
}

async fn wait_for_checking(peer: &mut TestPeer, remote: &PeerId) {
    wait_for_event(&mut peer.events, EVENT_TIMEOUT_MS, |event| match event {
        CoordinatorEvent::StateChanged { peer_id, state } if peer_id == remote && *state == NegotiationState::IceChecking => {
            Some(())
        }
        _ => None,
    })
    .await
    .expect("Session never reached IceChecking");
}

async fn still_checking_after_timeout(peer: &mut TestPeer) -> Vec<PeerId> {
    collect_events(&mut peer.events, 6 * CONNECT_TIMEOUT.as_millis() as u64, |event| match event {
        CoordinatorEvent::Diagnostic(Diagnostic::StillChecking { peer_id, .. }) => Some(peer_id.clone()),
        _ => None,
    })
    .await
}

#[tokio::test(start_paused = true)]
async fn test_stop_while_checking() {
    init_tracing();

    let relay = MemoryRelay::new();
    let network = MockNetwork::with_mode(LinkMode::StallInChecking);
    let (mut alice, bob) = stalled_pair(&relay, &network).await;
    let bob_id = bob.coordinator.local_id().clone();

    wait_for_checking(&mut alice, &bob_id).await;
    let engine = network.engine_toward(&bob_id).expect("Alice's engine toward Bob");
    assert!(!engine.is_closed());

    alice.coordinator.stop().await;

    assert!(engine.is_closed(), "stop tears down the engine mid-negotiation");
    assert_eq!(relay.subscriber_count(&test_room()), 1, "only Bob is still subscribed");

    let late = still_checking_after_timeout(&mut alice).await;
    assert!(late.is_empty(), "timer outlived the session: {late:?}");

    bob.coordinator.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_close_peer_while_checking() {
    init_tracing();

    let relay = MemoryRelay::new();
    let network = MockNetwork::with_mode(LinkMode::StallInChecking);
    let (mut alice, bob) = stalled_pair(&relay, &network).await;
    let bob_id = bob.coordinator.local_id().clone();

    wait_for_checking(&mut alice, &bob_id).await;
    let engine = network.engine_toward(&bob_id).expect("Alice's engine toward Bob");

    alice.coordinator.close_peer(&bob_id).await.expect("close_peer failed");
    wait_for_event(&mut alice.events, EVENT_TIMEOUT_MS, |event| match event {
        CoordinatorEvent::PeerLeft { peer_id } if peer_id == &bob_id => Some(()),
        _ => None,
    })
    .await
    .expect("Session never ended");

    assert!(engine.is_closed());
    assert_eq!(alice.coordinator.peer_state(&bob_id).await.expect("Snapshot failed"), None);
    assert_eq!(relay.subscriber_count(&test_room()), 2, "closing one peer keeps the room");

    let late = still_checking_after_timeout(&mut alice).await;
    assert!(late.is_empty(), "timer outlived the session: {late:?}");

    alice.coordinator.stop().await;
    bob.coordinator.stop().await;
}
