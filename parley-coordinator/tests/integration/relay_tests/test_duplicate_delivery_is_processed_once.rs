use std::sync::Arc;

use parley_coordinator::CoordinatorEvent;
use parley_core::{IceCandidate, PeerId, RolePreference, SessionDescription, SignalKind, SignalMessage};

use crate::integration::{init_tracing, start_peer, test_config, test_room};
use crate::utils::{
    EVENT_TIMEOUT_MS, MockNetwork, QUIET_PERIOD_MS, ScriptedTransport, collect_events, eventually, wait_for_sent,
};

#[tokio::test]
async fn test_duplicate_delivery_is_processed_once() {
    init_tracing();

    let (transport, mut sent_rx) = ScriptedTransport::new(test_room());
    let network = MockNetwork::new();
    let mut peer = start_peer(test_config(RolePreference::Auto), transport.clone(), Arc::new(network.clone())).await;
    let local = peer.coordinator.local_id().clone();
    let remote = PeerId::new();

    let offer = transport.directed(&remote, &local, SignalMessage::Offer(SessionDescription::offer("mock:remote")));
    let candidate = transport.directed(&remote, &local, SignalMessage::Candidate(IceCandidate::new("candidate:r:0")));

    // The relay hands over every envelope three times.
    for _ in 0..3 {
        transport.inject(offer.clone());
    }
    for _ in 0..3 {
        transport.inject(candidate.clone());
    }

    wait_for_sent(&mut sent_rx, SignalKind::Answer, EVENT_TIMEOUT_MS)
        .await
        .expect("Answer never sent");

    let joined = collect_events(&mut peer.events, QUIET_PERIOD_MS, |event| match event {
        CoordinatorEvent::PeerJoined { peer_id, .. } => Some(peer_id.clone()),
        _ => None,
    })
    .await;
    assert_eq!(joined, vec![remote.clone()], "exactly one session for the peer");

    let engine = network.engine_toward(&remote).expect("engine for remote");
    assert!(eventually(EVENT_TIMEOUT_MS, || engine.applied_candidates().len() == 1).await);
    assert_eq!(engine.remote_description_calls(), 1);
    assert_eq!(engine.applied_candidates(), vec!["candidate:r:0".to_string()]);

    let answers = transport
        .sent()
        .iter()
        .filter(|e| e.message.kind() == SignalKind::Answer)
        .count();
    assert_eq!(answers, 1);

    peer.coordinator.stop().await;
}
