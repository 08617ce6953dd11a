use std::sync::Arc;

use parley_coordinator::{CoordinatorEvent, NegotiationState};
use parley_core::{IceCandidate, PeerId, RolePreference, SessionDescription, SignalKind, SignalMessage};

use crate::integration::{init_tracing, start_peer, test_config, test_room};
use crate::utils::{EVENT_TIMEOUT_MS, MockNetwork, ScriptedTransport, eventually, wait_for_event, wait_for_sent};

#[tokio::test]
async fn test_early_candidates_are_queued() {
    init_tracing();

    let (transport, mut sent_rx) = ScriptedTransport::new(test_room());
    let network = MockNetwork::new();
    let mut peer = start_peer(test_config(RolePreference::Auto), transport.clone(), Arc::new(network.clone())).await;
    let local = peer.coordinator.local_id().clone();
    let remote = PeerId::new();

    // Candidates overtake the offer on the relay.
    for n in 0..3 {
        let candidate = IceCandidate::new(format!("candidate:early:{n}"));
        transport.inject(transport.directed(&remote, &local, SignalMessage::Candidate(candidate)));
    }

    // The first candidate opens a responder session.
    wait_for_event(&mut peer.events, EVENT_TIMEOUT_MS, |event| match event {
        CoordinatorEvent::StateChanged { peer_id, state } if peer_id == &remote => {
            (*state == NegotiationState::AwaitingOffer).then_some(())
        }
        _ => None,
    })
    .await
    .expect("No responder session");
    let engine = network.engine_toward(&remote).expect("engine for remote");
    assert!(engine.applied_candidates().is_empty(), "nothing applied before the offer");

    transport.inject(transport.directed(&remote, &local, SignalMessage::Offer(SessionDescription::offer("mock:remote"))));
    wait_for_sent(&mut sent_rx, SignalKind::Answer, EVENT_TIMEOUT_MS)
        .await
        .expect("Answer never sent");

    assert_eq!(
        engine.applied_candidates(),
        vec![
            "candidate:early:0".to_string(),
            "candidate:early:1".to_string(),
            "candidate:early:2".to_string(),
        ],
        "queued candidates are applied in arrival order"
    );

    // Later candidates go straight to the engine.
    let late = IceCandidate::new("candidate:late");
    transport.inject(transport.directed(&remote, &local, SignalMessage::Candidate(late)));
    assert!(eventually(EVENT_TIMEOUT_MS, || engine.applied_candidates().len() == 4).await);
    assert_eq!(engine.applied_candidates()[3], "candidate:late");

    peer.coordinator.stop().await;
}
