use std::sync::Arc;

use parley_coordinator::signaling::MemoryRelay;
use parley_coordinator::CoordinatorEvent;
use parley_core::{Role, RolePreference};

use crate::integration::{init_tracing, start_peer, test_config};
use crate::utils::{EVENT_TIMEOUT_MS, MockNetwork, wait_for_event};

#[tokio::test]
async fn test_explicit_roles_connect() {
    init_tracing();

    for (first, second) in [
        (RolePreference::Responder, RolePreference::Initiator),
        (RolePreference::Initiator, RolePreference::Responder),
    ] {
        let relay = MemoryRelay::new();
        let network = MockNetwork::new();

        let mut a = start_peer(test_config(first), Arc::new(relay.clone()), Arc::new(network.clone())).await;
        let mut b = start_peer(test_config(second), Arc::new(relay.clone()), Arc::new(network.clone())).await;
        let b_id = b.coordinator.local_id().clone();
        let a_id = a.coordinator.local_id().clone();

        for (peer, other) in [(&mut a, &b_id), (&mut b, &a_id)] {
            wait_for_event(&mut peer.events, EVENT_TIMEOUT_MS, |event| match event {
                CoordinatorEvent::ChannelOpen { peer_id } if peer_id == other => Some(()),
                _ => None,
            })
            .await
            .unwrap_or_else(|_| panic!("Channel never opened for {first:?}/{second:?}"));
        }

        let a_role = a.coordinator.peers().await.expect("Snapshot failed")[0].role;
        let b_role = b.coordinator.peers().await.expect("Snapshot failed")[0].role;
        let expected = |pref| match pref {
            RolePreference::Initiator => Role::Initiator,
            _ => Role::Responder,
        };
        assert_eq!(a_role, expected(first));
        assert_eq!(b_role, expected(second));

        a.coordinator.stop().await;
        b.coordinator.stop().await;
    }
}
