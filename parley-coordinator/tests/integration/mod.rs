pub mod messaging_tests;
pub mod relay_tests;

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::Level;

use parley_coordinator::engine::EngineFactory;
use parley_coordinator::signaling::SignalingTransport;
use parley_coordinator::{Coordinator, CoordinatorConfig, CoordinatorEvent};
use parley_core::{RolePreference, RoomId};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn test_room() -> RoomId {
    RoomId::new("abc123").expect("valid room id")
}

/// No STUN, and sessions ending do not stop the coordinator.
pub fn test_config(role: RolePreference) -> CoordinatorConfig {
    CoordinatorConfig::new(test_room())
        .with_role(role)
        .with_ice_servers(Vec::new())
        .with_release_when_idle(false)
}

pub struct TestPeer {
    pub coordinator: Arc<Coordinator>,
    pub events: broadcast::Receiver<CoordinatorEvent>,
}

/// Build a coordinator, subscribe to its events, then start it.
pub async fn start_peer(
    config: CoordinatorConfig,
    transport: Arc<dyn SignalingTransport>,
    factory: Arc<dyn EngineFactory>,
) -> TestPeer {
    let coordinator = Arc::new(Coordinator::new(config, transport, factory));
    let events = coordinator.subscribe();
    coordinator.start().await.expect("Failed to start coordinator");
    TestPeer { coordinator, events }
}
