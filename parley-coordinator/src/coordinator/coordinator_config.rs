use parley_core::utils::DEFAULT_STUN_ADDR;
use parley_core::{IceServerConfig, RolePreference, RoomId};
use std::time::Duration;

/// Settings for one coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub room_id: RoomId,
    pub role: RolePreference,
    pub ice_servers: Vec<IceServerConfig>,
    /// How long a session may sit in `IceChecking` before a diagnostic is raised.
    pub connect_timeout: Duration,
    /// How long a session may sit in `Disconnected` before it is failed.
    pub disconnect_grace: Duration,
    pub dedup_window: Duration,
    pub dedup_capacity: usize,
    /// Release the relay subscription once the last session has ended.
    pub release_when_idle: bool,
    pub channel_label: String,
}

impl CoordinatorConfig {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            role: RolePreference::Auto,
            ice_servers: vec![IceServerConfig::stun(DEFAULT_STUN_ADDR)],
            connect_timeout: Duration::from_secs(30),
            disconnect_grace: Duration::from_secs(30),
            dedup_window: Duration::from_secs(300),
            dedup_capacity: 4096,
            release_when_idle: true,
            channel_label: "data".to_owned(),
        }
    }

    pub fn with_role(mut self, role: RolePreference) -> Self {
        self.role = role;
        self
    }

    pub fn with_ice_servers(mut self, ice_servers: Vec<IceServerConfig>) -> Self {
        self.ice_servers = ice_servers;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_disconnect_grace(mut self, grace: Duration) -> Self {
        self.disconnect_grace = grace;
        self
    }

    pub fn with_dedup_bounds(mut self, window: Duration, capacity: usize) -> Self {
        self.dedup_window = window;
        self.dedup_capacity = capacity;
        self
    }

    pub fn with_release_when_idle(mut self, release: bool) -> Self {
        self.release_when_idle = release;
        self
    }
}
