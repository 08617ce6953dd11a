mod coordinator;
mod coordinator_command;
mod coordinator_config;
mod coordinator_event;
mod coordinator_loop;
mod dedup_log;
mod peer_context;
pub mod roles;

pub use coordinator::{Coordinator, PeerSnapshot};
pub use coordinator_config::CoordinatorConfig;
pub use coordinator_event::{CoordinatorEvent, Diagnostic};
pub use dedup_log::DedupLog;
pub use peer_context::PeerContext;
