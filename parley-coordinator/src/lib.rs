//! Peer-to-peer connection coordination over an unreliable signaling relay.
//!
//! A [`Coordinator`] joins a room on a [`SignalingTransport`], discovers the
//! other participants and runs one offer/answer negotiation per peer through
//! a [`NegotiationEngine`]. Application data then flows over data channels.

pub mod coordinator;
pub mod engine;
pub mod error;
pub mod session;
pub mod signaling;

pub use coordinator::{Coordinator, CoordinatorConfig, CoordinatorEvent, Diagnostic, PeerSnapshot};
pub use engine::{ConnectivityState, DataChannel, EngineEvent, EngineFactory, NegotiationEngine, RtcEngineFactory};
pub use error::{CoordinatorError, EngineError, Target, TransportError};
pub use session::NegotiationState;
pub use signaling::{
    FileBoard, MemoryBoard, MemoryRelay, MessageBoard, PollingConfig, PollingTransport, SignalingTransport,
    Subscription,
};
