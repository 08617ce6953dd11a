use crate::engine::DataChannel;
use bytes::Bytes;
use parley_core::IceCandidate;
use std::fmt;
use std::sync::Arc;

/// Connectivity states reported by the negotiation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    IceGathering,
    IceChecking,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Callbacks from a negotiation engine, delivered in order to the owning session.
pub enum EngineEvent {
    /// Trickle ICE: a local candidate that must reach the remote peer.
    LocalCandidate(IceCandidate),

    Connectivity(ConnectivityState),

    /// The remote side opened a data channel (responder side).
    DataChannel(Arc<dyn DataChannel>),

    ChannelOpen,

    ChannelMessage(Bytes),

    ChannelClosed,
}

impl fmt::Debug for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineEvent::LocalCandidate(c) => f.debug_tuple("LocalCandidate").field(&c.candidate).finish(),
            EngineEvent::Connectivity(s) => f.debug_tuple("Connectivity").field(s).finish(),
            EngineEvent::DataChannel(dc) => f.debug_tuple("DataChannel").field(&dc.label()).finish(),
            EngineEvent::ChannelOpen => f.write_str("ChannelOpen"),
            EngineEvent::ChannelMessage(data) => f.debug_tuple("ChannelMessage").field(&data.len()).finish(),
            EngineEvent::ChannelClosed => f.write_str("ChannelClosed"),
        }
    }
}
