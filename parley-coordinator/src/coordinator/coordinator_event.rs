use crate::error::{EngineError, TransportError};
use crate::session::NegotiationState;
use bytes::Bytes;
use parley_core::{PeerId, Role};
use std::fmt;
use std::time::Duration;

/// Everything the coordinator reports to its caller.
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    PeerJoined { peer_id: PeerId, role: Role },
    PeerLeft { peer_id: PeerId },
    StateChanged { peer_id: PeerId, state: NegotiationState },
    Connected { peer_id: PeerId },
    Disconnected { peer_id: PeerId },
    Failed { peer_id: PeerId, reason: String },
    ChannelOpen { peer_id: PeerId },
    ChannelClosed { peer_id: PeerId },
    Message { peer_id: PeerId, data: Bytes },
    Diagnostic(Diagnostic),
}

/// Non-fatal conditions the caller may want to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    Transport { error: TransportError },
    Negotiation { peer_id: PeerId, error: EngineError },
    StillChecking { peer_id: PeerId, elapsed: Duration },
    /// Both sides sent an offer; nothing will resolve it at this layer.
    OfferCollision { peer_id: PeerId },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Transport { error } => write!(f, "signaling relay: {error}"),
            Diagnostic::Negotiation { peer_id, error } => {
                write!(f, "negotiation with {} failed: {error}", peer_id.short())
            }
            Diagnostic::StillChecking { peer_id, elapsed } => write!(
                f,
                "still checking connectivity with {} after {}s, likely NAT or firewall",
                peer_id.short(),
                elapsed.as_secs()
            ),
            Diagnostic::OfferCollision { peer_id } => {
                write!(f, "{} sent an offer while ours was outstanding", peer_id.short())
            }
        }
    }
}
