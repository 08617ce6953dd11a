use parley_core::{PeerId, RoomId};
use thiserror::Error;

/// Errors returned to the caller of the coordinator API.
///
/// Negotiation problems never show up here; they arrive as events.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("coordinator already started in room {room} as {role:?}")]
    AlreadyStarted { room: RoomId, role: parley_core::RolePreference },

    #[error("coordinator is not started")]
    NotStarted,

    #[error("coordinator has been stopped")]
    Stopped,

    #[error("no open data channel to {0}")]
    ChannelClosed(Target),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Destination of an application message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Peer(PeerId),
    Broadcast,
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Peer(id) => write!(f, "peer {id}"),
            Target::Broadcast => f.write_str("any peer"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("relay unavailable: {0}")]
    Unavailable(String),

    #[error("failed to encode envelope: {0}")]
    Encode(String),

    #[error("failed to decode envelope: {0}")]
    Decode(String),

    #[error("relay I/O error: {0}")]
    Io(String),

    #[error("subscription closed")]
    Closed,
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            TransportError::Io(e.to_string())
        } else {
            TransportError::Decode(e.to_string())
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::Io(e.to_string())
    }
}

/// Rejection from the negotiation engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine setup failed: {0}")]
    Setup(String),

    #[error("{op} rejected: {reason}")]
    Rejected { op: &'static str, reason: String },

    #[error("data channel closed")]
    ChannelClosed,
}

impl EngineError {
    pub fn rejected(op: &'static str, reason: impl std::fmt::Display) -> Self {
        EngineError::Rejected {
            op,
            reason: reason.to_string(),
        }
    }
}
