use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// Offer or answer body; opaque to the coordinator beyond its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_m_line_index: Option<u16>,
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }
}

/// Everything participants say to each other over the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "d")]
pub enum SignalMessage {
    /// Broadcast when a coordinator starts listening to a room.
    Join,
    /// Directed reply to a `Join` from a participant that was already there.
    Present,
    /// Broadcast when a coordinator stops.
    Leave,
    Offer(SessionDescription),
    Answer(SessionDescription),
    Candidate(IceCandidate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Join,
    Present,
    Leave,
    Offer,
    Answer,
    Candidate,
}

impl SignalMessage {
    pub fn kind(&self) -> SignalKind {
        match self {
            SignalMessage::Join => SignalKind::Join,
            SignalMessage::Present => SignalKind::Present,
            SignalMessage::Leave => SignalKind::Leave,
            SignalMessage::Offer(_) => SignalKind::Offer,
            SignalMessage::Answer(_) => SignalKind::Answer,
            SignalMessage::Candidate(_) => SignalKind::Candidate,
        }
    }
}
