use crate::model::{PeerId, RoomId, SignalMessage};
use crate::utils::now_millis;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Deduplication key of one envelope.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Hash, Eq, PartialEq)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One signaling message as it travels over the relay.
///
/// `timestamp` is milliseconds since the Unix epoch. Poll-based transports use
/// it to advance their watermark; nothing orders on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub room_id: RoomId,
    pub sender: PeerId,
    /// `None` addresses every participant of the room.
    pub recipient: Option<PeerId>,
    pub message_id: MessageId,
    pub timestamp: u64,
    pub message: SignalMessage,
}

impl Envelope {
    pub fn broadcast(room_id: RoomId, sender: PeerId, message: SignalMessage) -> Self {
        Self {
            room_id,
            sender,
            recipient: None,
            message_id: MessageId::new(),
            timestamp: now_millis(),
            message,
        }
    }

    pub fn directed(room_id: RoomId, sender: PeerId, recipient: PeerId, message: SignalMessage) -> Self {
        Self {
            recipient: Some(recipient),
            ..Self::broadcast(room_id, sender, message)
        }
    }

    /// True when the envelope is broadcast or addressed to `peer`.
    pub fn is_for(&self, peer: &PeerId) -> bool {
        self.recipient.as_ref().is_none_or(|r| r == peer)
    }
}
