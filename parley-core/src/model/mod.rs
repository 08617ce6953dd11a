mod envelope;
mod peer;
mod role;
mod room;
mod signaling;

pub use envelope::{Envelope, MessageId};
pub use peer::PeerId;
pub use role::{Role, RolePreference};
pub use room::RoomId;
pub use signaling::{IceCandidate, IceServerConfig, SdpKind, SessionDescription, SignalKind, SignalMessage};
