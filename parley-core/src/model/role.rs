use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Side a participant plays in one pairwise negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Creates the data channel and the offer.
    Initiator,
    /// Waits for the offer and answers it.
    Responder,
}

/// What the local participant asks for when it starts.
///
/// `Auto` derives the role per peer from who was already in the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RolePreference {
    Initiator,
    Responder,
    #[default]
    Auto,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Initiator => f.write_str("initiator"),
            Role::Responder => f.write_str("responder"),
        }
    }
}

impl FromStr for RolePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "initiator" => Ok(Self::Initiator),
            "responder" => Ok(Self::Responder),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown role {other:?}, expected initiator|responder|auto")),
        }
    }
}
