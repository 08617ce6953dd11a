use crate::error::IdError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque room code shared out-of-band by participants.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(code: impl Into<String>) -> Result<Self, IdError> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(IdError::EmptyRoomId);
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
