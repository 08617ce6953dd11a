use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdError {
    #[error("invalid peer id {0:?}: {1}")]
    InvalidPeerId(String, uuid::Error),

    #[error("room id must not be empty")]
    EmptyRoomId,
}
