use crate::engine::EngineEvent;
use crate::error::EngineError;
use async_trait::async_trait;
use bytes::Bytes;
use parley_core::{IceCandidate, IceServerConfig, PeerId, SessionDescription};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Per-peer handle onto the platform's offer/answer and ICE machinery.
///
/// Implementations report everything asynchronous (local candidates,
/// connectivity changes, data channel lifecycle) through the event sender
/// they were created with.
#[async_trait]
pub trait NegotiationEngine: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, EngineError>;

    async fn create_answer(&self) -> Result<SessionDescription, EngineError>;

    async fn set_local_description(&self, description: SessionDescription) -> Result<(), EngineError>;

    async fn set_remote_description(&self, description: SessionDescription) -> Result<(), EngineError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError>;

    /// Create a data channel on the offering side. Its open/message/close
    /// callbacks go to the engine's event sender.
    async fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>, EngineError>;

    async fn close(&self) -> Result<(), EngineError>;
}

#[async_trait]
pub trait DataChannel: Send + Sync {
    fn label(&self) -> String;

    async fn send(&self, data: Bytes) -> Result<(), EngineError>;

    async fn close(&self) -> Result<(), EngineError>;
}

/// Builds one engine per remote peer.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn create(
        &self,
        peer_id: &PeerId,
        ice_servers: &[IceServerConfig],
        events: mpsc::Sender<EngineEvent>,
    ) -> Result<Arc<dyn NegotiationEngine>, EngineError>;
}
