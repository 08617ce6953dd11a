use crate::error::TransportError;
use async_trait::async_trait;
use parley_core::{Envelope, RoomId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// The relay that moves envelopes between participants of a room.
///
/// Delivery is at-least-once with no ordering guarantee, and a relay may hand
/// a sender its own envelopes back. The coordinator copes with all three.
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError>;

    async fn subscribe(&self, room_id: &RoomId) -> Result<Subscription, TransportError>;
}

/// Stream of inbound envelopes for one room.
///
/// Dropping it releases the relay side: the receiver closes, and a
/// background poller, if any, is aborted.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Result<Envelope, TransportError>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(rx: mpsc::UnboundedReceiver<Result<Envelope, TransportError>>) -> Self {
        Self { rx, task: None }
    }

    pub fn with_task(
        rx: mpsc::UnboundedReceiver<Result<Envelope, TransportError>>,
        task: JoinHandle<()>,
    ) -> Self {
        Self { rx, task: Some(task) }
    }

    pub async fn recv(&mut self) -> Option<Result<Envelope, TransportError>> {
        self.rx.recv().await
    }

    /// Next envelope if one is already queued.
    pub fn try_recv(&mut self) -> Option<Result<Envelope, TransportError>> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
