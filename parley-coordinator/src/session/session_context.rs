use crate::coordinator::{CoordinatorConfig, CoordinatorEvent, Diagnostic, PeerContext};
use crate::engine::EngineFactory;
use crate::signaling::SignalingTransport;
use parley_core::{Envelope, PeerId, RoomId, SignalMessage};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// What the coordinator loop and every session of one room share.
pub(crate) struct SessionContext {
    pub local_id: PeerId,
    pub room_id: RoomId,
    pub config: Arc<CoordinatorConfig>,
    pub transport: Arc<dyn SignalingTransport>,
    pub factory: Arc<dyn EngineFactory>,
    pub events: broadcast::Sender<CoordinatorEvent>,
    pub peers: PeerContext,
}

impl SessionContext {
    pub fn emit(&self, event: CoordinatorEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Send a directed message to one peer.
    pub async fn signal(&self, recipient: &PeerId, message: SignalMessage) {
        let envelope = Envelope::directed(
            self.room_id.clone(),
            self.local_id.clone(),
            recipient.clone(),
            message,
        );
        self.deliver(envelope).await;
    }

    /// Send a message to everyone in the room.
    pub async fn announce(&self, message: SignalMessage) {
        let envelope = Envelope::broadcast(self.room_id.clone(), self.local_id.clone(), message);
        self.deliver(envelope).await;
    }

    async fn deliver(&self, envelope: Envelope) {
        let kind = envelope.message.kind();
        let message_id = envelope.message_id;
        match self.transport.send(envelope).await {
            Ok(()) => trace!(?kind, %message_id, "signal sent"),
            Err(error) => {
                warn!(?kind, %error, "failed to send signal");
                self.emit(CoordinatorEvent::Diagnostic(Diagnostic::Transport { error }));
            }
        }
    }
}
