use async_trait::async_trait;
use parley_coordinator::error::TransportError;
use parley_coordinator::signaling::{SignalingTransport, Subscription};
use parley_core::{Envelope, PeerId, RoomId, SignalMessage};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

type Inbound = mpsc::UnboundedSender<Result<Envelope, TransportError>>;

/// Relay driven by the test: captures what the coordinator sends and
/// delivers whatever the test injects, as often as it is injected.
pub struct ScriptedTransport {
    room_id: RoomId,
    echo: bool,
    sent: Mutex<Vec<Envelope>>,
    sent_tx: mpsc::UnboundedSender<Envelope>,
    inbound: Mutex<Option<Inbound>>,
}

impl ScriptedTransport {
    /// Returns the transport and a stream of every envelope sent through it.
    pub fn new(room_id: RoomId) -> (Arc<Self>, mpsc::UnboundedReceiver<Envelope>) {
        Self::build(room_id, false)
    }

    /// Like [`new`](Self::new), but every sent envelope is also delivered
    /// back to the sender's own subscription.
    pub fn echoing(room_id: RoomId) -> (Arc<Self>, mpsc::UnboundedReceiver<Envelope>) {
        Self::build(room_id, true)
    }

    fn build(room_id: RoomId, echo: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<Envelope>) {
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            room_id,
            echo,
            sent: Mutex::new(Vec::new()),
            sent_tx,
            inbound: Mutex::new(None),
        });
        (transport, sent_rx)
    }

    pub fn inject(&self, envelope: Envelope) {
        if let Some(tx) = self.inbound.lock().unwrap().as_ref() {
            let _ = tx.send(Ok(envelope));
        }
    }

    pub fn inject_error(&self, error: TransportError) {
        if let Some(tx) = self.inbound.lock().unwrap().as_ref() {
            let _ = tx.send(Err(error));
        }
    }

    /// Envelope from `from` addressed to `to`.
    pub fn directed(&self, from: &PeerId, to: &PeerId, message: SignalMessage) -> Envelope {
        Envelope::directed(self.room_id.clone(), from.clone(), to.clone(), message)
    }

    /// Envelope from `from` to the whole room.
    pub fn broadcast(&self, from: &PeerId, message: SignalMessage) -> Envelope {
        Envelope::broadcast(self.room_id.clone(), from.clone(), message)
    }

    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().unwrap().clone()
    }

    pub fn is_subscribed(&self) -> bool {
        self.inbound
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }
}

#[async_trait]
impl SignalingTransport for ScriptedTransport {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        tracing::debug!("[ScriptedTransport] sent {:?}", envelope.message.kind());
        self.sent.lock().unwrap().push(envelope.clone());
        let _ = self.sent_tx.send(envelope.clone());
        if self.echo {
            self.inject(envelope);
        }
        Ok(())
    }

    async fn subscribe(&self, _room_id: &RoomId) -> Result<Subscription, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.inbound.lock().unwrap() = Some(tx);
        Ok(Subscription::new(rx))
    }
}
