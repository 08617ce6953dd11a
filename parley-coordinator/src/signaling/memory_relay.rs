use crate::error::TransportError;
use crate::signaling::{SignalingTransport, Subscription};
use async_trait::async_trait;
use dashmap::DashMap;
use parley_core::{Envelope, RoomId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

type Subscriber = mpsc::UnboundedSender<Result<Envelope, TransportError>>;

struct RelayInner {
    rooms: DashMap<RoomId, Vec<Subscriber>>,
    redeliver: usize,
}

/// In-process broadcast broker.
///
/// Every envelope posted to a room is serialized once and delivered to every
/// live subscriber of that room, the sender included, the way a naive socket
/// relay fans messages out. `with_redelivery(n)` delivers each envelope
/// `1 + n` times to simulate an at-least-once relay.
#[derive(Clone)]
pub struct MemoryRelay {
    inner: Arc<RelayInner>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RelayInner {
                rooms: DashMap::new(),
                redeliver: 0,
            }),
        }
    }

    pub fn with_redelivery(redeliver: usize) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                rooms: DashMap::new(),
                redeliver,
            }),
        }
    }

    /// Live subscriptions on `room_id`.
    pub fn subscriber_count(&self, room_id: &RoomId) -> usize {
        self.inner
            .rooms
            .get(room_id)
            .map(|subs| subs.iter().filter(|s| !s.is_closed()).count())
            .unwrap_or(0)
    }
}

impl Default for MemoryRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalingTransport for MemoryRelay {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        let json = serde_json::to_string(&envelope).map_err(|e| TransportError::Encode(e.to_string()))?;

        let Some(mut subscribers) = self.inner.rooms.get_mut(&envelope.room_id) else {
            debug!(room = %envelope.room_id, "no subscribers, envelope dropped");
            return Ok(());
        };
        subscribers.retain(|s| !s.is_closed());

        for subscriber in subscribers.iter() {
            for _ in 0..=self.inner.redeliver {
                let decoded = serde_json::from_str::<Envelope>(&json).map_err(TransportError::from);
                if subscriber.send(decoded).is_err() {
                    warn!(room = %envelope.room_id, "subscriber went away during fan-out");
                    break;
                }
            }
        }
        Ok(())
    }

    async fn subscribe(&self, room_id: &RoomId) -> Result<Subscription, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.rooms.entry(room_id.clone()).or_default().push(tx);
        Ok(Subscription::new(rx))
    }
}
