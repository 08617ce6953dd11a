use crate::error::TransportError;
use crate::signaling::{MessageBoard, SignalingTransport, Subscription};
use async_trait::async_trait;
use parley_core::utils::now_millis;
use parley_core::{Envelope, MessageId, RoomId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Delay between two "messages since T" queries.
    pub interval: Duration,
    /// How far back the first query reaches, so a late joiner still sees
    /// the presence notices of participants already in the room.
    pub replay_window: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(250),
            replay_window: Duration::from_secs(60),
        }
    }
}

/// Poll-based relay over a [`MessageBoard`].
///
/// The watermark advances to the largest timestamp seen, including envelopes
/// the coordinator will later ignore. Queries are inclusive so a late write
/// sharing the watermark timestamp is not missed; envelopes already handed
/// over at that timestamp are remembered and skipped.
pub struct PollingTransport<B> {
    board: Arc<B>,
    config: PollingConfig,
}

impl<B: MessageBoard + 'static> PollingTransport<B> {
    pub fn new(board: Arc<B>, config: PollingConfig) -> Self {
        Self { board, config }
    }

    pub fn board(&self) -> &Arc<B> {
        &self.board
    }
}

async fn poll_room<B: MessageBoard>(
    board: Arc<B>,
    room_id: RoomId,
    config: PollingConfig,
    tx: mpsc::UnboundedSender<Result<Envelope, TransportError>>,
) {
    let mut watermark = now_millis().saturating_sub(config.replay_window.as_millis() as u64);
    // Ids delivered with `timestamp == watermark`.
    let mut at_watermark: HashSet<MessageId> = HashSet::new();
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if tx.is_closed() {
            break;
        }

        match board.list_since(&room_id, watermark).await {
            Ok(envelopes) => {
                for envelope in envelopes {
                    if envelope.timestamp < watermark {
                        continue;
                    }
                    if envelope.timestamp > watermark {
                        watermark = envelope.timestamp;
                        at_watermark.clear();
                    }
                    if !at_watermark.insert(envelope.message_id) {
                        continue;
                    }
                    if tx.send(Ok(envelope)).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(room = %room_id, "poll failed: {e}");
                if tx.send(Err(e)).is_err() {
                    return;
                }
            }
        }
    }
    debug!(room = %room_id, "poller stopped");
}

#[async_trait]
impl<B: MessageBoard + 'static> SignalingTransport for PollingTransport<B> {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.board.post(&envelope).await
    }

    async fn subscribe(&self, room_id: &RoomId) -> Result<Subscription, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(poll_room(
            self.board.clone(),
            room_id.clone(),
            self.config.clone(),
            tx,
        ));
        Ok(Subscription::with_task(rx, task))
    }
}
