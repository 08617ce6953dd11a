use crate::engine::DataChannel;
use crate::error::{CoordinatorError, Target};
use bytes::Bytes;
use dashmap::DashMap;
use parley_core::PeerId;
use std::sync::Arc;
use tracing::{debug, warn};

/// Registry of open data channels, shared by the coordinator handle and the
/// peer sessions. Cheap to clone.
#[derive(Clone, Default)]
pub struct PeerContext {
    channels: Arc<DashMap<PeerId, Arc<dyn DataChannel>>>,
}

impl PeerContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, peer_id: PeerId, channel: Arc<dyn DataChannel>) {
        self.channels.insert(peer_id, channel);
    }

    pub(crate) fn unregister(&self, peer_id: &PeerId) -> bool {
        self.channels.remove(peer_id).is_some()
    }

    /// Send to one peer over its open channel.
    pub async fn send(&self, peer_id: &PeerId, data: Bytes) -> Result<(), CoordinatorError> {
        // Clone out of the map so no shard guard is held across the await.
        let channel = self
            .channels
            .get(peer_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CoordinatorError::ChannelClosed(Target::Peer(peer_id.clone())))?;

        channel.send(data).await.map_err(|e| {
            debug!(peer = %peer_id, error = %e, "data channel send failed");
            CoordinatorError::ChannelClosed(Target::Peer(peer_id.clone()))
        })
    }

    /// Send to every peer with an open channel. Returns how many accepted it.
    pub async fn broadcast(&self, data: Bytes) -> Result<usize, CoordinatorError> {
        let channels: Vec<(PeerId, Arc<dyn DataChannel>)> = self
            .channels
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        if channels.is_empty() {
            return Err(CoordinatorError::ChannelClosed(Target::Broadcast));
        }

        let mut delivered = 0;
        for (peer_id, channel) in channels {
            match channel.send(data.clone()).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(peer = %peer_id, error = %e, "broadcast to peer failed"),
            }
        }

        if delivered == 0 {
            return Err(CoordinatorError::ChannelClosed(Target::Broadcast));
        }
        Ok(delivered)
    }

    pub fn list_peers(&self) -> Vec<PeerId> {
        self.channels.iter().map(|entry| entry.key().clone()).collect()
    }
}
