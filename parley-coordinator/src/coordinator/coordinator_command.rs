use crate::coordinator::PeerSnapshot;
use parley_core::PeerId;
use tokio::sync::oneshot;

/// Requests from the [`Coordinator`](crate::coordinator::Coordinator) handle to its loop.
#[derive(Debug)]
pub(crate) enum CoordinatorCommand {
    /// Tear down the session with one peer.
    ClosePeer { peer_id: PeerId },

    /// Report every live session.
    Snapshot { reply: oneshot::Sender<Vec<PeerSnapshot>> },

    /// Announce `Leave`, close every session and release the subscription.
    Stop { done: oneshot::Sender<()> },
}
