use crate::coordinator::coordinator_command::CoordinatorCommand;
use crate::coordinator::coordinator_loop::CoordinatorLoop;
use crate::coordinator::{CoordinatorConfig, CoordinatorEvent, PeerContext};
use crate::engine::EngineFactory;
use crate::error::{CoordinatorError, Target};
use crate::session::{NegotiationState, SessionContext};
use crate::signaling::SignalingTransport;
use bytes::Bytes;
use parley_core::{PeerId, Role, RolePreference, RoomId};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 1024;

/// One live session as seen from outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSnapshot {
    pub peer_id: PeerId,
    pub role: Role,
    pub state: NegotiationState,
}

enum Lifecycle {
    Idle,
    Running {
        room_id: RoomId,
        role: RolePreference,
        command_tx: mpsc::Sender<CoordinatorCommand>,
        task: JoinHandle<()>,
    },
    Stopped,
}

/// Drives peer connections for one local participant.
///
/// The handle is cheap to share behind an `Arc`. All negotiation happens on
/// a background loop started by [`start`](Self::start); results arrive as
/// [`CoordinatorEvent`]s on [`subscribe`](Self::subscribe).
pub struct Coordinator {
    local_id: PeerId,
    config: Arc<CoordinatorConfig>,
    transport: Arc<dyn SignalingTransport>,
    factory: Arc<dyn EngineFactory>,
    events: broadcast::Sender<CoordinatorEvent>,
    peers: PeerContext,
    lifecycle: Mutex<Lifecycle>,
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig,
        transport: Arc<dyn SignalingTransport>,
        factory: Arc<dyn EngineFactory>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            local_id: PeerId::new(),
            config: Arc::new(config),
            transport,
            factory,
            events,
            peers: PeerContext::new(),
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.events.subscribe()
    }

    /// Start in the configured room with the configured role.
    pub async fn start(&self) -> Result<(), CoordinatorError> {
        self.start_in(self.config.room_id.clone(), self.config.role).await
    }

    /// Subscribe to `room_id` and announce ourselves.
    ///
    /// Repeating the call with the same arguments is a no-op. Different
    /// arguments while running give [`CoordinatorError::AlreadyStarted`];
    /// any call after [`stop`](Self::stop) gives [`CoordinatorError::Stopped`].
    pub async fn start_in(&self, room_id: RoomId, role: RolePreference) -> Result<(), CoordinatorError> {
        let mut lifecycle = self.lifecycle.lock().await;
        // The loop also ends on its own once idle.
        if matches!(&*lifecycle, Lifecycle::Running { task, .. } if task.is_finished()) {
            *lifecycle = Lifecycle::Stopped;
        }
        match &*lifecycle {
            Lifecycle::Running {
                room_id: running_room,
                role: running_role,
                ..
            } => {
                if *running_room == room_id && *running_role == role {
                    debug!(room = %room_id, "start repeated with identical arguments");
                    return Ok(());
                }
                return Err(CoordinatorError::AlreadyStarted {
                    room: running_room.clone(),
                    role: *running_role,
                });
            }
            Lifecycle::Stopped => return Err(CoordinatorError::Stopped),
            Lifecycle::Idle => {}
        }

        let subscription = self.transport.subscribe(&room_id).await?;
        let ctx = Arc::new(SessionContext {
            local_id: self.local_id.clone(),
            room_id: room_id.clone(),
            config: self.config.clone(),
            transport: self.transport.clone(),
            factory: self.factory.clone(),
            events: self.events.clone(),
            peers: self.peers.clone(),
        });

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let coordinator_loop = CoordinatorLoop::new(ctx, role, subscription, command_rx);
        let task = tokio::spawn(coordinator_loop.run());

        info!(room = %room_id, local = %self.local_id, ?role, "coordinator started");
        *lifecycle = Lifecycle::Running {
            room_id,
            role,
            command_tx,
            task,
        };
        Ok(())
    }

    /// Announce `Leave`, close every session and release the relay
    /// subscription. Safe to call in any state, any number of times.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        let previous = std::mem::replace(&mut *lifecycle, Lifecycle::Stopped);
        let Lifecycle::Running { command_tx, task, .. } = previous else {
            return;
        };

        let (done_tx, done_rx) = oneshot::channel();
        if command_tx.send(CoordinatorCommand::Stop { done: done_tx }).await.is_ok() {
            let _ = done_rx.await;
        }
        if let Err(e) = task.await {
            warn!(error = %e, "coordinator loop ended abnormally");
        }
        info!(local = %self.local_id, "coordinator stopped");
    }

    /// Tear down the session with one peer. Unknown peers are ignored.
    pub async fn close_peer(&self, peer_id: &PeerId) -> Result<(), CoordinatorError> {
        let command_tx = self.command_sender().await?;
        command_tx
            .send(CoordinatorCommand::ClosePeer {
                peer_id: peer_id.clone(),
            })
            .await
            .map_err(|_| CoordinatorError::Stopped)
    }

    /// Every live session with its role and negotiation state.
    pub async fn peers(&self) -> Result<Vec<PeerSnapshot>, CoordinatorError> {
        let command_tx = self.command_sender().await?;
        let (reply, rx) = oneshot::channel();
        command_tx
            .send(CoordinatorCommand::Snapshot { reply })
            .await
            .map_err(|_| CoordinatorError::Stopped)?;
        rx.await.map_err(|_| CoordinatorError::Stopped)
    }

    pub async fn peer_state(&self, peer_id: &PeerId) -> Result<Option<NegotiationState>, CoordinatorError> {
        Ok(self
            .peers()
            .await?
            .into_iter()
            .find(|p| &p.peer_id == peer_id)
            .map(|p| p.state))
    }

    /// Peers with an open data channel.
    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.peers.list_peers()
    }

    /// Send application data over open data channels.
    ///
    /// Fails with [`CoordinatorError::ChannelClosed`] when the target has no
    /// open channel; nothing is queued.
    pub async fn send(&self, target: Target, data: Bytes) -> Result<(), CoordinatorError> {
        match target {
            Target::Peer(peer_id) => self.peers.send(&peer_id, data).await,
            Target::Broadcast => self.peers.broadcast(data).await.map(|_| ()),
        }
    }

    async fn command_sender(&self) -> Result<mpsc::Sender<CoordinatorCommand>, CoordinatorError> {
        match &*self.lifecycle.lock().await {
            Lifecycle::Running { command_tx, .. } => Ok(command_tx.clone()),
            Lifecycle::Idle => Err(CoordinatorError::NotStarted),
            Lifecycle::Stopped => Err(CoordinatorError::Stopped),
        }
    }
}
