use futures::future;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, info, trace, warn};

use crate::coordinator::coordinator_command::CoordinatorCommand;
use crate::coordinator::roles::{PresenceCue, glare_role, local_role};
use crate::coordinator::{CoordinatorEvent, DedupLog, Diagnostic, PeerSnapshot};
use crate::error::TransportError;
use crate::session::{SessionContext, SessionHandle, SessionInput, spawn_session};
use crate::signaling::Subscription;
use parley_core::{Envelope, PeerId, Role, RolePreference, SignalMessage};

/// How long `stop` waits for each session to tear down.
const SESSION_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// The coordinator's event loop.
///
/// Owns the relay subscription, the dedup log and the session table. Every
/// inbound envelope passes through here and is handed to exactly one
/// session, so nothing else touches the table.
pub(crate) struct CoordinatorLoop {
    ctx: Arc<SessionContext>,
    preference: RolePreference,
    dedup: DedupLog,
    sessions: HashMap<PeerId, SessionHandle>,
    /// Peers whose session has ended. Their traffic is dropped until they
    /// have been gone for a dedup window.
    departed: DedupLog<PeerId>,
    subscription: Subscription,
    command_rx: mpsc::Receiver<CoordinatorCommand>,
    ended_rx: mpsc::UnboundedReceiver<PeerId>,
    ended_tx: mpsc::UnboundedSender<PeerId>,
}

impl CoordinatorLoop {
    pub fn new(
        ctx: Arc<SessionContext>,
        preference: RolePreference,
        subscription: Subscription,
        command_rx: mpsc::Receiver<CoordinatorCommand>,
    ) -> Self {
        let (ended_tx, ended_rx) = mpsc::unbounded_channel();
        let dedup = DedupLog::new(ctx.config.dedup_window, ctx.config.dedup_capacity);
        let departed = DedupLog::new(ctx.config.dedup_window, ctx.config.dedup_capacity);

        Self {
            ctx,
            preference,
            dedup,
            sessions: HashMap::new(),
            departed,
            subscription,
            command_rx,
            ended_rx,
            ended_tx,
        }
    }

    /// Run until stopped. Must be spawned.
    pub async fn run(mut self) {
        info!(
            room = %self.ctx.room_id,
            local = %self.ctx.local_id.short(),
            preference = ?self.preference,
            "coordinator loop started"
        );
        self.ctx.announce(SignalMessage::Join).await;

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(CoordinatorCommand::Stop { done }) => {
                        self.shutdown().await;
                        let _ = done.send(());
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        info!("command channel closed, shutting down");
                        self.shutdown().await;
                        break;
                    }
                },

                inbound = self.subscription.recv() => match inbound {
                    Some(Ok(envelope)) => self.on_transport_message(envelope).await,
                    Some(Err(error)) => {
                        warn!(%error, "relay delivered an error");
                        self.ctx.emit(CoordinatorEvent::Diagnostic(Diagnostic::Transport { error }));
                    }
                    None => {
                        warn!("relay subscription ended unexpectedly");
                        self.ctx.emit(CoordinatorEvent::Diagnostic(Diagnostic::Transport {
                            error: TransportError::Closed,
                        }));
                        self.shutdown().await;
                        break;
                    }
                },

                Some(peer_id) = self.ended_rx.recv() => {
                    if self.on_session_ended(peer_id) {
                        info!("last session ended, releasing relay subscription");
                        self.shutdown().await;
                        break;
                    }
                }
            }
        }

        info!("coordinator loop finished");
    }

    fn handle_command(&mut self, cmd: CoordinatorCommand) {
        match cmd {
            CoordinatorCommand::ClosePeer { peer_id } => match self.sessions.get(&peer_id) {
                Some(handle) => {
                    info!(peer = %peer_id.short(), "closing session on request");
                    handle.deliver(SessionInput::Close);
                }
                None => debug!(peer = %peer_id.short(), "close requested for unknown peer"),
            },
            CoordinatorCommand::Snapshot { reply } => {
                let snapshot = self
                    .sessions
                    .iter()
                    .map(|(peer_id, handle)| {
                        let status = handle.status();
                        PeerSnapshot {
                            peer_id: peer_id.clone(),
                            role: status.role,
                            state: status.state,
                        }
                    })
                    .collect();
                let _ = reply.send(snapshot);
            }
            CoordinatorCommand::Stop { done } => {
                // Handled in `run`, which owns the loop exit.
                let _ = done.send(());
            }
        }
    }

    /// Filter one inbound envelope and route it to its session.
    async fn on_transport_message(&mut self, envelope: Envelope) {
        let local = &self.ctx.local_id;
        if &envelope.sender == local {
            trace!(message_id = %envelope.message_id, "own envelope echoed back");
            return;
        }
        if !envelope.is_for(local) || envelope.room_id != self.ctx.room_id {
            return;
        }
        let now = Instant::now();
        if !self.dedup.check_and_record(envelope.message_id, now) {
            debug!(message_id = %envelope.message_id, "duplicate envelope dropped");
            return;
        }
        if self.departed.contains(&envelope.sender, now) {
            debug!(peer = %envelope.sender.short(), "traffic from departed peer dropped");
            return;
        }

        trace!(
            peer = %envelope.sender.short(),
            kind = ?envelope.message.kind(),
            "routing envelope"
        );
        self.route(envelope.sender, envelope.message).await;
    }

    async fn route(&mut self, sender: PeerId, message: SignalMessage) {
        match message {
            SignalMessage::Join => self.on_presence(sender, PresenceCue::RemoteJoined).await,
            SignalMessage::Present => self.on_presence(sender, PresenceCue::RemotePresent).await,
            SignalMessage::Leave => self.on_leave(sender),
            SignalMessage::Answer(_) if !self.sessions.contains_key(&sender) => {
                debug!(peer = %sender.short(), "answer from unknown peer dropped");
            }
            negotiation => {
                if !self.sessions.contains_key(&sender) {
                    let role = local_role(
                        self.preference,
                        PresenceCue::RemoteNegotiating,
                        &self.ctx.local_id,
                        &sender,
                    );
                    self.open_session(sender.clone(), role);
                }
                if let Some(handle) = self.sessions.get(&sender) {
                    handle.deliver(SessionInput::Signal(negotiation));
                }
            }
        }
    }

    async fn on_presence(&mut self, peer_id: PeerId, cue: PresenceCue) {
        if let Some(handle) = self.sessions.get(&peer_id) {
            // A `Present` for a session where we wait as responder means the
            // peer waits too.
            let glare = cue == PresenceCue::RemotePresent
                && self.preference == RolePreference::Auto
                && handle.status().role == Role::Responder
                && glare_role(&self.ctx.local_id, &peer_id) == Role::Initiator;
            if glare {
                info!(peer = %peer_id.short(), "both sides waiting, promoting to initiator");
                handle.deliver(SessionInput::Promote);
            }
            return;
        }

        let role = local_role(self.preference, cue, &self.ctx.local_id, &peer_id);
        if cue == PresenceCue::RemoteJoined && role == Role::Responder {
            self.ctx.signal(&peer_id, SignalMessage::Present).await;
        }
        self.open_session(peer_id, role);
    }

    fn on_leave(&mut self, peer_id: PeerId) {
        match self.sessions.get(&peer_id) {
            Some(handle) => {
                info!(peer = %peer_id.short(), "peer left the room");
                handle.deliver(SessionInput::Close);
            }
            None => debug!(peer = %peer_id.short(), "leave from unknown peer ignored"),
        }
    }

    fn open_session(&mut self, peer_id: PeerId, role: Role) {
        info!(peer = %peer_id.short(), %role, "opening session");
        self.ctx.emit(CoordinatorEvent::PeerJoined {
            peer_id: peer_id.clone(),
            role,
        });
        let handle = spawn_session(self.ctx.clone(), peer_id.clone(), role, self.ended_tx.clone());
        self.sessions.insert(peer_id, handle);
    }

    /// Returns true when the subscription should be released.
    fn on_session_ended(&mut self, peer_id: PeerId) -> bool {
        if self.sessions.remove(&peer_id).is_none() {
            return false;
        }
        debug!(peer = %peer_id.short(), remaining = self.sessions.len(), "session ended");
        self.departed.check_and_record(peer_id.clone(), Instant::now());
        self.ctx.emit(CoordinatorEvent::PeerLeft { peer_id });
        self.sessions.is_empty() && self.ctx.config.release_when_idle
    }

    async fn shutdown(&mut self) {
        self.ctx.announce(SignalMessage::Leave).await;

        let sessions: Vec<(PeerId, SessionHandle)> = self.sessions.drain().collect();
        for (_, handle) in &sessions {
            handle.deliver(SessionInput::Close);
        }
        let closing = sessions.into_iter().map(|(peer_id, handle)| async move {
            let mut task = handle.into_task();
            let finished = time::timeout(SESSION_SHUTDOWN_TIMEOUT, &mut task).await.is_ok();
            if !finished {
                task.abort();
            }
            (peer_id, finished)
        });
        for (peer_id, finished) in future::join_all(closing).await {
            if !finished {
                warn!(peer = %peer_id.short(), "session did not finish in time, aborted");
                self.ctx.peers.unregister(&peer_id);
            }
            self.departed.check_and_record(peer_id.clone(), Instant::now());
            self.ctx.emit(CoordinatorEvent::PeerLeft { peer_id });
        }
    }
}
