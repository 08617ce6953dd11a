use crate::coordinator::{CoordinatorEvent, Diagnostic};
use crate::engine::{DataChannel, EngineEvent, NegotiationEngine};
use crate::error::EngineError;
use crate::session::{CandidateQueue, NegotiationState, SessionContext, SessionInput};
use bytes::Bytes;
use parley_core::{IceCandidate, PeerId, Role, SessionDescription, SignalMessage};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Sleep};
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Capacity of the per-session engine event channel.
const ENGINE_EVENT_BUFFER: usize = 256;

/// Role and state of a session as last published by its actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SessionStatus {
    pub role: Role,
    pub state: NegotiationState,
}

/// The coordinator loop's grip on a running session.
pub(crate) struct SessionHandle {
    inbox: mpsc::UnboundedSender<SessionInput>,
    status: watch::Receiver<SessionStatus>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Queue work for the session. False once the session has ended.
    pub fn deliver(&self, input: SessionInput) -> bool {
        self.inbox.send(input).is_ok()
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    pub fn into_task(self) -> JoinHandle<()> {
        self.task
    }
}

/// Spawn the actor for one remote peer. `ended` receives the peer id once
/// the session has torn down, whatever the reason.
pub(crate) fn spawn_session(
    ctx: Arc<SessionContext>,
    peer_id: PeerId,
    role: Role,
    ended: mpsc::UnboundedSender<PeerId>,
) -> SessionHandle {
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(SessionStatus {
        role,
        state: NegotiationState::Idle,
    });

    let span = info_span!("session", peer = %peer_id.short(), %role);
    let task = tokio::spawn(
        async move {
            run_session(ctx, peer_id.clone(), role, inbox_rx, status_tx).await;
            let _ = ended.send(peer_id);
        }
        .instrument(span),
    );

    SessionHandle {
        inbox: inbox_tx,
        status: status_rx,
        task,
    }
}

async fn run_session(
    ctx: Arc<SessionContext>,
    peer_id: PeerId,
    role: Role,
    inbox: mpsc::UnboundedReceiver<SessionInput>,
    status: watch::Sender<SessionStatus>,
) {
    let (engine_tx, engine_rx) = mpsc::channel(ENGINE_EVENT_BUFFER);
    let engine = match ctx.factory.create(&peer_id, &ctx.config.ice_servers, engine_tx).await {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %e, "failed to create negotiation engine");
            let _ = status.send(SessionStatus {
                role,
                state: NegotiationState::Failed,
            });
            ctx.emit(CoordinatorEvent::StateChanged {
                peer_id: peer_id.clone(),
                state: NegotiationState::Failed,
            });
            ctx.emit(CoordinatorEvent::Failed {
                peer_id,
                reason: e.to_string(),
            });
            return;
        }
    };

    PeerSession {
        ctx,
        peer_id,
        role,
        state: NegotiationState::Idle,
        status,
        engine,
        engine_rx,
        inbox,
        offer_sent: false,
        remote_description_set: false,
        pending: CandidateQueue::new(),
        data_channel: None,
        channel: ChannelPhase::default(),
        failure: None,
        checking: Deadline::new(),
        grace: Deadline::new(),
    }
    .run()
    .await;
}

/// One-shot timer that only takes part in `select!` while armed.
struct Deadline {
    sleep: Pin<Box<Sleep>>,
    armed: bool,
}

impl Deadline {
    fn new() -> Self {
        Self {
            sleep: Box::pin(time::sleep(Duration::ZERO)),
            armed: false,
        }
    }

    fn arm(&mut self, after: Duration) {
        self.sleep.as_mut().reset(Instant::now() + after);
        self.armed = true;
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum ChannelPhase {
    #[default]
    Pending,
    Open,
    Closed,
}

struct PeerSession {
    ctx: Arc<SessionContext>,
    peer_id: PeerId,
    role: Role,
    state: NegotiationState,
    status: watch::Sender<SessionStatus>,
    engine: Arc<dyn NegotiationEngine>,
    engine_rx: mpsc::Receiver<EngineEvent>,
    inbox: mpsc::UnboundedReceiver<SessionInput>,

    offer_sent: bool,
    remote_description_set: bool,
    pending: CandidateQueue,

    data_channel: Option<Arc<dyn DataChannel>>,
    channel: ChannelPhase,

    /// Reason reported with the `Failed` event, if we caused the failure.
    failure: Option<String>,
    checking: Deadline,
    grace: Deadline,
}

impl PeerSession {
    async fn run(mut self) {
        info!("session started");
        match self.role {
            Role::Initiator => self.begin_offer().await,
            Role::Responder => self.transition(NegotiationState::AwaitingOffer),
        }

        while !self.state.is_terminal() {
            tokio::select! {
                input = self.inbox.recv() => match input {
                    Some(SessionInput::Signal(message)) => self.on_signal(message).await,
                    Some(SessionInput::Promote) => self.promote().await,
                    Some(SessionInput::Close) | None => break,
                },
                Some(event) = self.engine_rx.recv() => self.on_engine_event(event).await,
                _ = self.checking.sleep.as_mut(), if self.checking.armed => self.on_still_checking(),
                _ = self.grace.sleep.as_mut(), if self.grace.armed => self.on_grace_expired(),
            }
        }

        self.teardown().await;
        info!(state = %self.state, "session finished");
    }

    /// Initiator path: data channel first so it is part of the offer.
    async fn begin_offer(&mut self) {
        self.transition(NegotiationState::Offering);

        let label = self.ctx.config.channel_label.clone();
        match self.engine.create_data_channel(&label).await {
            Ok(channel) => self.data_channel = Some(channel),
            Err(e) => return self.fail(e),
        }

        let offer = match self.engine.create_offer().await {
            Ok(offer) => offer,
            Err(e) => return self.fail(e),
        };
        if let Err(e) = self.engine.set_local_description(offer.clone()).await {
            return self.fail(e);
        }

        self.offer_sent = true;
        debug!("offer sent");
        self.ctx.signal(&self.peer_id, SignalMessage::Offer(offer)).await;
    }

    async fn promote(&mut self) {
        if self.role != Role::Responder
            || self.state != NegotiationState::AwaitingOffer
            || self.remote_description_set
        {
            debug!(state = %self.state, "promotion ignored");
            return;
        }
        info!("taking over as initiator");
        self.role = Role::Initiator;
        self.publish();
        self.begin_offer().await;
    }

    async fn on_signal(&mut self, message: SignalMessage) {
        if self.state.is_terminal() {
            return;
        }
        match message {
            SignalMessage::Offer(offer) => self.accept_offer(offer).await,
            SignalMessage::Answer(answer) => self.accept_answer(answer).await,
            SignalMessage::Candidate(candidate) => self.accept_candidate(candidate).await,
            other => debug!(kind = ?other.kind(), "presence message ignored by session"),
        }
    }

    async fn accept_offer(&mut self, offer: SessionDescription) {
        if self.role == Role::Initiator {
            if !self.remote_description_set {
                warn!("offer collision");
                self.ctx.emit(CoordinatorEvent::Diagnostic(Diagnostic::OfferCollision {
                    peer_id: self.peer_id.clone(),
                }));
            }
            return;
        }
        if self.remote_description_set {
            debug!("repeated offer dropped");
            return;
        }

        if let Err(e) = self.engine.set_remote_description(offer).await {
            return self.fail(e);
        }
        self.remote_description_set = true;
        if let Err(e) = self.flush_candidates().await {
            return self.fail(e);
        }

        let answer = match self.engine.create_answer().await {
            Ok(answer) => answer,
            Err(e) => return self.fail(e),
        };
        if let Err(e) = self.engine.set_local_description(answer.clone()).await {
            return self.fail(e);
        }

        debug!("answer sent");
        self.ctx.signal(&self.peer_id, SignalMessage::Answer(answer)).await;
        self.transition(self.state.advance_to(NegotiationState::DescriptionExchanged));
    }

    async fn accept_answer(&mut self, answer: SessionDescription) {
        if self.role != Role::Initiator || !self.offer_sent || self.remote_description_set {
            debug!(
                offer_sent = self.offer_sent,
                remote_set = self.remote_description_set,
                "unexpected answer dropped"
            );
            return;
        }

        if let Err(e) = self.engine.set_remote_description(answer).await {
            return self.fail(e);
        }
        self.remote_description_set = true;
        if let Err(e) = self.flush_candidates().await {
            return self.fail(e);
        }
        self.transition(self.state.advance_to(NegotiationState::DescriptionExchanged));
    }

    async fn accept_candidate(&mut self, candidate: IceCandidate) {
        if !self.remote_description_set {
            self.pending.push(candidate);
            debug!(queued = self.pending.len(), "candidate queued until remote description");
            return;
        }
        if let Err(e) = self.engine.add_ice_candidate(candidate).await {
            self.fail(e);
        }
    }

    async fn flush_candidates(&mut self) -> Result<(), EngineError> {
        let engine = self.engine.clone();
        let applied = self
            .pending
            .flush(|candidate| {
                let engine = engine.clone();
                async move { engine.add_ice_candidate(candidate).await }
            })
            .await?;
        if applied > 0 {
            debug!(applied, "queued candidates applied");
        }
        Ok(())
    }

    async fn on_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::LocalCandidate(candidate) => {
                if !self.state.is_terminal() {
                    self.ctx.signal(&self.peer_id, SignalMessage::Candidate(candidate)).await;
                }
            }
            EngineEvent::Connectivity(reported) => {
                let next = self.state.on_connectivity(reported);
                self.transition(next);
            }
            EngineEvent::DataChannel(channel) => {
                if self.data_channel.is_some() {
                    debug!(label = %channel.label(), "extra data channel ignored");
                } else {
                    self.data_channel = Some(channel);
                }
            }
            EngineEvent::ChannelOpen => self.on_channel_open(),
            EngineEvent::ChannelMessage(data) => self.on_channel_message(data),
            EngineEvent::ChannelClosed => self.on_channel_closed(),
        }
    }

    fn on_channel_open(&mut self) {
        if self.channel != ChannelPhase::Pending {
            return;
        }
        let Some(channel) = self.data_channel.clone() else {
            warn!("channel open reported without a channel handle");
            return;
        };
        self.channel = ChannelPhase::Open;
        self.ctx.peers.register(self.peer_id.clone(), channel);
        info!("data channel open");
        self.ctx.emit(CoordinatorEvent::ChannelOpen {
            peer_id: self.peer_id.clone(),
        });
    }

    fn on_channel_message(&self, data: Bytes) {
        self.ctx.emit(CoordinatorEvent::Message {
            peer_id: self.peer_id.clone(),
            data,
        });
    }

    fn on_channel_closed(&mut self) {
        if self.channel == ChannelPhase::Closed {
            return;
        }
        let was_open = self.channel == ChannelPhase::Open;
        self.channel = ChannelPhase::Closed;
        self.ctx.peers.unregister(&self.peer_id);
        if was_open {
            info!("data channel closed");
            self.ctx.emit(CoordinatorEvent::ChannelClosed {
                peer_id: self.peer_id.clone(),
            });
        }
    }

    fn on_still_checking(&mut self) {
        self.checking.disarm();
        if self.state != NegotiationState::IceChecking {
            return;
        }
        let elapsed = self.ctx.config.connect_timeout;
        warn!(?elapsed, "connectivity checks still running");
        self.ctx.emit(CoordinatorEvent::Diagnostic(Diagnostic::StillChecking {
            peer_id: self.peer_id.clone(),
            elapsed,
        }));
    }

    fn on_grace_expired(&mut self) {
        self.grace.disarm();
        if self.state == NegotiationState::Disconnected {
            self.failure = Some(format!(
                "disconnected for more than {}s",
                self.ctx.config.disconnect_grace.as_secs()
            ));
            self.transition(NegotiationState::Failed);
        }
    }

    fn fail(&mut self, error: EngineError) {
        error!(state = %self.state, %error, "negotiation failed");
        self.ctx.emit(CoordinatorEvent::Diagnostic(Diagnostic::Negotiation {
            peer_id: self.peer_id.clone(),
            error: error.clone(),
        }));
        self.failure = Some(error.to_string());
        self.transition(NegotiationState::Failed);
    }

    /// Move to `next`, publishing the change and keeping the timers in step.
    fn transition(&mut self, next: NegotiationState) {
        if next == self.state {
            return;
        }
        let previous = std::mem::replace(&mut self.state, next);
        debug!(from = %previous, to = %next, "state changed");
        self.publish();

        if next == NegotiationState::IceChecking {
            self.checking.arm(self.ctx.config.connect_timeout);
        } else if previous == NegotiationState::IceChecking {
            self.checking.disarm();
        }
        if next == NegotiationState::Disconnected {
            self.grace.arm(self.ctx.config.disconnect_grace);
        } else if previous == NegotiationState::Disconnected {
            self.grace.disarm();
        }

        let peer_id = self.peer_id.clone();
        self.ctx.emit(CoordinatorEvent::StateChanged {
            peer_id: peer_id.clone(),
            state: next,
        });
        match next {
            NegotiationState::Connected => {
                info!("connected");
                self.ctx.emit(CoordinatorEvent::Connected { peer_id });
            }
            NegotiationState::Disconnected => {
                warn!("disconnected");
                self.ctx.emit(CoordinatorEvent::Disconnected { peer_id });
            }
            NegotiationState::Failed => {
                let reason = self
                    .failure
                    .take()
                    .unwrap_or_else(|| "connectivity failed".to_owned());
                self.ctx.emit(CoordinatorEvent::Failed { peer_id, reason });
            }
            _ => {}
        }
    }

    fn publish(&self) {
        let _ = self.status.send(SessionStatus {
            role: self.role,
            state: self.state,
        });
    }

    async fn teardown(&mut self) {
        self.checking.disarm();
        self.grace.disarm();
        self.on_channel_closed();
        if let Some(channel) = self.data_channel.take() {
            if let Err(e) = channel.close().await {
                debug!(error = %e, "data channel close failed");
            }
        }
        if let Err(e) = self.engine.close().await {
            warn!(error = %e, "engine close failed");
        }
        if !self.state.is_terminal() {
            self.transition(NegotiationState::Closed);
        }
    }
}
