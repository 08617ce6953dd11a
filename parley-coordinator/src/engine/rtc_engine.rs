use crate::engine::{ConnectivityState, DataChannel, EngineEvent, EngineFactory, NegotiationEngine};
use crate::error::EngineError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parley_core::{IceCandidate, IceServerConfig, PeerId, SdpKind, SessionDescription};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{API, APIBuilder};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Builds [`RtcEngine`]s on top of the `webrtc` crate.
#[derive(Default, Clone)]
pub struct RtcEngineFactory;

impl RtcEngineFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EngineFactory for RtcEngineFactory {
    async fn create(
        &self,
        peer_id: &PeerId,
        ice_servers: &[IceServerConfig],
        events: mpsc::Sender<EngineEvent>,
    ) -> Result<Arc<dyn NegotiationEngine>, EngineError> {
        let engine = RtcEngine::new(peer_id.clone(), ice_servers, events)
            .await
            .map_err(|e| EngineError::Setup(format!("{e:#}")))?;
        Ok(Arc::new(engine))
    }
}

pub struct RtcEngine {
    peer_id: PeerId,
    peer_connection: Arc<RTCPeerConnection>,
    events: mpsc::Sender<EngineEvent>,
}

fn build_api() -> Result<API> {
    // Codecs are registered even though only data channels are used.
    let mut m = MediaEngine::default();
    m.register_default_codecs()
        .context("failed to register default codecs")?;
    let registry = register_default_interceptors(Registry::new(), &mut m)
        .context("failed to register interceptors")?;

    Ok(APIBuilder::new()
        .with_media_engine(m)
        .with_interceptor_registry(registry)
        .build())
}

fn rtc_ice_servers(servers: &[IceServerConfig]) -> Vec<RTCIceServer> {
    servers
        .iter()
        .map(|s| RTCIceServer {
            urls: s.urls.clone(),
            username: s.username.clone().unwrap_or_default(),
            credential: s.credential.clone().unwrap_or_default(),
            ..Default::default()
        })
        .collect()
}

fn to_rtc_description(description: SessionDescription) -> Result<RTCSessionDescription> {
    let desc = match description.kind {
        SdpKind::Offer => RTCSessionDescription::offer(description.sdp)?,
        SdpKind::Answer => RTCSessionDescription::answer(description.sdp)?,
    };
    Ok(desc)
}

fn to_candidate(candidate: RTCIceCandidate) -> Result<IceCandidate> {
    let init = candidate.to_json().context("failed to serialize local candidate")?;
    Ok(IceCandidate {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_m_line_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    })
}

/// Route a channel's open/message/close callbacks into the session's event stream.
fn wire_data_channel(peer_id: &PeerId, dc: &Arc<RTCDataChannel>, events: &mpsc::Sender<EngineEvent>) {
    let tx = events.clone();
    let uid = peer_id.clone();
    dc.on_open(Box::new(move || {
        let tx = tx.clone();
        let uid = uid.clone();
        Box::pin(async move {
            info!(peer = %uid, "data channel open");
            let _ = tx.send(EngineEvent::ChannelOpen).await;
        })
    }));

    let tx = events.clone();
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let tx = tx.clone();
        Box::pin(async move {
            let _ = tx.send(EngineEvent::ChannelMessage(msg.data)).await;
        })
    }));

    let tx = events.clone();
    let uid = peer_id.clone();
    dc.on_close(Box::new(move || {
        let tx = tx.clone();
        let uid = uid.clone();
        Box::pin(async move {
            debug!(peer = %uid, "data channel closed");
            let _ = tx.send(EngineEvent::ChannelClosed).await;
        })
    }));
}

impl RtcEngine {
    pub async fn new(
        peer_id: PeerId,
        ice_servers: &[IceServerConfig],
        events: mpsc::Sender<EngineEvent>,
    ) -> Result<Self> {
        let api = build_api()?;
        let rtc_config = RTCConfiguration {
            ice_servers: rtc_ice_servers(ice_servers),
            ..Default::default()
        };
        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("failed to create peer connection")?,
        );

        let state_tx = events.clone();
        let uid_state = peer_id.clone();
        peer_connection.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            let tx = state_tx.clone();
            let uid = uid_state.clone();
            Box::pin(async move {
                debug!(peer = %uid, state = ?s, "peer connection state");
                let mapped = match s {
                    RTCPeerConnectionState::Connected => ConnectivityState::Connected,
                    RTCPeerConnectionState::Disconnected => ConnectivityState::Disconnected,
                    RTCPeerConnectionState::Failed => ConnectivityState::Failed,
                    RTCPeerConnectionState::Closed => ConnectivityState::Closed,
                    _ => return,
                };
                let _ = tx.send(EngineEvent::Connectivity(mapped)).await;
            })
        }));

        let ice_state_tx = events.clone();
        peer_connection.on_ice_connection_state_change(Box::new(move |s: RTCIceConnectionState| {
            let tx = ice_state_tx.clone();
            Box::pin(async move {
                if s == RTCIceConnectionState::Checking {
                    let _ = tx
                        .send(EngineEvent::Connectivity(ConnectivityState::IceChecking))
                        .await;
                }
            })
        }));

        let gather_tx = events.clone();
        peer_connection.on_ice_gathering_state_change(Box::new(move |s: RTCIceGathererState| {
            let tx = gather_tx.clone();
            Box::pin(async move {
                if s == RTCIceGathererState::Gathering {
                    let _ = tx
                        .send(EngineEvent::Connectivity(ConnectivityState::IceGathering))
                        .await;
                }
            })
        }));

        let ice_tx = events.clone();
        let uid_ice = peer_id.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            let uid = uid_ice.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                match to_candidate(candidate) {
                    Ok(candidate) => {
                        let _ = tx.send(EngineEvent::LocalCandidate(candidate)).await;
                    }
                    Err(e) => debug!(peer = %uid, "dropping local candidate: {e:#}"),
                }
            })
        }));

        let dc_tx = events.clone();
        let uid_dc = peer_id.clone();
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let tx = dc_tx.clone();
            let uid = uid_dc.clone();
            Box::pin(async move {
                debug!(peer = %uid, label = dc.label(), "remote data channel announced");
                // Announce before wiring so the session holds the handle when `ChannelOpen` lands.
                let handle: Arc<dyn DataChannel> = Arc::new(RtcDataChannel(dc.clone()));
                let _ = tx.send(EngineEvent::DataChannel(handle)).await;
                wire_data_channel(&uid, &dc, &tx);
            })
        }));

        Ok(Self {
            peer_id,
            peer_connection,
            events,
        })
    }
}

#[async_trait]
impl NegotiationEngine for RtcEngine {
    async fn create_offer(&self) -> Result<SessionDescription, EngineError> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| EngineError::rejected("create_offer", e))?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription, EngineError> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(|e| EngineError::rejected("create_answer", e))?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<(), EngineError> {
        let desc =
            to_rtc_description(description).map_err(|e| EngineError::rejected("set_local_description", e))?;
        self.peer_connection
            .set_local_description(desc)
            .await
            .map_err(|e| EngineError::rejected("set_local_description", e))
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<(), EngineError> {
        let desc =
            to_rtc_description(description).map_err(|e| EngineError::rejected("set_remote_description", e))?;
        self.peer_connection
            .set_remote_description(desc)
            .await
            .map_err(|e| EngineError::rejected("set_remote_description", e))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(|e| EngineError::rejected("add_ice_candidate", e))
    }

    async fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>, EngineError> {
        let dc = self
            .peer_connection
            .create_data_channel(label, None)
            .await
            .map_err(|e| EngineError::rejected("create_data_channel", e))?;
        wire_data_channel(&self.peer_id, &dc, &self.events);
        Ok(Arc::new(RtcDataChannel(dc)))
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.peer_connection
            .close()
            .await
            .map_err(|e| EngineError::rejected("close", e))
    }
}

pub struct RtcDataChannel(Arc<RTCDataChannel>);

#[async_trait]
impl DataChannel for RtcDataChannel {
    fn label(&self) -> String {
        self.0.label().to_owned()
    }

    async fn send(&self, data: Bytes) -> Result<(), EngineError> {
        self.0
            .send(&data)
            .await
            .map(|_| ())
            .map_err(|_| EngineError::ChannelClosed)
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.0
            .close()
            .await
            .map_err(|e| EngineError::rejected("close_data_channel", e))
    }
}
