use super::candidates::CandidateGate;
use super::capability::{PeerEvent, PeerLink, PeerState, SessionDescription};
use super::config::CallConfig;
use super::session::{Outcome, SessionShared};
use super::state::{CallEvent, CallRole, CallState, EndReason};
use crate::connection::{Connection, ConnectionEvent};
use crate::types::{IceCandidate, RealtimeError, Result, SignalingFrame};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

/// Far enough out to never fire; used when the peer link is healthy.
const NEVER: Duration = Duration::from_secs(365 * 24 * 3600);

enum Flow {
    Continue,
    Finish(Outcome),
}

impl Flow {
    fn failed(error: RealtimeError) -> Self {
        Self::Finish(Outcome::Failed(error.to_string()))
    }
}

/// The task that reacts to signaling frames and peer-link notifications for
/// one call, strictly one at a time.
pub(crate) struct CallDriver {
    shared: Arc<SessionShared>,
    role: CallRole,
    connection: Connection,
    signals: mpsc::UnboundedReceiver<ConnectionEvent>,
    peer: Arc<dyn PeerLink>,
    peer_events: mpsc::UnboundedReceiver<PeerEvent>,
    peer_events_open: bool,
    gate: CandidateGate,
    max_video_bitrate: u64,
    degraded_grace: Duration,
    degraded_since: Option<Instant>,
}

impl CallDriver {
    pub(crate) fn new(
        shared: Arc<SessionShared>,
        role: CallRole,
        config: &CallConfig,
        connection: Connection,
        signals: mpsc::UnboundedReceiver<ConnectionEvent>,
        peer: Arc<dyn PeerLink>,
        peer_events: mpsc::UnboundedReceiver<PeerEvent>,
    ) -> Self {
        Self {
            shared,
            role,
            connection,
            signals,
            peer,
            peer_events,
            peer_events_open: true,
            gate: CandidateGate::new(),
            max_video_bitrate: config.max_video_bitrate,
            degraded_grace: config.degraded_grace,
            degraded_since: None,
        }
    }

    pub(crate) async fn run(mut self) {
        tracing::debug!("Call {} driver started as {:?}", self.shared.call_id, self.role);

        let outcome = loop {
            let grace_deadline = self.degraded_since.map(|since| since + self.degraded_grace);
            let wake_at = grace_deadline.unwrap_or_else(|| Instant::now() + NEVER);

            let flow = tokio::select! {
                biased;
                event = self.signals.recv() => self.on_signal(event).await,
                event = self.peer_events.recv(), if self.peer_events_open => match event {
                    Some(event) => self.on_peer_event(event).await,
                    None => {
                        self.peer_events_open = false;
                        Flow::Continue
                    }
                },
                _ = time::sleep_until(wake_at), if grace_deadline.is_some() => {
                    tracing::warn!(
                        "Peer link did not recover within {:?}, ending call {}",
                        self.degraded_grace,
                        self.shared.call_id
                    );
                    Flow::Finish(Outcome::Ended(EndReason::ConnectionLost))
                }
            };

            if let Flow::Finish(outcome) = flow {
                break outcome;
            }
            if self.shared.is_closed() {
                return;
            }
        };

        self.shared.finish(outcome).await;
    }

    async fn on_signal(&mut self, event: Option<ConnectionEvent>) -> Flow {
        match event {
            Some(ConnectionEvent::Message(payload)) => self.on_frame(payload).await,
            Some(ConnectionEvent::Closed { cause, .. }) => {
                tracing::warn!("Signaling channel lost: {:?}", cause);
                Flow::Finish(Outcome::Ended(EndReason::SignalingLost))
            }
            Some(ConnectionEvent::Error(error)) => {
                tracing::debug!("Signaling error: {}", error);
                Flow::Continue
            }
            Some(ConnectionEvent::Opened) => Flow::Continue,
            None => Flow::Finish(Outcome::Ended(EndReason::SignalingLost)),
        }
    }

    async fn on_frame(&mut self, payload: Value) -> Flow {
        let frame = match SignalingFrame::from_value(payload) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Ignoring malformed signaling frame: {}", e);
                return Flow::Continue;
            }
        };

        match frame {
            SignalingFrame::Connection { ice_servers } => {
                if !ice_servers.is_empty() {
                    tracing::info!("Server supplied {} ICE servers", ice_servers.len());
                    if let Err(e) = self.peer.set_configuration(&ice_servers).await {
                        tracing::warn!("Failed to apply server ICE configuration: {}", e);
                    }
                }
                Flow::Continue
            }
            SignalingFrame::Offer { sdp } => self.on_offer(sdp).await,
            SignalingFrame::Answer { sdp } => self.on_answer(sdp).await,
            SignalingFrame::IceCandidate { candidate } => {
                if let Some(candidate) = self.gate.admit(candidate) {
                    self.apply_candidate(candidate).await;
                }
                Flow::Continue
            }
            SignalingFrame::CallEnd => Flow::Finish(Outcome::Ended(EndReason::Remote)),
            SignalingFrame::Unknown => {
                tracing::debug!("Ignoring unknown signaling frame");
                Flow::Continue
            }
        }
    }

    async fn on_offer(&mut self, sdp: String) -> Flow {
        if self.role != CallRole::Callee || self.gate.is_open() {
            tracing::warn!("Ignoring unexpected offer in state {:?}", self.shared.state());
            return Flow::Continue;
        }
        self.shared.transition(CallState::Negotiating);

        match self.answer_offer(sdp).await {
            Ok(()) => Flow::Continue,
            Err(e) => Flow::failed(e),
        }
    }

    async fn answer_offer(&mut self, sdp: String) -> Result<()> {
        self.accept_remote(SessionDescription::offer(sdp)).await?;
        let answer = self.peer.create_answer().await?;
        if !self.connection.send(&SignalingFrame::Answer { sdp: answer.sdp }) {
            return Err(RealtimeError::Signaling("failed to send answer".to_string()));
        }
        tracing::debug!("Call {} sent answer", self.shared.call_id);
        Ok(())
    }

    async fn on_answer(&mut self, sdp: String) -> Flow {
        if self.role != CallRole::Caller
            || self.shared.state() != CallState::AwaitingRemoteDescription
        {
            tracing::warn!("Ignoring unexpected answer in state {:?}", self.shared.state());
            return Flow::Continue;
        }
        self.shared.transition(CallState::Negotiating);

        match self.accept_remote(SessionDescription::answer(sdp)).await {
            Ok(()) => Flow::Continue,
            Err(e) => Flow::failed(e),
        }
    }

    /// Sets the remote description, then applies queued candidates in receipt order.
    async fn accept_remote(&mut self, description: SessionDescription) -> Result<()> {
        self.peer.set_remote_description(description).await?;
        if self.shared.is_closed() {
            return Err(RealtimeError::Closed);
        }

        let pending = self.gate.open();
        if !pending.is_empty() {
            tracing::debug!("Applying {} queued remote candidates", pending.len());
        }
        for candidate in pending {
            self.apply_candidate(candidate).await;
        }

        self.cap_video_bitrate().await;
        Ok(())
    }

    async fn apply_candidate(&self, candidate: IceCandidate) {
        if let Err(e) = self.peer.add_ice_candidate(candidate).await {
            tracing::warn!("Failed to add remote candidate: {}", e);
        }
    }

    async fn cap_video_bitrate(&self) {
        let has_video = match self.shared.media.lock().await.as_ref() {
            Some(media) => media.has_video(),
            None => false,
        };
        if !has_video {
            return;
        }
        match self.peer.set_max_video_bitrate(self.max_video_bitrate).await {
            Ok(()) => tracing::debug!("Capped video at {} bps", self.max_video_bitrate),
            Err(e) => tracing::warn!("Failed to cap video bitrate: {}", e),
        }
    }

    async fn on_peer_event(&mut self, event: PeerEvent) -> Flow {
        match event {
            PeerEvent::LocalCandidate(candidate) => {
                if !self.connection.send(&SignalingFrame::IceCandidate { candidate }) {
                    tracing::debug!("Signaling not open, dropping local candidate");
                }
                Flow::Continue
            }
            PeerEvent::RemoteTrack(track) => {
                {
                    let mut media = self.shared.media.lock().await;
                    match media.as_mut() {
                        Some(media) => media.add_remote_track(Arc::clone(&track)),
                        None => {
                            track.stop();
                            return Flow::Continue;
                        }
                    }
                }
                tracing::debug!("Received remote {:?} track {}", track.kind(), track.id());
                self.shared.emit(CallEvent::RemoteTrack(track));
                Flow::Continue
            }
            PeerEvent::StateChanged(state) => self.on_peer_state(state),
        }
    }

    fn on_peer_state(&mut self, state: PeerState) -> Flow {
        match state {
            PeerState::Connected => {
                if self.degraded_since.take().is_some() {
                    tracing::info!("Peer link recovered");
                }
                if self.shared.state() == CallState::Negotiating {
                    self.shared.transition(CallState::Connected);
                }
                Flow::Continue
            }
            state if state.is_degraded() => {
                if self.degraded_since.is_none() {
                    tracing::warn!(
                        "Peer link {:?}, waiting {:?} for it to recover",
                        state,
                        self.degraded_grace
                    );
                    self.degraded_since = Some(Instant::now());
                }
                Flow::Continue
            }
            PeerState::Closed => Flow::Finish(Outcome::Ended(EndReason::ConnectionLost)),
            _ => Flow::Continue,
        }
    }
}
