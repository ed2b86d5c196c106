//! In-process fakes for the socket, media and peer-link seams.

use crate::call::{
    LocalStream, MediaConstraints, MediaDevices, MediaTrack, PeerEvent, PeerLink, PeerLinkFactory,
    SessionDescription, TrackKind,
};
use crate::types::{IceCandidate, IceServer, RealtimeError, Result};
use crate::websocket::{Connector, Transport, TransportEvent};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tokio::time::Instant;
use url::Url;

// ── Sockets ────────────────────────────────────────────────────────────────

/// Connector whose attempts succeed or fail according to a script.
pub(crate) struct FakeConnector {
    failures: Mutex<VecDeque<String>>,
    attempts: Mutex<Vec<Instant>>,
    servers: mpsc::UnboundedSender<FakeServer>,
}

/// Test-side view of every socket the connector accepted.
pub(crate) struct FakeNetwork {
    servers: mpsc::UnboundedReceiver<FakeServer>,
}

pub(crate) fn fake_network() -> (Arc<FakeConnector>, FakeNetwork) {
    let (tx, rx) = mpsc::unbounded_channel();
    let connector = FakeConnector {
        failures: Mutex::new(VecDeque::new()),
        attempts: Mutex::new(Vec::new()),
        servers: tx,
    };
    (Arc::new(connector), FakeNetwork { servers: rx })
}

impl FakeConnector {
    pub(crate) fn fail_next(&self, count: usize) {
        let mut failures = self.failures.lock().unwrap();
        for _ in 0..count {
            failures.push_back("connection refused".to_string());
        }
    }

    pub(crate) fn attempt_times(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }

    pub(crate) fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Transport>> {
        self.attempts.lock().unwrap().push(Instant::now());

        if let Some(reason) = self.failures.lock().unwrap().pop_front() {
            return Err(RealtimeError::Connection(reason));
        }

        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        let close_frame = Arc::new(Mutex::new(None));

        let server = FakeServer {
            url: url.clone(),
            to_client,
            from_client,
            close_frame: Arc::clone(&close_frame),
        };
        let _ = self.servers.send(server);

        Ok(Box::new(FakeTransport {
            inbound,
            outbound,
            close_frame,
        }))
    }
}

impl FakeNetwork {
    pub(crate) async fn accept(&mut self) -> FakeServer {
        self.servers.recv().await.expect("connector dropped")
    }

    pub(crate) fn try_accept(&mut self) -> Option<FakeServer> {
        self.servers.try_recv().ok()
    }
}

/// Server end of one fake socket.
pub(crate) struct FakeServer {
    pub(crate) url: Url,
    to_client: mpsc::UnboundedSender<TransportEvent>,
    from_client: mpsc::UnboundedReceiver<String>,
    close_frame: Arc<Mutex<Option<(u16, String)>>>,
}

impl FakeServer {
    pub(crate) fn push_json(&self, value: Value) {
        let _ = self.to_client.send(TransportEvent::Text(value.to_string()));
    }

    pub(crate) fn push_text(&self, text: &str) {
        let _ = self.to_client.send(TransportEvent::Text(text.to_string()));
    }

    pub(crate) fn push_close(&self, code: u16, reason: &str) {
        let _ = self.to_client.send(TransportEvent::Closed {
            code: Some(code),
            reason: reason.to_string(),
        });
    }

    pub(crate) async fn recv_json(&mut self) -> Value {
        let text = self.from_client.recv().await.expect("client went away");
        serde_json::from_str(&text).expect("client sent invalid json")
    }

    pub(crate) fn try_recv_json(&mut self) -> Option<Value> {
        let text = self.from_client.try_recv().ok()?;
        serde_json::from_str(&text).ok()
    }

    /// Reads frames until one of the given `type` arrives, skipping pings.
    pub(crate) async fn recv_type(&mut self, frame_type: &str) -> Value {
        loop {
            let frame = self.recv_json().await;
            if frame["type"] == frame_type {
                return frame;
            }
        }
    }

    pub(crate) fn close_frame(&self) -> Option<(u16, String)> {
        self.close_frame.lock().unwrap().clone()
    }
}

struct FakeTransport {
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
    outbound: mpsc::UnboundedSender<String>,
    close_frame: Arc<Mutex<Option<(u16, String)>>>,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send_text(&mut self, text: String) -> Result<()> {
        if self.close_frame.lock().unwrap().is_some() {
            return Err(RealtimeError::NotConnected);
        }
        self.outbound
            .send(text)
            .map_err(|_| RealtimeError::Connection("peer hung up".to_string()))
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.inbound.recv().await
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        *self.close_frame.lock().unwrap() = Some((code, reason.to_string()));
        Ok(())
    }
}

// ── Media ──────────────────────────────────────────────────────────────────

pub(crate) struct FakeTrack {
    id: String,
    kind: TrackKind,
    enabled: AtomicBool,
    stops: AtomicUsize,
}

impl FakeTrack {
    pub(crate) fn new(id: &str, kind: TrackKind) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            kind,
            enabled: AtomicBool::new(true),
            stops: AtomicUsize::new(0),
        })
    }

    pub(crate) fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl MediaTrack for FakeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Media devices that hand out one audio and one video track, or refuse.
pub(crate) struct FakeMediaDevices {
    pub(crate) audio: Arc<FakeTrack>,
    pub(crate) video: Arc<FakeTrack>,
    deny: bool,
    delay: Option<Duration>,
    pub(crate) requests: AtomicUsize,
}

impl FakeMediaDevices {
    pub(crate) fn granting() -> Arc<Self> {
        Arc::new(Self::build(false, None))
    }

    pub(crate) fn denying() -> Arc<Self> {
        Arc::new(Self::build(true, None))
    }

    pub(crate) fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self::build(false, Some(delay)))
    }

    fn build(deny: bool, delay: Option<Duration>) -> Self {
        Self {
            audio: FakeTrack::new("mic", TrackKind::Audio),
            video: FakeTrack::new("cam", TrackKind::Video),
            deny,
            delay,
            requests: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MediaDevices for FakeMediaDevices {
    async fn acquire_local_media(&self, constraints: &MediaConstraints) -> Result<LocalStream> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.deny {
            return Err(RealtimeError::MediaPermission(
                "user denied access".to_string(),
            ));
        }

        let mut tracks: Vec<Arc<dyn MediaTrack>> = Vec::new();
        if constraints.audio {
            tracks.push(self.audio.clone());
        }
        if constraints.video {
            tracks.push(self.video.clone());
        }
        Ok(LocalStream::new(tracks))
    }
}

// ── Peer link ──────────────────────────────────────────────────────────────

/// Every call made against the fake peer link, in order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PeerCall {
    Configure(usize),
    AddTrack(String),
    CreateOffer,
    CreateAnswer,
    SetRemote(SessionDescription),
    AddCandidate(String),
    MaxBitrate(u64),
    Close,
}

#[derive(Default)]
pub(crate) struct FakePeerLink {
    pub(crate) calls: Mutex<Vec<PeerCall>>,
    pub(crate) fail_remote_description: AtomicBool,
    /// Holds `set_remote_description` until notified, when `gate_remote` is set.
    pub(crate) gate_remote: AtomicBool,
    pub(crate) remote_gate: Notify,
    events: Mutex<Option<mpsc::UnboundedSender<PeerEvent>>>,
}

impl FakePeerLink {
    pub(crate) fn calls(&self) -> Vec<PeerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn emit(&self, event: PeerEvent) {
        if let Some(tx) = self.events.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }

    pub(crate) fn close_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| **call == PeerCall::Close)
            .count()
    }

    fn record(&self, call: PeerCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PeerLink for FakePeerLink {
    async fn set_configuration(&self, ice_servers: &[IceServer]) -> Result<()> {
        self.record(PeerCall::Configure(ice_servers.len()));
        Ok(())
    }

    async fn add_track(&self, track: Arc<dyn MediaTrack>) -> Result<()> {
        self.record(PeerCall::AddTrack(track.id().to_string()));
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        self.record(PeerCall::CreateOffer);
        Ok(SessionDescription::offer("local-offer"))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.record(PeerCall::CreateAnswer);
        Ok(SessionDescription::answer("local-answer"))
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        if self.gate_remote.load(Ordering::SeqCst) {
            self.remote_gate.notified().await;
        }
        if self.fail_remote_description.load(Ordering::SeqCst) {
            return Err(RealtimeError::Negotiation("malformed sdp".to_string()));
        }
        self.record(PeerCall::SetRemote(description));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.record(PeerCall::AddCandidate(candidate.candidate));
        Ok(())
    }

    async fn set_max_video_bitrate(&self, bits_per_second: u64) -> Result<()> {
        self.record(PeerCall::MaxBitrate(bits_per_second));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.record(PeerCall::Close);
        self.events.lock().unwrap().take();
        Ok(())
    }
}

/// Hands out one shared [`FakePeerLink`] so tests can inspect it afterwards.
#[derive(Default)]
pub(crate) struct FakePeerFactory {
    pub(crate) link: Arc<FakePeerLink>,
    pub(crate) created: AtomicUsize,
}

#[async_trait]
impl PeerLinkFactory for FakePeerFactory {
    async fn create(
        &self,
        ice_servers: &[IceServer],
    ) -> Result<(Arc<dyn PeerLink>, mpsc::UnboundedReceiver<PeerEvent>)> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        *self.link.events.lock().unwrap() = Some(tx);
        self.link.record(PeerCall::Configure(ice_servers.len()));
        Ok((self.link.clone(), rx))
    }
}
