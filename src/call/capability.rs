use crate::types::{IceCandidate, IceServer, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

/// A local or remote media track supplied by the platform.
pub trait MediaTrack: Send + Sync {
    fn id(&self) -> &str;
    fn kind(&self) -> TrackKind;
    /// Enabling/disabling mutes the track without renegotiating.
    fn set_enabled(&self, enabled: bool);
    fn is_enabled(&self) -> bool;
    /// Releases the underlying device. Must tolerate repeated calls.
    fn stop(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

impl MediaConstraints {
    pub fn audio_only() -> Self {
        Self {
            audio: true,
            video: false,
        }
    }
}

/// Tracks captured for one call.
#[derive(Clone, Default)]
pub struct LocalStream {
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl LocalStream {
    pub fn new(tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    pub fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &Arc<dyn MediaTrack>> {
        self.tracks.iter().filter(move |track| track.kind() == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl std::fmt::Debug for LocalStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.tracks.iter().map(|track| (track.id(), track.kind())))
            .finish()
    }
}

/// Local capture (camera/microphone).
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Fails with [`RealtimeError::MediaPermission`](crate::RealtimeError::MediaPermission)
    /// when the user or platform refuses access.
    async fn acquire_local_media(&self, constraints: &MediaConstraints) -> Result<LocalStream>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl PeerState {
    /// States the link may still recover from on its own.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed)
    }
}

/// Notifications from the peer link, delivered in the order they happened.
pub enum PeerEvent {
    /// A locally gathered candidate to forward to the remote peer.
    LocalCandidate(IceCandidate),
    RemoteTrack(Arc<dyn MediaTrack>),
    StateChanged(PeerState),
}

/// The peer-to-peer negotiation primitive.
///
/// `create_offer`/`create_answer` also install the result as the local description.
#[async_trait]
pub trait PeerLink: Send + Sync {
    async fn set_configuration(&self, ice_servers: &[IceServer]) -> Result<()>;
    async fn add_track(&self, track: Arc<dyn MediaTrack>) -> Result<()>;
    async fn create_offer(&self) -> Result<SessionDescription>;
    async fn create_answer(&self) -> Result<SessionDescription>;
    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;
    /// Only valid once a remote description is set.
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;
    /// Caps outgoing video encodings.
    async fn set_max_video_bitrate(&self, bits_per_second: u64) -> Result<()>;
    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait PeerLinkFactory: Send + Sync {
    async fn create(
        &self,
        ice_servers: &[IceServer],
    ) -> Result<(Arc<dyn PeerLink>, mpsc::UnboundedReceiver<PeerEvent>)>;
}
