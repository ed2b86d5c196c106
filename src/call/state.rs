use super::capability::MediaTrack;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallRole {
    Caller,
    Callee,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    AcquiringMedia,
    SignalingConnecting,
    AwaitingRemoteDescription,
    Negotiating,
    Connected,
    Ended,
    Failed,
}

impl CallState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Failed)
    }
}

/// Why a call stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// `end_call()` or `cleanup()` on this side.
    Local,
    /// The remote peer sent `call_end`.
    Remote,
    /// The signaling channel went away.
    SignalingLost,
    /// The peer link stayed degraded past the grace window.
    ConnectionLost,
}

pub enum CallEvent {
    StateChanged(CallState),
    RemoteTrack(Arc<dyn MediaTrack>),
    Ended(EndReason),
    /// Fatal error; the session has been cleaned up.
    Failed(String),
}

impl std::fmt::Debug for CallEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StateChanged(state) => f.debug_tuple("StateChanged").field(state).finish(),
            Self::RemoteTrack(track) => f.debug_tuple("RemoteTrack").field(&track.id()).finish(),
            Self::Ended(reason) => f.debug_tuple("Ended").field(reason).finish(),
            Self::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
        }
    }
}
