use super::capability::{MediaConstraints, MediaDevices, PeerLinkFactory};
use crate::connection::ConnectionManager;
use crate::types::IceServer;
use crate::types::constants::{DEFAULT_DEGRADED_GRACE, DEFAULT_MAX_VIDEO_BITRATE};
use std::sync::Arc;
use std::time::Duration;

/// Placeholder replaced by the call id in [`CallConfig::signaling_path`].
pub const CALL_ID_PLACEHOLDER: &str = "{id}";

/// Per-call tuning. Defaults: audio+video, 1.5 Mbps video ceiling, 5 s
/// degraded grace window, signaling at `call/{id}/`, one public STUN server.
#[derive(Debug, Clone)]
pub struct CallConfig {
    pub constraints: MediaConstraints,
    /// Ceiling for outgoing video encodings, in bits per second.
    pub max_video_bitrate: u64,
    /// How long a disconnected/failed peer link may take to recover on its own.
    pub degraded_grace: Duration,
    /// Signaling path relative to the manager endpoint.
    pub signaling_path: String,
    /// Used until the server sends its own configuration.
    pub ice_servers: Vec<IceServer>,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            constraints: MediaConstraints::default(),
            max_video_bitrate: DEFAULT_MAX_VIDEO_BITRATE,
            degraded_grace: DEFAULT_DEGRADED_GRACE,
            signaling_path: format!("call/{}/", CALL_ID_PLACEHOLDER),
            ice_servers: vec![IceServer::new("stun:stun.l.google.com:19302")],
        }
    }
}

impl CallConfig {
    pub fn with_constraints(mut self, constraints: MediaConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_max_video_bitrate(mut self, bits_per_second: u64) -> Self {
        self.max_video_bitrate = bits_per_second;
        self
    }

    pub fn with_degraded_grace(mut self, grace: Duration) -> Self {
        self.degraded_grace = grace;
        self
    }

    pub fn with_signaling_path(mut self, path: impl Into<String>) -> Self {
        self.signaling_path = path.into();
        self
    }

    pub fn with_ice_servers(mut self, ice_servers: Vec<IceServer>) -> Self {
        self.ice_servers = ice_servers;
        self
    }

    pub(crate) fn signaling_path_for(&self, call_id: &str) -> String {
        self.signaling_path.replace(CALL_ID_PLACEHOLDER, call_id)
    }
}

/// Platform pieces a call is built from.
#[derive(Clone)]
pub struct CallCapabilities {
    /// Opens the per-call signaling channel.
    pub signaling: ConnectionManager,
    pub media: Arc<dyn MediaDevices>,
    pub peers: Arc<dyn PeerLinkFactory>,
}
