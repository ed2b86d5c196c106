// Module declarations
mod candidates;
mod capability;
mod config;
mod driver;
mod media;
mod session;
mod state;

// Public API exports
pub use candidates::CandidateGate;
pub use capability::{
    LocalStream, MediaConstraints, MediaDevices, MediaTrack, PeerEvent, PeerLink,
    PeerLinkFactory, PeerState, SdpKind, SessionDescription, TrackKind,
};
pub use config::{CALL_ID_PLACEHOLDER, CallCapabilities, CallConfig};
pub use media::MediaSession;
pub use session::CallSession;
pub use state::{CallEvent, CallRole, CallState, EndReason};
