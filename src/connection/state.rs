use crate::types::constants::{WS_CLOSE_AUTH_INVALID, WS_CLOSE_LIVENESS_TIMEOUT};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Snapshot published on every lifecycle change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Connecting,
            reconnect_attempts: 0,
        }
    }
}

/// Why a socket went away (never emitted for a caller-initiated close).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseCause {
    /// The server or the network closed the socket.
    Remote { code: Option<u16>, reason: String },
    /// No pong arrived within the pong timeout; the socket was force-closed.
    LivenessTimeout,
    /// The socket never opened.
    ConnectFailed(String),
    /// The socket reported an error and stopped.
    TransportError(String),
}

impl CloseCause {
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Remote { code, .. } => *code,
            Self::LivenessTimeout => Some(WS_CLOSE_LIVENESS_TIMEOUT),
            _ => None,
        }
    }

    pub fn is_auth_invalid(&self) -> bool {
        self.code() == Some(WS_CLOSE_AUTH_INVALID)
    }
}

/// Lifecycle and application events for one connection, in socket order.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Opened,
    /// An application frame, passed through verbatim.
    Message(Value),
    /// `reconnecting == false` means this was the last close the caller will see.
    Closed {
        cause: CloseCause,
        reconnecting: bool,
    },
    Error(String),
}
