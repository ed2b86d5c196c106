use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors produced by the realtime transport, call signaling and offline queue.
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// WebSocket protocol error (connection failed, invalid frame, etc.)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// General connection error with descriptive message
    #[error("Connection error: {0}")]
    Connection(String),

    /// Authentication or authorization error
    #[error("Authentication error: {0}")]
    Auth(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request error (offline queue replay)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing error (malformed endpoint URL)
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Local filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Durable storage rejected a read or write
    #[error("Storage error: {0}")]
    Storage(String),

    /// Local media could not be acquired
    #[error("Media permission denied: {0}")]
    MediaPermission(String),

    /// Session description exchange failed
    #[error("Negotiation error: {0}")]
    Negotiation(String),

    /// Signaling channel could not be opened or was lost
    #[error("Signaling error: {0}")]
    Signaling(String),

    /// Operation is not valid in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Operation timed out
    #[error("Timeout error")]
    Timeout,

    /// Attempted operation while not connected to the server
    #[error("Not connected")]
    NotConnected,

    /// The connection or session was closed by its owner
    #[error("Closed")]
    Closed,
}

/// Convenience type alias for `Result<T, RealtimeError>`.
pub type Result<T> = std::result::Result<T, RealtimeError>;
