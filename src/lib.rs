//! # Realtime Call
//!
//! Realtime transport and call signaling for chat, notifications and
//! voice/video calls:
//!
//! - [`ConnectionManager`] opens self-healing WebSocket channels with
//!   heartbeat liveness checks, jittered exponential backoff and token
//!   authentication.
//! - [`CallSession`] negotiates a peer-to-peer call over a per-call signaling
//!   channel, driving platform media and peer-link capabilities.
//! - [`OfflineWriteQueue`] persists writes made while offline and replays them
//!   in order once the server is reachable again.
//!
//! ## Example
//!
//! ```no_run
//! use realtime_call_rs::{
//!     ConnectionEvent, ConnectionManager, ConnectionManagerOptions, ConnectionOptions,
//!     SharedCredentials,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = Arc::new(SharedCredentials::new(Some("access-token".to_string())));
//!     let manager = ConnectionManager::new(
//!         "https://api.example.com",
//!         credentials,
//!         ConnectionManagerOptions::from_env(),
//!     )?;
//!
//!     let (connection, mut events) = manager.open("ws/notifications/", ConnectionOptions::default())?;
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             ConnectionEvent::Message(payload) => println!("{}", payload),
//!             ConnectionEvent::Closed { reconnecting: false, .. } => break,
//!             _ => {}
//!         }
//!     }
//!     connection.close();
//!     Ok(())
//! }
//! ```

pub mod call;
pub mod connection;
pub mod infrastructure;
pub mod offline;
pub mod types;
pub mod websocket;

#[cfg(test)]
mod testing;

pub use call::{CallCapabilities, CallConfig, CallEvent, CallRole, CallSession, CallState};
pub use connection::{
    CloseCause, Connection, ConnectionEvent, ConnectionManager, ConnectionManagerOptions,
    ConnectionOptions, ConnectionState,
};
pub use infrastructure::{CredentialSource, HeartbeatConfig, ReconnectPolicy, SharedCredentials};
pub use offline::{FlushReport, HttpReplayer, OfflineWriteQueue, WriteMethod, WriteRequest};
pub use types::{RealtimeError, Result};
