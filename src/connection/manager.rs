use super::driver::ConnectionDriver;
use super::handle::Connection;
use super::options::{ConnectionManagerOptions, ConnectionOptions};
use super::state::{ConnectionEvent, ConnectionStatus};
use crate::infrastructure::{CredentialSource, Timer, resolve_ws_url};
use crate::types::Result;
use crate::websocket::{Connector, WebSocketFactory};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::{mpsc, watch};
use url::Url;

/// Opens self-healing message channels against one realtime endpoint.
///
/// Each call to [`open`](Self::open) gets its own socket, heartbeat and
/// reconnect schedule; nothing is shared between connections except the
/// credential source.
///
/// # Example
///
/// ```no_run
/// use realtime_call_rs::{ConnectionEvent, ConnectionManager, ConnectionOptions, SharedCredentials};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let credentials = Arc::new(SharedCredentials::new(Some("token".to_string())));
/// let manager = ConnectionManager::new("https://api.example.com", credentials, Default::default())?;
///
/// let (connection, mut events) = manager.open("ws/notifications/", ConnectionOptions::default())?;
/// while let Some(event) = events.recv().await {
///     if let ConnectionEvent::Message(payload) = event {
///         println!("{}", payload);
///     }
/// }
/// connection.close();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    endpoint: Url,
    options: ConnectionManagerOptions,
    connector: Arc<dyn Connector>,
    credentials: Arc<dyn CredentialSource>,
}

impl ConnectionManager {
    /// # Errors
    ///
    /// Returns [`RealtimeError::UrlParse`](crate::RealtimeError::UrlParse) if the endpoint cannot be parsed.
    pub fn new(
        endpoint: &str,
        credentials: Arc<dyn CredentialSource>,
        options: ConnectionManagerOptions,
    ) -> Result<Self> {
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            options,
            connector: Arc::new(WebSocketFactory),
            credentials,
        })
    }

    /// Replace the socket factory (used for custom TLS setups and tests).
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Starts a connection to `path` without waiting for it to open.
    ///
    /// Lifecycle and application frames arrive on the returned receiver in
    /// socket order. Must be called from within a tokio runtime.
    pub fn open(
        &self,
        path: &str,
        options: ConnectionOptions,
    ) -> Result<(Connection, mpsc::UnboundedReceiver<ConnectionEvent>)> {
        let url = resolve_ws_url(&self.endpoint, path)?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());
        let closed = Arc::new(AtomicBool::new(false));

        let driver = ConnectionDriver {
            url: url.clone(),
            connector: Arc::clone(&self.connector),
            credentials: Arc::clone(&self.credentials),
            heartbeat: self.options.heartbeat,
            timer: Timer::new(self.options.reconnect.clone()),
            auto_reconnect: options.auto_reconnect,
            token_override: options.token,
            commands: command_rx,
            events: event_tx,
            status: status_tx,
            closed: Arc::clone(&closed),
        };
        tokio::spawn(driver.run());

        Ok((Connection::new(url, command_tx, status_rx, closed), event_rx))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn options(&self) -> &ConnectionManagerOptions {
        &self.options
    }
}
