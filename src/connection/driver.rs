use super::handle::Command;
use super::state::{CloseCause, ConnectionEvent, ConnectionState, ConnectionStatus};
use crate::infrastructure::{CredentialSource, HeartbeatBeacon, HeartbeatConfig, Timer};
use crate::types::constants::{
    CLOSE_HANDSHAKE_TIMEOUT, LIVENESS_TIMEOUT_REASON, WS_CLOSE_LIVENESS_TIMEOUT, WS_CLOSE_NORMAL,
};
use crate::types::{ControlFrame, InboundFrame};
use crate::websocket::{Connector, Transport, TransportEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};
use url::Url;

/// Far enough out to never fire; used when no pong deadline is armed.
const NEVER: Duration = Duration::from_secs(365 * 24 * 3600);

enum Attempt {
    Opened(Box<dyn Transport>),
    Failed(String),
    Stopped,
}

enum SocketExit {
    Stopped,
    Lost(CloseCause),
}

enum Backoff {
    Retry,
    Stopped,
}

/// The single task that owns a connection's socket, timers and attempt counter.
///
/// Each phase (connecting, open, waiting to retry) runs to completion before
/// the next starts, so heartbeat and reconnect timers never coexist and at
/// most one socket is alive at a time.
pub(crate) struct ConnectionDriver {
    pub(crate) url: Url,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) credentials: Arc<dyn CredentialSource>,
    pub(crate) heartbeat: HeartbeatConfig,
    pub(crate) timer: Timer,
    pub(crate) auto_reconnect: bool,
    pub(crate) token_override: Option<String>,
    pub(crate) commands: mpsc::UnboundedReceiver<Command>,
    pub(crate) events: mpsc::UnboundedSender<ConnectionEvent>,
    pub(crate) status: watch::Sender<ConnectionStatus>,
    pub(crate) closed: Arc<AtomicBool>,
}

impl ConnectionDriver {
    pub(crate) async fn run(mut self) {
        tracing::info!("Starting connection task for {}", self.url);

        loop {
            let cause = match self.connect().await {
                Attempt::Stopped => break,
                Attempt::Failed(error) => {
                    tracing::warn!("Connection attempt to {} failed: {}", self.url, error);
                    self.emit(ConnectionEvent::Error(error.clone()));
                    CloseCause::ConnectFailed(error)
                }
                Attempt::Opened(transport) => match self.run_open(transport).await {
                    SocketExit::Stopped => break,
                    SocketExit::Lost(cause) => cause,
                },
            };

            match self.after_close(cause).await {
                Backoff::Retry => continue,
                Backoff::Stopped => break,
            }
        }

        self.set_state(ConnectionState::Closed);
        tracing::info!("Connection task for {} finished", self.url);
    }

    async fn connect(&mut self) -> Attempt {
        if self.closed.load(Ordering::SeqCst) {
            return Attempt::Stopped;
        }
        self.set_state(ConnectionState::Connecting);
        tracing::info!("Connecting to {}", self.url);

        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();
        let connect = async move { connector.connect(&url).await };
        tokio::pin!(connect);

        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    None | Some(Command::Close) => return Attempt::Stopped,
                    Some(Command::Send(_)) => self.drop_frame("socket is reconnecting"),
                    Some(Command::Resume) => {}
                },
                result = &mut connect => {
                    return match result {
                        Ok(transport) => Attempt::Opened(transport),
                        Err(e) => Attempt::Failed(e.to_string()),
                    };
                }
            }
        }
    }

    async fn run_open(&mut self, mut transport: Box<dyn Transport>) -> SocketExit {
        self.timer.reset();
        self.status.send_modify(|status| {
            status.state = ConnectionState::Open;
            status.reconnect_attempts = 0;
        });
        tracing::info!("Connected to {}", self.url);

        match self.current_token().await {
            Some(token) => {
                let sent = match (ControlFrame::Authenticate { token }).to_text() {
                    Ok(frame) => transport.send_text(frame).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = sent {
                    tracing::error!("Failed to send authenticate frame: {}", e);
                    return SocketExit::Lost(CloseCause::TransportError(e.to_string()));
                }
                tracing::debug!("Sent authenticate frame");
            }
            None => tracing::warn!("No credential available, skipping authenticate frame"),
        }
        self.emit(ConnectionEvent::Opened);

        let mut beacon = HeartbeatBeacon::new(self.heartbeat);
        let mut ticker = beacon.ticker();

        loop {
            let deadline = beacon.pong_deadline();
            let wake_at = deadline.unwrap_or_else(|| Instant::now() + NEVER);

            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    None | Some(Command::Close) => {
                        self.set_state(ConnectionState::Closing);
                        close_transport(transport.as_mut(), WS_CLOSE_NORMAL, "client closed").await;
                        return SocketExit::Stopped;
                    }
                    Some(Command::Send(text)) => {
                        if let Err(e) = transport.send_text(text).await {
                            tracing::warn!("Send failed: {}", e);
                            self.drop_frame(&e.to_string());
                        }
                    }
                    Some(Command::Resume) => tracing::debug!("Resume ignored, already open"),
                },
                event = transport.next_event() => match event {
                    Some(TransportEvent::Text(text)) => {
                        self.dispatch(transport.as_mut(), &mut beacon, &text).await;
                    }
                    Some(TransportEvent::Closed { code, reason }) => {
                        tracing::warn!(
                            "Server closed connection: code={:?}, reason='{}'",
                            code,
                            reason
                        );
                        return SocketExit::Lost(CloseCause::Remote { code, reason });
                    }
                    Some(TransportEvent::Error(error)) => {
                        tracing::error!("WebSocket read error: {}", error);
                        self.emit(ConnectionEvent::Error(error.clone()));
                        return SocketExit::Lost(CloseCause::TransportError(error));
                    }
                    None => {
                        tracing::warn!("Server closed connection without close frame");
                        return SocketExit::Lost(CloseCause::Remote {
                            code: None,
                            reason: String::new(),
                        });
                    }
                },
                _ = time::sleep_until(wake_at), if deadline.is_some() => {
                    if beacon.take_expired(Instant::now()) {
                        tracing::warn!("Heartbeat timeout - closing connection");
                        close_transport(
                            transport.as_mut(),
                            WS_CLOSE_LIVENESS_TIMEOUT,
                            LIVENESS_TIMEOUT_REASON,
                        )
                        .await;
                        return SocketExit::Lost(CloseCause::LivenessTimeout);
                    }
                },
                _ = ticker.tick() => {
                    match ControlFrame::Ping.to_text() {
                        Ok(ping) => match transport.send_text(ping).await {
                            Ok(()) => {
                                beacon.ping_sent(Instant::now());
                                tracing::debug!("Sent heartbeat ping");
                            }
                            Err(e) => tracing::error!("[Heartbeat] Failed to send: {}", e),
                        },
                        Err(e) => tracing::error!("[Heartbeat] Failed to encode ping: {}", e),
                    }
                }
            }
        }
    }

    async fn dispatch(
        &self,
        transport: &mut dyn Transport,
        beacon: &mut HeartbeatBeacon,
        text: &str,
    ) {
        match InboundFrame::parse(text) {
            Ok(InboundFrame::Pong) => {
                beacon.pong_received(Instant::now());
                tracing::debug!("Received heartbeat pong");
            }
            Ok(InboundFrame::Ping) => {
                let pong = match ControlFrame::Pong.to_text() {
                    Ok(pong) => transport.send_text(pong).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = pong {
                    tracing::warn!("Failed to answer server ping: {}", e);
                }
            }
            Ok(InboundFrame::Authenticated) => tracing::debug!("Authentication acknowledged"),
            Ok(InboundFrame::Application(payload)) => {
                self.emit(ConnectionEvent::Message(payload));
            }
            Err(e) => {
                tracing::error!("Failed to parse message: {}", e);
                tracing::debug!("Unparseable frame: {}", text);
            }
        }
    }

    async fn after_close(&mut self, cause: CloseCause) -> Backoff {
        if cause.is_auth_invalid() {
            tracing::warn!("Server rejected the credential, refreshing before reconnecting");
            self.token_override = self.credentials.refresh().await;
            if self.token_override.is_none() {
                tracing::warn!("Credential refresh produced no token");
            }
        }

        let delay = if self.auto_reconnect {
            self.timer.next_delay()
        } else {
            None
        };
        let attempts = self.timer.attempts();

        self.status.send_modify(|status| {
            status.state = ConnectionState::Closed;
            status.reconnect_attempts = attempts;
        });
        self.emit(ConnectionEvent::Closed {
            cause,
            reconnecting: delay.is_some(),
        });

        match delay {
            Some(delay) => {
                tracing::info!(
                    "Reconnecting to {} in {:?} (attempt {}/{})",
                    self.url,
                    delay,
                    attempts,
                    self.timer.policy().max_attempts
                );
                self.wait_for_retry(delay).await
            }
            None => {
                if self.auto_reconnect {
                    tracing::error!(
                        "Giving up on {} after {} reconnect attempts",
                        self.url,
                        attempts
                    );
                }
                self.wait_for_resume().await
            }
        }
    }

    async fn wait_for_retry(&mut self, delay: Duration) -> Backoff {
        let sleep = time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    None | Some(Command::Close) => return Backoff::Stopped,
                    Some(Command::Resume) => {
                        tracing::info!("Resume requested, reconnecting immediately");
                        self.reset_attempts();
                        return Backoff::Retry;
                    }
                    Some(Command::Send(_)) => self.drop_frame("socket is closed"),
                },
                _ = &mut sleep => return Backoff::Retry,
            }
        }
    }

    async fn wait_for_resume(&mut self) -> Backoff {
        loop {
            match self.commands.recv().await {
                None | Some(Command::Close) => return Backoff::Stopped,
                Some(Command::Resume) => {
                    tracing::info!("Resume requested, reconnecting");
                    self.reset_attempts();
                    return Backoff::Retry;
                }
                Some(Command::Send(_)) => self.drop_frame("socket is closed"),
            }
        }
    }

    async fn current_token(&self) -> Option<String> {
        match &self.token_override {
            Some(token) => Some(token.clone()),
            None => self.credentials.token().await,
        }
    }

    /// A frame accepted by `send` while open can still miss the socket if it
    /// drops first. The caller learns about it through an `Error` event.
    fn drop_frame(&self, reason: &str) {
        tracing::debug!("Dropping queued frame: {}", reason);
        self.emit(ConnectionEvent::Error(format!("frame dropped: {}", reason)));
    }

    fn reset_attempts(&mut self) {
        self.timer.reset();
        self.status.send_modify(|status| status.reconnect_attempts = 0);
    }

    fn set_state(&self, state: ConnectionState) {
        self.status.send_modify(|status| status.state = state);
    }

    /// Events stop the moment the caller closes, even if the task has not caught up yet.
    fn emit(&self, event: ConnectionEvent) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if self.events.send(event).is_err() {
            tracing::debug!("Connection event receiver dropped");
        }
    }
}

async fn close_transport(transport: &mut dyn Transport, code: u16, reason: &str) {
    match time::timeout(CLOSE_HANDSHAKE_TIMEOUT, transport.close(code, reason)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!("Close handshake failed: {}", e),
        Err(_) => tracing::debug!("Close handshake timed out"),
    }
}
