use super::state::{ConnectionState, ConnectionStatus};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, watch};
use url::Url;

/// Requests from a [`Connection`] handle to its task.
#[derive(Debug)]
pub(crate) enum Command {
    Send(String),
    Resume,
    Close,
}

/// Handle to one managed connection.
///
/// Cloning is cheap; every clone drives the same underlying socket. When the
/// last handle is dropped the connection shuts down as if `close()` was called.
#[derive(Debug, Clone)]
pub struct Connection {
    url: Url,
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    closed: Arc<AtomicBool>,
}

impl Connection {
    pub(crate) fn new(
        url: Url,
        commands: mpsc::UnboundedSender<Command>,
        status: watch::Receiver<ConnectionStatus>,
        closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            url,
            commands,
            status,
            closed,
        }
    }

    /// Queues a JSON frame. Returns `false` when the socket is not open or the
    /// connection was closed; the caller decides whether to park the write elsewhere.
    ///
    /// `true` only means the frame was handed to the connection task. If the
    /// socket drops before the task writes it, the frame is discarded and a
    /// [`ConnectionEvent::Error`](super::ConnectionEvent::Error) starting with
    /// `frame dropped` is emitted instead.
    pub fn send<T: Serialize + ?Sized>(&self, data: &T) -> bool {
        match serde_json::to_string(data) {
            Ok(text) => self.send_text(text),
            Err(e) => {
                tracing::warn!("Dropping unserializable frame: {}", e);
                false
            }
        }
    }

    pub fn send_text(&self, text: impl Into<String>) -> bool {
        if self.state() != ConnectionState::Open {
            return false;
        }
        self.commands.send(Command::Send(text.into())).is_ok()
    }

    /// Terminal. Stops timers and detaches event delivery before the socket is
    /// closed, so no reconnect or further event follows.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!("Closing connection to {}", self.url);
        let _ = self.commands.send(Command::Close);
    }

    /// Reconnect now, skipping any pending backoff. No-op while open.
    pub fn resume(&self) {
        if self.is_closed() || self.state() == ConnectionState::Open {
            return;
        }
        let _ = self.commands.send(Command::Resume);
    }

    pub fn state(&self) -> ConnectionState {
        if self.is_closed() {
            return ConnectionState::Closed;
        }
        self.status.borrow().state
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.status.borrow().reconnect_attempts
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}
