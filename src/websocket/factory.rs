use crate::types::Result;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

/// What the socket reported since the last read.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Text(String),
    Closed { code: Option<u16>, reason: String },
    Error(String),
}

/// One live full-duplex socket.
#[async_trait]
pub trait Transport: Send {
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Next event from the socket, `None` once the stream has ended.
    /// Must be cancel-safe: it is raced against timers and commands.
    async fn next_event(&mut self) -> Option<TransportEvent>;

    async fn close(&mut self, code: u16, reason: &str) -> Result<()>;
}

/// Opens sockets. The connection manager calls this once per attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Transport>>;
}

/// WebSocket factory for creating WebSocket connections
#[derive(Debug, Clone, Default)]
pub struct WebSocketFactory;

#[async_trait]
impl Connector for WebSocketFactory {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Transport>> {
        tracing::debug!("Creating WebSocket connection to: {}", url);
        let (stream, response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        tracing::debug!("WebSocket handshake completed: {}", response.status());
        Ok(Box::new(WebSocketTransport { stream }))
    }
}

pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(TransportEvent::Error(e.to_string())),
            };

            match message {
                Message::Text(text) => return Some(TransportEvent::Text(text.to_string())),
                Message::Close(frame) => {
                    let (code, reason) = match frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.to_string()),
                        None => (None, String::new()),
                    };
                    return Some(TransportEvent::Closed { code, reason });
                }
                Message::Ping(data) => {
                    tracing::trace!("Received ping ({} bytes)", data.len());
                }
                Message::Pong(data) => {
                    tracing::trace!("Received pong ({} bytes)", data.len());
                }
                Message::Binary(data) => {
                    tracing::warn!(
                        "Received unexpected binary message ({} bytes)",
                        data.len()
                    );
                }
                Message::Frame(_) => {
                    tracing::trace!("Received raw frame (internal)");
                }
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_owned().into(),
        };
        self.stream.close(Some(frame)).await?;
        Ok(())
    }
}
