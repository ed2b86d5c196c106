use super::record::{QueuedWrite, WriteMethod};
use crate::infrastructure::CredentialSource;
use crate::types::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default per-request timeout for replayed writes.
pub const DEFAULT_REPLAY_TIMEOUT: Duration = Duration::from_secs(15);

/// Why a single replay did not succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    /// The server could not be reached. The entry stays queued.
    #[error("offline: {0}")]
    Offline(String),

    /// The server answered but refused the write. The entry is dropped.
    #[error("rejected: {0}")]
    Rejected(String),
}

/// Sends one queued write to the server.
#[async_trait]
pub trait WriteReplayer: Send + Sync {
    async fn replay(&self, write: &QueuedWrite) -> std::result::Result<(), ReplayError>;
}

/// Replays writes against the REST API over HTTP
pub struct HttpReplayer {
    client: reqwest::Client,
    base: Url,
    credentials: Arc<dyn CredentialSource>,
}

impl HttpReplayer {
    /// # Errors
    ///
    /// Fails if `base` is not a URL or the HTTP client cannot be built.
    pub fn new(base: &str, credentials: Arc<dyn CredentialSource>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REPLAY_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base: Url::parse(base)?,
            credentials,
        })
    }

    /// Use a preconfigured client (proxies, custom TLS, timeouts).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn method(method: WriteMethod) -> reqwest::Method {
        match method {
            WriteMethod::Post => reqwest::Method::POST,
            WriteMethod::Put => reqwest::Method::PUT,
            WriteMethod::Patch => reqwest::Method::PATCH,
            WriteMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

#[async_trait]
impl WriteReplayer for HttpReplayer {
    async fn replay(&self, write: &QueuedWrite) -> std::result::Result<(), ReplayError> {
        let url = self
            .base
            .join(&write.url)
            .map_err(|e| ReplayError::Rejected(format!("invalid url '{}': {}", write.url, e)))?;

        let mut request = self.client.request(Self::method(write.method), url);
        if let Some(body) = &write.body {
            request = request.json(body);
        }
        if let Some(token) = self.credentials.token().await {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(classify)?;

        if !response.status().is_success() {
            return Err(ReplayError::Rejected(format!(
                "{} {} failed with status: {}",
                write.method.as_str(),
                write.url,
                response.status()
            )));
        }

        tracing::debug!("Replayed {} {}", write.method.as_str(), write.url);
        Ok(())
    }
}

/// A send error carries no HTTP response, so the server never ruled on the
/// write. Only a request that could not be built counts as rejected.
fn classify(error: reqwest::Error) -> ReplayError {
    if error.is_connect() || error.is_timeout() || error.is_request() {
        ReplayError::Offline(error.to_string())
    } else {
        ReplayError::Rejected(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::SharedCredentials;

    #[tokio::test]
    async fn test_unreachable_server_counts_as_offline() {
        // Nothing listens on the loopback discard port.
        let credentials = Arc::new(SharedCredentials::new(None));
        let replayer = HttpReplayer::new("http://127.0.0.1:9/", credentials).unwrap();
        let write = QueuedWrite {
            url: "api/messages/".to_string(),
            method: WriteMethod::Post,
            body: None,
            timestamp: 0,
        };

        let result = replayer.replay(&write).await;
        assert!(matches!(result, Err(ReplayError::Offline(_))));
    }

    #[tokio::test]
    async fn test_connection_dropped_mid_request_counts_as_offline() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });

        let credentials = Arc::new(SharedCredentials::new(Some("token".to_string())));
        let replayer = HttpReplayer::new(&format!("http://{}/", addr), credentials).unwrap();
        let write = QueuedWrite {
            url: "api/messages/".to_string(),
            method: WriteMethod::Post,
            body: Some(serde_json::json!({"text": "hi"})),
            timestamp: 0,
        };

        let result = replayer.replay(&write).await;
        assert!(matches!(result, Err(ReplayError::Offline(_))), "{:?}", result);
    }

    #[tokio::test]
    async fn test_error_status_is_rejected() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = socket
                    .write_all(b"HTTP/1.1 400 Bad Request\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                    .await;
                let _ = socket.shutdown().await;
            }
        });

        let credentials = Arc::new(SharedCredentials::new(None));
        let replayer = HttpReplayer::new(&format!("http://{}/", addr), credentials).unwrap();
        let write = QueuedWrite {
            url: "api/messages/".to_string(),
            method: WriteMethod::Delete,
            body: None,
            timestamp: 0,
        };

        let result = replayer.replay(&write).await;
        assert!(matches!(result, Err(ReplayError::Rejected(_))), "{:?}", result);
    }
}
