use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Supplies the current auth token. The value may rotate between calls.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Current token, if the user is signed in.
    async fn token(&self) -> Option<String>;

    /// Called when the server rejected the token. Implementations that can
    /// obtain a fresh token should do so here; the default re-reads `token()`.
    async fn refresh(&self) -> Option<String> {
        self.token().await
    }
}

/// In-memory token cache shared by every component that authenticates.
#[derive(Debug, Clone, Default)]
pub struct SharedCredentials {
    token: Arc<RwLock<Option<String>>>,
}

impl SharedCredentials {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: Arc::new(RwLock::new(token)),
        }
    }

    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }
}

#[async_trait]
impl CredentialSource for SharedCredentials {
    async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }
}
