use crate::infrastructure::{HeartbeatConfig, ReconnectPolicy};
use std::time::Duration;

/// Settings shared by every connection a [`ConnectionManager`](super::ConnectionManager) opens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionManagerOptions {
    pub heartbeat: HeartbeatConfig,
    pub reconnect: ReconnectPolicy,
}

impl ConnectionManagerOptions {
    pub fn with_heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Defaults overridden by `REALTIME_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read_u64 = |key: &str| -> Option<u64> {
            let raw = lookup(key)?;
            match raw.trim().parse::<u64>() {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!("Ignoring malformed {}='{}': {}", key, raw, e);
                    None
                }
            }
        };
        let millis = |key: &str| read_u64(key).map(Duration::from_millis);

        let mut options = Self::default();
        if let Some(interval) = millis("REALTIME_HEARTBEAT_INTERVAL_MS") {
            options.heartbeat.interval = interval;
        }
        if let Some(timeout) = millis("REALTIME_PONG_TIMEOUT_MS") {
            options.heartbeat.pong_timeout = timeout;
        }
        if let Some(base) = millis("REALTIME_RECONNECT_BASE_MS") {
            options.reconnect.base_delay = base;
        }
        if let Some(max) = millis("REALTIME_RECONNECT_MAX_MS") {
            options.reconnect.max_delay = max;
        }
        if let Some(jitter) = millis("REALTIME_RECONNECT_JITTER_MS") {
            options.reconnect.jitter_max = jitter;
        }
        if let Some(attempts) = read_u64("REALTIME_RECONNECT_MAX_ATTEMPTS") {
            options.reconnect.max_attempts = u32::try_from(attempts).unwrap_or(u32::MAX);
        }
        options
    }
}

/// Per-connection settings passed to `open`.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Token for the first authenticate frame. After an auth-invalid close the
    /// credential source is used instead.
    pub token: Option<String>,
    /// Reconnect with backoff after a close the caller did not request.
    pub auto_reconnect: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            token: None,
            auto_reconnect: true,
        }
    }
}

impl ConnectionOptions {
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn without_reconnect(mut self) -> Self {
        self.auto_reconnect = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_lookup_overrides_defaults() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("REALTIME_HEARTBEAT_INTERVAL_MS", "5000"),
            ("REALTIME_RECONNECT_MAX_ATTEMPTS", "4"),
            ("REALTIME_RECONNECT_JITTER_MS", "0"),
        ]);
        let options =
            ConnectionManagerOptions::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(options.heartbeat.interval, Duration::from_millis(5000));
        assert_eq!(options.heartbeat.pong_timeout, Duration::from_millis(10_000));
        assert_eq!(options.reconnect.max_attempts, 4);
        assert_eq!(options.reconnect.jitter_max, Duration::ZERO);
        assert_eq!(options.reconnect.base_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_malformed_values_are_ignored() {
        let options = ConnectionManagerOptions::from_lookup(|key| {
            (key == "REALTIME_PONG_TIMEOUT_MS").then(|| "soon".to_string())
        });
        assert_eq!(options, ConnectionManagerOptions::default());
    }
}
