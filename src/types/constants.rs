use std::time::Duration;

/// Transport control frame `type` values (magic strings layer)
pub mod control_frames {
    pub const AUTHENTICATE: &str = "authenticate";
    pub const AUTHENTICATED: &str = "authenticated";
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
}

/// Default heartbeat interval
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(30_000);

/// Default time allowed for a pong to follow a ping
pub const DEFAULT_PONG_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default reconnect policy (milliseconds)
pub const RECONNECT_BASE_DELAY_MS: u64 = 1_000;
pub const RECONNECT_MAX_DELAY_MS: u64 = 30_000;
pub const RECONNECT_JITTER_MAX_MS: u64 = 3_000;
pub const RECONNECT_MAX_ATTEMPTS: u32 = 10;

/// How long a degraded peer link may try to recover before the call ends
pub const DEFAULT_DEGRADED_GRACE: Duration = Duration::from_secs(5);

/// Default ceiling for outgoing video (bits per second)
pub const DEFAULT_MAX_VIDEO_BITRATE: u64 = 1_500_000;

/// Upper bound on a close handshake against a possibly dead socket
pub const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// WebSocket close codes
pub const WS_CLOSE_NORMAL: u16 = 1000;
pub const WS_CLOSE_LIVENESS_TIMEOUT: u16 = 4000;
pub const WS_CLOSE_AUTH_INVALID: u16 = 4001;

pub const LIVENESS_TIMEOUT_REASON: &str = "liveness timeout";
