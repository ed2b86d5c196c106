use crate::types::constants::{DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_PONG_TIMEOUT};
use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    pub interval: Duration,
    pub pong_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_HEARTBEAT_INTERVAL,
            pong_timeout: DEFAULT_PONG_TIMEOUT,
        }
    }
}

/// Liveness tracking for a single open socket.
///
/// Owned by the connection task for the lifetime of one socket; a new beacon
/// is created on every successful open so no deadline survives a reconnect.
#[derive(Debug)]
pub struct HeartbeatBeacon {
    config: HeartbeatConfig,
    last_pong_at: Option<Instant>,
    pong_deadline: Option<Instant>,
}

impl HeartbeatBeacon {
    pub fn new(config: HeartbeatConfig) -> Self {
        Self {
            config,
            last_pong_at: None,
            pong_deadline: None,
        }
    }

    /// Ticker for ping emission. The first tick fires one interval after open.
    pub fn ticker(&self) -> Interval {
        let start = Instant::now() + self.config.interval;
        let mut ticker = time::interval_at(start, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }

    /// Arms the pong deadline. An already armed deadline is kept so that
    /// repeated pings never push the timeout further out.
    pub fn ping_sent(&mut self, now: Instant) {
        if self.pong_deadline.is_none() {
            self.pong_deadline = Some(now + self.config.pong_timeout);
        }
    }

    pub fn pong_received(&mut self, now: Instant) {
        self.last_pong_at = Some(now);
        self.pong_deadline = None;
    }

    pub fn pong_deadline(&self) -> Option<Instant> {
        self.pong_deadline
    }

    pub fn last_pong_at(&self) -> Option<Instant> {
        self.last_pong_at
    }

    /// Disarms the deadline once it has fired so it is acted on exactly once.
    pub fn take_expired(&mut self, now: Instant) -> bool {
        match self.pong_deadline {
            Some(deadline) if deadline <= now => {
                self.pong_deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn config(&self) -> HeartbeatConfig {
        self.config
    }
}
