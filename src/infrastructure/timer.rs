use crate::types::constants::{
    RECONNECT_BASE_DELAY_MS, RECONNECT_JITTER_MAX_MS, RECONNECT_MAX_ATTEMPTS,
    RECONNECT_MAX_DELAY_MS,
};
use rand::Rng;
use std::time::Duration;

/// Exponential backoff with additive jitter.
///
/// `delay(n) = min(base * 2^n, max) + uniform(0, jitter_max)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
    pub jitter_max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(RECONNECT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(RECONNECT_MAX_DELAY_MS),
            max_attempts: RECONNECT_MAX_ATTEMPTS,
            jitter_max: Duration::from_millis(RECONNECT_JITTER_MAX_MS),
        }
    }
}

impl ReconnectPolicy {
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_jitter_max(mut self, jitter_max: Duration) -> Self {
        self.jitter_max = jitter_max;
        self
    }

    /// The deterministic part of the delay for a given attempt count.
    pub fn backoff(&self, attempts: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let factor = 1u64.checked_shl(attempts).unwrap_or(u64::MAX);
        let exp_ms = base_ms.saturating_mul(factor);
        Duration::from_millis(exp_ms).min(self.max_delay)
    }

    /// Backoff plus an explicit jitter, clamped to `jitter_max`.
    pub fn delay_with_jitter(&self, attempts: u32, jitter: Duration) -> Duration {
        self.backoff(attempts) + jitter.min(self.jitter_max)
    }

    /// Backoff plus a uniformly sampled jitter.
    pub fn delay(&self, attempts: u32) -> Duration {
        self.delay_with_jitter(attempts, self.sample_jitter())
    }

    pub fn sample_jitter(&self) -> Duration {
        let jitter_ms = self.jitter_max.as_millis() as u64;
        if jitter_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }

    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

/// Attempt counter driven by a [`ReconnectPolicy`].
#[derive(Debug, Clone)]
pub struct Timer {
    attempts: u32,
    policy: ReconnectPolicy,
}

impl Timer {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            attempts: 0,
            policy,
        }
    }

    /// Get the next delay and count the attempt, or `None` once the cap is reached
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.policy.is_exhausted(self.attempts) {
            return None;
        }
        let delay = self.policy.delay(self.attempts);
        self.attempts += 1;
        Some(delay)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Reset the timer
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}
