use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Idle,
    Connecting,
    Connected,
    Disconnected,
}

/// How a dropped insights stream is re-established.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Consecutive failed attempts before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Close on the first error and stay disconnected.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

/// Tracks consecutive connection failures for one subscription.
pub struct ConnectionSupervisor {
    policy: ReconnectPolicy,
    attempts: u32,
    retry_floor: Option<Duration>,
}

impl ConnectionSupervisor {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            retry_floor: None,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The server's `retry` field; reconnects never wait less than this.
    pub fn set_retry_floor(&mut self, floor: Duration) {
        self.retry_floor = Some(floor);
    }

    pub fn record_open(&mut self) {
        self.attempts = 0;
    }

    /// Record a failed connect or a dropped stream. Returns the delay before
    /// the next attempt, or `None` when the subscription should give up.
    pub fn record_failure(&mut self) -> Option<Duration> {
        if !self.policy.enabled || self.attempts >= self.policy.max_attempts {
            return None;
        }
        self.attempts += 1;
        let delay = self.policy.delay_for(self.attempts);
        Some(match self.retry_floor {
            Some(floor) => delay.max(floor),
            None => delay,
        })
    }
}
