//! Exponential backoff for cluster state polling.
//!
//! A [`RetryPolicy`] is static configuration, one per poll call site. A
//! [`Backoff`] is the mutable counter built from a policy at the start of
//! every wait and thrown away when the wait returns.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry configuration for one poll call site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of polling attempts.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    #[serde(with = "humantime_serde", default = "default_min_delay")]
    pub min_delay: Duration,
    /// Upper bound for any single delay.
    #[serde(with = "humantime_serde", default = "default_max_delay")]
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_min_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_attempts(10)
    }
}

impl RetryPolicy {
    /// Policy with the standard 1s..60s delay window and the given attempt bound.
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            min_delay: default_min_delay(),
            max_delay: default_max_delay(),
            multiplier: default_multiplier(),
        }
    }

    /// Short bound used for the whole-cluster precheck.
    pub fn precheck() -> Self {
        Self::with_attempts(3)
    }

    /// Bound used while a node is being taken down and brought back.
    pub fn node_transition() -> Self {
        Self::with_attempts(10)
    }

    /// Long bound for full shard reinitialization after a restart.
    pub fn initialization() -> Self {
        Self::with_attempts(60)
    }

    /// Calculate the delay after the given zero-based retry.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.min(i32::MAX as u32) as i32;
        let base = self.min_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());
        if capped.is_finite() {
            Duration::from_secs_f64(capped.max(0.0))
        } else {
            self.max_delay
        }
    }

    /// Start a fresh backoff sequence for one wait.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.clone())
    }
}

/// Per-wait backoff state.
#[derive(Debug)]
pub struct Backoff {
    policy: RetryPolicy,
    retries: u32,
}

impl Backoff {
    /// Create a new backoff sequence at its minimum delay.
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, retries: 0 }
    }

    /// Return the next delay and advance the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.policy.delay_for_retry(self.retries);
        self.retries = self.retries.saturating_add(1);
        delay
    }

    /// Number of delays handed out so far.
    pub fn retries(&self) -> u32 {
        self.retries
    }
}
