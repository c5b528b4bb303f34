//! Reconnect Backoff Policy
//!
//! Computes the delay between upstream connection attempts. The policy is
//! pure state-plus-arithmetic so the supervisor's timing behavior is
//! testable without a network or a real clock: `delay_for_attempt` is a
//! deterministic function of the attempt number, with jitter applied at
//! the edge.

use std::time::Duration;

use rand::Rng;

/// Configuration for reconnect backoff.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Ceiling for the computed delay.
    pub max_delay: Duration,
    /// Growth factor per attempt. `1.0` gives a fixed delay.
    pub multiplier: f64,
    /// Randomization applied to each delay, as a fraction (0.1 = ±10%).
    pub jitter: f64,
    /// Attempts before giving up (0 = retry forever).
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.1,
            max_attempts: 0,
        }
    }
}

/// Backoff state for one supervisor loop.
#[derive(Debug)]
pub struct BackoffPolicy {
    config: BackoffConfig,
    attempt: u32,
}

impl BackoffPolicy {
    /// Create a policy from its configuration.
    #[must_use]
    pub const fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay before the next attempt, or `None` once attempts are
    /// exhausted. Advances the attempt counter.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.config.max_attempts > 0 && self.attempt >= self.config.max_attempts {
            return None;
        }

        let base = self.delay_for_attempt(self.attempt);
        self.attempt += 1;
        Some(self.jittered(base))
    }

    /// Forget past failures after a successful connection.
    pub const fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Number of attempts made since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt
    }

    /// Deterministic delay for a given attempt number (no jitter).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        #[allow(clippy::cast_precision_loss)]
        let scaled =
            self.config.initial_delay.as_millis() as f64 * self.config.multiplier.powi(
                i32::try_from(attempt).unwrap_or(i32::MAX),
            );

        let max_millis = self.config.max_delay.as_millis();
        if !scaled.is_finite() {
            return self.config.max_delay;
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let millis = (scaled.max(0.0).round() as u128).min(max_millis);
        Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
    }

    fn jittered(&self, base: Duration) -> Duration {
        if self.config.jitter <= 0.0 {
            return base;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = base.as_millis() as f64;
        let spread = base_millis * self.config.jitter;
        let offset: f64 = rand::rng().random_range(-spread..=spread);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Duration::from_millis((base_millis + offset).max(1.0) as u64)
    }
}

// =============================================================================
// Tests
// =============================================================================
