//! Retry delay policy.
//!
//! Retries never stop. The policy only decides how long to wait between
//! attempts, and every policy has an upper bound.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default delay between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

// ============================================================================
// RetryPolicy
// ============================================================================

/// How long to wait after a failed attempt or a dropped link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Same delay every time.
    Fixed(Duration),
    /// Doubling delay from `initial`, capped at `max`.
    Exponential {
        /// First delay.
        initial: Duration,
        /// Upper bound.
        max: Duration,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::Fixed(DEFAULT_RETRY_DELAY)
    }
}

impl RetryPolicy {
    /// Returns the largest delay this policy produces.
    #[inline]
    #[must_use]
    pub const fn ceiling(&self) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential { max, .. } => max,
        }
    }

    /// Checks that the policy cannot spin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero delay or `initial > max`.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Fixed(delay) if delay.is_zero() => {
                Err(Error::config("retry delay must be positive"))
            }
            Self::Exponential { initial, .. } if initial.is_zero() => {
                Err(Error::config("initial retry delay must be positive"))
            }
            Self::Exponential { initial, max } if initial > max => Err(Error::config(
                "initial retry delay exceeds the maximum",
            )),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Backoff
// ============================================================================

/// Delay sequence for one manager run.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    failures: u32,
}

impl Backoff {
    /// Creates a backoff at its first delay.
    #[inline]
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            failures: 0,
        }
    }

    /// Returns the delay before the next attempt and advances the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let delay = match self.policy {
            RetryPolicy::Fixed(delay) => delay,
            RetryPolicy::Exponential { initial, max } => initial
                .checked_mul(1u32 << self.failures.min(16))
                .map_or(max, |d| d.min(max)),
        };
        self.failures = self.failures.saturating_add(1);
        delay
    }

    /// Restarts the sequence after a successful open.
    #[inline]
    pub fn reset(&mut self) {
        self.failures = 0;
    }
}

// ============================================================================
// Tests
// ============================================================================
