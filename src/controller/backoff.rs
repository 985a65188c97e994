//! # Exponential Backoff
//!
//! Per-key backoff used by the work queue's rate-limited requeue.
//!
//! Each failure doubles the delay, starting at `base` and capped at `max`.
//! With the defaults (5ms base, 1000s max) the sequence is 5ms, 10ms, 20ms, 40ms, ...
//!
//! ## Usage
//!
//! ```rust
//! use keyvault_secret_controller::controller::backoff::ExponentialBackoff;
//! use std::time::Duration;
//!
//! let backoff = ExponentialBackoff::new(Duration::from_millis(5), Duration::from_secs(1000));
//! assert_eq!(backoff.delay_for(0), Duration::from_millis(5));
//! assert_eq!(backoff.delay_for(1), Duration::from_millis(10));
//! assert_eq!(backoff.delay_for(2), Duration::from_millis(20));
//! ```

use std::time::Duration;

/// Exponential backoff calculator
///
/// Stateless: the number of failures so far is tracked by the caller (the work queue keeps
/// one counter per key), so one calculator serves every key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    /// Delay after the first failure
    base: Duration,
    /// Upper bound for any delay
    max: Duration,
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay before retrying after `failures` previous failures
    ///
    /// `delay_for(0)` is the base delay. Overflow saturates at `max`.
    #[must_use]
    pub fn delay_for(&self, failures: u32) -> Duration {
        let factor = 2u32.checked_pow(failures).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.max, |delay| delay.min(self.max))
    }

    #[must_use]
    pub fn max(&self) -> Duration {
        self.max
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(crate::constants::DEFAULT_BACKOFF_BASE_MS),
            Duration::from_secs(crate::constants::DEFAULT_BACKOFF_MAX_SECS),
        )
    }
}
