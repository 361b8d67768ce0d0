//! # Backoff between reconnect attempts.
//!
//! The delay before attempt `n` (0-indexed) is `first × factor^n`, clamped to
//! `max`, then jittered. The base is derived from the attempt number alone, so
//! jitter never feeds back into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use nbprogress::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(1),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(100));
//! assert_eq!(backoff.next(2), Duration::from_millis(400));
//! assert_eq!(backoff.next(8), Duration::from_secs(1));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Reconnect backoff policy.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Randomization applied after clamping.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 250ms`, `factor = 2.0`, `max = 2s`, equal jitter.
    ///
    /// With the default budget of 3 attempts a dead bus costs well under the
    /// default shutdown grace.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(250),
            max: Duration::from_secs(2),
            factor: 2.0,
            jitter: JitterPolicy::Equal,
        }
    }
}

impl BackoffPolicy {
    /// A policy with no waiting at all. Handy for tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            first: Duration::ZERO,
            max: Duration::ZERO,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the delay before the given attempt number (0-indexed).
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(first_ms: u64, max_ms: u64, factor: f64) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(first_ms),
            max: Duration::from_millis(max_ms),
            factor,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn grows_exponentially_until_capped() {
        let policy = plain(100, 1_000, 2.0);
        assert_eq!(policy.next(0), Duration::from_millis(100));
        assert_eq!(policy.next(1), Duration::from_millis(200));
        assert_eq!(policy.next(3), Duration::from_millis(800));
        assert_eq!(policy.next(4), Duration::from_millis(1_000));
    }

    #[test]
    fn first_above_max_is_clamped() {
        assert_eq!(plain(5_000, 1_000, 1.0).next(0), Duration::from_millis(1_000));
    }

    #[test]
    fn overflow_clamps_to_max() {
        assert_eq!(plain(100, 10_000, 2.0).next(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn immediate_never_waits() {
        let policy = BackoffPolicy::immediate();
        for attempt in 0..5 {
            assert_eq!(policy.next(attempt), Duration::ZERO);
        }
    }

    #[test]
    fn default_jitter_keeps_half_of_base() {
        let policy = BackoffPolicy::default();
        for _ in 0..50 {
            let d = policy.next(0);
            assert!(d >= Duration::from_millis(125));
            assert!(d <= Duration::from_millis(250));
        }
    }
}
