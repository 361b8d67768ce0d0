//! # Bounded reconnect budget.
//!
//! [`ReconnectPolicy`] tells the connection supervisor how many times it may
//! fail to reach the bus in a row and how long to wait between dials. Failed
//! dials and failed writes spend the same budget; a successful write refills
//! it. Once it runs out the connection is marked errored for the rest of the run.

use std::time::Duration;

use crate::policies::backoff::BackoffPolicy;

/// Bounded reconnect policy.
#[derive(Clone, Copy, Debug)]
pub struct ReconnectPolicy {
    /// Maximum consecutive failures for the run (`0` is treated as `1`).
    pub max_attempts: u32,
    /// Delay growth between attempts.
    pub backoff: BackoffPolicy,
}

impl Default for ReconnectPolicy {
    /// Three attempts with the default backoff.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl ReconnectPolicy {
    /// Returns the attempt budget, clamped to at least one.
    #[inline]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Returns the wait after failed attempt `attempt` (1-based), or `None`
    /// when the budget is spent and no further attempt should be made.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.attempts() {
            None
        } else {
            Some(self.backoff.next(attempt.saturating_sub(1)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::JitterPolicy;

    #[test]
    fn zero_attempts_still_dials_once() {
        let policy = ReconnectPolicy {
            max_attempts: 0,
            backoff: BackoffPolicy::immediate(),
        };
        assert_eq!(policy.attempts(), 1);
        assert_eq!(policy.delay_after(1), None);
    }

    #[test]
    fn budget_of_three_waits_twice() {
        let policy = ReconnectPolicy {
            max_attempts: 3,
            backoff: BackoffPolicy {
                first: Duration::from_millis(10),
                max: Duration::from_secs(1),
                factor: 3.0,
                jitter: JitterPolicy::None,
            },
        };
        assert_eq!(policy.delay_after(1), Some(Duration::from_millis(10)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_millis(30)));
        assert_eq!(policy.delay_after(3), None);
    }
}
