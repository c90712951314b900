//! Backoff schedule for rate-limited worker invocations.

use std::time::Duration;
use tokio_retry::strategy::jitter;

/// Delays of `initial * 2^n`, capped at `max`, plus up to `max_jitter` of
/// random jitter.
///
/// With `initial = 1s` and `max_jitter = 1s` the schedule is roughly
/// 1-2s, 2-3s, 4-5s, 8-9s... The iterator is unbounded; callers limit the
/// number of retries with [`Iterator::take`].
#[derive(Debug, Clone)]
pub struct RateLimitBackoff {
    next: Duration,
    max: Duration,
    max_jitter: Duration,
}

impl RateLimitBackoff {
    /// Create a schedule starting at `initial`.
    pub const fn new(initial: Duration, max: Duration, max_jitter: Duration) -> Self {
        Self {
            next: initial,
            max,
            max_jitter,
        }
    }
}

impl Iterator for RateLimitBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = self.next.min(self.max);
        self.next = self.next.checked_mul(2).unwrap_or(self.max);

        if self.max_jitter.is_zero() {
            Some(delay)
        } else {
            Some(delay + jitter(self.max_jitter))
        }
    }
}

/// Retry delays for a budget of `attempts` total invocations.
///
/// The first invocation is immediate, so the schedule has one delay fewer
/// than the attempt budget.
pub fn invoke_retry_delays(
    attempts: u32,
    initial: Duration,
    max: Duration,
    max_jitter: Duration,
) -> impl Iterator<Item = Duration> {
    RateLimitBackoff::new(initial, max, max_jitter).take(attempts.saturating_sub(1) as usize)
}
