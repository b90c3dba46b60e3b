use backon::BackoffBuilder;
use std::time::Duration;

/// Escalating delay between attempts of one logical request: `base * (2^attempt - 1)`.
///
/// As a [`BackoffBuilder`] it yields the delay before each retry (attempts `1..max_attempts`)
/// and then ends, which is what bounds the careful request loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base: Duration,
    max_attempts: u32,
}

impl RetryPolicy {
    pub const DEFAULT_BASE: Duration = Duration::from_secs(5);
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 7;

    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Extra wait before the 0-based `attempt`. Zero for the first attempt.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).map_or(u32::MAX, |pow| pow - 1);
        self.base.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE, Self::DEFAULT_MAX_ATTEMPTS)
    }
}

#[derive(Debug, Clone)]
pub struct RetryBackoff {
    policy: RetryPolicy,
    next_attempt: u32,
}

impl Iterator for RetryBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.next_attempt >= self.policy.max_attempts {
            return None;
        }
        let delay = self.policy.backoff_for(self.next_attempt);
        self.next_attempt += 1;
        Some(delay)
    }
}

impl BackoffBuilder for RetryPolicy {
    type Backoff = RetryBackoff;

    fn build(self) -> Self::Backoff {
        RetryBackoff {
            policy: self,
            next_attempt: 1,
        }
    }
}
