use std::time::Duration;

use super::{PacingIntervals, RetryPolicy};

pub const DEFAULT_MAINTENANCE_MARKER: &str = "iNaturalist API is down";
pub const DEFAULT_MAINTENANCE_SCAN_BYTES: usize = 500;

/// Everything the careful request pipeline needs to know about retries and pacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub intervals: PacingIntervals,
    /// Substring of a non-JSON body that means "temporarily down", not "broken".
    pub maintenance_marker: String,
    pub maintenance_scan_bytes: usize,
}

impl RequestPolicy {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.backoff_base, self.max_attempts)
    }
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self {
            max_attempts: RetryPolicy::DEFAULT_MAX_ATTEMPTS,
            backoff_base: RetryPolicy::DEFAULT_BASE,
            intervals: PacingIntervals::default(),
            maintenance_marker: DEFAULT_MAINTENANCE_MARKER.to_string(),
            maintenance_scan_bytes: DEFAULT_MAINTENANCE_SCAN_BYTES,
        }
    }
}
