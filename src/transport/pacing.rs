use std::time::{Duration, Instant};

use super::ServiceIdentity;

/// Minimum spacing between request starts, per service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingIntervals {
    pub source: Duration,
    pub destination: Duration,
    /// Flat pause for hosts outside both platforms. Not tracked between calls.
    pub unclassified: Duration,
}

impl Default for PacingIntervals {
    fn default() -> Self {
        Self {
            source: Duration::from_millis(1500),
            destination: Duration::from_secs(5),
            unclassified: Duration::from_secs(2),
        }
    }
}

/// Start time of the last request sent to each tracked service. Empty at process start.
#[derive(Debug, Clone, Default)]
pub struct ClockState {
    source: Option<Instant>,
    destination: Option<Instant>,
}

impl ClockState {
    fn slot(&self, service: ServiceIdentity) -> Option<Instant> {
        match service {
            ServiceIdentity::SourcePlatform => self.source,
            ServiceIdentity::DestinationPlatform => self.destination,
            ServiceIdentity::Unclassified => None,
        }
    }

    fn slot_mut(&mut self, service: ServiceIdentity) -> Option<&mut Option<Instant>> {
        match service {
            ServiceIdentity::SourcePlatform => Some(&mut self.source),
            ServiceIdentity::DestinationPlatform => Some(&mut self.destination),
            ServiceIdentity::Unclassified => None,
        }
    }
}

/// Enforces [`PacingIntervals`] using a [`ClockState`].
#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    intervals: PacingIntervals,
    state: ClockState,
}

impl RateLimiter {
    pub fn new(intervals: PacingIntervals) -> Self {
        Self {
            intervals,
            state: ClockState::default(),
        }
    }

    /// `None` when the service has never been contacted or is not tracked.
    pub fn time_since_last(&self, service: ServiceIdentity, now: Instant) -> Option<Duration> {
        self.state
            .slot(service)
            .map(|last| now.saturating_duration_since(last))
    }

    pub fn required_pause(&self, service: ServiceIdentity, now: Instant) -> Duration {
        let interval = match service {
            ServiceIdentity::SourcePlatform => self.intervals.source,
            ServiceIdentity::DestinationPlatform => self.intervals.destination,
            ServiceIdentity::Unclassified => return self.intervals.unclassified,
        };
        self.time_since_last(service, now)
            .map_or(Duration::ZERO, |elapsed| interval.saturating_sub(elapsed))
    }

    /// No-op for unclassified hosts.
    pub fn record_request_start(&mut self, service: ServiceIdentity, at: Instant) {
        if let Some(slot) = self.state.slot_mut(service) {
            *slot = Some(at);
        }
    }
}

/// One pass through the retry loop, as decided by the pacing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestAttempt {
    /// 0-based.
    pub index: u32,
    pub service: ServiceIdentity,
    pub pause: Duration,
}
