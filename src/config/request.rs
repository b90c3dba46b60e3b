use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::transport::{PacingIntervals, RequestPolicy};

/// Retry contract for careful requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RequestConfig {
    /// Attempts per logical request before the run is abandoned.
    /// TOML: `request.max_attempts`. Default: `7`.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base of the `base * (2^attempt - 1)` backoff schedule, in milliseconds.
    /// TOML: `request.backoff_base_ms`. Default: `5000`.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Flat pause before requests to hosts that belong to neither platform.
    /// TOML: `request.unclassified_pause_ms`. Default: `2000`.
    #[serde(default = "default_unclassified_pause_ms")]
    pub unclassified_pause_ms: u64,

    /// Substring of a non-JSON body that marks a temporary outage rather than a broken contract.
    /// TOML: `request.maintenance_marker`. Default: `iNaturalist API is down`.
    #[serde(default = "default_maintenance_marker")]
    pub maintenance_marker: String,

    /// How much of the body is searched for the maintenance marker.
    /// TOML: `request.maintenance_scan_bytes`. Default: `500`.
    #[serde(default = "default_maintenance_scan_bytes")]
    pub maintenance_scan_bytes: usize,
}

impl RequestConfig {
    pub fn unclassified_pause(&self) -> Duration {
        Duration::from_millis(self.unclassified_pause_ms)
    }

    pub fn policy(&self, intervals: PacingIntervals) -> RequestPolicy {
        RequestPolicy {
            max_attempts: self.max_attempts.max(1),
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            intervals,
            maintenance_marker: self.maintenance_marker.clone(),
            maintenance_scan_bytes: self.maintenance_scan_bytes,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            unclassified_pause_ms: default_unclassified_pause_ms(),
            maintenance_marker: default_maintenance_marker(),
            maintenance_scan_bytes: default_maintenance_scan_bytes(),
        }
    }
}

fn default_max_attempts() -> u32 {
    7
}

fn default_backoff_base_ms() -> u64 {
    5000
}

fn default_unclassified_pause_ms() -> u64 {
    2000
}

fn default_maintenance_marker() -> String {
    "iNaturalist API is down".to_string()
}

fn default_maintenance_scan_bytes() -> usize {
    500
}
