//! Rate-limited, retrying request pipeline shared by both platform clients.
//!
//! Every platform call goes through [`CarefulClient::careful_request`]:
//! pace (per-service spacing and exponential backoff), attempt once, classify the
//! outcome, then retry or return.

mod address;
mod backoff;
mod careful;
mod clock;
mod diagnostic;
mod executor;
mod pacing;
mod policy;
mod service;

pub use address::{append_path, build_request_url};
pub use backoff::{RetryBackoff, RetryPolicy};
pub use careful::CarefulClient;
pub use clock::{Clock, SystemClock};
pub use diagnostic::{DiagnosticSink, FileDiagnosticSink};
pub use executor::{CarefulRequest, Payload, RequestBody, RequestExecutor, RequestOutcome, RetryReason};
pub use pacing::{ClockState, PacingIntervals, RateLimiter, RequestAttempt};
pub use policy::RequestPolicy;
pub use service::{ServiceIdentity, ServiceRegistry};

#[cfg(test)]
pub(crate) use clock::ManualClock;
