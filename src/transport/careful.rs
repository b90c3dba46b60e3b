use backon::BackoffBuilder;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use super::{
    CarefulRequest, Clock, DiagnosticSink, FileDiagnosticSink, Payload, RateLimiter,
    RequestAttempt, RequestExecutor, RequestOutcome, RequestPolicy, RetryPolicy,
    ServiceIdentity, ServiceRegistry, SystemClock,
};
use crate::config::Config;
use crate::error::{CarefulRequestError, MirrorError};

/// The retrying, paced, failure-classifying request wrapper used by every platform call.
///
/// One instance is shared by both platform clients so that the per-service clocks are
/// process-wide. Calls are expected to be awaited one at a time.
#[derive(Debug)]
pub struct CarefulClient {
    executor: RequestExecutor,
    registry: ServiceRegistry,
    retry: RetryPolicy,
    limiter: Mutex<RateLimiter>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn DiagnosticSink>,
}

impl CarefulClient {
    pub fn new(
        http: reqwest::Client,
        registry: ServiceRegistry,
        policy: &RequestPolicy,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            executor: RequestExecutor::new(http, policy),
            registry,
            retry: policy.retry_policy(),
            limiter: Mutex::new(RateLimiter::new(policy.intervals)),
            clock,
            sink,
        }
    }

    /// Production wiring: system clock, dumps written under `basic.diagnostic_dir`.
    pub fn from_config(cfg: &Config) -> Result<Self, MirrorError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self::new(
            http,
            cfg.service_registry(),
            &cfg.request_policy(),
            Arc::new(SystemClock),
            Arc::new(FileDiagnosticSink::in_dir(&cfg.basic.diagnostic_dir)),
        ))
    }

    pub fn classify(&self, url: &Url) -> ServiceIdentity {
        self.registry.classify(url)
    }

    /// Runs `request` until it succeeds, is refused with 401, or can no longer be retried.
    ///
    /// `Ok(None)` means the service answered 401; nothing was retried. Every other way of
    /// stopping short of success is an error the caller is expected to end the run on.
    pub async fn careful_request(
        &self,
        request: CarefulRequest,
    ) -> Result<Option<Payload>, CarefulRequestError> {
        let service = self.classify(&request.url);
        let mut backoff = self.retry.build();
        let mut next_delay = Some(Duration::ZERO);
        let mut attempts = 0;

        while let Some(backoff_delay) = next_delay {
            let attempt = self.pace(service, attempts, backoff_delay).await;
            attempts += 1;

            debug!(
                %service,
                attempt = attempt.index,
                paused = ?attempt.pause,
                method = %request.method,
                url = %request.url,
                "[{service}] Sending request"
            );

            match self.executor.execute(&request, service).await {
                RequestOutcome::Success(payload) => return Ok(Some(payload)),
                RequestOutcome::AuthFailure => {
                    debug!(%service, url = %request.url, "[{service}] Unauthorized; not retrying");
                    return Ok(None);
                }
                RequestOutcome::RetryableFailure(reason) => {
                    warn!(
                        %service,
                        attempt = attempt.index,
                        reason = %reason,
                        "[{service}] {reason}. Trying again."
                    );
                }
                RequestOutcome::FatalParseFailure(raw) => {
                    return Err(self.capture_unparseable(service, &raw));
                }
            }

            next_delay = backoff.next();
        }

        error!(%service, attempts, url = %request.url, "[{service}] Maximum request attempts reached");
        Err(CarefulRequestError::AttemptsExhausted { service, attempts })
    }

    /// Waits out the larger of the service's spacing and the retry backoff, then stamps the
    /// request start.
    async fn pace(&self, service: ServiceIdentity, index: u32, backoff: Duration) -> RequestAttempt {
        let required = self
            .limiter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .required_pause(service, self.clock.now());
        let pause = required.max(backoff);

        if !pause.is_zero() {
            self.clock.sleep(pause).await;
        }

        self.limiter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record_request_start(service, self.clock.now());

        RequestAttempt {
            index,
            service,
            pause,
        }
    }

    fn capture_unparseable(&self, service: ServiceIdentity, raw: &[u8]) -> CarefulRequestError {
        match self.sink.capture(service, raw) {
            Ok(dump_path) => {
                error!(
                    %service,
                    path = %dump_path.display(),
                    "[{service}] Unexpected non-JSON response; dumped raw body"
                );
                CarefulRequestError::UnparseableResponse { service, dump_path }
            }
            Err(source) => {
                error!(%service, error = %source, "[{service}] Unexpected non-JSON response; dump failed");
                CarefulRequestError::Diagnostic { service, source }
            }
        }
    }
}
