use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, multipart};
use serde_json::Value;
use std::fmt;
use url::Url;

use super::{RequestPolicy, ServiceIdentity};

pub const UPSTREAM_BODY_PREVIEW_CHARS: usize = 300;

/// Body of a careful request. Rebuilt into a fresh `reqwest` body on every attempt.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    File {
        field: String,
        file_name: String,
        bytes: Vec<u8>,
    },
}

/// Description of one logical request; replayed unchanged on each retry.
#[derive(Debug, Clone)]
pub struct CarefulRequest {
    pub method: Method,
    pub url: Url,
    pub body: Option<RequestBody>,
    pub headers: HeaderMap,
    /// When false the raw body is returned without being parsed.
    pub expect_json: bool,
}

impl CarefulRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            body: None,
            headers: HeaderMap::new(),
            expect_json: true,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: Url) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn patch(url: Url) -> Self {
        Self::new(Method::PATCH, url)
    }

    pub fn delete(url: Url) -> Self {
        Self::new(Method::DELETE, url)
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    #[must_use]
    pub fn file(mut self, field: &str, file_name: &str, bytes: Vec<u8>) -> Self {
        self.body = Some(RequestBody::File {
            field: field.to_string(),
            file_name: file_name.to_string(),
            bytes,
        });
        self
    }

    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn raw(mut self) -> Self {
        self.expect_json = false;
        self
    }

    fn build(&self, client: &reqwest::Client) -> reqwest::RequestBuilder {
        let builder = client
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone());

        match &self.body {
            None => builder,
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::File {
                field,
                file_name,
                bytes,
            }) => {
                let part = multipart::Part::bytes(bytes.clone()).file_name(file_name.clone());
                builder.multipart(multipart::Form::new().part(field.clone(), part))
            }
        }
    }
}

/// Successful response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Raw(Vec<u8>),
}

impl Payload {
    pub fn into_json(self) -> Option<Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Raw(_) => None,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Json(value) => value.to_string().into_bytes(),
            Self::Raw(bytes) => bytes,
        }
    }
}

/// Why an attempt is worth repeating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryReason {
    Connection(String),
    Status(StatusCode),
    Maintenance,
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(detail) => write!(f, "connection error ({detail})"),
            Self::Status(status) => write!(f, "got status code {}", status.as_u16()),
            Self::Maintenance => f.write_str("service reports it is down for maintenance"),
        }
    }
}

/// Classification of a single attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    Success(Payload),
    /// HTTP 401. Returned to the caller instead of retried.
    AuthFailure,
    RetryableFailure(RetryReason),
    /// 200 with a body that is neither JSON nor a maintenance page.
    FatalParseFailure(Vec<u8>),
}

/// Performs exactly one HTTP call and classifies what came back.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: reqwest::Client,
    maintenance_marker: String,
    maintenance_scan_bytes: usize,
}

impl RequestExecutor {
    pub fn new(client: reqwest::Client, policy: &RequestPolicy) -> Self {
        Self {
            client,
            maintenance_marker: policy.maintenance_marker.clone(),
            maintenance_scan_bytes: policy.maintenance_scan_bytes,
        }
    }

    pub async fn execute(&self, request: &CarefulRequest, service: ServiceIdentity) -> RequestOutcome {
        let resp = match request.build(&self.client).send().await {
            Ok(resp) => resp,
            Err(err) => return RequestOutcome::RetryableFailure(RetryReason::Connection(err.to_string())),
        };

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return RequestOutcome::AuthFailure;
        }

        let bytes = match resp.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => return RequestOutcome::RetryableFailure(RetryReason::Connection(err.to_string())),
        };

        if status != StatusCode::OK {
            let raw_body = String::from_utf8_lossy(&bytes);
            tracing::debug!(
                %service,
                %status,
                url = %request.url,
                body = %format!("{:.len$}", raw_body, len = UPSTREAM_BODY_PREVIEW_CHARS),
                "[{service}] Non-200 response"
            );
            return RequestOutcome::RetryableFailure(RetryReason::Status(status));
        }

        if !request.expect_json {
            return RequestOutcome::Success(Payload::Raw(bytes.to_vec()));
        }

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => RequestOutcome::Success(Payload::Json(value)),
            Err(_) if self.is_maintenance_page(&bytes) => {
                RequestOutcome::RetryableFailure(RetryReason::Maintenance)
            }
            Err(_) => RequestOutcome::FatalParseFailure(bytes.to_vec()),
        }
    }

    fn is_maintenance_page(&self, body: &[u8]) -> bool {
        if self.maintenance_marker.is_empty() {
            return false;
        }
        let head = &body[..body.len().min(self.maintenance_scan_bytes)];
        String::from_utf8_lossy(head).contains(&self.maintenance_marker)
    }
}
