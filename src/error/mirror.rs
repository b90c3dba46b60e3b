use std::process::ExitCode;
use thiserror::Error as ThisError;

use super::CarefulRequestError;
use crate::transport::ServiceIdentity;

#[derive(Debug, ThisError)]
pub enum MirrorError {
    #[error(transparent)]
    Request(#[from] CarefulRequestError),

    #[error("{service} rejected the credentials (HTTP 401)")]
    Unauthorized { service: ServiceIdentity },

    #[error("{service} rejected the API key")]
    BadApiKey { service: ServiceIdentity },

    #[error("unexpected response from {service}: {detail}")]
    UnexpectedPayload {
        service: ServiceIdentity,
        detail: String,
    },

    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid header value: {0}")]
    HeaderError(#[from] reqwest::header::InvalidHeaderValue),
}

impl MirrorError {
    pub(crate) fn unexpected(service: ServiceIdentity, detail: impl Into<String>) -> Self {
        Self::UnexpectedPayload {
            service,
            detail: detail.into(),
        }
    }

    pub fn exit_status(&self) -> u8 {
        match self {
            Self::Request(err) => err.exit_status(),
            _ => 1,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }
}
