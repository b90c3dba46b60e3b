use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error as ThisError;

use crate::transport::ServiceIdentity;

/// Outcomes of a careful request after which the run must stop.
#[derive(Debug, ThisError)]
pub enum CarefulRequestError {
    #[error("maximum request attempts ({attempts}) reached for {service}")]
    AttemptsExhausted {
        service: ServiceIdentity,
        attempts: u32,
    },

    #[error("unexpected non-JSON response from {service}; raw body saved to {}", .dump_path.display())]
    UnparseableResponse {
        service: ServiceIdentity,
        dump_path: PathBuf,
    },

    #[error("unexpected non-JSON response from {service}; saving it failed: {source}")]
    Diagnostic {
        service: ServiceIdentity,
        #[source]
        source: io::Error,
    },
}

impl CarefulRequestError {
    pub fn service(&self) -> ServiceIdentity {
        match self {
            Self::AttemptsExhausted { service, .. }
            | Self::UnparseableResponse { service, .. }
            | Self::Diagnostic { service, .. } => *service,
        }
    }

    /// Status the process ends with. Giving up after retries is a clean stop; a broken
    /// response contract is a failure.
    pub fn exit_status(&self) -> u8 {
        match self {
            Self::AttemptsExhausted { .. } => 0,
            Self::UnparseableResponse { .. } | Self::Diagnostic { .. } => 1,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }
}
