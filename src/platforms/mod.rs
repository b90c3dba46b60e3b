//! Per-platform request builders layered on [`CarefulClient`](crate::transport::CarefulClient).

pub mod inaturalist;
pub mod mushroom_observer;

pub use inaturalist::INaturalistClient;
pub use mushroom_observer::MushroomObserverClient;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::MirrorError;
use crate::transport::{Payload, ServiceIdentity};

/// Unwraps a careful response where the caller cannot proceed without data.
pub(crate) fn require_json(
    service: ServiceIdentity,
    payload: Option<Payload>,
) -> Result<Value, MirrorError> {
    match payload {
        Some(Payload::Json(value)) => Ok(value),
        Some(Payload::Raw(_)) => Err(MirrorError::unexpected(service, "expected a JSON body")),
        None => Err(MirrorError::Unauthorized { service }),
    }
}

pub(crate) fn decode<T: DeserializeOwned>(
    service: ServiceIdentity,
    value: Value,
) -> Result<T, MirrorError> {
    serde_json::from_value(value).map_err(|err| MirrorError::unexpected(service, err.to_string()))
}
