use obsmirror_schema::{MoObservation, MoResponse};
use reqwest::header::{HeaderValue, USER_AGENT};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use super::{decode, require_json};
use crate::config::SourceResolvedConfig;
use crate::error::MirrorError;
use crate::translate;
use crate::transport::{CarefulClient, CarefulRequest, Payload, ServiceIdentity, build_request_url};
use crate::utils::logging::with_pretty_json_debug;

const SERVICE: ServiceIdentity = ServiceIdentity::SourcePlatform;

/// Smallest download that is plausibly an image rather than an error page.
const MIN_EXPECTED_IMAGE_BYTES: usize = 5000;

/// Client for the Mushroom Observer API2 (the source platform).
#[derive(Debug, Clone)]
pub struct MushroomObserverClient {
    careful: Arc<CarefulClient>,
    api_url: Url,
    user_agent: HeaderValue,
}

impl MushroomObserverClient {
    pub fn new(careful: Arc<CarefulClient>, cfg: &SourceResolvedConfig) -> Result<Self, MirrorError> {
        Ok(Self {
            careful,
            api_url: cfg.api_url.clone(),
            user_agent: HeaderValue::from_str(&cfg.user_agent)?,
        })
    }

    fn observations_url<'a>(&self, params: impl IntoIterator<Item = (&'a str, &'a str)>) -> Url {
        build_request_url(&self.api_url, "/observations", params)
    }

    fn request(&self, request: CarefulRequest) -> CarefulRequest {
        request.header(USER_AGENT, self.user_agent.clone())
    }

    async fn fetch(&self, request: CarefulRequest) -> Result<MoResponse, MirrorError> {
        let payload = self.careful.careful_request(self.request(request)).await?;
        decode(SERVICE, require_json(SERVICE, payload)?)
    }

    /// False when the service refuses the key for `username`.
    pub async fn confirm_api_key(&self, username: &str, api_key: &str) -> Result<bool, MirrorError> {
        let url = self.observations_url([("api_key", api_key), ("user", username), ("format", "json")]);
        let payload = self.careful.careful_request(self.request(CarefulRequest::get(url))).await?;

        let Some(Payload::Json(value)) = payload else {
            return Ok(false);
        };
        let resp: MoResponse = decode(SERVICE, value)?;
        Ok(!resp.is_bad_api_key())
    }

    /// Ids of every observation `username` has posted, oldest page first.
    pub async fn observation_ids(&self, username: &str) -> Result<Vec<u64>, MirrorError> {
        let mut ids = Vec::new();
        let mut page: u64 = 1;

        loop {
            let page_param = page.to_string();
            let url = self.observations_url([
                ("user", username),
                ("page", page_param.as_str()),
                ("detail", "none"),
                ("format", "json"),
            ]);
            let resp = self.fetch(CarefulRequest::get(url)).await?;
            let results = results_or_error(resp)?;

            if results.is_empty() {
                break;
            }
            for value in results {
                ids.push(id_from_value(&value)?);
            }
            page += 1;
        }

        Ok(ids)
    }

    /// One `detail=high` page of `username`'s observations.
    pub async fn full_observations(
        &self,
        username: &str,
        page: u64,
        api_key: &str,
    ) -> Result<Vec<MoObservation>, MirrorError> {
        let page_param = page.to_string();
        let url = self.observations_url([
            ("user", username),
            ("page", page_param.as_str()),
            ("detail", "high"),
            ("format", "json"),
            ("api_key", api_key),
        ]);
        let resp = self.fetch(CarefulRequest::get(url)).await?;

        results_or_error(resp)?
            .into_iter()
            .map(|value| decode(SERVICE, value))
            .collect()
    }

    pub async fn observation(&self, id: u64) -> Result<MoObservation, MirrorError> {
        let id_param = id.to_string();
        let url = self.observations_url([
            ("id", id_param.as_str()),
            ("detail", "high"),
            ("format", "json"),
        ]);
        let resp = self.fetch(CarefulRequest::get(url)).await?;

        let first = results_or_error(resp)?
            .into_iter()
            .next()
            .ok_or_else(|| MirrorError::unexpected(SERVICE, format!("no observation {id}")))?;
        decode(SERVICE, first)
    }

    /// Raw bytes at `url`. Image hosts are paced like whichever platform they belong to.
    pub async fn download_image(&self, url: &Url) -> Result<Vec<u8>, MirrorError> {
        let service = self.careful.classify(url);
        let payload = self
            .careful
            .careful_request(self.request(CarefulRequest::get(url.clone()).raw()))
            .await?
            .ok_or(MirrorError::Unauthorized { service })?;

        let bytes = payload.into_bytes();
        if bytes.len() < MIN_EXPECTED_IMAGE_BYTES {
            warn!(
                url = %url,
                bytes = bytes.len(),
                "Got file possibly too small to be an image"
            );
        }
        Ok(bytes)
    }

    /// Appends a link to the destination copy to the source observation's notes.
    pub async fn add_link(
        &self,
        username: &str,
        api_key: &str,
        source_id: u64,
        destination_url: &Url,
        destination_id: u64,
        date: &str,
    ) -> Result<(), MirrorError> {
        let current = self.observation(source_id).await?;
        let original = translate::clean_up_notes(current.notes.as_deref().unwrap_or_default());
        let addendum = translate::link_addendum(destination_url, destination_id, date);
        let new_notes = translate::append_section(&original, &addendum);

        let id_param = source_id.to_string();
        let url = self.observations_url([
            ("user", username),
            ("api_key", api_key),
            ("id", id_param.as_str()),
            ("set_notes", new_notes.as_str()),
            ("log", "no"),
            ("format", "json"),
        ]);
        let resp = self.fetch(CarefulRequest::patch(url)).await?;

        if resp.is_bad_api_key() {
            return Err(MirrorError::BadApiKey { service: SERVICE });
        }
        info!(source_id, destination_id, "Linked source observation to its mirror");
        Ok(())
    }
}

fn results_or_error(resp: MoResponse) -> Result<Vec<Value>, MirrorError> {
    match resp.results {
        Some(results) => Ok(results),
        None => {
            with_pretty_json_debug(&resp, |pretty| {
                tracing::debug!(body = %pretty, "Response did not include results");
            });
            let detail = resp.errors.first().map_or_else(
                || "response did not include results".to_string(),
                |err| format!("{}: {}", err.code, err.details),
            );
            Err(MirrorError::unexpected(SERVICE, detail))
        }
    }
}

fn id_from_value(value: &Value) -> Result<u64, MirrorError> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| MirrorError::unexpected(SERVICE, format!("not an observation id: {value}")))
}
