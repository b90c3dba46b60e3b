use obsmirror_schema::{
    CreatedObservation, Identification, InatResults, InatUser, ObservationSummary, TaxonResult,
};
use reqwest::header::{AUTHORIZATION, HeaderValue, USER_AGENT};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, error, warn};
use url::Url;

use super::{decode, require_json};
use crate::config::DestinationResolvedConfig;
use crate::error::MirrorError;
use crate::translate::{self, SOURCE_URL_FIELD};
use crate::transport::{CarefulClient, CarefulRequest, Payload, ServiceIdentity, build_request_url};
use crate::utils::logging::with_pretty_json_debug;

const SERVICE: ServiceIdentity = ServiceIdentity::DestinationPlatform;

const OBSERVATIONS_PER_PAGE: &str = "200";

/// Client for the iNaturalist v1 API (the destination platform).
#[derive(Debug, Clone)]
pub struct INaturalistClient {
    careful: Arc<CarefulClient>,
    api_url: Url,
    web_url: Url,
    user_agent: HeaderValue,
}

impl INaturalistClient {
    pub fn new(
        careful: Arc<CarefulClient>,
        cfg: &DestinationResolvedConfig,
    ) -> Result<Self, MirrorError> {
        Ok(Self {
            careful,
            api_url: cfg.api_url.clone(),
            web_url: cfg.web_url.clone(),
            user_agent: HeaderValue::from_str(&cfg.user_agent)?,
        })
    }

    /// Public site root, used to build links back to mirrored observations.
    pub fn web_url(&self) -> &Url {
        &self.web_url
    }

    fn url<'a>(&self, path: &str, params: impl IntoIterator<Item = (&'a str, &'a str)>) -> Url {
        build_request_url(&self.api_url, path, params)
    }

    /// Adds the user agent and, when present, the raw JWT as `Authorization`.
    fn request(&self, request: CarefulRequest, jwt: Option<&str>) -> Result<CarefulRequest, MirrorError> {
        let request = request.header(USER_AGENT, self.user_agent.clone());
        match jwt {
            Some(jwt) => Ok(request.header(AUTHORIZATION, HeaderValue::from_str(jwt)?)),
            None => Ok(request),
        }
    }

    async fn send(&self, request: CarefulRequest, jwt: Option<&str>) -> Result<Option<Payload>, MirrorError> {
        let request = self.request(request, jwt)?;
        Ok(self.careful.careful_request(request).await?)
    }

    async fn fetch(&self, request: CarefulRequest, jwt: Option<&str>) -> Result<Value, MirrorError> {
        require_json(SERVICE, self.send(request, jwt).await?)
    }

    /// Writes whose response body is not needed; a denied write is still an error.
    async fn write(&self, request: CarefulRequest, jwt: &str) -> Result<(), MirrorError> {
        self.send(request, Some(jwt))
            .await?
            .map(|_| ())
            .ok_or(MirrorError::Unauthorized { service: SERVICE })
    }

    /// True when `jwt` is accepted and belongs to `username`.
    pub async fn confirm_jwt(&self, jwt: &str, username: &str) -> Result<bool, MirrorError> {
        let url = self.url("/users/me", std::iter::empty());
        let Some(Payload::Json(value)) = self.send(CarefulRequest::get(url), Some(jwt)).await? else {
            return Ok(false);
        };

        let me: InatResults<InatUser> = decode(SERVICE, value)?;
        Ok(me
            .results
            .first()
            .is_some_and(|user| user.login.eq_ignore_ascii_case(username)))
    }

    /// Source ids already mirrored by `username`, read from their "Mushroom Observer URL" fields.
    pub async fn mirrored_source_ids(&self, username: &str) -> Result<BTreeSet<u64>, MirrorError> {
        let mut mirrored = BTreeSet::new();
        let mut page: u64 = 1;

        loop {
            let page_param = page.to_string();
            let url = self.url(
                "/observations",
                [
                    ("user_login", username),
                    ("per_page", OBSERVATIONS_PER_PAGE),
                    ("page", page_param.as_str()),
                ],
            );
            let value = self.fetch(CarefulRequest::get(url), None).await?;
            let listing: InatResults<ObservationSummary> = decode(SERVICE, value)?;

            if listing.results.is_empty() {
                break;
            }
            mirrored.extend(
                listing
                    .results
                    .iter()
                    .flat_map(|obs| &obs.ofvs)
                    .filter(|ofv| ofv.field_id == SOURCE_URL_FIELD)
                    .filter_map(|ofv| translate::source_id_from_url(&ofv.value)),
            );
            page += 1;
        }

        debug!(count = mirrored.len(), "Collected mirrored source ids");
        Ok(mirrored)
    }

    pub async fn search_taxa(&self, q: &str) -> Result<Vec<TaxonResult>, MirrorError> {
        let url = self.url("/taxa", [("q", q)]);
        let value = self.fetch(CarefulRequest::get(url), None).await?;
        let found: InatResults<TaxonResult> = decode(SERVICE, value)?;
        Ok(found.results)
    }

    /// Creates an observation and returns its id.
    pub async fn create_observation(&self, payload: Value, jwt: &str) -> Result<u64, MirrorError> {
        let url = self.url("/observations", std::iter::empty());
        let value = self.fetch(CarefulRequest::post(url).json(payload), Some(jwt)).await?;

        match serde_json::from_value::<CreatedObservation>(value.clone()) {
            Ok(created) => Ok(created.id),
            Err(err) => {
                error!(error = %err, "Got result without observation id");
                with_pretty_json_debug(&value, |pretty| {
                    debug!(body = %pretty, "Creation response");
                });
                Err(MirrorError::unexpected(SERVICE, "created observation has no id"))
            }
        }
    }

    /// One POST per field; fields are independent on the destination.
    pub async fn post_field_values(
        &self,
        observation_id: u64,
        fields: &BTreeMap<u64, String>,
        jwt: &str,
    ) -> Result<(), MirrorError> {
        for (field_id, value) in fields {
            let url = self.url("/observation_field_values", std::iter::empty());
            let body = json!({
                "observation_field_value": {
                    "observation_id": observation_id,
                    "observation_field_id": field_id,
                    "value": value,
                }
            });
            self.write(CarefulRequest::post(url).json(body), jwt).await?;
        }
        Ok(())
    }

    /// The identification iNaturalist attached when the observation was created.
    pub async fn existing_identification(&self, observation_id: u64) -> Result<Identification, MirrorError> {
        let url = self.url(&format!("/observations/{observation_id}"), std::iter::empty());
        let value = self.fetch(CarefulRequest::get(url), None).await?;
        let listing: InatResults<ObservationSummary> = decode(SERVICE, value)?;

        let identifications = listing
            .results
            .into_iter()
            .next()
            .map(|obs| obs.identifications)
            .unwrap_or_default();
        if identifications.len() > 1 {
            warn!(
                observation_id,
                count = identifications.len(),
                "Unexpectedly found multiple identifications already on observation"
            );
        }

        identifications.into_iter().next().ok_or_else(|| {
            MirrorError::unexpected(
                SERVICE,
                format!("observation {observation_id} has no identification"),
            )
        })
    }

    pub async fn update_identification(
        &self,
        identification_id: u64,
        payload: Value,
        jwt: &str,
    ) -> Result<(), MirrorError> {
        let url = self.url(&format!("/identifications/{identification_id}"), std::iter::empty());
        self.write(CarefulRequest::put(url).json(payload), jwt).await
    }

    pub async fn upload_photo(&self, observation_id: u64, bytes: Vec<u8>, jwt: &str) -> Result<(), MirrorError> {
        let id_param = observation_id.to_string();
        let url = self.url(
            "/observation_photos",
            [("observation_photo[observation_id]", id_param.as_str())],
        );
        let file_name = format!("{observation_id}.jpg");
        self.write(CarefulRequest::post(url).file("file", &file_name, bytes), jwt)
            .await
    }

    /// `payload` must carry `ignore_photos` or the update drops attached photos.
    pub async fn update_observation(&self, observation_id: u64, payload: Value, jwt: &str) -> Result<(), MirrorError> {
        let url = self.url(&format!("/observations/{observation_id}"), std::iter::empty());
        self.write(CarefulRequest::put(url).json(payload), jwt).await
    }

    pub async fn delete_observation(&self, observation_id: u64, jwt: &str) -> Result<(), MirrorError> {
        let url = self.url(&format!("/observations/{observation_id}"), std::iter::empty());
        self.write(CarefulRequest::delete(url).raw(), jwt).await
    }
}
