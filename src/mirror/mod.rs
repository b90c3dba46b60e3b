//! Copies source observations onto the destination one at a time.

use chrono::Local;
use obsmirror_schema::MoObservation;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};
use url::Url;

use crate::config::{Config, MirrorConfig};
use crate::error::MirrorError;
use crate::platforms::{INaturalistClient, MushroomObserverClient};
use crate::translate::{self, LIFE_TAXON_ID};
use crate::transport::{Clock, ServiceIdentity, SystemClock};

/// Account names and secrets for both platforms.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub source_username: String,
    pub source_api_key: String,
    pub destination_username: String,
    pub jwt: String,
}

impl Credentials {
    pub fn from_config(cfg: &Config) -> Self {
        let source = &cfg.platforms.source;
        let destination = &cfg.platforms.destination;
        Self {
            source_username: source.username.clone(),
            source_api_key: source.api_key.clone(),
            destination_username: destination.username.clone(),
            jwt: destination.jwt.clone(),
        }
    }
}

/// Destination taxon that does not spell the same name as the source consensus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMismatch {
    pub source_name: String,
    pub destination_name: String,
    pub destination_rank: String,
}

/// Outcome of mirroring one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorRecord {
    pub source_id: u64,
    pub destination_id: u64,
    pub taxon_id: u64,
    pub images: usize,
    pub name_mismatch: Option<NameMismatch>,
}

/// Source observations not yet present on the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pending {
    pub source_ids: Vec<u64>,
    pub mirrored: BTreeSet<u64>,
    pub mirrorable: BTreeSet<u64>,
    /// Source page holding the oldest mirrorable observation.
    pub start_page: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub mirrored: Vec<MirrorRecord>,
    /// The run stopped early on request.
    pub interrupted: bool,
}

#[derive(Debug, Clone)]
pub struct Mirror {
    source: MushroomObserverClient,
    destination: INaturalistClient,
    credentials: Credentials,
    settings: MirrorConfig,
    page_size: u64,
    clock: Arc<dyn Clock>,
}

impl Mirror {
    pub fn new(
        source: MushroomObserverClient,
        destination: INaturalistClient,
        credentials: Credentials,
        settings: MirrorConfig,
        page_size: u64,
    ) -> Self {
        Self {
            source,
            destination,
            credentials,
            settings,
            page_size: page_size.max(1),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used for the pause between observations.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn pending(&self) -> Result<Pending, MirrorError> {
        let source_ids = self
            .source
            .observation_ids(&self.credentials.source_username)
            .await?;
        info!(count = source_ids.len(), "Got source observation ids");

        let mirrored = self
            .destination
            .mirrored_source_ids(&self.credentials.destination_username)
            .await?;
        info!(count = mirrored.len(), "Got ids already mirrored");

        let mirrorable: BTreeSet<u64> = source_ids
            .iter()
            .copied()
            .filter(|id| !mirrored.contains(id))
            .collect();
        let start_page = start_page(&source_ids, &mirrorable, self.page_size);

        Ok(Pending {
            source_ids,
            mirrored,
            mirrorable,
            start_page,
        })
    }

    /// Mirrors up to `count` unmirrored observations, stopping early once `shutdown` resolves.
    ///
    /// `shutdown` is only observed between observations so nothing is left half-built.
    pub async fn run<F>(&self, count: usize, shutdown: F) -> Result<RunSummary, MirrorError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let pending = self.pending().await?;
        let target = count.min(pending.mirrorable.len());
        info!(
            mirrorable = pending.mirrorable.len(),
            target,
            start_page = pending.start_page,
            "Planning mirror run"
        );

        let mut summary = RunSummary::default();
        if target == 0 {
            return Ok(summary);
        }

        let mut page = pending.start_page;
        'pages: while summary.mirrored.len() < target {
            let batch = self
                .source
                .full_observations(
                    &self.credentials.source_username,
                    page,
                    &self.credentials.source_api_key,
                )
                .await?;
            if batch.is_empty() {
                return Err(MirrorError::unexpected(
                    ServiceIdentity::SourcePlatform,
                    format!("page {page} had no observations left to mirror"),
                ));
            }

            for obs in batch {
                if !pending.mirrorable.contains(&obs.id) {
                    continue;
                }

                let record = self.mirror_observation(&obs).await?;
                summary.mirrored.push(record);
                info!(
                    done = summary.mirrored.len(),
                    target,
                    source_id = obs.id,
                    "Done mirroring observation"
                );
                if summary.mirrored.len() >= target {
                    break 'pages;
                }

                info!(pause = ?self.settings.pause_between(), "Press ctrl+c to safely quit early");
                tokio::select! {
                    biased;
                    _ = &mut shutdown => {
                        info!("Safely quitting");
                        summary.interrupted = true;
                        break 'pages;
                    }
                    _ = self.clock.sleep(self.settings.pause_between()) => {}
                }
            }
            page += 1;
        }

        Ok(summary)
    }

    /// Creates the destination copy of `obs` and links back to it.
    ///
    /// Once the skeleton exists, a failure deletes it again unless `keep_incomplete` is set or
    /// the failure came from the request pipeline itself, in which case it is only logged.
    pub async fn mirror_observation(&self, obs: &MoObservation) -> Result<MirrorRecord, MirrorError> {
        let name = translate::complete_name(&obs.consensus.name, obs.consensus.author.as_deref());
        let taxon_id = self.resolve_taxon(&name).await?;

        let destination_id = self
            .destination
            .create_observation(translate::creation_payload(obs, taxon_id), &self.credentials.jwt)
            .await?;
        info!(source_id = obs.id, destination_id, "Created skeleton observation");

        match self.fill_in(obs, &name, taxon_id, destination_id).await {
            Ok(record) => Ok(record),
            Err(err @ MirrorError::Request(_)) => {
                // The pipeline already gave up; no further requests before the process stops.
                error!(
                    source_id = obs.id,
                    destination_id,
                    error = %err,
                    "Incomplete observation left on the destination; delete it by hand"
                );
                Err(err)
            }
            Err(err) => {
                self.abandon(destination_id, &err).await;
                Err(err)
            }
        }
    }

    async fn fill_in(
        &self,
        obs: &MoObservation,
        name: &str,
        taxon_id: u64,
        destination_id: u64,
    ) -> Result<MirrorRecord, MirrorError> {
        let jwt = self.credentials.jwt.as_str();
        let fields = translate::observation_fields(obs, &self.credentials.source_username);

        self.destination
            .post_field_values(destination_id, &fields.values, jwt)
            .await?;

        let identification = self.destination.existing_identification(destination_id).await?;
        let payload = translate::identification_payload(
            destination_id,
            Some(identification.taxon_id),
            &translate::proposal_body(obs),
        );
        self.destination
            .update_identification(identification.id, payload, jwt)
            .await?;

        let name_mismatch = (!translate::names_match(
            name,
            &identification.taxon.name,
            &identification.taxon.rank,
        ))
        .then(|| NameMismatch {
            source_name: name.to_string(),
            destination_name: identification.taxon.name.clone(),
            destination_rank: identification.taxon.rank.clone(),
        });
        if let Some(mismatch) = &name_mismatch {
            warn!(
                source_id = obs.id,
                destination_id,
                source_name = %mismatch.source_name,
                destination_name = %mismatch.destination_name,
                destination_rank = %mismatch.destination_rank,
                "Name mismatch"
            );
        }

        let mut images = 0;
        for image in obs.all_images() {
            let url = Url::parse(&image.original_url)?;
            let bytes = self.source.download_image(&url).await?;
            self.destination.upload_photo(destination_id, bytes, jwt).await?;
            images += 1;
        }
        info!(destination_id, images, "Done uploading images");

        self.destination
            .update_observation(destination_id, translate::description_payload(obs, &fields), jwt)
            .await?;

        self.source
            .add_link(
                &self.credentials.source_username,
                &self.credentials.source_api_key,
                obs.id,
                self.destination.web_url(),
                destination_id,
                &translate::long_date(Local::now().date_naive()),
            )
            .await?;

        Ok(MirrorRecord {
            source_id: obs.id,
            destination_id,
            taxon_id,
            images,
            name_mismatch,
        })
    }

    async fn abandon(&self, destination_id: u64, cause: &MirrorError) {
        if self.settings.keep_incomplete {
            warn!(destination_id, error = %cause, "Leaving incomplete observation in place");
            return;
        }

        warn!(destination_id, error = %cause, "Deleting incomplete observation");
        if let Err(err) = self
            .destination
            .delete_observation(destination_id, &self.credentials.jwt)
            .await
        {
            error!(destination_id, error = %err, "Failed to delete incomplete observation");
        }
    }

    /// Dictionary entry, then exact search, then genus search, then Life.
    pub async fn resolve_taxon(&self, name: &str) -> Result<u64, MirrorError> {
        if let Some(id) = self.settings.taxon_dictionary.get(name) {
            return Ok(*id);
        }
        info!(name, "Name is not in the local dictionary; searching");

        let search = translate::search_info(name);
        let results = self.destination.search_taxa(&search.name).await?;
        if let Some(id) = translate::search_match(&search.name, search.rank, &results) {
            info!(name, taxon_id = id, "Found name");
            return Ok(id);
        }

        if let Some((genus, _)) = search.name.split_once(' ') {
            info!(genus, "Not found; searching for genus instead");
            let results = self.destination.search_taxa(genus).await?;
            if let Some(id) = translate::search_match(genus, None, &results) {
                return Ok(id);
            }
        }

        warn!(name, "Could not find name; defaulting to taxon Life");
        Ok(LIFE_TAXON_ID)
    }
}

/// 1-based page holding the oldest mirrorable id, given the source lists ids in ascending order.
pub fn start_page(source_ids: &[u64], mirrorable: &BTreeSet<u64>, page_size: u64) -> u64 {
    let Some(first) = mirrorable.first() else {
        return 1;
    };
    let earlier = source_ids.iter().filter(|id| *id < first).count() as u64;
    earlier / page_size.max(1) + 1
}
