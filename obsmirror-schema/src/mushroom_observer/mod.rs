use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::lax::{bool_lax, f64_lax, string_lax};

/// Envelope returned by every Mushroom Observer API2 endpoint.
///
/// `results` holds bare ids for `detail=none` queries and full observation objects for
/// `detail=high`, so it is kept as raw JSON and decoded by the caller.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MoResponse {
    #[serde(default)]
    pub results: Option<Vec<Value>>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<MoApiError>,

    #[serde(flatten)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct MoApiError {
    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub details: String,
}

impl MoResponse {
    /// True when the API rejected the supplied key.
    pub fn is_bad_api_key(&self) -> bool {
        self.errors.first().is_some_and(|err| {
            err.code.to_ascii_lowercase().contains("badapikey")
                || err.details.to_ascii_lowercase().contains("bad key")
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MoObservation {
    pub id: u64,

    /// Observation date as entered, e.g. `2021-09-14`.
    #[serde(default)]
    pub date: String,

    #[serde(default)]
    pub created_at: String,

    #[serde(default)]
    pub location: MoLocation,

    #[serde(default, deserialize_with = "f64_lax")]
    pub latitude: Option<f64>,

    #[serde(default, deserialize_with = "f64_lax")]
    pub longitude: Option<f64>,

    #[serde(default, deserialize_with = "bool_lax")]
    pub gps_hidden: bool,

    #[serde(default)]
    pub consensus: MoConsensus,

    #[serde(default)]
    pub notes: Option<String>,

    #[serde(default)]
    pub primary_image: Option<MoImage>,

    #[serde(default)]
    pub images: Vec<MoImage>,

    #[serde(default)]
    pub collection_numbers: Vec<MoCollectionNumber>,

    #[serde(default)]
    pub herbarium_records: Vec<MoHerbariumRecord>,

    #[serde(default)]
    pub sequences: Vec<MoSequence>,

    #[serde(flatten)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl MoObservation {
    /// Primary image first, then the remaining images in API order.
    pub fn all_images(&self) -> impl Iterator<Item = &MoImage> {
        self.primary_image.iter().chain(self.images.iter())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MoLocation {
    #[serde(default)]
    pub name: String,

    #[serde(default, deserialize_with = "f64_lax")]
    pub latitude_north: Option<f64>,

    #[serde(default, deserialize_with = "f64_lax")]
    pub latitude_south: Option<f64>,

    #[serde(default, deserialize_with = "f64_lax")]
    pub longitude_east: Option<f64>,

    #[serde(default, deserialize_with = "f64_lax")]
    pub longitude_west: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MoConsensus {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub author: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MoImage {
    #[serde(default)]
    pub original_url: String,

    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MoCollectionNumber {
    #[serde(default, deserialize_with = "string_lax")]
    pub number: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MoHerbariumRecord {
    #[serde(default)]
    pub herbarium: MoHerbarium,

    #[serde(default, deserialize_with = "string_lax")]
    pub accession_number: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MoHerbarium {
    #[serde(default)]
    pub name: String,
}

/// A DNA sequence attached to an observation; `archive`/`accession` name its deposit.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MoSequence {
    #[serde(default)]
    pub locus: String,

    #[serde(default)]
    pub bases: Option<String>,

    #[serde(default)]
    pub archive: Option<String>,

    #[serde(default)]
    pub accession: Option<String>,

    #[serde(default)]
    pub notes: Option<String>,
}
