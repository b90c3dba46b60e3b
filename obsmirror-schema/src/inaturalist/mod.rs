use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::lax::string_lax;

/// Paginated result envelope used by the iNaturalist v1 API.
#[derive(Debug, Deserialize, Serialize)]
pub struct InatResults<T> {
    #[serde(default)]
    pub total_results: Option<u64>,

    #[serde(default)]
    pub page: Option<u64>,

    #[serde(default)]
    pub per_page: Option<u64>,

    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InatUser {
    pub login: String,
}

/// Observation as returned by `/observations` searches; only the parts the mirror reads.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ObservationSummary {
    #[serde(default)]
    pub id: u64,

    #[serde(default)]
    pub ofvs: Vec<ObservationFieldValue>,

    #[serde(default)]
    pub identifications: Vec<Identification>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ObservationFieldValue {
    pub field_id: u64,

    #[serde(default, deserialize_with = "string_lax")]
    pub value: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaxonResult {
    pub id: u64,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub rank: String,

    #[serde(default)]
    pub iconic_taxon_name: Option<String>,

    #[serde(default)]
    pub matched_term: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreatedObservation {
    pub id: u64,

    #[serde(flatten)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Identification {
    pub id: u64,

    pub taxon_id: u64,

    pub taxon: IdentificationTaxon,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdentificationTaxon {
    pub name: String,

    pub rank: String,
}
