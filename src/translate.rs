//! Pure conversions between Mushroom Observer records and iNaturalist payloads.

use chrono::NaiveDate;
use obsmirror_schema::{MoObservation, MoSequence, TaxonResult};
use regex::Regex;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use url::Url;

/// iNaturalist taxon "Life", used when nothing better matches.
pub const LIFE_TAXON_ID: u64 = 48460;

/// Observation field "Mushroom Observer URL".
pub const SOURCE_URL_FIELD: u64 = 5005;

/// Observation field "Collector's Collection Number".
pub const COLLECTION_NUMBER_FIELD: u64 = 7617;

/// Observation field "Voucher Specimen Taken".
pub const VOUCHER_FIELD: u64 = 1162;

/// Observation field for an accession in the observer's personal herbarium.
pub const PERSONAL_ACCESSION_FIELD: u64 = 7627;

/// Observation field "Herbarium Name".
pub const HERBARIUM_NAME_FIELD: u64 = 9539;

/// Observation field "Herbarium Catalog Number".
pub const HERBARIUM_CATALOG_FIELD: u64 = 9540;

/// Observation field "GenBank Accession Number".
pub const GENBANK_FIELD: u64 = 7555;

/// Locus prefixes (lowercase) and the DNA barcode field each is stored in.
const LOCUS_FIELDS: [(&str, u64); 8] = [
    ("its", 2330),
    ("lsu", 14524),
    ("28s", 14524),
    ("rpb2", 14019),
    ("ssu", 14900),
    ("18s", 14900),
    ("tef1", 14901),
    ("tef-1", 14901),
];

/// Separator between independent sections of a notes/description body.
pub const SECTION_SEPARATOR: &str = "\n\n&#8212;\n\n";

const SOURCE_OBSERVATION_PREFIX: &str = "http://mushroomobserver.org/";

const INCOMPLETE_NOTICE: &str = "This observation is incompletely mirrored from Mushroom Observer. \
     Refresh soon to see the full observation.";

/// Accuracy in metres reported for observations with exact coordinates.
const EXACT_POSITION_ACCURACY: f64 = 20.0;

const EARTH_CIRCUMFERENCE_M: f64 = 40_042_000.0;
const EARTH_RADIUS_M: f64 = 6_371_000.0;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan.", "Feb.", "Mar.", "Apr.", "May", "Jun.", "Jul.", "Aug.", "Sep.", "Oct.", "Nov.", "Dec.",
];

const BINOMIAL_RANKS: [(&str, &str); 4] = [
    ("subgenus", "subg."),
    ("section", "sect."),
    ("subsection", "subsect."),
    ("series", "series"),
];

const TRINOMIAL_RANKS: [(&str, &str); 3] =
    [("subspecies", "subsp."), ("variety", "var."), ("form", "f.")];

static PARAGRAPH_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\s*/?\s*p\s*>").expect("valid paragraph regex"));
static BREAK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\s*br\s*/?\s*>").expect("valid break regex"));
static OBSERVATION_MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"_(obs (\d{1,7}))_").expect("valid observation mention regex")
});
static SPLIT_EMPHASIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<em>([a-zA-Z. ]+)_/_([a-zA-Z. ]+)</em>").expect("valid emphasis regex")
});
static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})").expect("valid date regex"));

/// Name with its author appended, but only for "sensu" authorities.
pub fn complete_name(name: &str, author: Option<&str>) -> String {
    match author {
        Some(author) if author.contains("sensu ") => format!("{name} {author}"),
        _ => name.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchInfo {
    /// Name as iNaturalist spells it.
    pub name: String,
    /// Rank implied by the Mushroom Observer spelling, when it carries one.
    pub rank: Option<&'static str>,
}

/// Rewrites a Mushroom Observer name into an iNaturalist search term and rank.
pub fn search_info(name: &str) -> SearchInfo {
    let (search, rank) = if let Some(stem) = name.strip_suffix(" group") {
        (stem.to_string(), Some("complex"))
    } else if let Some(at) = name.find(" group ") {
        (name[..at].to_string(), Some("complex"))
    } else if name.contains(" var. ") {
        (name.replace(" var. ", " "), Some("variety"))
    } else if name.contains(" subsp. ") {
        (name.replace(" subsp. ", " "), Some("subspecies"))
    } else if name.contains(" f. ") {
        (name.replace(" f. ", " "), Some("form"))
    } else if let Some(rest) = after(name, " sect. ") {
        (rest.to_string(), Some("section"))
    } else if let Some(rest) = after(name, " subg. ") {
        (rest.to_string(), Some("subgenus"))
    } else if let Some(rest) = after(name, " subsect. ") {
        (rest.to_string(), Some("subsection"))
    } else {
        (name.to_string(), None)
    };

    SearchInfo { name: search, rank }
}

fn after<'a>(haystack: &'a str, needle: &str) -> Option<&'a str> {
    haystack
        .find(needle)
        .map(|at| &haystack[at + needle.len()..])
}

/// First fungal/protozoan result whose name or matched term equals `search_name`.
pub fn search_match(search_name: &str, rank: Option<&str>, results: &[TaxonResult]) -> Option<u64> {
    results
        .iter()
        .filter(|taxon| rank.is_none_or(|rank| taxon.rank == rank))
        .filter(|taxon| {
            matches!(
                taxon.iconic_taxon_name.as_deref(),
                Some("Fungi") | Some("Protozoa")
            )
        })
        .find(|taxon| {
            taxon.name == search_name || taxon.matched_term.as_deref() == Some(search_name)
        })
        .map(|taxon| taxon.id)
}

/// Whether iNaturalist's resolved taxon spells the same name as Mushroom Observer.
pub fn names_match(source_name: &str, dest_name: &str, dest_rank: &str) -> bool {
    let words: Vec<&str> = source_name.split(' ').collect();

    if dest_rank == "complex" {
        return source_name == format!("{dest_name} group");
    }
    if let Some((_, abbr)) = BINOMIAL_RANKS.iter().find(|(rank, _)| *rank == dest_rank) {
        return words.len() == 3 && words[1] == *abbr && words[2] == dest_name;
    }
    if let Some((_, abbr)) = TRINOMIAL_RANKS.iter().find(|(rank, _)| *rank == dest_rank) {
        return words.len() == 4
            && words[2] == *abbr
            && format!("{} {} {}", words[0], words[1], words[3]) == dest_name;
    }
    source_name == dest_name
}

/// Half the largest extent, in metres, of a lat/long bounding box.
pub fn calculate_radius(north: f64, south: f64, east: f64, west: f64) -> f64 {
    let ns_height = ((north - south).abs() / 360.0) * EARTH_CIRCUMFERENCE_M;
    let ew_span = (east - west).abs() / 360.0;
    let ew_circumference = |lat: f64| 2.0 * std::f64::consts::PI * EARTH_RADIUS_M * lat.to_radians().cos();
    let upper_ew_width = ew_span * ew_circumference(north);
    let lower_ew_width = ew_span * ew_circumference(south);

    ns_height.max(upper_ew_width).max(lower_ew_width) / 2.0
}

/// Strips paragraph markup and collapses blank lines.
pub fn clean_up_notes(notes: &str) -> String {
    let notes = PARAGRAPH_TAG.replace_all(notes, "");
    let notes = BREAK_TAG.replace_all(&notes, "\n");
    notes.replace("\n\n", "\n").trim().to_string()
}

/// Turns `_obs 123_` mentions into links and splits `<em>a_/_b</em>` pairs.
pub fn process_notes(notes: &str) -> String {
    let linked = OBSERVATION_MENTION.replace_all(
        notes,
        r#"<a href="https://www.mushroomobserver.org/$2">$1</a>"#,
    );
    SPLIT_EMPHASIS
        .replace_all(&linked, "<em>$1</em>/<em>$2</em>")
        .into_owned()
}

pub fn link_addendum(web_url: &Url, destination_id: u64, date: &str) -> String {
    let base = web_url.as_str().trim_end_matches('/');
    format!(
        "Mirrored on iNaturalist as <a href=\"{base}/observations/{destination_id}\">observation {destination_id}</a> on {date}."
    )
}

/// Joins `addendum` onto `original` as a new section.
pub fn append_section(original: &str, addendum: &str) -> String {
    if original.is_empty() {
        addendum.to_string()
    } else {
        format!("{original}{SECTION_SEPARATOR}{addendum}")
    }
}

/// Long-form date used in link notes, e.g. "October 19, 2026".
pub fn long_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// "Dec. 28, 2012" from an ISO date or timestamp.
pub fn prettify_date(raw: &str) -> Option<String> {
    let caps = ISO_DATE.captures(raw)?;
    let month: usize = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    let abbr = MONTH_ABBREVIATIONS.get(month.checked_sub(1)?)?;
    Some(format!("{abbr} {day}, {}", &caps[1]))
}

/// Source id encoded in a "Mushroom Observer URL" field value.
pub fn source_id_from_url(value: &str) -> Option<u64> {
    let path = value.split('?').next()?;
    let last = path.rsplit('/').next()?;
    if last.is_empty() || !last.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    last.parse().ok()
}

/// Body of the skeleton observation created before anything else is attached.
pub fn creation_payload(obs: &MoObservation, taxon_id: u64) -> Value {
    let mut params = json!({
        "taxon_id": taxon_id,
        "observed_on_string": obs.date,
        "place_guess": obs.location.name,
        "description": INCOMPLETE_NOTICE,
        "geoprivacy": if obs.gps_hidden { "obscured" } else { "open" },
    });

    if let Some((lat, lng, accuracy)) = position(obs) {
        params["latitude"] = json!(lat);
        params["longitude"] = json!(lng);
        params["positional_accuracy"] = json!(accuracy);
    }

    json!({ "observation": params })
}

fn position(obs: &MoObservation) -> Option<(f64, f64, f64)> {
    if let (Some(lat), Some(lng)) = (obs.latitude, obs.longitude) {
        return Some((lat, lng, EXACT_POSITION_ACCURACY));
    }

    let loc = &obs.location;
    let north = loc.latitude_north?;
    let south = loc.latitude_south?;
    let east = loc.longitude_east?;
    let west = loc.longitude_west?;
    Some((
        (north + south) / 2.0,
        (east + west) / 2.0,
        calculate_radius(north, south, east, west),
    ))
}

/// A sequence as it is described in the notes rather than (or as well as) in a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceNote {
    pub locus: String,
    pub bases: Option<String>,
    pub genbank_accession: Option<String>,
    pub notes: Option<String>,
}

impl SequenceNote {
    fn from_sequence(seq: &MoSequence) -> Self {
        let genbank_accession = seq
            .archive
            .as_deref()
            .filter(|archive| *archive == "GenBank")
            .and_then(|_| seq.accession.clone());
        Self {
            locus: seq.locus.clone(),
            bases: seq.bases.clone(),
            genbank_accession,
            notes: seq.notes.as_deref().map(clean_up_notes),
        }
    }

    /// "ITS: <a …>GenBank X</a>. notes"
    fn summary(&self) -> String {
        let genbank = self.genbank_accession.as_ref().map(|accession| {
            format!("<a href=\"https://www.ncbi.nlm.nih.gov/nuccore/{accession}\">GenBank {accession}</a>")
        });
        let parts: Vec<&str> = [genbank.as_deref(), self.notes.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect();
        format!("{}: {}", self.locus, parts.join(". "))
    }
}

/// Field values keyed by field id, plus whatever did not fit a field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservationFields {
    pub values: BTreeMap<u64, String>,
    /// `(herbarium, accession)` pairs beyond the first of each kind.
    pub unfielded_specimens: Vec<(String, String)>,
    pub fielded_sequences: Vec<SequenceNote>,
    pub unfielded_sequences: Vec<SequenceNote>,
}

fn locus_field(locus: &str) -> Option<u64> {
    let locus = locus.to_ascii_lowercase();
    LOCUS_FIELDS
        .iter()
        .find(|(prefix, _)| locus.starts_with(prefix))
        .map(|(_, field)| *field)
}

/// Observation field values for `obs`. `username` identifies the observer's personal herbarium.
pub fn observation_fields(obs: &MoObservation, username: &str) -> ObservationFields {
    let mut fields = ObservationFields::default();
    let values = &mut fields.values;
    values.insert(SOURCE_URL_FIELD, format!("{SOURCE_OBSERVATION_PREFIX}{}", obs.id));

    if let Some(first) = obs.collection_numbers.first() {
        values.insert(COLLECTION_NUMBER_FIELD, first.number.clone());
    }

    if !obs.herbarium_records.is_empty() {
        values.insert(VOUCHER_FIELD, "Yes".to_string());
    }
    let personal = format!("({}): personal herbarium", username.to_lowercase());
    for record in &obs.herbarium_records {
        let name = &record.herbarium.name;
        let accession = &record.accession_number;
        let is_personal = !username.is_empty() && name.to_lowercase().contains(&personal);

        if is_personal && !values.contains_key(&PERSONAL_ACCESSION_FIELD) {
            values.insert(PERSONAL_ACCESSION_FIELD, accession.clone());
        } else if is_personal {
            fields
                .unfielded_specimens
                .push((format!("Personal Herbarium ({username})"), accession.clone()));
        } else if !values.contains_key(&HERBARIUM_NAME_FIELD) {
            values.insert(HERBARIUM_NAME_FIELD, name.clone());
            values.insert(HERBARIUM_CATALOG_FIELD, accession.clone());
        } else {
            fields.unfielded_specimens.push((name.clone(), accession.clone()));
        }
    }

    for seq in &obs.sequences {
        let note = SequenceNote::from_sequence(seq);
        if let Some(accession) = &note.genbank_accession {
            values.insert(GENBANK_FIELD, accession.clone());
        }

        let bases = seq.bases.as_deref().filter(|bases| !bases.is_empty());
        match (locus_field(&seq.locus), bases) {
            (Some(field), Some(bases)) if !values.contains_key(&field) => {
                values.insert(field, bases.to_string());
                fields.fielded_sequences.push(note);
            }
            _ => fields.unfielded_sequences.push(note),
        }
    }

    fields
}

/// Short proposal text naming the Mushroom Observer consensus.
pub fn proposal_body(obs: &MoObservation) -> String {
    let name = complete_name(&obs.consensus.name, obs.consensus.author.as_deref());
    format!("<b><i>{name}</i></b> is the consensus on Mushroom Observer")
}

pub fn identification_payload(observation_id: u64, taxon_id: Option<u64>, body: &str) -> Value {
    json!({
        "identification": {
            "observation_id": observation_id,
            "taxon_id": taxon_id.unwrap_or(LIFE_TAXON_ID),
            "current": true,
            "body": body,
        }
    })
}

/// Final description: notes, image captions, leftover specimens and sequences, then the
/// original posting date.
pub fn description_payload(obs: &MoObservation, fields: &ObservationFields) -> Value {
    let notes = obs.notes.as_deref().map(process_notes).unwrap_or_default();

    let captions = obs
        .all_images()
        .enumerate()
        .filter_map(|(i, image)| {
            let caption = clean_up_notes(image.notes.as_deref().unwrap_or_default());
            (!caption.is_empty()).then(|| format!("Image #{}: {caption}", i + 1))
        })
        .collect::<Vec<_>>()
        .join("\n");

    let specimens = if fields.unfielded_specimens.is_empty() {
        String::new()
    } else {
        let lines: Vec<String> = fields
            .unfielded_specimens
            .iter()
            .map(|(herbarium, accession)| format!("{herbarium}: {accession}"))
            .collect();
        format!(
            "Additional specimens not added to iNat observation fields:\n{}",
            lines.join("\n")
        )
    };

    let fielded_sequences = if fields.fielded_sequences.is_empty() {
        String::new()
    } else {
        let lines: Vec<String> = fields.fielded_sequences.iter().map(SequenceNote::summary).collect();
        format!(
            "Additional notes for sequences (bases on the right):\n\n{}",
            lines.join("\n")
        )
    };

    let unfielded_sequences = if fields.unfielded_sequences.is_empty() {
        String::new()
    } else {
        let blocks: Vec<String> = fields
            .unfielded_sequences
            .iter()
            .map(|seq| format!("{}\n{}", seq.summary(), seq.bases.as_deref().unwrap_or_default()))
            .collect();
        format!("Additional sequences:\n\n{}", blocks.join("\n\n"))
    };

    let posted = format!(
        "Originally posted to Mushroom Observer on {}.",
        prettify_date(&obs.created_at).unwrap_or_else(|| "(unknown date)".to_string())
    );

    let description = [notes, captions, specimens, fielded_sequences, unfielded_sequences, posted]
        .into_iter()
        .filter(|section| !section.is_empty())
        .collect::<Vec<_>>()
        .join(SECTION_SEPARATOR);

    json!({
        "observation": { "description": description },
        "ignore_photos": "1",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use obsmirror_schema::{
        MoCollectionNumber, MoHerbarium, MoHerbariumRecord, MoImage, MoLocation,
    };

    fn taxon(id: u64, name: &str, rank: &str, iconic: &str, matched: Option<&str>) -> TaxonResult {
        TaxonResult {
            id,
            name: name.to_string(),
            rank: rank.to_string(),
            iconic_taxon_name: Some(iconic.to_string()),
            matched_term: matched.map(str::to_string),
        }
    }

    #[test]
    fn author_kept_only_for_sensu() {
        assert_eq!(complete_name("Russula", Some("Pers.")), "Russula");
        assert_eq!(
            complete_name("Amanita muscaria", Some("sensu lato")),
            "Amanita muscaria sensu lato"
        );
        assert_eq!(complete_name("Boletus", None), "Boletus");
    }

    #[test]
    fn search_info_parses_infrageneric_ranks() {
        let cases = [
            ("Amanita muscaria group", "Amanita muscaria", Some("complex")),
            ("Amanita muscaria var. guessowii", "Amanita muscaria guessowii", Some("variety")),
            ("Suillus luteus subsp. x", "Suillus luteus x", Some("subspecies")),
            ("Russula emetica f. alba", "Russula emetica alba", Some("form")),
            ("Amanita sect. Vaginatae", "Vaginatae", Some("section")),
            ("Cortinarius subg. Telamonia", "Telamonia", Some("subgenus")),
            ("Russula subsect. Foetentinae", "Foetentinae", Some("subsection")),
            ("Boletus edulis", "Boletus edulis", None),
        ];
        for (input, name, rank) in cases {
            let info = search_info(input);
            assert_eq!(info.name, name, "{input}");
            assert_eq!(info.rank, rank, "{input}");
        }
    }

    #[test]
    fn search_match_requires_fungal_iconic_taxon_and_rank() {
        let results = vec![
            taxon(1, "Boletus edulis", "species", "Plantae", None),
            taxon(2, "Boletus edulis", "variety", "Fungi", None),
            taxon(3, "Boletus edulis", "species", "Fungi", None),
        ];
        assert_eq!(search_match("Boletus edulis", Some("species"), &results), Some(3));
        assert_eq!(search_match("Boletus edulis", None, &results), Some(2));
        assert_eq!(search_match("Boletus", None, &results), None);
    }

    #[test]
    fn search_match_accepts_matched_term_synonyms() {
        let results = vec![taxon(7, "Imleria badia", "species", "Fungi", Some("Boletus badius"))];
        assert_eq!(search_match("Boletus badius", None, &results), Some(7));
    }

    #[test]
    fn names_match_by_rank() {
        assert!(names_match("Amanita muscaria group", "Amanita muscaria", "complex"));
        assert!(names_match("Amanita sect. Vaginatae", "Vaginatae", "section"));
        assert!(names_match("Amanita muscaria var. guessowii", "Amanita muscaria guessowii", "variety"));
        assert!(names_match("Boletus edulis", "Boletus edulis", "species"));
        assert!(!names_match("Boletus edulis", "Boletus", "genus"));
        assert!(!names_match("Amanita sect. Vaginatae", "Amanita", "section"));
    }

    #[test]
    fn radius_is_half_the_larger_extent() {
        let radius = calculate_radius(1.0, 0.0, 0.0, 0.0);
        assert!((radius - EARTH_CIRCUMFERENCE_M / 720.0).abs() < 1e-6);

        assert_eq!(calculate_radius(10.0, 10.0, 5.0, 5.0), 0.0);
        assert!(calculate_radius(45.0, 44.0, -120.0, -122.0) > calculate_radius(45.0, 44.0, -120.0, -120.5));
    }

    #[test]
    fn notes_lose_paragraph_markup() {
        assert_eq!(clean_up_notes("<p>Under oak.</p><br/>Smell of anise."), "Under oak.\nSmell of anise.");
        assert_eq!(clean_up_notes(""), "");
    }

    #[test]
    fn notes_link_observation_mentions() {
        assert_eq!(
            process_notes("see _obs 1234_ and <em>A_/_B</em>"),
            "see <a href=\"https://www.mushroomobserver.org/1234\">obs 1234</a> and <em>A</em>/<em>B</em>"
        );
    }

    #[test]
    fn link_addendum_joins_as_new_section() {
        let web = Url::parse("https://www.inaturalist.org/").unwrap();
        let addendum = link_addendum(&web, 42, "October 19, 2026");
        assert_eq!(
            addendum,
            "Mirrored on iNaturalist as <a href=\"https://www.inaturalist.org/observations/42\">observation 42</a> on October 19, 2026."
        );
        assert_eq!(append_section("", &addendum), addendum);
        assert_eq!(
            append_section("Old notes", "new"),
            "Old notes\n\n&#8212;\n\nnew"
        );
    }

    #[test]
    fn dates_render() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 9).unwrap();
        assert_eq!(long_date(day), "October 9, 2026");
        assert_eq!(prettify_date("2012-12-08T04:22:34.000Z").as_deref(), Some("Dec. 8, 2012"));
        assert_eq!(prettify_date("yesterday"), None);
        assert_eq!(prettify_date("2012-13-01"), None);
    }

    #[test]
    fn source_ids_come_from_url_tails() {
        assert_eq!(source_id_from_url("http://mushroomobserver.org/123456"), Some(123456));
        assert_eq!(source_id_from_url("https://mushroomobserver.org/obs/77?q=1"), Some(77));
        assert_eq!(source_id_from_url("https://mushroomobserver.org/"), None);
        assert_eq!(source_id_from_url("not a url"), None);
    }

    #[test]
    fn creation_payload_prefers_exact_coordinates() {
        let obs = MoObservation {
            id: 5,
            date: "2021-09-14".into(),
            latitude: Some(45.5),
            longitude: Some(-122.6),
            gps_hidden: true,
            location: MoLocation {
                name: "Portland, Oregon, USA".into(),
                ..Default::default()
            },
            ..Default::default()
        };

        let payload = creation_payload(&obs, 48715);
        let params = &payload["observation"];
        assert_eq!(params["taxon_id"], 48715);
        assert_eq!(params["latitude"], 45.5);
        assert_eq!(params["positional_accuracy"], EXACT_POSITION_ACCURACY);
        assert_eq!(params["geoprivacy"], "obscured");
        assert_eq!(params["place_guess"], "Portland, Oregon, USA");
    }

    #[test]
    fn creation_payload_falls_back_to_location_box() {
        let obs = MoObservation {
            id: 6,
            location: MoLocation {
                name: "Somewhere".into(),
                latitude_north: Some(46.0),
                latitude_south: Some(44.0),
                longitude_east: Some(-120.0),
                longitude_west: Some(-122.0),
            },
            ..Default::default()
        };

        let params = &creation_payload(&obs, LIFE_TAXON_ID)["observation"];
        assert_eq!(params["latitude"], 45.0);
        assert_eq!(params["longitude"], -121.0);
        assert_eq!(params["geoprivacy"], "open");
        assert!(params["positional_accuracy"].as_f64().unwrap() > 100_000.0);
    }

    #[test]
    fn fields_carry_source_url_and_first_collection_number() {
        let obs = MoObservation {
            id: 321,
            collection_numbers: vec![
                MoCollectionNumber { number: "JD-1".into() },
                MoCollectionNumber { number: "JD-2".into() },
            ],
            ..Default::default()
        };

        let fields = observation_fields(&obs, "jdoe").values;
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[&SOURCE_URL_FIELD], "http://mushroomobserver.org/321");
        assert_eq!(fields[&COLLECTION_NUMBER_FIELD], "JD-1");
        assert_eq!(source_id_from_url(&fields[&SOURCE_URL_FIELD]), Some(321));
    }

    #[test]
    fn identification_defaults_to_life() {
        let payload = identification_payload(9, None, "");
        assert_eq!(payload["identification"]["taxon_id"], LIFE_TAXON_ID);
        assert_eq!(payload["identification"]["current"], true);
    }

    #[test]
    fn description_sections_are_separated() {
        let obs = MoObservation {
            id: 1,
            created_at: "2012-12-28T04:22:34.000Z".into(),
            notes: Some("Under oak.".into()),
            primary_image: Some(MoImage {
                original_url: "https://example.org/1.jpg".into(),
                notes: Some("cap".into()),
            }),
            images: vec![MoImage {
                original_url: "https://example.org/2.jpg".into(),
                notes: None,
            }],
            ..Default::default()
        };

        let payload = description_payload(&obs, &ObservationFields::default());
        assert_eq!(payload["ignore_photos"], "1");
        assert_eq!(
            payload["observation"]["description"],
            "Under oak.\n\n&#8212;\n\nImage #1: cap\n\n&#8212;\n\nOriginally posted to Mushroom Observer on Dec. 28, 2012."
        );
    }

    fn herbarium(name: &str, accession: &str) -> MoHerbariumRecord {
        MoHerbariumRecord {
            herbarium: MoHerbarium { name: name.into() },
            accession_number: accession.into(),
        }
    }

    fn sequence(locus: &str, bases: Option<&str>, genbank: Option<&str>) -> MoSequence {
        MoSequence {
            locus: locus.into(),
            bases: bases.map(str::to_string),
            archive: genbank.map(|_| "GenBank".to_string()),
            accession: genbank.map(str::to_string),
            notes: None,
        }
    }

    #[test]
    fn specimens_fill_personal_and_institutional_fields_once() {
        let obs = MoObservation {
            id: 1,
            herbarium_records: vec![
                herbarium("Jane Doe (JDoe): Personal Herbarium", "JD-1"),
                herbarium("NY Botanical Garden", "NY-7"),
                herbarium("Jane Doe (jdoe): Personal Herbarium", "JD-2"),
                herbarium("Field Museum", "F-3"),
            ],
            ..Default::default()
        };

        let fields = observation_fields(&obs, "jdoe");
        assert_eq!(fields.values[&VOUCHER_FIELD], "Yes");
        assert_eq!(fields.values[&PERSONAL_ACCESSION_FIELD], "JD-1");
        assert_eq!(fields.values[&HERBARIUM_NAME_FIELD], "NY Botanical Garden");
        assert_eq!(fields.values[&HERBARIUM_CATALOG_FIELD], "NY-7");
        assert_eq!(
            fields.unfielded_specimens,
            vec![
                ("Personal Herbarium (jdoe)".to_string(), "JD-2".to_string()),
                ("Field Museum".to_string(), "F-3".to_string()),
            ]
        );
    }

    #[test]
    fn sequences_fill_one_field_per_locus() {
        let obs = MoObservation {
            id: 1,
            sequences: vec![
                sequence("ITS1-5.8S-ITS2", Some("ACGT"), Some("MN000001")),
                sequence("its", Some("TTTT"), None),
                sequence("28S LSU", Some("GGCC"), None),
                sequence("COX1", Some("AAAA"), None),
                sequence("tef-1a", None, Some("MN000002")),
            ],
            ..Default::default()
        };

        let fields = observation_fields(&obs, "jdoe");
        assert_eq!(fields.values[&2330], "ACGT");
        assert_eq!(fields.values[&14524], "GGCC");
        assert!(!fields.values.contains_key(&14901));
        assert_eq!(fields.values[&GENBANK_FIELD], "MN000002");
        assert!(!fields.values.contains_key(&VOUCHER_FIELD));

        let fielded: Vec<&str> = fields.fielded_sequences.iter().map(|s| s.locus.as_str()).collect();
        assert_eq!(fielded, vec!["ITS1-5.8S-ITS2", "28S LSU"]);
        let unfielded: Vec<&str> = fields.unfielded_sequences.iter().map(|s| s.locus.as_str()).collect();
        assert_eq!(unfielded, vec!["its", "COX1", "tef-1a"]);
    }

    #[test]
    fn description_lists_what_did_not_fit_a_field() {
        let obs = MoObservation {
            id: 1,
            created_at: "2012-12-08".into(),
            herbarium_records: vec![
                herbarium("NY Botanical Garden", "NY-7"),
                herbarium("Field Museum", "F-3"),
            ],
            sequences: vec![
                sequence("ITS", Some("ACGT"), Some("MN1")),
                sequence("COX1", Some("AAAA"), None),
            ],
            ..Default::default()
        };
        let fields = observation_fields(&obs, "jdoe");

        let payload = description_payload(&obs, &fields);
        assert_eq!(
            payload["observation"]["description"],
            "Additional specimens not added to iNat observation fields:\nField Museum: F-3\
             \n\n&#8212;\n\n\
             Additional notes for sequences (bases on the right):\n\n\
             ITS: <a href=\"https://www.ncbi.nlm.nih.gov/nuccore/MN1\">GenBank MN1</a>\
             \n\n&#8212;\n\n\
             Additional sequences:\n\nCOX1: \nAAAA\
             \n\n&#8212;\n\n\
             Originally posted to Mushroom Observer on Dec. 8, 2012."
        );
    }
}
