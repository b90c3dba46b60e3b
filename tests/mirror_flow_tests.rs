use async_trait::async_trait;
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use obsmirror::config::Config;
use obsmirror::mirror::{Credentials, Mirror};
use obsmirror::transport::{CarefulClient, Clock, FileDiagnosticSink};
use obsmirror::{CarefulRequestError, INaturalistClient, MirrorError, MushroomObserverClient};
use serde_json::{Value, json};
use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};
use tokio::net::TcpListener;
use url::Url;

const JWT: &str = "jwt-good";
const API_KEY: &str = "key-good";
const CREATED_ID: u64 = 900;
const IMAGE_BYTES: usize = 6000;

#[derive(Debug)]
struct TestClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
}

#[async_trait]
impl Clock for TestClock {
    fn now(&self) -> Instant {
        self.origin + *self.elapsed.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        *self.elapsed.lock().unwrap() += duration;
    }
}

#[derive(Debug, Clone)]
struct Captured {
    method: Method,
    path: String,
    query: HashMap<String, String>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Captured {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("captured body is json")
    }
}

#[derive(Clone, Default)]
struct FakePlatforms {
    reqs: Arc<Mutex<Vec<Captured>>>,
    source_base: Arc<Mutex<String>>,
    drop_identifications: Arc<AtomicBool>,
    /// Replaces the answer to every field value post.
    field_value_answer: Arc<Mutex<Option<(StatusCode, String)>>>,
}

impl FakePlatforms {
    fn captured(&self, method: Method, path: &str) -> Vec<Captured> {
        self.reqs
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .cloned()
            .collect()
    }

    fn observation(&self, id: u64) -> Value {
        let base = self.source_base.lock().unwrap().clone();
        let consensus = match id {
            3 => json!({"name": "Boletus fakeus", "author": "Nobody"}),
            _ => json!({"name": "Amanita muscaria", "author": "(L.) Lam."}),
        };
        json!({
            "id": id,
            "date": "2021-09-14",
            "created_at": "2021-09-15T10:00:00.000Z",
            "location": {
                "name": "Portland, Oregon, USA",
                "latitude_north": "46.0",
                "latitude_south": "45.0",
                "longitude_east": "-122.0",
                "longitude_west": "-123.0"
            },
            "consensus": consensus,
            "notes": "<p>Under oak.</p>",
            "primary_image": {"original_url": format!("{base}/images/{id}.jpg"), "notes": "cap"},
            "images": [],
            "collection_numbers": [{"number": format!("AM-{id}")}]
        })
    }
}

fn json_response(value: Value) -> Response {
    (StatusCode::OK, value.to_string()).into_response()
}

async fn handle(
    State(state): State<FakePlatforms>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let query: HashMap<String, String> = url::form_urlencoded::parse(uri.query().unwrap_or("").as_bytes())
        .into_owned()
        .collect();
    let path = uri.path().to_string();
    state.reqs.lock().unwrap().push(Captured {
        method: method.clone(),
        path: path.clone(),
        query: query.clone(),
        headers: headers.clone(),
        body: body.to_vec(),
    });

    let authorized = headers
        .get("authorization")
        .is_some_and(|v| v.as_bytes() == JWT.as_bytes());
    let needs_auth = method != Method::GET && path.starts_with("/v1/");
    let q = |k: &str| query.get(k).map(String::as_str);

    match (method, path.as_str()) {
        (Method::GET, "/api2/observations") => {
            if let Some(id) = q("id") {
                let id: u64 = id.parse().unwrap();
                json_response(json!({"results": [state.observation(id)]}))
            } else if q("detail") == Some("none") {
                let results = if q("page") == Some("1") { json!([1, "2", 3]) } else { json!([]) };
                json_response(json!({"results": results}))
            } else if q("detail") == Some("high") {
                let results = if q("page") == Some("1") {
                    json!([state.observation(1), state.observation(2), state.observation(3)])
                } else {
                    json!([])
                };
                json_response(json!({"results": results}))
            } else if q("api_key") == Some(API_KEY) {
                json_response(json!({"results": []}))
            } else {
                json_response(json!({"errors": [{"code": "BadApiKey", "details": "Bad key."}]}))
            }
        }
        (Method::PATCH, "/api2/observations") => {
            if q("api_key") == Some(API_KEY) {
                json_response(json!({"results": []}))
            } else {
                json_response(json!({"errors": [{"code": "BadApiKey", "details": "Bad key."}]}))
            }
        }
        (Method::GET, p) if p.starts_with("/images/") => {
            (StatusCode::OK, vec![0xFF_u8; IMAGE_BYTES]).into_response()
        }
        (Method::GET, "/v1/users/me") => {
            if authorized {
                json_response(json!({"total_results": 1, "results": [{"login": "Alice"}]}))
            } else {
                (StatusCode::UNAUTHORIZED, "{}").into_response()
            }
        }
        (Method::GET, "/v1/observations") => {
            let results = if q("page") == Some("1") {
                json!([{
                    "id": 700,
                    "ofvs": [
                        {"field_id": 5005, "value": "http://mushroomobserver.org/1"},
                        {"field_id": 7617, "value": 12}
                    ]
                }])
            } else {
                json!([])
            };
            json_response(json!({"results": results}))
        }
        (Method::GET, "/v1/taxa") => {
            let results = match q("q") {
                Some("Boletus") => json!([
                    {"id": 48701, "name": "Boletus", "rank": "genus", "iconic_taxon_name": "Fungi"}
                ]),
                _ => json!([]),
            };
            json_response(json!({"results": results}))
        }
        _ if needs_auth && !authorized => {
            (StatusCode::UNAUTHORIZED, "{}").into_response()
        }
        (Method::POST, "/v1/observations") => json_response(json!({"id": CREATED_ID})),
        (Method::POST, "/v1/observation_field_values") => {
            match state.field_value_answer.lock().unwrap().clone() {
                Some(answer) => answer.into_response(),
                None => json_response(json!({"id": 1})),
            }
        }
        (Method::POST, "/v1/observation_photos") => json_response(json!({"id": 2})),
        (Method::PUT, p) if p.starts_with("/v1/identifications/") => json_response(json!({})),
        (Method::GET, p) if p.starts_with("/v1/observations/") => {
            let identifications = if state.drop_identifications.load(Ordering::SeqCst) {
                json!([])
            } else {
                json!([{
                    "id": 55,
                    "taxon_id": 48715,
                    "taxon": {"name": "Amanita muscaria", "rank": "species"}
                }])
            };
            json_response(json!({"results": [{"id": CREATED_ID, "identifications": identifications}]}))
        }
        (Method::PUT, p) if p.starts_with("/v1/observations/") => json_response(json!({})),
        (Method::DELETE, p) if p.starts_with("/v1/observations/") => {
            (StatusCode::OK, "").into_response()
        }
        _ => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

async fn spawn_test_server(state: FakePlatforms) -> Url {
    let app = Router::new().fallback(handle).with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    let base = Url::parse(&format!("http://{}", addr)).expect("valid base url");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    base
}

struct Harness {
    fake: FakePlatforms,
    cfg: Config,
    source: MushroomObserverClient,
    destination: INaturalistClient,
}

impl Harness {
    async fn start() -> Self {
        let fake = FakePlatforms::default();
        let src_url = spawn_test_server(fake.clone()).await;
        let dest_url = spawn_test_server(fake.clone()).await;
        *fake.source_base.lock().unwrap() = src_url.as_str().trim_end_matches('/').to_string();

        let mut cfg = Config::default();
        cfg.basic.diagnostic_dir = std::env::temp_dir();
        cfg.platforms.source.base_url = src_url;
        cfg.platforms.source.username = "alice_mo".to_string();
        cfg.platforms.source.api_key = API_KEY.to_string();
        cfg.platforms.destination.base_url = dest_url.clone();
        cfg.platforms.destination.web_url = dest_url;
        cfg.platforms.destination.username = "alice".to_string();
        cfg.platforms.destination.jwt = JWT.to_string();
        cfg.mirror.pause_between_ms = 0;
        cfg.mirror
            .taxon_dictionary
            .insert("Amanita muscaria".to_string(), 48715);

        let clock = Arc::new(TestClock {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        });
        let careful = Arc::new(CarefulClient::new(
            reqwest::Client::new(),
            cfg.service_registry(),
            &cfg.request_policy(),
            clock,
            Arc::new(FileDiagnosticSink::in_dir(&cfg.basic.diagnostic_dir)),
        ));
        let source = MushroomObserverClient::new(careful.clone(), &cfg.source()).expect("source client");
        let destination = INaturalistClient::new(careful, &cfg.destination()).expect("destination client");

        Self {
            fake,
            cfg,
            source,
            destination,
        }
    }

    fn mirror(&self) -> Mirror {
        Mirror::new(
            self.source.clone(),
            self.destination.clone(),
            Credentials::from_config(&self.cfg),
            self.cfg.mirror.clone(),
            self.cfg.platforms.source.page_size,
        )
    }
}

#[tokio::test]
async fn credentials_are_confirmed_against_both_platforms() {
    let h = Harness::start().await;

    assert!(h.source.confirm_api_key("alice_mo", API_KEY).await.unwrap());
    assert!(!h.source.confirm_api_key("alice_mo", "stale").await.unwrap());

    assert!(h.destination.confirm_jwt(JWT, "alice").await.unwrap());
    assert!(!h.destination.confirm_jwt(JWT, "bob").await.unwrap());
    assert!(!h.destination.confirm_jwt("expired", "alice").await.unwrap());

    let confirm = &h.fake.captured(Method::GET, "/api2/observations")[0];
    assert_eq!(confirm.query["user"], "alice_mo");
    assert_eq!(confirm.query["format"], "json");
    assert_eq!(
        confirm.headers["user-agent"],
        "Mushroom Observer/iNaturalist Mirror"
    );
}

#[tokio::test]
async fn pending_excludes_already_mirrored_ids() {
    let h = Harness::start().await;

    let pending = h.mirror().pending().await.expect("pending");

    assert_eq!(pending.source_ids, vec![1, 2, 3]);
    assert_eq!(pending.mirrored, BTreeSet::from([1]));
    assert_eq!(pending.mirrorable, BTreeSet::from([2, 3]));
    assert_eq!(pending.start_page, 1);

    let listing = h.fake.captured(Method::GET, "/v1/observations");
    assert_eq!(listing.len(), 2);
    assert_eq!(listing[0].query["user_login"], "alice");
    assert_eq!(listing[0].query["per_page"], "200");
}

#[tokio::test]
async fn run_mirrors_one_observation_end_to_end() {
    let h = Harness::start().await;

    let summary = h
        .mirror()
        .run(1, std::future::pending::<()>())
        .await
        .expect("run succeeds");

    assert!(!summary.interrupted);
    assert_eq!(summary.mirrored.len(), 1);
    let record = &summary.mirrored[0];
    assert_eq!(record.source_id, 2);
    assert_eq!(record.destination_id, CREATED_ID);
    assert_eq!(record.taxon_id, 48715);
    assert_eq!(record.images, 1);
    assert_eq!(record.name_mismatch, None);

    let created = &h.fake.captured(Method::POST, "/v1/observations")[0];
    assert_eq!(created.headers["authorization"], JWT);
    assert_eq!(created.json()["observation"]["taxon_id"], 48715);
    assert_eq!(created.json()["observation"]["latitude"], 45.5);

    let fields: Vec<Value> = h
        .fake
        .captured(Method::POST, "/v1/observation_field_values")
        .iter()
        .map(|c| c.json()["observation_field_value"].clone())
        .collect();
    assert_eq!(fields.len(), 2);
    assert!(fields.iter().any(|f| f["observation_field_id"] == 5005
        && f["value"] == "http://mushroomobserver.org/2"));
    assert!(fields.iter().any(|f| f["observation_field_id"] == 7617 && f["value"] == "AM-2"));

    let ident = &h.fake.captured(Method::PUT, "/v1/identifications/55")[0];
    assert_eq!(ident.json()["identification"]["taxon_id"], 48715);

    let photos = h.fake.captured(Method::POST, "/v1/observation_photos");
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].query["observation_photo[observation_id]"], "900");
    assert!(photos[0].body.len() > IMAGE_BYTES);

    let described = &h.fake.captured(Method::PUT, "/v1/observations/900")[0];
    assert_eq!(described.json()["ignore_photos"], "1");

    let patch = &h.fake.captured(Method::PATCH, "/api2/observations")[0];
    assert_eq!(patch.query["id"], "2");
    assert_eq!(patch.query["log"], "no");
    let notes = &patch.query["set_notes"];
    assert!(notes.starts_with("Under oak.\n\n&#8212;\n\nMirrored on iNaturalist as"));
    assert!(notes.contains("/observations/900\">observation 900</a>"));

    assert!(h.fake.captured(Method::DELETE, "/v1/observations/900").is_empty());
}

#[tokio::test]
async fn unknown_names_fall_back_to_genus_and_report_mismatch() {
    let h = Harness::start().await;

    let summary = h
        .mirror()
        .run(10, std::future::pending::<()>())
        .await
        .expect("run succeeds");

    let ids: Vec<u64> = summary.mirrored.iter().map(|r| r.source_id).collect();
    assert_eq!(ids, vec![2, 3]);

    let boletus = &summary.mirrored[1];
    assert_eq!(boletus.taxon_id, 48701);
    let mismatch = boletus.name_mismatch.as_ref().expect("names differ");
    assert_eq!(mismatch.source_name, "Boletus fakeus");
    assert_eq!(mismatch.destination_name, "Amanita muscaria");

    let searches: Vec<String> = h
        .fake
        .captured(Method::GET, "/v1/taxa")
        .iter()
        .map(|c| c.query["q"].clone())
        .collect();
    assert_eq!(searches, vec!["Boletus fakeus", "Boletus"]);
}

#[tokio::test]
async fn shutdown_between_observations_stops_the_run() {
    let h = Harness::start().await;

    let summary = h
        .mirror()
        .run(10, std::future::ready(()))
        .await
        .expect("run succeeds");

    assert!(summary.interrupted);
    assert_eq!(summary.mirrored.len(), 1);
}

#[tokio::test]
async fn failed_step_deletes_the_skeleton() {
    let h = Harness::start().await;
    h.fake.drop_identifications.store(true, Ordering::SeqCst);
    let obs = h.source.observation(2).await.expect("observation");

    let err = h
        .mirror()
        .mirror_observation(&obs)
        .await
        .expect_err("no identification to rewrite");

    assert!(matches!(err, MirrorError::UnexpectedPayload { .. }));
    assert_eq!(h.fake.captured(Method::DELETE, "/v1/observations/900").len(), 1);
    assert!(h.fake.captured(Method::PATCH, "/api2/observations").is_empty());
}

#[tokio::test]
async fn keep_incomplete_leaves_the_skeleton() {
    let mut h = Harness::start().await;
    h.cfg.mirror.keep_incomplete = true;
    h.fake.drop_identifications.store(true, Ordering::SeqCst);
    let obs = h.source.observation(2).await.expect("observation");

    let err = h.mirror().mirror_observation(&obs).await;

    assert!(err.is_err());
    assert!(h.fake.captured(Method::DELETE, "/v1/observations/900").is_empty());
}

#[tokio::test]
async fn writes_without_a_valid_token_are_unauthorized() {
    let h = Harness::start().await;

    let err = h
        .destination
        .update_observation(CREATED_ID, json!({"observation": {}}), "expired")
        .await
        .expect_err("401");

    assert!(matches!(err, MirrorError::Unauthorized { .. }));
    assert_eq!(h.fake.captured(Method::PUT, "/v1/observations/900").len(), 1);
}

#[tokio::test]
async fn image_download_returns_raw_bytes() {
    let h = Harness::start().await;
    let base = h.fake.source_base.lock().unwrap().clone();
    let url = Url::parse(&format!("{base}/images/2.jpg")).unwrap();

    let bytes = h.source.download_image(&url).await.expect("download");

    assert_eq!(bytes.len(), IMAGE_BYTES);
}

fn requests_after_creation(fake: &FakePlatforms) -> Vec<(Method, String)> {
    let reqs = fake.reqs.lock().unwrap();
    let created = reqs
        .iter()
        .position(|c| c.method == Method::POST && c.path == "/v1/observations")
        .expect("skeleton created");
    reqs[created..]
        .iter()
        .map(|c| (c.method.clone(), c.path.clone()))
        .collect()
}

#[tokio::test]
async fn unparseable_response_leaves_the_skeleton_without_further_requests() {
    let h = Harness::start().await;
    *h.fake.field_value_answer.lock().unwrap() =
        Some((StatusCode::OK, "<html>proxy error page</html>".to_string()));
    let obs = h.source.observation(2).await.expect("observation");

    let err = h
        .mirror()
        .mirror_observation(&obs)
        .await
        .expect_err("broken response contract");

    assert!(matches!(
        err,
        MirrorError::Request(CarefulRequestError::UnparseableResponse { .. })
    ));
    assert_eq!(err.exit_status(), 1);
    assert_eq!(
        requests_after_creation(&h.fake),
        vec![
            (Method::POST, "/v1/observations".to_string()),
            (Method::POST, "/v1/observation_field_values".to_string()),
        ]
    );
}

#[tokio::test]
async fn exhausted_retries_leave_the_skeleton_without_further_requests() {
    let h = Harness::start().await;
    *h.fake.field_value_answer.lock().unwrap() =
        Some((StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string()));
    let obs = h.source.observation(2).await.expect("observation");

    let err = h
        .mirror()
        .mirror_observation(&obs)
        .await
        .expect_err("destination unreachable");

    assert!(matches!(
        err,
        MirrorError::Request(CarefulRequestError::AttemptsExhausted { attempts: 7, .. })
    ));
    assert_eq!(err.exit_status(), 0);
    assert_eq!(
        h.fake
            .captured(Method::POST, "/v1/observation_field_values")
            .len(),
        7
    );
    assert!(h.fake.captured(Method::DELETE, "/v1/observations/900").is_empty());
    assert_eq!(requests_after_creation(&h.fake).len(), 8);
}
