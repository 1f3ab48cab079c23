//! Integration tests: the real router over an in-memory store and a
//! seeded in-memory registry.

use std::sync::Arc;

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use obslog_core::{exposure::Exposure, obs_id::current_day_obs};
use obslog_store_sqlite::{SqliteMessageStore, SqliteRegistry};
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{AppState, api_router};

type TestState = AppState<SqliteMessageStore, SqliteRegistry>;

/// The one exposure every test registry knows about.
const KNOWN_OBS_ID: &str = "AT_O_20220208_000123";

fn known_exposure() -> Exposure {
  Exposure {
    obs_id:             KNOWN_OBS_ID.to_owned(),
    id:                 2022020800123,
    instrument:         "LATISS".to_owned(),
    observation_type:   "science".to_owned(),
    observation_reason: "science".to_owned(),
    day_obs:            20220208,
    seq_num:            123,
    group_name:         "group_1".to_owned(),
    target_name:        "NGC 300".to_owned(),
    science_program:    "survey".to_owned(),
    tracking_ra:        Some(13.7),
    tracking_dec:       Some(-37.6),
    sky_angle:          Some(90.0),
    timespan_begin:     Some(
      Utc.with_ymd_and_hms(2022, 2, 8, 3, 0, 0).unwrap(),
    ),
    timespan_end:       Some(
      Utc.with_ymd_and_hms(2022, 2, 8, 3, 0, 30).unwrap(),
    ),
  }
}

async fn make_state() -> TestState {
  let store = SqliteMessageStore::open_in_memory().await.unwrap();
  let registry = SqliteRegistry::open_in_memory().await.unwrap();
  registry.add_exposure(&known_exposure()).await.unwrap();

  AppState {
    site_id:       "test".to_owned(),
    store:         Arc::new(store),
    registries:    Arc::new(vec![registry]),
    registry_uris: Arc::new(vec!["registry-1.sqlite".to_owned()]),
  }
}

async fn request(
  state: TestState,
  method: &str,
  uri: &str,
  body: Option<Value>,
) -> axum::response::Response {
  let builder = Request::builder().method(method).uri(uri);
  let req = match body {
    Some(value) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(value.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };
  api_router(state).oneshot(req).await.unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

fn add_body(obs_id: &str, is_new: bool) -> Value {
  json!({
    "obs_id": obs_id,
    "instrument": "LATISS",
    "message_text": "wind gusts during exposure",
    "user_id": "alice",
    "user_agent": "obslog-tests",
    "is_human": true,
    "is_new": is_new,
  })
}

fn parse_dt(value: &Value) -> DateTime<Utc> {
  DateTime::parse_from_rfc3339(value.as_str().expect("timestamp string"))
    .expect("RFC 3339 timestamp")
    .with_timezone(&Utc)
}

// ─── POST /messages ──────────────────────────────────────────────────────────

#[tokio::test]
async fn add_with_registered_exposure_returns_201() {
  let state = make_state().await;
  let mut body = add_body(KNOWN_OBS_ID, false);
  body["tags"] = json!(["Dome", "WIND"]);

  let resp = request(state, "POST", "/messages", Some(body)).await;
  assert_eq!(resp.status(), StatusCode::CREATED);

  let message = body_json(resp).await;
  assert_eq!(message["site_id"], "test");
  // day_obs and seq_num come from the registry record.
  assert_eq!(message["day_obs"], 20220208);
  assert_eq!(message["seq_num"], 123);
  assert_eq!(message["is_valid"], true);
  assert_eq!(message["date_invalidated"], Value::Null);
  assert_eq!(message["parent_id"], Value::Null);
  assert_eq!(message["level"], 20);
  assert_eq!(message["exposure_flag"], "none");
  // Tags are normalized on write.
  assert_eq!(message["tags"], json!(["dome", "wind"]));
}

#[tokio::test]
async fn add_unknown_exposure_returns_404() {
  let state = make_state().await;
  let body = add_body("AT_O_20220208_000999", false);
  let resp = request(state, "POST", "/messages", Some(body)).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn add_unknown_instrument_returns_404() {
  let state = make_state().await;
  let mut body = add_body(KNOWN_OBS_ID, false);
  body["instrument"] = json!("NoSuchInstrument");
  let resp = request(state, "POST", "/messages", Some(body)).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn add_is_new_trusts_the_obs_id() {
  let state = make_state().await;
  let day_obs = current_day_obs(Utc::now());
  let obs_id = format!("AT_O_{day_obs}_000042");
  let before = Utc::now() - Duration::seconds(1);

  let resp =
    request(state, "POST", "/messages", Some(add_body(&obs_id, true)))
      .await;
  assert_eq!(resp.status(), StatusCode::CREATED);

  let message = body_json(resp).await;
  assert_eq!(message["day_obs"], day_obs);
  assert_eq!(message["seq_num"], 42);
  assert!(parse_dt(&message["date_added"]) >= before);
}

#[tokio::test]
async fn add_is_new_rejects_malformed_obs_id() {
  let state = make_state().await;
  let resp =
    request(state, "POST", "/messages", Some(add_body("not-an-id", true)))
      .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn add_rejects_invalid_tags() {
  let state = make_state().await;
  let mut body = add_body(KNOWN_OBS_ID, false);
  body["tags"] = json!(["ok_tag", "not valid"]);
  let resp = request(state, "POST", "/messages", Some(body)).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ─── GET /messages/:id ───────────────────────────────────────────────────────

#[tokio::test]
async fn get_round_trips_the_created_message() {
  let state = make_state().await;
  let created = body_json(
    request(
      state.clone(),
      "POST",
      "/messages",
      Some(add_body(KNOWN_OBS_ID, false)),
    )
    .await,
  )
  .await;

  let id = created["id"].as_str().unwrap();
  let resp = request(state, "GET", &format!("/messages/{id}"), None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let fetched = body_json(resp).await;
  assert_eq!(fetched, created);
}

#[tokio::test]
async fn get_missing_returns_404() {
  let state = make_state().await;
  let id = uuid::Uuid::new_v4();
  let resp = request(state, "GET", &format!("/messages/{id}"), None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ─── DELETE /messages/:id ────────────────────────────────────────────────────

#[tokio::test]
async fn delete_invalidates_and_is_idempotent() {
  let state = make_state().await;
  let created = body_json(
    request(
      state.clone(),
      "POST",
      "/messages",
      Some(add_body(KNOWN_OBS_ID, false)),
    )
    .await,
  )
  .await;
  let id = created["id"].as_str().unwrap().to_owned();

  let resp =
    request(state.clone(), "DELETE", &format!("/messages/{id}"), None)
      .await;
  assert_eq!(resp.status(), StatusCode::NO_CONTENT);

  let fetched = body_json(
    request(state.clone(), "GET", &format!("/messages/{id}"), None).await,
  )
  .await;
  assert_eq!(fetched["is_valid"], false);
  let stamp = fetched["date_invalidated"].clone();
  assert!(!stamp.is_null());

  // A second delete succeeds and leaves the timestamp untouched.
  let resp =
    request(state.clone(), "DELETE", &format!("/messages/{id}"), None)
      .await;
  assert_eq!(resp.status(), StatusCode::NO_CONTENT);
  let fetched = body_json(
    request(state, "GET", &format!("/messages/{id}"), None).await,
  )
  .await;
  assert_eq!(fetched["date_invalidated"], stamp);
}

#[tokio::test]
async fn delete_missing_returns_404() {
  let state = make_state().await;
  let id = uuid::Uuid::new_v4();
  let resp =
    request(state, "DELETE", &format!("/messages/{id}"), None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ─── PATCH /messages/:id ─────────────────────────────────────────────────────

#[tokio::test]
async fn edit_supersedes_the_parent() {
  let state = make_state().await;
  let parent = body_json(
    request(
      state.clone(),
      "POST",
      "/messages",
      Some(add_body(KNOWN_OBS_ID, false)),
    )
    .await,
  )
  .await;
  let parent_id = parent["id"].as_str().unwrap().to_owned();

  let resp = request(
    state.clone(),
    "PATCH",
    &format!("/messages/{parent_id}"),
    Some(json!({ "message_text": "wind gusts (corrected)" })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let child = body_json(resp).await;
  assert_eq!(child["parent_id"], json!(parent_id));
  assert_eq!(child["message_text"], "wind gusts (corrected)");
  assert_eq!(child["obs_id"], parent["obs_id"]);
  assert_eq!(child["is_valid"], true);

  let parent_now = body_json(
    request(state, "GET", &format!("/messages/{parent_id}"), None).await,
  )
  .await;
  assert_eq!(parent_now["is_valid"], false);
}

#[tokio::test]
async fn edit_missing_returns_404() {
  let state = make_state().await;
  let id = uuid::Uuid::new_v4();
  let resp = request(
    state,
    "PATCH",
    &format!("/messages/{id}"),
    Some(json!({ "message_text": "x" })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ─── GET /messages ───────────────────────────────────────────────────────────

#[tokio::test]
async fn find_hides_invalidated_messages_by_default() {
  let state = make_state().await;
  let first = body_json(
    request(
      state.clone(),
      "POST",
      "/messages",
      Some(add_body(KNOWN_OBS_ID, false)),
    )
    .await,
  )
  .await;
  request(
    state.clone(),
    "POST",
    "/messages",
    Some(add_body(KNOWN_OBS_ID, false)),
  )
  .await;
  let first_id = first["id"].as_str().unwrap();
  request(state.clone(), "DELETE", &format!("/messages/{first_id}"), None)
    .await;

  let found =
    body_json(request(state.clone(), "GET", "/messages", None).await).await;
  assert_eq!(found.as_array().unwrap().len(), 1);

  let found = body_json(
    request(state, "GET", "/messages?is_valid=either", None).await,
  )
  .await;
  assert_eq!(found.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn find_normalizes_tag_filters() {
  let state = make_state().await;
  let mut tagged = add_body(KNOWN_OBS_ID, false);
  tagged["tags"] = json!(["wind"]);
  request(state.clone(), "POST", "/messages", Some(tagged)).await;
  request(
    state.clone(),
    "POST",
    "/messages",
    Some(add_body(KNOWN_OBS_ID, false)),
  )
  .await;

  // The filter is normalized like stored tags, so case does not matter.
  let found = body_json(
    request(state, "GET", "/messages?tags=WIND", None).await,
  )
  .await;
  let found = found.as_array().unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0]["tags"], json!(["wind"]));
}

#[tokio::test]
async fn find_orders_by_descending_id() {
  let state = make_state().await;
  for _ in 0..3 {
    request(
      state.clone(),
      "POST",
      "/messages",
      Some(add_body(KNOWN_OBS_ID, false)),
    )
    .await;
  }

  let found = body_json(
    request(state, "GET", "/messages?order_by=-id", None).await,
  )
  .await;
  let ids: Vec<&str> = found
    .as_array()
    .unwrap()
    .iter()
    .map(|m| m["id"].as_str().unwrap())
    .collect();
  assert_eq!(ids.len(), 3);
  for pair in ids.windows(2) {
    assert!(pair[0] > pair[1]);
  }
}

#[tokio::test]
async fn find_rejects_unknown_order_by_field() {
  let state = make_state().await;
  let resp =
    request(state, "GET", "/messages?order_by=no_such_field", None).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn find_rejects_bad_pagination() {
  let state = make_state().await;
  let resp =
    request(state.clone(), "GET", "/messages?limit=1", None).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

  let resp = request(state, "GET", "/messages?offset=-1", None).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn find_rejects_malformed_tag_filter() {
  let state = make_state().await;
  let resp =
    request(state, "GET", "/messages?tags=not%20valid", None).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ─── GET /exposures ──────────────────────────────────────────────────────────

#[tokio::test]
async fn exposures_find_by_instrument() {
  let state = make_state().await;
  let found = body_json(
    request(state.clone(), "GET", "/exposures?instrument=LATISS", None)
      .await,
  )
  .await;
  let found = found.as_array().unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0]["obs_id"], KNOWN_OBS_ID);
  assert_eq!(found[0]["day_obs"], 20220208);

  // Unknown instrument: empty result, not an error.
  let found = body_json(
    request(state, "GET", "/exposures?instrument=LSSTCam", None).await,
  )
  .await;
  assert!(found.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn exposures_requires_instrument() {
  let state = make_state().await;
  let resp = request(state, "GET", "/exposures", None).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn exposures_validates_registry_selection() {
  let state = make_state().await;
  let resp = request(
    state.clone(),
    "GET",
    "/exposures?instrument=LATISS&registry=2",
    None,
  )
  .await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);

  let resp = request(
    state,
    "GET",
    "/exposures?instrument=LATISS&registry=0",
    None,
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn exposures_date_filters_use_interval_overlap() {
  let state = make_state().await;
  // The span is 03:00:00 .. 03:00:30; min_date is exclusive against the
  // end, max_date inclusive against the begin.
  let found = body_json(
    request(
      state.clone(),
      "GET",
      "/exposures?instrument=LATISS&min_date=2022-02-08T03:00:30",
      None,
    )
    .await,
  )
  .await;
  assert!(found.as_array().unwrap().is_empty());

  let found = body_json(
    request(
      state,
      "GET",
      "/exposures?instrument=LATISS&max_date=2022-02-08T03:00:00",
      None,
    )
    .await,
  )
  .await;
  assert_eq!(found.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn exposures_reject_ordering_by_instrument() {
  let state = make_state().await;
  let resp = request(
    state,
    "GET",
    "/exposures?instrument=LATISS&order_by=instrument",
    None,
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ─── Metadata endpoints ──────────────────────────────────────────────────────

#[tokio::test]
async fn configuration_reports_site_and_registries() {
  let state = make_state().await;
  let resp = request(state, "GET", "/configuration", None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let config = body_json(resp).await;
  assert_eq!(config["site_id"], "test");
  assert_eq!(config["registry_uris"], json!(["registry-1.sqlite"]));
}

#[tokio::test]
async fn instruments_lists_each_registry() {
  let state = make_state().await;
  let resp = request(state, "GET", "/instruments", None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let instruments = body_json(resp).await;
  assert_eq!(instruments["instruments"], json!([["LATISS"]]));
}

#[tokio::test]
async fn root_serves_a_landing_page() {
  let state = make_state().await;
  let resp = request(state, "GET", "/", None).await;
  assert_eq!(resp.status(), StatusCode::OK);
}
