//! Handlers for `/messages` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/messages` | Filter/sort/paginate; list params are comma-separated |
//! | `POST`   | `/messages` | Body: [`NewMessageBody`]; returns 201 + stored message |
//! | `GET`    | `/messages/:id` | Single message |
//! | `DELETE` | `/messages/:id` | Invalidate (soft-delete); 204, idempotent |
//! | `PATCH`  | `/messages/:id` | Body: [`EditMessageBody`]; returns the superseding message |
//!
//! Timestamp parameters are ISO-8601 without timezone and are treated as
//! UTC.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{NaiveDateTime, Utc};
use obslog_core::{
  message::{
    DEFAULT_LEVEL, ExposureFlag, Message, MessageChanges, NewMessage,
  },
  obs_id::{check_new_obs_id, current_day_obs},
  query::{DEFAULT_LIMIT, MessageQuery, SortKey, TriState},
  registry::ExposureRegistry,
  store::MessageStore,
  tags::normalize_tags,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError, split_csv};

fn store_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> ApiError {
  ApiError::Store(Box::new(e))
}

// ─── Find ────────────────────────────────────────────────────────────────────

/// Query parameters of `GET /messages`. List-valued filters are
/// comma-separated; repeat-by-comma mirrors the rest of the API surface.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FindMessagesParams {
  pub site_ids:             Option<String>,
  /// Substring of `obs_id`.
  pub obs_id:               Option<String>,
  pub instruments:          Option<String>,
  pub min_day_obs:          Option<i32>,
  pub max_day_obs:          Option<i32>,
  pub min_seq_num:          Option<i32>,
  pub max_seq_num:          Option<i32>,
  /// Substring of `message_text`.
  pub message_text:         Option<String>,
  pub min_level:            Option<i32>,
  pub max_level:            Option<i32>,
  pub tags:                 Option<String>,
  pub exclude_tags:         Option<String>,
  pub urls:                 Option<String>,
  pub user_ids:             Option<String>,
  pub user_agents:          Option<String>,
  pub is_human:             TriState,
  pub is_valid:             TriState,
  pub exposure_flags:       Option<String>,
  pub min_date_added:       Option<NaiveDateTime>,
  pub max_date_added:       Option<NaiveDateTime>,
  pub has_date_invalidated: Option<bool>,
  pub min_date_invalidated: Option<NaiveDateTime>,
  pub max_date_invalidated: Option<NaiveDateTime>,
  pub has_parent_id:        Option<bool>,
  pub order_by:             Option<String>,
  pub offset:               u64,
  pub limit:                u32,
}

impl Default for FindMessagesParams {
  fn default() -> Self {
    FindMessagesParams {
      site_ids:             None,
      obs_id:               None,
      instruments:          None,
      min_day_obs:          None,
      max_day_obs:          None,
      min_seq_num:          None,
      max_seq_num:          None,
      message_text:         None,
      min_level:            None,
      max_level:            None,
      tags:                 None,
      exclude_tags:         None,
      urls:                 None,
      user_ids:             None,
      user_agents:          None,
      is_human:             TriState::Either,
      // Invalidated messages are hidden unless the caller asks for them.
      is_valid:             TriState::True,
      exposure_flags:       None,
      min_date_added:       None,
      max_date_added:       None,
      has_date_invalidated: None,
      min_date_invalidated: None,
      max_date_invalidated: None,
      has_parent_id:        None,
      order_by:             None,
      offset:               0,
      limit:                DEFAULT_LIMIT,
    }
  }
}

fn parse_flags(values: Vec<String>) -> Result<Vec<ExposureFlag>, ApiError> {
  values
    .iter()
    .map(|value| match value.as_str() {
      "none" => Ok(ExposureFlag::None),
      "junk" => Ok(ExposureFlag::Junk),
      "questionable" => Ok(ExposureFlag::Questionable),
      other => Err(ApiError::BadRequest(format!(
        "invalid exposure_flag {other:?}; allowed values are none, junk, \
         questionable"
      ))),
    })
    .collect()
}

/// `GET /messages`
pub async fn find<S, R>(
  State(state): State<AppState<S, R>>,
  Query(params): Query<FindMessagesParams>,
) -> Result<Json<Vec<Message>>, ApiError>
where
  S: MessageStore,
  R: ExposureRegistry,
{
  // Tag filters are normalized exactly like stored tags, so the two
  // representations always compare equal.
  let tags = split_csv(&params.tags)
    .map(|values| normalize_tags(&values))
    .transpose()?;
  let exclude_tags = split_csv(&params.exclude_tags)
    .map(|values| normalize_tags(&values))
    .transpose()?;
  let exposure_flags =
    split_csv(&params.exposure_flags).map(parse_flags).transpose()?;
  let order_by = SortKey::parse_message_list(
    &split_csv(&params.order_by).unwrap_or_default(),
  )?;

  let query = MessageQuery {
    site_ids: split_csv(&params.site_ids),
    obs_id: params.obs_id,
    instruments: split_csv(&params.instruments),
    min_day_obs: params.min_day_obs,
    max_day_obs: params.max_day_obs,
    min_seq_num: params.min_seq_num,
    max_seq_num: params.max_seq_num,
    message_text: params.message_text,
    min_level: params.min_level,
    max_level: params.max_level,
    tags,
    exclude_tags,
    urls: split_csv(&params.urls),
    user_ids: split_csv(&params.user_ids),
    user_agents: split_csv(&params.user_agents),
    is_human: params.is_human,
    is_valid: params.is_valid,
    exposure_flags,
    min_date_added: params.min_date_added.map(|dt| dt.and_utc()),
    max_date_added: params.max_date_added.map(|dt| dt.and_utc()),
    has_date_invalidated: params.has_date_invalidated,
    min_date_invalidated: params.min_date_invalidated.map(|dt| dt.and_utc()),
    max_date_invalidated: params.max_date_invalidated.map(|dt| dt.and_utc()),
    has_parent_id: params.has_parent_id,
    order_by,
    offset: params.offset,
    limit: params.limit,
  };
  query.validate()?;

  let messages =
    state.store.find_messages(&query).await.map_err(store_err)?;
  Ok(Json(messages))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /messages/:id`
pub async fn get_one<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Message>, ApiError>
where
  S: MessageStore,
  R: ExposureRegistry,
{
  let message = state
    .store
    .get_message(id)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("no message found with id={id}")))?;
  Ok(Json(message))
}

// ─── Add ─────────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /messages`.
#[derive(Debug, Deserialize)]
pub struct NewMessageBody {
  pub obs_id:        String,
  pub instrument:    String,
  pub message_text:  String,
  /// Message level; uses logging-level numbering.
  #[serde(default = "default_level")]
  pub level:         i32,
  #[serde(default)]
  pub tags:          Vec<String>,
  #[serde(default)]
  pub urls:          Vec<String>,
  pub user_id:       String,
  pub user_agent:    String,
  pub is_human:      bool,
  /// The exposure may not yet be registered. When set and no registry
  /// knows the exposure, the obs_id itself supplies day_obs and seq_num
  /// instead of failing with not-found.
  pub is_new:        bool,
  #[serde(default)]
  pub exposure_flag: ExposureFlag,
}

fn default_level() -> i32 { DEFAULT_LEVEL }

/// `POST /messages` — returns 201 + the stored [`Message`].
pub async fn add<S, R>(
  State(state): State<AppState<S, R>>,
  Json(body): Json<NewMessageBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: MessageStore,
  R: ExposureRegistry,
{
  let tags = normalize_tags(&body.tags)?;

  // Search the registries in order; the first match wins. A registry
  // failure counts as no match so one broken registry cannot block
  // writes for exposures the caller vouches for.
  let mut exposure = None;
  for registry in state.registries.iter() {
    match registry.find_exposure(&body.instrument, &body.obs_id).await {
      Ok(Some(found)) => {
        exposure = Some(found);
        break;
      }
      Ok(None) => {}
      Err(e) => {
        tracing::warn!(
          instrument = %body.instrument,
          obs_id = %body.obs_id,
          "registry lookup failed: {e}"
        );
      }
    }
  }

  let now = Utc::now();
  let (day_obs, seq_num) = match exposure {
    Some(exposure) => (exposure.day_obs, exposure.seq_num),
    None if body.is_new => {
      let parsed = check_new_obs_id(&body.obs_id, now)?;
      (current_day_obs(now), parsed.seq_num)
    }
    None => {
      return Err(ApiError::NotFound(format!(
        "no exposure found with instrument={:?} and obs_id={:?}",
        body.instrument, body.obs_id
      )));
    }
  };

  let input = NewMessage {
    site_id: state.site_id.clone(),
    obs_id: body.obs_id,
    instrument: body.instrument,
    day_obs,
    seq_num,
    message_text: body.message_text,
    level: body.level,
    tags,
    urls: body.urls,
    user_id: body.user_id,
    user_agent: body.user_agent,
    is_human: body.is_human,
    exposure_flag: body.exposure_flag,
  };
  let message = state.store.add_message(input).await.map_err(store_err)?;
  Ok((StatusCode::CREATED, Json(message)))
}

// ─── Delete (invalidate) ─────────────────────────────────────────────────────

/// `DELETE /messages/:id` — soft-delete. 204 on success; a second delete
/// of the same message is a no-op that still returns 204.
pub async fn delete_one<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: MessageStore,
  R: ExposureRegistry,
{
  match state.store.invalidate_message(id).await.map_err(store_err)? {
    Some(_) => Ok(StatusCode::NO_CONTENT),
    None => {
      Err(ApiError::NotFound(format!("no message found with id={id}")))
    }
  }
}

// ─── Edit ────────────────────────────────────────────────────────────────────

/// JSON body accepted by `PATCH /messages/:id`. Absent fields keep the
/// parent message's values.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EditMessageBody {
  pub message_text:  Option<String>,
  pub level:         Option<i32>,
  /// Replaces the existing tag set if present.
  pub tags:          Option<Vec<String>>,
  /// Replaces the existing URL set if present.
  pub urls:          Option<Vec<String>>,
  pub user_id:       Option<String>,
  pub user_agent:    Option<String>,
  pub is_human:      Option<bool>,
  pub exposure_flag: Option<ExposureFlag>,
}

/// `PATCH /messages/:id` — supersede a message.
///
/// Creates a new message from the parent overridden by the body, linked
/// via `parent_id`, and invalidates the parent. Returns the new message.
pub async fn edit_one<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
  Json(body): Json<EditMessageBody>,
) -> Result<Json<Message>, ApiError>
where
  S: MessageStore,
  R: ExposureRegistry,
{
  let tags =
    body.tags.map(|values| normalize_tags(&values)).transpose()?;

  let changes = MessageChanges {
    site_id: state.site_id.clone(),
    message_text: body.message_text,
    level: body.level,
    tags,
    urls: body.urls,
    user_id: body.user_id,
    user_agent: body.user_agent,
    is_human: body.is_human,
    exposure_flag: body.exposure_flag,
  };

  let child = state
    .store
    .edit_message(id, changes)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("no message found with id={id}")))?;
  Ok(Json(child))
}
