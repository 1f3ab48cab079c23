//! Handler for `GET /exposures` — search over the external exposure
//! registries.
//!
//! Unlike `/messages`, the backing store here is not this service's own
//! database: the filters are handed to the configured registry's query
//! interface. Date filters use interval-overlap semantics because an
//! exposure spans an interval rather than a point in time.

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::NaiveDateTime;
use obslog_core::{
  exposure::Exposure,
  query::{DEFAULT_LIMIT, ExposureQuery, SortKey},
  registry::ExposureRegistry,
  store::MessageStore,
};
use serde::Deserialize;

use crate::{AppState, error::ApiError, split_csv};

/// Query parameters of `GET /exposures`. `instrument` is required;
/// list-valued filters are comma-separated.
#[derive(Debug, Deserialize)]
pub struct FindExposuresParams {
  /// Which configured registry to search, 1-based.
  #[serde(default = "default_registry")]
  pub registry:            usize,
  pub instrument:          String,
  pub min_day_obs:         Option<i32>,
  pub max_day_obs:         Option<i32>,
  pub min_seq_num:         Option<i32>,
  pub max_seq_num:         Option<i32>,
  pub group_names:         Option<String>,
  pub observation_reasons: Option<String>,
  pub observation_types:   Option<String>,
  /// Minimum date during the exposure, exclusive against the span end.
  pub min_date:            Option<NaiveDateTime>,
  /// Maximum date during the exposure, inclusive against the span begin.
  pub max_date:            Option<NaiveDateTime>,
  pub order_by:            Option<String>,
  #[serde(default)]
  pub offset:              u64,
  #[serde(default = "default_limit")]
  pub limit:               u32,
}

fn default_registry() -> usize { 1 }

fn default_limit() -> u32 { DEFAULT_LIMIT }

/// `GET /exposures?instrument=...`
pub async fn find<S, R>(
  State(state): State<AppState<S, R>>,
  Query(params): Query<FindExposuresParams>,
) -> Result<Json<Vec<Exposure>>, ApiError>
where
  S: MessageStore,
  R: ExposureRegistry,
{
  if params.registry < 1 {
    return Err(ApiError::BadRequest("registry must be >= 1".to_owned()));
  }
  let registry =
    state.registries.get(params.registry - 1).ok_or_else(|| {
      ApiError::NotFound(format!(
        "registry={} but only {} registries configured",
        params.registry,
        state.registries.len()
      ))
    })?;

  let order_by = SortKey::parse_exposure_list(
    &split_csv(&params.order_by).unwrap_or_default(),
  )?;

  let query = ExposureQuery {
    min_day_obs: params.min_day_obs,
    max_day_obs: params.max_day_obs,
    min_seq_num: params.min_seq_num,
    max_seq_num: params.max_seq_num,
    group_names: split_csv(&params.group_names),
    observation_reasons: split_csv(&params.observation_reasons),
    observation_types: split_csv(&params.observation_types),
    min_date: params.min_date.map(|dt| dt.and_utc()),
    max_date: params.max_date.map(|dt| dt.and_utc()),
    order_by,
    offset: params.offset,
    limit: params.limit,
  };
  query.validate()?;

  let exposures = registry
    .find_exposures(&params.instrument, &query)
    .await
    .map_err(|e| ApiError::Registry(Box::new(e)))?;
  Ok(Json(exposures))
}
