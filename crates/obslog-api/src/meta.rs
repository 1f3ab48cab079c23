//! Service metadata endpoints: the landing page, `/configuration`, and
//! `/instruments`.

use axum::{
  Json,
  extract::State,
  response::Html,
};
use obslog_core::{registry::ExposureRegistry, store::MessageStore};
use serde::Serialize;

use crate::{AppState, error::ApiError};

/// `GET /`
pub async fn root() -> Html<&'static str> {
  Html(
    "<html>\
     <head><title>Exposure log service</title></head>\
     <body>\
     <h1>Exposure log service</h1>\
     <p>Create and manage log messages associated with exposures.</p>\
     </body>\
     </html>",
  )
}

// ─── Configuration ───────────────────────────────────────────────────────────

/// Static deployment information.
#[derive(Debug, Serialize)]
pub struct Configuration {
  pub site_id:       String,
  /// Configured registry locations, in search order.
  pub registry_uris: Vec<String>,
}

/// `GET /configuration`
pub async fn configuration<S, R>(
  State(state): State<AppState<S, R>>,
) -> Json<Configuration>
where
  S: MessageStore,
  R: ExposureRegistry,
{
  Json(Configuration {
    site_id:       state.site_id.clone(),
    registry_uris: state.registry_uris.as_ref().clone(),
  })
}

// ─── Instruments ─────────────────────────────────────────────────────────────

/// The instruments known to each configured registry, in registry order.
#[derive(Debug, Serialize)]
pub struct Instruments {
  pub instruments: Vec<Vec<String>>,
}

/// `GET /instruments`
pub async fn instruments<S, R>(
  State(state): State<AppState<S, R>>,
) -> Result<Json<Instruments>, ApiError>
where
  S: MessageStore,
  R: ExposureRegistry,
{
  let mut per_registry = Vec::with_capacity(state.registries.len());
  for registry in state.registries.iter() {
    let names = registry
      .instruments()
      .await
      .map_err(|e| ApiError::Registry(Box::new(e)))?;
    per_registry.push(names);
  }
  Ok(Json(Instruments { instruments: per_registry }))
}
