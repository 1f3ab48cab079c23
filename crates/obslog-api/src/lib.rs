//! JSON REST API for the obslog exposure-log service.
//!
//! Exposes an axum [`Router`] backed by any
//! [`obslog_core::store::MessageStore`] and any set of
//! [`obslog_core::registry::ExposureRegistry`] handles. Auth, TLS, and
//! transport concerns are the caller's responsibility.

pub mod error;
pub mod exposures;
pub mod messages;
pub mod meta;

use std::{path::PathBuf, sync::Arc};

use axum::{Router, routing::get};
use obslog_core::{registry::ExposureRegistry, store::MessageStore};
use serde::Deserialize;

pub use error::ApiError;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` merged
/// with `OBSLOG_`-prefixed environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  /// Name identifying where this service is running, e.g. "summit".
  pub site_id:    String,
  /// Path of the message database owned by this service.
  pub db_path:    PathBuf,
  /// Paths of the exposure-registry databases, searched in order.
  pub registries: Vec<PathBuf>,
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
///
/// Constructed once at startup and torn down once at shutdown; there is
/// no ambient global state.
pub struct AppState<S, R> {
  pub site_id:       String,
  pub store:         Arc<S>,
  /// Registries in configured search order.
  pub registries:    Arc<Vec<R>>,
  /// The configured registry locations, for `/configuration`.
  pub registry_uris: Arc<Vec<String>>,
}

impl<S, R> Clone for AppState<S, R> {
  fn clone(&self) -> Self {
    AppState {
      site_id:       self.site_id.clone(),
      store:         Arc::clone(&self.store),
      registries:    Arc::clone(&self.registries),
      registry_uris: Arc::clone(&self.registry_uris),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
pub fn api_router<S, R>(state: AppState<S, R>) -> Router
where
  S: MessageStore + 'static,
  R: ExposureRegistry + 'static,
{
  Router::new()
    .route("/", get(meta::root))
    .route(
      "/messages",
      get(messages::find::<S, R>).post(messages::add::<S, R>),
    )
    .route(
      "/messages/{id}",
      get(messages::get_one::<S, R>)
        .delete(messages::delete_one::<S, R>)
        .patch(messages::edit_one::<S, R>),
    )
    .route("/exposures", get(exposures::find::<S, R>))
    .route("/instruments", get(meta::instruments::<S, R>))
    .route("/configuration", get(meta::configuration::<S, R>))
    .with_state(state)
}

// ─── Query-parameter helpers ─────────────────────────────────────────────────

/// Split a comma-separated list parameter. Absent, empty, or
/// all-whitespace values mean "not provided" — list filters never see an
/// empty list.
pub(crate) fn split_csv(value: &Option<String>) -> Option<Vec<String>> {
  value
    .as_deref()
    .map(|s| {
      s.split(',')
        .map(|item| item.trim().to_owned())
        .filter(|item| !item.is_empty())
        .collect::<Vec<_>>()
    })
    .filter(|items| !items.is_empty())
}

#[cfg(test)]
mod tests;
