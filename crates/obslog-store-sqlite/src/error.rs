//! Error type for `obslog-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] obslog_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown exposure flag: {0:?}")]
  UnknownExposureFlag(String),

  /// A registry holds more than one exposure for one (instrument, obs_id).
  #[error(
    "registry holds multiple exposures with instrument={instrument:?} and \
     obs_id={obs_id:?}; is the registry corrupt?"
  )]
  AmbiguousExposure {
    instrument: String,
    obs_id:     String,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
