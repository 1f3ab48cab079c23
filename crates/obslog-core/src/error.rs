//! Error types for `obslog-core`.
//!
//! Every variant here is a caller-input error; storage and registry
//! backends define their own error types layered on top of this one.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(
    "invalid tags {0:?}: each tag must be a word of letters, digits and \
     underscores"
  )]
  InvalidTags(Vec<String>),

  #[error("invalid order_by fields {bad:?} for {entity}")]
  InvalidOrderBy {
    entity: &'static str,
    bad:    Vec<String>,
  },

  #[error("limit must be greater than 1, got {0}")]
  InvalidLimit(u32),

  #[error("invalid obs_id {0:?}: expected the form CC_C_YYYYMMDD_NNNNNN")]
  InvalidObsId(String),

  #[error(
    "obs_id {obs_id:?} has day_obs {day_obs}, which is not within one day \
     of the current day_obs {current}"
  )]
  DayObsOutOfRange {
    obs_id:  String,
    day_obs: i32,
    current: i32,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
