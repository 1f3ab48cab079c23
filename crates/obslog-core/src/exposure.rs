//! Exposure — the read-only record this service annotates.
//!
//! Exposures live in external registry databases and are never created or
//! mutated here; they are queried and returned reshaped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One astronomical observation, as recorded by an exposure registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exposure {
  /// Observation ID. The obs_id format embeds day_obs and seq_num, but
  /// those are also available as separate fields, for convenience.
  pub obs_id:             String,
  /// Integer id derived from `obs_id` by the acquisition system.
  pub id:                 i64,
  pub instrument:         String,
  /// E.g. dark, bias, science.
  pub observation_type:   String,
  /// E.g. science, filter scan, unknown.
  pub observation_reason: String,
  /// Observation day as an integer of the form YYYYMMDD.
  pub day_obs:            i32,
  pub seq_num:            i32,
  /// Group identifier associated with this exposure by the acquisition
  /// system.
  pub group_name:         String,
  /// Object of interest for this observation or survey field name.
  pub target_name:        String,
  /// Observing program (survey, proposal, engineering project).
  pub science_program:    String,
  /// Tracking ICRS right ascension of boresight in degrees.
  /// None for observations that are not on sky.
  pub tracking_ra:        Option<f64>,
  /// Tracking ICRS declination of boresight in degrees.
  /// None for observations that are not on sky.
  pub tracking_dec:       Option<f64>,
  /// Angle of the instrument focal plane on the sky in degrees.
  pub sky_angle:          Option<f64>,
  /// Start time of the observation; ought to always be known, but
  /// registries have been seen where it is not.
  pub timespan_begin:     Option<DateTime<Utc>>,
  /// End time of the observation.
  pub timespan_end:       Option<DateTime<Utc>>,
}

/// Allowed `order_by` fields for exposure searches: every exposure field
/// except `instrument` (searches are always within one instrument).
pub const EXPOSURE_SORT_FIELDS: [&str; 14] = [
  "obs_id",
  "id",
  "observation_type",
  "observation_reason",
  "day_obs",
  "seq_num",
  "group_name",
  "target_name",
  "science_program",
  "tracking_ra",
  "tracking_dec",
  "sky_angle",
  "timespan_begin",
  "timespan_end",
];
