//! Observation-id parsing and the observation-day clock.
//!
//! An obs_id has the form `CC_C_YYYYMMDD_NNNNNN`: a two-letter site code,
//! a one-letter controller code, the observation day, and the sequence
//! number, all uppercase/digits and underscore-separated. The embedded
//! fields are only trusted for exposures the registry has not seen yet.
//!
//! The observation day rolls over at local noon: `day_obs` is the UTC
//! time minus 12 hours, formatted as YYYYMMDD.

use chrono::{DateTime, Datelike as _, Duration, NaiveDate, Utc};

use crate::error::{Error, Result};

/// The day_obs and seq_num embedded in an obs_id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedObsId {
  pub day_obs: i32,
  pub seq_num: i32,
}

/// The current observation day, as an integer of the form YYYYMMDD.
pub fn current_day_obs(now: DateTime<Utc>) -> i32 {
  day_obs_from_date((now - Duration::hours(12)).date_naive())
}

fn day_obs_from_date(date: NaiveDate) -> i32 {
  date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}

fn date_from_day_obs(day_obs: i32) -> Option<NaiveDate> {
  let year = day_obs / 10_000;
  let month = (day_obs / 100 % 100) as u32;
  let day = (day_obs % 100) as u32;
  NaiveDate::from_ymd_opt(year, month, day)
}

/// Split an obs_id into its embedded day_obs and seq_num.
pub fn parse_obs_id(obs_id: &str) -> Result<ParsedObsId> {
  let invalid = || Error::InvalidObsId(obs_id.to_owned());

  let mut parts = obs_id.split('_');
  let site = parts.next().ok_or_else(invalid)?;
  let controller = parts.next().ok_or_else(invalid)?;
  let day = parts.next().ok_or_else(invalid)?;
  let seq = parts.next().ok_or_else(invalid)?;
  if parts.next().is_some() {
    return Err(invalid());
  }

  let all_uppercase = |s: &str| s.bytes().all(|b| b.is_ascii_uppercase());
  let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
  if site.len() != 2
    || !all_uppercase(site)
    || controller.len() != 1
    || !all_uppercase(controller)
    || day.len() != 8
    || !all_digits(day)
    || seq.len() != 6
    || !all_digits(seq)
  {
    return Err(invalid());
  }

  Ok(ParsedObsId {
    day_obs: day.parse().map_err(|_| invalid())?,
    seq_num: seq.parse().map_err(|_| invalid())?,
  })
}

/// Validate an obs_id for a not-yet-registered exposure.
///
/// The embedded day must be a real calendar date within one day of the
/// current observation day; registration lag and the noon rollover make a
/// one-day skew legitimate, anything further is a client error.
pub fn check_new_obs_id(
  obs_id: &str,
  now: DateTime<Utc>,
) -> Result<ParsedObsId> {
  let parsed = parse_obs_id(obs_id)?;
  let date = date_from_day_obs(parsed.day_obs)
    .ok_or_else(|| Error::InvalidObsId(obs_id.to_owned()))?;

  let current = (now - Duration::hours(12)).date_naive();
  let skew = (date - current).num_days().abs();
  if skew > 1 {
    return Err(Error::DayObsOutOfRange {
      obs_id:  obs_id.to_owned(),
      day_obs: parsed.day_obs,
      current: day_obs_from_date(current),
    });
  }
  Ok(parsed)
}
