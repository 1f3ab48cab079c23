//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width microsecond RFC 3339 UTC strings,
//! so lexicographic comparison in SQL equals chronological comparison.
//! Tag and URL arrays are stored as compact JSON. UUIDs are stored as
//! hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use obslog_core::{
  exposure::Exposure,
  message::{ExposureFlag, Message},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, false)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── ExposureFlag ────────────────────────────────────────────────────────────

pub fn decode_flag(s: &str) -> Result<ExposureFlag> {
  match s {
    "none" => Ok(ExposureFlag::None),
    "junk" => Ok(ExposureFlag::Junk),
    "questionable" => Ok(ExposureFlag::Questionable),
    other => Err(Error::UnknownExposureFlag(other.to_owned())),
  }
}

// ─── String arrays ───────────────────────────────────────────────────────────

pub fn encode_string_array(values: &[String]) -> Result<String> {
  Ok(serde_json::to_string(values)?)
}

pub fn decode_string_array(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from (or written directly to) a `message` row.
pub struct RawMessage {
  pub id:               String,
  pub site_id:          String,
  pub obs_id:           String,
  pub instrument:       String,
  pub day_obs:          i32,
  pub seq_num:          i32,
  pub message_text:     String,
  pub level:            i32,
  pub tags:             String,
  pub urls:             String,
  pub user_id:          String,
  pub user_agent:       String,
  pub is_human:         bool,
  pub is_valid:         bool,
  pub exposure_flag:    String,
  pub date_added:       String,
  pub date_invalidated: Option<String>,
  pub parent_id:        Option<String>,
}

impl RawMessage {
  /// Column order must match [`crate::sql::MESSAGE_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(RawMessage {
      id:               row.get(0)?,
      site_id:          row.get(1)?,
      obs_id:           row.get(2)?,
      instrument:       row.get(3)?,
      day_obs:          row.get(4)?,
      seq_num:          row.get(5)?,
      message_text:     row.get(6)?,
      level:            row.get(7)?,
      tags:             row.get(8)?,
      urls:             row.get(9)?,
      user_id:          row.get(10)?,
      user_agent:       row.get(11)?,
      is_human:         row.get(12)?,
      is_valid:         row.get(13)?,
      exposure_flag:    row.get(14)?,
      date_added:       row.get(15)?,
      date_invalidated: row.get(16)?,
      parent_id:        row.get(17)?,
    })
  }

  pub fn into_message(self) -> Result<Message> {
    Ok(Message {
      id:               decode_uuid(&self.id)?,
      site_id:          self.site_id,
      obs_id:           self.obs_id,
      instrument:       self.instrument,
      day_obs:          self.day_obs,
      seq_num:          self.seq_num,
      message_text:     self.message_text,
      level:            self.level,
      tags:             decode_string_array(&self.tags)?,
      urls:             decode_string_array(&self.urls)?,
      user_id:          self.user_id,
      user_agent:       self.user_agent,
      is_human:         self.is_human,
      is_valid:         self.is_valid,
      exposure_flag:    decode_flag(&self.exposure_flag)?,
      date_added:       decode_dt(&self.date_added)?,
      date_invalidated: self
        .date_invalidated
        .as_deref()
        .map(decode_dt)
        .transpose()?,
      parent_id:        self.parent_id.as_deref().map(decode_uuid).transpose()?,
    })
  }
}

/// Raw values read directly from an `exposure` row.
pub struct RawExposure {
  pub obs_id:             String,
  pub id:                 i64,
  pub instrument:         String,
  pub observation_type:   String,
  pub observation_reason: String,
  pub day_obs:            i32,
  pub seq_num:            i32,
  pub group_name:         String,
  pub target_name:        String,
  pub science_program:    String,
  pub tracking_ra:        Option<f64>,
  pub tracking_dec:       Option<f64>,
  pub sky_angle:          Option<f64>,
  pub timespan_begin:     Option<String>,
  pub timespan_end:       Option<String>,
}

impl RawExposure {
  /// Column order must match [`crate::sql::EXPOSURE_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(RawExposure {
      obs_id:             row.get(0)?,
      id:                 row.get(1)?,
      instrument:         row.get(2)?,
      observation_type:   row.get(3)?,
      observation_reason: row.get(4)?,
      day_obs:            row.get(5)?,
      seq_num:            row.get(6)?,
      group_name:         row.get(7)?,
      target_name:        row.get(8)?,
      science_program:    row.get(9)?,
      tracking_ra:        row.get(10)?,
      tracking_dec:       row.get(11)?,
      sky_angle:          row.get(12)?,
      timespan_begin:     row.get(13)?,
      timespan_end:       row.get(14)?,
    })
  }

  pub fn into_exposure(self) -> Result<Exposure> {
    Ok(Exposure {
      obs_id:             self.obs_id,
      id:                 self.id,
      instrument:         self.instrument,
      observation_type:   self.observation_type,
      observation_reason: self.observation_reason,
      day_obs:            self.day_obs,
      seq_num:            self.seq_num,
      group_name:         self.group_name,
      target_name:        self.target_name,
      science_program:    self.science_program,
      tracking_ra:        self.tracking_ra,
      tracking_dec:       self.tracking_dec,
      sky_angle:          self.sky_angle,
      timespan_begin:     self
        .timespan_begin
        .as_deref()
        .map(decode_dt)
        .transpose()?,
      timespan_end:       self.timespan_end.as_deref().map(decode_dt).transpose()?,
    })
  }
}
