//! Message types — the one mutable entity in the exposure log.
//!
//! A message is a free-text annotation attached to an exposure. Messages
//! are immutable except for a single soft-delete transition: once
//! `date_invalidated` is set it is never cleared or changed. An edit is
//! modeled as a new message whose `parent_id` points at the superseded
//! message, which is then invalidated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of the `site_id` field.
pub const SITE_ID_LEN: usize = 16;

/// Default message level (mirrors the "info" logging level).
pub const DEFAULT_LEVEL: i32 = 20;

// ─── ExposureFlag ────────────────────────────────────────────────────────────

/// A manual quality flag for the annotated exposure.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ExposureFlag {
  #[default]
  None,
  /// The exposure is likely bad.
  Junk,
  /// The exposure is possibly bad.
  Questionable,
}

impl ExposureFlag {
  /// The string stored in the `exposure_flag` column.
  /// Must match the `rename_all = "lowercase"` serde tags above.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::None => "none",
      Self::Junk => "junk",
      Self::Questionable => "questionable",
    }
  }
}

// ─── Message ─────────────────────────────────────────────────────────────────

/// A stored exposure-log message.
///
/// `is_valid` is derived storage-side from `date_invalidated is null`;
/// nothing in this crate or any backend ever writes it directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
  pub id:               Uuid,
  /// Site at which the message was created.
  pub site_id:          String,
  /// Observation ID of the annotated exposure.
  pub obs_id:           String,
  /// Short name of the instrument, e.g. LSSTCam.
  pub instrument:       String,
  /// Observation day as an integer of the form YYYYMMDD.
  pub day_obs:          i32,
  /// Counter for the observation within a larger sequence.
  pub seq_num:          i32,
  pub message_text:     String,
  /// Message level; uses logging-level numbering (info=20, warning=30).
  pub level:            i32,
  /// Normalized lowercase keyword tags.
  pub tags:             Vec<String>,
  /// URLs of associated tickets, screen shots, etc.
  pub urls:             Vec<String>,
  pub user_id:          String,
  /// The application that created the message.
  pub user_agent:       String,
  pub is_human:         bool,
  /// Derived: true exactly when `date_invalidated` is null.
  pub is_valid:         bool,
  pub exposure_flag:    ExposureFlag,
  /// Server-assigned timestamp; never changes after creation.
  pub date_added:       DateTime<Utc>,
  /// Set at most once, by invalidation; null means the message is current.
  pub date_invalidated: Option<DateTime<Utc>>,
  /// The message this one is an edited version of, if any.
  pub parent_id:        Option<Uuid>,
}

/// All message field names, in schema order.
/// Also the set of allowed `order_by` fields for message searches.
pub const MESSAGE_FIELDS: [&str; 18] = [
  "id",
  "site_id",
  "obs_id",
  "instrument",
  "day_obs",
  "seq_num",
  "message_text",
  "level",
  "tags",
  "urls",
  "user_id",
  "user_agent",
  "is_human",
  "is_valid",
  "exposure_flag",
  "date_added",
  "date_invalidated",
  "parent_id",
];

// ─── NewMessage ──────────────────────────────────────────────────────────────

/// Input to [`crate::store::MessageStore::add_message`].
///
/// `id` and `date_added` are always assigned by the store;
/// `date_invalidated` and `parent_id` start null.
#[derive(Debug, Clone)]
pub struct NewMessage {
  pub site_id:       String,
  pub obs_id:        String,
  pub instrument:    String,
  pub day_obs:       i32,
  pub seq_num:       i32,
  pub message_text:  String,
  pub level:         i32,
  pub tags:          Vec<String>,
  pub urls:          Vec<String>,
  pub user_id:       String,
  pub user_agent:    String,
  pub is_human:      bool,
  pub exposure_flag: ExposureFlag,
}

// ─── MessageChanges ──────────────────────────────────────────────────────────

/// Input to [`crate::store::MessageStore::edit_message`].
///
/// `None` fields keep the parent message's value. The child message is
/// always stamped with the serving site's `site_id`, a fresh id and
/// `date_added`, and `parent_id` pointing at the edited message.
#[derive(Debug, Clone, Default)]
pub struct MessageChanges {
  /// Site id of the service performing the edit (always applied).
  pub site_id:       String,
  pub message_text:  Option<String>,
  pub level:         Option<i32>,
  pub tags:          Option<Vec<String>>,
  pub urls:          Option<Vec<String>>,
  pub user_id:       Option<String>,
  pub user_agent:    Option<String>,
  pub is_human:      Option<bool>,
  pub exposure_flag: Option<ExposureFlag>,
}
