//! The query model: filters, sort keys, and pagination.
//!
//! Every optional filter a search accepts maps to exactly one predicate
//! kind from a closed set ([`Predicate`]). Backends render predicates into
//! their own query language; the set of supported filters is fixed here,
//! so an unsupported filter cannot exist at runtime.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  error::{Error, Result},
  exposure::EXPOSURE_SORT_FIELDS,
  message::{ExposureFlag, MESSAGE_FIELDS},
};

// ─── TriState ────────────────────────────────────────────────────────────────

/// A three-valued boolean filter. `Either` omits the predicate entirely.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TriState {
  #[default]
  Either,
  True,
  False,
}

impl TriState {
  /// The boolean to test for, or `None` for `Either`.
  pub fn as_bool(self) -> Option<bool> {
    match self {
      Self::Either => None,
      Self::True => Some(true),
      Self::False => Some(false),
    }
  }
}

// ─── Sort keys ───────────────────────────────────────────────────────────────

/// One validated sort key. `field` is always an entry from the allowed
/// field table for the target entity, never caller-supplied text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
  pub field:      &'static str,
  pub descending: bool,
}

impl SortKey {
  /// The implicit primary ordering: ascending id.
  pub fn id_asc() -> Self {
    SortKey { field: "id", descending: false }
  }

  /// Parse one `order_by` item: a field name, optionally prefixed with
  /// `-` for descending order. Returns `None` for unknown fields.
  fn parse(name: &str, allowed: &'static [&'static str]) -> Option<Self> {
    let (bare, descending) = match name.strip_prefix('-') {
      Some(rest) => (rest, true),
      None => (name, false),
    };
    let field = allowed.iter().find(|f| **f == bare).copied()?;
    Some(SortKey { field, descending })
  }

  /// Validate a full `order_by` list against `allowed`.
  ///
  /// Every name must validate or the whole request is rejected, reporting
  /// all offending names. If the result contains neither `id` nor `-id`,
  /// ascending id is appended as a tie-breaker: without a total order,
  /// paging with offset and limit can return duplicate or missing rows.
  /// An empty input list means the default order, ascending id.
  pub fn parse_list(
    names: &[String],
    allowed: &'static [&'static str],
    entity: &'static str,
  ) -> Result<Vec<SortKey>> {
    if names.is_empty() {
      return Ok(vec![SortKey::id_asc()]);
    }

    let mut keys = Vec::with_capacity(names.len() + 1);
    let mut bad = BTreeSet::new();
    for name in names {
      match SortKey::parse(name, allowed) {
        Some(key) => keys.push(key),
        None => {
          bad.insert(name.clone());
        }
      }
    }
    if !bad.is_empty() {
      return Err(Error::InvalidOrderBy {
        entity,
        bad: bad.into_iter().collect(),
      });
    }

    if !keys.iter().any(|key| key.field == "id") {
      keys.push(SortKey::id_asc());
    }
    Ok(keys)
  }

  /// Parse message `order_by` values.
  pub fn parse_message_list(names: &[String]) -> Result<Vec<SortKey>> {
    Self::parse_list(names, &MESSAGE_FIELDS, "messages")
  }

  /// Parse exposure `order_by` values.
  pub fn parse_exposure_list(names: &[String]) -> Result<Vec<SortKey>> {
    Self::parse_list(names, &EXPOSURE_SORT_FIELDS, "exposures")
  }
}

// ─── Predicate ───────────────────────────────────────────────────────────────

/// The closed set of filter predicate kinds.
///
/// Column names are always entries from the schema field tables. All
/// predicates produced for one query are conjoined; an empty predicate
/// list matches every row.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
  /// `column >= value` (inclusive lower bound).
  MinInt { column: &'static str, value: i64 },
  /// `column < value` (exclusive upper bound).
  MaxInt { column: &'static str, value: i64 },
  /// `column >= value` (inclusive lower bound).
  MinTime {
    column: &'static str,
    value:  DateTime<Utc>,
  },
  /// `column < value` (exclusive upper bound).
  MaxTime {
    column: &'static str,
    value:  DateTime<Utc>,
  },
  /// `column IS NOT NULL` when `present`, else `column IS NULL`.
  Presence { column: &'static str, present: bool },
  /// The record's array field shares at least one element with `values`.
  /// Never produced with an empty list.
  AnyOverlap {
    column: &'static str,
    values: Vec<String>,
  },
  /// The record's array field shares no element with `values`; matches
  /// records whose array is empty.
  NoneOverlap {
    column: &'static str,
    values: Vec<String>,
  },
  /// The record's scalar field value is one of `values`.
  OneOf {
    column: &'static str,
    values: Vec<String>,
  },
  /// Case-sensitive containment test.
  Substring {
    column: &'static str,
    value:  String,
  },
  /// Boolean equality (from a non-`Either` tri-state).
  BoolEq { column: &'static str, value: bool },
}

// ─── MessageQuery ────────────────────────────────────────────────────────────

/// Parameters for [`crate::store::MessageStore::find_messages`].
///
/// `None` / `Either` fields contribute no predicate. List-valued fields
/// are never empty lists; "not provided" is represented as `None`.
#[derive(Debug, Clone)]
pub struct MessageQuery {
  pub site_ids:             Option<Vec<String>>,
  /// Substring of `obs_id`.
  pub obs_id:               Option<String>,
  pub instruments:          Option<Vec<String>>,
  pub min_day_obs:          Option<i32>,
  pub max_day_obs:          Option<i32>,
  pub min_seq_num:          Option<i32>,
  pub max_seq_num:          Option<i32>,
  /// Substring of `message_text`.
  pub message_text:         Option<String>,
  pub min_level:            Option<i32>,
  pub max_level:            Option<i32>,
  /// At least one of these tags must be present (normalized).
  pub tags:                 Option<Vec<String>>,
  /// All of these tags must be absent (normalized).
  pub exclude_tags:         Option<Vec<String>>,
  /// At least one of these URLs must be present.
  pub urls:                 Option<Vec<String>>,
  pub user_ids:             Option<Vec<String>>,
  pub user_agents:          Option<Vec<String>>,
  pub is_human:             TriState,
  /// Defaults to `True`: invalidated messages are hidden unless asked for.
  pub is_valid:             TriState,
  pub exposure_flags:       Option<Vec<ExposureFlag>>,
  pub min_date_added:       Option<DateTime<Utc>>,
  pub max_date_added:       Option<DateTime<Utc>>,
  pub has_date_invalidated: Option<bool>,
  pub min_date_invalidated: Option<DateTime<Utc>>,
  pub max_date_invalidated: Option<DateTime<Utc>>,
  pub has_parent_id:        Option<bool>,
  /// Validated sort keys; always ends in a total order.
  pub order_by:             Vec<SortKey>,
  pub offset:               u64,
  pub limit:                u32,
}

pub const DEFAULT_LIMIT: u32 = 50;

impl Default for MessageQuery {
  fn default() -> Self {
    MessageQuery {
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
      is_valid:             TriState::True,
      exposure_flags:       None,
      min_date_added:       None,
      max_date_added:       None,
      has_date_invalidated: None,
      min_date_invalidated: None,
      max_date_invalidated: None,
      has_parent_id:        None,
      order_by:             vec![SortKey::id_asc()],
      offset:               0,
      limit:                DEFAULT_LIMIT,
    }
  }
}

impl MessageQuery {
  /// Reject pagination bounds before any storage access.
  /// A single-row page is disallowed by contract; the minimum is 2.
  pub fn validate(&self) -> Result<()> {
    if self.limit <= 1 {
      return Err(Error::InvalidLimit(self.limit));
    }
    Ok(())
  }

  /// Enumerate every populated filter as a predicate.
  pub fn predicates(&self) -> Vec<Predicate> {
    let mut preds = Vec::new();

    if let Some(values) = &self.site_ids {
      preds.push(Predicate::OneOf { column: "site_id", values: values.clone() });
    }
    if let Some(value) = &self.obs_id {
      preds.push(Predicate::Substring { column: "obs_id", value: value.clone() });
    }
    if let Some(values) = &self.instruments {
      preds.push(Predicate::OneOf {
        column: "instrument",
        values: values.clone(),
      });
    }
    if let Some(value) = self.min_day_obs {
      preds.push(Predicate::MinInt { column: "day_obs", value: value.into() });
    }
    if let Some(value) = self.max_day_obs {
      preds.push(Predicate::MaxInt { column: "day_obs", value: value.into() });
    }
    if let Some(value) = self.min_seq_num {
      preds.push(Predicate::MinInt { column: "seq_num", value: value.into() });
    }
    if let Some(value) = self.max_seq_num {
      preds.push(Predicate::MaxInt { column: "seq_num", value: value.into() });
    }
    if let Some(value) = &self.message_text {
      preds.push(Predicate::Substring {
        column: "message_text",
        value:  value.clone(),
      });
    }
    if let Some(value) = self.min_level {
      preds.push(Predicate::MinInt { column: "level", value: value.into() });
    }
    if let Some(value) = self.max_level {
      preds.push(Predicate::MaxInt { column: "level", value: value.into() });
    }
    if let Some(values) = &self.tags {
      preds.push(Predicate::AnyOverlap { column: "tags", values: values.clone() });
    }
    if let Some(values) = &self.exclude_tags {
      preds.push(Predicate::NoneOverlap {
        column: "tags",
        values: values.clone(),
      });
    }
    if let Some(values) = &self.urls {
      preds.push(Predicate::AnyOverlap { column: "urls", values: values.clone() });
    }
    if let Some(values) = &self.user_ids {
      preds.push(Predicate::OneOf { column: "user_id", values: values.clone() });
    }
    if let Some(values) = &self.user_agents {
      preds.push(Predicate::OneOf {
        column: "user_agent",
        values: values.clone(),
      });
    }
    if let Some(value) = self.is_human.as_bool() {
      preds.push(Predicate::BoolEq { column: "is_human", value });
    }
    if let Some(value) = self.is_valid.as_bool() {
      preds.push(Predicate::BoolEq { column: "is_valid", value });
    }
    if let Some(flags) = &self.exposure_flags {
      preds.push(Predicate::OneOf {
        column: "exposure_flag",
        values: flags.iter().map(|flag| flag.as_str().to_owned()).collect(),
      });
    }
    if let Some(value) = self.min_date_added {
      preds.push(Predicate::MinTime { column: "date_added", value });
    }
    if let Some(value) = self.max_date_added {
      preds.push(Predicate::MaxTime { column: "date_added", value });
    }
    if let Some(present) = self.has_date_invalidated {
      preds.push(Predicate::Presence { column: "date_invalidated", present });
    }
    if let Some(value) = self.min_date_invalidated {
      preds.push(Predicate::MinTime { column: "date_invalidated", value });
    }
    if let Some(value) = self.max_date_invalidated {
      preds.push(Predicate::MaxTime { column: "date_invalidated", value });
    }
    if let Some(present) = self.has_parent_id {
      preds.push(Predicate::Presence { column: "parent_id", present });
    }

    preds
  }
}

// ─── ExposureQuery ───────────────────────────────────────────────────────────

/// Parameters for [`crate::registry::ExposureRegistry::find_exposures`].
///
/// `min_date` and `max_date` are not plain range predicates: an exposure
/// spans an interval, so date filters use interval-overlap semantics
/// (`timespan_end > min_date`, `timespan_begin <= max_date`). Registries
/// render them alongside [`ExposureQuery::predicates`].
#[derive(Debug, Clone)]
pub struct ExposureQuery {
  pub min_day_obs:         Option<i32>,
  pub max_day_obs:         Option<i32>,
  pub min_seq_num:         Option<i32>,
  pub max_seq_num:         Option<i32>,
  pub group_names:         Option<Vec<String>>,
  pub observation_reasons: Option<Vec<String>>,
  pub observation_types:   Option<Vec<String>>,
  pub min_date:            Option<DateTime<Utc>>,
  pub max_date:            Option<DateTime<Utc>>,
  pub order_by:            Vec<SortKey>,
  pub offset:              u64,
  pub limit:               u32,
}

impl Default for ExposureQuery {
  fn default() -> Self {
    ExposureQuery {
      min_day_obs:         None,
      max_day_obs:         None,
      min_seq_num:         None,
      max_seq_num:         None,
      group_names:         None,
      observation_reasons: None,
      observation_types:   None,
      min_date:            None,
      max_date:            None,
      order_by:            vec![SortKey::id_asc()],
      offset:              0,
      limit:               DEFAULT_LIMIT,
    }
  }
}

impl ExposureQuery {
  /// Reject pagination bounds before any registry access.
  pub fn validate(&self) -> Result<()> {
    if self.limit <= 1 {
      return Err(Error::InvalidLimit(self.limit));
    }
    Ok(())
  }

  /// Enumerate the scalar filters as predicates. Interval-overlap date
  /// filters are carried separately (`min_date` / `max_date`).
  pub fn predicates(&self) -> Vec<Predicate> {
    let mut preds = Vec::new();

    if let Some(value) = self.min_day_obs {
      preds.push(Predicate::MinInt { column: "day_obs", value: value.into() });
    }
    if let Some(value) = self.max_day_obs {
      preds.push(Predicate::MaxInt { column: "day_obs", value: value.into() });
    }
    if let Some(value) = self.min_seq_num {
      preds.push(Predicate::MinInt { column: "seq_num", value: value.into() });
    }
    if let Some(value) = self.max_seq_num {
      preds.push(Predicate::MaxInt { column: "seq_num", value: value.into() });
    }
    if let Some(values) = &self.group_names {
      preds.push(Predicate::OneOf {
        column: "group_name",
        values: values.clone(),
      });
    }
    if let Some(values) = &self.observation_reasons {
      preds.push(Predicate::OneOf {
        column: "observation_reason",
        values: values.clone(),
      });
    }
    if let Some(values) = &self.observation_types {
      preds.push(Predicate::OneOf {
        column: "observation_type",
        values: values.clone(),
      });
    }

    preds
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_list_appends_id_tie_breaker() {
    let keys =
      SortKey::parse_message_list(&["day_obs".to_owned()]).unwrap();
    assert_eq!(keys, vec![
      SortKey { field: "day_obs", descending: false },
      SortKey::id_asc(),
    ]);
  }

  #[test]
  fn parse_list_keeps_explicit_descending_id() {
    let keys = SortKey::parse_message_list(&["-id".to_owned()]).unwrap();
    assert_eq!(keys, vec![SortKey { field: "id", descending: true }]);
  }

  #[test]
  fn parse_list_empty_means_id_ascending() {
    let keys = SortKey::parse_message_list(&[]).unwrap();
    assert_eq!(keys, vec![SortKey::id_asc()]);
  }

  #[test]
  fn parse_list_rejects_unknown_fields_reporting_all() {
    let err = SortKey::parse_message_list(&[
      "zzz".to_owned(),
      "day_obs".to_owned(),
      "-aaa".to_owned(),
    ])
    .unwrap_err();
    match err {
      Error::InvalidOrderBy { bad, .. } => {
        assert_eq!(bad, vec!["-aaa".to_owned(), "zzz".to_owned()]);
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn exposure_sort_rejects_instrument() {
    assert!(
      SortKey::parse_exposure_list(&["instrument".to_owned()]).is_err()
    );
  }

  #[test]
  fn default_query_filters_to_valid_messages() {
    let query = MessageQuery::default();
    let preds = query.predicates();
    assert_eq!(preds, vec![Predicate::BoolEq {
      column: "is_valid",
      value:  true,
    }]);
  }

  #[test]
  fn tri_state_either_contributes_no_predicate() {
    let query = MessageQuery {
      is_valid: TriState::Either,
      ..MessageQuery::default()
    };
    assert!(query.predicates().is_empty());
  }

  #[test]
  fn limit_of_one_is_rejected() {
    let query = MessageQuery { limit: 1, ..MessageQuery::default() };
    assert!(matches!(query.validate(), Err(Error::InvalidLimit(1))));
    let query = MessageQuery { limit: 2, ..MessageQuery::default() };
    assert!(query.validate().is_ok());
  }

  #[test]
  fn exposure_flags_enumerate_as_membership() {
    let query = MessageQuery {
      is_valid:       TriState::Either,
      exposure_flags: Some(vec![ExposureFlag::Junk, ExposureFlag::None]),
      ..MessageQuery::default()
    };
    assert_eq!(query.predicates(), vec![Predicate::OneOf {
      column: "exposure_flag",
      values: vec!["junk".to_owned(), "none".to_owned()],
    }]);
  }
}
