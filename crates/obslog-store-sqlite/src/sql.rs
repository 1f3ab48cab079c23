//! Rendering the closed predicate set into one parameterized SELECT.
//!
//! Column and table names only ever come from the schema field tables in
//! `obslog-core`; every caller-supplied value is bound as a parameter.
//!
//! SQLite has no native array-overlap operator, so overlap and exclude
//! predicates on JSON array columns are emulated with `json_each`.
//! Containment uses `instr` rather than `LIKE`: `LIKE` case-folds ASCII
//! and the contract is a case-sensitive substring test.

use obslog_core::query::{Predicate, SortKey};
use rusqlite::types::Value;

use crate::encode::encode_dt;

/// All `message` columns, in [`crate::encode::RawMessage`] order.
pub const MESSAGE_COLUMNS: &str = "id, site_id, obs_id, instrument, \
   day_obs, seq_num, message_text, level, tags, urls, user_id, \
   user_agent, is_human, is_valid, exposure_flag, date_added, \
   date_invalidated, parent_id";

/// All `exposure` columns, in [`crate::encode::RawExposure`] order.
pub const EXPOSURE_COLUMNS: &str = "obs_id, id, instrument, \
   observation_type, observation_reason, day_obs, seq_num, group_name, \
   target_name, science_program, tracking_ra, tracking_dec, sky_angle, \
   timespan_begin, timespan_end";

// ─── QueryParts ──────────────────────────────────────────────────────────────

/// Accumulates WHERE conditions and their bound parameters, then renders
/// the full SELECT. Conditions are conjoined; none at all matches every
/// row.
pub struct QueryParts {
  conditions: Vec<String>,
  params:     Vec<Value>,
}

impl QueryParts {
  pub fn new() -> Self {
    QueryParts { conditions: Vec::new(), params: Vec::new() }
  }

  /// Append one pre-rendered condition with its parameters.
  pub fn push_condition(
    &mut self,
    sql: impl Into<String>,
    params: impl IntoIterator<Item = Value>,
  ) {
    self.conditions.push(sql.into());
    self.params.extend(params);
  }

  /// Render each predicate kind by its fixed rule.
  pub fn push_predicates(&mut self, table: &str, predicates: Vec<Predicate>) {
    for predicate in predicates {
      match predicate {
        Predicate::MinInt { column, value } => {
          self.push_condition(
            format!("{column} >= ?"),
            [Value::Integer(value)],
          );
        }
        Predicate::MaxInt { column, value } => {
          self
            .push_condition(format!("{column} < ?"), [Value::Integer(value)]);
        }
        Predicate::MinTime { column, value } => {
          self.push_condition(
            format!("{column} >= ?"),
            [Value::Text(encode_dt(value))],
          );
        }
        Predicate::MaxTime { column, value } => {
          self.push_condition(
            format!("{column} < ?"),
            [Value::Text(encode_dt(value))],
          );
        }
        Predicate::Presence { column, present } => {
          let not = if present { "NOT " } else { "" };
          self.push_condition(format!("{column} IS {not}NULL"), []);
        }
        Predicate::AnyOverlap { column, values } => {
          let ph = placeholders(values.len());
          self.push_condition(
            format!(
              "EXISTS (SELECT 1 FROM json_each({table}.{column}) \
               WHERE json_each.value IN ({ph}))"
            ),
            values.into_iter().map(Value::Text),
          );
        }
        Predicate::NoneOverlap { column, values } => {
          let ph = placeholders(values.len());
          self.push_condition(
            format!(
              "NOT EXISTS (SELECT 1 FROM json_each({table}.{column}) \
               WHERE json_each.value IN ({ph}))"
            ),
            values.into_iter().map(Value::Text),
          );
        }
        Predicate::OneOf { column, values } => {
          let ph = placeholders(values.len());
          self.push_condition(
            format!("{column} IN ({ph})"),
            values.into_iter().map(Value::Text),
          );
        }
        Predicate::Substring { column, value } => {
          self.push_condition(
            format!("instr({column}, ?) > 0"),
            [Value::Text(value)],
          );
        }
        Predicate::BoolEq { column, value } => {
          self.push_condition(format!("{column} = ?"), [Value::from(value)]);
        }
      }
    }
  }

  /// Render the final SELECT with ordering and pagination.
  pub fn into_select(
    mut self,
    table: &str,
    columns: &str,
    order_by: &[SortKey],
    limit: u32,
    offset: u64,
  ) -> (String, Vec<Value>) {
    let where_clause = if self.conditions.is_empty() {
      String::new()
    } else {
      format!(" WHERE {}", self.conditions.join(" AND "))
    };
    let order = order_clause(order_by);

    let sql = format!(
      "SELECT {columns} FROM {table}{where_clause} \
       ORDER BY {order} LIMIT ? OFFSET ?"
    );
    self.params.push(Value::Integer(i64::from(limit)));
    self.params.push(Value::Integer(offset as i64));
    (sql, self.params)
  }
}

/// Nulls sort as the largest value in either direction.
fn order_clause(keys: &[SortKey]) -> String {
  let rendered: Vec<String> = keys
    .iter()
    .map(|key| {
      if key.descending {
        format!("{} DESC NULLS FIRST", key.field)
      } else {
        format!("{} ASC NULLS LAST", key.field)
      }
    })
    .collect();
  rendered.join(", ")
}

fn placeholders(count: usize) -> String {
  vec!["?"; count].join(", ")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn no_conditions_renders_no_where() {
    let (sql, params) = QueryParts::new().into_select(
      "message",
      "id",
      &[SortKey::id_asc()],
      50,
      0,
    );
    assert_eq!(
      sql,
      "SELECT id FROM message ORDER BY id ASC NULLS LAST LIMIT ? OFFSET ?"
    );
    assert_eq!(params, vec![Value::Integer(50), Value::Integer(0)]);
  }

  #[test]
  fn overlap_renders_json_each_exists() {
    let mut parts = QueryParts::new();
    parts.push_predicates("message", vec![Predicate::AnyOverlap {
      column: "tags",
      values: vec!["a".to_owned(), "b".to_owned()],
    }]);
    let (sql, params) = parts.into_select(
      "message",
      "id",
      &[SortKey { field: "day_obs", descending: true }],
      10,
      4,
    );
    assert_eq!(
      sql,
      "SELECT id FROM message WHERE EXISTS (SELECT 1 FROM \
       json_each(message.tags) WHERE json_each.value IN (?, ?)) \
       ORDER BY day_obs DESC NULLS FIRST LIMIT ? OFFSET ?"
    );
    assert_eq!(params, vec![
      Value::Text("a".to_owned()),
      Value::Text("b".to_owned()),
      Value::Integer(10),
      Value::Integer(4),
    ]);
  }
}
