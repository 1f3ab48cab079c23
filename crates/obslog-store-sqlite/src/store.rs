//! [`SqliteMessageStore`] — the SQLite implementation of
//! [`MessageStore`].

use std::path::Path;

use chrono::{DateTime, SubsecRound as _, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use obslog_core::{
  message::{Message, MessageChanges, NewMessage},
  query::MessageQuery,
  store::MessageStore,
};

use crate::{
  Error, Result,
  encode::{RawMessage, encode_dt, encode_string_array, encode_uuid},
  schema::MESSAGE_SCHEMA,
  sql::{MESSAGE_COLUMNS, QueryParts},
};

/// The current time, truncated to the stored microsecond precision so a
/// written timestamp reads back equal.
fn now_micros() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

/// Insert a fully-built message row. `is_valid` is generated by the
/// schema and is never part of an INSERT.
fn insert_message_row(
  conn: &rusqlite::Connection,
  raw: &RawMessage,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO message (
       id, site_id, obs_id, instrument, day_obs, seq_num,
       message_text, level, tags, urls, user_id, user_agent,
       is_human, exposure_flag, date_added, date_invalidated, parent_id
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
               ?14, ?15, ?16, ?17)",
    rusqlite::params![
      raw.id,
      raw.site_id,
      raw.obs_id,
      raw.instrument,
      raw.day_obs,
      raw.seq_num,
      raw.message_text,
      raw.level,
      raw.tags,
      raw.urls,
      raw.user_id,
      raw.user_agent,
      raw.is_human,
      raw.exposure_flag,
      raw.date_added,
      raw.date_invalidated,
      raw.parent_id,
    ],
  )?;
  Ok(())
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// An exposure-log message store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteMessageStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteMessageStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(MESSAGE_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── MessageStore impl ───────────────────────────────────────────────────────

impl MessageStore for SqliteMessageStore {
  type Error = Error;

  async fn add_message(&self, input: NewMessage) -> Result<Message> {
    let message = Message {
      id:               Uuid::new_v4(),
      site_id:          input.site_id,
      obs_id:           input.obs_id,
      instrument:       input.instrument,
      day_obs:          input.day_obs,
      seq_num:          input.seq_num,
      message_text:     input.message_text,
      level:            input.level,
      tags:             input.tags,
      urls:             input.urls,
      user_id:          input.user_id,
      user_agent:       input.user_agent,
      is_human:         input.is_human,
      is_valid:         true,
      exposure_flag:    input.exposure_flag,
      date_added:       now_micros(),
      date_invalidated: None,
      parent_id:        None,
    };

    let raw = RawMessage {
      id:               encode_uuid(message.id),
      site_id:          message.site_id.clone(),
      obs_id:           message.obs_id.clone(),
      instrument:       message.instrument.clone(),
      day_obs:          message.day_obs,
      seq_num:          message.seq_num,
      message_text:     message.message_text.clone(),
      level:            message.level,
      tags:             encode_string_array(&message.tags)?,
      urls:             encode_string_array(&message.urls)?,
      user_id:          message.user_id.clone(),
      user_agent:       message.user_agent.clone(),
      is_human:         message.is_human,
      is_valid:         true,
      exposure_flag:    message.exposure_flag.as_str().to_owned(),
      date_added:       encode_dt(message.date_added),
      date_invalidated: None,
      parent_id:        None,
    };

    self
      .conn
      .call(move |conn| {
        insert_message_row(conn, &raw)?;
        Ok(())
      })
      .await?;

    Ok(message)
  }

  async fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawMessage> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {MESSAGE_COLUMNS} FROM message WHERE id = ?1"
              ),
              rusqlite::params![id_str],
              RawMessage::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawMessage::into_message).transpose()
  }

  async fn invalidate_message(&self, id: Uuid) -> Result<Option<Message>> {
    let id_str = encode_uuid(id);
    let now_str = encode_dt(now_micros());

    // COALESCE makes the write conditional: only a still-null
    // date_invalidated is set, so the first invalidation to commit wins
    // and every later one is a no-op that still returns the row.
    let raw: Option<RawMessage> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "UPDATE message \
                 SET date_invalidated = COALESCE(date_invalidated, ?1) \
                 WHERE id = ?2 \
                 RETURNING {MESSAGE_COLUMNS}"
              ),
              rusqlite::params![now_str, id_str],
              RawMessage::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawMessage::into_message).transpose()
  }

  async fn edit_message(
    &self,
    parent_id: Uuid,
    changes: MessageChanges,
  ) -> Result<Option<Message>> {
    let parent_id_str = encode_uuid(parent_id);
    let child_id_str = encode_uuid(Uuid::new_v4());
    let now_str = encode_dt(now_micros());

    // Pre-encode the override values so the transaction closure deals in
    // column representations only.
    let site_id = changes.site_id;
    let message_text = changes.message_text;
    let level = changes.level;
    let tags = changes.tags.map(|t| encode_string_array(&t)).transpose()?;
    let urls = changes.urls.map(|u| encode_string_array(&u)).transpose()?;
    let user_id = changes.user_id;
    let user_agent = changes.user_agent;
    let is_human = changes.is_human;
    let exposure_flag =
      changes.exposure_flag.map(|flag| flag.as_str().to_owned());

    let raw: Option<RawMessage> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let parent = tx
          .query_row(
            &format!("SELECT {MESSAGE_COLUMNS} FROM message WHERE id = ?1"),
            rusqlite::params![parent_id_str],
            RawMessage::from_row,
          )
          .optional()?;
        let Some(parent) = parent else {
          return Ok(None);
        };

        let child = RawMessage {
          id:               child_id_str,
          site_id,
          obs_id:           parent.obs_id,
          instrument:       parent.instrument,
          day_obs:          parent.day_obs,
          seq_num:          parent.seq_num,
          message_text:     message_text.unwrap_or(parent.message_text),
          level:            level.unwrap_or(parent.level),
          tags:             tags.unwrap_or(parent.tags),
          urls:             urls.unwrap_or(parent.urls),
          user_id:          user_id.unwrap_or(parent.user_id),
          user_agent:       user_agent.unwrap_or(parent.user_agent),
          is_human:         is_human.unwrap_or(parent.is_human),
          is_valid:         true,
          exposure_flag:    exposure_flag.unwrap_or(parent.exposure_flag),
          date_added:       now_str.clone(),
          date_invalidated: None,
          parent_id:        Some(parent.id.clone()),
        };
        insert_message_row(&tx, &child)?;

        // Same conditional write as invalidate_message, with the child's
        // date_added as the invalidation timestamp.
        tx.execute(
          "UPDATE message \
           SET date_invalidated = COALESCE(date_invalidated, ?1) \
           WHERE id = ?2",
          rusqlite::params![now_str, parent.id],
        )?;

        tx.commit()?;
        Ok(Some(child))
      })
      .await?;

    raw.map(RawMessage::into_message).transpose()
  }

  async fn find_messages<'a>(
    &'a self,
    query: &'a MessageQuery,
  ) -> Result<Vec<Message>> {
    query.validate()?;

    let mut parts = QueryParts::new();
    parts.push_predicates("message", query.predicates());
    let (sql, params) = parts.into_select(
      "message",
      MESSAGE_COLUMNS,
      &query.order_by,
      query.limit,
      query.offset,
    );

    let raws: Vec<RawMessage> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawMessage::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMessage::into_message).collect()
  }
}
