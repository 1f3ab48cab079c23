//! [`SqliteRegistry`] — read-only access to an exposure-registry
//! database.
//!
//! The registry is an external collaborator: the acquisition systems
//! write it, this service only queries it. [`SqliteRegistry::add_exposure`]
//! exists to seed local and development mirrors; no service code path
//! calls it.

use std::path::Path;

use rusqlite::types::Value;

use obslog_core::{
  exposure::Exposure,
  query::ExposureQuery,
  registry::ExposureRegistry,
};

use crate::{
  encode::{encode_dt, RawExposure},
  schema::REGISTRY_SCHEMA,
  sql::{QueryParts, EXPOSURE_COLUMNS},
  Error, Result,
};

/// One exposure-registry database. Clones share the underlying
/// connection.
#[derive(Clone)]
pub struct SqliteRegistry {
  conn: tokio_rusqlite::Connection,
}

impl SqliteRegistry {
  /// Open a registry database at `path`, bootstrapping the schema if the
  /// file is new.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let registry = Self { conn };
    registry.init_schema().await?;
    Ok(registry)
  }

  /// Open an in-memory registry — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let registry = Self { conn };
    registry.init_schema().await?;
    Ok(registry)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(REGISTRY_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert an exposure record. Seeding aid for local/dev mirrors only.
  pub async fn add_exposure(&self, exposure: &Exposure) -> Result<()> {
    let exposure = exposure.clone();
    let begin = exposure.timespan_begin.map(encode_dt);
    let end = exposure.timespan_end.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO exposure (
             obs_id, id, instrument, observation_type, observation_reason,
             day_obs, seq_num, group_name, target_name, science_program,
             tracking_ra, tracking_dec, sky_angle,
             timespan_begin, timespan_end
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                     ?13, ?14, ?15)",
          rusqlite::params![
            exposure.obs_id,
            exposure.id,
            exposure.instrument,
            exposure.observation_type,
            exposure.observation_reason,
            exposure.day_obs,
            exposure.seq_num,
            exposure.group_name,
            exposure.target_name,
            exposure.science_program,
            exposure.tracking_ra,
            exposure.tracking_dec,
            exposure.sky_angle,
            begin,
            end,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── ExposureRegistry impl ───────────────────────────────────────────────────

impl ExposureRegistry for SqliteRegistry {
  type Error = Error;

  async fn find_exposure<'a>(
    &'a self,
    instrument: &'a str,
    obs_id: &'a str,
  ) -> Result<Option<Exposure>> {
    let instrument_owned = instrument.to_owned();
    let obs_id_owned = obs_id.to_owned();

    let raws: Vec<RawExposure> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {EXPOSURE_COLUMNS} FROM exposure \
           WHERE instrument = ?1 AND obs_id = ?2 LIMIT 2"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![instrument_owned, obs_id_owned],
            RawExposure::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut iter = raws.into_iter();
    match (iter.next(), iter.next()) {
      (None, _) => Ok(None),
      (Some(raw), None) => raw.into_exposure().map(Some),
      (Some(_), Some(_)) => Err(Error::AmbiguousExposure {
        instrument: instrument.to_owned(),
        obs_id:     obs_id.to_owned(),
      }),
    }
  }

  async fn find_exposures<'a>(
    &'a self,
    instrument: &'a str,
    query: &'a ExposureQuery,
  ) -> Result<Vec<Exposure>> {
    query.validate()?;

    let mut parts = QueryParts::new();
    parts
      .push_condition("instrument = ?", [Value::Text(instrument.to_owned())]);
    parts.push_predicates("exposure", query.predicates());

    // Date filters use interval-overlap semantics: an exposure spans
    // [timespan_begin, timespan_end], not a point in time. The lower
    // bound is exclusive on the span end, the upper bound inclusive on
    // the span begin. Spans with unknown endpoints never match.
    if let Some(min_date) = query.min_date {
      parts.push_condition(
        "timespan_end > ?",
        [Value::Text(encode_dt(min_date))],
      );
    }
    if let Some(max_date) = query.max_date {
      parts.push_condition(
        "timespan_begin <= ?",
        [Value::Text(encode_dt(max_date))],
      );
    }

    let (sql, params) = parts.into_select(
      "exposure",
      EXPOSURE_COLUMNS,
      &query.order_by,
      query.limit,
      query.offset,
    );

    let raws: Vec<RawExposure> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params_from_iter(params),
            RawExposure::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawExposure::into_exposure).collect()
  }

  async fn instruments(&self) -> Result<Vec<String>> {
    let names: Vec<String> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT instrument FROM exposure ORDER BY instrument",
        )?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(names)
  }
}
