//! SQL schema for the obslog SQLite databases.
//!
//! Executed once at connection startup; idempotent thanks to
//! `CREATE TABLE IF NOT EXISTS`. Future migrations will be gated on
//! `PRAGMA user_version`.

/// The message table owned by this service.
///
/// `is_valid` is a generated column: it always equals
/// `date_invalidated IS NULL` and cannot be written by any statement.
/// Every column used as a filter or sort hot path carries an index so
/// filtered/sorted/paginated queries stay efficient at scale.
pub const MESSAGE_SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS message (
    id               TEXT PRIMARY KEY,
    site_id          TEXT NOT NULL,
    obs_id           TEXT NOT NULL,
    instrument       TEXT NOT NULL,
    day_obs          INTEGER NOT NULL,  -- YYYYMMDD
    seq_num          INTEGER NOT NULL,
    message_text     TEXT NOT NULL,
    level            INTEGER NOT NULL,
    tags             TEXT NOT NULL DEFAULT '[]',  -- JSON array of words
    urls             TEXT NOT NULL DEFAULT '[]',  -- JSON array
    user_id          TEXT NOT NULL,
    user_agent       TEXT NOT NULL,
    is_human         INTEGER NOT NULL,
    is_valid         INTEGER NOT NULL
        GENERATED ALWAYS AS (date_invalidated IS NULL) VIRTUAL,
    exposure_flag    TEXT NOT NULL,     -- 'none' | 'junk' | 'questionable'
    date_added       TEXT NOT NULL,     -- RFC 3339 UTC; server-assigned
    date_invalidated TEXT,              -- set at most once, never cleared
    parent_id        TEXT REFERENCES message(id)
);

CREATE INDEX IF NOT EXISTS idx_obs_id        ON message(obs_id);
CREATE INDEX IF NOT EXISTS idx_instrument    ON message(instrument);
CREATE INDEX IF NOT EXISTS idx_day_obs       ON message(day_obs);
CREATE INDEX IF NOT EXISTS idx_user_id       ON message(user_id);
CREATE INDEX IF NOT EXISTS idx_is_valid      ON message(is_valid);
CREATE INDEX IF NOT EXISTS idx_exposure_flag ON message(exposure_flag);
CREATE INDEX IF NOT EXISTS idx_date_added    ON message(date_added);

PRAGMA user_version = 1;
";

/// The exposure table of a registry database.
///
/// Registries are produced by the acquisition systems; this DDL exists so
/// a local mirror can be bootstrapped. The service itself only reads.
pub const REGISTRY_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS exposure (
    id                 INTEGER PRIMARY KEY,
    obs_id             TEXT NOT NULL,
    instrument         TEXT NOT NULL,
    observation_type   TEXT NOT NULL,
    observation_reason TEXT NOT NULL,
    day_obs            INTEGER NOT NULL,  -- YYYYMMDD
    seq_num            INTEGER NOT NULL,
    group_name         TEXT NOT NULL,
    target_name        TEXT NOT NULL,
    science_program    TEXT NOT NULL,
    tracking_ra        REAL,              -- NULL off sky
    tracking_dec       REAL,              -- NULL off sky
    sky_angle          REAL,
    timespan_begin     TEXT,              -- RFC 3339 UTC
    timespan_end       TEXT
);

CREATE INDEX IF NOT EXISTS exposure_instrument_idx ON exposure(instrument);
CREATE INDEX IF NOT EXISTS exposure_obs_id_idx     ON exposure(obs_id);
";
