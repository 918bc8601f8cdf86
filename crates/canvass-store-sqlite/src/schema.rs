//! SQL schemas for the two SQLite stores.
//!
//! Both are idempotent thanks to `CREATE TABLE IF NOT EXISTS` and stamp
//! `PRAGMA user_version` so later migrations can be gated on it.

/// Offline cache: one container per entity kind plus a settings table.
///
/// Each container keeps the entity as a JSON document next to its sync
/// bookkeeping. Table names match `EntityKind`.
pub const LOCAL_SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS pins (
    key       TEXT PRIMARY KEY,
    body      TEXT NOT NULL,                -- JSON-encoded entity
    offline   INTEGER NOT NULL DEFAULT 0,   -- 1 until the remote store confirms
    revision  INTEGER NOT NULL DEFAULT 1,   -- bumped on every put
    stored_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS follow_ups (
    key       TEXT PRIMARY KEY,
    body      TEXT NOT NULL,
    offline   INTEGER NOT NULL DEFAULT 0,
    revision  INTEGER NOT NULL DEFAULT 1,
    stored_at TEXT NOT NULL
);

-- Keyed by pin_id: at most one customer per pin.
CREATE TABLE IF NOT EXISTS customers (
    key       TEXT PRIMARY KEY,
    body      TEXT NOT NULL,
    offline   INTEGER NOT NULL DEFAULT 0,
    revision  INTEGER NOT NULL DEFAULT 1,
    stored_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS territories (
    key       TEXT PRIMARY KEY,
    body      TEXT NOT NULL,
    offline   INTEGER NOT NULL DEFAULT 0,
    revision  INTEGER NOT NULL DEFAULT 1,
    stored_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL                     -- JSON
);

CREATE INDEX IF NOT EXISTS pins_offline_idx        ON pins(offline);
CREATE INDEX IF NOT EXISTS follow_ups_offline_idx  ON follow_ups(offline);
CREATE INDEX IF NOT EXISTS customers_offline_idx   ON customers(offline);
CREATE INDEX IF NOT EXISTS territories_offline_idx ON territories(offline);

PRAGMA user_version = 1;
";

/// System of record: typed tables, one row per entity.
pub const RECORD_SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS pins (
    id            TEXT PRIMARY KEY,
    lat           REAL NOT NULL,
    lng           REAL NOT NULL,
    address       TEXT NOT NULL,
    place_id      TEXT,
    property_name TEXT,
    status        TEXT NOT NULL DEFAULT 'new',
    created_at    TEXT NOT NULL,   -- RFC 3339 UTC, fixed microsecond precision
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS territories (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    color       TEXT NOT NULL,
    coordinates TEXT NOT NULL,     -- JSON array of {lat, lng}
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- Follow-ups may reference a pin that has not been written yet, so pin_id
-- carries no foreign key.
CREATE TABLE IF NOT EXISTS follow_ups (
    id            TEXT PRIMARY KEY,
    pin_id        TEXT NOT NULL,
    address       TEXT NOT NULL,
    property_name TEXT,
    date          TEXT NOT NULL,   -- YYYY-MM-DD
    time          TEXT NOT NULL,   -- HH:MM
    notes         TEXT,
    status        TEXT NOT NULL DEFAULT 'scheduled',
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS customers (
    id          TEXT PRIMARY KEY,
    pin_id      TEXT NOT NULL UNIQUE REFERENCES pins(id) ON DELETE CASCADE,
    first_name  TEXT NOT NULL,
    phone       TEXT,
    email       TEXT,
    owns_crypto INTEGER NOT NULL DEFAULT 0,
    socials     TEXT NOT NULL DEFAULT '{}',
    notes       TEXT,
    address     TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS pins_created_idx        ON pins(created_at);
CREATE INDEX IF NOT EXISTS territories_created_idx ON territories(created_at);
CREATE INDEX IF NOT EXISTS follow_ups_pin_idx      ON follow_ups(pin_id);
CREATE INDEX IF NOT EXISTS follow_ups_when_idx     ON follow_ups(date, time);

PRAGMA user_version = 1;
";
