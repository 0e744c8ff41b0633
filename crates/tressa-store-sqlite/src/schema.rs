//! SQL schema for the Tressa SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS clients (
    id                    TEXT PRIMARY KEY,
    name                  TEXT NOT NULL,
    email                 TEXT NOT NULL UNIQUE,   -- stored lower-cased
    phone                 TEXT,
    avatar_url            TEXT,
    notes                 TEXT,
    password_hash         TEXT NOT NULL,          -- argon2 PHC string
    created_at            TEXT NOT NULL,
    -- Summary of the appointments table; recomputed on every appointment write.
    first_visit_date      TEXT,
    last_appointment_date TEXT,
    next_appointment_date TEXT
);

CREATE TABLE IF NOT EXISTS updates (
    id         TEXT PRIMARY KEY,
    client_id  TEXT NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
    category   TEXT NOT NULL,   -- UpdateCategory, snake_case
    content    TEXT NOT NULL,
    created_at TEXT NOT NULL,
    read_at    TEXT,
    liked      INTEGER NOT NULL DEFAULT 0,
    reactions  TEXT NOT NULL DEFAULT '[]'   -- JSON array of strings
);

CREATE TABLE IF NOT EXISTS attachments (
    id           TEXT PRIMARY KEY,
    update_id    TEXT NOT NULL REFERENCES updates(id) ON DELETE CASCADE,
    file_name    TEXT NOT NULL,
    media_type   TEXT NOT NULL,
    path         TEXT NOT NULL,     -- relative to the attachment directory
    content_hash TEXT NOT NULL,     -- SHA-256 hex
    size_bytes   INTEGER NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS appointments (
    id           TEXT PRIMARY KEY,
    client_id    TEXT NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
    scheduled_at TEXT NOT NULL,
    kind         TEXT NOT NULL,
    completed    INTEGER NOT NULL DEFAULT 0,
    notes        TEXT
);

CREATE TABLE IF NOT EXISTS posts (
    id         TEXT PRIMARY KEY,
    title      TEXT NOT NULL,
    content    TEXT NOT NULL,
    image_url  TEXT,
    published  INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS updates_client_idx      ON updates(client_id, created_at);
CREATE INDEX IF NOT EXISTS attachments_update_idx  ON attachments(update_id);
CREATE INDEX IF NOT EXISTS appointments_client_idx ON appointments(client_id);
CREATE INDEX IF NOT EXISTS clients_created_idx     ON clients(created_at);

PRAGMA user_version = 1;
";
