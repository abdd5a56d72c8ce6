//! SQL schema for the Weaver SQLite store.
//!
//! Executed once at connection startup. `seq` columns record insertion
//! order, which listing and edge scans follow.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS entities (
    seq           INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_id     TEXT NOT NULL UNIQUE,
    kind          TEXT NOT NULL,   -- 'note' | 'url_context' | 'category' | 'concept' | 'domain'
    name          TEXT NOT NULL,
    data          TEXT NOT NULL,   -- JSON object
    observations  TEXT NOT NULL DEFAULT '[]',
    created_at    TEXT NOT NULL,   -- ISO 8601 UTC; server-assigned
    updated_at    TEXT NOT NULL
);

-- Edges are keyed by '{from}-{KIND}-{to}', so rewriting one is an upsert.
-- No foreign keys: an edge may be written before its endpoints.
CREATE TABLE IF NOT EXISTS relationships (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    rel_id      TEXT NOT NULL UNIQUE,
    from_id     TEXT NOT NULL,
    to_id       TEXT NOT NULL,
    kind        TEXT NOT NULL,
    strength    REAL NOT NULL,
    metadata    TEXT NOT NULL DEFAULT '{}',
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS entities_kind_idx    ON entities(kind);
CREATE INDEX IF NOT EXISTS relationships_from_idx ON relationships(from_id);
CREATE INDEX IF NOT EXISTS relationships_to_idx   ON relationships(to_id, kind);

PRAGMA user_version = 1;
";
