//! SQL migration definitions for the docset index database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Docset search index",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Docset index, in the layout documentation browsers read
CREATE TABLE IF NOT EXISTS searchIndex (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    type TEXT,
    path TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS anchor ON searchIndex (name, type, path);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Build run history",
            sql: r#"
CREATE TABLE IF NOT EXISTS build_runs (
    id           TEXT PRIMARY KEY,
    deliverable  TEXT NOT NULL,
    locale       TEXT NOT NULL,
    title        TEXT,
    version_text TEXT,
    doc_version  TEXT,
    record_count INTEGER,
    started_at   TEXT NOT NULL,
    finished_at  TEXT
);

CREATE INDEX IF NOT EXISTS idx_build_runs_deliverable ON build_runs(deliverable);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
