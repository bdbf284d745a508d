//! libSQL storage for the docset search index.
//!
//! The [`Storage`] struct wraps the `docSet.dsidx` database: the
//! `searchIndex` table documentation browsers read, plus a history of
//! build runs.
//!
//! **Access rules:**
//! - the build pipeline: read-write (sole writer) via [`Storage::open`]
//! - lookups such as `atlasdash search`: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use atlasdash_shared::{DocsetError, IndexRecord, Result};
use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use uuid::Uuid;

/// File name of the index database inside a build directory.
pub const INDEX_DB_NAME: &str = "docSet.dsidx";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DocsetError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DocsetError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| DocsetError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DocsetError::Storage(format!(
                "no index database at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DocsetError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| DocsetError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        DocsetError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(DocsetError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Search index
    // -----------------------------------------------------------------------

    /// Remove every index record. Called once at the start of a build.
    pub async fn truncate_index(&self) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute("DELETE FROM searchIndex", params![])
            .await
            .map_err(|e| DocsetError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Insert an index record. Returns `false` if an identical record exists.
    pub async fn insert_record(&self, record: &IndexRecord) -> Result<bool> {
        self.check_writable()?;
        let changed = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO searchIndex (name, type, path) VALUES (?1, ?2, ?3)",
                params![
                    record.name.as_str(),
                    record.type_name.as_str(),
                    record.path.as_str()
                ],
            )
            .await
            .map_err(|e| DocsetError::Storage(e.to_string()))?;
        Ok(changed > 0)
    }

    /// All index records in insertion order.
    pub async fn list_records(&self) -> Result<Vec<IndexRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT name, type, path FROM searchIndex ORDER BY id",
                params![],
            )
            .await
            .map_err(|e| DocsetError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_record(&row)?);
        }
        Ok(results)
    }

    /// Number of index records.
    pub async fn count_records(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM searchIndex", params![])
            .await
            .map_err(|e| DocsetError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map(|n| n as u64)
                .map_err(|e| DocsetError::Storage(e.to_string())),
            Ok(None) => Ok(0),
            Err(e) => Err(DocsetError::Storage(e.to_string())),
        }
    }

    /// Case-insensitive substring search on record names.
    pub async fn search(&self, query: &str, limit: u32) -> Result<Vec<IndexRecord>> {
        let pattern = format!("%{}%", escape_like(query));
        let mut rows = self
            .conn
            .query(
                "SELECT name, type, path FROM searchIndex
                 WHERE name LIKE ?1 ESCAPE '\\'
                 ORDER BY length(name), name
                 LIMIT ?2",
                params![pattern, limit],
            )
            .await
            .map_err(|e| DocsetError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_record(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Build runs
    // -----------------------------------------------------------------------

    /// Record the start of a deliverable build. Returns the run ID.
    pub async fn insert_build_run(&self, deliverable: &str, locale: &str) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO build_runs (id, deliverable, locale, started_at) VALUES (?1, ?2, ?3, ?4)",
                params![id.as_str(), deliverable, locale, now.as_str()],
            )
            .await
            .map_err(|e| DocsetError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// Mark a build run finished with what it produced.
    pub async fn finish_build_run(&self, run_id: &str, outcome: &BuildOutcome) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE build_runs
                 SET title = ?1, version_text = ?2, doc_version = ?3, record_count = ?4, finished_at = ?5
                 WHERE id = ?6",
                params![
                    outcome.title.as_str(),
                    outcome.version_text.as_str(),
                    outcome.doc_version.as_str(),
                    outcome.record_count as i64,
                    now.as_str(),
                    run_id
                ],
            )
            .await
            .map_err(|e| DocsetError::Storage(e.to_string()))?;
        Ok(())
    }

    /// All build runs, oldest first.
    pub async fn list_build_runs(&self) -> Result<Vec<BuildRun>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, deliverable, locale, title, version_text, doc_version, record_count,
                        started_at, finished_at
                 FROM build_runs ORDER BY started_at, id",
                params![],
            )
            .await
            .map_err(|e| DocsetError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_build_run(&row)?);
        }
        Ok(results)
    }
}

/// What a finished build run produced.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub title: String,
    pub version_text: String,
    pub doc_version: String,
    pub record_count: u64,
}

/// One row of the build run history.
#[derive(Debug, Clone)]
pub struct BuildRun {
    pub id: String,
    pub deliverable: String,
    pub locale: String,
    pub title: Option<String>,
    pub version_text: Option<String>,
    pub doc_version: Option<String>,
    pub record_count: Option<u64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DocsetError::Storage(format!("invalid date: {e}")))
}

/// Convert a database row to an [`IndexRecord`].
fn row_to_record(row: &libsql::Row) -> Result<IndexRecord> {
    Ok(IndexRecord {
        name: row
            .get::<String>(0)
            .map_err(|e| DocsetError::Storage(e.to_string()))?,
        type_name: row
            .get::<String>(1)
            .map_err(|e| DocsetError::Storage(e.to_string()))?,
        path: row
            .get::<String>(2)
            .map_err(|e| DocsetError::Storage(e.to_string()))?,
    })
}

/// Convert a database row to a [`BuildRun`].
fn row_to_build_run(row: &libsql::Row) -> Result<BuildRun> {
    Ok(BuildRun {
        id: row
            .get::<String>(0)
            .map_err(|e| DocsetError::Storage(e.to_string()))?,
        deliverable: row
            .get::<String>(1)
            .map_err(|e| DocsetError::Storage(e.to_string()))?,
        locale: row
            .get::<String>(2)
            .map_err(|e| DocsetError::Storage(e.to_string()))?,
        title: row.get::<String>(3).ok(),
        version_text: row.get::<String>(4).ok(),
        doc_version: row.get::<String>(5).ok(),
        record_count: row.get::<i64>(6).ok().map(|v| v as u64),
        started_at: {
            let s: String = row
                .get(7)
                .map_err(|e| DocsetError::Storage(e.to_string()))?;
            parse_timestamp(&s)?
        },
        finished_at: match row.get::<String>(8) {
            Ok(s) => Some(parse_timestamp(&s)?),
            Err(_) => None,
        },
    })
}
