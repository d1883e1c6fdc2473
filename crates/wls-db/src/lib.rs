//! Storage layer for work log sync.
//!
//! Persists the project/task mapping table and the history of push runs
//! using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` can be moved between threads but not shared without a `Mutex`.
//!
//! # Schema
//!
//! Timestamps are stored as TEXT in RFC 3339 UTC (`2026-02-25T10:30:00Z`) and
//! dates as `YYYY-MM-DD`, so lexicographic order matches chronological order.
//!
//! A mapping row with `source_task IS NULL` is the project-level mapping. The
//! uniqueness index uses `COALESCE(source_task, '')` because SQLite treats
//! NULLs as distinct in unique indexes.

use std::path::Path;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;
use wls_core::{
    DestProjectId, DestTaskId, MappingAction, MappingEntry, MappingOutcome, MappingTable,
    SyncResult, ValidationError,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored mapping row cannot be turned back into a mapping.
    #[error("invalid mapping for {project}: {message}")]
    InvalidMapping { project: String, message: String },

    /// A stored mapping action is not recognised.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Failed to parse a stored timestamp or date.
    #[error("invalid timestamp in sync run {run_id}: {value}")]
    TimestampParse {
        run_id: i64,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A completed push run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRun {
    pub finished_at: DateTime<Utc>,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub dry_run: bool,
    pub synced: usize,
    pub skipped: usize,
    pub failed: usize,
    pub unmapped: usize,
}

impl SyncRun {
    /// Summarizes a finished run over `[from, to]`.
    pub fn from_result(
        result: &SyncResult,
        from: NaiveDate,
        to: NaiveDate,
        dry_run: bool,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            finished_at,
            from,
            to,
            dry_run,
            synced: result.synced,
            skipped: result.skipped,
            failed: result.failed,
            unmapped: result.unmapped.len(),
        }
    }
}

/// A mapping row as stored.
struct MappingRow {
    source_project: String,
    source_task: Option<String>,
    action: String,
    dest_project_id: Option<u64>,
    dest_task_id: Option<u64>,
}

impl TryFrom<MappingRow> for MappingEntry {
    type Error = DbError;

    fn try_from(row: MappingRow) -> Result<Self, Self::Error> {
        let target = match row.action.parse::<MappingAction>()? {
            MappingAction::Skip => MappingOutcome::Skip,
            MappingAction::Map => {
                let project_id =
                    row.dest_project_id
                        .ok_or_else(|| DbError::InvalidMapping {
                            project: row.source_project.clone(),
                            message: "missing destination project id".to_string(),
                        })?;
                MappingOutcome::Mapped {
                    project_id: DestProjectId::new(project_id),
                    task_id: row.dest_task_id.map(DestTaskId::new),
                }
            }
        };
        Ok(Self {
            source_project: row.source_project,
            source_task: row.source_task,
            target,
        })
    }
}

struct SyncRunRow {
    id: i64,
    finished_at: String,
    from_date: String,
    to_date: String,
    dry_run: bool,
    synced: usize,
    skipped: usize,
    failed: usize,
    unmapped: usize,
}

impl TryFrom<SyncRunRow> for SyncRun {
    type Error = DbError;

    fn try_from(row: SyncRunRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let parse_date = |value: &str| {
            NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|source| DbError::TimestampParse {
                run_id: id,
                value: value.to_string(),
                source,
            })
        };
        let finished_at = DateTime::parse_from_rfc3339(&row.finished_at)
            .map_err(|source| DbError::TimestampParse {
                run_id: id,
                value: row.finished_at.clone(),
                source,
            })?
            .with_timezone(&Utc);
        Ok(Self {
            finished_at,
            from: parse_date(&row.from_date)?,
            to: parse_date(&row.to_date)?,
            dry_run: row.dry_run,
            synced: row.synced,
            skipped: row.skipped,
            failed: row.failed,
            unmapped: row.unmapped,
        })
    }
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- Source project/task to destination mapping
            -- action: 'map' (dest_project_id required) or 'skip'
            CREATE TABLE IF NOT EXISTS mappings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_project TEXT NOT NULL,
                source_task TEXT,
                action TEXT NOT NULL CHECK (action IN ('map', 'skip')),
                dest_project_id INTEGER,
                dest_task_id INTEGER,
                updated_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_mappings_source
                ON mappings(source_project, COALESCE(source_task, ''));

            CREATE TABLE IF NOT EXISTS sync_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                finished_at TEXT NOT NULL,
                from_date TEXT NOT NULL,
                to_date TEXT NOT NULL,
                dry_run INTEGER NOT NULL DEFAULT 0,
                synced INTEGER NOT NULL DEFAULT 0,
                skipped INTEGER NOT NULL DEFAULT 0,
                failed INTEGER NOT NULL DEFAULT 0,
                unmapped INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_sync_runs_finished ON sync_runs(finished_at);
            ",
        )?;
        Ok(())
    }

    /// Inserts or replaces the mapping for the entry's `(project, task)` pair.
    ///
    /// Returns `true` when an existing mapping was replaced.
    pub fn upsert_mapping(&mut self, entry: &MappingEntry) -> Result<bool, DbError> {
        let replaced = self.upsert_mappings(std::slice::from_ref(entry))?;
        Ok(replaced > 0)
    }

    /// Upserts several mappings in one transaction. Returns how many replaced
    /// an existing row.
    pub fn upsert_mappings(&mut self, entries: &[MappingEntry]) -> Result<usize, DbError> {
        if entries.is_empty() {
            return Ok(0);
        }
        let now = format_timestamp(Utc::now());
        let tx = self.conn.transaction()?;
        let mut replaced = 0;
        {
            let mut delete = tx.prepare(
                "DELETE FROM mappings WHERE source_project = ? AND source_task IS ?",
            )?;
            let mut insert = tx.prepare(
                "
                INSERT INTO mappings
                (source_project, source_task, action, dest_project_id, dest_task_id, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ",
            )?;
            for entry in entries {
                replaced += delete.execute(params![entry.source_project, entry.source_task])?;
                let (dest_project_id, dest_task_id) = match entry.target {
                    MappingOutcome::Skip => (None, None),
                    MappingOutcome::Mapped {
                        project_id,
                        task_id,
                    } => (Some(project_id.get()), task_id.map(DestTaskId::get)),
                };
                insert.execute(params![
                    entry.source_project,
                    entry.source_task,
                    entry.target.action().as_str(),
                    dest_project_id,
                    dest_task_id,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(count = entries.len(), replaced, "upserted mappings");
        Ok(replaced)
    }

    /// Removes the mapping for exactly this pair. Returns whether one existed.
    pub fn remove_mapping(&mut self, project: &str, task: Option<&str>) -> Result<bool, DbError> {
        let removed = self.conn.execute(
            "DELETE FROM mappings WHERE source_project = ? AND source_task IS ?",
            params![project, task],
        )?;
        Ok(removed > 0)
    }

    /// Lists mappings in insertion order.
    pub fn list_mappings(&self) -> Result<Vec<MappingEntry>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT source_project, source_task, action, dest_project_id, dest_task_id
            FROM mappings
            ORDER BY id ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(MappingRow {
                source_project: row.get(0)?,
                source_task: row.get(1)?,
                action: row.get(2)?,
                dest_project_id: row.get(3)?,
                dest_task_id: row.get(4)?,
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(MappingEntry::try_from(row?)?);
        }
        Ok(entries)
    }

    /// Loads the full mapping table.
    pub fn load_mappings(&self) -> Result<MappingTable, DbError> {
        Ok(MappingTable::from_entries(self.list_mappings()?))
    }

    pub fn mapping_count(&self) -> Result<usize, DbError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM mappings", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Stores a finished push run.
    pub fn record_sync_run(&mut self, run: &SyncRun) -> Result<i64, DbError> {
        self.conn.execute(
            "
            INSERT INTO sync_runs
            (finished_at, from_date, to_date, dry_run, synced, skipped, failed, unmapped)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                format_timestamp(run.finished_at),
                run.from.format(DATE_FORMAT).to_string(),
                run.to.format(DATE_FORMAT).to_string(),
                run.dry_run,
                run.synced,
                run.skipped,
                run.failed,
                run.unmapped,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// The most recent run that actually wrote to the destination.
    ///
    /// Dry runs are ignored.
    pub fn last_sync_run(&self) -> Result<Option<SyncRun>, DbError> {
        let row = self
            .conn
            .query_row(
                "
                SELECT id, finished_at, from_date, to_date, dry_run, synced, skipped, failed, unmapped
                FROM sync_runs
                WHERE dry_run = 0
                ORDER BY finished_at DESC, id DESC
                LIMIT 1
                ",
                [],
                |row| {
                    Ok(SyncRunRow {
                        id: row.get(0)?,
                        finished_at: row.get(1)?,
                        from_date: row.get(2)?,
                        to_date: row.get(3)?,
                        dry_run: row.get(4)?,
                        synced: row.get(5)?,
                        skipped: row.get(6)?,
                        failed: row.get(7)?,
                        unmapped: row.get(8)?,
                    })
                },
            )
            .optional()?;
        row.map(SyncRun::try_from).transpose()
    }
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}
