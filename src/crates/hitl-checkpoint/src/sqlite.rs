//! SQLite-backed checkpoint storage
//!
//! Durable store for threads that must survive restarts. Every checkpoint is
//! one row keyed by `(thread_id, sequence)`; structured columns are JSON text
//! written through [`JsonSerializer`].
//!
//! Appends are a single conditional `INSERT ... SELECT` that only writes when
//! the thread's current maximum sequence matches what the caller expected, so
//! the optimistic concurrency check holds across processes sharing the file.

use crate::checkpoint::{Checkpoint, CheckpointSource, PendingInterrupt, ThreadSummary, WorkflowState};
use crate::error::{CheckpointError, Result};
use crate::serializer::{JsonSerializer, SerializerProtocol};
use crate::traits::{check_sequence, CheckpointStore};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_WRITE_ATTEMPTS: u32 = 5;

const SELECT_COLUMNS: &str = "thread_id, sequence, workflow, state, next_step, pending_interrupt, \
                              resume_values, source, created_at";

/// Checkpoint store on a SQLite database file
#[derive(Debug, Clone)]
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
    serializer: JsonSerializer,
}

impl SqliteCheckpointStore {
    /// Open (creating if needed) the database at `database_path` and apply migrations
    pub async fn connect<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        Self::connect_with_max_connections(database_path, 5).await
    }

    /// Same as [`connect`](Self::connect) with a custom pool size
    pub async fn connect_with_max_connections<P: AsRef<Path>>(
        database_path: P,
        max_connections: u32,
    ) -> Result<Self> {
        let path = database_path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        debug!(path = %path.display(), "Connecting to checkpoint database");

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| storage("failed to connect to checkpoint database", e))?;

        let store = Self::from_pool(pool).await?;
        info!(path = %path.display(), "Checkpoint database ready");
        Ok(store)
    }

    /// Private in-memory database (single connection), mostly for tests
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| storage("failed to open in-memory database", e))?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool and apply migrations
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self {
            pool,
            serializer: JsonSerializer::new(),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run_migrations(&self) -> Result<()> {
        debug!("Running checkpoint migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| storage("checkpoint migration failed", e))?;
        Ok(())
    }

    /// Round-trip a trivial query
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| storage("health check failed", e))?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn row_to_checkpoint(&self, row: &SqliteRow) -> Result<Checkpoint> {
        let sequence: i64 = column(row, "sequence")?;
        let state: String = column(row, "state")?;
        let pending: Option<String> = column(row, "pending_interrupt")?;
        let resume_values: String = column(row, "resume_values")?;
        let source: String = column(row, "source")?;
        let created_at: String = column(row, "created_at")?;

        Ok(Checkpoint {
            thread_id: column(row, "thread_id")?,
            workflow: column(row, "workflow")?,
            sequence: u64::try_from(sequence)
                .map_err(|_| CheckpointError::Invalid(format!("negative sequence {}", sequence)))?,
            state: self.serializer.loads_text::<WorkflowState>(&state)?,
            next_step: column(row, "next_step")?,
            pending_interrupt: pending
                .map(|text| self.serializer.loads_text::<PendingInterrupt>(&text))
                .transpose()?,
            resume_values: self.serializer.loads_text::<Vec<Value>>(&resume_values)?,
            source: CheckpointSource::parse(&source)
                .ok_or_else(|| CheckpointError::Invalid(format!("unknown checkpoint source '{}'", source)))?,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| CheckpointError::Invalid(format!("bad created_at '{}': {}", created_at, e)))?
                .with_timezone(&Utc),
        })
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn get_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let sql = format!(
            "SELECT {} FROM checkpoints WHERE thread_id = ? ORDER BY sequence DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(thread_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage("failed to load latest checkpoint", e))?;

        row.map(|row| self.row_to_checkpoint(&row)).transpose()
    }

    async fn put(&self, checkpoint: &Checkpoint, expected_latest: Option<u64>) -> Result<()> {
        check_sequence(checkpoint, expected_latest)?;

        let sequence = to_i64(checkpoint.sequence)?;
        let expected = expected_latest.map(to_i64).transpose()?;
        let state = self.serializer.dumps_text(&checkpoint.state)?;
        let pending = checkpoint
            .pending_interrupt
            .as_ref()
            .map(|p| self.serializer.dumps_text(p))
            .transpose()?;
        let resume_values = self.serializer.dumps_text(&checkpoint.resume_values)?;
        let created_at = checkpoint.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true);

        let mut attempt = 0;
        let result = loop {
            attempt += 1;
            let result = sqlx::query(
                "INSERT INTO checkpoints (thread_id, sequence, workflow, state, next_step, \
                 pending_interrupt, resume_values, source, created_at) \
                 SELECT ?, ?, ?, ?, ?, ?, ?, ?, ? \
                 WHERE (SELECT MAX(sequence) FROM checkpoints WHERE thread_id = ?) IS ?",
            )
            .bind(&checkpoint.thread_id)
            .bind(sequence)
            .bind(&checkpoint.workflow)
            .bind(&state)
            .bind(&checkpoint.next_step)
            .bind(&pending)
            .bind(&resume_values)
            .bind(checkpoint.source.as_str())
            .bind(&created_at)
            .bind(&checkpoint.thread_id)
            .bind(expected)
            .execute(&self.pool)
            .await;

            // Another connection committed between our read and write; re-evaluate
            match &result {
                Err(e) if is_busy(e) && attempt < MAX_WRITE_ATTEMPTS => {
                    tokio::time::sleep(Duration::from_millis(5 * attempt as u64)).await;
                }
                _ => break result,
            }
        };

        let conflict = match result {
            Ok(done) => done.rows_affected() == 0,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => true,
            Err(e) => return Err(storage("failed to write checkpoint", e)),
        };

        if conflict {
            let found = self.latest_sequence(&checkpoint.thread_id).await?;
            warn!(
                thread_id = %checkpoint.thread_id,
                expected = ?expected_latest,
                found = ?found,
                "Rejected stale checkpoint write"
            );
            return Err(CheckpointError::Stale {
                thread_id: checkpoint.thread_id.clone(),
                expected: expected_latest,
                found,
            });
        }

        debug!(
            thread_id = %checkpoint.thread_id,
            sequence = checkpoint.sequence,
            source = checkpoint.source.as_str(),
            "Checkpoint written"
        );
        Ok(())
    }

    async fn list(&self, thread_id: &str, limit: Option<usize>) -> Result<Vec<Checkpoint>> {
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
        let sql = format!(
            "SELECT {} FROM checkpoints WHERE thread_id = ? ORDER BY sequence DESC LIMIT ?",
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(thread_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage("failed to list checkpoints", e))?;

        rows.iter().map(|row| self.row_to_checkpoint(row)).collect()
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM checkpoints WHERE thread_id = ?")
            .bind(thread_id)
            .execute(&self.pool)
            .await
            .map_err(|e| storage("failed to delete thread", e))?;

        info!(thread_id = %thread_id, removed = result.rows_affected(), "Thread deleted");
        Ok(result.rows_affected())
    }

    async fn list_threads(&self) -> Result<Vec<ThreadSummary>> {
        let sql = format!(
            "SELECT {} FROM checkpoints c \
             WHERE sequence = (SELECT MAX(sequence) FROM checkpoints m WHERE m.thread_id = c.thread_id) \
             ORDER BY created_at DESC",
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage("failed to list threads", e))?;

        rows.iter()
            .map(|row| self.row_to_checkpoint(row).map(|c| ThreadSummary::from(&c)))
            .collect()
    }

    async fn latest_sequence(&self, thread_id: &str) -> Result<Option<u64>> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(sequence) FROM checkpoints WHERE thread_id = ?")
            .bind(thread_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| storage("failed to read latest sequence", e))?;

        Ok(max.and_then(|seq| u64::try_from(seq).ok()))
    }
}

fn is_busy(error: &sqlx::Error) -> bool {
    match error {
        // SQLITE_BUSY and SQLITE_LOCKED, including extended codes
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .map_or(false, |code| matches!(code & 0xff, 5 | 6)),
        _ => false,
    }
}

fn storage(context: &str, error: impl std::fmt::Display) -> CheckpointError {
    CheckpointError::Storage(format!("{}: {}", context, error))
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| storage(&format!("failed to read column '{}'", name), e))
}

fn to_i64(sequence: u64) -> Result<i64> {
    i64::try_from(sequence)
        .map_err(|_| CheckpointError::Invalid(format!("sequence {} out of range", sequence)))
}
