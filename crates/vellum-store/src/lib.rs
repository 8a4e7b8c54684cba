//! Vellum Storage Layer
//!
//! Implements the `JobTracker` and `ResultSink` traits using SQLite.
//!
//! # Architecture
//!
//! - `extraction_jobs`: one row per job, overwritten as progress is pushed
//! - `extraction_results`: one JSON document per source document, upserted
//!
//! The extractor only writes. The read helpers (`get_job`, `active_job_for`,
//! `get_result`, ...) exist for operators and the CLI.
//!
//! # Examples
//!
//! ```no_run
//! use vellum_store::SqliteStore;
//!
//! let store = SqliteStore::new("vellum.db").unwrap();
//! // Store is now ready to track jobs
//! ```

#![warn(missing_docs)]

use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};
use vellum_domain::traits::{JobTracker, ResultSink};
use vellum_domain::{ExtractionResult, JobHandle, JobProgress, JobStatus};

/// Longest error message kept on a failed job
pub const MAX_ERROR_MESSAGE_CHARS: usize = 500;

/// How long a second process waits on a locked database
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Result could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Job not found
    #[error("Job not found: {0}")]
    NotFound(String),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// A job row as stored
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    /// Job handle
    pub handle: JobHandle,
    /// Document the job runs on
    pub document_ref: String,
    /// Last reported status
    pub status: JobStatus,
    /// Last reported percentage
    pub progress: u8,
    /// Last reported phase
    pub phase: Option<String>,
    /// Last reported message
    pub message: Option<String>,
    /// Chunks finished
    pub chunks_completed: u32,
    /// Chunks planned
    pub chunks_total: u32,
    /// Records accumulated
    pub records_extracted: u32,
    /// Records expected
    pub records_expected: u32,
    /// Stored result, once complete
    pub result_ref: Option<String>,
    /// Failure message, truncated
    pub error_message: Option<String>,
    /// Creation time (unix seconds)
    pub created_at: u64,
    /// Last update time (unix seconds)
    pub updated_at: u64,
    /// Completion or failure time (unix seconds)
    pub completed_at: Option<u64>,
}

const JOB_COLUMNS: &str = "id, document_ref, status, progress, phase, message, chunks_completed, chunks_total,
     records_extracted, records_expected, result_ref, error_message, created_at, updated_at, completed_at";

/// SQLite-based job tracker and result sink
///
/// # Thread Safety
///
/// SQLite connections are not thread-safe. Each thread should have its own SqliteStore instance.
/// Separate processes may share one database file: `create_job` takes the
/// write lock before checking for an active job.
pub struct SqliteStore {
    conn: Connection,
    stale_after: Option<Duration>,
}

impl SqliteStore {
    /// Create a new SqliteStore with the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mut store = Self {
            conn,
            stale_after: None,
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Treat non-terminal jobs with no update for `stale_after` as abandoned
    ///
    /// A process that dies mid-run leaves its job non-terminal, which would
    /// block the document forever. With a cutoff set, `create_job` fails such
    /// jobs before checking for an active one.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = Some(stale_after);
        self
    }

    /// Initialize the database schema
    fn initialize_schema(&mut self) -> Result<(), StoreError> {
        let schema = include_str!("schema.sql");
        self.conn.execute_batch(schema)?;
        Ok(())
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    /// Convert JobHandle to bytes for storage
    fn handle_to_bytes(handle: JobHandle) -> Vec<u8> {
        handle.value().to_be_bytes().to_vec()
    }

    /// Convert bytes to JobHandle
    fn bytes_to_handle(bytes: &[u8]) -> Result<JobHandle, StoreError> {
        let arr: [u8; 16] = bytes.try_into().map_err(|_| {
            StoreError::InvalidData(format!("Expected 16 bytes for JobHandle, got {}", bytes.len()))
        })?;
        Ok(JobHandle::from_value(u128::from_be_bytes(arr)))
    }

    fn row_to_job(row: &Row<'_>) -> rusqlite::Result<JobRecord> {
        let id_bytes: Vec<u8> = row.get(0)?;
        let handle = Self::bytes_to_handle(&id_bytes)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Blob, Box::new(e)))?;
        let status_str: String = row.get(2)?;
        let status = JobStatus::parse(&status_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                Box::new(StoreError::InvalidData(format!("Unknown job status: {}", status_str))),
            )
        })?;
        let completed_at: Option<i64> = row.get(14)?;

        Ok(JobRecord {
            handle,
            document_ref: row.get(1)?,
            status,
            progress: row.get::<_, i64>(3)?.clamp(0, 100) as u8,
            phase: row.get(4)?,
            message: row.get(5)?,
            chunks_completed: row.get(6)?,
            chunks_total: row.get(7)?,
            records_extracted: row.get(8)?,
            records_expected: row.get(9)?,
            result_ref: row.get(10)?,
            error_message: row.get(11)?,
            created_at: row.get::<_, i64>(12)? as u64,
            updated_at: row.get::<_, i64>(13)? as u64,
            completed_at: completed_at.map(|t| t as u64),
        })
    }

    /// Get a job by handle
    pub fn get_job(&self, handle: JobHandle) -> Result<Option<JobRecord>, StoreError> {
        let sql = format!("SELECT {} FROM extraction_jobs WHERE id = ?1", JOB_COLUMNS);
        let job = self
            .conn
            .query_row(&sql, params![Self::handle_to_bytes(handle)], Self::row_to_job)
            .optional()?;
        Ok(job)
    }

    /// The non-terminal job for a document, if any
    pub fn active_job_for(&self, document_ref: &str) -> Result<Option<JobRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM extraction_jobs
             WHERE document_ref = ?1 AND status NOT IN ('complete', 'failed')
             ORDER BY rowid DESC LIMIT 1",
            JOB_COLUMNS
        );
        let job = self
            .conn
            .query_row(&sql, params![document_ref], Self::row_to_job)
            .optional()?;
        Ok(job)
    }

    /// Most recently created job for a document
    pub fn latest_job_for(&self, document_ref: &str) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.job_history(document_ref, 1)?.into_iter().next())
    }

    /// Jobs for a document, newest first
    pub fn job_history(&self, document_ref: &str, limit: usize) -> Result<Vec<JobRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM extraction_jobs WHERE document_ref = ?1 ORDER BY rowid DESC LIMIT ?2",
            JOB_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let jobs = stmt
            .query_map(params![document_ref, limit as i64], Self::row_to_job)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    /// Stored result for a document
    pub fn get_result(&self, document_ref: &str) -> Result<Option<ExtractionResult>, StoreError> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT result_json FROM extraction_results WHERE document_ref = ?1",
                params![document_ref],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| serde_json::from_str(&j).map_err(StoreError::from))
            .transpose()
    }

    /// Fail the active job for a document, returning its handle
    ///
    /// Operator escape hatch for a job whose process is gone.
    pub fn fail_active_job(&mut self, document_ref: &str, message: &str) -> Result<Option<JobHandle>, StoreError> {
        let Some(job) = self.active_job_for(document_ref)? else {
            return Ok(None);
        };
        self.fail_job(job.handle, message)?;
        warn!(document = document_ref, job = %job.handle, "Failed active job by request");
        Ok(Some(job.handle))
    }

    fn update_job(&mut self, handle: JobHandle, sql: &str, values: &[&dyn rusqlite::ToSql]) -> Result<(), StoreError> {
        let mut params: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(values.len() + 1);
        let id = Self::handle_to_bytes(handle);
        params.push(&id);
        params.extend_from_slice(values);
        let changed = self.conn.execute(sql, &params[..])?;
        if changed == 0 {
            return Err(StoreError::NotFound(handle.to_string()));
        }
        Ok(())
    }
}

impl JobTracker for SqliteStore {
    type Error = StoreError;

    fn create_job(&mut self, document_ref: &str) -> Result<Option<JobHandle>, Self::Error> {
        let stale_after = self.stale_after;
        let now = Self::now();
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(stale_after) = stale_after {
            let cutoff = now.saturating_sub(stale_after.as_secs() as i64);
            let message = format!("abandoned: no progress for {}s", stale_after.as_secs());
            let reaped = tx.execute(
                "UPDATE extraction_jobs SET status = 'failed', error_message = ?2, updated_at = ?3, completed_at = ?3
                 WHERE document_ref = ?1 AND status NOT IN ('complete', 'failed') AND updated_at < ?4",
                params![document_ref, message, now, cutoff],
            )?;
            if reaped > 0 {
                warn!(document = document_ref, jobs = reaped, "Failed stale jobs");
            }
        }

        let active: bool = tx
            .query_row(
                "SELECT 1 FROM extraction_jobs
                 WHERE document_ref = ?1 AND status NOT IN ('complete', 'failed') LIMIT 1",
                params![document_ref],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if active {
            debug!(document = document_ref, "Job already active");
            return Ok(None);
        }

        let handle = JobHandle::new();
        tx.execute(
            "INSERT INTO extraction_jobs (id, document_ref, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![Self::handle_to_bytes(handle), document_ref, JobStatus::Pending.as_str(), now],
        )?;
        tx.commit()?;
        Ok(Some(handle))
    }

    fn update_progress(&mut self, handle: JobHandle, progress: &JobProgress) -> Result<(), Self::Error> {
        let status = progress.status.as_str();
        let percentage = progress.percentage as i64;
        let chunks_completed = progress.chunks_completed as i64;
        let chunks_total = progress.chunks_total as i64;
        let records_extracted = progress.records_extracted as i64;
        let records_expected = progress.records_expected as i64;
        let now = Self::now();
        self.update_job(
            handle,
            "UPDATE extraction_jobs SET status = ?2, progress = ?3, phase = ?4, message = ?5,
                 chunks_completed = ?6, chunks_total = ?7, records_extracted = ?8, records_expected = ?9,
                 updated_at = ?10
             WHERE id = ?1",
            &[
                &status,
                &percentage,
                &progress.phase,
                &progress.message,
                &chunks_completed,
                &chunks_total,
                &records_extracted,
                &records_expected,
                &now,
            ],
        )
    }

    fn complete_job(&mut self, handle: JobHandle, result_ref: &str) -> Result<(), Self::Error> {
        let now = Self::now();
        self.update_job(
            handle,
            "UPDATE extraction_jobs SET status = ?2, progress = 100, phase = 'complete', result_ref = ?3,
                 updated_at = ?4, completed_at = ?4
             WHERE id = ?1",
            &[&JobStatus::Complete.as_str(), &result_ref, &now],
        )
    }

    fn fail_job(&mut self, handle: JobHandle, message: &str) -> Result<(), Self::Error> {
        let truncated: String = message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect();
        let now = Self::now();
        self.update_job(
            handle,
            "UPDATE extraction_jobs SET status = ?2, error_message = ?3, updated_at = ?4, completed_at = ?4
             WHERE id = ?1",
            &[&JobStatus::Failed.as_str(), &truncated, &now],
        )
    }
}

impl ResultSink for SqliteStore {
    type Error = StoreError;

    fn upsert_result(&mut self, result: &ExtractionResult) -> Result<String, Self::Error> {
        let json = serde_json::to_string(result)?;
        let now = Self::now();
        self.conn.execute(
            "INSERT INTO extraction_results
                 (id, document_ref, result_json, record_count, completeness_rate, coverage_score, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT(document_ref) DO UPDATE SET
                 result_json = excluded.result_json,
                 record_count = excluded.record_count,
                 completeness_rate = excluded.completeness_rate,
                 coverage_score = excluded.coverage_score,
                 updated_at = excluded.updated_at",
            params![
                uuid::Uuid::now_v7().to_string(),
                &result.document_ref,
                json,
                result.records.len() as i64,
                result.completeness_rate,
                result.coverage_summary.overall_score,
                now,
            ],
        )?;

        let id: String = self.conn.query_row(
            "SELECT id FROM extraction_results WHERE document_ref = ?1",
            params![&result.document_ref],
            |row| row.get(0),
        )?;
        debug!(document = %result.document_ref, result_ref = %id, "Stored extraction result");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_bytes_round_trip() {
        let handle = JobHandle::new();
        let bytes = SqliteStore::handle_to_bytes(handle);
        assert_eq!(SqliteStore::bytes_to_handle(&bytes).unwrap(), handle);
        assert!(SqliteStore::bytes_to_handle(&bytes[..8]).is_err());
    }

    #[test]
    fn test_unknown_handle_not_found() {
        let mut store = SqliteStore::new(":memory:").unwrap();
        let err = store.fail_job(JobHandle::new(), "boom").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
