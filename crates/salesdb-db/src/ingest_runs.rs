//! Database operations for `ingest_runs` and `ingest_files`.

use chrono::{DateTime, Utc};
use salesdb_core::RunSummary;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `ingest_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IngestRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub strategy: String,
    pub status: String,
    pub files_total: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Serialized [`RunSummary`]; set when the run finishes.
    pub summary: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl IngestRunRow {
    /// Decode the stored summary, if any.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialize`] if the stored JSON is not a summary.
    pub fn run_summary(&self) -> Result<Option<RunSummary>, DbError> {
        self.summary
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .map_err(DbError::from)
    }
}

/// A row from the `ingest_files` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IngestFileRow {
    pub id: i64,
    pub ingest_run_id: i64,
    pub path: String,
    pub sha256: Option<String>,
    pub layout: Option<String>,
    pub status: String,
    pub rows_parsed: i32,
    pub records_normalized: i32,
    pub rows_upserted: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-file result to record against a run.
#[derive(Debug, Clone)]
pub struct NewIngestFile<'a> {
    pub path: &'a str,
    pub sha256: Option<&'a str>,
    pub layout: Option<&'a str>,
    /// `succeeded` or `failed`.
    pub status: &'a str,
    pub rows_parsed: i32,
    pub records_normalized: i32,
    pub rows_upserted: i32,
    pub error_message: Option<&'a str>,
}

const RUN_COLUMNS: &str = "id, public_id, strategy, status, files_total, started_at, \
                           completed_at, summary, error_message, created_at";

// ---------------------------------------------------------------------------
// ingest_runs operations
// ---------------------------------------------------------------------------

/// Creates a new ingest run in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_ingest_run(
    pool: &PgPool,
    strategy: &str,
    files_total: i32,
) -> Result<IngestRunRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, IngestRunRow>(&format!(
        "INSERT INTO ingest_runs (public_id, strategy, status, files_total) \
         VALUES ($1, $2, 'queued', $3) \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(public_id)
    .bind(strategy)
    .bind(files_total)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a run as `running` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidIngestRunTransition`] if the run is not
/// `queued`, or [`DbError::Sqlx`] if the update fails.
pub async fn start_ingest_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE ingest_runs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidIngestRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Marks a run as `succeeded` and stores its summary.
///
/// # Errors
///
/// Returns [`DbError::InvalidIngestRunTransition`] if the run is not
/// `running`, [`DbError::Serialize`] if the summary cannot be encoded, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn complete_ingest_run(
    pool: &PgPool,
    id: i64,
    summary: &RunSummary,
) -> Result<(), DbError> {
    let summary = serde_json::to_value(summary)?;

    let result = sqlx::query(
        "UPDATE ingest_runs \
         SET status = 'succeeded', completed_at = NOW(), summary = $1 \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(summary)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidIngestRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a queued or running run as `failed`, keeping whatever partial
/// summary the caller has.
///
/// # Errors
///
/// Returns [`DbError::InvalidIngestRunTransition`] if the run already
/// finished, [`DbError::Serialize`] if the summary cannot be encoded, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn fail_ingest_run(
    pool: &PgPool,
    id: i64,
    error_message: &str,
    summary: Option<&RunSummary>,
) -> Result<(), DbError> {
    let summary = summary.map(serde_json::to_value).transpose()?;

    let result = sqlx::query(
        "UPDATE ingest_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1, \
             summary = COALESCE($2, summary) \
         WHERE id = $3 AND status IN ('queued', 'running')",
    )
    .bind(error_message)
    .bind(summary)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidIngestRunTransition {
            id,
            expected_status: "queued or running",
        });
    }

    Ok(())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_ingest_run(pool: &PgPool, id: i64) -> Result<IngestRunRow, DbError> {
    let row = sqlx::query_as::<_, IngestRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM ingest_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_ingest_runs(pool: &PgPool, limit: i64) -> Result<Vec<IngestRunRow>, DbError> {
    let rows = sqlx::query_as::<_, IngestRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM ingest_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// ingest_files operations
// ---------------------------------------------------------------------------

/// Inserts or updates the per-file result row for a run.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn record_ingest_file(
    pool: &PgPool,
    run_id: i64,
    file: &NewIngestFile<'_>,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO ingest_files \
             (ingest_run_id, path, sha256, layout, status, rows_parsed, \
              records_normalized, rows_upserted, error_message) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (ingest_run_id, path) DO UPDATE SET \
             sha256             = EXCLUDED.sha256, \
             layout             = EXCLUDED.layout, \
             status             = EXCLUDED.status, \
             rows_parsed        = EXCLUDED.rows_parsed, \
             records_normalized = EXCLUDED.records_normalized, \
             rows_upserted      = EXCLUDED.rows_upserted, \
             error_message      = EXCLUDED.error_message",
    )
    .bind(run_id)
    .bind(file.path)
    .bind(file.sha256)
    .bind(file.layout)
    .bind(file.status)
    .bind(file.rows_parsed)
    .bind(file.records_normalized)
    .bind(file.rows_upserted)
    .bind(file.error_message)
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns all file rows for a run, in path order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_ingest_files(pool: &PgPool, run_id: i64) -> Result<Vec<IngestFileRow>, DbError> {
    let rows = sqlx::query_as::<_, IngestFileRow>(
        "SELECT id, ingest_run_id, path, sha256, layout, status, rows_parsed, \
                records_normalized, rows_upserted, error_message, created_at \
         FROM ingest_files \
         WHERE ingest_run_id = $1 \
         ORDER BY path",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
