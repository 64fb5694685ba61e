//! Per-file pipeline and batch loop for `ingest`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use salesdb_core::{ReportTable, RunSummary};
use salesdb_db::{
    ensure_within_range, upsert_records, DbError, DeleteScope, NewIngestFile, ReportRecord,
    UpsertOutcome, WriteStrategy,
};
use salesdb_parser::{Layout, NormalizedBatch, ParsedFile};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use super::IngestSettings;

/// What happened to one input file.
#[derive(Debug, Default)]
pub(crate) struct FileReport {
    pub sha256: Option<String>,
    pub layout: Option<Layout>,
    pub batch: NormalizedBatch,
    pub outcome: UpsertOutcome,
    /// Set when the file counts as failed.
    pub error: Option<String>,
}

impl FileReport {
    fn failed(error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }
}

/// `(table, store)` pairs whose date range was already cleared in this run.
type ClearedStores = BTreeSet<(ReportTable, String)>;

/// Process `files` in order, writing through `db` when given.
///
/// `db` pairs the pool with the ingest run id used for per-file
/// bookkeeping; `None` is a dry run.
pub(crate) async fn run_batch(
    settings: &IngestSettings,
    db: Option<(&PgPool, i64)>,
    files: &[PathBuf],
) -> RunSummary {
    let mut summary = RunSummary::default();
    let mut cleared = ClearedStores::new();
    let pool = db.map(|(pool, _)| pool);

    for path in files {
        let display = path.display().to_string();

        let work = ingest_file(settings, pool, path, &mut cleared);
        let report = match settings.timeout {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(report) => report,
                Err(_) => FileReport::failed(format!("timed out after {}s", limit.as_secs())),
            },
            None => work.await,
        };

        absorb(&mut summary, &display, &report);

        if let Some((pool, run_id)) = db {
            record_file_best_effort(pool, run_id, &display, &report).await;
        }
    }

    summary
}

async fn ingest_file(
    settings: &IngestSettings,
    pool: Option<&PgPool>,
    path: &Path,
    cleared: &mut ClearedStores,
) -> FileReport {
    let (sha256, parsed) = match parse_blocking(settings, path).await {
        Ok(parsed) => parsed,
        Err(e) => return FileReport::failed(format!("{e:#}")),
    };

    let mut report = FileReport {
        sha256: Some(sha256),
        layout: Some(parsed.layout),
        ..FileReport::default()
    };

    if let Some(pool) = pool {
        match write_batch(pool, &parsed.batch, settings, cleared).await {
            Ok(outcome) => {
                if outcome.has_failures() {
                    let first = outcome
                        .failures
                        .first()
                        .map(ToString::to_string)
                        .unwrap_or_default();
                    report.error = Some(format!(
                        "{} batches ({} rows) failed to write; first error: {first}",
                        outcome.failed_batches, outcome.failed_rows
                    ));
                }
                report.outcome = outcome;
            }
            Err(e) => report.error = Some(format!("{e:#}")),
        }
    }

    report.batch = parsed.batch;
    report
}

/// Hash and parse a file on the blocking pool.
async fn parse_blocking(
    settings: &IngestSettings,
    path: &Path,
) -> anyhow::Result<(String, ParsedFile)> {
    let tables = Arc::clone(&settings.tables);
    let parse_opts = settings.parse.clone();
    let normalize_opts = settings.normalize;
    let sheet = settings.sheet.clone();
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || -> anyhow::Result<(String, ParsedFile)> {
        let bytes =
            std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let sha256 = format!("{:x}", Sha256::digest(&bytes));
        let parsed = salesdb_parser::parse_file(
            &path,
            sheet.as_deref(),
            &tables,
            &parse_opts,
            &normalize_opts,
        )?;
        Ok((sha256, parsed))
    })
    .await?
}

async fn write_batch(
    pool: &PgPool,
    batch: &NormalizedBatch,
    settings: &IngestSettings,
    cleared: &mut ClearedStores,
) -> Result<UpsertOutcome, DbError> {
    // A file with any record outside the range is rejected before any
    // table is touched.
    if let WriteStrategy::DeleteThenInsert(DeleteScope::DateRange { from, to }) = settings.strategy
    {
        ensure_within_range(&batch.sales, from, to)?;
        ensure_within_range(&batch.tenders, from, to)?;
        ensure_within_range(&batch.labor, from, to)?;
        ensure_within_range(&batch.dayparts, from, to)?;
    }

    let mut outcome = UpsertOutcome::default();
    outcome.merge(write_table(pool, &batch.sales, settings, cleared).await?);
    outcome.merge(write_table(pool, &batch.tenders, settings, cleared).await?);
    outcome.merge(write_table(pool, &batch.labor, settings, cleared).await?);
    outcome.merge(write_table(pool, &batch.dayparts, settings, cleared).await?);
    Ok(outcome)
}

/// Write one table's records.
///
/// A date-range load clears each store's range only the first time the
/// store appears in the run; later files for the same store replace by key
/// so they do not delete rows written earlier in the same run.
async fn write_table<R: ReportRecord + Clone>(
    pool: &PgPool,
    records: &[R],
    settings: &IngestSettings,
    cleared: &mut ClearedStores,
) -> Result<UpsertOutcome, DbError> {
    let WriteStrategy::DeleteThenInsert(DeleteScope::DateRange { .. }) = settings.strategy else {
        return upsert_records(pool, records, settings.strategy, settings.batch_size).await;
    };

    let (seen, fresh): (Vec<R>, Vec<R>) = records
        .iter()
        .cloned()
        .partition(|r| cleared.contains(&(R::TABLE, r.key().store_id.0)));

    let mut outcome =
        upsert_records(pool, &fresh, settings.strategy, settings.batch_size).await?;
    cleared.extend(fresh.iter().map(|r| (R::TABLE, r.key().store_id.0)));

    outcome.merge(
        upsert_records(
            pool,
            &seen,
            WriteStrategy::DeleteThenInsert(DeleteScope::MatchingKeys),
            settings.batch_size,
        )
        .await?,
    );
    Ok(outcome)
}

/// Fold one file's counts into the run summary.
fn absorb(summary: &mut RunSummary, path: &str, report: &FileReport) {
    let batch = &report.batch;
    let outcome = &report.outcome;

    summary.rows_parsed += batch.triples_seen;
    summary.dropped.merge(&batch.dropped);
    summary.records_normalized += batch.record_count() as u64;
    summary
        .unresolved_labels
        .extend(batch.unresolved_labels.iter().cloned());
    summary
        .unresolved_locations
        .extend(batch.unresolved_locations.iter().cloned());

    summary.rows_upserted += outcome.inserted;
    summary.rows_skipped_duplicate += outcome.skipped_duplicate;
    summary.rows_conflicted += outcome.conflicts;
    summary.rows_deleted += outcome.deleted;
    summary.failed_batches += outcome.failed_batches;

    if !batch.unresolved_labels.is_empty() {
        tracing::warn!(
            path,
            labels = ?batch.unresolved_labels,
            "unmapped metric labels"
        );
    }
    if outcome.conflicts > 0 {
        tracing::warn!(
            path,
            conflicts = outcome.conflicts,
            keys = ?outcome.conflict_keys,
            "records skipped on conflict"
        );
    }

    match &report.error {
        Some(reason) => {
            tracing::warn!(path, error = %reason, "file failed");
            summary.record_failed_file(path, reason.clone());
        }
        None => summary.files_processed += 1,
    }
}

async fn record_file_best_effort(pool: &PgPool, run_id: i64, path: &str, report: &FileReport) {
    let layout = report.layout.map(|l| l.to_string());
    let file = NewIngestFile {
        path,
        sha256: report.sha256.as_deref(),
        layout: layout.as_deref(),
        status: if report.error.is_some() {
            "failed"
        } else {
            "succeeded"
        },
        rows_parsed: clamp_i32(report.batch.triples_seen),
        records_normalized: clamp_i32(report.batch.record_count() as u64),
        rows_upserted: clamp_i32(report.outcome.inserted),
        error_message: report.error.as_deref(),
    };

    if let Err(err) = salesdb_db::record_ingest_file(pool, run_id, &file).await {
        tracing::error!(run_id, path, error = %err, "failed to record ingest file");
    }
}

fn clamp_i32(n: u64) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
