//! `ingest` command: parse, normalize, and store a batch of report files.
//!
//! Files are processed one at a time. A file that cannot be read, parsed, or
//! written is recorded as failed and the batch moves on; the run only aborts
//! when its own bookkeeping cannot be written.

mod runner;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use salesdb_core::{AppConfig, MappingTables, RunSummary, TenderAggregation};
use salesdb_db::{DeleteScope, WriteStrategy};
use salesdb_parser::{Layout, NormalizeOptions, ParseOptions};

pub(crate) use runner::run_batch;

/// Arguments for `salesdb ingest`.
#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Report files (.csv, .xlsx, .xlsm, .xls, .xlsb, .ods)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// How incoming rows meet rows already stored. delete-then-insert must
    /// not run concurrently with another load of the same date range.
    #[arg(long, value_enum)]
    pub strategy: StrategyArg,

    /// First day of the range cleared by delete-then-insert
    #[arg(long, requires = "delete_to")]
    pub delete_from: Option<NaiveDate>,

    /// Last day (inclusive) of the range cleared by delete-then-insert
    #[arg(long, requires = "delete_from")]
    pub delete_to: Option<NaiveDate>,

    /// Grid layout (auto, transposed, sentinel)
    #[arg(long, default_value = "auto")]
    pub layout: Layout,

    /// Business date for sentinel sheets that carry none
    #[arg(long)]
    pub report_date: Option<NaiveDate>,

    /// Worksheet name; defaults to the first sheet
    #[arg(long)]
    pub sheet: Option<String>,

    /// How aliased tenders on the same key combine (overwrite, sum)
    #[arg(long)]
    pub tender_aggregation: Option<TenderAggregation>,

    /// Per-file time limit in seconds
    #[arg(long)]
    pub file_timeout_secs: Option<u64>,

    /// Parse and normalize only; print the summary without touching the database
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    InsertIfAbsent,
    RejectOnConflict,
    DeleteThenInsert,
}

/// Build the write strategy from the strategy flag and the optional
/// delete range.
pub(crate) fn resolve_strategy(
    strategy: StrategyArg,
    delete_from: Option<NaiveDate>,
    delete_to: Option<NaiveDate>,
) -> anyhow::Result<WriteStrategy> {
    match (strategy, delete_from, delete_to) {
        (StrategyArg::DeleteThenInsert, Some(from), Some(to)) => {
            if from > to {
                anyhow::bail!("--delete-from {from} is after --delete-to {to}");
            }
            Ok(WriteStrategy::DeleteThenInsert(DeleteScope::DateRange {
                from,
                to,
            }))
        }
        (StrategyArg::DeleteThenInsert, None, None) => {
            Ok(WriteStrategy::DeleteThenInsert(DeleteScope::MatchingKeys))
        }
        (StrategyArg::DeleteThenInsert, _, _) => {
            anyhow::bail!("--delete-from and --delete-to must be given together")
        }
        (_, Some(_), _) | (_, _, Some(_)) => {
            anyhow::bail!("--delete-from/--delete-to only apply to --strategy delete-then-insert")
        }
        (StrategyArg::InsertIfAbsent, None, None) => Ok(WriteStrategy::InsertIfAbsent),
        (StrategyArg::RejectOnConflict, None, None) => Ok(WriteStrategy::RejectOnConflict),
    }
}

/// Everything a file needs on its way through the pipeline.
#[derive(Debug, Clone)]
pub(crate) struct IngestSettings {
    pub tables: Arc<MappingTables>,
    pub parse: ParseOptions,
    pub normalize: NormalizeOptions,
    pub sheet: Option<String>,
    pub strategy: WriteStrategy,
    pub batch_size: usize,
    pub timeout: Option<Duration>,
}

impl IngestSettings {
    /// Combine config defaults with command-line overrides. Flags win.
    pub(crate) fn resolve(
        config: &AppConfig,
        args: &IngestArgs,
        tables: MappingTables,
    ) -> anyhow::Result<Self> {
        let strategy = resolve_strategy(args.strategy, args.delete_from, args.delete_to)?;
        Ok(Self {
            tables: Arc::new(tables),
            parse: ParseOptions {
                layout: args.layout,
                header_scan_rows: config.header_scan_rows,
                report_date: args.report_date,
            },
            normalize: NormalizeOptions {
                tender_aggregation: args
                    .tender_aggregation
                    .unwrap_or(config.tender_aggregation),
            },
            sheet: args.sheet.clone(),
            strategy,
            batch_size: config.upsert_batch_size,
            timeout: args
                .file_timeout_secs
                .or(config.file_timeout_secs)
                .map(Duration::from_secs),
        })
    }
}

/// Run `salesdb ingest`.
///
/// # Errors
///
/// Returns an error if the flags are inconsistent, the mapping tables cannot
/// be loaded, the ingest run cannot be created or completed, or any file
/// failed.
pub(crate) async fn run_ingest(config: &AppConfig, args: &IngestArgs) -> anyhow::Result<()> {
    let tables = salesdb_core::load_mappings(&config.mappings_path)?;
    tracing::debug!(
        path = %config.mappings_path.display(),
        stores = tables.stores.len(),
        "mapping tables loaded"
    );
    let settings = IngestSettings::resolve(config, args, tables)?;

    if args.dry_run {
        let summary = run_batch(&settings, None, &args.files).await;
        println!("dry-run: nothing was written");
        return finish(&summary, args.files.len());
    }

    let pool = crate::connect(config).await?;
    let files_total = i32::try_from(args.files.len()).unwrap_or(i32::MAX);
    let run =
        salesdb_db::create_ingest_run(&pool, &settings.strategy.to_string(), files_total).await?;
    if let Err(e) = salesdb_db::start_ingest_run(&pool, run.id).await {
        crate::fail_run_best_effort(&pool, run.id, format!("{e:#}"), None).await;
        return Err(e.into());
    }

    let summary = run_batch(&settings, Some((&pool, run.id)), &args.files).await;

    if let Err(err) = salesdb_db::complete_ingest_run(&pool, run.id, &summary).await {
        crate::fail_run_best_effort(&pool, run.id, format!("{err:#}"), Some(&summary)).await;
        return Err(err.into());
    }

    println!("ingest run {}", run.public_id);
    finish(&summary, args.files.len())
}

/// Print and log the run summary; fail the command when any file failed.
fn finish(summary: &RunSummary, files_total: usize) -> anyhow::Result<()> {
    println!("{summary}");
    tracing::info!(
        files_processed = summary.files_processed,
        files_failed = summary.files_failed,
        rows_parsed = summary.rows_parsed,
        rows_upserted = summary.rows_upserted,
        rows_skipped_duplicate = summary.rows_skipped_duplicate,
        rows_conflicted = summary.rows_conflicted,
        failed_batches = summary.failed_batches,
        dropped = summary.dropped.total(),
        summary = %serde_json::to_string(summary)?,
        "ingest run finished"
    );
    if !summary.is_clean() {
        tracing::warn!(
            files_failed = summary.files_failed,
            failed_batches = summary.failed_batches,
            unresolved_store = summary.dropped.unresolved_store,
            unresolved_metric = summary.dropped.unresolved_metric,
            "ingest run lost data; see unresolved labels, locations and failed files"
        );
    }

    if summary.files_failed > 0 {
        anyhow::bail!("{} of {files_total} files failed", summary.files_failed);
    }
    Ok(())
}

#[cfg(test)]
#[path = "ingest_test.rs"]
mod tests;
