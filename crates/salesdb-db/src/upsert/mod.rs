//! Upsert coordinator: batched, strategy-driven writes of normalized records.
//!
//! Records are written in fixed-size batches, one `INSERT … UNNEST`
//! round-trip each. A batch that fails is retried once, split in halves; a
//! half that still fails is recorded in [`UpsertOutcome::failures`] and the
//! remaining batches continue.

mod records;
mod types;

use std::collections::BTreeSet;

use chrono::NaiveDate;
use salesdb_core::NaturalKey;
use sqlx::{PgExecutor, PgPool};

pub use records::{KeyQuery, ReportRecord};
pub use types::{DeleteScope, KeyRow, UpsertOutcome, WriteStrategy};

use crate::DbError;
use types::distinct_stores;

/// Write `records` into their report table using `strategy`.
///
/// A `batch_size` of zero is treated as one.
///
/// # Errors
///
/// For a [`DeleteScope::DateRange`] load, returns
/// [`DbError::OutsideDeleteRange`] before anything is deleted when a record
/// is dated outside the range, and [`DbError::Sqlx`] when the up-front delete
/// fails. Failures of individual batches are reported through
/// [`UpsertOutcome::failures`].
pub async fn upsert_records<R: ReportRecord>(
    pool: &PgPool,
    records: &[R],
    strategy: WriteStrategy,
    batch_size: usize,
) -> Result<UpsertOutcome, DbError> {
    let mut outcome = UpsertOutcome::default();
    if records.is_empty() {
        return Ok(outcome);
    }

    if let WriteStrategy::DeleteThenInsert(DeleteScope::DateRange { from, to }) = strategy {
        ensure_within_range(records, from, to)?;
        let keys: Vec<NaturalKey> = records.iter().map(ReportRecord::key).collect();
        let stores = distinct_stores(keys.iter());
        outcome.deleted = delete_date_range::<R>(pool, from, to, &stores).await?;
        tracing::info!(
            table = %R::TABLE,
            %from,
            %to,
            stores = stores.len(),
            deleted = outcome.deleted,
            "cleared date range before insert"
        );
    }

    for batch in records.chunks(batch_size.max(1)) {
        write_with_retry(pool, batch, strategy, &mut outcome).await;
    }

    tracing::debug!(
        table = %R::TABLE,
        %strategy,
        inserted = outcome.inserted,
        skipped_duplicate = outcome.skipped_duplicate,
        conflicts = outcome.conflicts,
        deleted = outcome.deleted,
        failed_batches = outcome.failed_batches,
        "upsert complete"
    );

    Ok(outcome)
}

/// Check that every record is dated inside `from..=to`.
///
/// A record outside the range would survive the range delete and then be
/// skipped as a duplicate of the row it was meant to replace.
///
/// # Errors
///
/// Returns [`DbError::OutsideDeleteRange`] naming the first offending key.
pub fn ensure_within_range<R: ReportRecord>(
    records: &[R],
    from: NaiveDate,
    to: NaiveDate,
) -> Result<(), DbError> {
    let mut outside = records
        .iter()
        .map(ReportRecord::key)
        .filter(|key| key.date < from || key.date > to);
    let Some(first) = outside.next() else {
        return Ok(());
    };
    Err(DbError::OutsideDeleteRange {
        table: R::TABLE,
        from,
        to,
        count: 1 + outside.count(),
        first,
    })
}

async fn write_with_retry<R: ReportRecord>(
    pool: &PgPool,
    batch: &[R],
    strategy: WriteStrategy,
    outcome: &mut UpsertOutcome,
) {
    let err = match write_batch(pool, batch, strategy).await {
        Ok(written) => {
            outcome.merge(written);
            return;
        }
        Err(err) => err,
    };

    tracing::warn!(
        table = %R::TABLE,
        rows = batch.len(),
        error = %err,
        "batch write failed, retrying in halves"
    );

    let halves: Vec<&[R]> = if batch.len() > 1 {
        let (left, right) = batch.split_at(batch.len() / 2);
        vec![left, right]
    } else {
        vec![batch]
    };

    for half in halves {
        match write_batch(pool, half, strategy).await {
            Ok(written) => outcome.merge(written),
            Err(source) => {
                tracing::error!(
                    table = %R::TABLE,
                    rows = half.len(),
                    error = %source,
                    "batch write failed after retry"
                );
                outcome.failed_batches += 1;
                outcome.failed_rows += half.len() as u64;
                outcome.failures.push(DbError::Persistence {
                    table: R::TABLE,
                    rows: half.len(),
                    source,
                });
            }
        }
    }
}

async fn write_batch<R: ReportRecord>(
    pool: &PgPool,
    batch: &[R],
    strategy: WriteStrategy,
) -> Result<UpsertOutcome, sqlx::Error> {
    let mut outcome = UpsertOutcome::default();

    let inserted: Vec<KeyRow> = match strategy {
        WriteStrategy::DeleteThenInsert(DeleteScope::MatchingKeys) => {
            let mut tx = pool.begin().await?;
            outcome.deleted = delete_matching_keys::<R, _>(&mut *tx, batch).await?;
            let rows = insert_rows(&mut *tx, batch).await?;
            tx.commit().await?;
            rows
        }
        _ => insert_rows(pool, batch).await?,
    };

    outcome.inserted = inserted.len() as u64;
    let remainder = (batch.len() - inserted.len()) as u64;

    if strategy == WriteStrategy::RejectOnConflict {
        outcome.conflicts = remainder;
        if remainder > 0 {
            let inserted_keys: BTreeSet<NaturalKey> =
                inserted.into_iter().map(NaturalKey::from).collect();
            outcome.conflict_keys = batch
                .iter()
                .map(ReportRecord::key)
                .filter(|key| !inserted_keys.contains(key))
                .collect();
        }
    } else {
        outcome.skipped_duplicate = remainder;
    }

    Ok(outcome)
}

async fn insert_rows<'e, R, E>(executor: E, batch: &[R]) -> Result<Vec<KeyRow>, sqlx::Error>
where
    R: ReportRecord,
    E: PgExecutor<'e>,
{
    R::bind_columns(sqlx::query_as::<_, KeyRow>(R::INSERT_SQL), batch)
        .fetch_all(executor)
        .await
}

async fn delete_matching_keys<'e, R, E>(executor: E, batch: &[R]) -> Result<u64, sqlx::Error>
where
    R: ReportRecord,
    E: PgExecutor<'e>,
{
    let table = R::TABLE.table_name();
    let sub_key_clause = R::TABLE
        .sub_key_column()
        .map(|column| format!(" AND t.{column} = k.sub_key"))
        .unwrap_or_default();
    let sql = format!(
        "DELETE FROM {table} t \
         USING UNNEST($1::text[], $2::date[], $3::text[]) AS k(store_id, business_date, sub_key) \
         WHERE t.store_id = k.store_id \
           AND t.business_date = k.business_date{sub_key_clause}"
    );

    let mut store_ids: Vec<String> = Vec::with_capacity(batch.len());
    let mut dates: Vec<NaiveDate> = Vec::with_capacity(batch.len());
    let mut sub_keys: Vec<Option<String>> = Vec::with_capacity(batch.len());
    for key in batch.iter().map(ReportRecord::key) {
        store_ids.push(key.store_id.0);
        dates.push(key.date);
        sub_keys.push(key.sub_key);
    }

    let rows_affected = sqlx::query(&sql)
        .bind(store_ids)
        .bind(dates)
        .bind(sub_keys)
        .execute(executor)
        .await?
        .rows_affected();

    Ok(rows_affected)
}

async fn delete_date_range<R: ReportRecord>(
    pool: &PgPool,
    from: NaiveDate,
    to: NaiveDate,
    stores: &[String],
) -> Result<u64, sqlx::Error> {
    let sql = format!(
        "DELETE FROM {} \
         WHERE business_date BETWEEN $1 AND $2 \
           AND store_id = ANY($3::text[])",
        R::TABLE.table_name()
    );

    let rows_affected = sqlx::query(&sql)
        .bind(from)
        .bind(to)
        .bind(stores)
        .execute(pool)
        .await?
        .rows_affected();

    Ok(rows_affected)
}
