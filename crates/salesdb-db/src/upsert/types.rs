//! Strategy and outcome types for the upsert coordinator.

use chrono::NaiveDate;
use salesdb_core::{NaturalKey, StoreId};

use crate::DbError;

/// Which rows a delete-then-insert load replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteScope {
    /// Delete rows whose natural key matches an incoming record.
    MatchingKeys,
    /// Delete every row in the inclusive date range for the stores present
    /// in the input.
    DateRange { from: NaiveDate, to: NaiveDate },
}

/// How incoming records meet rows that already exist. Always chosen by the
/// caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStrategy {
    /// Insert new keys; existing keys are skipped and counted as duplicates.
    InsertIfAbsent,
    /// Insert new keys; existing keys are skipped and reported as conflicts.
    RejectOnConflict,
    /// Delete the targeted rows, then insert.
    ///
    /// Not safe to run concurrently against the same date range.
    DeleteThenInsert(DeleteScope),
}

impl std::fmt::Display for WriteStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteStrategy::InsertIfAbsent => write!(f, "insert-if-absent"),
            WriteStrategy::RejectOnConflict => write!(f, "reject-on-conflict"),
            WriteStrategy::DeleteThenInsert(DeleteScope::MatchingKeys) => {
                write!(f, "delete-then-insert(keys)")
            }
            WriteStrategy::DeleteThenInsert(DeleteScope::DateRange { from, to }) => {
                write!(f, "delete-then-insert({from}..={to})")
            }
        }
    }
}

/// Result of writing one collection of records.
#[derive(Debug, Default)]
pub struct UpsertOutcome {
    pub inserted: u64,
    pub skipped_duplicate: u64,
    pub conflicts: u64,
    pub deleted: u64,
    pub failed_batches: u64,
    pub failed_rows: u64,
    pub conflict_keys: Vec<NaturalKey>,
    /// One [`DbError::Persistence`] per batch that failed after its retry.
    pub failures: Vec<DbError>,
}

impl UpsertOutcome {
    pub fn merge(&mut self, other: UpsertOutcome) {
        self.inserted += other.inserted;
        self.skipped_duplicate += other.skipped_duplicate;
        self.conflicts += other.conflicts;
        self.deleted += other.deleted;
        self.failed_batches += other.failed_batches;
        self.failed_rows += other.failed_rows;
        self.conflict_keys.extend(other.conflict_keys);
        self.failures.extend(other.failures);
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed_batches > 0
    }
}

/// Distinct stores in a set of keys, for scoping date-range deletes.
pub(crate) fn distinct_stores<'a>(keys: impl Iterator<Item = &'a NaturalKey>) -> Vec<String> {
    let mut stores: Vec<String> = keys.map(|k| k.store_id.as_str().to_string()).collect();
    stores.sort();
    stores.dedup();
    stores
}

/// Key row returned by `RETURNING store_id, business_date, sub_key`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KeyRow {
    pub store_id: String,
    pub business_date: NaiveDate,
    pub sub_key: Option<String>,
}

impl From<KeyRow> for NaturalKey {
    fn from(row: KeyRow) -> Self {
        NaturalKey::new(StoreId::new(row.store_id), row.business_date, row.sub_key)
    }
}
