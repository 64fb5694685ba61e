//! Drop counters and the end-of-run summary.
//!
//! The summary is the operator-facing error signal for a batch: every skipped
//! file, dropped triple, duplicate, and failed batch is counted here, and the
//! unresolved labels and locations are listed so vendor format drift shows up.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Why a parsed triple did not make it into a normalized record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    UnresolvedStore,
    UnresolvedMetric,
    ZeroAmount,
    UnparseableValue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropCounts {
    pub unresolved_store: u64,
    pub unresolved_metric: u64,
    pub zero_amount: u64,
    pub unparseable_value: u64,
}

impl DropCounts {
    pub fn record(&mut self, reason: DropReason) {
        match reason {
            DropReason::UnresolvedStore => self.unresolved_store += 1,
            DropReason::UnresolvedMetric => self.unresolved_metric += 1,
            DropReason::ZeroAmount => self.zero_amount += 1,
            DropReason::UnparseableValue => self.unparseable_value += 1,
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.unresolved_store + self.unresolved_metric + self.zero_amount + self.unparseable_value
    }

    pub fn merge(&mut self, other: &DropCounts) {
        self.unresolved_store += other.unresolved_store;
        self.unresolved_metric += other.unresolved_metric;
        self.zero_amount += other.zero_amount;
        self.unparseable_value += other.unparseable_value;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedFile {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub files_processed: u64,
    pub files_failed: u64,
    pub rows_parsed: u64,
    pub dropped: DropCounts,
    pub records_normalized: u64,
    pub rows_upserted: u64,
    pub rows_skipped_duplicate: u64,
    pub rows_conflicted: u64,
    pub rows_deleted: u64,
    pub failed_batches: u64,
    pub unresolved_labels: BTreeSet<String>,
    pub unresolved_locations: BTreeSet<String>,
    pub failed_files: Vec<FailedFile>,
}

impl RunSummary {
    pub fn record_failed_file(&mut self, path: impl Into<String>, reason: impl Into<String>) {
        self.files_failed += 1;
        self.failed_files.push(FailedFile {
            path: path.into(),
            reason: reason.into(),
        });
    }

    /// `true` when nothing was lost: no failed files or batches and no
    /// unresolved stores or metrics.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.files_failed == 0
            && self.failed_batches == 0
            && self.dropped.unresolved_store == 0
            && self.dropped.unresolved_metric == 0
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "files processed:        {}", self.files_processed)?;
        writeln!(f, "files failed:           {}", self.files_failed)?;
        writeln!(f, "rows parsed:            {}", self.rows_parsed)?;
        writeln!(f, "records normalized:     {}", self.records_normalized)?;
        writeln!(f, "rows upserted:          {}", self.rows_upserted)?;
        writeln!(f, "rows skipped duplicate: {}", self.rows_skipped_duplicate)?;
        writeln!(f, "rows conflicted:        {}", self.rows_conflicted)?;
        writeln!(f, "rows deleted:           {}", self.rows_deleted)?;
        writeln!(f, "failed batches:         {}", self.failed_batches)?;
        writeln!(f, "dropped:")?;
        writeln!(f, "  unresolved store:     {}", self.dropped.unresolved_store)?;
        writeln!(f, "  unresolved metric:    {}", self.dropped.unresolved_metric)?;
        writeln!(f, "  zero amount:          {}", self.dropped.zero_amount)?;
        write!(f, "  unparseable value:    {}", self.dropped.unparseable_value)?;

        if !self.unresolved_labels.is_empty() {
            write!(f, "\nunresolved metric labels:")?;
            for label in &self.unresolved_labels {
                write!(f, "\n  {label}")?;
            }
        }
        if !self.unresolved_locations.is_empty() {
            write!(f, "\nunresolved locations:")?;
            for location in &self.unresolved_locations {
                write!(f, "\n  {location}")?;
            }
        }
        if !self.failed_files.is_empty() {
            write!(f, "\nfailed files:")?;
            for failed in &self.failed_files {
                write!(f, "\n  {}: {}", failed.path, failed.reason)?;
            }
        }
        Ok(())
    }
}
