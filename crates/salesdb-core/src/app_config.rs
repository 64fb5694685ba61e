use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Rows per `INSERT … UNNEST` statement when `SALESDB_UPSERT_BATCH_SIZE` is
/// unset.
pub const DEFAULT_UPSERT_BATCH_SIZE: usize = 500;

/// How tender amounts that land on the same `(store, date, tender_type)` key
/// within one file are combined.
///
/// Vendor aliases such as `"Delivery: Doordash"` and `"Door Dash"` collapse to
/// one canonical tender type; whether their amounts add up or replace each
/// other is an operator decision, not something the normalizer infers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenderAggregation {
    /// The last triple visited for a key wins.
    #[default]
    Overwrite,
    /// Amounts for the same key are added together.
    Sum,
}

impl std::fmt::Display for TenderAggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TenderAggregation::Overwrite => write!(f, "overwrite"),
            TenderAggregation::Sum => write!(f, "sum"),
        }
    }
}

impl std::str::FromStr for TenderAggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overwrite" => Ok(TenderAggregation::Overwrite),
            "sum" => Ok(TenderAggregation::Sum),
            other => Err(format!(
                "unknown tender aggregation '{other}'; expected 'overwrite' or 'sum'"
            )),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    /// Absent when only offline commands (e.g. `ingest --dry-run`) are run.
    pub database_url: Option<String>,
    pub log_level: String,
    pub mappings_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub upsert_batch_size: usize,
    pub tender_aggregation: TenderAggregation,
    pub header_scan_rows: usize,
    pub file_timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Returns the database URL, or an error naming the missing variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] when `DATABASE_URL` was not set.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("log_level", &self.log_level)
            .field("mappings_path", &self.mappings_path)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("upsert_batch_size", &self.upsert_batch_size)
            .field("tender_aggregation", &self.tender_aggregation)
            .field("header_scan_rows", &self.header_scan_rows)
            .field("file_timeout_secs", &self.file_timeout_secs)
            .finish()
    }
}
