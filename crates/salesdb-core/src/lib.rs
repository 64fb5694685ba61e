pub mod app_config;
pub mod config;
pub mod mappings;
pub mod records;
pub mod summary;

use thiserror::Error;

pub use app_config::{AppConfig, TenderAggregation, DEFAULT_UPSERT_BATCH_SIZE};
pub use config::{load_app_config, load_app_config_from_env};
pub use mappings::{
    load_mappings, DaypartColumn, LaborSuffix, MappingTables, MappingsFile, StoreDirectory,
    StoreEntry,
};
pub use records::{
    DaypartField, DaypartRecord, LaborField, LaborRecord, NaturalKey, ReportTable, SalesField,
    SalesSummaryRecord, StoreId, TenderTypeRecord,
};
pub use summary::{DropCounts, DropReason, FailedFile, RunSummary};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read mappings file {path}: {source}")]
    MappingsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse mappings file: {0}")]
    MappingsFileParse(#[from] serde_yaml::Error),

    #[error("mappings validation failed: {0}")]
    Validation(String),
}
