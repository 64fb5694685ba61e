use crate::app_config::{AppConfig, TenderAggregation, DEFAULT_UPSERT_BATCH_SIZE};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = lookup("DATABASE_URL").ok().filter(|v| !v.trim().is_empty());
    let log_level = or_default("SALESDB_LOG_LEVEL", "info");
    let mappings_path = PathBuf::from(or_default(
        "SALESDB_MAPPINGS_PATH",
        "./config/mappings.yaml",
    ));

    let db_max_connections = parse_u32("SALESDB_DB_MAX_CONNECTIONS", "5")?;
    let db_min_connections = parse_u32("SALESDB_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("SALESDB_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let upsert_batch_size = parse_usize(
        "SALESDB_UPSERT_BATCH_SIZE",
        &DEFAULT_UPSERT_BATCH_SIZE.to_string(),
    )?;
    if upsert_batch_size == 0 {
        return Err(invalid(
            "SALESDB_UPSERT_BATCH_SIZE",
            "must be greater than zero".to_string(),
        ));
    }

    let tender_aggregation = or_default("SALESDB_TENDER_AGGREGATION", "overwrite")
        .parse::<TenderAggregation>()
        .map_err(|reason| invalid("SALESDB_TENDER_AGGREGATION", reason))?;

    let header_scan_rows = parse_usize("SALESDB_HEADER_SCAN_ROWS", "25")?;

    let file_timeout_secs = match lookup("SALESDB_FILE_TIMEOUT_SECS") {
        Ok(raw) => Some(
            raw.parse::<u64>()
                .map_err(|e| invalid("SALESDB_FILE_TIMEOUT_SECS", e.to_string()))?,
        ),
        Err(_) => None,
    };

    Ok(AppConfig {
        database_url,
        log_level,
        mappings_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        upsert_batch_size,
        tender_aggregation,
        header_scan_rows,
        file_timeout_secs,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
