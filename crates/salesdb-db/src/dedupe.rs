//! Duplicate natural-key maintenance for the report tables.
//!
//! The unique natural-key indexes prevent new duplicates; these operations
//! find and clear ones that predate the indexes. Resolution keeps the row
//! with the highest `id`, i.e. the most recently inserted copy.

use chrono::NaiveDate;
use salesdb_core::{NaturalKey, ReportTable, StoreId};
use sqlx::PgPool;

use crate::DbError;

/// A natural key that occurs more than once in a table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DuplicateKey {
    pub store_id: String,
    pub business_date: NaiveDate,
    pub sub_key: Option<String>,
    pub copies: i64,
    /// `id` of the row that resolution keeps.
    pub keep_id: i64,
}

impl DuplicateKey {
    #[must_use]
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(
            StoreId::new(self.store_id.clone()),
            self.business_date,
            self.sub_key.clone(),
        )
    }
}

fn key_columns(table: ReportTable) -> String {
    match table.sub_key_column() {
        Some(sub) => format!("store_id, business_date, {sub}"),
        None => "store_id, business_date".to_string(),
    }
}

/// List every natural key in `table` held by more than one row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_duplicates(
    pool: &PgPool,
    table: ReportTable,
) -> Result<Vec<DuplicateKey>, DbError> {
    let sub_key = table
        .sub_key_column()
        .map_or_else(|| "NULL::text".to_string(), str::to_string);
    let sql = format!(
        "SELECT store_id, business_date, {sub_key} AS sub_key, \
                COUNT(*) AS copies, MAX(id) AS keep_id \
         FROM {name} \
         GROUP BY {group} \
         HAVING COUNT(*) > 1 \
         ORDER BY store_id, business_date, sub_key",
        name = table.table_name(),
        group = key_columns(table),
    );

    let rows = sqlx::query_as::<_, DuplicateKey>(&sql)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Delete every duplicate row in `table` except the one with the highest
/// `id` per natural key. Returns the number of rows deleted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn resolve_duplicates(pool: &PgPool, table: ReportTable) -> Result<u64, DbError> {
    let name = table.table_name();
    let sub_key_clause = table
        .sub_key_column()
        .map(|sub| format!(" AND older.{sub} = newer.{sub}"))
        .unwrap_or_default();
    let sql = format!(
        "DELETE FROM {name} older \
         USING {name} newer \
         WHERE older.store_id = newer.store_id \
           AND older.business_date = newer.business_date{sub_key_clause} \
           AND older.id < newer.id"
    );

    let deleted = sqlx::query(&sql).execute(pool).await?.rows_affected();

    tracing::info!(table = %table, deleted, "resolved duplicate natural keys");
    Ok(deleted)
}
