//! Operator-initiated repair of negative `gift_card_sales` values.
//!
//! Ingest stores gift-card sales with the sign the report shows. Some
//! reports print them negative; flipping them is an explicit, audited
//! operation. Every changed row gets a `data_repairs` entry written in the
//! same transaction as the update.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use salesdb_core::StoreId;
use sqlx::PgPool;

use crate::DbError;

const REPAIR_KIND: &str = "gift_card_sign";

/// A `sales_summary` row with negative gift-card sales.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct GiftCardRepairRow {
    pub id: i64,
    pub store_id: String,
    pub business_date: NaiveDate,
    /// Value before repair.
    pub gift_card_sales: Decimal,
}

fn validate_range(from: NaiveDate, to: NaiveDate) -> Result<(), DbError> {
    if from > to {
        return Err(DbError::InvalidRepair(format!(
            "date range is empty: {from} is after {to}"
        )));
    }
    Ok(())
}

/// List rows that [`apply_gift_card_sign_repair`] would change.
///
/// # Errors
///
/// Returns [`DbError::InvalidRepair`] for an inverted date range, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn preview_gift_card_sign_repair(
    pool: &PgPool,
    from: NaiveDate,
    to: NaiveDate,
    store: Option<&StoreId>,
) -> Result<Vec<GiftCardRepairRow>, DbError> {
    validate_range(from, to)?;

    let rows = sqlx::query_as::<_, GiftCardRepairRow>(
        "SELECT id, store_id, business_date, gift_card_sales \
         FROM sales_summary \
         WHERE business_date BETWEEN $1 AND $2 \
           AND gift_card_sales < 0 \
           AND ($3::text IS NULL OR store_id = $3) \
         ORDER BY business_date, store_id",
    )
    .bind(from)
    .bind(to)
    .bind(store.map(StoreId::as_str))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Negate negative `gift_card_sales` in the range and audit each change.
///
/// Returns the repaired rows with their pre-repair values.
///
/// # Errors
///
/// Returns [`DbError::InvalidRepair`] when `operator` or `reason` is blank or
/// the date range is inverted, or [`DbError::Sqlx`] if any statement fails,
/// in which case nothing is changed.
pub async fn apply_gift_card_sign_repair(
    pool: &PgPool,
    from: NaiveDate,
    to: NaiveDate,
    store: Option<&StoreId>,
    operator: &str,
    reason: &str,
) -> Result<Vec<GiftCardRepairRow>, DbError> {
    validate_range(from, to)?;
    if operator.trim().is_empty() {
        return Err(DbError::InvalidRepair("operator is required".to_string()));
    }
    if reason.trim().is_empty() {
        return Err(DbError::InvalidRepair("reason is required".to_string()));
    }

    let mut tx = pool.begin().await?;

    let rows = sqlx::query_as::<_, GiftCardRepairRow>(
        "SELECT id, store_id, business_date, gift_card_sales \
         FROM sales_summary \
         WHERE business_date BETWEEN $1 AND $2 \
           AND gift_card_sales < 0 \
           AND ($3::text IS NULL OR store_id = $3) \
         ORDER BY business_date, store_id \
         FOR UPDATE",
    )
    .bind(from)
    .bind(to)
    .bind(store.map(StoreId::as_str))
    .fetch_all(&mut *tx)
    .await?;

    if rows.is_empty() {
        tx.commit().await?;
        return Ok(rows);
    }

    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let store_ids: Vec<String> = rows.iter().map(|r| r.store_id.clone()).collect();
    let dates: Vec<NaiveDate> = rows.iter().map(|r| r.business_date).collect();
    let old_values: Vec<Decimal> = rows.iter().map(|r| r.gift_card_sales).collect();

    sqlx::query(
        "UPDATE sales_summary \
         SET gift_card_sales = -gift_card_sales \
         WHERE id = ANY($1::int8[])",
    )
    .bind(&ids)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO data_repairs \
             (repair_kind, table_name, row_id, store_id, business_date, column_name, \
              old_value, new_value, operator, reason) \
         SELECT $5, 'sales_summary', r.id, r.store_id, r.business_date, 'gift_card_sales', \
                r.old_value, -r.old_value, $6, $7 \
         FROM UNNEST($1::int8[], $2::text[], $3::date[], $4::numeric[]) \
              AS r(id, store_id, business_date, old_value)",
    )
    .bind(&ids)
    .bind(&store_ids)
    .bind(&dates)
    .bind(&old_values)
    .bind(REPAIR_KIND)
    .bind(operator.trim())
    .bind(reason.trim())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        %from,
        %to,
        store = store.map(StoreId::as_str),
        rows = rows.len(),
        operator = operator.trim(),
        "gift card sign repair applied"
    );

    Ok(rows)
}
