//! Live integration tests for salesdb-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/salesdb-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use salesdb_core::{
    DaypartRecord, LaborRecord, ReportTable, RunSummary, SalesSummaryRecord, StoreId,
    TenderTypeRecord,
};
use salesdb_db::{
    apply_gift_card_sign_repair, complete_ingest_run, create_ingest_run, fail_ingest_run,
    find_duplicates, get_ingest_run, list_ingest_files, list_ingest_runs,
    preview_gift_card_sign_repair, record_ingest_file, resolve_duplicates, start_ingest_run,
    upsert_records, DbError, DeleteScope, NewIngestFile, WriteStrategy,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 11, d).unwrap()
}

fn sales(store: &str, d: u32, net_sales: f64) -> SalesSummaryRecord {
    let mut record = SalesSummaryRecord::new(StoreId::new(store), day(d));
    record.net_sales = net_sales;
    record
}

fn tender(store: &str, d: u32, tender_type: &str, amount: f64) -> TenderTypeRecord {
    TenderTypeRecord {
        store_id: StoreId::new(store),
        date: day(d),
        tender_type: tender_type.to_string(),
        detail_amount: amount,
    }
}

async fn count_rows(pool: &sqlx::PgPool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap_or_else(|e| panic!("count {table} failed: {e}"))
}

async fn net_sales_for(pool: &sqlx::PgPool, store: &str, d: u32) -> Option<f64> {
    sqlx::query_scalar::<_, f64>(
        "SELECT net_sales::float8 FROM sales_summary \
         WHERE store_id = $1 AND business_date = $2",
    )
    .bind(store)
    .bind(day(d))
    .fetch_optional(pool)
    .await
    .expect("net_sales query failed")
}

// ---------------------------------------------------------------------------
// Section 1: Write strategies
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn insert_if_absent_rerun_is_idempotent(pool: sqlx::PgPool) {
    let records = vec![sales("301290", 1, 100.0), sales("343939", 1, 200.0)];

    let first = upsert_records(&pool, &records, WriteStrategy::InsertIfAbsent, 500)
        .await
        .expect("first upsert failed");
    assert_eq!(first.inserted, 2);
    assert_eq!(first.skipped_duplicate, 0);

    let second = upsert_records(&pool, &records, WriteStrategy::InsertIfAbsent, 500)
        .await
        .expect("second upsert failed");
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped_duplicate, 2);

    assert_eq!(count_rows(&pool, "sales_summary").await, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn natural_key_is_unique_within_one_call(pool: sqlx::PgPool) {
    let records = vec![
        tender("301290", 1, "Cash", 10.0),
        tender("301290", 1, "Cash", 12.0),
    ];

    let outcome = upsert_records(&pool, &records, WriteStrategy::InsertIfAbsent, 500)
        .await
        .expect("upsert failed");

    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.skipped_duplicate, 1);
    assert_eq!(count_rows(&pool, "tender_type").await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn reject_on_conflict_reports_conflicting_keys(pool: sqlx::PgPool) {
    upsert_records(
        &pool,
        &[sales("301290", 1, 100.0)],
        WriteStrategy::InsertIfAbsent,
        500,
    )
    .await
    .expect("seed upsert failed");

    let outcome = upsert_records(
        &pool,
        &[sales("301290", 1, 999.0), sales("301290", 2, 50.0)],
        WriteStrategy::RejectOnConflict,
        500,
    )
    .await
    .expect("upsert failed");

    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.conflicts, 1);
    assert_eq!(outcome.skipped_duplicate, 0);
    assert_eq!(outcome.conflict_keys.len(), 1);
    assert_eq!(outcome.conflict_keys[0].store_id, StoreId::new("301290"));
    assert_eq!(outcome.conflict_keys[0].date, day(1));

    // The stored row is untouched.
    assert_eq!(net_sales_for(&pool, "301290", 1).await, Some(100.0));
}

#[sqlx::test(migrations = "../../migrations")]
async fn delete_then_insert_by_keys_replaces_values(pool: sqlx::PgPool) {
    upsert_records(
        &pool,
        &[sales("301290", 1, 100.0), sales("301290", 2, 80.0)],
        WriteStrategy::InsertIfAbsent,
        500,
    )
    .await
    .expect("seed upsert failed");

    let outcome = upsert_records(
        &pool,
        &[sales("301290", 1, 150.0)],
        WriteStrategy::DeleteThenInsert(DeleteScope::MatchingKeys),
        500,
    )
    .await
    .expect("upsert failed");

    assert_eq!(outcome.deleted, 1);
    assert_eq!(outcome.inserted, 1);
    assert_eq!(net_sales_for(&pool, "301290", 1).await, Some(150.0));
    assert_eq!(net_sales_for(&pool, "301290", 2).await, Some(80.0));
}

#[sqlx::test(migrations = "../../migrations")]
async fn delete_then_insert_by_keys_matches_sub_key(pool: sqlx::PgPool) {
    upsert_records(
        &pool,
        &[
            tender("301290", 1, "Cash", 10.0),
            tender("301290", 1, "Doordash", 20.0),
        ],
        WriteStrategy::InsertIfAbsent,
        500,
    )
    .await
    .expect("seed upsert failed");

    let outcome = upsert_records(
        &pool,
        &[tender("301290", 1, "Cash", 11.0)],
        WriteStrategy::DeleteThenInsert(DeleteScope::MatchingKeys),
        500,
    )
    .await
    .expect("upsert failed");

    assert_eq!(outcome.deleted, 1);
    assert_eq!(count_rows(&pool, "tender_type").await, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn delete_then_insert_by_range_is_scoped_to_input_stores(pool: sqlx::PgPool) {
    upsert_records(
        &pool,
        &[
            sales("301290", 1, 100.0),
            sales("301290", 2, 110.0),
            sales("301290", 9, 120.0),
            sales("343939", 1, 200.0),
        ],
        WriteStrategy::InsertIfAbsent,
        500,
    )
    .await
    .expect("seed upsert failed");

    let outcome = upsert_records(
        &pool,
        &[sales("301290", 1, 101.0)],
        WriteStrategy::DeleteThenInsert(DeleteScope::DateRange {
            from: day(1),
            to: day(7),
        }),
        500,
    )
    .await
    .expect("upsert failed");

    assert_eq!(outcome.deleted, 2);
    assert_eq!(outcome.inserted, 1);
    assert_eq!(net_sales_for(&pool, "301290", 1).await, Some(101.0));
    assert_eq!(net_sales_for(&pool, "301290", 2).await, None);
    assert_eq!(net_sales_for(&pool, "301290", 9).await, Some(120.0));
    assert_eq!(net_sales_for(&pool, "343939", 1).await, Some(200.0));
}

#[sqlx::test(migrations = "../../migrations")]
async fn delete_then_insert_by_range_rejects_records_outside_range(pool: sqlx::PgPool) {
    upsert_records(
        &pool,
        &[sales("301290", 1, 100.0), sales("301290", 9, 120.0)],
        WriteStrategy::InsertIfAbsent,
        500,
    )
    .await
    .expect("seed upsert failed");

    let err = upsert_records(
        &pool,
        &[sales("301290", 1, 101.0), sales("301290", 9, 999.0)],
        WriteStrategy::DeleteThenInsert(DeleteScope::DateRange {
            from: day(1),
            to: day(7),
        }),
        500,
    )
    .await
    .expect_err("record outside the range must be rejected");

    assert!(matches!(
        err,
        DbError::OutsideDeleteRange {
            table: ReportTable::SalesSummary,
            count: 1,
            ref first,
            ..
        } if first.date == day(9)
    ));
    // Nothing was deleted or written.
    assert_eq!(net_sales_for(&pool, "301290", 1).await, Some(100.0));
    assert_eq!(net_sales_for(&pool, "301290", 9).await, Some(120.0));
}

#[sqlx::test(migrations = "../../migrations")]
async fn small_batch_size_writes_every_row(pool: sqlx::PgPool) {
    let records: Vec<_> = (1..=5).map(|d| sales("301290", d, 10.0)).collect();

    let outcome = upsert_records(&pool, &records, WriteStrategy::InsertIfAbsent, 2)
        .await
        .expect("upsert failed");

    assert_eq!(outcome.inserted, 5);
    assert_eq!(count_rows(&pool, "sales_summary").await, 5);
}

#[sqlx::test(migrations = "../../migrations")]
async fn failing_batch_is_retried_in_halves(pool: sqlx::PgPool) {
    // detail_amount = 0 violates the table's CHECK constraint.
    let records = vec![
        tender("301290", 1, "Cash", 10.0),
        tender("301290", 1, "Broken", 0.0),
    ];

    let outcome = upsert_records(&pool, &records, WriteStrategy::InsertIfAbsent, 500)
        .await
        .expect("upsert returned a hard error");

    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.failed_batches, 1);
    assert_eq!(outcome.failed_rows, 1);
    assert!(outcome.has_failures());
    assert!(matches!(
        outcome.failures.as_slice(),
        [DbError::Persistence {
            table: ReportTable::TenderType,
            rows: 1,
            ..
        }]
    ));
    assert_eq!(count_rows(&pool, "tender_type").await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn labor_and_daypart_records_persist(pool: sqlx::PgPool) {
    let mut crew = LaborRecord::new(StoreId::new("301290"), day(1), "Crew".to_string());
    crew.total_hours = 41.5;
    crew.total_pay = 512.0;

    let mut breakfast = DaypartRecord::new(StoreId::new("301290"), day(1), "Breakfast".to_string());
    breakfast.total_cars = 40;
    breakfast.avg_menu_time = Some(35.0);

    let labor = upsert_records(&pool, &[crew], WriteStrategy::InsertIfAbsent, 500)
        .await
        .expect("labor upsert failed");
    let dayparts = upsert_records(&pool, &[breakfast], WriteStrategy::InsertIfAbsent, 500)
        .await
        .expect("daypart upsert failed");

    assert_eq!(labor.inserted, 1);
    assert_eq!(dayparts.inserted, 1);

    let (menu, greet): (Option<f64>, Option<f64>) = sqlx::query_as(
        "SELECT avg_menu_time::float8, avg_greet_time::float8 \
         FROM daypart_service WHERE daypart = 'Breakfast'",
    )
    .fetch_one(&pool)
    .await
    .expect("daypart query failed");
    assert_eq!(menu, Some(35.0));
    assert_eq!(greet, None);
}

#[sqlx::test(migrations = "../../migrations")]
async fn empty_input_is_a_no_op(pool: sqlx::PgPool) {
    let records: Vec<SalesSummaryRecord> = Vec::new();
    let outcome = upsert_records(
        &pool,
        &records,
        WriteStrategy::DeleteThenInsert(DeleteScope::DateRange {
            from: day(1),
            to: day(30),
        }),
        500,
    )
    .await
    .expect("upsert failed");

    assert_eq!(outcome.inserted, 0);
    assert_eq!(outcome.deleted, 0);
}

// ---------------------------------------------------------------------------
// Section 2: Duplicate maintenance
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn duplicates_are_found_and_resolved_keeping_newest(pool: sqlx::PgPool) {
    // Simulate rows loaded before the unique index existed.
    sqlx::query("DROP INDEX sales_summary_natural_key")
        .execute(&pool)
        .await
        .expect("drop index failed");

    // ON CONFLICT needs the dropped index, so seed with plain inserts.
    for (store, net) in [
        ("301290", 100.0_f64),
        ("301290", 110.0),
        ("301290", 120.0),
        ("343939", 5.0),
    ] {
        sqlx::query(
            "INSERT INTO sales_summary (store_id, business_date, net_sales) VALUES ($1, $2, $3::float8)",
        )
        .bind(store)
        .bind(day(1))
        .bind(net)
        .execute(&pool)
        .await
        .expect("raw insert failed");
    }
    assert_eq!(count_rows(&pool, "sales_summary").await, 4);

    let duplicates = find_duplicates(&pool, ReportTable::SalesSummary)
        .await
        .expect("find_duplicates failed");
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].store_id, "301290");
    assert_eq!(duplicates[0].copies, 3);
    assert!(duplicates[0].sub_key.is_none());

    let deleted = resolve_duplicates(&pool, ReportTable::SalesSummary)
        .await
        .expect("resolve_duplicates failed");
    assert_eq!(deleted, 2);

    let kept_id: i64 = sqlx::query_scalar(
        "SELECT id FROM sales_summary WHERE store_id = '301290' AND business_date = $1",
    )
    .bind(day(1))
    .fetch_one(&pool)
    .await
    .expect("kept row query failed");
    assert_eq!(kept_id, duplicates[0].keep_id);
    assert_eq!(net_sales_for(&pool, "301290", 1).await, Some(120.0));

    assert_eq!(net_sales_for(&pool, "343939", 1).await, Some(5.0));

    let remaining = find_duplicates(&pool, ReportTable::SalesSummary)
        .await
        .expect("find_duplicates failed");
    assert!(remaining.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn clean_table_has_no_duplicates(pool: sqlx::PgPool) {
    upsert_records(
        &pool,
        &[tender("301290", 1, "Cash", 1.0), tender("301290", 1, "Visa", 2.0)],
        WriteStrategy::InsertIfAbsent,
        500,
    )
    .await
    .expect("upsert failed");

    let duplicates = find_duplicates(&pool, ReportTable::TenderType)
        .await
        .expect("find_duplicates failed");
    assert!(duplicates.is_empty());
    assert_eq!(
        resolve_duplicates(&pool, ReportTable::TenderType)
            .await
            .expect("resolve_duplicates failed"),
        0
    );
}

// ---------------------------------------------------------------------------
// Section 3: Gift-card sign repair
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn gift_card_repair_previews_then_applies_with_audit(pool: sqlx::PgPool) {
    let mut negative = sales("301290", 1, 100.0);
    negative.gift_card_sales = -25.0;
    let mut positive = sales("343939", 1, 100.0);
    positive.gift_card_sales = 10.0;
    let mut outside = sales("301290", 20, 100.0);
    outside.gift_card_sales = -5.0;

    upsert_records(
        &pool,
        &[negative, positive, outside],
        WriteStrategy::InsertIfAbsent,
        500,
    )
    .await
    .expect("seed upsert failed");

    let preview = preview_gift_card_sign_repair(&pool, day(1), day(7), None)
        .await
        .expect("preview failed");
    assert_eq!(preview.len(), 1);
    assert_eq!(preview[0].store_id, "301290");
    assert_eq!(preview[0].gift_card_sales, Decimal::new(-25, 0));

    // Preview does not change anything.
    assert_eq!(count_rows(&pool, "data_repairs").await, 0);

    let err = apply_gift_card_sign_repair(&pool, day(1), day(7), None, " ", "sign fix")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidRepair(_)));

    let repaired =
        apply_gift_card_sign_repair(&pool, day(1), day(7), None, "ops", "vendor sign flip")
            .await
            .expect("apply failed");
    assert_eq!(repaired.len(), 1);

    let value: f64 = sqlx::query_scalar(
        "SELECT gift_card_sales::float8 FROM sales_summary \
         WHERE store_id = '301290' AND business_date = $1",
    )
    .bind(day(1))
    .fetch_one(&pool)
    .await
    .expect("value query failed");
    assert_eq!(value, 25.0);

    let (operator, old_value, new_value): (String, f64, f64) = sqlx::query_as(
        "SELECT operator, old_value::float8, new_value::float8 FROM data_repairs",
    )
    .fetch_one(&pool)
    .await
    .expect("audit query failed");
    assert_eq!(operator, "ops");
    assert_eq!(old_value, -25.0);
    assert_eq!(new_value, 25.0);

    let after = preview_gift_card_sign_repair(&pool, day(1), day(7), None)
        .await
        .expect("preview failed");
    assert!(after.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn gift_card_repair_can_target_one_store(pool: sqlx::PgPool) {
    let mut a = sales("301290", 1, 0.0);
    a.gift_card_sales = -1.0;
    let mut b = sales("343939", 1, 0.0);
    b.gift_card_sales = -2.0;
    upsert_records(&pool, &[a, b], WriteStrategy::InsertIfAbsent, 500)
        .await
        .expect("seed upsert failed");

    let store = StoreId::new("343939");
    let repaired =
        apply_gift_card_sign_repair(&pool, day(1), day(1), Some(&store), "ops", "one store")
            .await
            .expect("apply failed");

    assert_eq!(repaired.len(), 1);
    assert_eq!(repaired[0].store_id, "343939");
    let remaining = preview_gift_card_sign_repair(&pool, day(1), day(1), None)
        .await
        .expect("preview failed");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].store_id, "301290");
}

// ---------------------------------------------------------------------------
// Section 4: Ingest run lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn ingest_run_lifecycle_queued_to_succeeded(pool: sqlx::PgPool) {
    let run = create_ingest_run(&pool, "insert-if-absent", 2)
        .await
        .expect("create_ingest_run failed");
    assert_eq!(run.status, "queued");
    assert_eq!(run.files_total, 2);
    assert!(run.started_at.is_none());

    start_ingest_run(&pool, run.id)
        .await
        .expect("start_ingest_run failed");

    let file = NewIngestFile {
        path: "reports/2025-11-01.csv",
        sha256: Some("abc123"),
        layout: Some("transposed"),
        status: "failed",
        rows_parsed: 0,
        records_normalized: 0,
        rows_upserted: 0,
        error_message: Some("timed out"),
    };
    record_ingest_file(&pool, run.id, &file)
        .await
        .expect("record_ingest_file failed");
    // Re-recording the same path updates the row in place.
    let retried = NewIngestFile {
        status: "succeeded",
        rows_parsed: 40,
        records_normalized: 12,
        rows_upserted: 12,
        error_message: None,
        ..file
    };
    record_ingest_file(&pool, run.id, &retried)
        .await
        .expect("record_ingest_file failed");

    let summary = RunSummary {
        files_processed: 1,
        rows_upserted: 12,
        ..RunSummary::default()
    };
    complete_ingest_run(&pool, run.id, &summary)
        .await
        .expect("complete_ingest_run failed");

    let fetched = get_ingest_run(&pool, run.id)
        .await
        .expect("get_ingest_run failed");
    assert_eq!(fetched.status, "succeeded");
    assert!(fetched.completed_at.is_some());
    assert_eq!(fetched.run_summary().unwrap(), Some(summary));

    let files = list_ingest_files(&pool, run.id)
        .await
        .expect("list_ingest_files failed");
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].status, "succeeded");
    assert_eq!(files[0].rows_upserted, 12);
    assert!(files[0].error_message.is_none());

    let runs = list_ingest_runs(&pool, 10)
        .await
        .expect("list_ingest_runs failed");
    assert_eq!(runs.len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn ingest_run_can_fail_from_queued(pool: sqlx::PgPool) {
    let run = create_ingest_run(&pool, "reject-on-conflict", 0)
        .await
        .expect("create_ingest_run failed");

    fail_ingest_run(&pool, run.id, "no input files", None)
        .await
        .expect("fail_ingest_run failed");

    let fetched = get_ingest_run(&pool, run.id)
        .await
        .expect("get_ingest_run failed");
    assert_eq!(fetched.status, "failed");
    assert_eq!(fetched.error_message.as_deref(), Some("no input files"));
    assert!(fetched.summary.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn ingest_run_rejects_invalid_transitions(pool: sqlx::PgPool) {
    let run = create_ingest_run(&pool, "insert-if-absent", 1)
        .await
        .expect("create_ingest_run failed");

    let err = complete_ingest_run(&pool, run.id, &RunSummary::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::InvalidIngestRunTransition {
            expected_status: "running",
            ..
        }
    ));

    start_ingest_run(&pool, run.id)
        .await
        .expect("start_ingest_run failed");
    let err = start_ingest_run(&pool, run.id).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::InvalidIngestRunTransition {
            expected_status: "queued",
            ..
        }
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn missing_ingest_run_is_not_found(pool: sqlx::PgPool) {
    let err = get_ingest_run(&pool, 9999).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound));
}
