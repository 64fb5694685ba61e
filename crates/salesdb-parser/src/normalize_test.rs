use chrono::NaiveDate;
use salesdb_core::StoreId;

use super::*;
use crate::grid::Grid;
use crate::layout::{parse_grid, ParseOptions};

const TABLES: &str = r#"
stores:
  - code: "301290"
    name: "Paxton"
    patterns: ["301290 - 2820 Paxton St"]
  - code: "343939"
    name: "East Main"
    patterns: ["343939 - 807 E Main St"]
sales_summary_labels:
  "Net Sales": net_sales
  "Cash Due": cash_in
  "Gift Card Sales": gift_card_sales
  "Guest Count": guest_count
tender_labels:
  - "Cash"
  - "Gift Card Redeem - Kiosk"
tender_aliases:
  "Delivery: Doordash": "Doordash"
  "Door Dash": "Doordash"
labor_suffixes:
  - suffix: "Total Hours"
    field: total_hours
  - suffix: "Total Value"
    field: total_pay
daypart_columns:
  - header: "Total Cars"
    field: total_cars
  - header: "Menu"
    field: avg_menu_time
"#;

fn tables() -> MappingTables {
    MappingTables::from_yaml_str(TABLES).unwrap()
}

fn nov1() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 11, 1).unwrap()
}

/// Build a one- or two-store transposed grid from metric rows.
fn report(locations: &[&str], metric_rows: &[&[&str]]) -> Grid {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut dates = vec![String::new()];
    dates.extend(locations.iter().map(|_| "2025-11-01".to_string()));
    rows.push(dates);
    let mut header = vec![String::new()];
    header.extend(locations.iter().map(|l| (*l).to_string()));
    rows.push(header);
    for row in metric_rows {
        rows.push(row.iter().map(|c| (*c).to_string()).collect());
    }
    Grid::from_text_rows(rows)
}

fn run(grid: &Grid, opts: &NormalizeOptions) -> NormalizedBatch {
    let t = tables();
    let triples = parse_grid(grid, &t, &ParseOptions::default()).unwrap();
    normalize(triples, &t, opts)
}

const PAXTON: &str = "301290 - 2820 Paxton St";
const EAST_MAIN: &str = "343939 - 807 E Main St";

// -----------------------------------------------------------------------
// Sales summary
// -----------------------------------------------------------------------

#[test]
fn two_stores_yield_two_summary_records() {
    let grid = report(&[PAXTON, EAST_MAIN], &[&["Net Sales", "100.0", "200.0"]]);
    let batch = run(&grid, &NormalizeOptions::default());

    assert_eq!(batch.sales.len(), 2);
    assert_eq!(batch.sales[0].store_id, StoreId::new("301290"));
    assert_eq!(batch.sales[0].date, nov1());
    assert_eq!(batch.sales[0].net_sales, 100.0);
    assert_eq!(batch.sales[1].store_id, StoreId::new("343939"));
    assert_eq!(batch.sales[1].net_sales, 200.0);
    assert_eq!(batch.triples_seen, 2);
    assert_eq!(batch.dropped.total(), 0);
}

#[test]
fn header_rows_without_label_cell_map_to_the_next_column() {
    let grid = Grid::from_text_rows([
        vec!["2025-11-01", "2025-11-01"],
        vec![PAXTON, EAST_MAIN],
        vec!["Net Sales", "100.0", "200.0"],
    ]);
    let batch = run(&grid, &NormalizeOptions::default());

    assert_eq!(batch.sales.len(), 2);
    assert_eq!(batch.sales[0].store_id, StoreId::new("301290"));
    assert_eq!(batch.sales[0].date, nov1());
    assert_eq!(batch.sales[0].net_sales, 100.0);
    assert_eq!(batch.sales[1].store_id, StoreId::new("343939"));
    assert_eq!(batch.sales[1].date, nov1());
    assert_eq!(batch.sales[1].net_sales, 200.0);
    assert_eq!(batch.dropped.total(), 0);
}

#[test]
fn currency_string_is_parsed() {
    let grid = report(&[PAXTON], &[&["Cash Due", "$1,025.02"]]);
    let batch = run(&grid, &NormalizeOptions::default());
    assert_eq!(batch.sales.len(), 1);
    assert!((batch.sales[0].cash_in - 1025.02).abs() < 1e-9);
}

#[test]
fn summary_fields_accumulate_into_one_record() {
    let grid = report(
        &[PAXTON],
        &[
            &["Net Sales", "100"],
            &["Guest Count", "12 Guests"],
            &["Cash Due", "40"],
        ],
    );
    let batch = run(&grid, &NormalizeOptions::default());
    assert_eq!(batch.sales.len(), 1);
    let rec = &batch.sales[0];
    assert_eq!(rec.net_sales, 100.0);
    assert_eq!(rec.guest_count, 12);
    assert_eq!(rec.cash_in, 40.0);
    assert_eq!(rec.gross_sales, 0.0);
}

#[test]
fn repeated_summary_label_is_last_write_wins() {
    let grid = report(&[PAXTON], &[&["Net Sales", "100"], &["Net Sales", "150"]]);
    let batch = run(&grid, &NormalizeOptions::default());
    assert_eq!(batch.sales.len(), 1);
    assert_eq!(batch.sales[0].net_sales, 150.0);
}

#[test]
fn negative_gift_card_sales_are_preserved() {
    let grid = report(&[PAXTON], &[&["Gift Card Sales", "(25.00)"]]);
    let batch = run(&grid, &NormalizeOptions::default());
    assert_eq!(batch.sales[0].gift_card_sales, -25.0);
}

#[test]
fn unparseable_value_is_counted_and_skipped() {
    let grid = report(&[PAXTON], &[&["Net Sales", "n/a"]]);
    let batch = run(&grid, &NormalizeOptions::default());
    assert!(batch.sales.is_empty());
    assert_eq!(batch.dropped.unparseable_value, 1);
}

// -----------------------------------------------------------------------
// Tenders
// -----------------------------------------------------------------------

#[test]
fn zero_tender_is_dropped() {
    let grid = report(&[PAXTON], &[&["Gift Card Redeem - Kiosk", "0"]]);
    let batch = run(&grid, &NormalizeOptions::default());
    assert!(batch.tenders.is_empty());
    assert_eq!(batch.dropped.zero_amount, 1);
}

#[test]
fn blank_and_dash_tenders_are_zero_and_dropped() {
    let grid = report(&[PAXTON, EAST_MAIN], &[&["Cash", "-", ""], &["Gift Card Redeem - Kiosk", "0.00", "5"]]);
    let batch = run(&grid, &NormalizeOptions::default());
    assert_eq!(batch.tenders.len(), 1);
    assert_eq!(batch.tenders[0].store_id, StoreId::new("343939"));
    assert!(batch.tenders.iter().all(|t| t.detail_amount != 0.0));
    assert_eq!(batch.dropped.zero_amount, 3);
}

#[test]
fn aliases_collapse_without_summing() {
    let grid = report(
        &[PAXTON],
        &[&["Delivery: Doordash", "10.00"], &["Door Dash", "15.00"]],
    );
    let batch = run(&grid, &NormalizeOptions::default());
    assert_eq!(batch.tenders.len(), 1);
    assert_eq!(batch.tenders[0].tender_type, "Doordash");
    assert_eq!(batch.tenders[0].detail_amount, 15.0);
}

#[test]
fn sum_policy_adds_aliased_tenders() {
    let grid = report(
        &[PAXTON],
        &[&["Delivery: Doordash", "10.00"], &["Door Dash", "15.00"]],
    );
    let opts = NormalizeOptions {
        tender_aggregation: TenderAggregation::Sum,
    };
    let batch = run(&grid, &opts);
    assert_eq!(batch.tenders.len(), 1);
    assert_eq!(batch.tenders[0].detail_amount, 25.0);
}

#[test]
fn summed_tenders_that_cancel_are_dropped() {
    let grid = report(
        &[PAXTON],
        &[&["Delivery: Doordash", "10.00"], &["Door Dash", "(10.00)"]],
    );
    let opts = NormalizeOptions {
        tender_aggregation: TenderAggregation::Sum,
    };
    let batch = run(&grid, &opts);
    assert!(batch.tenders.is_empty());
    assert_eq!(batch.dropped.zero_amount, 1);
}

#[test]
fn unaliased_tender_keeps_raw_label() {
    let grid = report(&[PAXTON], &[&["Cash", "812.40"]]);
    let batch = run(&grid, &NormalizeOptions::default());
    assert_eq!(batch.tenders[0].tender_type, "Cash");
}

// -----------------------------------------------------------------------
// Labor
// -----------------------------------------------------------------------

#[test]
fn labor_rows_share_a_position_record() {
    let grid = report(
        &[PAXTON],
        &[&["Crew Total Hours", "41.5"], &["Crew Total Value", "$512.00"]],
    );
    let batch = run(&grid, &NormalizeOptions::default());
    assert_eq!(batch.labor.len(), 1);
    let rec = &batch.labor[0];
    assert_eq!(rec.labor_position, "Crew");
    assert_eq!(rec.total_hours, 41.5);
    assert_eq!(rec.total_pay, 512.0);
}

// -----------------------------------------------------------------------
// Drops
// -----------------------------------------------------------------------

#[test]
fn unresolved_metric_is_counted_per_triple() {
    let grid = report(&[PAXTON, EAST_MAIN], &[&["Mobile Order Fees", "1", "2"]]);
    let batch = run(&grid, &NormalizeOptions::default());
    assert!(batch.is_empty());
    assert_eq!(batch.dropped.unresolved_metric, 2);
    assert!(batch.unresolved_labels.contains("Mobile Order Fees"));
}

#[test]
fn unresolved_store_column_is_dropped() {
    let grid = report(&[PAXTON, "999 - Nowhere"], &[&["Net Sales", "1", "2"]]);
    let batch = run(&grid, &NormalizeOptions::default());
    assert_eq!(batch.sales.len(), 1);
    assert_eq!(batch.dropped.unresolved_store, 1);
    assert!(batch.unresolved_locations.contains("999 - Nowhere"));
}

// -----------------------------------------------------------------------
// Dayparts
// -----------------------------------------------------------------------

#[test]
fn sentinel_rows_become_daypart_records() {
    let t = tables();
    let grid = Grid::from_text_rows([
        vec!["Report 11/01/2025", "", "", ""],
        vec!["Store", "Time Measure", "Total Cars", "Menu"],
        vec![PAXTON, "Breakfast", "40", "0:35"],
        vec!["", "Lunch", "55", "0"],
    ]);
    let triples = parse_grid(&grid, &t, &ParseOptions::default()).unwrap();
    let batch = normalize(triples, &t, &NormalizeOptions::default());

    assert_eq!(batch.dayparts.len(), 2);
    let breakfast = &batch.dayparts[0];
    assert_eq!(breakfast.daypart, "Breakfast");
    assert_eq!(breakfast.total_cars, 40);
    assert_eq!(breakfast.avg_menu_time, Some(35.0));
    let lunch = &batch.dayparts[1];
    assert_eq!(lunch.store_id, StoreId::new("301290"));
    assert_eq!(lunch.avg_menu_time, None);
}
