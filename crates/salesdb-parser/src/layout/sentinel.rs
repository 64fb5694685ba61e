//! Sentinel-header sheets: multi-store daypart timing exports whose header
//! row is found by the literal `"Time Measure"` cell.
//!
//! Each data row is one `(store, daypart)` pair. The store cell is filled on
//! the first row of a store's block only; following rows with a blank store
//! cell belong to the last store seen.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use salesdb_core::{DaypartField, MappingTables, StoreId};

use super::types::{ColumnContext, MetricRow, MetricTarget, Triple};
use crate::error::ParseError;
use crate::grid::Grid;
use crate::value::{extract_date, parse_date, positive_duration};

pub(crate) const SENTINEL_HEADER: &str = "Time Measure";

/// Locate the `"Time Measure"` cell within the first `scan_rows` rows.
pub(crate) fn find_sentinel(grid: &Grid, scan_rows: usize) -> Option<(usize, usize)> {
    (0..grid.height().min(scan_rows)).find_map(|row| {
        grid.row(row)
            .iter()
            .position(|cell| cell.as_text() == Some(SENTINEL_HEADER))
            .map(|col| (row, col))
    })
}

#[derive(Debug)]
enum ColumnKind {
    Mapped {
        field: DaypartField,
        fallback: Option<usize>,
    },
    Unmapped,
}

#[derive(Debug)]
struct SentinelColumn {
    col: usize,
    header: String,
    kind: ColumnKind,
}

/// Lazy triple iterator over a sentinel-header grid.
#[derive(Debug)]
pub struct SentinelTriples<'g> {
    grid: &'g Grid,
    tables: &'g MappingTables,
    daypart_col: usize,
    store_col: usize,
    date_col: Option<usize>,
    sheet_date: Option<NaiveDate>,
    columns: Vec<SentinelColumn>,
    row: usize,
    col_idx: usize,
    current: Option<(Arc<ColumnContext>, String)>,
    /// Carry-forward store: raw location and its resolution.
    store: Option<(String, Option<StoreId>)>,
}

impl<'g> SentinelTriples<'g> {
    pub(crate) fn new(
        grid: &'g Grid,
        tables: &'g MappingTables,
        report_date: Option<NaiveDate>,
    ) -> Result<Self, ParseError> {
        let (header_row, daypart_col) =
            find_sentinel(grid, grid.height()).ok_or_else(|| ParseError::HeaderNotFound {
                reason: format!("no \"{SENTINEL_HEADER}\" cell"),
            })?;

        let header_text = |col: usize| grid.get(header_row, col).to_label();
        let find_header = |names: &[&str]| {
            (0..grid.width()).find(|&c| {
                let text = header_text(c);
                names.iter().any(|n| text.eq_ignore_ascii_case(n))
            })
        };

        let store_col = match find_header(&["Store", "Location"][..]) {
            Some(col) => col,
            None if daypart_col > 0 => daypart_col - 1,
            None => {
                return Err(ParseError::HeaderNotFound {
                    reason: "no store column left of the daypart column".to_string(),
                })
            }
        };
        let date_col = find_header(&["Date"][..]);

        let sheet_date = (0..header_row)
            .flat_map(|r| grid.row(r).iter())
            .find_map(extract_date)
            .or(report_date);
        if date_col.is_none() && sheet_date.is_none() {
            return Err(ParseError::MissingReportDate);
        }

        let columns = resolve_columns(grid, tables, header_row, &[daypart_col, store_col], date_col);
        tracing::debug!(
            header_row,
            daypart_col,
            store_col,
            columns = columns.len(),
            "sentinel header resolved"
        );

        Ok(Self {
            grid,
            tables,
            daypart_col,
            store_col,
            date_col,
            sheet_date,
            columns,
            row: header_row + 1,
            col_idx: 0,
            current: None,
            store: None,
        })
    }

    /// Advance to the next data row, updating the carry-forward store.
    /// Returns `false` when the grid is exhausted.
    fn start_row(&mut self) -> bool {
        while self.row < self.grid.height() {
            let row = self.row;

            let store_cell = self.grid.get(row, self.store_col);
            if !store_cell.is_blank() {
                let location = store_cell.to_label();
                let store_id = self.tables.stores.resolve(&location);
                if store_id.is_none() {
                    tracing::warn!(row, location = %location, "location did not resolve to a store");
                }
                self.store = Some((location, store_id));
            }

            let daypart = self.grid.get(row, self.daypart_col).to_label();
            if daypart.is_empty() || daypart == SENTINEL_HEADER {
                self.row += 1;
                continue;
            }

            let date = self
                .date_col
                .and_then(|c| parse_date(self.grid.get(row, c)))
                .or(self.sheet_date);
            let Some(date) = date else {
                tracing::warn!(row, "row has no parseable date; skipped");
                self.row += 1;
                continue;
            };

            let (location, store_id) = self.store.clone().unwrap_or_default();
            let context = Arc::new(ColumnContext {
                date,
                store_id,
                location,
            });
            self.current = Some((context, daypart));
            self.col_idx = 0;
            return true;
        }
        false
    }
}

fn resolve_columns(
    grid: &Grid,
    tables: &MappingTables,
    header_row: usize,
    reserved: &[usize],
    date_col: Option<usize>,
) -> Vec<SentinelColumn> {
    let header_at = |col: usize| grid.get(header_row, col).to_label();
    let find_col = |name: &str| (0..grid.width()).find(|&c| header_at(c) == name);

    let mut columns = Vec::new();
    let mut fallback_sources = HashSet::new();
    let mut unmapped = Vec::new();

    for col in 0..grid.width() {
        if reserved.contains(&col) || date_col == Some(col) {
            continue;
        }
        let header = header_at(col);
        if header.is_empty() {
            continue;
        }
        match tables.daypart_column(&header) {
            Some(mapped) => {
                let fallback = mapped.fallback.as_deref().and_then(|name| {
                    fallback_sources.insert(name.to_string());
                    find_col(name)
                });
                columns.push(SentinelColumn {
                    col,
                    header,
                    kind: ColumnKind::Mapped {
                        field: mapped.field,
                        fallback,
                    },
                });
            }
            None => unmapped.push(SentinelColumn {
                col,
                header,
                kind: ColumnKind::Unmapped,
            }),
        }
    }

    columns.extend(
        unmapped
            .into_iter()
            .filter(|c| !fallback_sources.contains(&c.header)),
    );
    columns.sort_by_key(|c| c.col);
    columns
}

impl<'g> Iterator for SentinelTriples<'g> {
    type Item = Triple<'g>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() && !self.start_row() {
                return None;
            }
            let Some((context, daypart)) = &self.current else {
                return None;
            };

            let Some(column) = self.columns.get(self.col_idx) else {
                self.current = None;
                self.row += 1;
                continue;
            };
            self.col_idx += 1;

            let row = self.row;
            let primary = self.grid.get(row, column.col);
            let (target, value) = match column.kind {
                ColumnKind::Mapped { field, fallback } => {
                    let value = match fallback {
                        Some(fb) if positive_duration(primary).is_none() => self.grid.get(row, fb),
                        _ => primary,
                    };
                    (
                        MetricTarget::Daypart {
                            daypart: daypart.clone(),
                            field,
                        },
                        value,
                    )
                }
                ColumnKind::Unmapped => (MetricTarget::Unresolved, primary),
            };

            return Some(Triple {
                row,
                col: column.col,
                context: Arc::clone(context),
                metric: Arc::new(MetricRow {
                    label: column.header.clone(),
                    target,
                }),
                value,
            });
        }
    }
}
