//! Transposed reports: row 0 holds dates, row 1 holds store locations, and
//! every following row is a metric label in column 0 followed by one value
//! per `(date, store)` column.
//!
//! Some exports omit the label cell in the two header rows, so the header
//! cells start in column 0 and sit one column left of the values they
//! describe. That shape is recognised by a date in the top-left cell.

use std::sync::Arc;

use chrono::NaiveDate;
use salesdb_core::MappingTables;

use super::types::{ColumnContext, MetricRow, MetricTarget, Triple};
use crate::error::ParseError;
use crate::grid::{CellValue, Grid};
use crate::value::parse_date;

const DATE_ROW: usize = 0;
const LOCATION_ROW: usize = 1;
const FIRST_METRIC_ROW: usize = 2;

/// Lazy triple iterator over a transposed grid.
#[derive(Debug)]
pub struct TransposedTriples<'g> {
    grid: &'g Grid,
    tables: &'g MappingTables,
    columns: Vec<(usize, Arc<ColumnContext>)>,
    row: usize,
    col_idx: usize,
    metric: Option<Arc<MetricRow>>,
}

impl<'g> TransposedTriples<'g> {
    pub(crate) fn new(
        grid: &'g Grid,
        tables: &'g MappingTables,
        report_date: Option<NaiveDate>,
    ) -> Result<Self, ParseError> {
        if grid.height() < FIRST_METRIC_ROW {
            return Err(ParseError::HeaderNotFound {
                reason: "sheet has fewer than two rows".to_string(),
            });
        }

        let shift = header_shift(grid)?;
        let has_date =
            (1 - shift..grid.width()).any(|c| parse_date(grid.get(DATE_ROW, c)).is_some());
        if !has_date {
            return Err(ParseError::HeaderNotFound {
                reason: "first row has no parseable dates".to_string(),
            });
        }

        let columns = resolve_columns(grid, tables, report_date, shift)?;
        tracing::debug!(
            columns = columns.len(),
            shifted_header = shift == 1,
            rows = grid.height() - FIRST_METRIC_ROW,
            "transposed header resolved"
        );

        Ok(Self {
            grid,
            tables,
            columns,
            row: FIRST_METRIC_ROW,
            col_idx: 0,
            metric: None,
        })
    }
}

/// Offset from a header cell to the value column it describes: 0 when the
/// header rows carry a label cell in column 0, 1 when they start with a date.
///
/// A shifted header must still cover every value column; otherwise values
/// would land under the wrong store and the sheet is rejected.
fn header_shift(grid: &Grid) -> Result<usize, ParseError> {
    if parse_date(grid.get(DATE_ROW, 0)).is_none() {
        return Ok(0);
    }

    let header_width = used_width(grid.row(DATE_ROW)).max(used_width(grid.row(LOCATION_ROW)));
    let value_columns = (FIRST_METRIC_ROW..grid.height())
        .map(|row| used_width(grid.row(row)).saturating_sub(1))
        .max()
        .unwrap_or(0);
    if value_columns > header_width {
        return Err(ParseError::HeaderNotFound {
            reason: format!(
                "header rows start in column 0 but describe {header_width} of {value_columns} value columns"
            ),
        });
    }
    Ok(1)
}

/// Number of cells up to and including the last non-blank one.
fn used_width(row: &[CellValue]) -> usize {
    row.iter().rposition(|cell| !cell.is_blank()).map_or(0, |i| i + 1)
}

/// Build one context per data column. A blank date cell inherits the date of
/// the column to its left (merged date headers export that way).
fn resolve_columns(
    grid: &Grid,
    tables: &MappingTables,
    report_date: Option<NaiveDate>,
    shift: usize,
) -> Result<Vec<(usize, Arc<ColumnContext>)>, ParseError> {
    let mut columns = Vec::new();
    let mut last_date = report_date;

    for header in 1 - shift..grid.width() {
        let date_cell = grid.get(DATE_ROW, header);
        let location_cell = grid.get(LOCATION_ROW, header);
        if date_cell.is_blank() && location_cell.is_blank() {
            continue;
        }
        let col = header + shift;

        let date = if date_cell.is_blank() {
            last_date
        } else {
            parse_date(date_cell)
        }
        .ok_or_else(|| ParseError::InvalidHeaderDate {
            column: header,
            value: date_cell.to_label(),
        })?;
        last_date = Some(date);

        let location = location_cell.to_label();
        let store_id = tables.stores.resolve(&location);
        if store_id.is_none() {
            tracing::warn!(column = col, location = %location, "location did not resolve to a store");
        }

        columns.push((
            col,
            Arc::new(ColumnContext {
                date,
                store_id,
                location,
            }),
        ));
    }

    Ok(columns)
}

impl<'g> Iterator for TransposedTriples<'g> {
    type Item = Triple<'g>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.row >= self.grid.height() {
                return None;
            }

            let metric = if let Some(metric) = &self.metric {
                Arc::clone(metric)
            } else {
                let label = self.grid.get(self.row, 0).to_label();
                // Blank labels are section spacers.
                if label.is_empty() {
                    self.row += 1;
                    continue;
                }
                let metric = Arc::new(MetricRow::classify(&label, self.tables));
                if metric.target == MetricTarget::Unresolved {
                    tracing::debug!(row = self.row, label = %label, "unresolved metric label");
                }
                self.metric = Some(Arc::clone(&metric));
                metric
            };

            if let Some((col, context)) = self.columns.get(self.col_idx) {
                self.col_idx += 1;
                return Some(Triple {
                    row: self.row,
                    col: *col,
                    context: Arc::clone(context),
                    metric,
                    value: self.grid.get(self.row, *col),
                });
            }

            self.row += 1;
            self.col_idx = 0;
            self.metric = None;
        }
    }
}
