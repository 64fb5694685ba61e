//! Layout parsers: turn a [`Grid`] into a lazy stream of
//! `(context, metric, value)` triples.
//!
//! Two families are supported. Transposed reports put dates and store
//! locations in the first two rows and one metric per following row.
//! Sentinel-header sheets are located by a `"Time Measure"` header cell and
//! carry one `(store, daypart)` pair per row.

mod sentinel;
mod transposed;
mod types;

use chrono::NaiveDate;
use salesdb_core::MappingTables;

use crate::error::ParseError;
use crate::grid::Grid;

pub use sentinel::SentinelTriples;
pub use transposed::TransposedTriples;
pub use types::{ColumnContext, MetricRow, MetricTarget, Triple};

pub const DEFAULT_HEADER_SCAN_ROWS: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    #[default]
    Auto,
    Transposed,
    Sentinel,
}

impl Layout {
    /// Pick a concrete layout: sentinel when a `"Time Measure"` cell appears
    /// in the first `scan_rows` rows, transposed otherwise.
    #[must_use]
    pub fn detect(grid: &Grid, scan_rows: usize) -> Layout {
        if sentinel::find_sentinel(grid, scan_rows).is_some() {
            Layout::Sentinel
        } else {
            Layout::Transposed
        }
    }
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Layout::Auto => write!(f, "auto"),
            Layout::Transposed => write!(f, "transposed"),
            Layout::Sentinel => write!(f, "sentinel"),
        }
    }
}

impl std::str::FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Layout::Auto),
            "transposed" => Ok(Layout::Transposed),
            "sentinel" => Ok(Layout::Sentinel),
            other => Err(format!(
                "unknown layout '{other}'; expected auto, transposed, or sentinel"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub layout: Layout,
    pub header_scan_rows: usize,
    /// Date for sentinel sheets that carry none of their own.
    pub report_date: Option<NaiveDate>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            layout: Layout::Auto,
            header_scan_rows: DEFAULT_HEADER_SCAN_ROWS,
            report_date: None,
        }
    }
}

/// Triple stream for either layout.
#[derive(Debug)]
pub enum Triples<'g> {
    Transposed(TransposedTriples<'g>),
    Sentinel(SentinelTriples<'g>),
}

impl Triples<'_> {
    #[must_use]
    pub fn layout(&self) -> Layout {
        match self {
            Triples::Transposed(_) => Layout::Transposed,
            Triples::Sentinel(_) => Layout::Sentinel,
        }
    }
}

impl<'g> Iterator for Triples<'g> {
    type Item = Triple<'g>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Triples::Transposed(inner) => inner.next(),
            Triples::Sentinel(inner) => inner.next(),
        }
    }
}

/// Resolve the header of `grid` and return its triple stream.
///
/// # Errors
///
/// Returns [`ParseError`] when the header cannot be located or a header
/// date does not parse. The grid is not otherwise validated up front; rows
/// are classified as the stream is consumed.
pub fn parse_grid<'g>(
    grid: &'g Grid,
    tables: &'g MappingTables,
    opts: &ParseOptions,
) -> Result<Triples<'g>, ParseError> {
    let layout = match opts.layout {
        Layout::Auto => Layout::detect(grid, opts.header_scan_rows),
        forced => forced,
    };

    match layout {
        Layout::Sentinel => Ok(Triples::Sentinel(SentinelTriples::new(
            grid,
            tables,
            opts.report_date,
        )?)),
        Layout::Transposed | Layout::Auto => Ok(Triples::Transposed(TransposedTriples::new(
            grid,
            tables,
            opts.report_date,
        )?)),
    }
}

#[cfg(test)]
#[path = "layout_test.rs"]
mod tests;
