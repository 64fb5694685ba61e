//! Reading a spreadsheet page into a rectangular grid of cells.
//!
//! CSV files go through the `csv` crate; Excel and ODS workbooks go through
//! `calamine`, which auto-detects the format. Either way the result is a
//! [`Grid`] of [`CellValue`]s indexed by `(row, col)` relative to the first
//! used cell of the sheet.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;

use crate::error::ParseError;

/// An untyped input cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl CellValue {
    /// Build a cell from raw text, trimming whitespace; blank text is `Empty`.
    #[must_use]
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(trimmed.to_string())
        }
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text rendering used for row labels, location strings, and logs.
    #[must_use]
    pub fn to_label(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => CellValue::Empty,
            Data::String(s) => CellValue::from_text(s),
            Data::Float(f) => CellValue::Number(*f),
            #[allow(clippy::cast_precision_loss)]
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Bool(b) => CellValue::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Data::DateTime(dt) => {
                let serial = dt.as_f64();
                // Time-only cells (drive-through timings) are fractions of a day.
                if serial < 1.0 {
                    CellValue::Number(serial * 86_400.0)
                } else {
                    dt.as_datetime()
                        .map_or(CellValue::Number(serial), |d| CellValue::Date(d.date()))
                }
            }
            Data::DateTimeIso(s) => s
                .get(..10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
                .map_or_else(|| CellValue::from_text(s), CellValue::Date),
            Data::DurationIso(s) => CellValue::from_text(s),
        }
    }
}

static EMPTY: CellValue = CellValue::Empty;

/// A rectangular view over one sheet. Out-of-range reads return
/// [`CellValue::Empty`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<CellValue>>,
    width: usize,
}

impl Grid {
    #[must_use]
    pub fn from_rows(rows: Vec<Vec<CellValue>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        Self { rows, width }
    }

    /// Build a grid from text cells; handy for tests and CSV input.
    #[must_use]
    pub fn from_text_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        Self::from_rows(
            rows.into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|cell| CellValue::from_text(cell.as_ref()))
                        .collect()
                })
                .collect(),
        )
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    #[must_use]
    pub fn row(&self, row: usize) -> &[CellValue] {
        self.rows.get(row).map_or(&[], Vec::as_slice)
    }
}

/// Read the first sheet (or the named sheet) of a spreadsheet file.
///
/// # Errors
///
/// Returns [`ParseError`] if the file cannot be opened or decoded, the
/// extension is not a supported spreadsheet type, or the named sheet does
/// not exist.
pub fn read_grid(path: &Path, sheet: Option<&str>) -> Result<Grid, ParseError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("csv" | "txt") => read_csv(path),
        Some("xlsx" | "xlsm" | "xls" | "xlsb" | "ods") => read_workbook(path, sheet),
        _ => Err(ParseError::UnsupportedFormat {
            path: path.display().to_string(),
        }),
    }
}

fn read_csv(path: &Path) -> Result<Grid, ParseError> {
    let csv_err = |source| ParseError::Csv {
        path: path.display().to_string(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        rows.push(record.iter().map(CellValue::from_text).collect());
    }

    Ok(Grid::from_rows(rows))
}

fn read_workbook(path: &Path, sheet: Option<&str>) -> Result<Grid, ParseError> {
    let display = path.display().to_string();

    let mut workbook = open_workbook_auto(path).map_err(|source| ParseError::Workbook {
        path: display.clone(),
        source,
    })?;

    let sheet_names = workbook.sheet_names();
    let sheet_name = match sheet {
        Some(wanted) => sheet_names
            .iter()
            .find(|name| name.as_str() == wanted)
            .cloned()
            .ok_or_else(|| ParseError::SheetNotFound {
                path: display.clone(),
                sheet: wanted.to_string(),
            })?,
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| ParseError::EmptyWorkbook {
                path: display.clone(),
            })?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|source| ParseError::Workbook {
            path: display,
            source,
        })?;

    let rows = range
        .rows()
        .map(|row| row.iter().map(CellValue::from).collect())
        .collect();

    Ok(Grid::from_rows(rows))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn from_text_trims_and_blanks() {
        assert_eq!(CellValue::from_text("  Net Sales "), CellValue::Text("Net Sales".into()));
        assert_eq!(CellValue::from_text("   "), CellValue::Empty);
    }

    #[test]
    fn out_of_range_reads_are_empty() {
        let grid = Grid::from_text_rows([vec!["a", "b"], vec!["c"]]);
        assert_eq!(grid.width(), 2);
        assert_eq!(grid.height(), 2);
        assert!(grid.get(1, 1).is_blank());
        assert!(grid.get(10, 0).is_blank());
        assert!(grid.row(10).is_empty());
    }

    #[test]
    fn number_label_has_no_trailing_zero() {
        assert_eq!(CellValue::Number(301_290.0).to_label(), "301290");
        assert_eq!(CellValue::Number(12.5).to_label(), "12.5");
    }

    #[test]
    fn calamine_cells_convert() {
        assert_eq!(CellValue::from(&Data::Int(7)), CellValue::Number(7.0));
        assert_eq!(CellValue::from(&Data::Empty), CellValue::Empty);
        assert_eq!(
            CellValue::from(&Data::DateTimeIso("2025-11-01T00:00:00".into())),
            CellValue::Date(NaiveDate::from_ymd_opt(2025, 11, 1).unwrap())
        );
        assert_eq!(
            CellValue::from(&Data::String(" Cash ".into())),
            CellValue::Text("Cash".into())
        );
    }

    #[test]
    fn read_csv_file() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, ",2025-11-01,2025-11-01").unwrap();
        writeln!(file, ",301290 - 2820 Paxton St,343939 - 807 E Main St").unwrap();
        writeln!(file, "Cash Due,\"$1,025.02\",").unwrap();

        let grid = read_grid(file.path(), None).unwrap();
        assert_eq!(grid.height(), 3);
        assert_eq!(grid.get(2, 0), &CellValue::Text("Cash Due".into()));
        assert_eq!(grid.get(2, 1), &CellValue::Text("$1,025.02".into()));
        assert!(grid.get(2, 2).is_blank());
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = read_grid(Path::new("report.pdf"), None).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFormat { .. }));
    }

    #[test]
    fn missing_csv_is_a_read_error() {
        let err = read_grid(Path::new("/nonexistent/report.csv"), None).unwrap_err();
        assert!(matches!(err, ParseError::Csv { .. }));
    }
}
