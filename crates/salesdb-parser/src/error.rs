use thiserror::Error;

/// Failures that make a whole input file unusable.
///
/// Row- and cell-level problems (unknown labels, unresolved stores, bad
/// values) are not errors; the normalizer counts them instead.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read CSV {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("failed to read workbook {path}: {source}")]
    Workbook {
        path: String,
        #[source]
        source: calamine::Error,
    },

    #[error("workbook {path} has no sheet named \"{sheet}\"")]
    SheetNotFound { path: String, sheet: String },

    #[error("workbook {path} has no sheets")]
    EmptyWorkbook { path: String },

    #[error("unsupported file type: {path}")]
    UnsupportedFormat { path: String },

    #[error("header row not found: {reason}")]
    HeaderNotFound { reason: String },

    #[error("column {column} has an unparseable date header \"{value}\"")]
    InvalidHeaderDate { column: usize, value: String },

    #[error("no report date in the sheet and none was supplied")]
    MissingReportDate,
}
