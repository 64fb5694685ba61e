pub mod error;
pub mod grid;
pub mod layout;
pub mod normalize;
pub mod value;

use std::path::Path;

use salesdb_core::MappingTables;

pub use error::ParseError;
pub use grid::{read_grid, CellValue, Grid};
pub use layout::{
    parse_grid, ColumnContext, Layout, MetricRow, MetricTarget, ParseOptions, Triple, Triples,
};
pub use normalize::{normalize, NormalizeOptions, NormalizedBatch};

/// A file run through the layout parser and normalizer.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub layout: Layout,
    pub batch: NormalizedBatch,
}

/// Read, parse, and normalize one spreadsheet file.
///
/// # Errors
///
/// Returns [`ParseError`] when the file cannot be read or its header cannot
/// be resolved. Unresolved rows, stores, and values are counted in the
/// returned batch instead.
pub fn parse_file(
    path: &Path,
    sheet: Option<&str>,
    tables: &MappingTables,
    parse_opts: &ParseOptions,
    normalize_opts: &NormalizeOptions,
) -> Result<ParsedFile, ParseError> {
    let grid = read_grid(path, sheet)?;
    let triples = parse_grid(&grid, tables, parse_opts)?;
    let layout = triples.layout();
    let batch = normalize(triples, tables, normalize_opts);

    tracing::debug!(
        path = %path.display(),
        %layout,
        triples = batch.triples_seen,
        records = batch.record_count(),
        dropped = batch.dropped.total(),
        "file parsed"
    );

    Ok(ParsedFile { layout, batch })
}
