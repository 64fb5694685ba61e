use std::sync::Arc;

use chrono::NaiveDate;
use salesdb_core::{DaypartField, LaborField, MappingTables, ReportTable, SalesField, StoreId};

use crate::grid::CellValue;

/// Where a value came from: the date and store shared by a data column
/// (transposed layout) or a data row (sentinel layout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnContext {
    pub date: NaiveDate,
    /// `None` when the location string matched no known store.
    pub store_id: Option<StoreId>,
    /// Raw location text as it appeared in the sheet.
    pub location: String,
}

/// What a row label (or sentinel column header) feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricTarget {
    SalesSummary(SalesField),
    /// Raw tender label; canonicalized by the normalizer.
    TenderType,
    Labor {
        position: String,
        field: LaborField,
    },
    Daypart {
        daypart: String,
        field: DaypartField,
    },
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricRow {
    pub label: String,
    pub target: MetricTarget,
}

impl MetricRow {
    /// Classify a row label against the mapping tables.
    ///
    /// Precedence: sales summary label, tender label, labor suffix.
    #[must_use]
    pub fn classify(label: &str, tables: &MappingTables) -> Self {
        let target = if let Some(field) = tables.sales_field(label) {
            MetricTarget::SalesSummary(field)
        } else if tables.is_tender_label(label) {
            MetricTarget::TenderType
        } else if let Some((position, field)) = tables.labor_split(label) {
            MetricTarget::Labor { position, field }
        } else {
            MetricTarget::Unresolved
        };

        Self {
            label: label.to_string(),
            target,
        }
    }

    /// `None` for unresolved rows.
    #[must_use]
    pub fn target_table(&self) -> Option<ReportTable> {
        match self.target {
            MetricTarget::SalesSummary(_) => Some(ReportTable::SalesSummary),
            MetricTarget::TenderType => Some(ReportTable::TenderType),
            MetricTarget::Labor { .. } => Some(ReportTable::Labor),
            MetricTarget::Daypart { .. } => Some(ReportTable::Daypart),
            MetricTarget::Unresolved => None,
        }
    }

    /// Column the value lands in; `detail_amount` for tenders.
    #[must_use]
    pub fn canonical_field(&self) -> Option<&'static str> {
        match &self.target {
            MetricTarget::SalesSummary(field) => Some(field.column()),
            MetricTarget::TenderType => Some("detail_amount"),
            MetricTarget::Labor { field, .. } => Some(field.column()),
            MetricTarget::Daypart { field, .. } => Some(field.column()),
            MetricTarget::Unresolved => None,
        }
    }
}

/// One `(context, metric, value)` cell emitted by a layout parser.
#[derive(Debug, Clone)]
pub struct Triple<'g> {
    pub row: usize,
    pub col: usize,
    pub context: Arc<ColumnContext>,
    pub metric: Arc<MetricRow>,
    pub value: &'g CellValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> MappingTables {
        MappingTables::from_yaml_str(
            r#"
sales_summary_labels:
  "Net Sales": net_sales
tender_labels: ["Cash"]
labor_suffixes:
  - suffix: "Total Hours"
    field: total_hours
"#,
        )
        .unwrap()
    }

    #[test]
    fn classify_precedence() {
        let t = tables();
        assert_eq!(
            MetricRow::classify("Net Sales", &t).target,
            MetricTarget::SalesSummary(SalesField::NetSales)
        );
        assert_eq!(MetricRow::classify("Cash", &t).target, MetricTarget::TenderType);
        assert_eq!(
            MetricRow::classify("Crew Total Hours", &t).target,
            MetricTarget::Labor {
                position: "Crew".into(),
                field: LaborField::TotalHours
            }
        );
        assert_eq!(
            MetricRow::classify("Mobile Order Fees", &t).target,
            MetricTarget::Unresolved
        );
    }

    #[test]
    fn target_table_and_field() {
        let t = tables();
        let row = MetricRow::classify("Crew Total Hours", &t);
        assert_eq!(row.target_table(), Some(ReportTable::Labor));
        assert_eq!(row.canonical_field(), Some("total_hours"));
        let cash = MetricRow::classify("Cash", &t);
        assert_eq!(cash.canonical_field(), Some("detail_amount"));
        assert!(MetricRow::classify("??", &t).target_table().is_none());
    }
}
