//! Record normalization: fold a triple stream into keyed records.
//!
//! Every triple either updates exactly one in-progress record, found by its
//! natural key in a `BTreeMap`, or is dropped and counted. Normalization
//! never fails; drops surface through [`NormalizedBatch::dropped`] and the
//! unresolved label and location sets.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use salesdb_core::{
    DaypartField, DaypartRecord, DropCounts, DropReason, LaborRecord, MappingTables, NaturalKey,
    SalesField, SalesSummaryRecord, StoreId, TenderAggregation, TenderTypeRecord,
};

use crate::grid::CellValue;
use crate::layout::{MetricTarget, Triple};
use crate::value::{parse_amount, parse_count, parse_duration_secs, Numeric};

/// Amounts that round to zero cents are zero.
fn is_zero_amount(amount: f64) -> bool {
    amount.abs() < 0.005
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions {
    pub tender_aggregation: TenderAggregation,
}

/// Output of one normalization pass, one collection per table, each sorted
/// by natural key.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub sales: Vec<SalesSummaryRecord>,
    pub tenders: Vec<TenderTypeRecord>,
    pub labor: Vec<LaborRecord>,
    pub dayparts: Vec<DaypartRecord>,
    pub triples_seen: u64,
    pub dropped: DropCounts,
    pub unresolved_labels: BTreeSet<String>,
    pub unresolved_locations: BTreeSet<String>,
}

impl NormalizedBatch {
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.sales.len() + self.tenders.len() + self.labor.len() + self.dayparts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }
}

#[derive(Default)]
struct Accumulator {
    sales: BTreeMap<NaturalKey, SalesSummaryRecord>,
    tenders: BTreeMap<NaturalKey, TenderTypeRecord>,
    labor: BTreeMap<NaturalKey, LaborRecord>,
    dayparts: BTreeMap<NaturalKey, DaypartRecord>,
    batch: NormalizedBatch,
}

/// Fold `triples` into records.
pub fn normalize<'g, I>(
    triples: I,
    tables: &MappingTables,
    opts: &NormalizeOptions,
) -> NormalizedBatch
where
    I: IntoIterator<Item = Triple<'g>>,
{
    let mut acc = Accumulator::default();

    for triple in triples {
        acc.batch.triples_seen += 1;

        if triple.metric.target == MetricTarget::Unresolved {
            acc.count_drop(DropReason::UnresolvedMetric);
            acc.batch.unresolved_labels.insert(triple.metric.label.clone());
            continue;
        }

        let Some(store_id) = triple.context.store_id.clone() else {
            acc.count_drop(DropReason::UnresolvedStore);
            if !triple.context.location.is_empty() {
                acc.batch
                    .unresolved_locations
                    .insert(triple.context.location.clone());
            }
            continue;
        };

        let date = triple.context.date;
        match &triple.metric.target {
            MetricTarget::SalesSummary(field) => {
                acc.apply_sales(store_id, date, *field, triple.value);
            }
            MetricTarget::TenderType => {
                let tender = tables.canonical_tender(&triple.metric.label).to_string();
                acc.apply_tender(store_id, date, tender, triple.value, opts.tender_aggregation);
            }
            MetricTarget::Labor { position, field } => {
                let Some(amount) = acc.amount_or_drop(triple.value) else {
                    continue;
                };
                let key = NaturalKey::new(store_id.clone(), date, Some(position.clone()));
                let record = acc
                    .labor
                    .entry(key)
                    .or_insert_with(|| LaborRecord::new(store_id, date, position.clone()));
                *record.field_mut(*field) = amount;
            }
            MetricTarget::Daypart { daypart, field } => {
                acc.apply_daypart(store_id, date, daypart, *field, triple.value);
            }
            MetricTarget::Unresolved => {}
        }
    }

    acc.finish()
}

impl Accumulator {
    fn count_drop(&mut self, reason: DropReason) {
        self.batch.dropped.record(reason);
    }

    fn amount_or_drop(&mut self, value: &CellValue) -> Option<f64> {
        let amount = parse_amount(value);
        if amount.is_none() {
            self.count_drop(DropReason::UnparseableValue);
        }
        amount
    }

    fn apply_sales(
        &mut self,
        store_id: StoreId,
        date: NaiveDate,
        field: SalesField,
        value: &CellValue,
    ) {
        let key = NaturalKey::new(store_id.clone(), date, None);
        if field.is_count() {
            let Some(count) = parse_count(value) else {
                self.count_drop(DropReason::UnparseableValue);
                return;
            };
            let record = self
                .sales
                .entry(key)
                .or_insert_with(|| SalesSummaryRecord::new(store_id, date));
            if let Some(slot) = record.count_mut(field) {
                *slot = count;
            }
        } else {
            let Some(amount) = self.amount_or_drop(value) else {
                return;
            };
            let record = self
                .sales
                .entry(key)
                .or_insert_with(|| SalesSummaryRecord::new(store_id, date));
            if let Some(slot) = record.amount_mut(field) {
                *slot = amount;
            }
        }
    }

    fn apply_tender(
        &mut self,
        store_id: StoreId,
        date: NaiveDate,
        tender_type: String,
        value: &CellValue,
        aggregation: TenderAggregation,
    ) {
        let Some(amount) = self.amount_or_drop(value) else {
            return;
        };
        if is_zero_amount(amount) {
            self.count_drop(DropReason::ZeroAmount);
            return;
        }

        let key = NaturalKey::new(store_id.clone(), date, Some(tender_type.clone()));
        match self.tenders.get_mut(&key) {
            Some(existing) => match aggregation {
                TenderAggregation::Overwrite => existing.detail_amount = amount,
                TenderAggregation::Sum => existing.detail_amount += amount,
            },
            None => {
                self.tenders.insert(
                    key,
                    TenderTypeRecord {
                        store_id,
                        date,
                        tender_type,
                        detail_amount: amount,
                    },
                );
            }
        }
    }

    fn apply_daypart(
        &mut self,
        store_id: StoreId,
        date: NaiveDate,
        daypart: &str,
        field: DaypartField,
        value: &CellValue,
    ) {
        let key = NaturalKey::new(store_id.clone(), date, Some(daypart.to_string()));

        if field.is_timing() {
            let seconds = match parse_duration_secs(value) {
                Numeric::Value(v) if v > 0.0 => Some(v),
                Numeric::Value(_) | Numeric::Blank => None,
                Numeric::Invalid => {
                    self.count_drop(DropReason::UnparseableValue);
                    return;
                }
            };
            let record = self
                .dayparts
                .entry(key)
                .or_insert_with(|| DaypartRecord::new(store_id, date, daypart.to_string()));
            if let Some(slot) = record.timing_mut(field) {
                *slot = seconds;
            }
        } else {
            let Some(cars) = parse_count(value) else {
                self.count_drop(DropReason::UnparseableValue);
                return;
            };
            let record = self
                .dayparts
                .entry(key)
                .or_insert_with(|| DaypartRecord::new(store_id, date, daypart.to_string()));
            record.total_cars = cars;
        }
    }

    fn finish(mut self) -> NormalizedBatch {
        // Summed tenders can cancel out.
        let before = self.tenders.len();
        self.tenders
            .retain(|_, record| !is_zero_amount(record.detail_amount));
        for _ in self.tenders.len()..before {
            self.count_drop(DropReason::ZeroAmount);
        }

        let mut batch = self.batch;
        batch.sales = self.sales.into_values().collect();
        batch.tenders = self.tenders.into_values().collect();
        batch.labor = self.labor.into_values().collect();
        batch.dayparts = self.dayparts.into_values().collect();
        batch
    }
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
