//! Normalized record types produced by the normalizer and persisted by the
//! upsert coordinator.
//!
//! Each record type is identified by a natural key (`store + date`, plus a
//! sub-key for tender, labor, and daypart rows). Uniqueness of that key is a
//! persistence-time guarantee; in memory the normalizer keeps exactly one
//! in-progress record per key.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Short, stable store code, e.g. a profit-center number like `"357993"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(pub String);

impl StoreId {
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StoreId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The persisted report tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportTable {
    SalesSummary,
    TenderType,
    Labor,
    Daypart,
}

impl ReportTable {
    pub const ALL: [ReportTable; 4] = [
        ReportTable::SalesSummary,
        ReportTable::TenderType,
        ReportTable::Labor,
        ReportTable::Daypart,
    ];

    /// Postgres table name.
    #[must_use]
    pub fn table_name(self) -> &'static str {
        match self {
            ReportTable::SalesSummary => "sales_summary",
            ReportTable::TenderType => "tender_type",
            ReportTable::Labor => "labor",
            ReportTable::Daypart => "daypart_service",
        }
    }

    /// Third natural-key column, if the table has one.
    #[must_use]
    pub fn sub_key_column(self) -> Option<&'static str> {
        match self {
            ReportTable::SalesSummary => None,
            ReportTable::TenderType => Some("tender_type"),
            ReportTable::Labor => Some("labor_position"),
            ReportTable::Daypart => Some("daypart"),
        }
    }
}

impl std::fmt::Display for ReportTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportTable::SalesSummary => write!(f, "sales-summary"),
            ReportTable::TenderType => write!(f, "tender-type"),
            ReportTable::Labor => write!(f, "labor"),
            ReportTable::Daypart => write!(f, "daypart"),
        }
    }
}

impl std::str::FromStr for ReportTable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sales-summary" | "sales_summary" => Ok(ReportTable::SalesSummary),
            "tender-type" | "tender_type" => Ok(ReportTable::TenderType),
            "labor" => Ok(ReportTable::Labor),
            "daypart" | "daypart_service" => Ok(ReportTable::Daypart),
            other => Err(format!(
                "unknown table '{other}'; expected sales-summary, tender-type, labor, or daypart"
            )),
        }
    }
}

/// Business identity of a persisted row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    pub store_id: StoreId,
    pub date: NaiveDate,
    pub sub_key: Option<String>,
}

impl NaturalKey {
    #[must_use]
    pub fn new(store_id: StoreId, date: NaiveDate, sub_key: Option<String>) -> Self {
        Self {
            store_id,
            date,
            sub_key,
        }
    }
}

impl std::fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.sub_key {
            Some(sub) => write!(f, "{}/{}/{}", self.store_id, self.date, sub),
            None => write!(f, "{}/{}", self.store_id, self.date),
        }
    }
}

// ---------------------------------------------------------------------------
// Canonical fields
// ---------------------------------------------------------------------------

/// Columns of the `sales_summary` table that metric rows can populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesField {
    GrossSales,
    NetSales,
    DdAdjustedNoMarkup,
    PaSalesTax,
    DdDiscount,
    GuestCount,
    AvgCheck,
    GiftCardSales,
    VoidAmount,
    Refund,
    VoidQty,
    CashIn,
    PaidIn,
    PaidOut,
}

impl SalesField {
    /// `true` for integer count columns; everything else is a currency amount.
    #[must_use]
    pub fn is_count(self) -> bool {
        matches!(self, SalesField::GuestCount | SalesField::VoidQty)
    }

    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            SalesField::GrossSales => "gross_sales",
            SalesField::NetSales => "net_sales",
            SalesField::DdAdjustedNoMarkup => "dd_adjusted_no_markup",
            SalesField::PaSalesTax => "pa_sales_tax",
            SalesField::DdDiscount => "dd_discount",
            SalesField::GuestCount => "guest_count",
            SalesField::AvgCheck => "avg_check",
            SalesField::GiftCardSales => "gift_card_sales",
            SalesField::VoidAmount => "void_amount",
            SalesField::Refund => "refund",
            SalesField::VoidQty => "void_qty",
            SalesField::CashIn => "cash_in",
            SalesField::PaidIn => "paid_in",
            SalesField::PaidOut => "paid_out",
        }
    }
}

/// Columns of the `labor` table, selected by the metric label suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaborField {
    RegHours,
    OtHours,
    TotalHours,
    RegPay,
    OtPay,
    TotalPay,
    PercentLabor,
}

impl LaborField {
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            LaborField::RegHours => "reg_hours",
            LaborField::OtHours => "ot_hours",
            LaborField::TotalHours => "total_hours",
            LaborField::RegPay => "reg_pay",
            LaborField::OtPay => "ot_pay",
            LaborField::TotalPay => "total_pay",
            LaborField::PercentLabor => "percent_labor",
        }
    }
}

/// Columns of the `daypart_service` table (drive-through timing sheets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaypartField {
    TotalCars,
    AvgMenuTime,
    AvgGreetTime,
    AvgServiceTime,
    AvgLaneQueueTime,
    AvgLaneTotalTime,
}

impl DaypartField {
    /// Timing columns store `None` when the sheet has no positive value.
    #[must_use]
    pub fn is_timing(self) -> bool {
        !matches!(self, DaypartField::TotalCars)
    }

    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            DaypartField::TotalCars => "total_cars",
            DaypartField::AvgMenuTime => "avg_menu_time",
            DaypartField::AvgGreetTime => "avg_greet_time",
            DaypartField::AvgServiceTime => "avg_service_time",
            DaypartField::AvgLaneQueueTime => "avg_lane_queue_time",
            DaypartField::AvgLaneTotalTime => "avg_lane_total_time",
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One row per `(store, date)`.
///
/// Amounts are `f64` at parse time; the DB layer casts them to
/// `NUMERIC(12,2)` on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesSummaryRecord {
    pub store_id: StoreId,
    pub date: NaiveDate,
    pub gross_sales: f64,
    pub net_sales: f64,
    pub dd_adjusted_no_markup: f64,
    pub pa_sales_tax: f64,
    pub dd_discount: f64,
    pub guest_count: i32,
    pub avg_check: f64,
    pub gift_card_sales: f64,
    pub void_amount: f64,
    pub refund: f64,
    pub void_qty: i32,
    pub cash_in: f64,
    pub paid_in: f64,
    pub paid_out: f64,
}

impl SalesSummaryRecord {
    /// A record with every field zeroed, ready to accumulate metric rows.
    #[must_use]
    pub fn new(store_id: StoreId, date: NaiveDate) -> Self {
        Self {
            store_id,
            date,
            gross_sales: 0.0,
            net_sales: 0.0,
            dd_adjusted_no_markup: 0.0,
            pa_sales_tax: 0.0,
            dd_discount: 0.0,
            guest_count: 0,
            avg_check: 0.0,
            gift_card_sales: 0.0,
            void_amount: 0.0,
            refund: 0.0,
            void_qty: 0,
            cash_in: 0.0,
            paid_in: 0.0,
            paid_out: 0.0,
        }
    }

    #[must_use]
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(self.store_id.clone(), self.date, None)
    }

    /// Mutable access to a currency field; `None` for count fields.
    pub fn amount_mut(&mut self, field: SalesField) -> Option<&mut f64> {
        match field {
            SalesField::GrossSales => Some(&mut self.gross_sales),
            SalesField::NetSales => Some(&mut self.net_sales),
            SalesField::DdAdjustedNoMarkup => Some(&mut self.dd_adjusted_no_markup),
            SalesField::PaSalesTax => Some(&mut self.pa_sales_tax),
            SalesField::DdDiscount => Some(&mut self.dd_discount),
            SalesField::AvgCheck => Some(&mut self.avg_check),
            SalesField::GiftCardSales => Some(&mut self.gift_card_sales),
            SalesField::VoidAmount => Some(&mut self.void_amount),
            SalesField::Refund => Some(&mut self.refund),
            SalesField::CashIn => Some(&mut self.cash_in),
            SalesField::PaidIn => Some(&mut self.paid_in),
            SalesField::PaidOut => Some(&mut self.paid_out),
            SalesField::GuestCount | SalesField::VoidQty => None,
        }
    }

    /// Mutable access to a count field; `None` for currency fields.
    pub fn count_mut(&mut self, field: SalesField) -> Option<&mut i32> {
        match field {
            SalesField::GuestCount => Some(&mut self.guest_count),
            SalesField::VoidQty => Some(&mut self.void_qty),
            _ => None,
        }
    }
}

/// One row per `(store, date, tender_type)`. Never persisted with a zero amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenderTypeRecord {
    pub store_id: StoreId,
    pub date: NaiveDate,
    /// Canonical tender name after alias mapping, e.g. `"Visa"`.
    pub tender_type: String,
    pub detail_amount: f64,
}

impl TenderTypeRecord {
    #[must_use]
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(
            self.store_id.clone(),
            self.date,
            Some(self.tender_type.clone()),
        )
    }
}

/// One row per `(store, date, labor_position)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaborRecord {
    pub store_id: StoreId,
    pub date: NaiveDate,
    pub labor_position: String,
    pub reg_hours: f64,
    pub ot_hours: f64,
    pub total_hours: f64,
    pub reg_pay: f64,
    pub ot_pay: f64,
    pub total_pay: f64,
    pub percent_labor: f64,
}

impl LaborRecord {
    #[must_use]
    pub fn new(store_id: StoreId, date: NaiveDate, labor_position: String) -> Self {
        Self {
            store_id,
            date,
            labor_position,
            reg_hours: 0.0,
            ot_hours: 0.0,
            total_hours: 0.0,
            reg_pay: 0.0,
            ot_pay: 0.0,
            total_pay: 0.0,
            percent_labor: 0.0,
        }
    }

    #[must_use]
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(
            self.store_id.clone(),
            self.date,
            Some(self.labor_position.clone()),
        )
    }

    pub fn field_mut(&mut self, field: LaborField) -> &mut f64 {
        match field {
            LaborField::RegHours => &mut self.reg_hours,
            LaborField::OtHours => &mut self.ot_hours,
            LaborField::TotalHours => &mut self.total_hours,
            LaborField::RegPay => &mut self.reg_pay,
            LaborField::OtPay => &mut self.ot_pay,
            LaborField::TotalPay => &mut self.total_pay,
            LaborField::PercentLabor => &mut self.percent_labor,
        }
    }
}

/// One row per `(store, date, daypart)` from a drive-through timing sheet.
///
/// Timing fields are seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaypartRecord {
    pub store_id: StoreId,
    pub date: NaiveDate,
    pub daypart: String,
    pub total_cars: i32,
    pub avg_menu_time: Option<f64>,
    pub avg_greet_time: Option<f64>,
    pub avg_service_time: Option<f64>,
    pub avg_lane_queue_time: Option<f64>,
    pub avg_lane_total_time: Option<f64>,
}

impl DaypartRecord {
    #[must_use]
    pub fn new(store_id: StoreId, date: NaiveDate, daypart: String) -> Self {
        Self {
            store_id,
            date,
            daypart,
            total_cars: 0,
            avg_menu_time: None,
            avg_greet_time: None,
            avg_service_time: None,
            avg_lane_queue_time: None,
            avg_lane_total_time: None,
        }
    }

    #[must_use]
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(self.store_id.clone(), self.date, Some(self.daypart.clone()))
    }

    /// Mutable access to a timing field; `None` for `total_cars`.
    pub fn timing_mut(&mut self, field: DaypartField) -> Option<&mut Option<f64>> {
        match field {
            DaypartField::TotalCars => None,
            DaypartField::AvgMenuTime => Some(&mut self.avg_menu_time),
            DaypartField::AvgGreetTime => Some(&mut self.avg_greet_time),
            DaypartField::AvgServiceTime => Some(&mut self.avg_service_time),
            DaypartField::AvgLaneQueueTime => Some(&mut self.avg_lane_queue_time),
            DaypartField::AvgLaneTotalTime => Some(&mut self.avg_lane_total_time),
        }
    }
}
