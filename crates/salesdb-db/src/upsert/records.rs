//! Per-table bulk insert statements.
//!
//! Every table is written with a single `INSERT … SELECT * FROM UNNEST(…)`
//! per batch. Columns are collected into parallel `Vec`s and bound as
//! Postgres arrays; `float8` amounts are cast to the `NUMERIC` columns by the
//! insert itself. `ON CONFLICT … DO NOTHING RETURNING` reports which natural
//! keys were actually inserted.

use salesdb_core::{
    DaypartRecord, LaborRecord, NaturalKey, ReportTable, SalesSummaryRecord, TenderTypeRecord,
};
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::Postgres;

use super::types::KeyRow;

pub type KeyQuery<'q> = QueryAs<'q, Postgres, KeyRow, PgArguments>;

/// A normalized record that can be bulk-inserted into its report table.
pub trait ReportRecord: Send + Sync + Sized {
    const TABLE: ReportTable;

    /// Insert statement whose `RETURNING` clause yields `store_id`,
    /// `business_date`, and `sub_key`.
    const INSERT_SQL: &'static str;

    fn key(&self) -> NaturalKey;

    /// Bind one array per column, in `INSERT_SQL` parameter order.
    fn bind_columns<'q>(query: KeyQuery<'q>, rows: &[Self]) -> KeyQuery<'q>;
}

impl ReportRecord for SalesSummaryRecord {
    const TABLE: ReportTable = ReportTable::SalesSummary;

    const INSERT_SQL: &'static str = "INSERT INTO sales_summary \
             (store_id, business_date, gross_sales, net_sales, dd_adjusted_no_markup, \
              pa_sales_tax, dd_discount, guest_count, avg_check, gift_card_sales, \
              void_amount, refund, void_qty, cash_in, paid_in, paid_out) \
         SELECT * FROM UNNEST(\
              $1::text[], $2::date[], $3::float8[], $4::float8[], $5::float8[], \
              $6::float8[], $7::float8[], $8::int4[], $9::float8[], $10::float8[], \
              $11::float8[], $12::float8[], $13::int4[], $14::float8[], $15::float8[], \
              $16::float8[]) \
         ON CONFLICT (store_id, business_date) DO NOTHING \
         RETURNING store_id, business_date, NULL::text AS sub_key";

    fn key(&self) -> NaturalKey {
        self.natural_key()
    }

    fn bind_columns<'q>(query: KeyQuery<'q>, rows: &[Self]) -> KeyQuery<'q> {
        let mut store_ids: Vec<String> = Vec::with_capacity(rows.len());
        let mut dates = Vec::with_capacity(rows.len());
        let mut gross_sales = Vec::with_capacity(rows.len());
        let mut net_sales = Vec::with_capacity(rows.len());
        let mut dd_adjusted = Vec::with_capacity(rows.len());
        let mut sales_tax = Vec::with_capacity(rows.len());
        let mut dd_discount = Vec::with_capacity(rows.len());
        let mut guest_count = Vec::with_capacity(rows.len());
        let mut avg_check = Vec::with_capacity(rows.len());
        let mut gift_card_sales = Vec::with_capacity(rows.len());
        let mut void_amount = Vec::with_capacity(rows.len());
        let mut refund = Vec::with_capacity(rows.len());
        let mut void_qty = Vec::with_capacity(rows.len());
        let mut cash_in = Vec::with_capacity(rows.len());
        let mut paid_in = Vec::with_capacity(rows.len());
        let mut paid_out = Vec::with_capacity(rows.len());

        for r in rows {
            store_ids.push(r.store_id.as_str().to_string());
            dates.push(r.date);
            gross_sales.push(r.gross_sales);
            net_sales.push(r.net_sales);
            dd_adjusted.push(r.dd_adjusted_no_markup);
            sales_tax.push(r.pa_sales_tax);
            dd_discount.push(r.dd_discount);
            guest_count.push(r.guest_count);
            avg_check.push(r.avg_check);
            gift_card_sales.push(r.gift_card_sales);
            void_amount.push(r.void_amount);
            refund.push(r.refund);
            void_qty.push(r.void_qty);
            cash_in.push(r.cash_in);
            paid_in.push(r.paid_in);
            paid_out.push(r.paid_out);
        }

        query
            .bind(store_ids)
            .bind(dates)
            .bind(gross_sales)
            .bind(net_sales)
            .bind(dd_adjusted)
            .bind(sales_tax)
            .bind(dd_discount)
            .bind(guest_count)
            .bind(avg_check)
            .bind(gift_card_sales)
            .bind(void_amount)
            .bind(refund)
            .bind(void_qty)
            .bind(cash_in)
            .bind(paid_in)
            .bind(paid_out)
    }
}

impl ReportRecord for TenderTypeRecord {
    const TABLE: ReportTable = ReportTable::TenderType;

    const INSERT_SQL: &'static str = "INSERT INTO tender_type \
             (store_id, business_date, tender_type, detail_amount) \
         SELECT * FROM UNNEST($1::text[], $2::date[], $3::text[], $4::float8[]) \
         ON CONFLICT (store_id, business_date, tender_type) DO NOTHING \
         RETURNING store_id, business_date, tender_type AS sub_key";

    fn key(&self) -> NaturalKey {
        self.natural_key()
    }

    fn bind_columns<'q>(query: KeyQuery<'q>, rows: &[Self]) -> KeyQuery<'q> {
        let store_ids: Vec<String> = rows.iter().map(|r| r.store_id.as_str().to_string()).collect();
        let dates: Vec<_> = rows.iter().map(|r| r.date).collect();
        let tender_types: Vec<String> = rows.iter().map(|r| r.tender_type.clone()).collect();
        let amounts: Vec<f64> = rows.iter().map(|r| r.detail_amount).collect();

        query
            .bind(store_ids)
            .bind(dates)
            .bind(tender_types)
            .bind(amounts)
    }
}

impl ReportRecord for LaborRecord {
    const TABLE: ReportTable = ReportTable::Labor;

    const INSERT_SQL: &'static str = "INSERT INTO labor \
             (store_id, business_date, labor_position, reg_hours, ot_hours, total_hours, \
              reg_pay, ot_pay, total_pay, percent_labor) \
         SELECT * FROM UNNEST(\
              $1::text[], $2::date[], $3::text[], $4::float8[], $5::float8[], $6::float8[], \
              $7::float8[], $8::float8[], $9::float8[], $10::float8[]) \
         ON CONFLICT (store_id, business_date, labor_position) DO NOTHING \
         RETURNING store_id, business_date, labor_position AS sub_key";

    fn key(&self) -> NaturalKey {
        self.natural_key()
    }

    fn bind_columns<'q>(query: KeyQuery<'q>, rows: &[Self]) -> KeyQuery<'q> {
        let mut store_ids: Vec<String> = Vec::with_capacity(rows.len());
        let mut dates = Vec::with_capacity(rows.len());
        let mut positions: Vec<String> = Vec::with_capacity(rows.len());
        let mut reg_hours = Vec::with_capacity(rows.len());
        let mut ot_hours = Vec::with_capacity(rows.len());
        let mut total_hours = Vec::with_capacity(rows.len());
        let mut reg_pay = Vec::with_capacity(rows.len());
        let mut ot_pay = Vec::with_capacity(rows.len());
        let mut total_pay = Vec::with_capacity(rows.len());
        let mut percent_labor = Vec::with_capacity(rows.len());

        for r in rows {
            store_ids.push(r.store_id.as_str().to_string());
            dates.push(r.date);
            positions.push(r.labor_position.clone());
            reg_hours.push(r.reg_hours);
            ot_hours.push(r.ot_hours);
            total_hours.push(r.total_hours);
            reg_pay.push(r.reg_pay);
            ot_pay.push(r.ot_pay);
            total_pay.push(r.total_pay);
            percent_labor.push(r.percent_labor);
        }

        query
            .bind(store_ids)
            .bind(dates)
            .bind(positions)
            .bind(reg_hours)
            .bind(ot_hours)
            .bind(total_hours)
            .bind(reg_pay)
            .bind(ot_pay)
            .bind(total_pay)
            .bind(percent_labor)
    }
}

impl ReportRecord for DaypartRecord {
    const TABLE: ReportTable = ReportTable::Daypart;

    const INSERT_SQL: &'static str = "INSERT INTO daypart_service \
             (store_id, business_date, daypart, total_cars, avg_menu_time, avg_greet_time, \
              avg_service_time, avg_lane_queue_time, avg_lane_total_time) \
         SELECT * FROM UNNEST(\
              $1::text[], $2::date[], $3::text[], $4::int4[], $5::float8[], $6::float8[], \
              $7::float8[], $8::float8[], $9::float8[]) \
         ON CONFLICT (store_id, business_date, daypart) DO NOTHING \
         RETURNING store_id, business_date, daypart AS sub_key";

    fn key(&self) -> NaturalKey {
        self.natural_key()
    }

    fn bind_columns<'q>(query: KeyQuery<'q>, rows: &[Self]) -> KeyQuery<'q> {
        let mut store_ids: Vec<String> = Vec::with_capacity(rows.len());
        let mut dates = Vec::with_capacity(rows.len());
        let mut dayparts: Vec<String> = Vec::with_capacity(rows.len());
        let mut total_cars = Vec::with_capacity(rows.len());
        let mut menu: Vec<Option<f64>> = Vec::with_capacity(rows.len());
        let mut greet: Vec<Option<f64>> = Vec::with_capacity(rows.len());
        let mut service: Vec<Option<f64>> = Vec::with_capacity(rows.len());
        let mut lane_queue: Vec<Option<f64>> = Vec::with_capacity(rows.len());
        let mut lane_total: Vec<Option<f64>> = Vec::with_capacity(rows.len());

        for r in rows {
            store_ids.push(r.store_id.as_str().to_string());
            dates.push(r.date);
            dayparts.push(r.daypart.clone());
            total_cars.push(r.total_cars);
            menu.push(r.avg_menu_time);
            greet.push(r.avg_greet_time);
            service.push(r.avg_service_time);
            lane_queue.push(r.avg_lane_queue_time);
            lane_total.push(r.avg_lane_total_time);
        }

        query
            .bind(store_ids)
            .bind(dates)
            .bind(dayparts)
            .bind(total_cars)
            .bind(menu)
            .bind(greet)
            .bind(service)
            .bind(lane_queue)
            .bind(lane_total)
    }
}
