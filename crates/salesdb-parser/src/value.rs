//! Cell value coercion: dates, currency amounts, counts, and durations.
//!
//! Vendor exports mix typed cells with text such as `"$1,025.02"`,
//! `"(12.00)"`, `"12 Guests"`, or `"1:05"`. Blank, `NaN`, and `"-"` cells
//! read as [`Numeric::Blank`], which summable fields treat as zero and
//! fallback fields treat as absent.

use std::sync::LazyLock;

use chrono::{Days, NaiveDate};
use regex::Regex;

use crate::grid::CellValue;

static SLASH_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{2}|\d{4})$").expect("valid slash date regex")
});

static EMBEDDED_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}/(?:\d{4}|\d{2}))\b")
        .expect("valid embedded date regex")
});

static COUNT_WITH_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([\d,]+(?:\.\d+)?)\s*[A-Za-z]+$").expect("valid count regex")
});

/// Excel serial numbers in this range are treated as dates (1954..2119).
const EXCEL_SERIAL_RANGE: std::ops::Range<f64> = 20_000.0..80_000.0;

/// Result of reading a cell as a number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Blank,
    Value(f64),
    Invalid,
}

impl Numeric {
    /// Value for summable fields: blank is zero, invalid is `None`.
    #[must_use]
    pub fn or_zero(self) -> Option<f64> {
        match self {
            Numeric::Blank => Some(0.0),
            Numeric::Value(v) => Some(v),
            Numeric::Invalid => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Parse a whole cell as a calendar date.
///
/// Accepts typed date cells, Excel serial numbers, `YYYY-MM-DD`,
/// `M/D/YYYY`, `M/D/YY`, and datetimes whose date part is one of those.
#[must_use]
pub fn parse_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Date(d) => Some(*d),
        CellValue::Number(n) => excel_serial_date(*n),
        CellValue::Text(s) => parse_date_str(s),
        CellValue::Empty => None,
    }
}

#[must_use]
pub fn parse_date_str(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Some(date) = parse_date_token(raw) {
        return Some(date);
    }
    // "2025-11-01 00:00:00", "2025-11-01T00:00:00", "11/1/2025 12:00 AM"
    let head = raw.split([' ', 'T']).next()?;
    if head.len() < raw.len() {
        parse_date_token(head)
    } else {
        None
    }
}

/// Find the first date written inside free text, e.g.
/// `"Report Date: 11/01/2025"`.
#[must_use]
pub fn extract_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Text(s) => parse_date_str(s).or_else(|| {
            EMBEDDED_DATE
                .find_iter(s)
                .find_map(|m| parse_date_token(m.as_str()))
        }),
        other => parse_date(other),
    }
}

fn parse_date_token(token: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        return Some(date);
    }

    let caps = SLASH_DATE.captures(token)?;
    let month: u32 = caps[1].parse().ok()?;
    let day: u32 = caps[2].parse().ok()?;
    let year_raw = &caps[3];
    let mut year: i32 = year_raw.parse().ok()?;
    if year_raw.len() == 2 {
        year += 2000;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

fn excel_serial_date(serial: f64) -> Option<NaiveDate> {
    if !EXCEL_SERIAL_RANGE.contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let days = serial.trunc() as u64;
    epoch.checked_add_days(Days::new(days))
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// Read a cell as a number, stripping currency formatting.
#[must_use]
pub fn parse_number(cell: &CellValue) -> Numeric {
    match cell {
        CellValue::Empty => Numeric::Blank,
        CellValue::Number(n) if n.is_nan() => Numeric::Blank,
        CellValue::Number(n) if n.is_finite() => Numeric::Value(*n),
        CellValue::Number(_) | CellValue::Date(_) => Numeric::Invalid,
        CellValue::Text(s) => parse_number_str(s),
    }
}

#[must_use]
pub fn parse_number_str(raw: &str) -> Numeric {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "-" || trimmed.eq_ignore_ascii_case("nan") {
        return Numeric::Blank;
    }

    let (negative, body) = match trimmed
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '%') && !c.is_whitespace())
        .collect();

    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Numeric::Value(if negative { -v } else { v }),
        _ => Numeric::Invalid,
    }
}

/// Currency or hour amount; blank is `0.0`, unparseable text is `None`.
#[must_use]
pub fn parse_amount(cell: &CellValue) -> Option<f64> {
    parse_number(cell).or_zero()
}

/// Integer count such as a guest count. Accepts `"1,204"`, `12.0`, and
/// `"12 Guests"`; fractional values round to the nearest integer.
#[must_use]
pub fn parse_count(cell: &CellValue) -> Option<i32> {
    let value = match parse_number(cell) {
        Numeric::Blank => 0.0,
        Numeric::Value(v) => v,
        Numeric::Invalid => {
            let text = cell.as_text()?;
            let caps = COUNT_WITH_UNIT.captures(text.trim())?;
            match parse_number_str(&caps[1]) {
                Numeric::Value(v) => v,
                _ => return None,
            }
        }
    };

    let rounded = value.round();
    if rounded < f64::from(i32::MIN) || rounded > f64::from(i32::MAX) {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    Some(rounded as i32)
}

// ---------------------------------------------------------------------------
// Durations
// ---------------------------------------------------------------------------

/// Read a timing cell as seconds: plain numbers, `M:SS`, or `H:MM:SS`.
#[must_use]
pub fn parse_duration_secs(cell: &CellValue) -> Numeric {
    let Some(text) = cell.as_text() else {
        return parse_number(cell);
    };
    if !text.contains(':') {
        return parse_number_str(text);
    }

    let parts: Vec<&str> = text.trim().split(':').collect();
    let mut total = 0.0;
    for part in &parts {
        match part.trim().parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => total = total * 60.0 + v,
            _ => return Numeric::Invalid,
        }
    }
    match parts.len() {
        2 | 3 => Numeric::Value(total),
        _ => Numeric::Invalid,
    }
}

/// A timing value only when it is a number greater than zero.
#[must_use]
pub fn positive_duration(cell: &CellValue) -> Option<f64> {
    match parse_duration_secs(cell) {
        Numeric::Value(v) if v > 0.0 => Some(v),
        _ => None,
    }
}
