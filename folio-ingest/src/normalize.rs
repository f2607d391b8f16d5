//! Field normalizers: raw cell values to typed dates and signed amounts.
//!
//! Both functions are total. Dates return `None` when nothing matches so the caller can
//! report the row; amounts fall back to `0.0`, which the extractors treat as "drop the row".

use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::Cell;

/// Explicit textual date layouts a statement may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateFormat {
    /// `DD/MM/YYYY`
    DayMonthSlash,
    /// `DD-MM-YYYY`
    DayMonthDash,
    /// `YYYY-MM-DD`
    YearMonthDay,
    /// `DD-MMM-YYYY`, e.g. `15-Jan-2024`
    DayMonthNameDash,
    /// `DD MMM YYYY`, e.g. `15 Jan 2024`
    DayMonthNameSpace,
    /// `MM/DD/YYYY`. Only used when a profile asks for it.
    MonthDaySlash,
}

/// Tried after the profile's own formats, in this order.
pub const DEFAULT_DATE_FORMATS: &[DateFormat] = &[
    DateFormat::DayMonthSlash,
    DateFormat::DayMonthDash,
    DateFormat::YearMonthDay,
    DateFormat::DayMonthNameDash,
    DateFormat::DayMonthNameSpace,
];

static SLASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})(?:[\sT].*)?$").unwrap());
static DASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})-(\d{1,2})-(\d{4})(?:[\sT].*)?$").unwrap());
static YMD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})(?:[\sT].*)?$").unwrap());
static NAME_DASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})-([A-Za-z]{3,9})-(\d{4})(?:[\sT].*)?$").unwrap());
static NAME_SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})\s+([A-Za-z]{3,9})\.?,?\s+(\d{4})(?:\s.*)?$").unwrap());

static MARKER_TOKENS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)debit|credit|dr|cr").unwrap());

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

fn month_from_name(name: &str) -> Option<u32> {
    let key = name.get(..3)?.to_ascii_lowercase();
    MONTHS.iter().position(|m| *m == key).map(|i| i as u32 + 1)
}

/// Spreadsheet serial day number (days since 1899-12-30). The time-of-day fraction is dropped.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 || serial > 2_958_465.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}

/// Strict ISO-8601 date, optionally carrying a time part.
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    None
}

fn ymd(y: &str, m: u32, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m, d.parse().ok()?)
}

fn parse_with(s: &str, format: DateFormat) -> Option<NaiveDate> {
    match format {
        DateFormat::DayMonthSlash => {
            let c = SLASH_RE.captures(s)?;
            ymd(&c[3], c[2].parse().ok()?, &c[1])
        }
        DateFormat::MonthDaySlash => {
            let c = SLASH_RE.captures(s)?;
            ymd(&c[3], c[1].parse().ok()?, &c[2])
        }
        DateFormat::DayMonthDash => {
            let c = DASH_RE.captures(s)?;
            ymd(&c[3], c[2].parse().ok()?, &c[1])
        }
        DateFormat::YearMonthDay => {
            let c = YMD_RE.captures(s)?;
            ymd(&c[1], c[2].parse().ok()?, &c[3])
        }
        DateFormat::DayMonthNameDash => {
            let c = NAME_DASH_RE.captures(s)?;
            ymd(&c[3], month_from_name(&c[2])?, &c[1])
        }
        DateFormat::DayMonthNameSpace => {
            let c = NAME_SPACE_RE.captures(s)?;
            ymd(&c[3], month_from_name(&c[2])?, &c[1])
        }
    }
}

/// Normalize a date cell.
///
/// Text is tried as ISO first, then against `formats`, then against
/// [`DEFAULT_DATE_FORMATS`]. The first layout that matches and names a real calendar
/// day wins.
pub fn parse_date(raw: &Cell, formats: &[DateFormat]) -> Option<NaiveDate> {
    match raw {
        Cell::Empty => None,
        Cell::Date(d) => Some(*d),
        Cell::Number(n) => serial_to_date(*n),
        Cell::Text(text) => {
            let s = text.trim();
            if s.is_empty() {
                return None;
            }
            if let Some(d) = parse_iso_date(s) {
                return Some(d);
            }
            formats
                .iter()
                .chain(DEFAULT_DATE_FORMATS)
                .find_map(|f| parse_with(s, *f))
        }
    }
}

/// Signed amount from statement text. See [`parse_amount`].
pub fn parse_amount_str(raw: &str) -> f64 {
    let s = raw.trim();
    let lower = s.to_lowercase();
    let negative = s.starts_with('-')
        || s.ends_with('-')
        || s.starts_with('(')
        || lower.contains("dr")
        || lower.contains("debit");

    let stripped = MARKER_TOKENS_RE.replace_all(s, "");
    let cleaned: String = stripped
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
        .collect();

    // Some ledgers print debits as "500.00-".
    let value: f64 = match cleaned.trim_end_matches('-').parse() {
        Ok(v) if f64::is_finite(v) => v,
        _ => return 0.0,
    };

    // Markers only flip a positive parse; "-500 DR" stays -500.
    if negative && value > 0.0 { -value } else { value }
}

/// Signed amount from a cell. Numbers pass through unchanged; blank or
/// unparseable input yields `0.0`.
pub fn parse_amount(raw: &Cell) -> f64 {
    match raw {
        Cell::Number(n) => *n,
        Cell::Text(s) => parse_amount_str(s),
        Cell::Empty | Cell::Date(_) => 0.0,
    }
}

/// Net amount for statements that report money in and money out in separate columns.
pub fn split_amount(credit: &Cell, debit: &Cell) -> f64 {
    parse_amount(credit) - parse_amount(debit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn d(y: i32, m: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, day)
    }

    #[test]
    fn test_all_layouts_agree() {
        for raw in ["15-Jan-2024", "15 Jan 2024", "15/01/2024", "2024-01-15", "15-01-2024"] {
            assert_eq!(parse_date(&text(raw), &[]), d(2024, 1, 15), "{raw}");
        }
    }

    #[test]
    fn test_iso_with_time() {
        assert_eq!(parse_date(&text("2024-01-15T10:30:00Z"), &[]), d(2024, 1, 15));
        assert_eq!(parse_date(&text("2024-01-15 08:00:00"), &[]), d(2024, 1, 15));
    }

    #[test]
    fn test_day_first_by_default() {
        assert_eq!(parse_date(&text("01/11/2025"), &[]), d(2025, 11, 1));
    }

    #[test]
    fn test_profile_format_takes_priority() {
        let us = [DateFormat::MonthDaySlash];
        assert_eq!(parse_date(&text("01/11/2025"), &us), d(2025, 1, 11));
        // 13 is not a month, so the default day-first layout still rescues it
        assert_eq!(parse_date(&text("13/01/2025"), &us), d(2025, 1, 13));
    }

    #[test]
    fn test_trailing_time_is_ignored() {
        assert_eq!(parse_date(&text("15/01/2024 14:22"), &[]), d(2024, 1, 15));
        assert_eq!(parse_date(&text("15-JAN-2024 09:00:01"), &[]), d(2024, 1, 15));
    }

    #[test]
    fn test_long_month_names() {
        assert_eq!(parse_date(&text("3 September 2024"), &[]), d(2024, 9, 3));
    }

    #[test]
    fn test_rejects_invalid_dates() {
        assert_eq!(parse_date(&text("31/02/2024"), &[]), None);
        assert_eq!(parse_date(&text("15-Foo-2024"), &[]), None);
        assert_eq!(parse_date(&text("yesterday"), &[]), None);
        assert_eq!(parse_date(&Cell::Empty, &[]), None);
    }

    #[test]
    fn test_serial_dates() {
        assert_eq!(parse_date(&Cell::Number(45306.0), &[]), d(2024, 1, 15));
        assert_eq!(parse_date(&Cell::Number(45306.75), &[]), d(2024, 1, 15));
        assert_eq!(parse_date(&Cell::Number(f64::NAN), &[]), None);
    }

    #[test]
    fn test_native_date_passes_through() {
        let date = NaiveDate::from_ymd_opt(2023, 6, 30).unwrap();
        assert_eq!(parse_date(&Cell::Date(date), &[]), Some(date));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount_str("(1,250.00)"), -1250.0);
        assert_eq!(parse_amount_str("₦5,000"), 5000.0);
        assert_eq!(parse_amount_str("500.00 DR"), -500.0);
        assert_eq!(parse_amount_str(""), 0.0);
    }

    #[test]
    fn test_parse_amount_markers() {
        assert_eq!(parse_amount_str("750.25 CR"), 750.25);
        assert_eq!(parse_amount_str("Debit 20"), -20.0);
        assert_eq!(parse_amount_str("credit 20"), 20.0);
        assert_eq!(parse_amount_str("-$50.00"), -50.0);
        assert_eq!(parse_amount_str("  1 234.50 "), 1234.5);
    }

    #[test]
    fn test_parse_amount_does_not_double_flip() {
        assert_eq!(parse_amount_str("-500.00 DR"), -500.0);
    }

    #[test]
    fn test_parse_amount_trailing_minus() {
        assert_eq!(parse_amount_str("500.00-"), -500.0);
        assert_eq!(parse_amount_str("\u{20a6}1,250.00- "), -1250.0);
        assert_eq!(parse_amount_str("-"), 0.0);
    }

    #[test]
    fn test_parse_amount_garbage_is_zero() {
        assert_eq!(parse_amount_str("n/a"), 0.0);
        assert_eq!(parse_amount_str("-"), 0.0);
        assert_eq!(parse_amount_str("1.2.3"), 0.0);
    }

    #[test]
    fn test_numeric_cells_unchanged() {
        assert_eq!(parse_amount(&Cell::Number(-42.5)), -42.5);
        assert_eq!(parse_amount(&Cell::Empty), 0.0);
    }

    #[test]
    fn test_split_amount() {
        assert_eq!(split_amount(&Cell::Empty, &text("15.00")), -15.0);
        assert_eq!(split_amount(&text("50,000.00"), &Cell::Empty), 50000.0);
        assert_eq!(split_amount(&text("0.00"), &Cell::Empty), 0.0);
    }
}
