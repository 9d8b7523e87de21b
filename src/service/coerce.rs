//! Date normalizer and numeric coercion shared by validation, selectors, filters and imports.

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;

/// Parse a user or database supplied date into a date-only value.
///
/// Strings longer than 20 characters are read as ISO-8601 instants, slash-delimited
/// strings as `D/M/Y`, and anything else as `YYYY-MM-DD` (optionally with a time part).
/// Returns `None` when no reading applies.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if s.len() > 20 {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.date_naive());
        }
    }
    if s.contains('/') {
        let parts: Vec<&str> = s.split('/').map(str::trim).collect();
        if parts.len() != 3 {
            return None;
        }
        let day: u32 = parts[0].parse().ok()?;
        let month: u32 = parts[1].parse().ok()?;
        let year: i32 = parts[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.date());
        }
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive())
}

/// `D/M/Y` display form (zero padded).
pub fn format_dmy(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn current_year() -> i32 {
    today().year()
}

/// Number of days in `month` of `year`; `None` for an invalid month.
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((next - first).num_days() as u32)
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NumberValue {
    Integer(i64),
    Decimal(f64),
}

impl NumberValue {
    pub fn as_f64(self) -> f64 {
        match self {
            NumberValue::Integer(n) => n as f64,
            NumberValue::Decimal(n) => n,
        }
    }
}

/// Decimal when the string contains '.', integer otherwise.
pub fn parse_number(raw: &str) -> Option<NumberValue> {
    let s = raw.trim();
    if s.contains('.') {
        s.parse::<f64>().ok().filter(|n| n.is_finite()).map(NumberValue::Decimal)
    } else {
        s.parse::<i64>().ok().map(NumberValue::Integer)
    }
}

/// "true"/"false" as booleans, anything else as `None`.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn reads_long_iso_instants() {
        assert_eq!(normalize_date("2024-02-29T10:15:00.000Z"), Some(ymd(2024, 2, 29)));
        assert_eq!(normalize_date("2024-03-01T00:30:00+05:30"), Some(ymd(2024, 3, 1)));
    }

    #[test]
    fn reads_day_month_year() {
        assert_eq!(normalize_date("5/3/2024"), Some(ymd(2024, 3, 5)));
        assert_eq!(normalize_date("31/12/1999"), Some(ymd(1999, 12, 31)));
        assert_eq!(normalize_date("31/2/2024"), None);
        assert_eq!(normalize_date("1/2"), None);
    }

    #[test]
    fn falls_back_to_plain_dates() {
        assert_eq!(normalize_date("2023-07-14"), Some(ymd(2023, 7, 14)));
        assert_eq!(normalize_date("2023-07-14T09:00"), Some(ymd(2023, 7, 14)));
        assert_eq!(normalize_date("2023-07-14T09:00:00Z"), Some(ymd(2023, 7, 14)));
        assert_eq!(normalize_date("yesterday"), None);
        assert_eq!(normalize_date("   "), None);
    }

    #[test]
    fn numbers_follow_the_decimal_point() {
        assert_eq!(parse_number("42"), Some(NumberValue::Integer(42)));
        assert_eq!(parse_number("4.5"), Some(NumberValue::Decimal(4.5)));
        assert_eq!(parse_number("4,5"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(2024, 2), Some(29));
        assert_eq!(days_in_month(2023, 2), Some(28));
        assert_eq!(days_in_month(2024, 12), Some(31));
        assert_eq!(days_in_month(2024, 13), None);
        assert_eq!(format_dmy(ymd(2024, 3, 5)), "05/03/2024");
    }
}
