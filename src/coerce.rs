//! Lenient conversion of raw stored values to declared field types.
//!
//! Coercion never fails: when a text value cannot be read as the declared
//! type the original text is returned unchanged, so corrupt historical data
//! still loads. Only text sources are converted; every other value passes
//! through as stored.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use crate::core::{FieldType, Value};

lazy_static! {
    static ref INTEGER_LITERAL: Regex = Regex::new(r"^([+-]?)(0*)(\d*)$").unwrap();
    static ref FLOAT_LITERAL: Regex =
        Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").unwrap();
}

const TRUTHY: [&str; 6] = ["1", "t", "true", "y", "yes", "on"];

const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d %b %Y",
    "%b %d %Y",
    "%B %d, %Y",
    "%d %B %Y",
];

const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%z",
];

const NAIVE_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Converts `value` to `field_type`. An undeclared type behaves as text.
pub fn coerce(value: Value, field_type: Option<FieldType>) -> Value {
    let text = match &value {
        Value::Text(text) => text,
        _ => return value,
    };

    let coerced = match field_type {
        Some(FieldType::Integer) => parse_integer(text).map(Value::Integer),
        Some(FieldType::Float) => parse_float(text).map(Value::Float),
        Some(FieldType::Boolean) => Some(Value::Boolean(parse_bool(text))),
        Some(FieldType::Date) => parse_date(text).map(Value::Date),
        Some(FieldType::Timestamp) => parse_timestamp(text).map(Value::Timestamp),
        _ => None,
    };

    coerced.unwrap_or(value)
}

/// Parses a decimal integer. Leading zeros are dropped so `"08"` is eight.
pub fn parse_integer(text: &str) -> Option<i64> {
    let caps = INTEGER_LITERAL.captures(text.trim())?;
    let sign = &caps[1];
    let zeros = &caps[2];
    let digits = &caps[3];

    if digits.is_empty() {
        return if zeros.is_empty() { None } else { Some(0) };
    }

    format!("{}{}", sign, digits).parse().ok()
}

/// Parses a plain decimal or exponent literal; `inf` and `NaN` are rejected.
pub fn parse_float(text: &str) -> Option<f64> {
    let text = text.trim();
    if !FLOAT_LITERAL.is_match(text) {
        return None;
    }
    text.parse().ok()
}

/// `1`, `t`, `true`, `y`, `yes` and `on` (any case) are true; anything else is false.
pub fn parse_bool(text: &str) -> bool {
    let text = text.trim().to_ascii_lowercase();
    TRUTHY.contains(&text.as_str())
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .or_else(|| parse_timestamp(text).map(|t| t.date_naive()))
}

/// Parses RFC 3339 and common ISO-like forms. Times without an offset are UTC;
/// a bare date is midnight UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }

    if let Some(t) = OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(text, format).ok())
    {
        return Some(t.with_timezone(&Utc));
    }

    if let Some(t) = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
    {
        return Some(t.and_utc());
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn test_integer_ignores_leading_zeros() {
        assert_eq!(coerce(text("08"), Some(FieldType::Integer)), Value::Integer(8));
        assert_eq!(coerce(text("0"), Some(FieldType::Integer)), Value::Integer(0));
        assert_eq!(coerce(text("-007"), Some(FieldType::Integer)), Value::Integer(-7));
        assert_eq!(coerce(text(" 50 "), Some(FieldType::Integer)), Value::Integer(50));
    }

    #[test]
    fn test_unparsable_integer_keeps_original_text() {
        // Lenient on purpose: bad stored data reads back as-is instead of failing.
        assert_eq!(coerce(text("12abc"), Some(FieldType::Integer)), text("12abc"));
        assert_eq!(coerce(text("5.0"), Some(FieldType::Integer)), text("5.0"));
        assert_eq!(coerce(text(""), Some(FieldType::Integer)), text(""));
        assert_eq!(
            coerce(text("99999999999999999999"), Some(FieldType::Integer)),
            text("99999999999999999999")
        );
    }

    #[test]
    fn test_float() {
        assert_eq!(coerce(text("3.25"), Some(FieldType::Float)), Value::Float(3.25));
        assert_eq!(coerce(text("1e3"), Some(FieldType::Float)), Value::Float(1000.0));
        assert_eq!(coerce(text("inf"), Some(FieldType::Float)), text("inf"));
        assert_eq!(coerce(text("NaN"), Some(FieldType::Float)), text("NaN"));
    }

    #[test]
    fn test_boolean_table() {
        for truthy in ["1", "true", "TRUE", "t", "yes", "on", " y "] {
            assert_eq!(coerce(text(truthy), Some(FieldType::Boolean)), Value::Boolean(true));
        }
        for falsy in ["0", "false", "no", "off", "", "garbage"] {
            assert_eq!(coerce(text(falsy), Some(FieldType::Boolean)), Value::Boolean(false));
        }
    }

    #[test]
    fn test_dates() {
        let expected = NaiveDate::from_ymd_opt(1982, 10, 19).unwrap();
        assert_eq!(coerce(text("1982-10-19"), Some(FieldType::Date)), Value::Date(expected));
        assert_eq!(coerce(text("19 Oct 1982"), Some(FieldType::Date)), Value::Date(expected));
        assert_eq!(
            coerce(text("1982-10-19T23:15:00Z"), Some(FieldType::Date)),
            Value::Date(expected)
        );
        assert_eq!(coerce(text("not correct"), Some(FieldType::Date)), text("not correct"));
        assert_eq!(coerce(Value::Null, Some(FieldType::Date)), Value::Null);
    }

    #[test]
    fn test_timestamps() {
        let expected = Utc.with_ymd_and_hms(2012, 3, 4, 5, 6, 7).unwrap();
        for raw in [
            "2012-03-04T05:06:07Z",
            "2012-03-04T07:06:07+02:00",
            "2012-03-04 05:06:07",
            "2012-03-04 05:06:07 +0000",
        ] {
            assert_eq!(coerce(text(raw), Some(FieldType::Timestamp)), Value::Timestamp(expected));
        }
        assert_eq!(
            coerce(text("2012-03-04"), Some(FieldType::Timestamp)),
            Value::Timestamp(Utc.with_ymd_and_hms(2012, 3, 4, 0, 0, 0).unwrap())
        );
        assert_eq!(coerce(text("soon"), Some(FieldType::Timestamp)), text("soon"));
    }

    #[test]
    fn test_non_text_sources_pass_through() {
        assert_eq!(coerce(Value::Integer(5), Some(FieldType::Date)), Value::Integer(5));
        assert_eq!(coerce(Value::Float(1.5), Some(FieldType::Integer)), Value::Float(1.5));
        assert_eq!(coerce(text("08"), None), text("08"));
        assert_eq!(coerce(text("08"), Some(FieldType::Text)), text("08"));
    }
}
