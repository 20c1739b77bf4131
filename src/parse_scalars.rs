//! Scalar text parsing rules, mirroring what the serializer renders.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::error::Error;
use crate::value::Value;

/// Parse a YAML 1.1 boolean from a &str (handles the "Norway problem").
///
/// Accepted TRUE literals (case-insensitive): "y", "yes", "true", "on"
/// Accepted FALSE literals (case-insensitive): "n", "no", "false", "off"
pub(crate) fn parse_yaml11_bool(s: &str) -> Option<bool> {
    let t = s.trim();
    if t.eq_ignore_ascii_case("true")
        || t.eq_ignore_ascii_case("yes")
        || t.eq_ignore_ascii_case("y")
        || t.eq_ignore_ascii_case("on")
    {
        Some(true)
    } else if t.eq_ignore_ascii_case("false")
        || t.eq_ignore_ascii_case("no")
        || t.eq_ignore_ascii_case("n")
        || t.eq_ignore_ascii_case("off")
    {
        Some(false)
    } else {
        None
    }
}

/// YAML 1.2 core schema booleans only.
pub(crate) fn parse_yaml12_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Plain scalar spellings of null.
pub(crate) fn is_null_literal(s: &str) -> bool {
    matches!(s, "" | "~" | "null" | "Null" | "NULL")
}

fn parse_digits_u128(digits: &str, radix: u32) -> Option<u128> {
    let mut val: u128 = 0;
    let mut saw = false;
    for b in digits.as_bytes() {
        if *b == b'_' {
            continue;
        }
        let d = (*b as char).to_digit(radix)?;
        val = val.checked_mul(radix as u128)?;
        val = val.checked_add(d as u128)?;
        saw = true;
    }
    if saw { Some(val) } else { None }
}

/// Split sign and radix prefix: `-0x2A` gives `(true, 16, "2A")`.
fn split_integer(s: &str, legacy_octal: bool) -> (bool, u32, &str) {
    let t = s.trim();
    let (neg, rest) = match t.strip_prefix('+') {
        Some(r) => (false, r),
        None => match t.strip_prefix('-') {
            Some(r) => (true, r),
            None => (false, t),
        },
    };

    let (radix, digits) = if let Some(r) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        (16u32, r)
    } else if let Some(r) = rest.strip_prefix("0o").or_else(|| rest.strip_prefix("0O")) {
        (8u32, r)
    } else if let Some(r) = rest.strip_prefix("0b").or_else(|| rest.strip_prefix("0B")) {
        (2u32, r)
    } else if legacy_octal && rest.len() > 1 && rest.starts_with('0') {
        (8u32, &rest[1..])
    } else {
        (10u32, rest)
    };
    (neg, radix, digits)
}

/// Parse an integer literal (sign, `0x`/`0o`/`0b` prefixes, `_` separators).
pub(crate) fn parse_integer(s: &str, legacy_octal: bool) -> Option<i128> {
    let (neg, radix, digits) = split_integer(s, legacy_octal);
    let mag: i128 = parse_digits_u128(digits, radix)?.try_into().ok()?;
    if neg { mag.checked_neg() } else { Some(mag) }
}

/// Parse an integer and narrow it into `T` with range checking.
pub(crate) fn parse_int<T>(s: &str, ty: &'static str, legacy_octal: bool) -> Result<T, Error>
where
    T: TryFrom<i128>,
{
    parse_integer(s, legacy_octal)
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| Error::conversion(s, ty))
}

pub(crate) fn parse_yaml12_f64(s: &str) -> Result<f64, Error> {
    let t = s.trim();
    let lower = t.to_ascii_lowercase();
    match lower.as_str() {
        ".nan" | "+.nan" | "-.nan" => Ok(f64::NAN),
        ".inf" | "+.inf" => Ok(f64::INFINITY),
        "-.inf" => Ok(f64::NEG_INFINITY),
        _ => {
            // Rust accepts "inf"/"nan" spellings YAML does not have.
            if lower.contains("inf") || lower.contains("nan") {
                return Err(Error::conversion(s, "f64"));
            }
            let cleaned: String = t.chars().filter(|c| *c != '_').collect();
            cleaned
                .parse::<f64>()
                .map_err(|_| Error::conversion(s, "f64"))
        }
    }
}

pub(crate) fn parse_yaml12_f32(s: &str) -> Result<f32, Error> {
    let v = parse_yaml12_f64(s).map_err(|_| Error::conversion(s, "f32"))?;
    Ok(v as f32)
}

pub(crate) fn parse_decimal(s: &str) -> Result<Decimal, Error> {
    let t = s.trim();
    Decimal::from_str(t)
        .or_else(|_| Decimal::from_scientific(t))
        .map_err(|_| Error::conversion(s, "decimal"))
}

/// First character of the text; empty text is an error.
pub(crate) fn parse_char(s: &str) -> Result<char, Error> {
    s.chars().next().ok_or_else(|| Error::conversion(s, "char"))
}

/// RFC 3339, bare dates, and the space separated YAML timestamp form.
pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<FixedOffset>, Error> {
    let t = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Ok(dt);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f %:z", "%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f %z"] {
        if let Ok(dt) = DateTime::parse_from_str(t, fmt) {
            return Ok(dt);
        }
    }
    let naive_utc = |naive: NaiveDateTime| Utc.from_utc_datetime(&naive).fixed_offset();
    if let Some(rest) = t.strip_suffix('Z').or_else(|| t.strip_suffix(" Z")) {
        for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(rest, fmt) {
                return Ok(naive_utc(naive));
            }
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(t, fmt) {
            return Ok(naive_utc(naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(t, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive_utc(naive));
        }
    }
    Err(Error::conversion(s, "timestamp"))
}

/// Type inference for plain scalars read into a fully open type.
///
/// Order: null, boolean, integer, float, string. Integers prefer `i64` and
/// fall back to `u64` for large positive values.
pub(crate) fn infer_plain_scalar(s: &str, legacy_octal: bool) -> Value {
    if is_null_literal(s) {
        return Value::Null;
    }
    if let Some(b) = parse_yaml12_bool(s) {
        return Value::Bool(b);
    }
    if looks_numeric(s) {
        if let Some(v) = parse_integer(s, legacy_octal) {
            if let Ok(v) = i64::try_from(v) {
                return Value::I64(v);
            }
            if let Ok(v) = u64::try_from(v) {
                return Value::U64(v);
            }
        }
        if let Ok(f) = parse_yaml12_f64(s) {
            return Value::F64(f);
        }
    }
    match s.to_ascii_lowercase().as_str() {
        ".inf" | "+.inf" => Value::F64(f64::INFINITY),
        "-.inf" => Value::F64(f64::NEG_INFINITY),
        ".nan" => Value::F64(f64::NAN),
        _ => Value::String(s.to_owned()),
    }
}

/// Cheap pre-check so texts like "1_000 apples" never reach the number parsers.
fn looks_numeric(s: &str) -> bool {
    let t = s.strip_prefix(['+', '-']).unwrap_or(s);
    t.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        && t.chars()
            .all(|c| c.is_ascii_hexdigit() || matches!(c, '.' | '_' | 'x' | 'X' | 'o' | 'O' | '+' | '-'))
}
