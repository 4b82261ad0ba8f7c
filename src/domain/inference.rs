// ============================================================
// TYPE INFERENCE
// ============================================================
// Decide the semantic type of a column from its raw string values.
// Pure functions over a fixed, ordered matcher list; safe to run from
// any number of concurrent ingestions.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::table::{Cell, TypeTag};

/// Specificity order: the first tag for which every non-empty value in the
/// column parses wins. Text always succeeds and closes the list.
const MATCHERS: &[(TypeTag, fn(&str) -> bool)] = &[
    (TypeTag::Boolean, is_boolean),
    (TypeTag::Integer, is_integer),
    (TypeTag::Decimal, is_decimal),
    (TypeTag::Date, is_date),
    (TypeTag::Time, is_time),
    (TypeTag::DateTime, is_datetime),
    (TypeTag::Text, |_| true),
];

/// Infer the most specific type that accepts every non-empty value.
///
/// Whitespace-only values count as null under any tag. The whole column is
/// examined, never a sample, so the result is deterministic.
pub fn infer_column(values: &[String]) -> TypeTag {
    let non_empty: Vec<&str> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect();

    if non_empty.is_empty() {
        return TypeTag::Text;
    }

    for (tag, matches) in MATCHERS {
        if non_empty.iter().all(|v| matches(v)) {
            return *tag;
        }
    }

    TypeTag::Text
}

/// Convert one raw value into a typed cell under an already-decided tag.
///
/// Temporal tags keep the original string verbatim: `"9:15"` round-trips as
/// `"9:15"`, never normalized to `"09:15"`. A value that no longer parses
/// under the tag degrades to null instead of erroring.
pub fn to_cell(raw: &str, tag: TypeTag) -> Cell {
    let value = raw.trim();
    if value.is_empty() {
        return Cell::Null;
    }

    match tag {
        TypeTag::Boolean => match parse_boolean(value) {
            Some(b) => Cell::Bool(b),
            None => Cell::Null,
        },
        TypeTag::Integer => match value.parse::<i64>() {
            Ok(i) => Cell::Int(i),
            Err(_) => Cell::Null,
        },
        TypeTag::Decimal => match value.parse::<f64>() {
            Ok(f) => Cell::Float(f),
            Err(_) => Cell::Null,
        },
        TypeTag::Date | TypeTag::Time | TypeTag::DateTime | TypeTag::Text => {
            Cell::Text(value.to_string())
        }
    }
}

fn parse_boolean(value: &str) -> Option<bool> {
    // Numeric tokens are deliberately not booleans, otherwise a column of
    // 0/1 flags would never reach the Integer matcher.
    match value.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" => Some(true),
        "false" | "f" | "no" => Some(false),
        _ => None,
    }
}

fn is_boolean(value: &str) -> bool {
    parse_boolean(value).is_some()
}

/// Optional sign, digits only, no leading zeros. Zero-padded identifiers
/// ("007", SIREN-style codes) must stay textual to round-trip verbatim.
fn is_integer(value: &str) -> bool {
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return false;
    }
    value.parse::<i64>().is_ok()
}

/// Decimal with a `.` separator: digits on both sides, integer part free of
/// leading zeros except the plain `0.x` form. A bare integer is a valid
/// decimal too, so a mixed 1 / 2.5 column lands on Decimal instead of Text.
fn is_decimal(value: &str) -> bool {
    let unsigned = value.strip_prefix(['+', '-']).unwrap_or(value);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some(parts) => parts,
        None => (unsigned, "0"),
    };
    if int_part.is_empty() || frac_part.is_empty() {
        return false;
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return false;
    }
    if int_part.len() > 1 && int_part.starts_with('0') {
        return false;
    }
    value.parse::<f64>().is_ok()
}

fn is_date(value: &str) -> bool {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

/// Colon-delimited time; single-digit hour ("9:15") and zero-padded hour
/// ("09:45") are both acceptable and both stay as typed.
fn is_time(value: &str) -> bool {
    NaiveTime::parse_from_str(value, "%H:%M:%S").is_ok()
        || NaiveTime::parse_from_str(value, "%H:%M").is_ok()
}

fn is_datetime(value: &str) -> bool {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M").is_ok()
}
