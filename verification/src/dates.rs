//! Decoding of date and country public inputs.
//!
//! Circuits emit short ASCII strings (`"990101"`, `"FRA"`) either literally or
//! packed into a field element: the decimal integer whose big-endian bytes
//! are the ASCII characters.

use chrono::{Months, NaiveDate};

/// Unpack a decimal (or `0x` hex) integer into the ASCII string held in its
/// big-endian bytes. Leading zero bytes are skipped.
pub fn decode_packed_ascii(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let value = match raw.strip_prefix("0x") {
        Some(hex_digits) => u128::from_str_radix(hex_digits, 16).ok()?,
        None => raw.parse::<u128>().ok()?,
    };
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|b| *b != 0)?;
    let text = &bytes[start..];
    if !text.iter().all(|b| b.is_ascii_graphic()) {
        return None;
    }
    String::from_utf8(text.to_vec()).ok()
}

/// Split a `YYMMDD` input (literal or packed) into its numeric parts.
pub fn parse_yymmdd(raw: &str) -> Option<(u32, u32, u32)> {
    let raw = raw.trim();
    let literal = if raw.len() == 6 && raw.bytes().all(|b| b.is_ascii_digit()) {
        raw.to_string()
    } else {
        decode_packed_ascii(raw)?
    };
    if literal.len() != 6 || !literal.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let yy = literal[0..2].parse().ok()?;
    let mm = literal[2..4].parse().ok()?;
    let dd = literal[4..6].parse().ok()?;
    Some((yy, mm, dd))
}

/// Current-date and document-expiry inputs always live in this century.
pub fn current_date_from_parts(yy: u32, mm: u32, dd: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2000 + yy as i32, mm, dd)
}

/// Resolve a two-digit-year birth date to the latest century that does not
/// put it after `today`.
pub fn birth_date_from_parts(yy: u32, mm: u32, dd: u32, today: NaiveDate) -> Option<NaiveDate> {
    match NaiveDate::from_ymd_opt(2000 + yy as i32, mm, dd) {
        Some(date) if date <= today => Some(date),
        _ => NaiveDate::from_ymd_opt(1900 + yy as i32, mm, dd),
    }
}

/// Latest birth date that is still at least `min_age` years before `today`.
/// A 29 February anniversary clamps to 28 February.
pub fn latest_eligible_birth_date(today: NaiveDate, min_age: u32) -> Option<NaiveDate> {
    today.checked_sub_months(Months::new(min_age.checked_mul(12)?))
}

/// Country code from a literal (`"FRA"`) or packed citizenship input.
pub fn decode_citizenship(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let is_code = |s: &str| (2..=3).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_uppercase());
    if is_code(raw) {
        return Some(raw.to_string());
    }
    decode_packed_ascii(raw).filter(|s| is_code(s))
}
