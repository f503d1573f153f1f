// Utility helpers for parsing and basic statistics.
//
// This module centralizes the "dirty" CSV number handling so the rest of
// the code can assume clean, typed values.
use num_format::{Locale, ToFormattedString};

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in CSV exports (commas, spaces, text).
///
/// - Accepts `Option<&str>` so callers can pass through optional fields.
/// - Trims whitespace.
/// - Strips thousands separators like `","` before parsing.
/// - Accepts exponent notation (`1e-05`), as pandas writes small floats.
/// - Returns `None` for anything that cannot be parsed or is not finite
///   (`NaN`, `inf`, `n/a`, ...).
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let v = s.replace(',', "").parse::<f64>().ok()?;
    v.is_finite().then_some(v)
}

/// Parse a region group id. Spreadsheet exports sometimes write integer ids
/// as floats (`5302.0`), so integral floats are accepted too.
pub fn parse_group_id(s: Option<&str>) -> Option<u32> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(id) = s.parse::<u32>() {
        return Some(id);
    }
    let v = parse_f64_safe(Some(s))?;
    if v.fract() == 0.0 && v >= 0.0 && v <= u32::MAX as f64 {
        Some(v as u32)
    } else {
        None
    }
}

/// Trimmed, non-empty text or `None`.
pub fn non_empty(s: Option<&str>) -> Option<String> {
    let s = s?.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Arithmetic mean; `None` for an empty slice rather than a NaN.
pub fn mean(v: &[f64]) -> Option<f64> {
    if v.is_empty() {
        return None;
    }
    let sum: f64 = v.iter().copied().sum();
    Some(sum / v.len() as f64)
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Thin wrapper around `num-format` for counts in log messages
    // (e.g. `1,234 rows loaded`).
    n.to_formatted_string(&Locale::en)
}
