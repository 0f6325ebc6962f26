//! Decimal/hex normalization, fixed-point scaling, and timestamp parsing.
//!
//! Upstream explorers disagree about almost everything in their numeric
//! encodings: Ankr sends hex wei values, Etherscan-family APIs send decimal
//! strings, Blockscout mixes both depending on the endpoint. This module is
//! the single place that turns any of those into the workspace's canonical
//! representation — a base-10, no-leading-zeros, arbitrary-precision
//! integer string — and back into human-readable decimal amounts.

use num_bigint::BigUint;
use num_traits::Num;
use thiserror::Error;

/// Errors raised while normalizing or scaling upstream numeric values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NumericError {
    #[error("numeric value is empty")]
    Empty,

    #[error("malformed numeric value: {0}")]
    Malformed(String),

    #[error("value {value} has more than {max} fractional digits")]
    TooManyFractionalDigits { value: String, max: u32 },
}

pub type Result<T> = std::result::Result<T, NumericError>;

/// Normalize a hex (`0x...`/`0X...`) or decimal integer string into the
/// canonical big-integer decimal form: no leading zeros, `"0"` for zero.
///
/// Handles magnitudes well beyond 64 bits via arbitrary-precision integer
/// arithmetic, since upstream balances (especially token balances with 18+
/// decimals) routinely exceed `u64::MAX`.
pub fn normalize_numeric(s: &str) -> Result<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(NumericError::Empty);
    }

    let (radix, digits) = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(rest) => (16, rest),
        None => (10, trimmed),
    };

    if digits.is_empty() {
        return Err(NumericError::Malformed(s.to_string()));
    }

    let value = BigUint::from_str_radix(digits, radix)
        .map_err(|_| NumericError::Malformed(s.to_string()))?;
    Ok(value.to_str_radix(10))
}

/// Shift the decimal point of a canonical integer string `decimals` places
/// to the left, trimming trailing zeros and a trailing dot.
///
/// `int_string` is expected to already be in canonical form (as produced by
/// [`normalize_numeric`]): non-negative, no leading zeros, `"0"` for zero.
pub fn divide_by_decimals(int_string: &str, decimals: u32) -> String {
    if decimals == 0 {
        return int_string.to_string();
    }

    let d = decimals as usize;
    let padded = if int_string.len() <= d {
        format!("{}{}", "0".repeat(d + 1 - int_string.len()), int_string)
    } else {
        int_string.to_string()
    };

    let split_at = padded.len() - d;
    let (int_part, frac_part) = padded.split_at(split_at);

    let int_trimmed = int_part.trim_start_matches('0');
    let int_part = if int_trimmed.is_empty() { "0" } else { int_trimmed };

    let frac_trimmed = frac_part.trim_end_matches('0');
    if frac_trimmed.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac_trimmed}")
    }
}

/// Scale a human decimal string (e.g. `"0.5"`) up into a canonical raw
/// integer string (e.g. `"500000000000000000"` for 18 decimals).
///
/// Rejects input with more than `decimals` fractional digits: scaling those
/// exactly would require rounding, which this function refuses to do
/// silently.
pub fn multiply_by_decimals(decimal_string: &str, decimals: u32) -> Result<String> {
    let d = decimals as usize;
    let (int_part, frac_part) = match decimal_string.split_once('.') {
        Some((i, f)) => (i, f),
        None => (decimal_string, ""),
    };

    if frac_part.len() > d {
        return Err(NumericError::TooManyFractionalDigits {
            value: decimal_string.to_string(),
            max: decimals,
        });
    }

    let mut combined = String::with_capacity(int_part.len() + d);
    combined.push_str(int_part);
    combined.push_str(frac_part);
    combined.push_str(&"0".repeat(d - frac_part.len()));

    let trimmed = combined.trim_start_matches('0');
    Ok(if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    })
}

/// Parse an integer, returning `default` on any parse failure. Used where
/// an upstream may send garbage (empty string, non-numeric placeholder) and
/// the caller would rather proceed with a sane fallback than fail the whole
/// record.
pub fn parse_int64_or(s: &str, default: i64) -> i64 {
    let trimmed = s.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(rest) => i64::from_str_radix(rest, 16).ok(),
        None => trimmed.parse::<i64>().ok(),
    };
    parsed.unwrap_or(default)
}

/// Parse an RFC 3339 timestamp (with or without fractional seconds) into
/// Unix seconds. Returns `0` and logs on failure rather than propagating an
/// error — a single malformed timestamp should not fail an otherwise-good
/// record.
pub fn parse_iso8601_to_unix(s: &str) -> i64 {
    match chrono::DateTime::parse_from_rfc3339(s) {
        Ok(dt) => dt.timestamp(),
        Err(err) => {
            tracing::warn!(input = %s, error = %err, "failed to parse ISO-8601 timestamp");
            0
        }
    }
}
