//! Parsing and formatting of human-readable byte sizes.
//!
//! Thresholds are accepted as plain byte counts or with a single-letter
//! binary suffix (`b`, `k`, `m`, `g`, `t`, case-insensitive, powers of 1024):
//! `104857600`, `100M`, and `0.1G` all denote the same budget.

use crate::core::errors::{DcError, Result};

const UNITS: [(char, u64); 5] = [
    ('b', 1),
    ('k', 1 << 10),
    ('m', 1 << 20),
    ('g', 1 << 30),
    ('t', 1 << 40),
];

/// Parse a size string into bytes.
///
/// Fractional values are allowed with a suffix (`1.5G`) and truncate toward
/// zero after multiplication. A bare number is bytes.
pub fn parse_size(raw: &str) -> Result<u64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid(raw, "empty size"));
    }

    let (number, multiplier) = match trimmed.chars().last() {
        Some(last) if last.is_ascii_alphabetic() => {
            let unit = UNITS
                .iter()
                .find(|(c, _)| *c == last.to_ascii_lowercase())
                .ok_or_else(|| invalid(raw, "unknown unit suffix"))?;
            (&trimmed[..trimmed.len() - 1], unit.1)
        }
        _ => (trimmed, 1),
    };

    if number.is_empty() {
        return Err(invalid(raw, "missing numeric part"));
    }

    let value: f64 = number
        .parse()
        .map_err(|_| invalid(raw, "not a valid number"))?;
    if value < 0.0 || !value.is_finite() {
        return Err(invalid(raw, "size must be a finite non-negative number"));
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    let bytes = (value * multiplier as f64) as u64;
    Ok(bytes)
}

/// Format a byte count with the largest suffix that keeps a readable mantissa.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    for (unit, factor) in UNITS.iter().rev() {
        if *factor > 1 && bytes >= *factor {
            return format!(
                "{:.1}{}",
                bytes as f64 / *factor as f64,
                unit.to_ascii_uppercase()
            );
        }
    }
    format!("{bytes}B")
}

fn invalid(raw: &str, why: &str) -> DcError {
    DcError::InvalidConfig {
        details: format!("size {raw:?}: {why}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_bytes() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("0").unwrap(), 0);
    }

    #[test]
    fn parses_suffixed_sizes() {
        assert_eq!(parse_size("1k").unwrap(), 1024);
        assert_eq!(parse_size("100M").unwrap(), 100 * 1024 * 1024);
        assert_eq!(parse_size("2G").unwrap(), 2 * 1024 * 1024 * 1024);
        assert_eq!(parse_size("1T").unwrap(), 1 << 40);
        assert_eq!(parse_size("512b").unwrap(), 512);
    }

    #[test]
    fn parses_fractional_with_suffix() {
        assert_eq!(parse_size("1.5k").unwrap(), 1536);
        assert_eq!(parse_size("0.5G").unwrap(), 512 * 1024 * 1024);
    }

    #[test]
    fn tolerates_surrounding_whitespace() {
        assert_eq!(parse_size("  100M ").unwrap(), 100 * 1024 * 1024);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("G").is_err());
        assert!(parse_size("12q").is_err());
        assert!(parse_size("-5M").is_err());
        assert!(parse_size("nan").is_err());
    }

    #[test]
    fn formats_round_trip_ballpark() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(1024), "1.0K");
        assert_eq!(format_size(100 * 1024 * 1024), "100.0M");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024 / 2), "1.5G");
    }
}
