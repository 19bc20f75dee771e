//! Decimal amounts on the command line, minor units in the store.

use crate::error::CliError;

/// Parses `"12"`, `"12.5"` or `"12.50"` into cents.
pub fn parse_amount(value: &str) -> Result<u64, CliError> {
    let invalid = |reason| CliError::InvalidAmount {
        value: value.to_string(),
        reason,
    };

    let trimmed = value.trim();
    let (whole, fraction) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (trimmed, ""),
    };
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("expected digits, optionally followed by .NN"));
    }
    if fraction.len() > 2 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("at most two decimal digits"));
    }

    let whole: u64 = whole.parse().map_err(|_| invalid("amount too large"))?;
    let cents = match fraction.len() {
        0 => 0,
        1 => u64::from(fraction.as_bytes()[0] - b'0') * 10,
        _ => fraction.parse::<u64>().map_err(|_| invalid("bad decimals"))?,
    };

    whole
        .checked_mul(100)
        .and_then(|w| w.checked_add(cents))
        .ok_or_else(|| invalid("amount too large"))
}

/// Formats cents as `"12.50"`.
pub fn format_amount(cents: u64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_forms() {
        assert_eq!(parse_amount("12").unwrap(), 1200);
        assert_eq!(parse_amount("12.5").unwrap(), 1250);
        assert_eq!(parse_amount(" 12.05 ").unwrap(), 1205);
        assert_eq!(parse_amount("0.99").unwrap(), 99);
    }

    #[test]
    fn rejects_malformed_amounts() {
        for bad in ["", "-1", "1.234", "abc", ".5", "1e3", "99999999999999999999"] {
            assert!(parse_amount(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn formats_two_decimals() {
        assert_eq!(format_amount(1250), "12.50");
        assert_eq!(format_amount(7), "0.07");
    }
}
