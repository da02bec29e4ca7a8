use thiserror::Error;

/// Amounts are integer cents of the store's currency (ARS), so $1.250,50 = 125050.
pub type Cents = i64;

/// Largest amount a single movement may carry: $1.000.000.000,00.
pub const MAX_AMOUNT_CENTS: Cents = 100_000_000_000;

/// A total left the range `Cents` can represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("amount total out of range")]
pub struct AmountOverflow;

pub fn add_cents(a: Cents, b: Cents) -> Result<Cents, AmountOverflow> {
    a.checked_add(b).ok_or(AmountOverflow)
}

pub fn sub_cents(a: Cents, b: Cents) -> Result<Cents, AmountOverflow> {
    a.checked_sub(b).ok_or(AmountOverflow)
}

/// Plain decimal rendering used in CSV exports and logs.
/// Example: 125050 -> "1250.50", -99 -> "-0.99"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Currency rendering for human-facing text, with `.` as the thousands
/// separator and `,` for decimals.
/// Example: 125050 -> "$1.250,50", -500000 -> "-$5.000,00"
pub fn format_currency(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let units = (abs / 100).to_string();

    let mut grouped = String::with_capacity(units.len() + units.len() / 3);
    for (i, digit) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    format!("{}${},{:02}", sign, grouped, abs % 100)
}

/// Parse an operator-entered amount into cents.
/// Accepts "1250", "1250.5", "1250.50" and a leading "$". Extra decimals are truncated.
/// Magnitudes above `MAX_AMOUNT_CENTS` are rejected.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let trimmed = input.trim();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let rest = rest.strip_prefix('$').unwrap_or(rest);

    if rest.is_empty() {
        return Err(ParseCentsError::Empty);
    }

    let (whole, fraction) = rest.split_once('.').unwrap_or((rest, ""));

    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(ParseCentsError::InvalidFormat(input.to_string()));
    }

    let units: i64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat(input.to_string()))?
    };

    let fraction_cents: i64 = match fraction.len() {
        0 => 0,
        1 => i64::from(fraction.as_bytes()[0] - b'0') * 10,
        _ => fraction[..2]
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat(input.to_string()))?,
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(fraction_cents))
        .ok_or_else(|| ParseCentsError::OutOfRange(input.to_string()))?;
    if cents > MAX_AMOUNT_CENTS {
        return Err(ParseCentsError::OutOfRange(input.to_string()));
    }

    Ok(if negative { -cents } else { cents })
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseCentsError {
    #[error("empty amount")]
    Empty,

    #[error("invalid amount: {0}")]
    InvalidFormat(String),

    #[error("amount out of range: {0}")]
    OutOfRange(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(125050), "1250.50");
        assert_eq!(format_cents(7), "0.07");
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(-99), "-0.99");
    }

    #[test]
    fn test_format_currency_groups_thousands() {
        assert_eq!(format_currency(0), "$0,00");
        assert_eq!(format_currency(99_900), "$999,00");
        assert_eq!(format_currency(125_050), "$1.250,50");
        assert_eq!(format_currency(123_456_789), "$1.234.567,89");
        assert_eq!(format_currency(-500_000), "-$5.000,00");
    }

    #[test]
    fn test_parse_cents() {
        assert_eq!(parse_cents("1250"), Ok(125000));
        assert_eq!(parse_cents("1250.5"), Ok(125050));
        assert_eq!(parse_cents("$1250.50"), Ok(125050));
        assert_eq!(parse_cents(".75"), Ok(75));
        assert_eq!(parse_cents("-30"), Ok(-3000));
        assert_eq!(parse_cents("10.999"), Ok(1099));
    }

    #[test]
    fn test_parse_cents_rejects_garbage() {
        assert_eq!(parse_cents("  "), Err(ParseCentsError::Empty));
        assert!(parse_cents("12,50").is_err());
        assert!(parse_cents("1.2.3").is_err());
        assert!(parse_cents("abc").is_err());
    }

    #[test]
    fn test_parse_cents_upper_bound() {
        assert_eq!(parse_cents("1000000000"), Ok(MAX_AMOUNT_CENTS));
        assert!(matches!(
            parse_cents("1000000000.01"),
            Err(ParseCentsError::OutOfRange(_))
        ));
        assert!(matches!(
            parse_cents("90000000000000000"),
            Err(ParseCentsError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_checked_helpers() {
        assert_eq!(add_cents(2, 3), Ok(5));
        assert_eq!(add_cents(Cents::MAX, 1), Err(AmountOverflow));
        assert_eq!(sub_cents(Cents::MIN, 1), Err(AmountOverflow));
    }
}
