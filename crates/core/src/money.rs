use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;
use thiserror::Error;

/// Number of milliunits in one major currency unit.
pub const MILLIUNITS_PER_UNIT: i64 = 1000;

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥'];

/// Exact signed amount in 1/1000 of a currency unit.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Milliunits(pub i64);

impl Milliunits {
    pub const ZERO: Milliunits = Milliunits(0);

    pub fn value(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Milliunits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_amount(self.0))
    }
}

impl FromStr for Milliunits {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_amount(s).map(Milliunits)
    }
}

// Arithmetic saturates at the i64 bounds instead of wrapping.

impl Add for Milliunits {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Milliunits(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Milliunits {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Milliunits(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Milliunits {
    type Output = Self;
    fn neg(self) -> Self {
        Milliunits(self.0.saturating_neg())
    }
}

impl Sum for Milliunits {
    /// Accumulates in i128 so intermediate overflow cancels out; only the
    /// final total is clamped.
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        let total = iter.fold(0i128, |acc, m| acc + i128::from(m.0));
        Milliunits(total.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("no digits in amount \"{0}\"")]
    NoDigits(String),
    #[error("unexpected character in amount \"{0}\"")]
    Malformed(String),
    #[error("amount \"{0}\" is out of range")]
    Overflow(String),
}

/// Convert a decimal currency string into exact milliunits.
///
/// Accepts surrounding whitespace, a currency symbol, thousands separators, a
/// leading sign, and accounting-style parentheses for negatives. Fractional
/// digits beyond the third are truncated, never rounded.
pub fn parse_amount(text: &str) -> Result<i64, AmountError> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && !CURRENCY_SYMBOLS.contains(c))
        .collect();

    let (mut negative, mut body) = match cleaned
        .strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, cleaned.as_str()),
    };
    if let Some(rest) = body.strip_prefix('-') {
        negative = true;
        body = rest;
    } else if let Some(rest) = body.strip_prefix('+') {
        body = rest;
    }

    let (whole, fraction) = body.split_once('.').unwrap_or((body, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(AmountError::NoDigits(text.to_string()));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(AmountError::Malformed(text.to_string()));
    }

    let overflow = || AmountError::Overflow(text.to_string());
    let whole_value: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| overflow())?
    };
    let fraction_value = fraction
        .bytes()
        .chain(std::iter::repeat(b'0'))
        .take(3)
        .fold(0i64, |acc, b| acc * 10 + i64::from(b - b'0'));

    let magnitude = whole_value
        .checked_mul(MILLIUNITS_PER_UNIT)
        .and_then(|w| w.checked_add(fraction_value))
        .ok_or_else(overflow)?;

    Ok(if negative { -magnitude } else { magnitude })
}

/// Human-readable form: sign, `$`, thousands-grouped whole part, two-digit cents.
/// The third milliunit digit is dropped, not rounded.
pub fn format_amount(milliunits: i64) -> String {
    let abs = milliunits.unsigned_abs();
    let whole = abs / MILLIUNITS_PER_UNIT as u64;
    let cents = (abs % MILLIUNITS_PER_UNIT as u64) / 10;
    let sign = if milliunits < 0 { "-" } else { "" };
    format!("{sign}${}.{cents:02}", group_thousands(whole))
}

/// Raw value followed by its display form, e.g. `-45670 (-$45.67)`.
pub fn describe_amount(milliunits: i64) -> String {
    format!("{milliunits} ({})", format_amount(milliunits))
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── parse_amount ──────────────────────────────────────────────────────────

    #[test]
    fn parse_whole_amounts() {
        assert_eq!(parse_amount("45").unwrap(), 45_000);
        assert_eq!(parse_amount("0").unwrap(), 0);
        assert_eq!(parse_amount("1").unwrap(), 1_000);
    }

    #[test]
    fn parse_amounts_with_cents() {
        assert_eq!(parse_amount("45.67").unwrap(), 45_670);
        assert_eq!(parse_amount("0.50").unwrap(), 500);
        assert_eq!(parse_amount("123.99").unwrap(), 123_990);
    }

    #[test]
    fn parse_sub_cent_precision() {
        assert_eq!(parse_amount("45.678").unwrap(), 45_678);
        assert_eq!(parse_amount("1.001").unwrap(), 1_001);
    }

    #[test]
    fn parse_truncates_beyond_three_digits() {
        assert_eq!(parse_amount("45.6789").unwrap(), 45_678);
        assert_eq!(parse_amount("-0.0009").unwrap(), 0);
    }

    #[test]
    fn parse_pads_short_fractions() {
        assert_eq!(parse_amount("45.6").unwrap(), 45_600);
        assert_eq!(parse_amount("45.").unwrap(), 45_000);
        assert_eq!(parse_amount(".5").unwrap(), 500);
    }

    #[test]
    fn parse_negative_amounts() {
        assert_eq!(parse_amount("-45.67").unwrap(), -45_670);
        assert_eq!(parse_amount("-100").unwrap(), -100_000);
    }

    #[test]
    fn parse_accounting_parens() {
        assert_eq!(parse_amount("(45.67)").unwrap(), -45_670);
        assert_eq!(parse_amount("(100)").unwrap(), -100_000);
        assert_eq!(parse_amount("($1,234.50)").unwrap(), -1_234_500);
    }

    #[test]
    fn parse_symbols_and_separators() {
        assert_eq!(parse_amount("$45.67").unwrap(), 45_670);
        assert_eq!(parse_amount("$1,234.56").unwrap(), 1_234_560);
        assert_eq!(parse_amount("-$45.67").unwrap(), -45_670);
        assert_eq!(parse_amount("€12.00").unwrap(), 12_000);
    }

    #[test]
    fn parse_whitespace() {
        assert_eq!(parse_amount(" 45.67 ").unwrap(), 45_670);
        assert_eq!(parse_amount("$ 45.67").unwrap(), 45_670);
    }

    #[test]
    fn parse_rejects_text_without_digits() {
        assert!(matches!(parse_amount(""), Err(AmountError::NoDigits(_))));
        assert!(matches!(parse_amount(" $ "), Err(AmountError::NoDigits(_))));
        assert!(matches!(parse_amount("abc"), Err(AmountError::Malformed(_))));
        assert!(matches!(parse_amount("12.3.4"), Err(AmountError::Malformed(_))));
    }

    #[test]
    fn parse_rejects_overflow() {
        assert!(matches!(
            parse_amount("99999999999999999999"),
            Err(AmountError::Overflow(_))
        ));
    }

    // ── format_amount ─────────────────────────────────────────────────────────

    #[test]
    fn format_positive() {
        assert_eq!(format_amount(45_670), "$45.67");
        assert_eq!(format_amount(1_000), "$1.00");
        assert_eq!(format_amount(500), "$0.50");
    }

    #[test]
    fn format_negative_and_zero() {
        assert_eq!(format_amount(-45_670), "-$45.67");
        assert_eq!(format_amount(-1_000), "-$1.00");
        assert_eq!(format_amount(0), "$0.00");
    }

    #[test]
    fn format_drops_third_digit() {
        assert_eq!(format_amount(45_679), "$45.67");
    }

    #[test]
    fn format_groups_thousands() {
        assert_eq!(format_amount(1_234_560_000), "$1,234,560.00");
        assert_eq!(format_amount(999_000), "$999.00");
        assert_eq!(format_amount(1_000_000), "$1,000.00");
    }

    #[test]
    fn describe_includes_raw_value() {
        assert_eq!(describe_amount(-45_670), "-45670 (-$45.67)");
        assert_eq!(describe_amount(1_000), "1000 ($1.00)");
    }

    #[test]
    fn display_round_trips_at_cent_precision() {
        for text in ["0.01", "12.30", "-7.25", "1,234.56", "-98,765.43"] {
            let m = parse_amount(text).unwrap();
            assert_eq!(parse_amount(&format_amount(m)).unwrap(), m, "{text}");
        }
    }

    // ── Milliunits ────────────────────────────────────────────────────────────

    #[test]
    fn milliunits_arithmetic_and_sum() {
        let total: Milliunits = [Milliunits(1_500), Milliunits(-500), Milliunits(250)]
            .into_iter()
            .sum();
        assert_eq!(total, Milliunits(1_250));
        assert_eq!(-Milliunits(10), Milliunits(-10));
        assert_eq!(Milliunits(10) - Milliunits(15), Milliunits(-5));
        assert_eq!("(4.85)".parse::<Milliunits>().unwrap(), Milliunits(-4_850));
        assert_eq!(Milliunits(-4_850).to_string(), "-$4.85");
    }

    #[test]
    fn arithmetic_saturates_at_bounds() {
        let big = Milliunits(parse_amount("5000000000000000").unwrap());
        assert_eq!(big + big, Milliunits(i64::MAX));
        assert_eq!(-big - big, Milliunits(i64::MIN));
        assert_eq!(-Milliunits(i64::MIN), Milliunits(i64::MAX));
    }

    #[test]
    fn sum_clamps_only_the_final_total() {
        let big = Milliunits(5_000_000_000_000_000_000);
        assert_eq!([big, big].into_iter().sum::<Milliunits>(), Milliunits(i64::MAX));
        assert_eq!([-big, -big].into_iter().sum::<Milliunits>(), Milliunits(i64::MIN));
        // 1e19 overflows midway; the -1e19 that follows brings it back.
        assert_eq!([big, big, -big, -big, Milliunits(7)].into_iter().sum::<Milliunits>(), Milliunits(7));
    }

    #[test]
    fn milliunits_serialize_as_integer() {
        assert_eq!(serde_json::to_string(&Milliunits(-4_850)).unwrap(), "-4850");
    }
}
