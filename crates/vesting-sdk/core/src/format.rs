use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::ValidationError;

/// Largest scale a `Decimal` can carry
const MAX_DECIMAL_SCALE: u32 = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    /// Insert thousands separators in the integer part
    pub commify: bool,
    pub max_fraction_digits: u32,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            commify: true,
            max_fraction_digits: 6,
        }
    }
}

/// Rounds half away from zero to at most `precision` fractional digits and
/// drops trailing zeros.
pub fn round_amount(value: Decimal, precision: u32) -> Decimal {
    value
        .round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

pub fn format_amount(value: Decimal, options: FormatOptions) -> String {
    let rounded = round_amount(value, options.max_fraction_digits).to_string();
    if !options.commify {
        return rounded;
    }

    let (sign, unsigned) = match rounded.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rounded.as_str()),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    match fraction {
        Some(fraction) => format!("{sign}{grouped}.{fraction}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Display form used for the converted-value hint, e.g. `1,234.5 USD`
pub fn format_currency(value: Decimal, symbol: &str) -> String {
    let amount = format_amount(
        value,
        FormatOptions {
            commify: true,
            max_fraction_digits: 2,
        },
    );
    format!("{amount} {symbol}")
}

/// Converts a decimal token amount into integer base units, rejecting values
/// the token cannot represent.
pub fn to_base_units(amount: Decimal, decimals: u32) -> Result<u128, ValidationError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ValidationError::AmountNegative);
    }
    let normalized = amount.normalize();
    if normalized.scale() > decimals {
        return Err(ValidationError::AmountTooPrecise { decimals });
    }

    let mantissa = u128::try_from(normalized.mantissa())
        .map_err(|_| ValidationError::AmountNegative)?;
    if mantissa == 0 {
        return Ok(0);
    }
    let shift = decimals.saturating_sub(normalized.scale());
    10u128
        .checked_pow(shift)
        .and_then(|factor| mantissa.checked_mul(factor))
        .ok_or(ValidationError::AmountTooLarge)
}

/// Converts integer base units into a decimal token amount. Returns `None`
/// when the value does not fit a `Decimal`.
pub fn from_base_units(value: u128, decimals: u32) -> Option<Decimal> {
    let mantissa = i128::try_from(value).ok()?;
    if decimals <= MAX_DECIMAL_SCALE {
        return Decimal::try_from_i128_with_scale(mantissa, decimals)
            .ok()
            .map(|d| d.normalize());
    }
    // Drop the digits a Decimal cannot hold
    let excess = decimals - MAX_DECIMAL_SCALE;
    let divisor = 10i128.checked_pow(excess)?;
    Decimal::try_from_i128_with_scale(mantissa / divisor, MAX_DECIMAL_SCALE)
        .ok()
        .map(|d| d.normalize())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_format_amount_commify() {
        let options = FormatOptions::default();
        assert_eq!(format_amount(dec!(1234567.891), options), "1,234,567.891");
        assert_eq!(format_amount(dec!(-1234.5), options), "-1,234.5");
        assert_eq!(format_amount(dec!(999), options), "999");
        assert_eq!(format_amount(dec!(0), options), "0");
    }

    #[test]
    fn test_format_amount_plain_rounds_and_trims() {
        let options = FormatOptions {
            commify: false,
            max_fraction_digits: 6,
        };
        assert_eq!(format_amount(dec!(1234.5000000), options), "1234.5");
        assert_eq!(format_amount(dec!(0.3333333333), options), "0.333333");
        assert_eq!(format_amount(dec!(0.6666665), options), "0.666667");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(dec!(2500.456), "USD"), "2,500.46 USD");
        assert_eq!(format_currency(dec!(10), "TKN"), "10 TKN");
    }

    #[test]
    fn test_to_base_units() {
        assert_eq!(to_base_units(dec!(1.5), 18), Ok(1_500_000_000_000_000_000));
        assert_eq!(to_base_units(dec!(100), 6), Ok(100_000_000));
        assert_eq!(to_base_units(dec!(0), 18), Ok(0));
        assert_eq!(to_base_units(dec!(1.50), 1), Ok(15));
        assert_eq!(
            to_base_units(dec!(0.001), 2),
            Err(ValidationError::AmountTooPrecise { decimals: 2 })
        );
        assert_eq!(
            to_base_units(dec!(-1), 18),
            Err(ValidationError::AmountNegative)
        );
    }

    #[test]
    fn test_to_base_units_overflow() {
        assert_eq!(
            to_base_units(dec!(1000000000000000000000), 18),
            Err(ValidationError::AmountTooLarge)
        );
        assert_eq!(to_base_units(dec!(1), 40), Err(ValidationError::AmountTooLarge));
        assert_eq!(to_base_units(dec!(0), 40), Ok(0));
        assert_eq!(to_base_units(dec!(0.000), 40), Ok(0));
    }

    #[test]
    fn test_from_base_units() {
        assert_eq!(from_base_units(1_500_000, 6), Some(dec!(1.5)));
        assert_eq!(from_base_units(50 * 10u128.pow(18), 18), Some(dec!(50)));
        assert_eq!(from_base_units(u128::MAX, 18), None);
    }
}
