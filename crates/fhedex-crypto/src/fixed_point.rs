//! Exact decimal <-> fixed-point conversion and rational rate arithmetic.
//!
//! Plaintexts are carried as `i128` mantissas with `FRACTIONAL_DIGITS`
//! implied decimals. Rates are reduced rationals so that multiplying and
//! dividing by a quote never loses precision before the final rounding.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::CryptoError;
use crate::types::{FRACTIONAL_DIGITS, MAX_DIVISOR, MAX_MANTISSA, MAX_MULTIPLIER};

/// Convert a decimal to its fixed-point mantissa.
///
/// Rejects values with more than `FRACTIONAL_DIGITS` fractional digits or a
/// magnitude above `MAX_MANTISSA`; never truncates.
pub fn to_fixed(value: Decimal) -> Result<i128, CryptoError> {
    let normalized = value.normalize();
    let scale = normalized.scale();
    if scale > FRACTIONAL_DIGITS {
        return Err(CryptoError::Range(format!(
            "more than {} fractional digits",
            FRACTIONAL_DIGITS
        )));
    }
    normalized
        .mantissa()
        .checked_mul(10i128.pow(FRACTIONAL_DIGITS - scale))
        .filter(|m| m.abs() <= MAX_MANTISSA)
        .ok_or_else(|| CryptoError::Range("magnitude exceeds the fixed-point range".to_string()))
}

/// Convert a fixed-point mantissa back to a normalized decimal.
pub fn from_fixed(mantissa: i128) -> Result<Decimal, CryptoError> {
    Decimal::try_from_i128_with_scale(mantissa, FRACTIONAL_DIGITS)
        .map(|d| d.normalize())
        .map_err(|_| CryptoError::Range("result exceeds the decimal range".to_string()))
}

/// Divide and round half away from zero.
pub fn div_round(numerator: i128, divisor: u128) -> Result<i128, CryptoError> {
    if divisor == 0 || divisor > MAX_DIVISOR {
        return Err(CryptoError::Range(format!("invalid divisor {}", divisor)));
    }
    let d = divisor as i128;
    let quotient = numerator / d;
    let remainder = numerator % d;
    if remainder.unsigned_abs() * 2 >= divisor {
        Ok(quotient + numerator.signum())
    } else {
        Ok(quotient)
    }
}

/// Numerators of at most this many bits fit under `MAX_MULTIPLIER`.
const MULTIPLIER_BITS: u32 = 63;

/// A positive quote as an integer count of `10^-FRACTIONAL_DIGITS` units.
fn quote_units(rate: Decimal) -> Result<u128, CryptoError> {
    let rounded = rate
        .round_dp_with_strategy(FRACTIONAL_DIGITS, RoundingStrategy::MidpointAwayFromZero)
        .normalize();
    if rounded <= Decimal::ZERO {
        return Err(CryptoError::Range(format!(
            "quote {} is below {} fractional digits of precision",
            rate, FRACTIONAL_DIGITS
        )));
    }
    rounded
        .mantissa()
        .unsigned_abs()
        .checked_mul(10u128.pow(FRACTIONAL_DIGITS - rounded.scale()))
        .ok_or_else(|| CryptoError::Range("quote exceeds the supported range".to_string()))
}

/// `x / 2^shift`, rounded half up. `shift` must be non-zero.
fn round_shift(x: u128, shift: u32) -> u128 {
    (x >> shift) + ((x >> (shift - 1)) & 1)
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// A positive reduced rational `numerator / denominator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ratio {
    numerator: u128,
    denominator: u128,
}

impl Ratio {
    pub const ONE: Ratio = Ratio {
        numerator: 1,
        denominator: 1,
    };

    /// Build a reduced ratio. Both parts must be non-zero.
    pub fn new(numerator: u128, denominator: u128) -> Result<Self, CryptoError> {
        if numerator == 0 || denominator == 0 {
            return Err(CryptoError::Range("ratio parts must be non-zero".to_string()));
        }
        let g = gcd(numerator, denominator);
        Ok(Self {
            numerator: numerator / g,
            denominator: denominator / g,
        })
    }

    /// The conversion factor `input_rate / output_rate`.
    ///
    /// Each quote is first rounded half away from zero to `FRACTIONAL_DIGITS`,
    /// so quotes from repeated `Decimal` division (e.g. `2/3`) stay usable.
    /// Both quotes must already be known to be positive.
    pub fn of_rates(input_rate: Decimal, output_rate: Decimal) -> Result<Self, CryptoError> {
        Self::bounded(quote_units(input_rate)?, quote_units(output_rate)?)
    }

    /// Reduce `numerator / denominator`, then, if the numerator still exceeds
    /// `MAX_MULTIPLIER`, shift both parts right (rounding) until it fits.
    pub fn bounded(numerator: u128, denominator: u128) -> Result<Self, CryptoError> {
        let exact = Self::new(numerator, denominator)?;
        if exact.numerator <= MAX_MULTIPLIER {
            return Ok(exact);
        }
        let bits = u128::BITS - exact.numerator.leading_zeros();
        let shift = bits - MULTIPLIER_BITS;
        let denominator = round_shift(exact.denominator, shift);
        if denominator == 0 {
            return Err(CryptoError::Range("rate ratio too large".to_string()));
        }
        Self::new(round_shift(exact.numerator, shift), denominator)
    }

    pub fn numerator(&self) -> u128 {
        self.numerator
    }

    pub fn denominator(&self) -> u128 {
        self.denominator
    }

    /// Apply this ratio to a plaintext mantissa with the codec's rounding.
    pub fn apply(&self, mantissa: i128) -> Result<i128, CryptoError> {
        if self.numerator > MAX_MULTIPLIER {
            return Err(CryptoError::Range("rate numerator too large".to_string()));
        }
        let product = mantissa
            .checked_mul(self.numerator as i128)
            .ok_or_else(|| CryptoError::Range("product overflow".to_string()))?;
        div_round(product, self.denominator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_fixed_scales_to_nine_digits() {
        assert_eq!(to_fixed(Decimal::new(2, 0)).unwrap(), 2_000_000_000);
        assert_eq!(to_fixed(Decimal::new(25, 1)).unwrap(), 2_500_000_000);
        assert_eq!(to_fixed(Decimal::new(-1, 9)).unwrap(), -1);
    }

    #[test]
    fn trailing_zeros_do_not_count_as_precision() {
        // 1.5000000000000 normalizes to 1.5
        assert_eq!(to_fixed(Decimal::new(15_000_000_000_000, 13)).unwrap(), 1_500_000_000);
    }

    #[test]
    fn to_fixed_rejects_excess_precision() {
        assert!(matches!(
            to_fixed(Decimal::new(1, 10)),
            Err(CryptoError::Range(_))
        ));
    }

    #[test]
    fn to_fixed_rejects_large_magnitude() {
        assert!(to_fixed(Decimal::new(9_223_372_036, 0)).is_ok());
        assert!(to_fixed(Decimal::new(9_223_372_037, 0)).is_err());
    }

    #[test]
    fn from_fixed_normalizes() {
        let value = from_fixed(7_000_000_000_000).unwrap();
        assert_eq!(value, Decimal::new(7000, 0));
        assert_eq!(value.to_string(), "7000");
    }

    #[test]
    fn div_round_half_away_from_zero() {
        assert_eq!(div_round(5, 2).unwrap(), 3);
        assert_eq!(div_round(-5, 2).unwrap(), -3);
        assert_eq!(div_round(4, 3).unwrap(), 1);
        assert_eq!(div_round(-4, 3).unwrap(), -1);
        assert_eq!(div_round(0, 7).unwrap(), 0);
        assert!(div_round(1, 0).is_err());
    }

    #[test]
    fn ratio_is_reduced() {
        let r = Ratio::of_rates(Decimal::new(65000, 0), Decimal::new(3500, 0)).unwrap();
        assert_eq!((r.numerator(), r.denominator()), (130, 7));

        let r = Ratio::of_rates(Decimal::new(25, 1), Decimal::new(1, 0)).unwrap();
        assert_eq!((r.numerator(), r.denominator()), (5, 2));
    }

    #[test]
    fn ratio_apply_rounds_at_codec_precision() {
        let r = Ratio::of_rates(Decimal::new(65000, 0), Decimal::new(3500, 0)).unwrap();
        // 1 * 130 / 7 = 18.571428571428...
        assert_eq!(r.apply(1_000_000_000).unwrap(), 18_571_428_571);
    }

    #[test]
    fn repeating_decimal_quote_is_rounded_to_codec_precision() {
        let two_thirds = Decimal::new(2, 0) / Decimal::new(3, 0);
        let r = Ratio::of_rates(Decimal::new(3500, 0), two_thirds).unwrap();
        // 3500 / 0.666666667
        let expected = Ratio::new(3_500_000_000_000, 666_666_667).unwrap();
        assert_eq!(r, expected);
        assert!(r.numerator() <= MAX_MULTIPLIER);
    }

    #[test]
    fn quote_below_precision_is_rejected() {
        assert!(matches!(
            Ratio::of_rates(Decimal::new(1, 10), Decimal::ONE),
            Err(CryptoError::Range(_))
        ));
        // rounds up to one unit
        assert!(Ratio::of_rates(Decimal::new(5, 10), Decimal::ONE).is_ok());
    }

    #[test]
    fn oversized_ratio_is_shifted_into_range() {
        // coprime parts, numerator well past 2^63
        let r = Ratio::bounded((1u128 << 80) + 1, (1u128 << 20) + 3).unwrap();
        assert!(r.numerator() <= MAX_MULTIPLIER);
        assert!(r.denominator() >= 1);
        assert!(Ratio::bounded(u128::MAX, 1).is_err());
    }

    #[test]
    fn ratio_rejects_zero() {
        assert!(Ratio::new(0, 1).is_err());
        assert!(Ratio::new(1, 0).is_err());
        assert_eq!(Ratio::new(4, 4).unwrap(), Ratio::ONE);
    }
}
