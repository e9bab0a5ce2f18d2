//! Fiat to native-unit conversion.
//!
//! Amounts are converted with a fixed exchange rate, floored to the smallest
//! on-chain unit (octas, 10^8 per APT) and clamped up to a minimum transfer.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::{PaymentError, Result};

/// Smallest units per native unit.
pub const UNITS_PER_NATIVE: Decimal = dec!(100000000);

/// Source of the fiat/native exchange rate.
pub trait ExchangeRate: Send + Sync {
    /// Fiat units per one native unit.
    fn fiat_per_native(&self) -> Decimal;
}

/// A constant exchange rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedRate(pub Decimal);

impl ExchangeRate for FixedRate {
    fn fiat_per_native(&self) -> Decimal {
        self.0
    }
}

/// Result of converting a fiat amount.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Quote {
    pub fiat_amount: Decimal,
    /// Unclamped conversion, floored to smallest units.
    pub converted_units: u64,
    /// Amount actually transferred.
    pub units: u64,
}

impl Quote {
    /// Whether the minimum transfer was applied.
    pub fn clamped(&self) -> bool {
        self.units != self.converted_units
    }

    /// Transferred amount in native units.
    pub fn native_amount(&self) -> Decimal {
        Decimal::from(self.units) / UNITS_PER_NATIVE
    }
}

/// Convert native units to smallest units, flooring.
pub fn to_smallest_unit(native: Decimal) -> Result<u64> {
    (native * UNITS_PER_NATIVE)
        .floor()
        .to_u64()
        .ok_or_else(|| PaymentError::InvalidRequest(format!("amount out of range: {}", native)))
}

/// Convert a fiat amount into a transfer amount in smallest units.
pub fn quote(fiat_amount: Decimal, rate: &dyn ExchangeRate, min_native: Decimal) -> Result<Quote> {
    if fiat_amount <= Decimal::ZERO {
        return Err(PaymentError::InvalidRequest(
            "amount must be greater than zero".into(),
        ));
    }
    let per_native = rate.fiat_per_native();
    if per_native <= Decimal::ZERO {
        return Err(PaymentError::Configuration(format!(
            "exchange rate must be positive, got {}",
            per_native
        )));
    }

    let native = fiat_amount
        .checked_div(per_native)
        .ok_or_else(|| PaymentError::InvalidRequest("amount out of range".into()))?;
    let converted_units = to_smallest_unit(native)?;
    let min_units = to_smallest_unit(min_native)?;

    Ok(Quote {
        fiat_amount,
        converted_units,
        units: converted_units.max(min_units),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: FixedRate = FixedRate(dec!(3500));

    #[test]
    fn test_conversion_floors() {
        let q = quote(dec!(1000), &RATE, dec!(0.1)).unwrap();
        assert_eq!(q.converted_units, 28_571_428);
        assert_eq!(q.units, 28_571_428);
        assert!(!q.clamped());
    }

    #[test]
    fn test_minimum_applied() {
        let q = quote(dec!(100), &RATE, dec!(0.1)).unwrap();
        assert_eq!(q.converted_units, 2_857_142);
        assert_eq!(q.units, 10_000_000);
        assert!(q.clamped());
        assert_eq!(q.native_amount(), dec!(0.1));
    }

    #[test]
    fn test_exact_minimum_not_clamped() {
        let q = quote(dec!(350), &RATE, dec!(0.1)).unwrap();
        assert_eq!(q.units, 10_000_000);
        assert!(!q.clamped());
    }

    #[test]
    fn test_invalid_amounts() {
        assert!(matches!(
            quote(Decimal::ZERO, &RATE, dec!(0.1)),
            Err(PaymentError::InvalidRequest(_))
        ));
        assert!(quote(dec!(-5), &RATE, dec!(0.1)).is_err());
        assert!(matches!(
            quote(dec!(10), &FixedRate(Decimal::ZERO), dec!(0.1)),
            Err(PaymentError::Configuration(_))
        ));
    }

    #[test]
    fn test_to_smallest_unit() {
        assert_eq!(to_smallest_unit(dec!(1)).unwrap(), 100_000_000);
        assert_eq!(to_smallest_unit(dec!(0.000000019)).unwrap(), 1);
    }
}
