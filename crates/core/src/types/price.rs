//! Type-safe money representation using decimal arithmetic.
//!
//! Amounts are kept in the currency's standard unit (rupees, not paise) as a
//! [`Decimal`], so cart and order arithmetic never goes through floats.

use core::fmt;
use core::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// An amount of money in a specific currency.
///
/// ```
/// use rust_decimal::Decimal;
/// use zeaver_core::{CurrencyCode, Money};
///
/// let ring = Money::new(Decimal::new(149_900, 2), CurrencyCode::INR);
/// assert_eq!(ring.to_string(), "₹1499.00");
/// assert_eq!(ring.times(2).to_string(), "₹2998.00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the currency's standard unit.
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Money {
    /// Create a new amount.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Zero in the given currency.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency_code)
    }

    /// Whether the amount is exactly zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Multiply a unit price by a quantity.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self::new(self.amount * Decimal::from(quantity), self.currency_code)
    }

    /// Add two amounts. The currency of `self` is kept.
    #[must_use]
    pub fn plus(self, other: Self) -> Self {
        Self::new(self.amount + other.amount, self.currency_code)
    }

    /// Subtract, never going below zero.
    #[must_use]
    pub fn saturating_minus(self, other: Self) -> Self {
        Self::new(
            (self.amount - other.amount).max(Decimal::ZERO),
            self.currency_code,
        )
    }

    /// Round to two decimal places, midpoints away from zero.
    #[must_use]
    pub fn rounded(self) -> Self {
        Self::new(round_money(self.amount), self.currency_code)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:.2}",
            self.currency_code.symbol(),
            round_money(self.amount)
        )
    }
}

/// Round a decimal amount to two places, midpoints away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// ISO 4217 currency codes the storefront can price in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
    EUR,
    GBP,
}

impl CurrencyCode {
    /// Display symbol.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::INR => "₹",
            Self::USD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }

    /// Three-letter code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::INR => "INR",
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error returned when parsing an unsupported currency code.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported currency code: {0}")]
pub struct UnknownCurrency(pub String);

impl FromStr for CurrencyCode {
    type Err = UnknownCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INR" => Ok(Self::INR),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            _ => Err(UnknownCurrency(s.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn inr(cents: i64) -> Money {
        Money::new(Decimal::new(cents, 2), CurrencyCode::INR)
    }

    #[test]
    fn test_display_pads_two_places() {
        assert_eq!(inr(150_000).to_string(), "₹1500.00");
        assert_eq!(
            Money::new(Decimal::new(5, 1), CurrencyCode::USD).to_string(),
            "$0.50"
        );
    }

    #[test]
    fn test_display_rounds_half_away_from_zero() {
        let m = Money::new(Decimal::new(10_005, 3), CurrencyCode::INR);
        assert_eq!(m.to_string(), "₹10.01");
    }

    #[test]
    fn test_times_and_plus() {
        assert_eq!(inr(1_999).times(3), inr(5_997));
        assert_eq!(inr(1_000).plus(inr(250)), inr(1_250));
    }

    #[test]
    fn test_saturating_minus() {
        assert_eq!(inr(1_000).saturating_minus(inr(250)), inr(750));
        assert_eq!(inr(100).saturating_minus(inr(250)), inr(0));
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("inr".parse::<CurrencyCode>().unwrap(), CurrencyCode::INR);
        assert_eq!(" GBP".parse::<CurrencyCode>().unwrap(), CurrencyCode::GBP);
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }

    #[test]
    fn test_default_currency_is_rupee() {
        assert_eq!(CurrencyCode::default().symbol(), "₹");
    }
}
