//! Shipping, tax and order totals.
//!
//! Shipping and tax are both computed on the cart subtotal before any promo
//! discount. Every amount leaving this module is rounded to two places.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CurrencyCode, Money, price::round_money};

/// Store-wide pricing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Fraction of the subtotal charged as tax (0.08 = 8%).
    pub tax_rate: Decimal,
    /// Orders with a subtotal strictly above this ship free.
    pub free_shipping_threshold: Decimal,
    /// Shipping charged below the threshold.
    pub flat_shipping_fee: Decimal,
    pub currency: CurrencyCode,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(8, 2),
            free_shipping_threshold: Decimal::from(100),
            flat_shipping_fee: Decimal::from(10),
            currency: CurrencyCode::INR,
        }
    }
}

impl PricingPolicy {
    /// Shipping for a subtotal: free above the threshold, free for an empty
    /// cart, otherwise the flat fee.
    #[must_use]
    pub fn shipping(&self, subtotal: Decimal) -> Decimal {
        if subtotal <= Decimal::ZERO || subtotal > self.free_shipping_threshold {
            Decimal::ZERO
        } else {
            self.flat_shipping_fee
        }
    }

    /// `subtotal * tax_rate`, rounded to two places.
    #[must_use]
    pub fn tax(&self, subtotal: Decimal) -> Decimal {
        round_money(subtotal * self.tax_rate)
    }

    /// How much more the visitor needs to spend for free shipping, if any.
    #[must_use]
    pub fn remaining_for_free_shipping(&self, subtotal: Decimal) -> Option<Decimal> {
        (subtotal <= self.free_shipping_threshold)
            .then(|| self.free_shipping_threshold - subtotal + Decimal::new(1, 2))
    }

    /// Full breakdown for a subtotal and an already-computed discount.
    ///
    /// The discount is capped at the subtotal.
    #[must_use]
    pub fn totals(&self, subtotal: Decimal, discount: Decimal) -> OrderTotals {
        let subtotal = round_money(subtotal);
        let discount = round_money(discount.clamp(Decimal::ZERO, subtotal));
        let shipping = self.shipping(subtotal);
        let tax = self.tax(subtotal);
        OrderTotals {
            subtotal,
            discount,
            shipping,
            tax,
            total: subtotal - discount + shipping + tax,
            currency: self.currency,
        }
    }

    /// Wrap an amount in this store's currency.
    #[must_use]
    pub const fn money(&self, amount: Decimal) -> Money {
        Money::new(amount, self.currency)
    }
}

/// Price breakdown shown on the cart, checkout and confirmation pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub currency: CurrencyCode,
}

impl OrderTotals {
    #[must_use]
    pub const fn ships_free(&self) -> bool {
        self.shipping.is_zero()
    }
}
