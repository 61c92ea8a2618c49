//! Promo code validation and discount calculation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{DiscountType, PromoCodeId, price::round_money};

/// Reasons a promo code cannot be used.
///
/// The `Display` strings are shown to shoppers as-is.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PromoError {
    #[error("Invalid promo code")]
    Invalid,
    #[error("Invalid promo code")]
    Inactive,
    #[error("Promo code has expired")]
    Expired,
    #[error("Promo code has reached maximum uses")]
    UsageExhausted,
    #[error("Minimum purchase of {min} required")]
    MinimumNotMet {
        /// Minimum subtotal, formatted with two places.
        min: String,
    },
}

/// A row of the `promo_codes` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoCode {
    pub id: PromoCodeId,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default)]
    pub min_purchase: Option<Decimal>,
    #[serde(default)]
    pub max_uses: Option<i32>,
    #[serde(default)]
    pub current_uses: i32,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

impl PromoCode {
    /// Codes are stored uppercase; user input is trimmed and uppercased.
    #[must_use]
    pub fn normalize(code: &str) -> String {
        code.trim().to_uppercase()
    }

    /// Check that the code is active, unexpired and has uses left.
    ///
    /// # Errors
    ///
    /// Returns the first failing [`PromoError`].
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), PromoError> {
        if !self.is_active {
            return Err(PromoError::Inactive);
        }
        if self.valid_until.is_some_and(|until| until < now) {
            return Err(PromoError::Expired);
        }
        if self
            .max_uses
            .is_some_and(|max| self.current_uses >= max)
        {
            return Err(PromoError::UsageExhausted);
        }
        Ok(())
    }

    /// Discount this code gives on `subtotal`, capped at the subtotal.
    ///
    /// # Errors
    ///
    /// Returns [`PromoError::MinimumNotMet`] when the subtotal is below the
    /// code's minimum purchase.
    pub fn discount_for(&self, subtotal: Decimal) -> Result<Decimal, PromoError> {
        if let Some(min) = self.min_purchase
            && subtotal < min
        {
            return Err(PromoError::MinimumNotMet {
                min: format!("{:.2}", round_money(min)),
            });
        }

        let raw = match self.discount_type {
            DiscountType::Percentage => subtotal * self.discount_value / Decimal::from(100),
            DiscountType::Fixed => self.discount_value,
        };
        Ok(round_money(raw.clamp(Decimal::ZERO, subtotal)))
    }

    /// Validate and compute the discount in one step.
    ///
    /// # Errors
    ///
    /// Returns any [`PromoError`] from [`Self::validate`] or [`Self::discount_for`].
    pub fn apply(&self, subtotal: Decimal, now: DateTime<Utc>) -> Result<AppliedPromo, PromoError> {
        self.validate(now)?;
        let discount = self.discount_for(subtotal)?;
        Ok(AppliedPromo {
            code: self.code.clone(),
            discount,
            discount_type: self.discount_type,
            discount_value: self.discount_value,
        })
    }
}

/// A promo code accepted for the current checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedPromo {
    pub code: String,
    pub discount: Decimal,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
}

impl AppliedPromo {
    /// Short description such as `10% off` or `₹50.00 off`.
    #[must_use]
    pub fn describe(&self, currency_symbol: &str) -> String {
        match self.discount_type {
            DiscountType::Percentage => format!("{}% off", self.discount_value.normalize()),
            DiscountType::Fixed => {
                format!("{currency_symbol}{:.2} off", round_money(self.discount_value))
            }
        }
    }

    /// Recompute the discount for a changed subtotal, e.g. after the cart changes.
    ///
    /// Returns `None` if the code no longer applies to the new subtotal.
    #[must_use]
    pub fn reprice(&self, promo: &PromoCode, subtotal: Decimal) -> Option<Self> {
        promo.discount_for(subtotal).ok().map(|discount| Self {
            discount,
            ..self.clone()
        })
    }
}
