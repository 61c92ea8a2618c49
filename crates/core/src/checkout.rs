//! Checkout steps and form validation.
//!
//! Checkout is three steps (shipping, payment, review). Validation here is
//! presence and format checking only; no payment processor is involved, so a
//! validated card is reduced to its brand and last four digits.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Email;

/// Steps of the checkout flow, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    Shipping,
    Payment,
    Review,
}

impl CheckoutStep {
    /// All steps in display order.
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::Shipping, Self::Payment, Self::Review]
    }

    /// Zero-based position in the flow.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Shipping => 0,
            Self::Payment => 1,
            Self::Review => 2,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Shipping => "Shipping",
            Self::Payment => "Payment",
            Self::Review => "Review",
        }
    }

    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Shipping => "/checkout/shipping",
            Self::Payment => "/checkout/payment",
            Self::Review => "/checkout/review",
        }
    }

    /// Whether `self` comes before `current` in the flow.
    #[must_use]
    pub const fn is_complete_before(self, current: Self) -> bool {
        self.index() < current.index()
    }
}

/// A single invalid field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_owned(),
            message: message.into(),
        }
    }
}

/// Checkout form validation failure listing every invalid field.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{} field(s) need attention", .0.len())]
pub struct CheckoutError(pub Vec<FieldError>);

impl CheckoutError {
    /// Message for a field, if it failed.
    #[must_use]
    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }
}

/// Raw shipping form as submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// A validated shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Back to form shape, for pre-filling the shipping step.
    #[must_use]
    pub fn to_form(&self) -> ShippingForm {
        ShippingForm {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.to_string(),
            phone: self.phone.clone().unwrap_or_default(),
            address: self.address.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            postal_code: self.postal_code.clone(),
            country: self.country.clone(),
        }
    }
}

fn required(errors: &mut Vec<FieldError>, field: &str, label: &str, value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        errors.push(FieldError::new(field, format!("{label} is required")));
    }
    value.to_owned()
}

impl ShippingForm {
    /// Validate every field, collecting all errors.
    ///
    /// A blank country falls back to `default_country`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError`] listing each missing or malformed field.
    pub fn validate(&self, default_country: &str) -> Result<ShippingAddress, CheckoutError> {
        let mut errors = Vec::new();

        let first_name = required(&mut errors, "first_name", "First name", &self.first_name);
        let last_name = required(&mut errors, "last_name", "Last name", &self.last_name);
        let email = match Email::parse(&self.email) {
            Ok(email) => Some(email),
            Err(_) if self.email.trim().is_empty() => {
                errors.push(FieldError::new("email", "Email is required"));
                None
            }
            Err(_) => {
                errors.push(FieldError::new("email", "Enter a valid email address"));
                None
            }
        };
        let address = required(&mut errors, "address", "Address", &self.address);
        let city = required(&mut errors, "city", "City", &self.city);
        let state = required(&mut errors, "state", "State", &self.state);
        let postal_code = required(&mut errors, "postal_code", "Postal code", &self.postal_code);

        let phone = self.phone.trim();
        if !phone.is_empty()
            && !phone
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')'))
        {
            errors.push(FieldError::new("phone", "Enter a valid phone number"));
        }

        let country = match self.country.trim() {
            "" => default_country.to_owned(),
            c => c.to_owned(),
        };

        match email {
            Some(email) if errors.is_empty() => Ok(ShippingAddress {
                first_name,
                last_name,
                email,
                phone: (!phone.is_empty()).then(|| phone.to_owned()),
                address,
                city,
                state,
                postal_code,
                country,
            }),
            _ => Err(CheckoutError(errors)),
        }
    }
}

/// Raw card form as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PaymentForm {
    pub card_name: String,
    pub card_number: String,
    /// `MM/YY`.
    pub card_expiry: String,
    pub card_cvc: String,
}

/// Card network, derived from the number's prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardBrand {
    Visa,
    Mastercard,
    Amex,
    Rupay,
    Other,
}

impl CardBrand {
    fn detect(digits: &str) -> Self {
        let prefix = |n: usize| digits.get(..n).and_then(|p| p.parse::<u32>().ok());
        match (prefix(1), prefix(2), prefix(4)) {
            (Some(4), _, _) => Self::Visa,
            (_, Some(34 | 37), _) => Self::Amex,
            (_, Some(51..=55), _) | (_, _, Some(2221..=2720)) => Self::Mastercard,
            (_, Some(60 | 65 | 81 | 82), _) => Self::Rupay,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Visa => "Visa",
            Self::Mastercard => "Mastercard",
            Self::Amex => "American Express",
            Self::Rupay => "RuPay",
            Self::Other => "Card",
        }
    }
}

/// What the session keeps of a validated card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSummary {
    pub card_name: String,
    pub brand: CardBrand,
    pub last4: String,
}

impl PaymentSummary {
    #[must_use]
    pub fn display(&self) -> String {
        format!("{} ending in {}", self.brand.label(), self.last4)
    }
}

/// Luhn checksum over an ASCII digit string.
fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0;
    for (i, b) in digits.bytes().rev().enumerate() {
        let mut d = u32::from(b - b'0');
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    sum % 10 == 0
}

/// Parse `MM/YY` (or `MM/YYYY`) into the first day of the following month.
fn expiry_cutoff(input: &str) -> Option<NaiveDate> {
    let (mm, yy) = input.trim().split_once('/')?;
    let month: u32 = mm.trim().parse().ok()?;
    let year_part = yy.trim();
    let year: i32 = match year_part.len() {
        2 => 2000 + year_part.parse::<i32>().ok()?,
        4 => year_part.parse().ok()?,
        _ => return None,
    };
    if !(1..=12).contains(&month) {
        return None;
    }
    if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
}

impl PaymentForm {
    /// Validate card details against `today`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError`] listing each invalid field.
    pub fn validate(&self, today: NaiveDate) -> Result<PaymentSummary, CheckoutError> {
        let mut errors = Vec::new();

        let card_name = required(&mut errors, "card_name", "Name on card", &self.card_name);

        let number: String = self
            .card_number
            .chars()
            .filter(|c| !matches!(c, ' ' | '-'))
            .collect();
        if number.is_empty() {
            errors.push(FieldError::new("card_number", "Card number is required"));
        } else if !number.bytes().all(|b| b.is_ascii_digit())
            || !(12..=19).contains(&number.len())
            || !luhn_valid(&number)
        {
            errors.push(FieldError::new("card_number", "Enter a valid card number"));
        }

        match expiry_cutoff(&self.card_expiry) {
            None => errors.push(FieldError::new("card_expiry", "Use MM/YY")),
            Some(cutoff) if cutoff <= today => {
                errors.push(FieldError::new("card_expiry", "Card has expired"));
            }
            Some(_) => {}
        }

        let cvc = self.card_cvc.trim();
        if !(3..=4).contains(&cvc.len()) || !cvc.bytes().all(|b| b.is_ascii_digit()) {
            errors.push(FieldError::new("card_cvc", "Enter the 3 or 4 digit security code"));
        }

        if !errors.is_empty() {
            return Err(CheckoutError(errors));
        }

        let last4 = number.get(number.len() - 4..).unwrap_or_default().to_owned();
        Ok(PaymentSummary {
            card_name,
            brand: CardBrand::detect(&number),
            last4,
        })
    }
}

/// Order number used when the backend cannot generate one.
#[must_use]
pub fn fallback_order_number(now: DateTime<Utc>) -> String {
    format!("ZV{}", now.timestamp_millis())
}

/// Estimated delivery window shown on the confirmation page.
#[must_use]
pub fn delivery_estimate(placed: DateTime<Utc>) -> (NaiveDate, NaiveDate) {
    let day = placed.date_naive();
    (day + Days::new(5), day + Days::new(7))
}
